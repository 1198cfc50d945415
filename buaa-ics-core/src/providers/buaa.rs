use async_trait::async_trait;
use chrono::FixedOffset;
use reqwest::{StatusCode, Url, header};

use crate::{
    Credentials, Error, NormalizedEvent, ProviderConfig, Result, SessionToken, WeekQuery,
    error::AuthFailure,
    providers::{BaseProvider, BaseProviderBuilder, Provider, ProviderInfo},
    schedule::WeekTimetable,
    session::{self, SESSION_COOKIE},
};

/// 登录成功后 CAS 回调的 App 地址
const SERVICE_PATH: &str =
    "/a_buaa/api/cas/index?redirect=%2Fsite%2Fcenter%2Fpersonal&from=wap&login_from=";
const BOOTSTRAP_PATH: &str = "/uc/wap/login";
const TIMETABLE_PATH: &str = "/timetable/wap/default/get-datatmp";

/// 北航各接口地址
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub login: Url,
    pub service: String,
    pub bootstrap: Url,
    pub timetable: Url,
}

impl Endpoints {
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        let sso = parse_base(&config.sso_base)?;
        let app = parse_base(&config.app_base)?;
        let join = |base: &Url, path: &str| {
            base.join(path)
                .map_err(|e| Error::Config(format!("Invalid endpoint {path}: {e}")))
        };
        Ok(Self {
            login: join(&sso, "login")?,
            service: format!("{}{}", config.app_base.trim_end_matches('/'), SERVICE_PATH),
            bootstrap: join(&app, BOOTSTRAP_PATH.trim_start_matches('/'))?,
            timetable: join(&app, TIMETABLE_PATH.trim_start_matches('/'))?,
        })
    }
}

fn parse_base(base: &str) -> Result<Url> {
    let normalized = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&normalized).map_err(|e| Error::Config(format!("Invalid base URL {base}: {e}")))
}

pub struct BuaaProvider {
    base: BaseProvider,
    endpoints: Endpoints,
}

impl BuaaProvider {
    pub fn new() -> Result<Self> {
        Self::with_config(&ProviderConfig::default())
    }

    pub fn with_config(config: &ProviderConfig) -> Result<Self> {
        let base = BaseProviderBuilder::new(
            ProviderInfo {
                name: "buaa".to_string(),
                description: "北航统一认证 + App 课表".to_string(),
            },
            config.timeout_secs,
        )
        .build()?;

        Ok(Self {
            base,
            endpoints: Endpoints::from_config(config)?,
        })
    }

    /// 请求登录页并取出 `execution`
    async fn fetch_execution(&self, client: &reqwest::Client) -> Result<String> {
        let response = client
            .get(self.endpoints.login.clone())
            .query(&[
                ("service", self.endpoints.service.as_str()),
                ("noAutoRedirect", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;
        let html = response
            .text()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        session::extract_execution_token(&html)
            .ok_or(Error::Authentication(AuthFailure::MissingExecution))
    }

    /// 提交登录表单，返回回调地址
    async fn submit_login(
        &self,
        client: &reqwest::Client,
        credentials: &Credentials,
        execution: &str,
    ) -> Result<Url> {
        let form = [
            ("username", credentials.username.as_str()),
            ("password", credentials.password.as_str()),
            ("execution", execution),
            ("type", "username_password"),
            ("_eventId", "submit"),
            ("submit", "登录"),
        ];
        let response = client
            .post(self.endpoints.login.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(Error::Authentication(AuthFailure::MissingLocation))?;

        self.endpoints
            .login
            .join(location)
            .map_err(|e| self.base.custom_error(format!("Invalid redirect location: {e}")))
    }

    /// 从 App 登录入口拿到一个新的 `eai-sess`
    async fn fetch_bootstrap_cookie(&self) -> Result<String> {
        let response = self
            .base
            .client
            .get(self.endpoints.bootstrap.clone())
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        session::extract_cookie(response.headers(), SESSION_COOKIE)
            .ok_or_else(|| self.base.custom_error("Bootstrap endpoint did not set eai-sess"))
    }
}

#[async_trait]
impl Provider for BuaaProvider {
    type Token = SessionToken;

    fn name(&self) -> &str {
        &self.base.info.name
    }

    fn description(&self) -> &str {
        &self.base.info.description
    }

    fn timezone(&self) -> FixedOffset {
        crate::semester::china_standard_time()
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<Self::Token> {
        tracing::info!("Authenticating user: {}", credentials.username);

        // 登录页与表单提交需要共享 SSO 的会话 Cookie
        let sso_client = self.base.session_client()?;
        let execution = self.fetch_execution(&sso_client).await?;
        let callback = self
            .submit_login(&sso_client, credentials, &execution)
            .await?;
        tracing::debug!("CAS callback: {}", callback);

        let bootstrap = self.fetch_bootstrap_cookie().await?;
        let response = self
            .base
            .client
            .get(callback)
            .header(header::COOKIE, format!("{SESSION_COOKIE}={bootstrap}"))
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        let token = session::probe_session(response.headers(), &bootstrap)
            .map_err(Error::Authentication)?;
        tracing::info!("User {} logged in", credentials.username);
        Ok(token)
    }

    async fn get_week(
        &self,
        query: WeekQuery<'_>,
        token: &Self::Token,
    ) -> Result<Vec<NormalizedEvent>> {
        let week = query.week.to_string();
        let term = query.term.term.to_string();
        let form = [
            ("year", query.term.year.as_str()),
            ("term", term.as_str()),
            ("week", week.as_str()),
            ("type", "1"),
        ];
        let response = self
            .base
            .client
            .post(self.endpoints.timetable.clone())
            .header(header::COOKIE, token.cookie_header())
            .form(&form)
            .send()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        if response.status() != StatusCode::OK {
            tracing::warn!("第 {} 周课表请求失败: HTTP {}", query.week, response.status());
            return Ok(Vec::new());
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.base.handle_error_req(e))?;

        match WeekTimetable::parse(&body) {
            Ok(timetable) => Ok(timetable.normalize()),
            Err(e) => {
                tracing::warn!("第 {} 周课表格式异常，跳过: {}", query.week, e);
                Ok(Vec::new())
            }
        }
    }
}
