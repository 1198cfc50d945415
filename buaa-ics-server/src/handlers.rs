use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use buaa_ics_core::{
    Credentials,
    cache::FileStore,
    providers::{Provider, buaa::BuaaProvider},
    service::CalendarService,
};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// 默认提前提醒分钟数
const DEFAULT_TRIGGER: u32 = 30;

pub type Service = CalendarService<BuaaProvider, FileStore>;

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<Service>,
    /// 生成订阅链接时使用的外部地址，未设置时取请求的 Host
    pub public_base: Option<String>,
}

/// 健康检查响应
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// 错误响应
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

#[derive(Serialize)]
struct LinkResponse {
    link: String,
}

/// 日历下载参数
#[derive(Deserialize)]
struct SeedQuery {
    username: Option<String>,
    password: Option<String>,
    trigger: Option<String>,
}

/// 生成链接表单
#[derive(Deserialize)]
struct LinkForm {
    username: Option<String>,
    password: Option<String>,
    trigger: Option<String>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/seed", get(seed_handler))
        .route("/generate_link", post(generate_link_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// 根路径处理器
async fn root_handler(State(state): State<AppState>) -> impl IntoResponse {
    let provider = state.service.provider();
    Json(serde_json::json!({
        "name": "BUAA ICS Calendar Service",
        "version": env!("CARGO_PKG_VERSION"),
        "provider": provider.name(),
        "description": provider.description(),
        "endpoints": {
            "health": "/health",
            "seed": "/seed?username=&password=&trigger=",
            "generate_link": "/generate_link"
        }
    }))
}

/// 健康检查处理器
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// 下载日历：七天内生成过则直接返回，否则重新生成
async fn seed_handler(
    Query(params): Query<SeedQuery>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let credentials = required_credentials(params.username, params.password)?;
    let trigger = parse_trigger(params.trigger.as_deref())?;

    let calendar = state
        .service
        .get_or_generate(&credentials, trigger)
        .await?;
    tracing::info!(
        "返回 {} 的日历 (cache={}, events={:?})",
        credentials.username,
        calendar.from_cache,
        calendar.event_count
    );

    let disposition = format!("attachment; filename=\"{}.ics\"", credentials.username);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        calendar.content,
    )
        .into_response())
}

/// 验证凭据并返回订阅链接
async fn generate_link_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<LinkForm>,
) -> Result<Response, AppError> {
    let credentials = required_credentials(form.username, form.password)?;
    let trigger = parse_trigger(form.trigger.as_deref())?;

    state.service.verify(&credentials).await?;

    let base = match state.public_base.as_deref() {
        Some(base) => base.to_string(),
        None => {
            let host = headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::bad_request("Missing Host header"))?;
            format!("http://{host}")
        }
    };
    let link = build_seed_link(&base, &credentials, trigger)?;

    Ok(Json(LinkResponse { link }).into_response())
}

fn required_credentials(
    username: Option<String>,
    password: Option<String>,
) -> Result<Credentials, AppError> {
    match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
            Ok(Credentials::new(username, password))
        }
        _ => Err(AppError::bad_request("Missing username or password")),
    }
}

fn parse_trigger(trigger: Option<&str>) -> Result<u32, AppError> {
    match trigger.map(str::trim).filter(|t| !t.is_empty()) {
        None => Ok(DEFAULT_TRIGGER),
        Some(t) => t
            .parse()
            .map_err(|_| AppError::bad_request(format!("Invalid trigger: {t}"))),
    }
}

/// 拼出 `/seed` 订阅链接，参数经过 URL 编码
fn build_seed_link(
    base: &str,
    credentials: &Credentials,
    trigger: u32,
) -> Result<String, AppError> {
    let mut url = Url::parse(&format!("{}/", base.trim_end_matches('/')))
        .and_then(|u| u.join("seed"))
        .map_err(|e| AppError::bad_request(format!("Invalid base URL: {e}")))?;
    url.query_pairs_mut()
        .append_pair("username", &credentials.username)
        .append_pair("password", &credentials.password)
        .append_pair("trigger", &trigger.to_string());
    Ok(url.to_string())
}

/// 应用错误类型
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Core(buaa_ics_core::Error),
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            Self::Core(e) => match e {
                buaa_ics_core::Error::Config(_) => (StatusCode::BAD_REQUEST, "配置错误"),
                buaa_ics_core::Error::Authentication(_) => {
                    (StatusCode::UNAUTHORIZED, "Login failed")
                }
                buaa_ics_core::Error::Provider { .. } | buaa_ics_core::Error::Http(_) => {
                    (StatusCode::BAD_GATEWAY, "provider错误")
                }
                buaa_ics_core::Error::Timeout => (StatusCode::GATEWAY_TIMEOUT, "请求超时"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "内部服务器错误"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status();
        let message = match &self {
            Self::BadRequest(message) => message.clone(),
            Self::Core(e) => e.to_string(),
        };
        if status.is_server_error() {
            tracing::error!("{}", message);
        }

        let body = Json(ErrorResponse {
            error: error_message.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<buaa_ics_core::Error>,
{
    fn from(err: E) -> Self {
        Self::Core(err.into())
    }
}
