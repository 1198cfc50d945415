use std::time::Duration;

use reqwest::{
    Client, ClientBuilder,
    header::{self, HeaderMap, HeaderValue},
    redirect,
};

use crate::{Error, Result};

/// 基础provider结构
pub struct BaseProviderBuilder {
    pub info: ProviderInfo,
    timeout: Duration,
}

pub struct BaseProvider {
    pub client: Client,
    pub info: ProviderInfo,
    timeout: Duration,
}

pub struct ProviderInfo {
    pub name: String,
    pub description: String,
}

const USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) \
                          AppleWebKit/605.1.15 (KHTML, like Gecko) Mobile/15E148";

/// 所有请求都不自动跟随重定向，握手流程需要读取 `Location`
fn client_builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::none())
        .default_headers({
            let mut headers = HeaderMap::new();
            headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
            headers.insert(
                header::ACCEPT_ENCODING,
                HeaderValue::from_static("br;q=1.0, gzip;q=0.9, deflate;q=0.8"),
            );
            headers
        })
}

impl BaseProviderBuilder {
    pub fn new(info: ProviderInfo, timeout_secs: u64) -> Self {
        Self {
            info,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn build(self) -> Result<BaseProvider> {
        let client = client_builder(self.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(BaseProvider {
            client,
            info: self.info,
            timeout: self.timeout,
        })
    }
}

impl BaseProvider {
    /// 新建一个带 Cookie 存储的客户端，用于需要保持会话的多步请求
    pub fn session_client(&self) -> Result<Client> {
        client_builder(self.timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))
    }

    /// 通用的错误处理
    pub fn handle_error_req(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout
        } else if error.is_request() {
            Error::Provider {
                provider: self.info.name.clone(),
                message: format!("Request failed: {error}"),
            }
        } else {
            Error::Http(error)
        }
    }

    pub fn custom_error(&self, message: impl Into<String>) -> Error {
        Error::Provider {
            provider: self.info.name.clone(),
            message: message.into(),
        }
    }
}
