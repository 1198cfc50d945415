use std::fmt;

use thiserror::Error;

/// 登录失败的具体原因
///
/// 这些情况都属于“预期内”的认证失败，调用方应当向用户返回 401，
/// 而不是当作网络错误处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    /// 登录页中没有 `execution` 隐藏字段
    MissingExecution,
    /// 提交表单后响应没有 `Location` 头
    MissingLocation,
    /// 回调地址的响应没有 `Date` 头
    MissingDateProbe,
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::MissingExecution => "login page has no execution token",
            Self::MissingLocation => "login response has no redirect location",
            Self::MissingDateProbe => "session probe response has no Date header",
        };
        f.write_str(reason)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Authentication(AuthFailure),

    #[error("Malformed timetable: {0}")]
    Timetable(String),

    #[error("Calendar store error: {0}")]
    Store(String),

    #[error("Network timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// 是否为认证失败（而非网络或内部错误）
    pub const fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
