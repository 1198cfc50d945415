//! 统一认证握手中与网络无关的部分：登录页解析、Cookie 提取以及会话探测。

use std::sync::LazyLock;

use reqwest::header::{self, HeaderMap};
use scraper::{Html, Selector};

use crate::{SessionToken, error::AuthFailure};

/// App 会话 Cookie 名称
pub const SESSION_COOKIE: &str = "eai-sess";

static EXECUTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[name="execution"]"#).unwrap());

/// 从登录页 HTML 中取出 `execution` 隐藏字段的值
pub fn extract_execution_token(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&EXECUTION_SELECTOR)
        .find_map(|input| input.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

/// 从 `Set-Cookie` 响应头中读取指定 Cookie 的值
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// 根据回调响应判断会话是否可用
///
/// 远端并没有给出明确的登录成功信号，这里沿用“响应带有 `Date` 头即视为成功”
/// 的判断方式。该判断很弱，几乎任何 HTTP 响应都会带 `Date` 头。
/// 若回调响应重新下发了 `eai-sess`，优先使用新值。
pub fn probe_session(
    headers: &HeaderMap,
    bootstrap: &str,
) -> Result<SessionToken, AuthFailure> {
    if !headers.contains_key(header::DATE) {
        return Err(AuthFailure::MissingDateProbe);
    }
    let value = extract_cookie(headers, SESSION_COOKIE).unwrap_or_else(|| bootstrap.to_string());
    Ok(SessionToken::new(value))
}
