use std::env;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

/// 统一认证默认地址
pub const DEFAULT_SSO_BASE: &str = "https://sso.buaa.edu.cn";
/// 北航 App 默认地址
pub const DEFAULT_APP_BASE: &str = "https://app.buaa.edu.cn";
/// 默认请求超时（秒）
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 用户凭据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// 学号/统一认证用户名
    pub username: String,
    /// 密码
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// 已验证的 `eai-sess` 会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `Cookie` 请求头的值
    pub fn cookie_header(&self) -> String {
        format!("eai-sess={}", self.0)
    }
}

/// 课表接口返回的原始课程
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub course_id: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub course_name: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub teacher: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub credit: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub course_type: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub course_hour: String,
    /// 星期几，1 = 周一
    #[serde(deserialize_with = "de_lenient_u8")]
    pub weekday: u8,
    /// 两位一节拼接的节次，如 `"0102"`
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub lessons: String,
    /// `"08:00～09:35"`，部分数据源使用 `-`
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub course_time: String,
    #[serde(default, deserialize_with = "de_lenient_string")]
    pub location: String,
}

/// 规范化后的单次课程
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    pub course_id: String,
    pub course_name: String,
    pub teacher: String,
    pub credit: String,
    pub course_type: String,
    pub course_hour: String,
    /// `YYYYMMDD`
    pub date: String,
    /// `HHMM` 或 `HHMMSS`
    pub start: String,
    pub end: String,
    /// `"01, 02"`
    pub lessons: String,
    pub location: String,
    /// 原始（合并后）的上课时间
    pub course_time: String,
}

/// 学年学期，如 `2024-2025` 第 `1` 学期
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcademicTerm {
    /// `YYYY-YYYY`
    pub year: String,
    /// 1 或 2
    pub term: u8,
}

impl AcademicTerm {
    pub fn new(year: impl Into<String>, term: u8) -> Result<Self> {
        let year = year.into();
        let valid_year = year
            .split_once('-')
            .and_then(|(a, b)| Some((a.parse::<u16>().ok()?, b.parse::<u16>().ok()?)))
            .is_some_and(|(a, b)| a.checked_add(1) == Some(b));
        if !valid_year {
            return Err(Error::Config(format!(
                "Invalid academic year '{year}', expected YYYY-YYYY"
            )));
        }
        if !(1..=2).contains(&term) {
            return Err(Error::Config(format!("Invalid term {term}, expected 1 or 2")));
        }
        Ok(Self { year, term })
    }

    /// 日历名称
    pub fn calendar_title(&self) -> String {
        format!("北航 {} 第 {} 学期课程表", self.year, self.term)
    }
}

/// 单周查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekQuery<'a> {
    pub term: &'a AcademicTerm,
    pub week: u32,
}

/// 与日历一同保存的明文配置
///
/// 密码以明文写入磁盘，只适合本地单用户部署。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidecarConfig {
    pub username: String,
    pub password: String,
    pub trigger: u32,
}

impl SidecarConfig {
    /// 每行一个字段，用户名和密码中不能含有换行
    pub fn new(username: &str, password: &str, trigger: u32) -> Result<Self> {
        if [username, password]
            .iter()
            .any(|v| v.contains(['\n', '\r']))
        {
            return Err(Error::Config(
                "Username and password must not contain line breaks".to_string(),
            ));
        }
        Ok(Self {
            username: username.to_string(),
            password: password.to_string(),
            trigger,
        })
    }

    pub fn to_text(&self) -> String {
        format!(
            "username={}\npassword={}\ntrigger={}\n",
            self.username, self.password, self.trigger
        )
    }

    pub fn parse(text: &str) -> Option<Self> {
        let mut username = None;
        let mut password = None;
        let mut trigger = None;
        for line in text.lines() {
            match line.split_once('=') {
                Some(("username", v)) => username = Some(v.to_string()),
                Some(("password", v)) => password = Some(v.to_string()),
                Some(("trigger", v)) => trigger = v.trim().parse().ok(),
                _ => {}
            }
        }
        Some(Self {
            username: username?,
            password: password?,
            trigger: trigger?,
        })
    }
}

/// provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// 统一认证基础URL
    pub sso_base: String,
    /// App 基础URL
    pub app_base: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    /// 从环境变量读取，未设置时使用默认值
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = non_empty_env("BUAA_SSO_BASE") {
            config.sso_base = v;
        }
        if let Some(v) = non_empty_env("BUAA_APP_BASE") {
            config.app_base = v;
        }
        if let Some(v) = non_empty_env("BUAA_HTTP_TIMEOUT") {
            config.timeout_secs = v
                .parse()
                .map_err(|_| Error::Config(format!("Invalid BUAA_HTTP_TIMEOUT: {v}")))?;
        }
        Ok(config)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sso_base: DEFAULT_SSO_BASE.to_string(),
            app_base: DEFAULT_APP_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// ICS生成选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IcsOptions {
    /// 日历名称
    pub calendar_name: String,
    /// 提前提醒分钟数
    pub reminder_minutes: u32,
}

impl Default for IcsOptions {
    fn default() -> Self {
        Self {
            calendar_name: "北航课程表".to_string(),
            reminder_minutes: 30,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn de_lenient_string<'de, D>(de: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Lenient>::deserialize(de)? {
        None => String::new(),
        Some(Lenient::Str(s)) => s,
        Some(Lenient::Int(i)) => i.to_string(),
        Some(Lenient::Float(f)) => f.to_string(),
        Some(Lenient::Bool(b)) => b.to_string(),
    })
}

fn de_lenient_u8<'de, D>(de: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    match Lenient::deserialize(de)? {
        Lenient::Str(s) => s.trim().parse().map_err(serde::de::Error::custom),
        Lenient::Int(i) => u8::try_from(i).map_err(serde::de::Error::custom),
        Lenient::Float(_) | Lenient::Bool(_) => {
            Err(serde::de::Error::custom("expected an integer weekday"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_record_accepts_numbers_and_strings() {
        let raw = r#"{
            "course_id": "B3I062410",
            "course_name": "数据结构",
            "teacher": "王老师",
            "credit": 3.5,
            "course_type": "必修",
            "course_hour": 56,
            "weekday": "2",
            "lessons": "0304",
            "course_time": "09:50～11:25",
            "location": "(一)203"
        }"#;
        let record: ClassRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(record.weekday, 2);
        assert_eq!(record.credit, "3.5");
        assert_eq!(record.course_hour, "56");
    }

    #[test]
    fn test_class_record_tolerates_null_course_time() {
        let raw = r#"{"course_name": "体育", "weekday": 5, "lessons": "07", "course_time": null}"#;
        let record: ClassRecord = serde_json::from_str(raw).unwrap();
        assert!(record.course_time.is_empty());
        assert!(record.teacher.is_empty());
    }

    #[test]
    fn test_academic_term_validation() {
        assert!(AcademicTerm::new("2024-2025", 1).is_ok());
        assert!(AcademicTerm::new("2024-2026", 1).is_err());
        assert!(AcademicTerm::new("2024", 1).is_err());
        assert!(AcademicTerm::new("2024-2025", 3).is_err());
        assert_eq!(
            AcademicTerm::new("2024-2025", 2).unwrap().calendar_title(),
            "北航 2024-2025 第 2 学期课程表"
        );
    }

    #[test]
    fn test_sidecar_text_round_trip() {
        let sidecar = SidecarConfig {
            username: "by2406101".to_string(),
            password: "p=ss".to_string(),
            trigger: 15,
        };
        let text = sidecar.to_text();
        assert_eq!(text, "username=by2406101\npassword=p=ss\ntrigger=15\n");
        assert_eq!(SidecarConfig::parse(&text), Some(sidecar));
        assert_eq!(SidecarConfig::parse("username=a\n"), None);
    }

    #[test]
    fn test_sidecar_rejects_line_breaks() {
        assert!(SidecarConfig::new("by2406101", "p=ss", 15).is_ok());
        assert!(matches!(
            SidecarConfig::new("by2406101", "pa\nss", 15),
            Err(Error::Config(_))
        ));
        assert!(SidecarConfig::new("by2406101", "pass\r", 15).is_err());
    }
}
