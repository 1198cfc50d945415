use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use regex::Regex;
use uuid::Uuid;

use crate::{Error, Result, SidecarConfig};

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").unwrap());

/// 一份已保存的日历
#[derive(Debug, Clone)]
pub struct StoredCalendar {
    pub path: PathBuf,
    pub content: String,
    pub sidecar: Option<SidecarConfig>,
}

/// 按用户名保存日历及其配置
#[async_trait]
pub trait CalendarStore: Send + Sync {
    /// 读取不超过 `max_age` 的日历
    async fn load_fresh(&self, username: &str, max_age: Duration)
    -> Result<Option<StoredCalendar>>;

    /// 原子地写入日历和配置，返回日历文件路径
    async fn save(&self, username: &str, ics: &str, sidecar: &SidecarConfig) -> Result<PathBuf>;
}

/// 校验用户名可以安全地用作文件名
pub fn validate_username(username: &str) -> Result<()> {
    if USERNAME_PATTERN.is_match(username) && username != "." && username != ".." {
        Ok(())
    } else {
        Err(Error::Config(format!("Invalid username: {username:?}")))
    }
}

/// 本地目录实现：`{username}.ics` 与 `{username}.config`
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Store(format!(
                    "Failed to create calendar directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }
        Ok(Self { dir })
    }

    pub fn ics_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.ics"))
    }

    pub fn config_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.config"))
    }

    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4()));
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| Error::Store(format!("Failed to write {}: {}", tmp.display(), e)))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Store(format!(
                "Failed to move calendar into {}: {}",
                path.display(),
                e
            )));
        }
        Ok(())
    }

    async fn read_sidecar(&self, username: &str) -> Option<SidecarConfig> {
        let text = tokio::fs::read_to_string(self.config_path(username))
            .await
            .ok()?;
        SidecarConfig::parse(&text)
    }
}

fn is_fresh(modified: SystemTime, max_age: Duration) -> bool {
    // 修改时间在未来时视为新文件
    SystemTime::now()
        .duration_since(modified)
        .map_or(true, |age| age <= max_age)
}

#[async_trait]
impl CalendarStore for FileStore {
    async fn load_fresh(
        &self,
        username: &str,
        max_age: Duration,
    ) -> Result<Option<StoredCalendar>> {
        validate_username(username)?;
        let path = self.ics_path(username);

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let modified = metadata.modified()?;
        if !is_fresh(modified, max_age) {
            tracing::debug!("{} 的日历已过期", username);
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let sidecar = self.read_sidecar(username).await;
        Ok(Some(StoredCalendar {
            path,
            content,
            sidecar,
        }))
    }

    async fn save(&self, username: &str, ics: &str, sidecar: &SidecarConfig) -> Result<PathBuf> {
        validate_username(username)?;
        let path = self.ics_path(username);
        self.write_atomic(&path, ics).await?;
        self.write_atomic(&self.config_path(username), &sidecar.to_text())
            .await?;
        tracing::info!("日历已保存: {}", path.display());
        Ok(path)
    }
}
