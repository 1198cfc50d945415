use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::{
    AcademicTerm, Credentials, Error, Result, SidecarConfig,
    cache::{CalendarStore, validate_username},
    ics::IcsGenerator,
    providers::Provider,
    semester::SemesterDetector,
};

/// 已生成日历的复用期限
pub const CALENDAR_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 3600);

/// 一次生成或命中缓存的结果
#[derive(Debug, Clone)]
pub struct GeneratedCalendar {
    pub path: PathBuf,
    pub content: String,
    pub event_count: Option<usize>,
    pub from_cache: bool,
}

/// 按键串行化的异步锁
#[derive(Default)]
struct KeyedLocks {
    inner: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut map = self
                .inner
                .lock()
                .map_err(|_| Error::Internal("calendar lock table poisoned".to_string()))?;
            // 顺带清理没有人持有的锁
            map.retain(|k, v| k == key || Arc::strong_count(v) > 1);
            map.entry(key.to_string()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }
}

/// 登录、拉取整学期课表、生成并保存日历
pub struct CalendarService<P: Provider, S: CalendarStore> {
    provider: P,
    store: S,
    locks: KeyedLocks,
    term: Option<AcademicTerm>,
}

impl<P: Provider, S: CalendarStore> CalendarService<P, S> {
    pub fn new(provider: P, store: S) -> Self {
        Self {
            provider,
            store,
            locks: KeyedLocks::default(),
            term: None,
        }
    }

    /// 固定学年学期，不再按当前日期推算
    #[must_use]
    pub fn with_term(mut self, term: AcademicTerm) -> Self {
        self.term = Some(term);
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_term(&self) -> AcademicTerm {
        self.term
            .clone()
            .unwrap_or_else(|| SemesterDetector::detect_current(&self.provider.timezone()))
    }

    /// 只验证凭据
    pub async fn verify(&self, credentials: &Credentials) -> Result<P::Token> {
        self.provider.authenticate(credentials).await
    }

    /// 重新生成日历
    pub async fn generate(
        &self,
        credentials: &Credentials,
        trigger: u32,
    ) -> Result<GeneratedCalendar> {
        validate_username(&credentials.username)?;
        let sidecar = SidecarConfig::new(&credentials.username, &credentials.password, trigger)?;
        let _guard = self.locks.lock(&credentials.username).await?;
        self.generate_locked(credentials, &sidecar).await
    }

    /// 七天内生成过且配置一致时直接复用，否则重新生成
    pub async fn get_or_generate(
        &self,
        credentials: &Credentials,
        trigger: u32,
    ) -> Result<GeneratedCalendar> {
        validate_username(&credentials.username)?;
        let sidecar = SidecarConfig::new(&credentials.username, &credentials.password, trigger)?;
        let _guard = self.locks.lock(&credentials.username).await?;

        if let Some(stored) = self
            .store
            .load_fresh(&credentials.username, CALENDAR_MAX_AGE)
            .await?
        {
            let matches = stored.sidecar.as_ref().is_some_and(|saved| {
                saved.password == sidecar.password && saved.trigger == sidecar.trigger
            });
            if matches {
                tracing::info!("命中 {} 的日历缓存", credentials.username);
                return Ok(GeneratedCalendar {
                    path: stored.path,
                    content: stored.content,
                    event_count: None,
                    from_cache: true,
                });
            }
            tracing::debug!("{} 的缓存配置不一致，重新生成", credentials.username);
        }

        self.generate_locked(credentials, &sidecar).await
    }

    async fn generate_locked(
        &self,
        credentials: &Credentials,
        sidecar: &SidecarConfig,
    ) -> Result<GeneratedCalendar> {
        let token = self.provider.authenticate(credentials).await?;

        let term = self.current_term();
        tracing::info!(
            "开始生成课程表: 用户={}, 学年={}, 学期={}",
            credentials.username,
            term.year,
            term.term
        );
        let events = self.provider.get_term(&term, &token).await?;

        let content =
            IcsGenerator::with_title(term.calendar_title(), sidecar.trigger).generate(&events);
        let path = self
            .store
            .save(&credentials.username, &content, sidecar)
            .await?;

        Ok(GeneratedCalendar {
            path,
            content,
            event_count: Some(events.len()),
            from_cache: false,
        })
    }
}
