pub mod base;
pub mod buaa;

use std::ops::RangeInclusive;

use async_trait::async_trait;
use chrono::FixedOffset;

use crate::{AcademicTerm, Credentials, NormalizedEvent, Result, WeekQuery};

pub use base::*;

/// 一个学期的教学周
pub const TERM_WEEKS: RangeInclusive<u32> = 1..=19;

/// 数据提供者trait
#[async_trait]
pub trait Provider: Send + Sync {
    /// 登录后得到的会话类型
    type Token: Send + Sync;

    /// Provider name
    fn name(&self) -> &str;

    /// Provider description
    fn description(&self) -> &str;

    /// 课表所在时区
    fn timezone(&self) -> FixedOffset;

    /// 登录并获取会话
    ///
    /// 凭据错误返回 [`crate::Error::Authentication`]，网络问题返回其它错误。
    async fn authenticate(&self, credentials: &Credentials) -> Result<Self::Token>;

    /// 获取一周的课程；响应异常时返回空列表
    async fn get_week(
        &self,
        query: WeekQuery<'_>,
        token: &Self::Token,
    ) -> Result<Vec<NormalizedEvent>>;

    /// 依次获取整个学期的课程并按周拼接
    async fn get_term(
        &self,
        term: &AcademicTerm,
        token: &Self::Token,
    ) -> Result<Vec<NormalizedEvent>> {
        let mut events = Vec::new();
        for week in TERM_WEEKS {
            let week_events = self.get_week(WeekQuery { term, week }, token).await?;
            tracing::debug!("第 {} 周: {} 节课", week, week_events.len());
            events.extend(week_events);
        }
        tracing::info!(
            "{} 第 {} 学期共获取 {} 节课",
            term.year,
            term.term,
            events.len()
        );
        Ok(events)
    }
}
