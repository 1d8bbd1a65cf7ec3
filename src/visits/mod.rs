//! 每个用户的"上次访问"水位线

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::storage::Database;
use crate::utils::DashboardResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            None
        } else {
            Some(Self(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 身份来源，返回当前请求的用户
pub trait IdentityProvider: Send + Sync {
    fn current_user(&self) -> Option<UserId>;
}

/// 启动时就确定的身份（命令行参数或配置）
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(Option<UserId>);

impl StaticIdentity {
    pub fn new(user: Option<UserId>) -> Self {
        Self(user)
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced,
    /// 没有身份，什么都没写
    NoIdentity,
}

#[derive(Clone)]
pub struct VisitTracker {
    db: Database,
}

impl VisitTracker {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// 没有身份或从未访问过时返回 UNIX 纪元
    pub async fn read_watermark(&self, user: Option<&UserId>) -> DashboardResult<DateTime<Utc>> {
        let Some(user) = user else {
            return Ok(DateTime::<Utc>::UNIX_EPOCH);
        };

        let visit = self.db.read_last_visit(user.as_str()).await?;
        debug!(user = %user, ?visit, "读取上次访问时间");
        Ok(visit.unwrap_or(DateTime::<Utc>::UNIX_EPOCH))
    }

    /// 必须在读取本次统计用的水位线之后调用
    pub async fn advance_watermark(
        &self,
        user: Option<&UserId>,
        now: DateTime<Utc>,
    ) -> DashboardResult<AdvanceOutcome> {
        let Some(user) = user else {
            return Ok(AdvanceOutcome::NoIdentity);
        };

        self.db.write_last_visit(user.as_str(), now).await?;
        info!(user = %user, at = %now, "更新上次访问时间");
        Ok(AdvanceOutcome::Advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_user_ids_are_rejected() {
        assert!(UserId::new("").is_none());
        assert!(UserId::new("   ").is_none());
        assert_eq!(UserId::new("alice").unwrap().as_str(), "alice");
    }

    #[test]
    fn static_identity_returns_configured_user() {
        let identity = StaticIdentity::new(UserId::new("ops"));
        assert_eq!(identity.current_user(), UserId::new("ops"));
        assert_eq!(StaticIdentity::anonymous().current_user(), None);
    }
}
