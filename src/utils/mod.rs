pub mod clock;
pub mod logger;

use thiserror::Error;

pub use clock::ReferenceClock;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("参数校验失败 [{field}]: {message}")]
    Validation { field: &'static str, message: String },

    #[error("数据库错误: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("未提供用户身份")]
    Unauthorized,

    #[error("配置错误: {0}")]
    ConfigError(String),
}

impl DashboardError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type DashboardResult<T> = Result<T, DashboardError>;
