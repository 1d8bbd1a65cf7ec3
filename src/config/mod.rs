use anyhow::Result;
use chrono::FixedOffset;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::utils::{clock, DashboardResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    pub database_path: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DashboardConfig {
    /// 参考时区，`±HH:MM`
    pub timezone_offset: String,
    /// 待分类列表最多扫描的行数（按加入时间倒序）
    pub backlog_limit: u32,
    pub default_trend_days: u32,
    pub default_activity_days: u32,
    pub max_window_days: u32,
    pub default_page_size: usize,
    /// 用户手动上传的文章使用的 source 值
    pub user_upload_source: String,
    #[serde(default)]
    pub default_user: Option<String>,
}

impl AppConfig {
    /// 默认值 < config/settings.toml < NEWSRADAR__ 前缀的环境变量
    pub fn load() -> Result<Self> {
        let settings = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("NEWSRADAR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn database_url(&self) -> String {
        format!("sqlite:{}", self.storage.database_path)
    }
}

impl DashboardConfig {
    pub fn offset(&self) -> DashboardResult<FixedOffset> {
        clock::parse_offset(&self.timezone_offset)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_path: "./data/articles.db".to_string(),
                max_connections: 5,
            },
            dashboard: DashboardConfig::default(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            timezone_offset: "+01:00".to_string(),
            backlog_limit: 500,
            default_trend_days: 7,
            default_activity_days: 90,
            max_window_days: 3650,
            default_page_size: 20,
            user_upload_source: "User Upload".to_string(),
            default_user: None,
        }
    }
}
