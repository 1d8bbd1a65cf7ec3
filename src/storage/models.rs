use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 外部分类流程写入的标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Classification {
    Threat,
    Opportunity,
    Neutral,
    #[serde(rename = "Error: Unknown")]
    Error,
    /// 尚未分类（空字符串或 NULL）
    #[serde(rename = "")]
    Pending,
    #[serde(rename = "OUTDATED")]
    Outdated,
}

impl Classification {
    pub const ERROR_LABEL: &'static str = "Error: Unknown";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Threat => "Threat",
            Self::Opportunity => "Opportunity",
            Self::Neutral => "Neutral",
            Self::Error => Self::ERROR_LABEL,
            Self::Pending => "",
            Self::Outdated => "OUTDATED",
        }
    }

    /// 无法识别的标签一律视为分类错误
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(str::trim) {
            None | Some("") => Self::Pending,
            Some("Threat") => Self::Threat,
            Some("Opportunity") => Self::Opportunity,
            Some("Neutral") => Self::Neutral,
            Some("OUTDATED") => Self::Outdated,
            Some(_) => Self::Error,
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArticleStatus {
    Pending,
    Sent,
    Failed,
    Outdated,
}

impl ArticleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Sent => "SENT",
            Self::Failed => "FAILED",
            Self::Outdated => "OUTDATED",
        }
    }

    /// 分类流程会写入 `FAILED (no response)` 之类的细分状态，统一归为 Failed
    pub fn from_db(raw: &str) -> Option<Self> {
        match raw.trim() {
            "PENDING" => Some(Self::Pending),
            "SENT" => Some(Self::Sent),
            "OUTDATED" => Some(Self::Outdated),
            s if s.starts_with("FAILED") => Some(Self::Failed),
            _ => None,
        }
    }
}

/// articles 表的一行，原样读出
#[derive(Debug, Clone, FromRow)]
pub struct ArticleRow {
    pub id: i64,
    pub status: String,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
    pub classification: Option<String>,
    pub classification_date: Option<DateTime<Utc>>,
    pub explanation: Option<String>,
    pub reasoning: Option<String>,
    pub starred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub status: ArticleStatus,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
    pub classification: Classification,
    pub classification_date: Option<DateTime<Utc>>,
    pub explanation: Option<String>,
    pub reasoning: Option<String>,
    pub starred: bool,
}

impl TryFrom<ArticleRow> for Article {
    type Error = sqlx::Error;

    fn try_from(row: ArticleRow) -> Result<Self, Self::Error> {
        let status = ArticleStatus::from_db(&row.status).ok_or_else(|| {
            sqlx::Error::Decode(format!("未知的文章状态: {}", row.status).into())
        })?;

        Ok(Self {
            id: row.id,
            status,
            title: row.title,
            link: row.link,
            summary: row.summary,
            date_published: row.date_published,
            source: row.source,
            date_added: row.date_added,
            classification: Classification::from_label(row.classification.as_deref()),
            classification_date: row.classification_date,
            explanation: row.explanation,
            reasoning: row.reasoning,
            starred: row.starred,
        })
    }
}

/// 写入新文章所需的字段
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub date_added: Option<DateTime<Utc>>,
    pub status: ArticleStatus,
    pub classification: Classification,
    pub classification_date: Option<DateTime<Utc>>,
    pub explanation: Option<String>,
    pub starred: bool,
}

impl NewArticle {
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            summary: None,
            date_published: None,
            source: None,
            date_added: None,
            status: ArticleStatus::Pending,
            classification: Classification::Pending,
            classification_date: None,
            explanation: None,
            starred: false,
        }
    }
}
