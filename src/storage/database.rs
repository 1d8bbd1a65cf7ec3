use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{debug, info};

use crate::storage::models::{Article, ArticleRow, NewArticle};
use crate::utils::DashboardResult;

/// 参与统计和列表的"在用"文章
pub const LIVE_PREDICATE: &str =
    "COALESCE(status, '') != 'OUTDATED' AND COALESCE(classification, '') != 'OUTDATED'";

pub const ARTICLE_COLUMNS: &str = "id, status, title, link, summary, date_published, source, \
     date_added, classification, classification_date, explanation, reasoning, starred";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str, max_connections: u32) -> DashboardResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(
                database_url
                    .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                    .create_if_missing(true),
            )
            .await?;

        info!("数据库连接成功: {}", database_url);
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> DashboardResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                status TEXT NOT NULL DEFAULT 'PENDING'
                    CHECK (status IN ('FAILED', 'PENDING', 'SENT', 'OUTDATED')),
                title TEXT NOT NULL,
                link TEXT NOT NULL UNIQUE,
                summary TEXT,
                date_published TEXT,
                source TEXT,
                date_added TEXT DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                classification TEXT DEFAULT ''
                    CHECK (classification IN ('Threat', 'Opportunity', 'Neutral', '', 'OUTDATED', 'Error: Unknown')),
                classification_date TEXT,
                explanation TEXT DEFAULT '',
                reasoning TEXT DEFAULT '',
                starred BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for ddl in [
            "CREATE INDEX IF NOT EXISTS idx_articles_date_published ON articles (date_published)",
            "CREATE INDEX IF NOT EXISTS idx_articles_date_added ON articles (date_added)",
            "CREATE INDEX IF NOT EXISTS idx_articles_classification ON articles (classification)",
        ] {
            sqlx::query(ddl).execute(&self.pool).await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                last_dashboard_visit TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("数据库表结构初始化完成");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 写入文章，link 重复时忽略并返回 None
    pub async fn insert_article(&self, article: &NewArticle) -> DashboardResult<Option<i64>> {
        let result = sqlx::query(
            r#"
            INSERT INTO articles (
                title, link, summary, date_published, source, date_added,
                status, classification, classification_date, explanation, starred
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(link) DO NOTHING
            "#,
        )
        .bind(&article.title)
        .bind(&article.link)
        .bind(&article.summary)
        .bind(article.date_published)
        .bind(&article.source)
        .bind(article.date_added.unwrap_or_else(Utc::now))
        .bind(article.status.as_str())
        .bind(article.classification.as_str())
        .bind(article.classification_date)
        .bind(article.explanation.as_deref().unwrap_or(""))
        .bind(article.starred)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(link = %article.link, "链接已存在，跳过");
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    /// 按 id 查询单篇文章，不存在时返回 None
    pub async fn get_article(&self, id: i64) -> DashboardResult<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRow>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Article::try_from).transpose()?)
    }

    /// 设置收藏标记，返回是否命中该文章
    pub async fn set_starred(&self, id: i64, starred: bool) -> DashboardResult<bool> {
        let result = sqlx::query("UPDATE articles SET starred = ? WHERE id = ?")
            .bind(starred)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn read_last_visit(&self, user_id: &str) -> DashboardResult<Option<DateTime<Utc>>> {
        let visit = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            "SELECT last_dashboard_visit FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(visit.flatten())
    }

    pub async fn write_last_visit(&self, user_id: &str, at: DateTime<Utc>) -> DashboardResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, last_dashboard_visit)
            VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET last_dashboard_visit = excluded.last_dashboard_visit
            "#,
        )
        .bind(user_id)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
