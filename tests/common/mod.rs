#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use newsradar::config::DashboardConfig;
use newsradar::{
    ArticleStatus, Classification, Dashboard, Database, NewArticle, ReferenceClock,
};

pub async fn test_db() -> Database {
    let db = Database::new("sqlite::memory:", 1).await.unwrap();
    db.init_schema().await.unwrap();
    db
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn clock(now: DateTime<Utc>) -> ReferenceClock {
    ReferenceClock::new(now, FixedOffset::east_opt(0).unwrap())
}

pub fn utc_config() -> DashboardConfig {
    DashboardConfig {
        timezone_offset: "+00:00".to_string(),
        ..DashboardConfig::default()
    }
}

pub fn dashboard(db: &Database) -> Dashboard {
    Dashboard::new(db.clone(), utc_config()).unwrap()
}

pub fn article(link: &str) -> NewArticle {
    NewArticle::new(format!("Article {link}"), format!("https://news.example/{link}"))
}

pub fn classified(
    link: &str,
    classification: Classification,
    published: Option<DateTime<Utc>>,
) -> NewArticle {
    NewArticle {
        status: ArticleStatus::Sent,
        classification,
        date_published: published,
        ..article(link)
    }
}

pub async fn insert(db: &Database, article: NewArticle) -> i64 {
    db.insert_article(&article)
        .await
        .unwrap()
        .expect("link should be new")
}
