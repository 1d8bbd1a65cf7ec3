//! 统计汇总与时间序列
//!
//! 计数和按时间分桶都在 SQL 中完成；参考时刻与时区由调用方通过
//! [`ReferenceClock`] 传入。已过期（OUTDATED）的文章不参与任何统计。

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use tracing::debug;

use crate::storage::database::LIVE_PREDICATE;
use crate::storage::Database;
use crate::utils::{DashboardError, DashboardResult, ReferenceClock};

/// 仪表盘顶部的计数器
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: i64,
    pub threats: i64,
    pub opportunities: i64,
    pub neutral: i64,
    pub unclassified: i64,
    pub articles_today: i64,
    pub starred: i64,
    pub new_since_last_visit: i64,
}

/// 趋势图的一个桶
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: NaiveDate,
    pub threats: i64,
    pub opportunities: i64,
    pub neutral: i64,
}

impl ChartPoint {
    pub fn total(&self) -> i64 {
        self.threats + self.opportunities + self.neutral
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityPoint {
    pub date: NaiveDate,
    pub published: i64,
    pub classified: i64,
}

/// 趋势分桶粒度，按日历边界对齐（周从周一开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Day,
    Week,
    Month,
}

impl Bucket {
    /// 第一个参数位是时区修饰符
    fn sql_expr(&self) -> &'static str {
        match self {
            Self::Day => "date(date_published, ?)",
            Self::Week => "date(date_published, ?, 'weekday 0', '-6 days')",
            Self::Month => "date(date_published, ?, 'start of month')",
        }
    }
}

impl FromStr for Bucket {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(DashboardError::validation(
                "bucket",
                format!("必须是 day、week 或 month，收到 {other:?}"),
            )),
        }
    }
}

/// 某一天的计数，来自单独一次分组查询
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// 按日期合并发布数与分类数，缺失的一侧记为 0
///
/// 结果与两个来源的处理先后无关。
#[derive(Debug, Default)]
pub struct ActivityFold {
    days: BTreeMap<NaiveDate, (i64, i64)>,
}

impl ActivityFold {
    pub fn add_published(&mut self, counts: impl IntoIterator<Item = DayCount>) -> &mut Self {
        for day in counts {
            self.days.entry(day.date).or_default().0 += day.count;
        }
        self
    }

    pub fn add_classified(&mut self, counts: impl IntoIterator<Item = DayCount>) -> &mut Self {
        for day in counts {
            self.days.entry(day.date).or_default().1 += day.count;
        }
        self
    }

    pub fn into_points(self) -> Vec<ActivityPoint> {
        self.days
            .into_iter()
            .map(|(date, (published, classified))| ActivityPoint {
                date,
                published,
                classified,
            })
            .collect()
    }
}

pub fn merge_activity(published: Vec<DayCount>, classified: Vec<DayCount>) -> Vec<ActivityPoint> {
    let mut fold = ActivityFold::default();
    fold.add_published(published).add_classified(classified);
    fold.into_points()
}

#[derive(FromRow)]
struct TrendRow {
    bucket: String,
    threats: i64,
    opportunities: i64,
    neutral: i64,
}

#[derive(FromRow)]
struct DayRow {
    day: String,
    n: i64,
}

#[derive(Debug, Clone, Copy)]
enum DateColumn {
    Published,
    Classified,
}

impl DateColumn {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Published => "date_published",
            Self::Classified => "classification_date",
        }
    }
}

fn parse_day(raw: &str) -> DashboardResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        DashboardError::DatabaseError(sqlx::Error::Decode(
            format!("无法解析日期 {raw:?}: {e}").into(),
        ))
    })
}

#[derive(Clone)]
pub struct AggregationEngine {
    db: Database,
    max_window_days: u32,
}

impl AggregationEngine {
    pub fn new(db: Database, max_window_days: u32) -> Self {
        Self {
            db,
            max_window_days,
        }
    }

    pub fn validate_window(&self, days: u32) -> DashboardResult<u32> {
        if days == 0 || days > self.max_window_days {
            return Err(DashboardError::validation(
                "days",
                format!("必须在 1 到 {} 之间，收到 {days}", self.max_window_days),
            ));
        }
        Ok(days)
    }

    pub async fn compute_stats(
        &self,
        clock: &ReferenceClock,
        visit_watermark: DateTime<Utc>,
    ) -> DashboardResult<Stats> {
        let today = clock.today().format("%Y-%m-%d").to_string();

        let stats = sqlx::query_as::<_, Stats>(&format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN classification = 'Threat' THEN 1 ELSE 0 END), 0) AS threats,
                COALESCE(SUM(CASE WHEN classification = 'Opportunity' THEN 1 ELSE 0 END), 0) AS opportunities,
                COALESCE(SUM(CASE WHEN classification = 'Neutral' THEN 1 ELSE 0 END), 0) AS neutral,
                COALESCE(SUM(CASE WHEN COALESCE(classification, '') IN ('', 'Error: Unknown') THEN 1 ELSE 0 END), 0) AS unclassified,
                COALESCE(SUM(CASE WHEN date(date_published, ?) = ? THEN 1 ELSE 0 END), 0) AS articles_today,
                COALESCE(SUM(CASE WHEN starred THEN 1 ELSE 0 END), 0) AS starred,
                COALESCE(SUM(CASE WHEN julianday(date_published) > julianday(?) THEN 1 ELSE 0 END), 0) AS new_since_last_visit
            FROM articles
            WHERE {LIVE_PREDICATE}
            "#
        ))
        .bind(clock.sqlite_modifier())
        .bind(&today)
        .bind(visit_watermark)
        .fetch_one(self.db.pool())
        .await?;

        debug!(total = stats.total, today = %today, "统计计数完成");
        Ok(stats)
    }

    /// 时间窗口内已分类文章的分桶计数，只返回非空桶
    pub async fn compute_trend_series(
        &self,
        clock: &ReferenceClock,
        window_days: u32,
        bucket: Bucket,
    ) -> DashboardResult<Vec<ChartPoint>> {
        let window_days = self.validate_window(window_days)?;
        let window_start = clock.window_start(window_days)?;

        let rows = sqlx::query_as::<_, TrendRow>(&format!(
            r#"
            SELECT
                {expr} AS bucket,
                SUM(CASE WHEN classification = 'Threat' THEN 1 ELSE 0 END) AS threats,
                SUM(CASE WHEN classification = 'Opportunity' THEN 1 ELSE 0 END) AS opportunities,
                SUM(CASE WHEN classification = 'Neutral' THEN 1 ELSE 0 END) AS neutral
            FROM articles
            WHERE {LIVE_PREDICATE}
              AND classification IN ('Threat', 'Opportunity', 'Neutral')
              AND date_published IS NOT NULL
              AND julianday(date_published) BETWEEN julianday(?) AND julianday(?)
            GROUP BY bucket
            HAVING bucket IS NOT NULL
            ORDER BY bucket ASC
            "#,
            expr = bucket.sql_expr(),
        ))
        .bind(clock.sqlite_modifier())
        .bind(window_start)
        .bind(clock.now)
        .fetch_all(self.db.pool())
        .await?;

        let points = rows
            .into_iter()
            .map(|row| {
                Ok(ChartPoint {
                    date: parse_day(&row.bucket)?,
                    threats: row.threats,
                    opportunities: row.opportunities,
                    neutral: row.neutral,
                })
            })
            .collect::<DashboardResult<Vec<_>>>()?;

        debug!(?bucket, window_days, buckets = points.len(), "趋势序列完成");
        Ok(points)
    }

    /// 每天的发布数与分类数，两次独立分组后按日期合并
    pub async fn compute_activity_series(
        &self,
        clock: &ReferenceClock,
        window_days: u32,
    ) -> DashboardResult<Vec<ActivityPoint>> {
        let window_days = self.validate_window(window_days)?;

        let (published, classified) = tokio::try_join!(
            self.daily_counts(DateColumn::Published, clock, window_days),
            self.daily_counts(DateColumn::Classified, clock, window_days),
        )?;

        let points = merge_activity(published, classified);
        debug!(window_days, days = points.len(), "活动序列完成");
        Ok(points)
    }

    async fn daily_counts(
        &self,
        column: DateColumn,
        clock: &ReferenceClock,
        window_days: u32,
    ) -> DashboardResult<Vec<DayCount>> {
        let window_start = clock.window_start(window_days)?;
        let rows = sqlx::query_as::<_, DayRow>(&format!(
            r#"
            SELECT date({col}, ?) AS day, COUNT(*) AS n
            FROM articles
            WHERE {LIVE_PREDICATE}
              AND {col} IS NOT NULL
              AND julianday({col}) BETWEEN julianday(?) AND julianday(?)
            GROUP BY day
            HAVING day IS NOT NULL
            "#,
            col = column.as_str(),
        ))
        .bind(clock.sqlite_modifier())
        .bind(window_start)
        .bind(clock.now)
        .fetch_all(self.db.pool())
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DayCount {
                    date: parse_day(&row.day)?,
                    count: row.n,
                })
            })
            .collect()
    }
}
