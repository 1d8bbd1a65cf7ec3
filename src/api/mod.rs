//! 面向展示层的读接口
//!
//! 原始字符串参数在这里校验成强类型请求，任何存储访问之前就会拒绝非法参数。
//! [`Dashboard::load`] 是展示层边界：单个部分失败时记录警告并回退为空数据，
//! 其余接口把错误原样返回。

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::{ActivityPoint, AggregationEngine, Bucket, ChartPoint, Stats};
use crate::config::DashboardConfig;
use crate::listing::{
    ListingEngine, ListingFilter, Page, PageRequest, PageSize, SortDirection, SortField, SortState,
};
use crate::storage::{Article, Database};
use crate::utils::{DashboardError, DashboardResult, ReferenceClock};
use crate::visits::{AdvanceOutcome, UserId, VisitTracker};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrendParams {
    pub days: Option<u32>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityParams {
    pub days: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub dir: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingRequest {
    pub filter: ListingFilter,
    pub sort: SortState,
    pub page: PageRequest,
}

impl ArticleQuery {
    pub fn validate(&self, config: &DashboardConfig) -> DashboardResult<ListingRequest> {
        let filter = match self.filter.as_deref() {
            Some(raw) => raw.parse()?,
            None => ListingFilter::All,
        };

        let direction = match self.dir.as_deref() {
            Some(raw) => Some(raw.parse::<SortDirection>()?),
            None => None,
        };
        let sort = match (self.sort.as_deref(), direction) {
            (Some(field), direction) => SortState::new(
                field.parse::<SortField>()?,
                direction.unwrap_or(SortDirection::Ascending),
            ),
            (None, None | Some(SortDirection::None)) => SortState::unsorted(),
            (None, Some(_)) => {
                return Err(DashboardError::validation("sort", "指定了排序方向但没有排序字段"))
            }
        };

        let size = match self.page_size.as_deref() {
            Some(raw) => raw.parse()?,
            None => default_page_size(config),
        };
        let page = PageRequest::new(size, self.page.unwrap_or(1))?;

        Ok(ListingRequest { filter, sort, page })
    }
}

fn default_page_size(config: &DashboardConfig) -> PageSize {
    std::num::NonZeroUsize::new(config.default_page_size)
        .map(PageSize::Limited)
        .unwrap_or(PageSize::All)
}

/// 一次仪表盘加载所需的全部参数
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub trend: TrendParams,
    #[serde(default)]
    pub activity: ActivityParams,
    #[serde(default)]
    pub articles: ArticleQuery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub stats: Stats,
    pub trend: Vec<ChartPoint>,
    pub activity: Vec<ActivityPoint>,
    pub articles: Page<Article>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
}

pub struct Dashboard {
    aggregation: AggregationEngine,
    listing: ListingEngine,
    visits: VisitTracker,
    config: DashboardConfig,
    offset: FixedOffset,
}

impl Dashboard {
    pub fn new(db: Database, config: DashboardConfig) -> DashboardResult<Self> {
        let offset = config.offset()?;
        Ok(Self {
            aggregation: AggregationEngine::new(db.clone(), config.max_window_days),
            listing: ListingEngine::new(
                db.clone(),
                config.backlog_limit,
                config.user_upload_source.clone(),
            ),
            visits: VisitTracker::new(db),
            config,
            offset,
        })
    }

    /// 指定参考时刻，时区取自配置
    pub fn clock_at(&self, now: DateTime<Utc>) -> ReferenceClock {
        ReferenceClock::new(now, self.offset)
    }

    pub fn clock(&self) -> ReferenceClock {
        ReferenceClock::system(self.offset)
    }

    fn trend_request(&self, params: &TrendParams) -> DashboardResult<(u32, Bucket)> {
        let days = self
            .aggregation
            .validate_window(params.days.unwrap_or(self.config.default_trend_days))?;
        let bucket = match params.bucket.as_deref() {
            Some(raw) => raw.parse()?,
            None => Bucket::Day,
        };
        Ok((days, bucket))
    }

    fn activity_days(&self, params: &ActivityParams) -> DashboardResult<u32> {
        self.aggregation
            .validate_window(params.days.unwrap_or(self.config.default_activity_days))
    }

    /// 只读取水位线，不推进
    pub async fn stats(
        &self,
        clock: &ReferenceClock,
        user: Option<&UserId>,
    ) -> DashboardResult<Stats> {
        let watermark = self.visits.read_watermark(user).await?;
        self.aggregation.compute_stats(clock, watermark).await
    }

    pub async fn trend(
        &self,
        clock: &ReferenceClock,
        params: &TrendParams,
    ) -> DashboardResult<Vec<ChartPoint>> {
        let (days, bucket) = self.trend_request(params)?;
        self.aggregation.compute_trend_series(clock, days, bucket).await
    }

    pub async fn activity(
        &self,
        clock: &ReferenceClock,
        params: &ActivityParams,
    ) -> DashboardResult<Vec<ActivityPoint>> {
        let days = self.activity_days(params)?;
        self.aggregation.compute_activity_series(clock, days).await
    }

    pub async fn articles(
        &self,
        clock: &ReferenceClock,
        query: &ArticleQuery,
    ) -> DashboardResult<Page<Article>> {
        let request = query.validate(&self.config)?;
        self.listing
            .list_articles(clock, request.filter, request.sort, request.page)
            .await
    }

    pub async fn article(&self, id: i64) -> DashboardResult<Option<Article>> {
        self.listing.get_article(id).await
    }

    pub async fn set_starred(&self, id: i64, starred: bool) -> DashboardResult<bool> {
        self.listing.set_starred(id, starred).await
    }

    pub async fn advance_visit(
        &self,
        clock: &ReferenceClock,
        user: Option<&UserId>,
    ) -> DashboardResult<AdvanceResponse> {
        match self.visits.advance_watermark(user, clock.now).await? {
            AdvanceOutcome::Advanced => Ok(AdvanceResponse { success: true }),
            AdvanceOutcome::NoIdentity => Err(DashboardError::Unauthorized),
        }
    }

    /// 一次完整的仪表盘加载
    ///
    /// 先读水位线再计算统计；推进水位线与统计并发执行，只影响下一次加载，
    /// 推进失败不影响本次结果。
    pub async fn load(
        &self,
        clock: &ReferenceClock,
        user: Option<&UserId>,
        query: &DashboardQuery,
    ) -> DashboardResult<DashboardSnapshot> {
        let (trend_days, bucket) = self.trend_request(&query.trend)?;
        let activity_days = self.activity_days(&query.activity)?;
        let listing = query.articles.validate(&self.config)?;

        let stats = async {
            let watermark = self.visits.read_watermark(user).await?;
            let (stats, advanced) = tokio::join!(
                self.aggregation.compute_stats(clock, watermark),
                self.visits.advance_watermark(user, clock.now),
            );
            if let Err(e) = advanced {
                warn!(part = "advance", error = %e, "推进上次访问时间失败");
            }
            stats
        };

        let (stats, trend, activity, articles) = tokio::join!(
            stats,
            self.aggregation.compute_trend_series(clock, trend_days, bucket),
            self.aggregation.compute_activity_series(clock, activity_days),
            self.listing
                .list_articles(clock, listing.filter, listing.sort, listing.page),
        );

        let snapshot = DashboardSnapshot {
            stats: or_fallback("stats", stats),
            trend: or_fallback("trend", trend),
            activity: or_fallback("activity", activity),
            articles: articles.unwrap_or_else(|e| {
                warn!(part = "articles", error = %e, "加载失败，使用空数据");
                Page::empty(listing.page)
            }),
        };

        info!(
            total = snapshot.stats.total,
            new_since_last_visit = snapshot.stats.new_since_last_visit,
            "仪表盘加载完成"
        );
        Ok(snapshot)
    }
}

fn or_fallback<T: Default>(part: &'static str, result: DashboardResult<T>) -> T {
    result.unwrap_or_else(|e| {
        warn!(part, error = %e, "加载失败，使用空数据");
        T::default()
    })
}
