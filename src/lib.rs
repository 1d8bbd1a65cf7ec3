//! 文章分类仪表盘的统计与列表读模型

pub mod analytics;
pub mod api;
pub mod config;
pub mod listing;
pub mod storage;
pub mod utils;
pub mod visits;

pub use analytics::{ActivityPoint, AggregationEngine, Bucket, ChartPoint, Stats};
pub use api::{ArticleQuery, Dashboard, DashboardQuery, DashboardSnapshot};
pub use config::AppConfig;
pub use listing::{
    ListingEngine, ListingFilter, Page, PageRequest, PageSize, SortDirection, SortField, SortState,
};
pub use storage::{Article, ArticleStatus, Classification, Database, NewArticle};
pub use utils::{DashboardError, DashboardResult, ReferenceClock};
pub use visits::{IdentityProvider, StaticIdentity, UserId, VisitTracker};
