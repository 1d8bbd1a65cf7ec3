//! 文章列表：过滤、排序、分页
//!
//! 过滤在 SQL 中完成，排序与分页在内存中完成。排序字段是封闭的枚举，
//! 每个字段对应一个显式的比较函数。

use std::cmp::Ordering;
use std::num::NonZeroUsize;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use crate::storage::database::{ARTICLE_COLUMNS, LIVE_PREDICATE};
use crate::storage::models::ArticleRow;
use crate::storage::{Article, Classification, Database};
use crate::utils::{DashboardError, DashboardResult, ReferenceClock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingFilter {
    All,
    Threat,
    Opportunity,
    Neutral,
    /// 尚未分类或仍处于 PENDING 状态
    Backlog,
    Starred,
    Today,
    UserUploaded,
}

impl FromStr for ListingFilter {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "threat" | "threats" => Ok(Self::Threat),
            "opportunity" | "opportunities" => Ok(Self::Opportunity),
            "neutral" => Ok(Self::Neutral),
            "backlog" => Ok(Self::Backlog),
            "starred" => Ok(Self::Starred),
            "today" => Ok(Self::Today),
            "user_uploaded" | "user-uploaded" | "uploaded" => Ok(Self::UserUploaded),
            other => Err(DashboardError::validation(
                "filter",
                format!("未知的列表过滤条件 {other:?}"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Classification,
    Title,
    DatePublished,
    Source,
}

impl FromStr for SortField {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Self::Classification),
            "title" => Ok(Self::Title),
            "date_published" | "datepublished" => Ok(Self::DatePublished),
            "source" => Ok(Self::Source),
            other => Err(DashboardError::validation(
                "sort",
                format!("不支持按 {other:?} 排序"),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
    None,
}

impl FromStr for SortDirection {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Ascending),
            "desc" | "descending" => Ok(Self::Descending),
            "" | "none" => Ok(Self::None),
            other => Err(DashboardError::validation(
                "dir",
                format!("排序方向必须是 asc、desc 或 none，收到 {other:?}"),
            )),
        }
    }
}

/// 当前排序状态；没有字段时保持存储顺序（最新加入的在前）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    field: Option<SortField>,
    direction: Option<SortDirection>,
}

impl SortState {
    pub fn unsorted() -> Self {
        Self::default()
    }

    pub fn new(field: SortField, direction: SortDirection) -> Self {
        match direction {
            SortDirection::None => Self::unsorted(),
            direction => Self {
                field: Some(field),
                direction: Some(direction),
            },
        }
    }

    pub fn field(&self) -> Option<SortField> {
        self.field
    }

    pub fn direction(&self) -> SortDirection {
        self.direction.unwrap_or(SortDirection::None)
    }

    /// 点击列头：升序 -> 降序 -> 取消排序；换列时从升序开始
    pub fn toggle(self, field: SortField) -> Self {
        match (self.field, self.direction()) {
            (Some(current), SortDirection::Ascending) if current == field => {
                Self::new(field, SortDirection::Descending)
            }
            (Some(current), _) if current == field => Self::unsorted(),
            _ => Self::new(field, SortDirection::Ascending),
        }
    }
}

/// 比较两个可能缺失的值，缺失值无论升降序都排在最后
fn compare_nulls_last<K: Ord>(a: Option<K>, b: Option<K>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Descending => b.cmp(&a),
            _ => a.cmp(&b),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn text_key(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

impl SortField {
    pub fn compare(&self, a: &Article, b: &Article, direction: SortDirection) -> Ordering {
        match self {
            Self::Classification => compare_nulls_last(
                classification_key(a.classification),
                classification_key(b.classification),
                direction,
            ),
            Self::Title => compare_nulls_last(
                text_key(Some(&a.title)),
                text_key(Some(&b.title)),
                direction,
            ),
            Self::DatePublished => compare_nulls_last(a.date_published, b.date_published, direction),
            Self::Source => compare_nulls_last(
                text_key(a.source.as_deref()),
                text_key(b.source.as_deref()),
                direction,
            ),
        }
    }
}

fn classification_key(classification: Classification) -> Option<String> {
    match classification {
        Classification::Pending => None,
        other => text_key(Some(other.as_str())),
    }
}

/// 稳定排序，相等元素保持原有顺序
pub fn sort_articles(articles: &mut [Article], sort: SortState) {
    if let Some(field) = sort.field() {
        let direction = sort.direction();
        articles.sort_by(|a, b| field.compare(a, b, direction));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSize {
    /// 不分页
    All,
    Limited(NonZeroUsize),
}

impl FromStr for PageSize {
    type Err = DashboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<NonZeroUsize>().map(Self::Limited).map_err(|_| {
            DashboardError::validation("pageSize", format!("必须是正整数或 all，收到 {s:?}"))
        })
    }
}

impl Serialize for PageSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Limited(size) => serializer.serialize_u64(size.get() as u64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub size: PageSize,
    /// 从 1 开始
    pub index: NonZeroUsize,
}

impl PageRequest {
    pub fn new(size: PageSize, index: usize) -> DashboardResult<Self> {
        let index = NonZeroUsize::new(index)
            .ok_or_else(|| DashboardError::validation("page", "页码从 1 开始"))?;
        Ok(Self { size, index })
    }

    pub fn first(size: PageSize) -> Self {
        Self {
            size,
            index: NonZeroUsize::MIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 分页前的匹配总数
    pub total: usize,
    pub page: usize,
    pub page_size: PageSize,
}

impl<T> Page<T> {
    pub fn empty(request: PageRequest) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: request.index.get(),
            page_size: request.size,
        }
    }

    pub fn page_count(&self) -> usize {
        match self.page_size {
            PageSize::All => usize::from(self.total > 0),
            PageSize::Limited(size) => self.total.div_ceil(size.get()),
        }
    }
}

/// 页码越界时返回空页
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> Page<T> {
    let total = items.len();
    let index = request.index.get();

    let items = match request.size {
        PageSize::All if index == 1 => items,
        PageSize::All => Vec::new(),
        PageSize::Limited(size) => {
            let start = (index - 1).saturating_mul(size.get());
            items.into_iter().skip(start).take(size.get()).collect()
        }
    };

    Page {
        items,
        total,
        page: index,
        page_size: request.size,
    }
}

#[derive(Clone)]
pub struct ListingEngine {
    db: Database,
    backlog_limit: u32,
    user_upload_source: String,
}

impl ListingEngine {
    pub fn new(db: Database, backlog_limit: u32, user_upload_source: impl Into<String>) -> Self {
        Self {
            db,
            backlog_limit,
            user_upload_source: user_upload_source.into(),
        }
    }

    pub async fn list_articles(
        &self,
        clock: &ReferenceClock,
        filter: ListingFilter,
        sort: SortState,
        page: PageRequest,
    ) -> DashboardResult<Page<Article>> {
        let mut articles = self.fetch(clock, filter).await?;
        sort_articles(&mut articles, sort);

        let page = paginate(articles, page);
        debug!(
            ?filter,
            sort = ?sort.field(),
            total = page.total,
            returned = page.items.len(),
            "文章列表完成"
        );
        Ok(page)
    }

    pub async fn get_article(&self, id: i64) -> DashboardResult<Option<Article>> {
        self.db.get_article(id).await
    }

    pub async fn set_starred(&self, id: i64, starred: bool) -> DashboardResult<bool> {
        let found = self.db.set_starred(id, starred).await?;
        debug!(id, starred, found, "更新收藏标记");
        Ok(found)
    }

    async fn fetch(
        &self,
        clock: &ReferenceClock,
        filter: ListingFilter,
    ) -> DashboardResult<Vec<Article>> {
        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE {LIVE_PREDICATE}"
        ));

        match filter {
            ListingFilter::All => {}
            ListingFilter::Threat => {
                query.push(" AND classification = ").push_bind(Classification::Threat.as_str());
            }
            ListingFilter::Opportunity => {
                query
                    .push(" AND classification = ")
                    .push_bind(Classification::Opportunity.as_str());
            }
            ListingFilter::Neutral => {
                query.push(" AND classification = ").push_bind(Classification::Neutral.as_str());
            }
            ListingFilter::Backlog => {
                query.push(" AND (COALESCE(classification, '') = '' OR status = 'PENDING')");
            }
            ListingFilter::Starred => {
                query.push(" AND starred");
            }
            ListingFilter::Today => {
                query
                    .push(" AND date(date_published, ")
                    .push_bind(clock.sqlite_modifier())
                    .push(") = ")
                    .push_bind(clock.today().format("%Y-%m-%d").to_string());
            }
            ListingFilter::UserUploaded => {
                query.push(" AND source = ").push_bind(self.user_upload_source.clone());
            }
        }

        query.push(" ORDER BY julianday(date_added) DESC, id DESC");
        if filter == ListingFilter::Backlog {
            query.push(" LIMIT ").push_bind(i64::from(self.backlog_limit));
        }

        let rows = query
            .build_query_as::<ArticleRow>()
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .into_iter()
            .map(Article::try_from)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
