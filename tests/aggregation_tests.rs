mod common;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use common::{article, classified, clock, dashboard, insert, test_db, utc};
use newsradar::api::TrendParams;
use newsradar::{
    ActivityPoint, AggregationEngine, ArticleStatus, Bucket, ChartPoint, Classification,
    DashboardError, Database, NewArticle, ReferenceClock, Stats,
};
use pretty_assertions::assert_eq;

fn engine(db: &Database) -> AggregationEngine {
    AggregationEngine::new(db.clone(), 3650)
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn chart(d: &str, threats: i64, opportunities: i64, neutral: i64) -> ChartPoint {
    ChartPoint {
        date: date(d),
        threats,
        opportunities,
        neutral,
    }
}

async fn seed_mixed(db: &Database) {
    let mut starred = classified("t1", Classification::Threat, Some(utc(2024, 1, 10, 8)));
    starred.starred = true;
    insert(db, starred).await;
    insert(db, classified("o1", Classification::Opportunity, Some(utc(2024, 1, 9, 8)))).await;
    insert(db, classified("n1", Classification::Neutral, Some(utc(2024, 1, 5, 8)))).await;
    insert(db, article("p1")).await;
    insert(db, classified("e1", Classification::Error, Some(utc(2024, 1, 8, 0)))).await;
}

async fn insert_outdated(db: &Database) {
    let mut by_status = classified("x1", Classification::Threat, Some(utc(2024, 1, 10, 9)));
    by_status.status = ArticleStatus::Outdated;
    by_status.starred = true;
    insert(db, by_status).await;
    insert(db, classified("x2", Classification::Outdated, Some(utc(2024, 1, 10, 9)))).await;
}

#[tokio::test]
async fn stats_count_live_articles() {
    let db = test_db().await;
    seed_mixed(&db).await;

    let stats = engine(&db)
        .compute_stats(&clock(utc(2024, 1, 10, 12)), DateTime::<Utc>::UNIX_EPOCH)
        .await
        .unwrap();

    assert_eq!(
        stats,
        Stats {
            total: 5,
            threats: 1,
            opportunities: 1,
            neutral: 1,
            unclassified: 2,
            articles_today: 1,
            starred: 1,
            new_since_last_visit: 4,
        }
    );
    assert_eq!(
        stats.total,
        stats.threats + stats.opportunities + stats.neutral + stats.unclassified
    );
}

#[tokio::test]
async fn stats_ignore_outdated_articles() {
    let db = test_db().await;
    seed_mixed(&db).await;
    let engine = engine(&db);
    let now = clock(utc(2024, 1, 10, 12));

    let before = engine.compute_stats(&now, utc(2024, 1, 1, 0)).await.unwrap();
    insert_outdated(&db).await;
    let after = engine.compute_stats(&now, utc(2024, 1, 1, 0)).await.unwrap();

    assert_eq!(before, after);
}

#[tokio::test]
async fn stats_on_empty_store_are_zero() {
    let db = test_db().await;
    let stats = engine(&db)
        .compute_stats(&clock(utc(2024, 1, 10, 12)), DateTime::<Utc>::UNIX_EPOCH)
        .await
        .unwrap();

    assert_eq!(stats, Stats::default());
}

#[tokio::test]
async fn new_since_last_visit_uses_watermark() {
    let db = test_db().await;
    seed_mixed(&db).await;

    let stats = engine(&db)
        .compute_stats(&clock(utc(2024, 1, 10, 12)), utc(2024, 1, 8, 12))
        .await
        .unwrap();

    assert_eq!(stats.new_since_last_visit, 2);
}

#[tokio::test]
async fn today_follows_reference_timezone() {
    let db = test_db().await;
    insert(&db, classified("late", Classification::Neutral, Some(utc(2024, 1, 10, 23)))).await;
    let engine = engine(&db);
    let now = utc(2024, 1, 11, 10);

    let in_utc = engine
        .compute_stats(&clock(now), DateTime::<Utc>::UNIX_EPOCH)
        .await
        .unwrap();
    let amsterdam = ReferenceClock::new(now, FixedOffset::east_opt(3600).unwrap());
    let in_amsterdam = engine
        .compute_stats(&amsterdam, DateTime::<Utc>::UNIX_EPOCH)
        .await
        .unwrap();

    assert_eq!(in_utc.articles_today, 0);
    assert_eq!(in_amsterdam.articles_today, 1);
}

#[tokio::test]
async fn daily_trend_groups_by_publication_day() {
    let db = test_db().await;
    insert(&db, classified("a", Classification::Threat, Some(utc(2024, 1, 1, 9)))).await;
    insert(&db, classified("b", Classification::Opportunity, Some(utc(2024, 1, 2, 9)))).await;
    insert(&db, classified("c", Classification::Neutral, Some(utc(2024, 1, 2, 15)))).await;
    // 不计入：未分类、分类错误、过期、窗口外
    insert(&db, NewArticle { date_published: Some(utc(2024, 1, 2, 10)), ..article("d") }).await;
    insert(&db, classified("e", Classification::Error, Some(utc(2024, 1, 2, 10)))).await;
    insert(&db, classified("f", Classification::Outdated, Some(utc(2024, 1, 1, 10)))).await;
    insert(&db, classified("g", Classification::Threat, Some(utc(2023, 12, 1, 10)))).await;

    let series = engine(&db)
        .compute_trend_series(&clock(utc(2024, 1, 3, 12)), 7, Bucket::Day)
        .await
        .unwrap();

    assert_eq!(
        series,
        vec![chart("2024-01-01", 1, 0, 0), chart("2024-01-02", 0, 1, 1)]
    );
    assert!(series.iter().all(|point| point.total() > 0));
}

#[tokio::test]
async fn weekly_trend_aligns_to_monday() {
    let db = test_db().await;
    insert(&db, classified("wed", Classification::Threat, Some(utc(2024, 1, 3, 9)))).await;
    insert(&db, classified("sun", Classification::Threat, Some(utc(2024, 1, 7, 9)))).await;
    insert(&db, classified("mon", Classification::Neutral, Some(utc(2024, 1, 8, 9)))).await;

    let series = engine(&db)
        .compute_trend_series(&clock(utc(2024, 1, 9, 12)), 30, Bucket::Week)
        .await
        .unwrap();

    assert_eq!(
        series,
        vec![chart("2024-01-01", 2, 0, 0), chart("2024-01-08", 0, 0, 1)]
    );
}

#[tokio::test]
async fn monthly_trend_aligns_to_first_of_month() {
    let db = test_db().await;
    insert(&db, classified("mid", Classification::Opportunity, Some(utc(2024, 1, 15, 9)))).await;
    insert(&db, classified("end", Classification::Threat, Some(utc(2024, 1, 31, 9)))).await;
    insert(&db, classified("feb", Classification::Threat, Some(utc(2024, 2, 1, 9)))).await;

    let series = engine(&db)
        .compute_trend_series(&clock(utc(2024, 2, 10, 12)), 90, Bucket::Month)
        .await
        .unwrap();

    assert_eq!(
        series,
        vec![chart("2024-01-01", 1, 1, 0), chart("2024-02-01", 1, 0, 0)]
    );
}

#[tokio::test]
async fn trend_rejects_invalid_parameters_before_querying() {
    let db = test_db().await;
    let dashboard = dashboard(&db);
    let now = clock(utc(2024, 1, 3, 12));

    let bad_bucket = TrendParams {
        days: Some(7),
        bucket: Some("year".to_string()),
    };
    match dashboard.trend(&now, &bad_bucket).await {
        Err(DashboardError::Validation { field, .. }) => assert_eq!(field, "bucket"),
        other => panic!("unexpected: {other:?}"),
    }

    let bad_window = TrendParams {
        days: Some(0),
        bucket: None,
    };
    match dashboard.trend(&now, &bad_window).await {
        Err(DashboardError::Validation { field, .. }) => assert_eq!(field, "days"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[tokio::test]
async fn activity_merges_published_and_classified_days() {
    let db = test_db().await;
    insert(
        &db,
        NewArticle {
            classification_date: Some(utc(2024, 1, 1, 11)),
            ..classified("a1", Classification::Threat, Some(utc(2024, 1, 1, 10)))
        },
    )
    .await;
    insert(
        &db,
        NewArticle {
            classification_date: Some(utc(2024, 1, 2, 9)),
            ..classified("a2", Classification::Neutral, Some(utc(2024, 1, 1, 12)))
        },
    )
    .await;
    insert(&db, NewArticle { date_published: Some(utc(2024, 1, 1, 13)), ..article("a3") }).await;
    insert(
        &db,
        NewArticle {
            classification_date: Some(utc(2024, 1, 1, 15)),
            ..classified("a4", Classification::Opportunity, None)
        },
    )
    .await;
    insert(
        &db,
        NewArticle {
            classification_date: Some(utc(2024, 1, 1, 15)),
            ..classified("old", Classification::Outdated, Some(utc(2024, 1, 1, 8)))
        },
    )
    .await;

    let series = engine(&db)
        .compute_activity_series(&clock(utc(2024, 1, 5, 12)), 7)
        .await
        .unwrap();

    assert_eq!(
        series,
        vec![
            ActivityPoint {
                date: date("2024-01-01"),
                published: 3,
                classified: 2,
            },
            ActivityPoint {
                date: date("2024-01-02"),
                published: 0,
                classified: 1,
            },
        ]
    );
}

#[tokio::test]
async fn activity_is_empty_without_articles() {
    let db = test_db().await;
    let series = engine(&db)
        .compute_activity_series(&clock(utc(2024, 1, 5, 12)), 90)
        .await
        .unwrap();

    assert!(series.is_empty());
}

#[tokio::test]
async fn windows_include_both_bounds_and_nothing_after_now() {
    let db = test_db().await;
    insert(&db, classified("edge", Classification::Threat, Some(utc(2024, 1, 3, 12)))).await;
    insert(&db, classified("early", Classification::Threat, Some(utc(2024, 1, 3, 11)))).await;
    insert(&db, classified("future", Classification::Neutral, Some(utc(2024, 1, 10, 13)))).await;
    insert(
        &db,
        NewArticle {
            classification_date: Some(utc(2024, 1, 10, 12)),
            ..classified("now", Classification::Opportunity, None)
        },
    )
    .await;
    let now = clock(utc(2024, 1, 10, 12));

    let trend = engine(&db)
        .compute_trend_series(&now, 7, Bucket::Day)
        .await
        .unwrap();
    assert_eq!(trend, vec![chart("2024-01-03", 1, 0, 0)]);

    let activity = engine(&db).compute_activity_series(&now, 7).await.unwrap();
    assert_eq!(
        activity,
        vec![
            ActivityPoint {
                date: date("2024-01-03"),
                published: 1,
                classified: 0,
            },
            ActivityPoint {
                date: date("2024-01-10"),
                published: 0,
                classified: 1,
            },
        ]
    );
}

#[tokio::test]
async fn unrepresentable_window_is_a_validation_error() {
    let db = test_db().await;
    let engine = AggregationEngine::new(db.clone(), u32::MAX);
    let now = clock(utc(2024, 1, 10, 12));

    match engine.compute_trend_series(&now, 200_000_000, Bucket::Day).await {
        Err(DashboardError::Validation { field, .. }) => assert_eq!(field, "days"),
        other => panic!("unexpected: {other:?}"),
    }
    match engine.compute_activity_series(&now, u32::MAX).await {
        Err(DashboardError::Validation { field, .. }) => assert_eq!(field, "days"),
        other => panic!("unexpected: {other:?}"),
    }
}
