mod helpers;

use std::sync::Arc;

use chrono::Utc;
use crosspost::application::services::DlqService;
use crosspost::domain::entities::{Job, JobStatus};
use crosspost::domain::ports::{Clock, DlqStore, JobStore};
use crosspost::infrastructure::runtime::SystemClock;
use serde_json::json;

use helpers::test_db::{build_stores, setup_test_db};

async fn dead_letter(
    jobs: &Arc<dyn JobStore>,
    channel: &str,
    payload: serde_json::Value,
    error: &str,
) -> Job {
    let now = Utc::now();
    let job = jobs
        .enqueue(channel, payload, now - chrono::Duration::minutes(1), None)
        .await
        .unwrap();
    let claimed = jobs.claim(&job, now).await.unwrap().unwrap();
    jobs.mark_failed(&claimed, error, false).await.unwrap();
    job
}

#[tokio::test]
async fn test_dlq_round_trip_creates_fresh_pending_job() {
    let db = setup_test_db().await;
    let (jobs, dlq) = build_stores(&db, 5);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = DlqService::new(dlq.clone(), jobs.clone(), clock);

    let payload = json!({"title": "clip", "video_url": "https://cdn/v.mp4"});
    let original = dead_letter(&jobs, "tiktok", payload.clone(), "Invalid request").await;

    let page = dlq.paginate(1, 10, None).await.unwrap();
    assert_eq!(page.total, 1);
    let entry = &page.items[0];
    assert!(entry.replayed_at.is_none());

    let replayed = service.retry(&entry.id).await.unwrap().unwrap();
    assert_ne!(replayed.id, original.id, "replay must be a brand-new job");
    assert_eq!(replayed.status, JobStatus::Pending);
    assert_eq!(replayed.channel, "tiktok");
    assert_eq!(replayed.payload, payload);

    // The entry is stamped, not mutated otherwise, and never deleted.
    let entry = dlq.get(&entry.id).await.unwrap().unwrap();
    assert!(entry.replayed_at.is_some());
    assert_eq!(entry.original_job_id, original.id);
    assert_eq!(entry.final_error, "Invalid request");

    // Replaying again while the first replay is live returns the same job.
    let again = service.retry(&entry.id).await.unwrap().unwrap();
    assert_eq!(again.id, replayed.id);
}

#[tokio::test]
async fn test_retry_missing_entry_returns_none() {
    let db = setup_test_db().await;
    let (jobs, dlq) = build_stores(&db, 5);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let service = DlqService::new(dlq, jobs, clock);

    assert!(service.retry("no-such-entry").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stats_by_channel_and_recency() {
    let db = setup_test_db().await;
    let (jobs, dlq) = build_stores(&db, 5);

    dead_letter(&jobs, "tiktok", json!({}), "Forbidden").await;
    dead_letter(&jobs, "tiktok", json!({}), "Forbidden").await;
    dead_letter(&jobs, "youtube", json!({}), "Forbidden").await;

    let stats = dlq.stats(Utc::now()).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.recent_24h, 3);
    assert_eq!(stats.by_channel.get("tiktok"), Some(&2));
    assert_eq!(stats.by_channel.get("youtube"), Some(&1));

    // Nothing is recent from two days out.
    let stats = dlq
        .stats(Utc::now() + chrono::Duration::days(2))
        .await
        .unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.recent_24h, 0);
}

#[tokio::test]
async fn test_paginate_with_channel_filter() {
    let db = setup_test_db().await;
    let (jobs, dlq) = build_stores(&db, 5);

    dead_letter(&jobs, "tiktok", json!({}), "Forbidden").await;
    dead_letter(&jobs, "youtube", json!({}), "Forbidden").await;

    let page = dlq.paginate(1, 10, Some("youtube")).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].channel, "youtube");

    let page = dlq.paginate(1, 10, None).await.unwrap();
    assert_eq!(page.total, 2);
}

#[tokio::test]
async fn test_cleanup_dry_run_then_delete() {
    let db = setup_test_db().await;
    let (jobs, dlq) = build_stores(&db, 5);

    dead_letter(&jobs, "tiktok", json!({}), "Forbidden").await;

    // From 10 days in the future every entry is older than 7 days.
    let future = Utc::now() + chrono::Duration::days(10);

    let counted = dlq.cleanup(future, 7, true).await.unwrap();
    assert_eq!(counted, 1);
    assert_eq!(dlq.stats(future).await.unwrap().total, 1, "dry run must not delete");

    let purged = dlq.cleanup(future, 7, false).await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(dlq.stats(future).await.unwrap().total, 0);

    // Nothing young enough is touched.
    let untouched = dlq.cleanup(Utc::now(), 7, false).await.unwrap();
    assert_eq!(untouched, 0);
}
