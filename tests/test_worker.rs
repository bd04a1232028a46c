mod helpers;

use std::sync::Arc;

use chrono::Utc;
use crosspost::application::services::Dispatcher;
use crosspost::domain::entities::JobStatus;
use crosspost::domain::ports::{Clock, JobStore};
use crosspost::infrastructure::persistence::Database;
use crosspost::infrastructure::runtime::SystemClock;
use crosspost::infrastructure::workers::{Worker, WorkerConfig};
use crosspost::shared::events::LocalEventBus;
use serde_json::json;

use helpers::publishers::ScriptedPublisher;
use helpers::test_db::{build_registry, build_stores, setup_test_db};

fn build_worker(
    db: &Database,
    jobs: Arc<dyn JobStore>,
    publisher: Arc<ScriptedPublisher>,
) -> Worker {
    let registry = build_registry(db, 5, 60);
    let bus = Arc::new(LocalEventBus::new(100));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let mut dispatcher = Dispatcher::new(jobs.clone(), registry, bus, clock.clone());
    dispatcher.register_publisher(publisher);

    Worker::new(
        jobs,
        Arc::new(dispatcher),
        clock,
        WorkerConfig {
            poll_interval_secs: 1,
            batch_size: 10,
            concurrency: 4,
            staleness_secs: 900,
        },
    )
}

#[tokio::test]
async fn test_tick_claims_and_dispatches_due_jobs() {
    let db = setup_test_db().await;
    let (jobs, _) = build_stores(&db, 5);
    let publisher = Arc::new(ScriptedPublisher::succeeding("youtube", "yt_123"));
    let worker = build_worker(&db, jobs.clone(), publisher.clone());

    let past = Utc::now() - chrono::Duration::minutes(1);
    let a = jobs.enqueue("youtube", json!({"title": "a"}), past, None).await.unwrap();
    let b = jobs.enqueue("youtube", json!({"title": "b"}), past, None).await.unwrap();
    // Not due; must be left alone.
    let later = jobs
        .enqueue("youtube", json!({"title": "c"}), Utc::now() + chrono::Duration::hours(1), None)
        .await
        .unwrap();

    let processed = worker.process_tick().await.unwrap();
    assert_eq!(processed, 2);
    assert_eq!(publisher.calls(), 2);

    for id in [&a.id, &b.id] {
        let job = jobs.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.remote_id, "yt_123");
    }
    let untouched = jobs.find_by_id(&later.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, JobStatus::Pending);

    // Queue drained: the next tick is a no-op.
    assert_eq!(worker.process_tick().await.unwrap(), 0);
}

#[tokio::test]
async fn test_concurrent_workers_split_the_batch() {
    let db = setup_test_db().await;
    let (jobs, _) = build_stores(&db, 5);
    let publisher = Arc::new(ScriptedPublisher::succeeding("tiktok", "tt_1"));
    let worker_a = Arc::new(build_worker(&db, jobs.clone(), publisher.clone()));
    let worker_b = Arc::new(build_worker(&db, jobs.clone(), publisher.clone()));

    let past = Utc::now() - chrono::Duration::minutes(1);
    for i in 0..6 {
        jobs.enqueue("tiktok", json!({"title": format!("clip-{}", i)}), past, None)
            .await
            .unwrap();
    }

    // Both workers poll the same due list; lost claims are skipped silently,
    // so every job is processed exactly once between them.
    let (a, b) = tokio::join!(worker_a.process_tick(), worker_b.process_tick());
    assert_eq!(
        a.unwrap() + b.unwrap(),
        6,
        "each job must be claimed by exactly one worker"
    );
    assert_eq!(publisher.calls(), 6);

    let page = jobs
        .paginate(1, 25, &Default::default())
        .await
        .unwrap();
    assert!(page
        .items
        .iter()
        .all(|job| job.status == JobStatus::Completed));
}

#[tokio::test]
async fn test_tick_releases_stuck_jobs_for_the_next_pass() {
    let db = setup_test_db().await;
    let (jobs, _) = build_stores(&db, 5);
    let publisher = Arc::new(ScriptedPublisher::succeeding("youtube", "yt_1"));
    let worker = build_worker(&db, jobs.clone(), publisher);

    // A job claimed by a worker that died: running, and old enough that the
    // sweep (staleness 900s) picks it up when the clock reaches it.
    let past = Utc::now() - chrono::Duration::minutes(1);
    let job = jobs.enqueue("youtube", json!({"title": "v"}), past, None).await.unwrap();
    jobs.claim(&job, Utc::now()).await.unwrap().unwrap();

    // Within the staleness window nothing happens.
    let processed = worker.process_tick().await.unwrap();
    assert_eq!(processed, 0);
    let still_running = jobs.find_by_id(&job.id).await.unwrap().unwrap();
    assert_eq!(still_running.status, JobStatus::Running);

    // Direct sweep from 16 minutes out: the job is pending again and a
    // normal tick would pick it up.
    let released = jobs
        .release_stuck(
            Utc::now() + chrono::Duration::minutes(16),
            std::time::Duration::from_secs(900),
        )
        .await
        .unwrap();
    assert_eq!(released, 1);
    let recovered = jobs.find_by_id(&job.id).await.unwrap().unwrap();
    assert_eq!(recovered.status, JobStatus::Pending);
}
