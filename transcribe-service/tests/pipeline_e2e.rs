//! End-to-end pipeline scenarios against fake collaborators (`spec.md` §8).

#[path = "fakes/mod.rs"]
mod fakes;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use transcribe_service::config::{EngineDefaults, Settings};
use transcribe_service::database::{self, JobStore, SqliteJobStore};
use transcribe_service::domain::{generate_job_id, ErrorKind, Job, JobStatus};
use transcribe_service::model_manager::ModelManager;
use transcribe_service::pipeline::{FileRenderer, PipelineRunner};
use transcribe_service::processor::JobProcessor;
use transcribe_service::webhook::WebhookDispatcher;

use fakes::{CallLog, FakeExtractor, FakeFetcher, FakeSttEngine};

async fn test_settings(data_dir: &std::path::Path) -> Settings {
    Settings {
        host: "127.0.0.1".to_string(),
        port: 0,
        debug: true,
        data_dir: data_dir.to_path_buf(),
        job_retention: chrono::Duration::days(7),
        max_upload_size_bytes: 10 * 1024 * 1024,
        model_unload_timeout: Duration::from_secs(300),
        model_name: "fake-model".to_string(),
        admin_password: String::new(),
        whisper_binary_path: "whisper".to_string(),
        ffmpeg_binary_path: "ffmpeg".to_string(),
        webhook_timeout: Duration::from_secs(5),
        engine_defaults: EngineDefaults::default(),
    }
}

async fn open_store(settings: &Settings) -> Arc<dyn JobStore> {
    let pool = database::init_pool(&settings.database_url()).await.expect("open pool");
    database::run_migrations(&pool).await.expect("run migrations");
    Arc::new(SqliteJobStore::new(pool))
}

async fn wait_for_terminal(store: &Arc<dyn JobStore>, job_id: &str) -> Job {
    timeout(Duration::from_secs(5), async {
        loop {
            if let Some(job) = store.get(job_id).await.expect("job lookup") {
                if job.is_terminal() {
                    return job;
                }
            }
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach a terminal state in time")
}

struct Harness {
    _tmp: TempDir,
    settings: Settings,
    store: Arc<dyn JobStore>,
    processor: Arc<JobProcessor>,
}

async fn build_harness(fetcher: Arc<dyn transcribe_service::pipeline::Fetcher>) -> Harness {
    let tmp = TempDir::new().expect("create temp dir");
    let settings = test_settings(tmp.path()).await;
    let store = open_store(&settings).await;

    let extractor = Arc::new(FakeExtractor::succeeding(Some(5.0)));
    let renderer = Arc::new(FileRenderer::new());
    let engine = Arc::new(FakeSttEngine::new("hello world"));
    let model_manager = ModelManager::new(engine, settings.model_name.clone(), settings.model_unload_timeout);

    let runner = Arc::new(PipelineRunner::new(
        store.clone(),
        model_manager,
        fetcher,
        extractor,
        renderer,
        &settings,
    ));
    let webhook = Arc::new(WebhookDispatcher::new(settings.webhook_timeout));
    let processor = Arc::new(JobProcessor::new(store.clone(), runner, webhook, settings.data_dir.clone()));

    Harness {
        _tmp: tmp,
        settings,
        store,
        processor,
    }
}

#[tokio::test]
async fn url_submission_completes_and_renders_all_four_formats() {
    let fetcher = Arc::new(FakeFetcher::succeeding(Some(3.0)));
    let harness = build_harness(fetcher).await;

    let job = Job::new(
        generate_job_id(),
        Some("https://example.com/clip.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    let job_id = job.job_id.clone();
    harness.processor.submit(&job).await.expect("submit job");

    let worker = tokio::spawn(harness.processor.clone().run());
    let finished = wait_for_terminal(&harness.store, &job_id).await;
    harness.processor.shutdown();
    let _ = worker.await;

    assert_eq!(finished.status, JobStatus::Completed);
    assert_eq!(finished.stage, JobStatus::Completed);
    assert_eq!(finished.progress, 100);
    // The extractor measured the real audio; its duration wins over the
    // fetcher's guess (`spec.md` §4.4 edge-case policy).
    assert_eq!(finished.duration_seconds, Some(5));

    let json_path = PathBuf::from(finished.output_json.expect("json output path"));
    let contents = tokio::fs::read_to_string(&json_path).await.expect("read json output");
    assert!(contents.contains("hello world"));

    for path in [finished.output_txt, finished.output_srt, finished.output_md] {
        let path = PathBuf::from(path.expect("output path present"));
        assert!(tokio::fs::try_exists(&path).await.unwrap_or(false));
    }

    // Invariant 3 (`spec.md` §3): the extracted WAV is an intermediate and
    // must be gone after the terminal transition.
    let input_dir = harness.settings.data_dir.join("jobs").join(&job_id).join("input");
    let mut entries = tokio::fs::read_dir(&input_dir).await.expect("read input dir");
    while let Some(entry) = entries.next_entry().await.expect("read dir entry") {
        assert_ne!(entry.path().extension().and_then(|e| e.to_str()), Some("wav"));
    }
}

#[tokio::test]
async fn upload_submission_skips_the_download_stage() {
    let fetcher = Arc::new(FakeFetcher::failing("must not be called"));
    let harness = build_harness(fetcher).await;

    let job = Job::new(
        generate_job_id(),
        None,
        Some("clip.mp4".to_string()),
        Some("/tmp/does-not-need-to-exist.mp4".to_string()),
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    let job_id = job.job_id.clone();
    harness.processor.submit(&job).await.expect("submit job");

    let worker = tokio::spawn(harness.processor.clone().run());
    let finished = wait_for_terminal(&harness.store, &job_id).await;
    harness.processor.shutdown();
    let _ = worker.await;

    assert_eq!(finished.status, JobStatus::Completed);
}

#[tokio::test]
async fn fetcher_failure_marks_the_job_failed_with_a_download_error() {
    let fetcher = Arc::new(FakeFetcher::failing("connection refused"));
    let harness = build_harness(fetcher).await;

    let job = Job::new(
        generate_job_id(),
        Some("https://example.com/clip.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    let job_id = job.job_id.clone();
    harness.processor.submit(&job).await.expect("submit job");

    let worker = tokio::spawn(harness.processor.clone().run());
    let finished = wait_for_terminal(&harness.store, &job_id).await;
    harness.processor.shutdown();
    let _ = worker.await;

    assert_eq!(finished.status, JobStatus::Failed);
    let error = finished.error.expect("failure must carry an ErrorInfo");
    assert_eq!(error.kind, ErrorKind::DownloadError);
    assert!(error.message.contains("connection refused"));
}

#[tokio::test]
async fn crash_recovery_fails_orphaned_jobs_and_requeues_pending_ones() {
    let fetcher = Arc::new(FakeFetcher::succeeding(Some(2.0)));
    let harness = build_harness(fetcher).await;

    // Simulate a process that crashed mid-transcription: a row stuck in a
    // non-terminal, non-queued stage.
    let mut orphan = Job::new(
        generate_job_id(),
        Some("https://example.com/a.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    orphan.enter_stage(JobStatus::Transcribing);
    harness.store.create(&orphan).await.expect("create orphan row");

    // And a row that was queued but never dequeued before the crash.
    let pending = Job::new(
        generate_job_id(),
        Some("https://example.com/b.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    harness.store.create(&pending).await.expect("create pending row");

    harness.processor.recover().await.expect("recover");

    let orphan_after = harness.store.get(&orphan.job_id).await.unwrap().unwrap();
    assert_eq!(orphan_after.status, JobStatus::Failed);
    assert_eq!(
        orphan_after.error.expect("orphan must carry an error").kind,
        ErrorKind::ProcessingError
    );

    let worker = tokio::spawn(harness.processor.clone().run());
    let pending_after = wait_for_terminal(&harness.store, &pending.job_id).await;
    harness.processor.shutdown();
    let _ = worker.await;

    assert_eq!(pending_after.status, JobStatus::Completed);
}

#[tokio::test]
async fn jobs_are_processed_strictly_in_fifo_order() {
    let log = Arc::new(CallLog::default());
    let fetcher = Arc::new(FakeFetcher::succeeding(Some(1.0)).with_log(log.clone()));
    let harness = build_harness(fetcher).await;

    let mut job_ids = Vec::new();
    for n in 0..3 {
        let job = Job::new(
            generate_job_id(),
            Some(format!("https://example.com/{n}.mp4")),
            None,
            None,
            None,
            chrono::Utc::now(),
            harness.settings.job_retention,
        );
        job_ids.push(job.job_id.clone());
        harness.processor.submit(&job).await.expect("submit job");
    }

    let worker = tokio::spawn(harness.processor.clone().run());
    for job_id in &job_ids {
        wait_for_terminal(&harness.store, job_id).await;
    }
    harness.processor.shutdown();
    let _ = worker.await;

    assert_eq!(log.snapshot(), job_ids, "single worker must dispatch strictly FIFO");
}

#[tokio::test]
async fn retention_gc_deletes_only_expired_jobs_and_their_directories() {
    let fetcher = Arc::new(FakeFetcher::succeeding(Some(1.0)));
    let harness = build_harness(fetcher).await;

    let mut expired = Job::new(
        generate_job_id(),
        Some("https://example.com/old.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    expired.expires_at = chrono::Utc::now() - chrono::Duration::seconds(1);
    harness.processor.submit(&expired).await.expect("submit expired job");

    let fresh = Job::new(
        generate_job_id(),
        Some("https://example.com/new.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    harness.processor.submit(&fresh).await.expect("submit fresh job");

    let deleted = harness.processor.run_retention_gc().await.expect("run gc");
    assert_eq!(deleted, 1);

    assert!(harness.store.get(&expired.job_id).await.unwrap().is_none());
    assert!(harness.store.get(&fresh.job_id).await.unwrap().is_some());

    let expired_dir = expired.job_dir(&harness.settings.data_dir);
    assert!(!tokio::fs::try_exists(&expired_dir).await.unwrap_or(true));
}

#[tokio::test]
async fn deleting_a_job_twice_is_idempotent() {
    let fetcher = Arc::new(FakeFetcher::succeeding(Some(1.0)));
    let harness = build_harness(fetcher).await;

    let job = Job::new(
        generate_job_id(),
        Some("https://example.com/a.mp4".to_string()),
        None,
        None,
        None,
        chrono::Utc::now(),
        harness.settings.job_retention,
    );
    harness.processor.submit(&job).await.expect("submit job");

    harness.processor.delete(&job.job_id).await.expect("first delete");
    harness.processor.delete(&job.job_id).await.expect("second delete must not raise");
    assert!(harness.store.get(&job.job_id).await.unwrap().is_none());
}
