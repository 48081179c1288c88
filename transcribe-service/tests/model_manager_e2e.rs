//! Model Manager concurrency and idle-unload properties (`spec.md` §8).

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use transcribe_service::model_manager::{
    InferenceOverrides, ModelManager, ProgressCallback, Segment, SttEngine, TranscriptionResult,
};
use transcribe_service::Result;

/// An engine that sleeps during `transcribe` and tracks the number of calls
/// that were in flight simultaneously, so tests can assert serialization.
struct SlowEngine {
    delay: Duration,
    active: AtomicUsize,
    max_concurrent: AtomicUsize,
    load_calls: AtomicUsize,
    unload_calls: AtomicUsize,
}

impl SlowEngine {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            active: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            load_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl SttEngine for SlowEngine {
    fn name(&self) -> &str {
        "slow-fake"
    }

    async fn load(&self) -> Result<()> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn unload(&self) {
        self.unload_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn transcribe(
        &self,
        _audio_path: &Path,
        _overrides: &InferenceOverrides,
        _on_progress: Option<ProgressCallback>,
    ) -> Result<TranscriptionResult> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now_active, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(TranscriptionResult {
            text: "ok".to_string(),
            segments: vec![Segment { start: 0.0, end: 1.0, text: "ok".to_string() }],
            language: "en".to_string(),
            duration: 1.0,
        })
    }
}

#[tokio::test]
async fn transcribe_never_runs_two_inferences_concurrently() {
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(50)));
    let manager = ModelManager::new(engine.clone(), "slow-fake", Duration::from_secs(300));

    let a = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .transcribe(Path::new("/tmp/a.wav"), InferenceOverrides::default(), None)
                .await
        })
    };
    let b = {
        let manager = manager.clone();
        tokio::spawn(async move {
            manager
                .transcribe(Path::new("/tmp/b.wav"), InferenceOverrides::default(), None)
                .await
        })
    };

    a.await.expect("task a joined").expect("transcribe a");
    b.await.expect("task b joined").expect("transcribe b");

    assert_eq!(
        engine.max_concurrent.load(Ordering::SeqCst),
        1,
        "at most one inference must be active at a time"
    );
}

#[tokio::test]
async fn load_is_idempotent() {
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(1)));
    let manager = ModelManager::new(engine.clone(), "slow-fake", Duration::from_secs(300));

    manager.load().await.expect("first load");
    manager.load().await.expect("second load");

    assert_eq!(engine.load_calls.load(Ordering::SeqCst), 1, "load must run exactly once");
    assert!(manager.status().await.loaded);
}

#[tokio::test]
async fn idle_timeout_unloads_the_model_exactly_once() {
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(1)));
    let manager = ModelManager::new(engine.clone(), "slow-fake", Duration::from_millis(30));

    manager
        .transcribe(Path::new("/tmp/a.wav"), InferenceOverrides::default(), None)
        .await
        .expect("transcribe");
    assert!(manager.status().await.loaded);

    manager.schedule_unload();

    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!manager.status().await.loaded, "model must be unloaded after the idle timeout");
    assert_eq!(engine.unload_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn a_new_transcription_cancels_the_pending_idle_timer() {
    let engine = Arc::new(SlowEngine::new(Duration::from_millis(1)));
    let manager = ModelManager::new(engine.clone(), "slow-fake", Duration::from_millis(40));

    manager
        .transcribe(Path::new("/tmp/a.wav"), InferenceOverrides::default(), None)
        .await
        .expect("transcribe");
    manager.schedule_unload();

    // Arrive before the idle timer fires; this must cancel it.
    tokio::time::sleep(Duration::from_millis(20)).await;
    manager
        .transcribe(Path::new("/tmp/b.wav"), InferenceOverrides::default(), None)
        .await
        .expect("second transcribe cancels the pending timer");

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(
        manager.status().await.loaded,
        "the cancelled timer must not have unloaded the model"
    );
}
