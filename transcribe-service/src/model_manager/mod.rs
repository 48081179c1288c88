//! Model Manager (C2): the process-wide singleton owning the speech-to-text
//! model (`spec.md` §4.2).
//!
//! The model itself is behind the [`SttEngine`] seam so a different backend
//! never touches this type — only the reference [`engine::WhisperCliEngine`]
//! shells out to a real binary; tests substitute a fake.

mod engine;

pub use engine::WhisperCliEngine;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;

/// Per-call overrides to the default inference knobs (`spec.md` §4.2).
#[derive(Debug, Clone, Default)]
pub struct InferenceOverrides {
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub task: Option<String>,
}

/// A single transcript segment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The engine's inference result (`spec.md` §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub segments: Vec<Segment>,
    pub language: String,
    pub duration: f64,
}

/// Progress callback invoked by an engine during inference. Values are
/// 0..100; the Model Manager does not interpret or clamp these itself —
/// that's the Pipeline Runner's job once they reach a job's progress field.
pub type ProgressCallback = Arc<dyn Fn(i32) + Send + Sync>;

/// The seam a speech-to-text backend implements. The reference
/// implementation ([`WhisperCliEngine`]) shells out to an external CLI
/// binary; fakes in tests return scripted results deterministically.
#[async_trait::async_trait]
pub trait SttEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Perform (or simulate) whatever setup is required before inference.
    /// Idempotent; called by [`ModelManager::load`].
    async fn load(&self) -> Result<()>;

    /// Release whatever resources `load` acquired.
    async fn unload(&self);

    async fn transcribe(
        &self,
        audio_path: &std::path::Path,
        overrides: &InferenceOverrides,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TranscriptionResult>;
}

/// Snapshot returned by [`ModelManager::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatus {
    pub loaded: bool,
    pub model_name: String,
    pub last_used: Option<DateTime<Utc>>,
    pub idle_timeout_secs: u64,
    pub accelerator_info: Option<String>,
}

struct Inner {
    engine: Arc<dyn SttEngine>,
    model_name: String,
    idle_timeout: Duration,
    loaded: AtomicBool,
    last_used: Mutex<Option<DateTime<Utc>>>,
    /// Serializes `load()` and `transcribe()`: only one inference runs at a
    /// time, and the load lock may be the same mutex (`spec.md` §4.2).
    op_lock: Mutex<()>,
    idle_timer: Mutex<Option<CancellationToken>>,
}

/// The process-wide singleton. Constructed once by the application context
/// and shared via `Arc` with the Pipeline Runner and the HTTP API.
#[derive(Clone)]
pub struct ModelManager(Arc<Inner>);

impl ModelManager {
    pub fn new(engine: Arc<dyn SttEngine>, model_name: impl Into<String>, idle_timeout: Duration) -> Self {
        Self(Arc::new(Inner {
            engine,
            model_name: model_name.into(),
            idle_timeout,
            loaded: AtomicBool::new(false),
            last_used: Mutex::new(None),
            op_lock: Mutex::new(()),
            idle_timer: Mutex::new(None),
        }))
    }

    /// Idempotent; loads the model if not already loaded.
    pub async fn load(&self) -> Result<()> {
        if self.0.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.0.op_lock.lock().await;
        if self.0.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        info!(model = %self.0.model_name, "loading speech-to-text model");
        self.0.engine.load().await?;
        self.0.loaded.store(true, Ordering::Release);
        *self.0.last_used.lock().await = Some(Utc::now());
        Ok(())
    }

    /// Idempotent; cancels any pending idle timer and drops the model.
    pub async fn unload(&self) -> Result<()> {
        self.cancel_idle_timer().await;
        if !self.0.loaded.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.0.op_lock.lock().await;
        if !self.0.loaded.load(Ordering::Acquire) {
            return Ok(());
        }

        info!(model = %self.0.model_name, "unloading speech-to-text model");
        self.0.engine.unload().await;
        self.0.loaded.store(false, Ordering::Release);
        *self.0.last_used.lock().await = None;
        Ok(())
    }

    /// Run inference, loading the model first if needed. Cancels any
    /// pending idle timer on entry and stamps `last_used` on entry and exit.
    pub async fn transcribe(
        &self,
        audio_path: &std::path::Path,
        overrides: InferenceOverrides,
        on_progress: Option<ProgressCallback>,
    ) -> Result<TranscriptionResult> {
        self.cancel_idle_timer().await;
        self.load().await?;

        let _guard = self.0.op_lock.lock().await;
        *self.0.last_used.lock().await = Some(Utc::now());

        let result = self
            .0
            .engine
            .transcribe(audio_path, &overrides, on_progress)
            .await;

        *self.0.last_used.lock().await = Some(Utc::now());
        result
    }

    /// (Re)start the idle-unload timer. A new `Transcribe` call cancels it
    /// (`spec.md` §4.2); calling this again before it fires restarts it.
    pub fn schedule_unload(&self) {
        let manager = self.clone();
        let token = CancellationToken::new();

        let previous = {
            let manager = manager.clone();
            let token = token.clone();
            tokio::spawn(async move {
                {
                    let mut slot = manager.0.idle_timer.lock().await;
                    if let Some(previous) = slot.replace(token.clone()) {
                        previous.cancel();
                    }
                }

                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("idle-unload timer cancelled");
                    }
                    _ = tokio::time::sleep(manager.0.idle_timeout) => {
                        info!("model idle timeout elapsed, unloading");
                        if let Err(e) = manager.unload().await {
                            warn!(error = %e, "failed to unload idle model");
                        }
                    }
                }
            })
        };
        drop(previous);
    }

    async fn cancel_idle_timer(&self) {
        if let Some(token) = self.0.idle_timer.lock().await.take() {
            token.cancel();
        }
    }

    pub async fn status(&self) -> ModelStatus {
        ModelStatus {
            loaded: self.0.loaded.load(Ordering::Acquire),
            model_name: self.0.model_name.clone(),
            last_used: *self.0.last_used.lock().await,
            idle_timeout_secs: self.0.idle_timeout.as_secs(),
            accelerator_info: None,
        }
    }
}

/// Derive a progress estimate when the engine does not report one itself:
/// `min(95, floor(elapsed / expected * 95))`, `expected = audio_duration /
/// speed_ratio`. `speed_ratio` defaults to a conservative 8.0 so the bar
/// never regresses (`spec.md` §4.2).
pub fn estimate_progress(elapsed: Duration, audio_duration_secs: f64, speed_ratio: f64) -> i32 {
    if audio_duration_secs <= 0.0 || speed_ratio <= 0.0 {
        return 0;
    }
    let expected = audio_duration_secs / speed_ratio;
    if expected <= 0.0 {
        return 0;
    }
    let fraction = elapsed.as_secs_f64() / expected;
    let percent = (fraction * 95.0).floor() as i32;
    percent.clamp(0, 95)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_progress_never_exceeds_95() {
        let p = estimate_progress(Duration::from_secs(1000), 10.0, 8.0);
        assert_eq!(p, 95);
    }

    #[test]
    fn estimate_progress_scales_with_elapsed() {
        // expected = 80s / 8.0 = 10s; halfway through should read ~47%.
        let p = estimate_progress(Duration::from_secs(5), 80.0, 8.0);
        assert_eq!(p, 47);
    }
}
