//! Pipeline Runner (C4): per-job state machine (`spec.md` §4.4).
//!
//! Drives a single [`Job`] through `queued → downloading → extracting →
//! transcribing → formatting → completed`, or into `failed` from any
//! non-terminal stage. Collaborators (fetcher, extractor, renderer) sit
//! behind trait seams the way the teacher keeps `DownloadEngine` behind a
//! trait in `downloader::engine::traits` — the Runner never depends on a
//! concrete implementation.

mod extractor;
mod fetcher;
mod renderer;

pub use extractor::FfmpegExtractor;
pub use fetcher::HttpFetcher;
pub use renderer::FileRenderer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Settings;
use crate::database::JobStore;
use crate::domain::{ErrorInfo, ErrorKind, Job, JobStatus};
use crate::model_manager::{InferenceOverrides, ModelManager, ProgressCallback};
use crate::Result;

/// What the fetcher returns for a successfully downloaded source
/// (`spec.md` §4.4).
pub struct FetchOutcome {
    pub path: PathBuf,
    pub duration_secs: Option<f64>,
}

/// `Fetch(url, destDir, jobID, onProgress) → {path, duration?, error?}`.
/// Called only when the job carries a `url`.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FetchOutcome>;
}

/// What the extractor returns for a successfully produced audio file.
pub struct ExtractOutcome {
    pub path: PathBuf,
    pub duration_secs: Option<f64>,
}

/// `Extract(sourcePath, destDir, jobID, onProgress) → {path, duration?,
/// error?}`. Produces 16 kHz mono 16-bit PCM.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        source_path: &Path,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ExtractOutcome>;
}

/// Paths to the four rendered artifacts.
pub struct RenderOutcome {
    pub json: PathBuf,
    pub txt: PathBuf,
    pub srt: PathBuf,
    pub md: PathBuf,
}

/// Metadata threaded through to a renderer for the human-readable formats.
pub struct RenderMetadata<'a> {
    pub job_id: &'a str,
    pub source: Option<&'a str>,
}

/// `Render(transcriptionResult, destDir, jobID, metadata) → {json, txt, srt,
/// md}`.
#[async_trait::async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        result: &crate::model_manager::TranscriptionResult,
        dest_dir: &Path,
        metadata: RenderMetadata<'_>,
    ) -> Result<RenderOutcome>;
}

/// Drives one job to completion. Stateless across calls — all state lives in
/// the [`Job`] row, read and written through the [`JobStore`].
pub struct PipelineRunner {
    store: Arc<dyn JobStore>,
    model_manager: ModelManager,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    renderer: Arc<dyn Renderer>,
    data_root: PathBuf,
}

impl PipelineRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        model_manager: ModelManager,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        renderer: Arc<dyn Renderer>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            model_manager,
            fetcher,
            extractor,
            renderer,
            data_root: settings.data_dir.clone().into(),
        }
    }

    /// Run the full pipeline for `job_id`. Never returns an `Err` for a
    /// collaborator failure — those are written onto the job row as
    /// `failed`; only Job Store I/O failures propagate, since at that point
    /// there's no row left to record the failure on.
    pub async fn run(&self, job_id: &str) -> Result<()> {
        let Some(mut job) = self.store.get(job_id).await? else {
            warn!(job_id, "job vanished before the pipeline could start it");
            return Ok(());
        };

        let input_dir = job.input_dir(&self.data_root);
        let output_dir = job.output_dir(&self.data_root);
        crate::utils::fs::ensure_dir_all(&input_dir).await?;
        crate::utils::fs::ensure_dir_all(&output_dir).await?;

        if job.started_at.is_none() {
            job.started_at = Some(chrono::Utc::now());
        }

        if let Err(failure) = self.drive(&mut job, &input_dir, &output_dir).await {
            self.fail(&mut job, failure).await?;
        }

        self.cleanup_intermediate(&job, &input_dir).await;
        self.store.update(&job).await?;

        if job.status == JobStatus::Completed {
            self.model_manager.schedule_unload();
        }

        Ok(())
    }

    async fn drive(&self, job: &mut Job, input_dir: &Path, output_dir: &Path) -> std::result::Result<(), ErrorInfo> {
        let mut source_path = job
            .input_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| input_dir.join("source"));

        if let Some(url) = job.url.clone() {
            job.enter_stage(JobStatus::Downloading);
            self.persist(job).await;

            let outcome = self
                .fetcher
                .fetch(&url, input_dir, &job.job_id, self.progress_cb(job))
                .await
                .map_err(|e| ErrorInfo::new(ErrorKind::DownloadError, e.to_string()))?;

            source_path = outcome.path;
            if let Some(duration) = outcome.duration_secs {
                job.duration_seconds = Some(duration.round() as i64);
            }
            job.apply_progress(100);
            self.persist(job).await;
        }

        job.enter_stage(JobStatus::Extracting);
        self.persist(job).await;

        let extracted = self
            .extractor
            .extract(&source_path, input_dir, &job.job_id, self.progress_cb(job))
            .await
            .map_err(|e| ErrorInfo::new(ErrorKind::ExtractionError, e.to_string()))?;

        // The extractor measured the actual audio, so its duration wins over
        // whatever the fetcher guessed (`spec.md` §4.4 edge-case policy).
        if let Some(duration) = extracted.duration_secs {
            job.duration_seconds = Some(duration.round() as i64);
        }
        job.audio_path = Some(extracted.path.to_string_lossy().into_owned());
        job.apply_progress(100);
        self.persist(job).await;

        job.enter_stage(JobStatus::Transcribing);
        self.persist(job).await;

        let overrides = InferenceOverrides::default();
        let transcription = self
            .model_manager
            .transcribe(&extracted.path, overrides, self.progress_cb(job))
            .await
            .map_err(|e| ErrorInfo::new(ErrorKind::TranscriptionError, e.to_string()))?;
        job.apply_progress(100);
        self.persist(job).await;

        job.enter_stage(JobStatus::Formatting);
        self.persist(job).await;

        let metadata = RenderMetadata {
            job_id: &job.job_id,
            source: job.url.as_deref().or(job.filename.as_deref()),
        };
        let rendered = self
            .renderer
            .render(&transcription, output_dir, metadata)
            .await
            .map_err(|e| ErrorInfo::new(ErrorKind::ProcessingError, e.to_string()))?;

        job.output_json = Some(rendered.json.to_string_lossy().into_owned());
        job.output_txt = Some(rendered.txt.to_string_lossy().into_owned());
        job.output_srt = Some(rendered.srt.to_string_lossy().into_owned());
        job.output_md = Some(rendered.md.to_string_lossy().into_owned());
        job.apply_progress(100);

        job.mark_completed(chrono::Utc::now());
        info!(job_id = %job.job_id, "job completed");
        Ok(())
    }

    async fn fail(&self, job: &mut Job, error: ErrorInfo) {
        warn!(job_id = %job.job_id, kind = %error.kind, message = %error.message, "job failed");
        job.mark_failed(error, chrono::Utc::now());
    }

    /// Best-effort intermediate write-through so pollers see progress as it
    /// happens; failures here must not abort the pipeline run (the final
    /// `update` after `drive` returns is the one that must succeed).
    async fn persist(&self, job: &Job) {
        if let Err(e) = self.store.update(job).await {
            warn!(job_id = %job.job_id, error = %e, "failed to persist intermediate progress");
        }
    }

    /// A callback collaborators invoke with their own progress updates.
    /// `Fn` (not `FnMut`) is required by [`ProgressCallback`]'s signature, so
    /// the in-flight job snapshot lives behind a `Mutex` rather than a plain
    /// capture (`spec.md` §9: "progress callbacks are plain function values,
    /// not captured closures on outer state" — the mutation is the minimum
    /// needed to apply the clamp/monotonicity policy before persisting).
    fn progress_cb(&self, job: &Job) -> Option<ProgressCallback> {
        let store = self.store.clone();
        let snapshot = std::sync::Mutex::new(job.clone());
        Some(Arc::new(move |value: i32| {
            let updated = {
                let mut guard = snapshot.lock().expect("progress snapshot mutex poisoned");
                guard.apply_progress(value);
                guard.clone()
            };
            let store = store.clone();
            tokio::spawn(async move {
                let _ = store.update(&updated).await;
            });
        }))
    }

    /// Delete any `*.wav` left under the job's `input/` directory. Runs
    /// unconditionally after every terminal transition (`spec.md` §4.4);
    /// failures are logged at warn and never affect job state (`spec.md`
    /// §7).
    async fn cleanup_intermediate(&self, job: &Job, input_dir: &Path) {
        let mut entries = match tokio::fs::read_dir(input_dir).await {
            Ok(entries) => entries,
            Err(_) => return,
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("wav") {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(job_id = %job.job_id, path = %path.display(), error = %e, "failed to remove intermediate audio");
                }
            }
        }
    }
}
