//! Job Processor (C5): the ready queue, the single-worker loop, startup
//! recovery, and retention GC (`spec.md` §4.5).
//!
//! The FIFO itself is a plain `VecDeque` behind a `Mutex`, woken with a
//! `tokio::sync::Notify` — the same primitives the teacher reaches for in
//! `pipeline::job_queue`/`pipeline::worker_pool` (`DashMap`/`Notify`/
//! `CancellationToken`), narrowed from that file's adaptive multi-worker
//! pool down to the single cooperative worker this spec requires
//! (`SPEC_FULL.md` §4.5 — the teacher's adaptive scaling is explicitly not
//! carried over).

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::database::JobStore;
use crate::domain::{ErrorInfo, ErrorKind, Job, JobStatus};
use crate::pipeline::PipelineRunner;
use crate::webhook::WebhookDispatcher;
use crate::Result;

/// Snapshot returned by [`JobProcessor::queue_status`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueueStatus {
    pub size: usize,
    pub current_job_id: Option<String>,
    pub running: bool,
}

struct Queue {
    ready: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl Queue {
    fn new() -> Self {
        Self {
            ready: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    fn push(&self, job_id: String) {
        self.ready.lock().expect("ready queue mutex poisoned").push_back(job_id);
        self.notify.notify_one();
    }

    fn len(&self) -> usize {
        self.ready.lock().expect("ready queue mutex poisoned").len()
    }

    async fn pop(&self) -> Option<String> {
        loop {
            if let Some(id) = self.ready.lock().expect("ready queue mutex poisoned").pop_front() {
                return Some(id);
            }
            self.notify.notified().await;
        }
    }
}

/// Owns the ready queue and drives the single-worker loop. Constructed once
/// by the application context; the Pipeline Runner (and, through it, the
/// Model Manager and Webhook Dispatcher) is owned behind it.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    runner: Arc<PipelineRunner>,
    webhook: Arc<WebhookDispatcher>,
    queue: Arc<Queue>,
    current_job_id: RwLock<Option<String>>,
    running: AtomicBool,
    data_root: PathBuf,
    shutdown: CancellationToken,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        runner: Arc<PipelineRunner>,
        webhook: Arc<WebhookDispatcher>,
        data_root: PathBuf,
    ) -> Self {
        Self {
            store,
            runner,
            webhook,
            queue: Arc::new(Queue::new()),
            current_job_id: RwLock::new(None),
            running: AtomicBool::new(false),
            data_root,
            shutdown: CancellationToken::new(),
        }
    }

    /// Create the per-job directory tree, stamp the job, persist it, then
    /// enqueue it (`spec.md` §4.5 "Submission").
    pub async fn submit(&self, job: &Job) -> Result<()> {
        let job_dir = job.job_dir(&self.data_root);
        crate::utils::fs::ensure_dir_all(&job_dir.join("input")).await?;
        crate::utils::fs::ensure_dir_all(&job_dir.join("output")).await?;
        crate::utils::fs::ensure_dir_all(&job_dir.join("logs")).await?;

        self.store.create(job).await?;
        self.queue.push(job.job_id.clone());
        Ok(())
    }

    /// Re-enqueue `queued` rows FIFO by `created_at`; reclassify in-progress
    /// rows as crashed orphans (`spec.md` §4.5 "Recovery on startup").
    pub async fn recover(&self) -> Result<()> {
        let orphans = self.store.in_progress().await?;
        for mut job in orphans {
            warn!(job_id = %job.job_id, "reclassifying orphaned job after restart");
            job.mark_failed(
                ErrorInfo::new(ErrorKind::ProcessingError, "interrupted"),
                chrono::Utc::now(),
            );
            self.store.update(&job).await?;
            self.webhook.dispatch(&job).await;
        }

        let queued = self.store.queued().await?;
        for job in queued {
            self.queue.push(job.job_id);
        }

        Ok(())
    }

    /// Run the single-worker loop until cancelled. Must be spawned as its
    /// own task; the loop itself never returns an error (`spec.md` §7: "the
    /// loop itself MUST NOT exit").
    pub async fn run(self: Arc<Self>) {
        loop {
            let job_id = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("job processor shutting down");
                    return;
                }
                id = self.queue.pop() => id,
            };

            let Some(job_id) = job_id else { continue };

            // The queue may hold a tombstone for a job that was deleted
            // while waiting — recheck the store and skip anything no longer
            // dispatchable (`spec.md` §5).
            match self.store.get(&job_id).await {
                Ok(Some(job)) if job.status == JobStatus::Queued => {}
                Ok(Some(_)) | Ok(None) => continue,
                Err(e) => {
                    warn!(job_id, error = %e, "failed to look up job before dispatch, skipping");
                    continue;
                }
            }

            *self.current_job_id.write().await = Some(job_id.clone());
            self.running.store(true, Ordering::Release);

            if let Err(e) = self.runner.run(&job_id).await {
                warn!(job_id, error = %e, "pipeline run failed with a store-level error");
            }

            if let Ok(Some(job)) = self.store.get(&job_id).await {
                if job.status.is_terminal() {
                    self.webhook.dispatch(&job).await;
                }
            }

            self.running.store(false, Ordering::Release);
            *self.current_job_id.write().await = None;
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Remove the job row and the on-disk directory tree. Idempotent
    /// (`spec.md` §4.5).
    pub async fn delete(&self, job_id: &str) -> Result<()> {
        if let Some(job) = self.store.get(job_id).await? {
            let job_dir = job.job_dir(&self.data_root);
            if let Err(e) = tokio::fs::remove_dir_all(&job_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(job_id, error = %e, "failed to remove job directory");
                }
            }
        }
        self.store.delete(job_id).await
    }

    /// Scan `Expired()` and delete each; returns the count deleted
    /// (`spec.md` §4.5 "Retention GC").
    pub async fn run_retention_gc(&self) -> Result<usize> {
        let expired = self.store.expired().await?;
        let mut deleted = 0usize;
        for job in expired {
            self.delete(&job.job_id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }

    pub async fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            size: self.queue.len(),
            current_job_id: self.current_job_id.read().await.clone(),
            running: self.running.load(Ordering::Acquire),
        }
    }
}
