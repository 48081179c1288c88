//! Application Context: wires the process-wide singletons together.
//!
//! `SPEC_FULL.md` §9 generalizes the teacher's module-level `ServiceContainer`
//! singleton into an explicit owned object threaded through construction:
//! Job Store → Job Processor (owning the Model Manager and Webhook
//! Dispatcher) → HTTP router, with teardown in reverse.

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::database::{self, JobStore, SqliteJobStore};
use crate::model_manager::{ModelManager, WhisperCliEngine};
use crate::pipeline::{FfmpegExtractor, FileRenderer, HttpFetcher, PipelineRunner};
use crate::processor::JobProcessor;
use crate::webhook::WebhookDispatcher;
use crate::Result;

pub struct AppContext {
    pub settings: Settings,
    pub store: Arc<dyn JobStore>,
    pub model_manager: ModelManager,
    pub processor: Arc<JobProcessor>,
}

impl AppContext {
    pub async fn init(settings: Settings) -> Result<Self> {
        crate::utils::fs::ensure_dir_all(&settings.data_dir).await?;
        crate::utils::fs::ensure_dir_all(&settings.jobs_root()).await?;
        crate::utils::http_client::install_rustls_provider();

        info!(url = %settings.database_url(), "opening job store");
        let pool = database::init_pool(&settings.database_url()).await?;
        database::run_migrations(&pool).await?;
        let store: Arc<dyn JobStore> = Arc::new(SqliteJobStore::new(pool));

        let engine = Arc::new(WhisperCliEngine::new(
            settings.whisper_binary_path.clone(),
            settings.model_name.clone(),
            settings.engine_defaults.clone(),
        ));
        let model_manager = ModelManager::new(engine, settings.model_name.clone(), settings.model_unload_timeout);

        let fetcher = Arc::new(HttpFetcher::new(settings.webhook_timeout));
        let extractor = Arc::new(FfmpegExtractor::new(settings.ffmpeg_binary_path.clone()));
        let renderer = Arc::new(FileRenderer::new());

        let runner = Arc::new(PipelineRunner::new(
            store.clone(),
            model_manager.clone(),
            fetcher,
            extractor,
            renderer,
            &settings,
        ));
        let webhook = Arc::new(WebhookDispatcher::new(settings.webhook_timeout));

        let processor = Arc::new(JobProcessor::new(
            store.clone(),
            runner,
            webhook,
            settings.data_dir.clone(),
        ));

        info!("recovering jobs from a previous run");
        processor.recover().await?;

        Ok(Self {
            settings,
            store,
            model_manager,
            processor,
        })
    }

    /// Spawn the worker loop as its own task. Returns the join handle so the
    /// caller can await it during shutdown.
    pub fn spawn_worker(&self) -> tokio::task::JoinHandle<()> {
        let processor = self.processor.clone();
        tokio::spawn(async move { processor.run().await })
    }

    pub fn shutdown(&self) {
        self.processor.shutdown();
    }
}
