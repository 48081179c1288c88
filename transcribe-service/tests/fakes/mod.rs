//! Fake collaborators for exercising the Pipeline Runner and Job Processor
//! without a real `ffmpeg`/`whisper`/network stack, per `SPEC_FULL.md` §4.7.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use transcribe_service::model_manager::{
    InferenceOverrides, ProgressCallback, Segment, SttEngine, TranscriptionResult,
};
use transcribe_service::pipeline::{ExtractOutcome, Extractor, FetchOutcome, Fetcher};
use transcribe_service::{Error, Result};

/// Records the order in which `fetch`/`extract`/`transcribe` are invoked so
/// concurrency tests can assert strict FIFO dispatch.
#[derive(Default)]
pub struct CallLog {
    pub calls: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn record(&self, job_id: &str) {
        self.calls.lock().expect("call log mutex poisoned").push(job_id.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.calls.lock().expect("call log mutex poisoned").clone()
    }
}

pub enum FetchBehavior {
    Succeed { duration_secs: Option<f64> },
    Fail(String),
}

pub struct FakeFetcher {
    behavior: FetchBehavior,
    log: Option<std::sync::Arc<CallLog>>,
}

impl FakeFetcher {
    pub fn succeeding(duration_secs: Option<f64>) -> Self {
        Self {
            behavior: FetchBehavior::Succeed { duration_secs },
            log: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            behavior: FetchBehavior::Fail(message.into()),
            log: None,
        }
    }

    pub fn with_log(mut self, log: std::sync::Arc<CallLog>) -> Self {
        self.log = Some(log);
        self
    }
}

#[async_trait::async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(
        &self,
        _url: &str,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FetchOutcome> {
        if let Some(log) = &self.log {
            log.record(job_id);
        }
        if let Some(cb) = &on_progress {
            cb(50);
        }
        match &self.behavior {
            FetchBehavior::Succeed { duration_secs } => Ok(FetchOutcome {
                path: dest_dir.join(format!("{job_id}.src")),
                duration_secs: *duration_secs,
            }),
            FetchBehavior::Fail(message) => Err(Error::Download(message.clone())),
        }
    }
}

pub struct FakeExtractor {
    duration_secs: Option<f64>,
}

impl FakeExtractor {
    pub fn succeeding(duration_secs: Option<f64>) -> Self {
        Self { duration_secs }
    }
}

#[async_trait::async_trait]
impl Extractor for FakeExtractor {
    async fn extract(
        &self,
        _source_path: &Path,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ExtractOutcome> {
        if let Some(cb) = &on_progress {
            cb(100);
        }
        Ok(ExtractOutcome {
            path: dest_dir.join(format!("{job_id}.wav")),
            duration_secs: self.duration_secs,
        })
    }
}

pub struct FakeSttEngine {
    pub load_calls: AtomicUsize,
    pub unload_calls: AtomicUsize,
    text: String,
}

impl FakeSttEngine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            load_calls: AtomicUsize::new(0),
            unload_calls: AtomicUsize::new(0),
            text: text.into(),
        }
    }
}

#[async_trait::async_trait]
impl SttEngine for FakeSttEngine {
    fn name(&self) -> &str {
        "fake-model"
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
        on_progress: Option<ProgressCallback>,
    ) -> Result<TranscriptionResult> {
        if let Some(cb) = &on_progress {
            cb(100);
        }
        Ok(TranscriptionResult {
            text: self.text.clone(),
            segments: vec![Segment {
                start: 0.0,
                end: 1.0,
                text: self.text.clone(),
            }],
            language: "en".to_string(),
            duration: 1.0,
        })
    }
}
