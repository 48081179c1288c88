use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::str::FromStr;

use crate::domain::{ErrorInfo, Job, JobStatus};
use crate::{Error, Result};

/// Row shape for the `jobs` table. Kept separate from [`Job`] so the
/// database layer owns its own `TEXT`-friendly representation (status/stage
/// as strings, error as a JSON `TEXT` column) without leaking SQLite
/// encoding concerns into the domain type.
#[derive(Debug, Clone, FromRow)]
pub struct JobRow {
    pub job_id: String,
    pub status: String,
    pub stage: String,
    pub progress: i64,

    pub url: Option<String>,
    pub filename: Option<String>,
    pub input_path: Option<String>,
    pub audio_path: Option<String>,

    pub output_json: Option<String>,
    pub output_txt: Option<String>,
    pub output_srt: Option<String>,
    pub output_md: Option<String>,

    pub webhook_url: Option<String>,
    pub duration_seconds: Option<i64>,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl JobRow {
    pub fn into_job(self) -> Result<Job> {
        let error = self
            .error
            .map(|raw| serde_json::from_str::<ErrorInfo>(&raw))
            .transpose()?;

        Ok(Job {
            job_id: self.job_id,
            status: JobStatus::from_str(&self.status)?,
            stage: JobStatus::from_str(&self.stage)?,
            progress: self.progress.clamp(0, 100) as u8,
            url: self.url,
            filename: self.filename,
            input_path: self.input_path,
            audio_path: self.audio_path,
            output_json: self.output_json,
            output_txt: self.output_txt,
            output_srt: self.output_srt,
            output_md: self.output_md,
            webhook_url: self.webhook_url,
            duration_seconds: self.duration_seconds,
            error,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            failed_at: self.failed_at,
            expires_at: self.expires_at,
        })
    }

    pub fn from_job(job: &Job) -> Result<Self> {
        let error = job
            .error
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(Error::from)?;

        Ok(Self {
            job_id: job.job_id.clone(),
            status: job.status.to_string(),
            stage: job.stage.to_string(),
            progress: job.progress as i64,
            url: job.url.clone(),
            filename: job.filename.clone(),
            input_path: job.input_path.clone(),
            audio_path: job.audio_path.clone(),
            output_json: job.output_json.clone(),
            output_txt: job.output_txt.clone(),
            output_srt: job.output_srt.clone(),
            output_md: job.output_md.clone(),
            webhook_url: job.webhook_url.clone(),
            duration_seconds: job.duration_seconds,
            error,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            failed_at: job.failed_at,
            expires_at: job.expires_at,
        })
    }
}
