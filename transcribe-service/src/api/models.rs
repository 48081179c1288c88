//! Request/response DTOs for the HTTP API (`spec.md` §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ErrorInfo, Job, JobStatus};
use crate::model_manager::ModelStatus;
use crate::processor::QueueStatus;

/// Optional `webhook_url` field shared by both submission encodings.
#[derive(Debug, Deserialize)]
pub struct SubmitJobForm {
    pub url: Option<String>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub job_id: String,
    pub status: JobStatus,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadUrls {
    pub json: String,
    pub txt: String,
    pub srt: String,
    pub md: String,
}

/// The status-view wire format from `spec.md` §6.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub job_id: String,
    pub status: JobStatus,
    pub stage: JobStatus,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub error: Option<ErrorInfo>,
    pub download_urls: Option<DownloadUrls>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let download_urls = (job.status == JobStatus::Completed).then(|| DownloadUrls {
            json: format!("/api/jobs/{}/download?format=json", job.job_id),
            txt: format!("/api/jobs/{}/download?format=txt", job.job_id),
            srt: format!("/api/jobs/{}/download?format=srt", job.job_id),
            md: format!("/api/jobs/{}/download?format=md", job.job_id),
        });

        Self {
            job_id: job.job_id.clone(),
            status: job.status,
            stage: job.stage,
            progress: job.progress,
            created_at: job.created_at,
            completed_at: job.completed_at,
            failed_at: job.failed_at,
            expires_at: job.expires_at,
            duration_seconds: job.duration_seconds,
            error: job.error.clone(),
            download_urls,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<JobView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub format: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub whisper: ModelStatus,
    pub queue: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct AdminStatsResponse {
    pub counts: std::collections::BTreeMap<String, i64>,
    pub whisper: ModelStatus,
    pub queue: QueueStatus,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub deleted_count: usize,
}
