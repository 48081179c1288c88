use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{ErrorInfo, JobStatus};

/// The single aggregate in the system (`spec.md` §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    /// Kept identical to `status` at all times (`spec.md` §9 resolves the
    /// original's ambiguity by tightening this to "always equal").
    pub stage: JobStatus,
    pub progress: u8,

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
    pub error: Option<ErrorInfo>,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl Job {
    /// Build a freshly submitted job. `retention` sets `expires_at`.
    pub fn new(
        job_id: String,
        url: Option<String>,
        filename: Option<String>,
        input_path: Option<String>,
        webhook_url: Option<String>,
        created_at: DateTime<Utc>,
        retention: chrono::Duration,
    ) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            stage: JobStatus::Queued,
            progress: 0,
            url,
            filename,
            input_path,
            audio_path: None,
            output_json: None,
            output_txt: None,
            output_srt: None,
            output_md: None,
            webhook_url,
            duration_seconds: None,
            error: None,
            created_at,
            started_at: None,
            completed_at: None,
            failed_at: None,
            expires_at: created_at + retention,
        }
    }

    /// Directory under `<data_root>/jobs/<job_id>/` this job owns.
    pub fn job_dir(&self, data_root: &Path) -> PathBuf {
        data_root.join("jobs").join(&self.job_id)
    }

    pub fn input_dir(&self, data_root: &Path) -> PathBuf {
        self.job_dir(data_root).join("input")
    }

    pub fn output_dir(&self, data_root: &Path) -> PathBuf {
        self.job_dir(data_root).join("output")
    }

    pub fn logs_dir(&self, data_root: &Path) -> PathBuf {
        self.job_dir(data_root).join("logs")
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move into a new stage: resets progress to 0 and keeps `status`/`stage`
    /// equal (invariant from `spec.md` §9).
    pub fn enter_stage(&mut self, stage: JobStatus) {
        self.status = stage;
        self.stage = stage;
        self.progress = 0;
    }

    /// Apply a progress callback value, clamping to `[0,100]` and discarding
    /// any value that would lower progress within the current stage
    /// (`spec.md` §4.4 edge-case policy).
    pub fn apply_progress(&mut self, value: i32) {
        let clamped = value.clamp(0, 100) as u8;
        if clamped > self.progress {
            self.progress = clamped;
        }
    }

    pub fn mark_failed(&mut self, error: ErrorInfo, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.stage = JobStatus::Failed;
        self.error = Some(error);
        self.failed_at = Some(now);
    }

    pub fn mark_completed(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.stage = JobStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Job {
        Job::new(
            "JOB-AAAAAA".into(),
            Some("http://example.com/clip.mp4".into()),
            None,
            None,
            None,
            Utc::now(),
            chrono::Duration::days(7),
        )
    }

    #[test]
    fn progress_is_monotone_within_a_stage() {
        let mut job = sample();
        job.enter_stage(JobStatus::Downloading);
        job.apply_progress(50);
        job.apply_progress(20);
        assert_eq!(job.progress, 50, "a lower value must be discarded");
        job.apply_progress(90);
        assert_eq!(job.progress, 90);
    }

    #[test]
    fn progress_is_clamped() {
        let mut job = sample();
        job.apply_progress(150);
        assert_eq!(job.progress, 100);
        job.progress = 0;
        job.apply_progress(-10);
        assert_eq!(job.progress, 0);
    }

    #[test]
    fn entering_a_stage_resets_progress_and_keeps_status_and_stage_equal() {
        let mut job = sample();
        job.apply_progress(80);
        job.enter_stage(JobStatus::Extracting);
        assert_eq!(job.progress, 0);
        assert_eq!(job.status, job.stage);
        assert_eq!(job.status, JobStatus::Extracting);
    }
}
