//! Webhook Dispatcher (C3): fire-and-forget POST on a job's terminal
//! transition (`spec.md` §4.3).
//!
//! Grounded on the teacher's `notification::channels::webhook::WebhookChannel`
//! but simplified: a single POST, no auth schemes, no header customization,
//! no priority filter — the spec calls for exactly one best-effort delivery
//! attempt per terminal transition, logged and otherwise swallowed.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{ErrorInfo, Job, JobStatus};

/// Download URLs for the four rendered artifacts, in the same shape the
/// status endpoint exposes them (`spec.md` §4.3, §6).
#[derive(Debug, Serialize)]
struct DownloadUrls {
    json: String,
    txt: String,
    srt: String,
    md: String,
}

/// The payload posted to a job's `webhook_url` on completion or failure,
/// matching `spec.md` §4.3's wire format exactly.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    event: &'static str,
    job_id: &'a str,
    status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    download_urls: Option<DownloadUrls>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorInfo>,
}

/// Dispatches a single fire-and-forget POST per terminal job transition.
///
/// Never returns an error to the caller: failures are logged and swallowed,
/// since a webhook delivery failure must not affect job state (`spec.md`
/// §4.3).
pub struct WebhookDispatcher {
    client: Client,
}

impl WebhookDispatcher {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client }
    }

    /// Post the job's terminal state to `job.webhook_url`, if set. No-op for
    /// jobs without a configured webhook, and for non-terminal jobs.
    pub async fn dispatch(&self, job: &Job) {
        let Some(url) = job.webhook_url.as_deref() else {
            return;
        };
        if !job.status.is_terminal() {
            return;
        }

        let event = match job.status {
            JobStatus::Completed => "job.completed",
            JobStatus::Failed => "job.failed",
            _ => return,
        };

        let download_urls = (job.status == JobStatus::Completed).then(|| DownloadUrls {
            json: format!("/api/jobs/{}/download?format=json", job.job_id),
            txt: format!("/api/jobs/{}/download?format=txt", job.job_id),
            srt: format!("/api/jobs/{}/download?format=srt", job.job_id),
            md: format!("/api/jobs/{}/download?format=md", job.job_id),
        });

        let payload = WebhookPayload {
            event,
            job_id: &job.job_id,
            status: job.status,
            download_urls,
            error: job.error.as_ref(),
        };

        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(job_id = %job.job_id, %url, "webhook delivered");
            }
            Ok(response) => {
                warn!(
                    job_id = %job.job_id,
                    %url,
                    status = %response.status(),
                    "webhook rejected"
                );
            }
            Err(e) => {
                warn!(job_id = %job.job_id, %url, error = %e, "webhook delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generate_job_id;
    use chrono::Utc;

    fn sample_job() -> Job {
        let now = Utc::now();
        let mut job = Job::new(
            generate_job_id(),
            Some("https://example.com/audio.mp3".to_string()),
            None,
            Some("/data/in.mp3".to_string()),
            Some("https://example.com/hook".to_string()),
            now,
            chrono::Duration::days(7),
        );
        job.mark_completed(now);
        job
    }

    #[tokio::test]
    async fn dispatch_without_url_is_a_noop() {
        let mut job = sample_job();
        job.webhook_url = None;
        let dispatcher = WebhookDispatcher::new(Duration::from_secs(10));
        dispatcher.dispatch(&job).await;
    }

    #[tokio::test]
    async fn dispatch_skips_non_terminal_jobs() {
        let mut job = sample_job();
        job.enter_stage(JobStatus::Downloading);
        let dispatcher = WebhookDispatcher::new(Duration::from_secs(10));
        // Points at a URL that would fail to connect; since the job isn't
        // terminal this must return without attempting the request.
        dispatcher.dispatch(&job).await;
    }
}
