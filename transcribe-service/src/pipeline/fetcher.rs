//! Reference [`Fetcher`]: downloads a remote media URL to the job's input
//! directory over plain HTTP(S) (`spec.md` §4.4).
//!
//! Grounded on the teacher's `reqwest`-based client wiring
//! (`utils::http_client`) rather than the teacher's own stream-protocol
//! engines (HLS/FLV/mesio) — those solve live-stream capture, which this
//! pipeline's "URL → file" contract does not need.

use std::path::Path;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;

use super::{FetchOutcome, Fetcher};
use crate::model_manager::ProgressCallback;
use crate::utils::http_client;
use crate::{Error, Result};

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: http_client::build_client(timeout),
        }
    }

    fn filename_for(url: &str, job_id: &str) -> String {
        let ext = Path::new(url)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("bin");
        format!("{job_id}.{ext}")
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<FetchOutcome> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Download(format!("request to {url} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "{url} returned status {}",
                response.status()
            )));
        }

        let total_bytes = response.content_length();
        let dest_path = dest_dir.join(Self::filename_for(url, job_id));
        let mut file = tokio::fs::File::create(&dest_path)
            .await
            .map_err(|e| Error::io_path("create fetch destination", &dest_path, e))?;

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Download(format!("reading body from {url}: {e}")))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| Error::io_path("write fetched chunk", &dest_path, e))?;
            downloaded += chunk.len() as u64;

            if let (Some(total), Some(cb)) = (total_bytes, on_progress.clone()) {
                if total > 0 {
                    let pct = ((downloaded as f64 / total as f64) * 100.0).floor() as i32;
                    cb(pct);
                }
            }
        }
        file.flush().await.map_err(|e| Error::io_path("flush fetched file", &dest_path, e))?;

        if let Some(cb) = on_progress {
            cb(100);
        }

        Ok(FetchOutcome {
            path: dest_path,
            duration_secs: None,
        })
    }
}
