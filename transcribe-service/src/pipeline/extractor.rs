//! Reference [`Extractor`]: shells out to `ffmpeg` to produce 16 kHz mono
//! 16-bit PCM WAV from an arbitrary source file.
//!
//! Grounded on `downloader::engine::ffmpeg::FfmpegEngine` — same
//! `process_utils::tokio_command` spawn, same `time=HH:MM:SS.ms` progress
//! parsing (`downloader::engine::utils::ffmpeg_parser::parse_time`) — narrowed
//! to the single-file, single-pass case this pipeline needs.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::{ExtractOutcome, Extractor};
use crate::model_manager::ProgressCallback;
use crate::{Error, Result};

/// Parse `HH:MM:SS.ms` into seconds.
fn parse_time(time_str: &str) -> Option<f64> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn parse_time_field(line: &str) -> Option<f64> {
    let time_start = line.find("time=")?;
    let time_str = &line[time_start + 5..];
    let end = time_str.find(' ').unwrap_or(time_str.len());
    parse_time(&time_str[..end])
}

fn parse_duration_field(line: &str) -> Option<f64> {
    let start = line.find("Duration: ")?;
    let rest = &line[start + "Duration: ".len()..];
    let end = rest.find(',').unwrap_or(rest.len());
    parse_time(rest[..end].trim())
}

pub struct FfmpegExtractor {
    binary_path: String,
}

impl FfmpegExtractor {
    pub fn new(binary_path: impl Into<String>) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl Extractor for FfmpegExtractor {
    async fn extract(
        &self,
        source_path: &Path,
        dest_dir: &Path,
        job_id: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<ExtractOutcome> {
        let out_path = dest_dir.join(format!("{job_id}.wav"));

        let mut cmd = process_utils::tokio_command(&self.binary_path);
        cmd.arg("-y")
            .arg("-hide_banner")
            .arg("-i")
            .arg(source_path)
            .arg("-ar")
            .arg("16000")
            .arg("-ac")
            .arg("1")
            .arg("-c:a")
            .arg("pcm_s16le")
            .arg(&out_path)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Extraction(format!("failed to spawn {}: {e}", self.binary_path)))?;

        let stderr = child.stderr.take().expect("stderr was piped");
        let mut lines = BufReader::new(stderr).lines();

        let mut known_duration: Option<f64> = None;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(duration) = parse_duration_field(&line) {
                known_duration = Some(duration);
            }
            if let (Some(elapsed), Some(cb)) = (parse_time_field(&line), on_progress.clone()) {
                if let Some(total) = known_duration.filter(|d| *d > 0.0) {
                    let pct = ((elapsed / total) * 100.0).floor() as i32;
                    cb(pct);
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| Error::Extraction(format!("failed waiting on {}: {e}", self.binary_path)))?;

        if !status.success() {
            return Err(Error::Extraction(format!(
                "{} exited with {status} extracting {}",
                self.binary_path,
                source_path.display()
            )));
        }

        if let Some(cb) = on_progress {
            cb(100);
        }

        Ok(ExtractOutcome {
            path: out_path,
            duration_secs: known_duration,
        })
    }
}
