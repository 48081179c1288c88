//! Reference [`Renderer`]: writes the four output artifacts the spec names
//! — structured JSON, plain text, an SRT subtitle track, and a Markdown
//! report — to the job's output directory.

use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use super::{RenderMetadata, RenderOutcome, Renderer};
use crate::model_manager::TranscriptionResult;
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct JsonTranscript<'a> {
    text: &'a str,
    segments: &'a [crate::model_manager::Segment],
    language: &'a str,
    duration: f64,
}

pub struct FileRenderer;

impl FileRenderer {
    pub fn new() -> Self {
        Self
    }

    fn srt_timestamp(seconds: f64) -> String {
        let total_ms = (seconds.max(0.0) * 1000.0).round() as i64;
        let ms = total_ms % 1000;
        let total_secs = total_ms / 1000;
        let secs = total_secs % 60;
        let total_mins = total_secs / 60;
        let mins = total_mins % 60;
        let hours = total_mins / 60;
        format!("{hours:02}:{mins:02}:{secs:02},{ms:03}")
    }

    fn render_srt(result: &TranscriptionResult) -> String {
        let mut out = String::new();
        for (i, segment) in result.segments.iter().enumerate() {
            out.push_str(&format!("{}\n", i + 1));
            out.push_str(&format!(
                "{} --> {}\n",
                Self::srt_timestamp(segment.start),
                Self::srt_timestamp(segment.end)
            ));
            out.push_str(segment.text.trim());
            out.push_str("\n\n");
        }
        out
    }

    fn render_markdown(result: &TranscriptionResult, metadata: &RenderMetadata<'_>) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Transcript: {}\n\n", metadata.job_id));
        if let Some(source) = metadata.source {
            out.push_str(&format!("**Source:** {source}\n\n"));
        }
        out.push_str(&format!("**Language:** {}\n\n", result.language));
        out.push_str(&format!("**Duration:** {:.1}s\n\n", result.duration));
        out.push_str("## Transcript\n\n");
        for segment in &result.segments {
            out.push_str(&format!(
                "- `[{} → {}]` {}\n",
                Self::srt_timestamp(segment.start),
                Self::srt_timestamp(segment.end),
                segment.text.trim()
            ));
        }
        out
    }

    async fn write(path: &Path, contents: &str) -> Result<()> {
        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| Error::io_path("create render output", path, e))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| Error::io_path("write render output", path, e))?;
        Ok(())
    }
}

impl Default for FileRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Renderer for FileRenderer {
    async fn render(
        &self,
        result: &TranscriptionResult,
        dest_dir: &Path,
        metadata: RenderMetadata<'_>,
    ) -> Result<RenderOutcome> {
        let json_path = dest_dir.join(format!("{}.json", metadata.job_id));
        let txt_path = dest_dir.join(format!("{}.txt", metadata.job_id));
        let srt_path = dest_dir.join(format!("{}.srt", metadata.job_id));
        let md_path = dest_dir.join(format!("{}.md", metadata.job_id));

        let json_body = serde_json::to_string_pretty(&JsonTranscript {
            text: &result.text,
            segments: &result.segments,
            language: &result.language,
            duration: result.duration,
        })?;
        let srt_body = Self::render_srt(result);
        let md_body = Self::render_markdown(result, &metadata);

        Self::write(&json_path, &json_body).await?;
        Self::write(&txt_path, result.text.trim()).await?;
        Self::write(&srt_path, &srt_body).await?;
        Self::write(&md_path, &md_body).await?;

        Ok(RenderOutcome {
            json: json_path,
            txt: txt_path,
            srt: srt_path,
            md: md_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srt_timestamp_formats_hours_minutes_seconds_millis() {
        assert_eq!(FileRenderer::srt_timestamp(0.0), "00:00:00,000");
        assert_eq!(FileRenderer::srt_timestamp(61.5), "00:01:01,500");
        assert_eq!(FileRenderer::srt_timestamp(3661.25), "01:01:01,250");
    }
}
