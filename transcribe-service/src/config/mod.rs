//! Environment-driven configuration (`spec.md` §6).
//!
//! Loaded from `std::env` (after `dotenvy::dotenv()` has populated the
//! process environment), matching the teacher's env-only configuration
//! style. No config file format is introduced: this system has no
//! per-entity configuration the way the teacher's DB-backed `ConfigService`
//! does, so env-only is the right-sized carry-over.

use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default speech-to-text inference knobs (`spec.md` §4.2), carried
/// verbatim from `original_source/whisper_manager.py`'s `WHISPER_SETTINGS`.
#[derive(Debug, Clone)]
pub struct EngineDefaults {
    pub language: String,
    pub beam_size: u32,
    pub best_of: u32,
    pub temperature: f32,
    pub condition_on_previous_text: bool,
    pub compression_ratio_threshold: f32,
    pub logprob_threshold: f32,
    pub no_speech_threshold: f32,
    pub word_timestamps: bool,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            language: "ja".to_string(),
            beam_size: 5,
            best_of: 5,
            temperature: 0.0,
            condition_on_previous_text: false,
            compression_ratio_threshold: 2.4,
            logprob_threshold: -1.0,
            no_speech_threshold: 0.6,
            word_timestamps: false,
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub debug: bool,

    pub data_dir: PathBuf,
    pub job_retention: chrono::Duration,
    pub max_upload_size_bytes: u64,

    pub model_unload_timeout: Duration,
    pub model_name: String,

    pub admin_password: String,

    pub whisper_binary_path: String,
    pub ffmpeg_binary_path: String,

    pub webhook_timeout: Duration,

    pub engine_defaults: EngineDefaults,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| Error::config(format!("invalid value for {key}: '{raw}'"))),
        Err(_) => Ok(default),
    }
}

impl Settings {
    /// Load settings from the environment. Fails (exit code 1 per `spec.md`
    /// §6) when `data_dir` cannot be created/written.
    pub fn from_env() -> Result<Self> {
        let host = env_or("HOST", "0.0.0.0");
        let port = env_parse("PORT", 8000u16)?;
        let debug = env_parse("DEBUG", false)?;

        let data_dir = PathBuf::from(env_or("DATA_DIR", "./data"));
        let job_retention_days = env_parse("JOB_RETENTION_DAYS", 7i64)?;
        let max_upload_size_mb = env_parse("MAX_UPLOAD_SIZE_MB", 10240u64)?;
        let model_unload_minutes = env_parse("MODEL_UNLOAD_MINUTES", 5u64)?;
        let model_name = env_or("MODEL_NAME", "large-v3");
        let admin_password = env_or("ADMIN_PASSWORD", "");
        let whisper_binary_path = env_or("WHISPER_BINARY_PATH", "whisper");
        let ffmpeg_binary_path = env_or("FFMPEG_BINARY_PATH", "ffmpeg");
        let webhook_timeout_secs = env_parse("WEBHOOK_TIMEOUT_SECS", 10u64)?;

        let mut engine_defaults = EngineDefaults::default();
        if let Ok(lang) = std::env::var("WHISPER_LANGUAGE") {
            engine_defaults.language = lang;
        }

        Ok(Self {
            host,
            port,
            debug,
            data_dir,
            job_retention: chrono::Duration::days(job_retention_days),
            max_upload_size_bytes: max_upload_size_mb * 1024 * 1024,
            model_unload_timeout: Duration::from_secs(model_unload_minutes * 60),
            model_name,
            admin_password,
            whisper_binary_path,
            ffmpeg_binary_path,
            webhook_timeout: Duration::from_secs(webhook_timeout_secs),
            engine_defaults,
        })
    }

    pub fn jobs_db_path(&self) -> PathBuf {
        self.data_dir.join("jobs.db")
    }

    pub fn database_url(&self) -> String {
        format!("sqlite://{}?mode=rwc", self.jobs_db_path().display())
    }

    pub fn jobs_root(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_spec() {
        let defaults = EngineDefaults::default();
        assert_eq!(defaults.language, "ja");
        assert_eq!(defaults.beam_size, 5);
        assert_eq!(defaults.best_of, 5);
        assert_eq!(defaults.temperature, 0.0);
        assert!(!defaults.condition_on_previous_text);
        assert_eq!(defaults.compression_ratio_threshold, 2.4);
        assert_eq!(defaults.logprob_threshold, -1.0);
        assert_eq!(defaults.no_speech_threshold, 0.6);
        assert!(!defaults.word_timestamps);
    }
}
