use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A job's status/stage. `status` and `stage` are maintained in lock-step
/// (`spec.md` §9 tightens the original's ambiguous decoupling to "always
/// equal"), so a single enum serves both columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Extracting,
    Transcribing,
    Formatting,
    Completed,
    Failed,
}

impl JobStatus {
    /// Position in the declared DAG, used to order (stage, progress) pairs
    /// for the monotonicity invariant in `spec.md` §8. `Failed` is terminal
    /// but reachable from any non-terminal stage, so it has no fixed index
    /// relative to the others beyond being terminal.
    pub fn stage_index(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Downloading => 1,
            JobStatus::Extracting => 2,
            JobStatus::Transcribing => 3,
            JobStatus::Formatting => 4,
            JobStatus::Completed => 5,
            JobStatus::Failed => 6,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Downloading => "downloading",
            JobStatus::Extracting => "extracting",
            JobStatus::Transcribing => "transcribing",
            JobStatus::Formatting => "formatting",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "downloading" => Ok(JobStatus::Downloading),
            "extracting" => Ok(JobStatus::Extracting),
            "transcribing" => Ok(JobStatus::Transcribing),
            "formatting" => Ok(JobStatus::Formatting),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(crate::Error::Other(format!("unknown job status '{other}'"))),
        }
    }
}
