//! Events delivered to the caller while a job runs.
//!
//! A job produces zero or more `Line` events in arrival order, then exactly
//! one `Terminated` event carrying the terminal outcome.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::job::JobState;

/// Which pipe a line of output arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputSource {
    Stdout,
    Stderr,
}

/// One line of process output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputLine {
    /// Pipe the line arrived on
    pub source: OutputSource,
    /// Line text, without the trailing newline
    pub text: String,
}

/// Terminal outcome record for a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalReport {
    /// Job identifier
    pub job_id: Uuid,

    /// Terminal state (SUCCEEDED, FAILED, or CANCELLED)
    pub state: JobState,

    /// Process exit code, when the process exited normally
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Signal name when the process was killed by a signal (e.g., "SIG15")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_signal: Option<String>,

    /// Reason the process could not be spawned, when it never ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub launch_error: Option<String>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl TerminalReport {
    /// Whether the job completed successfully
    pub fn is_success(&self) -> bool {
        self.state == JobState::Succeeded
    }

    /// Whether the job was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.state == JobState::Cancelled
    }

    /// Whether the process never started
    pub fn is_launch_failure(&self) -> bool {
        self.launch_error.is_some()
    }
}

/// Event emitted by the supervisor for the lifetime of one job
#[derive(Debug, Clone)]
pub enum JobEvent {
    /// One line of output, in arrival order
    Line(OutputLine),
    /// The job reached a terminal state; emitted exactly once
    Terminated(TerminalReport),
}
