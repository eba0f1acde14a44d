//! Build report and stable exit codes.
//!
//! The report is the terminal outcome record of one build: status, failure
//! kind, pybundle's stable exit code, and the backend's own exit code when
//! it ran. Reports serialize to JSON and are written atomically.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pybundle_supervisor::{JobState, TerminalReport};

/// Schema version for report.json
pub const SCHEMA_VERSION: u32 = 1;

/// Schema identifier
pub const SCHEMA_ID: &str = "pybundle/report@1";

/// Stable exit code for a successful build
pub const EXIT_CODE_SUCCESS: i32 = 0;

/// Stable exit code for a cancelled build
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Build status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Failed,
    Cancelled,
}

/// What failed, when status is `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureKind {
    /// Bundling options were rejected by validation
    Options,
    /// No usable interpreter, or PyInstaller missing from it
    Interpreter,
    /// PyInstaller could not be spawned
    Launch,
    /// PyInstaller ran and exited nonzero (or was killed)
    Pyinstaller,
}

impl FailureKind {
    /// The stable exit code for this failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            FailureKind::Options => 10,
            FailureKind::Interpreter => 20,
            FailureKind::Launch => 40,
            FailureKind::Pyinstaller => 50,
        }
    }
}

/// Errors from report persistence
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Terminal outcome record for one build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    /// Schema version
    pub schema_version: u32,

    /// Schema identifier
    pub schema_id: String,

    /// Job identifier; absent when the build was rejected before launch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,

    /// The command that was (or would have been) run
    #[serde(default)]
    pub command: Vec<String>,

    /// When the report was created
    pub created_at: DateTime<Utc>,

    /// Build status
    pub status: Status,

    /// Failure kind, when status is not success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// pybundle's stable exit code
    pub exit_code: i32,

    /// PyInstaller's own exit code, when it ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_exit_code: Option<i32>,

    /// Signal that killed PyInstaller, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_term_signal: Option<String>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Human-readable summary
    pub human_summary: String,
}

impl BuildReport {
    /// A report for a build rejected before launch (no job was created)
    pub fn rejected(kind: FailureKind, human_summary: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            job_id: None,
            command: Vec::new(),
            created_at: Utc::now(),
            status: Status::Failed,
            failure_kind: Some(kind),
            exit_code: kind.exit_code(),
            backend_exit_code: None,
            backend_term_signal: None,
            duration_ms: 0,
            human_summary: human_summary.into(),
        }
    }

    /// A report from the supervisor's terminal outcome
    pub fn from_terminal(command: Vec<String>, terminal: &TerminalReport) -> Self {
        let (status, failure_kind, exit_code, human_summary) = match terminal.state {
            JobState::Succeeded => (
                Status::Success,
                None,
                EXIT_CODE_SUCCESS,
                "build succeeded".to_string(),
            ),
            JobState::Cancelled => (
                Status::Cancelled,
                None,
                EXIT_CODE_CANCELLED,
                "build cancelled".to_string(),
            ),
            _ => {
                if let Some(ref reason) = terminal.launch_error {
                    (
                        Status::Failed,
                        Some(FailureKind::Launch),
                        FailureKind::Launch.exit_code(),
                        format!("PyInstaller failed to start: {}", reason),
                    )
                } else {
                    let detail = match (terminal.exit_code, &terminal.term_signal) {
                        (Some(code), _) => format!("exit code {}", code),
                        (None, Some(signal)) => format!("signal {}", signal),
                        (None, None) => "unknown cause".to_string(),
                    };
                    (
                        Status::Failed,
                        Some(FailureKind::Pyinstaller),
                        FailureKind::Pyinstaller.exit_code(),
                        format!("PyInstaller failed with {}", detail),
                    )
                }
            }
        };

        Self {
            schema_version: SCHEMA_VERSION,
            schema_id: SCHEMA_ID.to_string(),
            job_id: Some(terminal.job_id.to_string()),
            command,
            created_at: Utc::now(),
            status,
            failure_kind,
            exit_code,
            backend_exit_code: terminal.exit_code,
            backend_term_signal: terminal.term_signal.clone(),
            duration_ms: terminal.duration_ms,
            human_summary,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write atomically to file (write-then-rename)
    pub fn write_to_file(&self, path: &Path) -> Result<(), ReportError> {
        let json = self.to_json()?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &json)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }
}
