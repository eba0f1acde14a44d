//! Job record and state machine
//!
//! Job states: PENDING → RUNNING → {SUCCEEDED | FAILED | CANCELLED}
//! with CANCEL_REQUESTED as intermediate state

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::OutputLine;

/// Job state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job created, process not yet spawned
    Pending,
    /// Process is executing
    Running,
    /// Cancellation has been requested (intermediate state)
    CancelRequested,
    /// Process exited with code 0
    Succeeded,
    /// Process failed to launch, exited nonzero, or was killed
    Failed,
    /// Process was terminated after a cancel request
    Cancelled,
}

impl JobState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::Cancelled
        )
    }

    /// Check if transition from this state to target is valid
    pub fn can_transition_to(&self, target: JobState) -> bool {
        match (self, target) {
            // From PENDING
            (JobState::Pending, JobState::Running) => true,
            (JobState::Pending, JobState::Failed) => true, // launch failure
            (JobState::Pending, JobState::Cancelled) => true,

            // From RUNNING
            (JobState::Running, JobState::Succeeded) => true,
            (JobState::Running, JobState::Failed) => true,
            (JobState::Running, JobState::CancelRequested) => true,
            (JobState::Running, JobState::Cancelled) => true,

            // From CANCEL_REQUESTED
            (JobState::CancelRequested, JobState::Cancelled) => true,
            (JobState::CancelRequested, JobState::Failed) => true, // died while cancelling
            (JobState::CancelRequested, JobState::Succeeded) => true, // finished before cancel took effect

            // Terminal states cannot transition
            _ => false,
        }
    }

    /// Check if this is a cancel-related state
    pub fn is_cancelling(&self) -> bool {
        matches!(self, JobState::CancelRequested | JobState::Cancelled)
    }
}

/// Errors for job state operations
#[derive(Debug, thiserror::Error)]
pub enum JobStateError {
    #[error("invalid state transition from {from:?} to {to:?}")]
    InvalidTransition { from: JobState, to: JobState },
}

/// One supervised external-process invocation and its lifecycle.
///
/// Created when the caller starts a build, mutated by output-arrival and
/// termination events, replaced when a new job starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job identifier
    pub id: Uuid,

    /// Program being executed
    pub program: String,

    /// Program arguments
    pub args: Vec<String>,

    /// Working directory of the process
    pub working_dir: PathBuf,

    /// Current state
    pub state: JobState,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the process was spawned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the process reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Exit code, present only once terminal (absent when killed by signal)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,

    /// Termination signal name when killed by signal (e.g., "SIG15")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term_signal: Option<String>,

    /// Captured output lines, in arrival order
    pub output: Vec<OutputLine>,
}

impl Job {
    /// Create a new job in PENDING state
    pub fn new(program: &str, args: Vec<String>, working_dir: PathBuf) -> Self {
        Self {
            id: Uuid::new_v4(),
            program: program.to_string(),
            args,
            working_dir,
            state: JobState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            exit_code: None,
            term_signal: None,
            output: Vec::new(),
        }
    }

    /// Transition to a new state
    pub fn transition(&mut self, new_state: JobState) -> Result<(), JobStateError> {
        if !self.state.can_transition_to(new_state) {
            return Err(JobStateError::InvalidTransition {
                from: self.state,
                to: new_state,
            });
        }
        self.state = new_state;
        Ok(())
    }

    /// Start the job (PENDING → RUNNING), stamping the start time
    pub fn start(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Mark the job as succeeded
    pub fn succeed(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::Succeeded)
    }

    /// Mark the job as failed
    pub fn fail(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::Failed)
    }

    /// Request cancellation (RUNNING → CANCEL_REQUESTED)
    pub fn request_cancel(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::CancelRequested)
    }

    /// Complete cancellation
    pub fn cancel(&mut self) -> Result<(), JobStateError> {
        self.transition(JobState::Cancelled)
    }

    /// Check if the job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The full command line, program first
    pub fn command_line(&self) -> Vec<String> {
        let mut cmd = Vec::with_capacity(self.args.len() + 1);
        cmd.push(self.program.clone());
        cmd.extend(self.args.iter().cloned());
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_job() -> Job {
        Job::new(
            "echo",
            vec!["hello".to_string()],
            PathBuf::from("/tmp"),
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = make_job();
        assert_eq!(job.state, JobState::Pending);
        assert!(job.started_at.is_none());
        assert!(job.exit_code.is_none());
        assert!(job.output.is_empty());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut job = make_job();

        assert!(job.start().is_ok());
        assert_eq!(job.state, JobState::Running);
        assert!(job.started_at.is_some());

        assert!(job.succeed().is_ok());
        assert_eq!(job.state, JobState::Succeeded);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_cancel_flow() {
        let mut job = make_job();

        job.start().unwrap();
        assert!(job.request_cancel().is_ok());
        assert_eq!(job.state, JobState::CancelRequested);
        assert!(job.state.is_cancelling());
        assert!(!job.is_terminal());

        assert!(job.cancel().is_ok());
        assert_eq!(job.state, JobState::Cancelled);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_cancel_requested_can_still_succeed() {
        let mut job = make_job();

        job.start().unwrap();
        job.request_cancel().unwrap();

        // Process finished before the cancel took effect
        assert!(job.succeed().is_ok());
        assert_eq!(job.state, JobState::Succeeded);
    }

    #[test]
    fn test_launch_failure_from_pending() {
        let mut job = make_job();

        // Spawn error fails the job without ever running
        assert!(job.fail().is_ok());
        assert_eq!(job.state, JobState::Failed);
    }

    #[test]
    fn test_invalid_transition() {
        let mut job = make_job();

        // Cannot go directly from PENDING to SUCCEEDED
        let result = job.transition(JobState::Succeeded);
        assert!(result.is_err());
        assert_eq!(job.state, JobState::Pending);
    }

    #[test]
    fn test_terminal_state_is_never_left() {
        let mut job = make_job();
        job.start().unwrap();
        job.succeed().unwrap();

        assert!(job.transition(JobState::Running).is_err());
        assert!(job.transition(JobState::Cancelled).is_err());
        assert_eq!(job.state, JobState::Succeeded);
    }

    #[test]
    fn test_command_line() {
        let job = make_job();
        assert_eq!(job.command_line(), vec!["echo", "hello"]);
    }

    #[test]
    fn test_serialization() {
        let job = make_job();
        let json = serde_json::to_string(&job).unwrap();

        assert!(json.contains("\"state\":\"PENDING\""));
        assert!(json.contains("\"program\":\"echo\""));
        // Unset optionals are omitted
        assert!(!json.contains("exit_code"));
    }
}
