//! Supervised execution of a single external build process.
//!
//! Owns the lifecycle of one external invocation at a time: spawns the
//! process, streams its output line by line over a channel, and maps its
//! termination to exactly one terminal outcome (succeeded, failed with an
//! exit code or launch error, or cancelled).

mod events;
mod job;
mod supervisor;

pub use events::{JobEvent, OutputLine, OutputSource, TerminalReport};
pub use job::{Job, JobState, JobStateError};
pub use supervisor::{CommandSpec, Supervisor, SupervisorError, DEFAULT_GRACE_PERIOD};
