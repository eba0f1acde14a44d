//! pybundle - command-line lane for bundling Python applications
//!
//! This crate implements pybundle, a front-end for the PyInstaller
//! packaging tool: it validates bundling options, checks the Python
//! interpreter, assembles the PyInstaller command line, and runs it as a
//! single supervised subprocess with live output and a
//! success/failed/cancelled outcome.

pub mod config;
pub mod pyenv;
pub mod report;
pub mod signal;

pub use config::EffectiveConfig;
pub use pyenv::{PyEnvKind, PythonEnv};
pub use report::{BuildReport, FailureKind, Status};

pub use pybundle_options::{
    assemble_args, launch_plan, validate, BundleMode, BundleOptions, ConsoleMode, DataEntry,
    ExplainOutput, LaunchPlan, Platform,
};
pub use pybundle_supervisor::{
    CommandSpec, JobEvent, JobState, OutputSource, Supervisor, TerminalReport,
};
