//! Explain output for option decisions.
//!
//! Provides structured JSON and human-readable explanations of the
//! validation decision and the assembled command for diagnostic purposes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::assemble::{assemble_args, launch_plan};
use crate::platform::Platform;
use crate::validate::{validate, ValidationResult};
use crate::BundleOptions;

/// Explanation of an option-validation decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainOutput {
    /// The entry script being bundled
    pub script: String,

    /// Whether the options were accepted
    pub accepted: bool,

    /// Machine-readable issue codes
    pub issues: Vec<String>,

    /// The assembled PyInstaller argv (only if accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub argv: Option<Vec<String>>,

    /// The full rendered command (only with an interpreter and if accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Working directory the build would run in (only if accepted)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    /// Human-readable explanation
    pub explanation: String,
}

impl ExplainOutput {
    /// Validate and explain a set of options.
    ///
    /// When `python` is given the explanation includes the full command as
    /// it would be launched.
    pub fn from_options(
        options: &BundleOptions,
        platform: Platform,
        python: Option<&Path>,
    ) -> Self {
        let result = validate(options, platform);
        let (argv, command, working_dir) = if result.accepted {
            let argv = assemble_args(options);
            let command = python.map(|p| launch_plan(options, p).render());
            let working_dir = Some(options.working_dir().display().to_string());
            (Some(argv), command, working_dir)
        } else {
            (None, None, None)
        };

        let explanation = Self::generate_explanation(options, &result, command.as_deref());

        Self {
            script: options.script.display().to_string(),
            accepted: result.accepted,
            issues: result.issue_codes(),
            argv,
            command,
            working_dir,
            explanation,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The human-readable explanation
    pub fn to_human(&self) -> String {
        self.explanation.clone()
    }

    fn generate_explanation(
        options: &BundleOptions,
        result: &ValidationResult,
        command: Option<&str>,
    ) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Script: {}", options.script.display()));
        lines.push(String::new());

        if result.accepted {
            lines.push("Decision: ACCEPTED".to_string());
            lines.push(String::new());
            lines.push(format!("Bundle mode: {}", options.bundle_mode.flag()));
            lines.push(format!("Console mode: {}", options.console_mode.flag()));
            if let Some(name) = options.effective_name() {
                lines.push(format!("Output name: {}", name));
            }
            if let Some(command) = command {
                lines.push(String::new());
                lines.push(format!("Command: {}", command));
                lines.push(format!(
                    "Working directory: {}",
                    options.working_dir().display()
                ));
            }
        } else {
            lines.push("Decision: REJECTED".to_string());
            lines.push(String::new());
            lines.push("Issues:".to_string());
            for issue in &result.issues {
                lines.push(format!("  - {}", issue.to_code()));
            }
        }

        lines.join("\n")
    }
}
