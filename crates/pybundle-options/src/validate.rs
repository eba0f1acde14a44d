//! Deny-by-default validation of bundling options.
//!
//! Every option that names a file is checked against the filesystem before
//! a build may launch; rejection carries machine-readable issue codes.

use std::fs::File;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::BundleOptions;

/// Machine-readable validation issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "detail")]
pub enum OptionIssue {
    /// Entry script path does not exist.
    #[serde(rename = "SCRIPT_NOT_FOUND")]
    ScriptNotFound(String),

    /// Entry script path is not a regular file.
    #[serde(rename = "SCRIPT_NOT_A_FILE")]
    ScriptNotAFile(String),

    /// Entry script exists but cannot be opened for reading.
    #[serde(rename = "SCRIPT_NOT_READABLE")]
    ScriptNotReadable(String),

    /// Entry script does not look like a Python script.
    #[serde(rename = "SCRIPT_BAD_SUFFIX")]
    ScriptBadSuffix(String),

    /// Icon path does not exist.
    #[serde(rename = "ICON_NOT_FOUND")]
    IconNotFound(String),

    /// Icon extension does not match what the platform requires.
    #[serde(rename = "ICON_BAD_SUFFIX")]
    IconBadSuffix { got: String, expected: String },

    /// `--add-data` source does not exist.
    #[serde(rename = "DATA_SOURCE_NOT_FOUND")]
    DataSourceNotFound(String),

    /// `--add-binary` source does not exist.
    #[serde(rename = "BINARY_SOURCE_NOT_FOUND")]
    BinarySourceNotFound(String),

    /// Output name is empty or contains path separators.
    #[serde(rename = "INVALID_NAME")]
    InvalidName(String),
}

impl OptionIssue {
    /// Get a machine-readable string representation.
    pub fn to_code(&self) -> String {
        match self {
            OptionIssue::ScriptNotFound(p) => format!("SCRIPT_NOT_FOUND:{}", p),
            OptionIssue::ScriptNotAFile(p) => format!("SCRIPT_NOT_A_FILE:{}", p),
            OptionIssue::ScriptNotReadable(p) => format!("SCRIPT_NOT_READABLE:{}", p),
            OptionIssue::ScriptBadSuffix(p) => format!("SCRIPT_BAD_SUFFIX:{}", p),
            OptionIssue::IconNotFound(p) => format!("ICON_NOT_FOUND:{}", p),
            OptionIssue::IconBadSuffix { got, expected } => {
                format!("ICON_BAD_SUFFIX:{}!={}", got, expected)
            }
            OptionIssue::DataSourceNotFound(p) => format!("DATA_SOURCE_NOT_FOUND:{}", p),
            OptionIssue::BinarySourceNotFound(p) => format!("BINARY_SOURCE_NOT_FOUND:{}", p),
            OptionIssue::InvalidName(n) => format!("INVALID_NAME:{}", n),
        }
    }
}

/// Result of validating a set of bundling options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the options were accepted
    pub accepted: bool,
    /// Issues found; empty when accepted
    pub issues: Vec<OptionIssue>,
}

impl ValidationResult {
    /// An accepting result
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            issues: Vec::new(),
        }
    }

    /// A rejecting result with the given issues
    pub fn rejected(issues: Vec<OptionIssue>) -> Self {
        Self {
            accepted: false,
            issues,
        }
    }

    /// Issue codes as strings
    pub fn issue_codes(&self) -> Vec<String> {
        self.issues.iter().map(|i| i.to_code()).collect()
    }
}

/// Script extensions accepted as Python entry points.
const SCRIPT_EXTENSIONS: &[&str] = &["py", "pyw"];

/// Validate a set of bundling options for the given platform.
pub fn validate(options: &BundleOptions, platform: Platform) -> ValidationResult {
    let mut issues = Vec::new();

    validate_script(&options.script, &mut issues);

    if let Some(ref icon) = options.icon {
        validate_icon(icon, platform, &mut issues);
    }

    for entry in &options.add_data {
        if !entry.source.exists() {
            issues.push(OptionIssue::DataSourceNotFound(display(&entry.source)));
        }
    }
    for entry in &options.add_binary {
        if !entry.source.exists() {
            issues.push(OptionIssue::BinarySourceNotFound(display(&entry.source)));
        }
    }

    if let Some(ref name) = options.name {
        if name.is_empty() || name.contains('/') || name.contains('\\') {
            issues.push(OptionIssue::InvalidName(name.clone()));
        }
    }

    if issues.is_empty() {
        ValidationResult::accepted()
    } else {
        ValidationResult::rejected(issues)
    }
}

fn validate_script(script: &Path, issues: &mut Vec<OptionIssue>) {
    if !script.exists() {
        issues.push(OptionIssue::ScriptNotFound(display(script)));
        return;
    }
    if !script.is_file() {
        issues.push(OptionIssue::ScriptNotAFile(display(script)));
        return;
    }
    if File::open(script).is_err() {
        issues.push(OptionIssue::ScriptNotReadable(display(script)));
        return;
    }
    let extension = script
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase());
    match extension {
        Some(ext) if SCRIPT_EXTENSIONS.contains(&ext.as_str()) => {}
        _ => issues.push(OptionIssue::ScriptBadSuffix(display(script))),
    }
}

fn validate_icon(icon: &Path, platform: Platform, issues: &mut Vec<OptionIssue>) {
    if !icon.exists() || !icon.is_file() {
        issues.push(OptionIssue::IconNotFound(display(icon)));
        return;
    }
    if let Some(expected) = platform.icon_extension() {
        let got = icon
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if got != expected {
            issues.push(OptionIssue::IconBadSuffix {
                got,
                expected: expected.to_string(),
            });
        }
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}
