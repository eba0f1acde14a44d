//! PyInstaller option model, validation, and command assembly.
//!
//! Options are validated deny-by-default before a build is allowed to
//! launch, producing a structured accept/reject decision with
//! machine-readable issue codes.

mod assemble;
mod explain;
mod platform;
mod validate;

pub use assemble::{assemble_args, launch_plan, LaunchPlan};
pub use explain::ExplainOutput;
pub use platform::Platform;
pub use validate::{validate, OptionIssue, ValidationResult};

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One-file vs one-folder bundle layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleMode {
    /// Bundle into a directory containing the executable (`--onedir`)
    OneDir,
    /// Bundle into a single executable file (`--onefile`)
    OneFile,
}

impl BundleMode {
    /// The PyInstaller flag for this mode
    pub fn flag(&self) -> &'static str {
        match self {
            BundleMode::OneDir => "--onedir",
            BundleMode::OneFile => "--onefile",
        }
    }
}

/// Console vs windowed application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleMode {
    /// Open a console window for stdio (`--console`)
    Console,
    /// No console window (`--windowed`)
    Windowed,
}

impl ConsoleMode {
    /// The PyInstaller flag for this mode
    pub fn flag(&self) -> &'static str {
        match self {
            ConsoleMode::Console => "--console",
            ConsoleMode::Windowed => "--windowed",
        }
    }
}

/// Errors from option parsing
#[derive(Debug, thiserror::Error)]
pub enum OptionError {
    #[error("invalid data spec '{0}': expected SOURCE:DEST")]
    InvalidDataSpec(String),
}

/// A `--add-data` / `--add-binary` source/destination pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    /// File or directory to bundle
    pub source: PathBuf,
    /// Destination path inside the bundle
    pub dest: String,
}

impl DataEntry {
    pub fn new(source: impl Into<PathBuf>, dest: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
        }
    }

    /// Render as a PyInstaller `SOURCE:DEST` argument
    pub fn to_arg(&self) -> String {
        format!("{}:{}", self.source.display(), self.dest)
    }
}

impl FromStr for DataEntry {
    type Err = OptionError;

    /// Parse a `SOURCE:DEST` spec. The split is on the last `:` so that
    /// source paths containing `:` still parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((source, dest)) if !source.is_empty() && !dest.is_empty() => {
                Ok(Self::new(source, dest))
            }
            _ => Err(OptionError::InvalidDataSpec(s.to_string())),
        }
    }
}

/// The full set of bundling options for one build.
///
/// Mirrors the options of the PyInstaller command line: entry script, icon,
/// bundled data/binary files, hidden imports, output name, bundle layout,
/// console mode, and the clean flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleOptions {
    /// Python entry script
    pub script: PathBuf,

    /// Application icon (`--icon`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<PathBuf>,

    /// Non-binary files to bundle (`--add-data`)
    #[serde(default)]
    pub add_data: Vec<DataEntry>,

    /// Binary files to bundle (`--add-binary`)
    #[serde(default)]
    pub add_binary: Vec<DataEntry>,

    /// Modules PyInstaller's analysis cannot see (`--hidden-import`)
    #[serde(default)]
    pub hidden_imports: Vec<String>,

    /// Output name (`--name`); defaults to the script's stem
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Bundle layout
    pub bundle_mode: BundleMode,

    /// Console mode
    pub console_mode: ConsoleMode,

    /// Clean PyInstaller's cache before building (`--clean`)
    pub clean: bool,
}

impl BundleOptions {
    /// Options for a script with everything else at its default
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            icon: None,
            add_data: Vec::new(),
            add_binary: Vec::new(),
            hidden_imports: Vec::new(),
            name: None,
            bundle_mode: BundleMode::OneDir,
            console_mode: ConsoleMode::Console,
            clean: false,
        }
    }

    /// The output name: the explicit name, or the script's stem
    pub fn effective_name(&self) -> Option<String> {
        self.name.clone().or_else(|| {
            self.script
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
        })
    }

    /// The working directory for the build: the script's parent directory
    pub fn working_dir(&self) -> PathBuf {
        match self.script.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_data_entry_parse() {
        let entry: DataEntry = "assets/logo.png:assets".parse().unwrap();
        assert_eq!(entry.source, Path::new("assets/logo.png"));
        assert_eq!(entry.dest, "assets");
        assert_eq!(entry.to_arg(), "assets/logo.png:assets");
    }

    #[test]
    fn test_data_entry_parse_splits_on_last_colon() {
        let entry: DataEntry = "C:/data/file.txt:data".parse().unwrap();
        assert_eq!(entry.source, Path::new("C:/data/file.txt"));
        assert_eq!(entry.dest, "data");
    }

    #[test]
    fn test_data_entry_parse_rejects_missing_dest() {
        assert!("just-a-path".parse::<DataEntry>().is_err());
        assert!("path:".parse::<DataEntry>().is_err());
        assert!(":dest".parse::<DataEntry>().is_err());
    }

    #[test]
    fn test_effective_name_defaults_to_stem() {
        let options = BundleOptions::new("project/app.py");
        assert_eq!(options.effective_name(), Some("app".to_string()));

        let mut named = BundleOptions::new("project/app.py");
        named.name = Some("MyTool".to_string());
        assert_eq!(named.effective_name(), Some("MyTool".to_string()));
    }

    #[test]
    fn test_working_dir_is_script_parent() {
        let options = BundleOptions::new("project/app.py");
        assert_eq!(options.working_dir(), Path::new("project"));

        let bare = BundleOptions::new("app.py");
        assert_eq!(bare.working_dir(), Path::new("."));
    }

    #[test]
    fn test_mode_flags() {
        assert_eq!(BundleMode::OneFile.flag(), "--onefile");
        assert_eq!(BundleMode::OneDir.flag(), "--onedir");
        assert_eq!(ConsoleMode::Windowed.flag(), "--windowed");
        assert_eq!(ConsoleMode::Console.flag(), "--console");
    }
}
