//! PyInstaller command assembly.
//!
//! Builds the PyInstaller argv from validated options and pairs it with the
//! interpreter invocation and working directory to form a launch plan.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::BundleOptions;

/// The full command for one build: interpreter, arguments, working directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchPlan {
    /// Python interpreter executable
    pub program: String,

    /// Interpreter arguments (`-m PyInstaller` plus the assembled argv)
    pub args: Vec<String>,

    /// Working directory: the script's parent, so relative spec/dist/build
    /// paths land next to the script
    pub working_dir: PathBuf,
}

impl LaunchPlan {
    /// Render the command for display
    pub fn render(&self) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// Assemble the PyInstaller argv from options.
///
/// Order: script, `--icon`, `--add-data`, `--add-binary`, bundle-mode flag,
/// console flag, `--hidden-import`, `--name`, `--clean`.
pub fn assemble_args(options: &BundleOptions) -> Vec<String> {
    let mut args = Vec::new();

    args.push(options.script.display().to_string());

    if let Some(ref icon) = options.icon {
        args.push("--icon".to_string());
        args.push(icon.display().to_string());
    }

    for entry in &options.add_data {
        args.push("--add-data".to_string());
        args.push(entry.to_arg());
    }

    for entry in &options.add_binary {
        args.push("--add-binary".to_string());
        args.push(entry.to_arg());
    }

    args.push(options.bundle_mode.flag().to_string());
    args.push(options.console_mode.flag().to_string());

    for import in &options.hidden_imports {
        args.push("--hidden-import".to_string());
        args.push(import.clone());
    }

    if let Some(name) = options.effective_name() {
        args.push("--name".to_string());
        args.push(name);
    }

    if options.clean {
        args.push("--clean".to_string());
    }

    args
}

/// Build the launch plan: run the interpreter's PyInstaller entry point
/// (`python -m PyInstaller <argv…>`) from the script's directory.
pub fn launch_plan(options: &BundleOptions, python: &Path) -> LaunchPlan {
    let mut args = vec!["-m".to_string(), "PyInstaller".to_string()];
    args.extend(assemble_args(options));

    LaunchPlan {
        program: python.display().to_string(),
        args,
        working_dir: options.working_dir(),
    }
}
