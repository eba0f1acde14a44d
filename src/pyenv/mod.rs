//! Python interpreter environments.
//!
//! A `PythonEnv` describes one interpreter: its executable, version,
//! environment kind (system, venv, poetry, conda), and installed packages.

mod probe;

pub use probe::{discover, module_installed, probe, validate, ProbeError};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of Python environment an interpreter belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PyEnvKind {
    /// Interpreter installed system-wide
    System,
    /// venv virtual environment
    Venv,
    /// Poetry-managed virtual environment
    Poetry,
    /// Conda environment
    Conda,
    Unknown,
}

impl std::fmt::Display for PyEnvKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PyEnvKind::System => "system",
            PyEnvKind::Venv => "venv",
            PyEnvKind::Poetry => "poetry",
            PyEnvKind::Conda => "conda",
            PyEnvKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// One installed package, as reported by pip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
}

/// One Python interpreter and what is known about its environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonEnv {
    /// Interpreter executable path
    pub executable: PathBuf,

    /// Version string, e.g. "3.11.7"
    pub version: String,

    /// Environment kind
    pub kind: PyEnvKind,

    /// Installed packages; empty when pip is unavailable
    #[serde(default)]
    pub packages: Vec<PackageInfo>,
}

impl PythonEnv {
    /// Whether a package is installed, by pip name (case-insensitive)
    pub fn pkg_installed(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.packages
            .iter()
            .any(|p| p.name.to_lowercase() == name)
    }

    /// Whether PyInstaller is available in this environment
    pub fn has_pyinstaller(&self) -> bool {
        self.pkg_installed("pyinstaller")
    }
}

/// Infer the environment kind from the interpreter's location.
///
/// venv installs leave a `pyvenv.cfg` in the prefix; conda leaves a
/// `conda-meta` directory; poetry venvs live under a `pypoetry` cache dir.
pub fn infer_kind(executable: &Path) -> PyEnvKind {
    let prefix = executable.parent().and_then(|bin| bin.parent());

    if let Some(prefix) = prefix {
        if prefix.join("conda-meta").is_dir() {
            return PyEnvKind::Conda;
        }
        if prefix.join("pyvenv.cfg").is_file() {
            if executable.to_string_lossy().contains("pypoetry") {
                return PyEnvKind::Poetry;
            }
            return PyEnvKind::Venv;
        }
    }

    if executable.starts_with("/usr") || executable.starts_with("/bin") {
        return PyEnvKind::System;
    }

    PyEnvKind::Unknown
}
