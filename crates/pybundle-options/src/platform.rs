//! Host platform identification.

use serde::{Deserialize, Serialize};

/// Platform the bundle is being built on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Linux,
    Macos,
    Others,
}

impl Platform {
    /// The platform this process is running on
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::Macos
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Others
        }
    }

    /// Icon file extension PyInstaller requires on this platform.
    /// None means any extension is accepted.
    pub fn icon_extension(&self) -> Option<&'static str> {
        match self {
            Platform::Windows => Some("ico"),
            Platform::Macos => Some("icns"),
            Platform::Linux | Platform::Others => None,
        }
    }
}
