//! Built-in defaults (layer 1)
//!
//! Hardcoded defaults for all configuration values.

use serde::{Deserialize, Serialize};

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Interpreter to run PyInstaller with (default: "python3")
    pub python: String,

    /// Grace period in seconds between SIGTERM and SIGKILL on cancel
    /// (default: 5)
    pub grace_seconds: u64,

    /// Bundle layout (default: "onedir")
    pub bundle_mode: String,

    /// Console mode (default: "console")
    pub console_mode: String,

    /// Clean PyInstaller's cache before building (default: false)
    pub clean: bool,

    /// Probe timeout in milliseconds for interpreter checks (default: 3000)
    pub probe_timeout_ms: u64,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            python: "python3".to_string(),
            grace_seconds: 5,
            bundle_mode: "onedir".to_string(),
            console_mode: "console".to_string(),
            clean: false,
            probe_timeout_ms: 3000,
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "python": self.python,
            "grace_seconds": self.grace_seconds,
            "bundle": {
                "mode": self.bundle_mode,
                "console": self.console_mode,
                "clean": self.clean
            },
            "probe_timeout_ms": self.probe_timeout_ms
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.python, "python3");
        assert_eq!(defaults.grace_seconds, 5);
        assert_eq!(defaults.bundle_mode, "onedir");
        assert_eq!(defaults.console_mode, "console");
        assert!(!defaults.clean);
    }

    #[test]
    fn test_to_value() {
        let defaults = BuiltinDefaults::default();
        let value = defaults.to_value();

        assert_eq!(value["python"], "python3");
        assert_eq!(value["bundle"]["mode"], "onedir");
        assert_eq!(value["bundle"]["clean"], false);
        assert_eq!(value["grace_seconds"], 5);
    }
}
