//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. User config (~/.config/pybundle/config.toml)
//! 3. Project config (pybundle.toml)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::BuiltinDefaults;
pub use effective::{
    project_config_path, user_config_path, ConfigError, ConfigOrigin, ConfigSource,
    EffectiveConfig,
};
pub use merge::{deep_merge, merge_layers};
