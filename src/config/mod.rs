//! Configuration module - bindings, contexts and macro settings
//!
//! This module provides functionality for:
//! - Loading configuration from ~/.keybind-macro/config.json
//! - Default values for all settings
//! - Type definitions for config structures
//!
//! # Module Structure
//!
//! - `defaults` - All default constant values
//! - `types` - Configuration struct definitions (Config, BindingConfig, etc.)
//! - `loader` - File system loading and parsing

mod defaults;
mod loader;
mod types;

pub use defaults::{
    DEFAULT_ACTIVE_SCHEME, DEFAULT_CONTEXT, DEFAULT_CONTINUATION_TIMEOUT_MS,
    DEFAULT_MAX_SAVED_MACROS,
};

pub use types::{BindingConfig, Config, ConfigIssue, ContextConfig, SchemeConfig};

pub use loader::{config_path, load_config, load_config_from};

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
