//! Configuration type definitions
//!
//! This module contains all the struct and enum definitions for configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use super::defaults::*;
use crate::bindings::BindingKind;

// ============================================
// SCHEMES AND CONTEXTS
// ============================================

/// A key binding scheme; bindings in a child scheme beat its parent's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemeConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

/// A binding context and its place in the context tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    pub id: String,
    /// Display name (defaults to the id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

// ============================================
// BINDINGS
// ============================================

/// One key binding entry.
///
/// `command` is a serialized command (`id` or `id(key=value,...)`);
/// entries in `parameters` are merged on top of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingConfig {
    /// Formal key sequence, e.g. "CTRL+5 CTRL+A" or "M1+S"
    pub sequence: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, String>,
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(default)]
    pub kind: BindingKind,
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

impl BindingConfig {
    /// System binding in the default context, active under every scheme.
    pub fn new(sequence: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            command: command.into(),
            parameters: BTreeMap::new(),
            context: default_context(),
            scheme: None,
            kind: BindingKind::default(),
        }
    }
}

// ============================================
// MAIN CONFIG
// ============================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Continuation timeout for multi-stroke sequences (default: 1000ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_timeout_ms: Option<u64>,
    /// Directory macros are persisted to (default: ~/.keybind-macro/macros)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macros_dir: Option<String>,
    /// Number of macro files kept on disk (default: 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_saved_macros: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_macro_console: Option<bool>,
    #[serde(default = "default_active_scheme")]
    pub active_scheme: String,
    #[serde(default = "default_schemes")]
    pub schemes: Vec<SchemeConfig>,
    #[serde(default = "default_contexts")]
    pub contexts: Vec<ContextConfig>,
    #[serde(default = "default_active_contexts")]
    pub active_contexts: Vec<String>,
    #[serde(default)]
    pub bindings: Vec<BindingConfig>,
    /// Command ids eligible for macro capture
    #[serde(default)]
    pub whitelisted_commands: Vec<String>,
}

fn default_active_scheme() -> String {
    DEFAULT_ACTIVE_SCHEME.to_string()
}
fn default_schemes() -> Vec<SchemeConfig> {
    vec![SchemeConfig {
        id: DEFAULT_ACTIVE_SCHEME.to_string(),
        parent: None,
    }]
}
fn default_contexts() -> Vec<ContextConfig> {
    vec![ContextConfig {
        id: DEFAULT_CONTEXT.to_string(),
        name: Some("In Windows".to_string()),
        parent: None,
    }]
}
fn default_active_contexts() -> Vec<String> {
    vec![DEFAULT_CONTEXT.to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Config {
            continuation_timeout_ms: None,
            macros_dir: None,
            max_saved_macros: None,
            show_macro_console: None,
            active_scheme: default_active_scheme(),
            schemes: default_schemes(),
            contexts: default_contexts(),
            active_contexts: default_active_contexts(),
            bindings: Vec::new(),
            whitelisted_commands: Vec::new(),
        }
    }
}

impl Config {
    /// Returns the continuation timeout, or DEFAULT_CONTINUATION_TIMEOUT_MS if not configured
    pub fn get_continuation_timeout(&self) -> Duration {
        Duration::from_millis(
            self.continuation_timeout_ms
                .unwrap_or(DEFAULT_CONTINUATION_TIMEOUT_MS),
        )
    }

    /// Returns the macros directory with `~` expanded
    pub fn get_macros_dir(&self) -> PathBuf {
        let raw = self.macros_dir.as_deref().unwrap_or(DEFAULT_MACROS_DIR);
        PathBuf::from(shellexpand::tilde(raw).as_ref())
    }

    pub fn get_max_saved_macros(&self) -> usize {
        self.max_saved_macros.unwrap_or(DEFAULT_MAX_SAVED_MACROS)
    }

    pub fn get_show_macro_console(&self) -> bool {
        self.show_macro_console.unwrap_or(DEFAULT_SHOW_MACRO_CONSOLE)
    }
}

// ============================================
// APPLY ISSUES
// ============================================

/// A config entry that could not be applied. Other entries still are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub section: &'static str,
    pub index: usize,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(section: &'static str, index: usize, message: impl Into<String>) -> Self {
        Self {
            section,
            index,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]: {}", self.section, self.index, self.message)
    }
}
