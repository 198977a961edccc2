//! Default configuration values
//!
//! All constants used throughout the config module are defined here.

/// Location of the user config file
pub const DEFAULT_CONFIG_PATH: &str = "~/.keybind-macro/config.json";

/// How long a partial key sequence waits for its next stroke
pub const DEFAULT_CONTINUATION_TIMEOUT_MS: u64 = 1000;

/// Macro storage
pub const DEFAULT_MACROS_DIR: &str = "~/.keybind-macro/macros";
pub const DEFAULT_MAX_SAVED_MACROS: usize = 10;

/// Echo macro activity to the macro console
pub const DEFAULT_SHOW_MACRO_CONSOLE: bool = true;

/// Scheme used when the config names none
pub const DEFAULT_ACTIVE_SCHEME: &str = "default";

/// Context every top-level binding lives in unless told otherwise
pub const DEFAULT_CONTEXT: &str = "window";
