use thiserror::Error;
use tracing::{error, warn};

use crate::bindings::BindingError;
use crate::commands::CommandParseError;
use crate::keys::TriggerParseError;
use crate::macros::{MacroError, StorageError};

/// Error severity for UI display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,     // informational
    Warning,  // recoverable
    Error,    // operation failed
    Critical, // requires user action
}

/// Crate-level error for key binding dispatch and macros.
#[derive(Error, Debug)]
pub enum KeybindError {
    #[error("Invalid key sequence: {0}")]
    Trigger(#[from] TriggerParseError),

    #[error("Invalid command: {0}")]
    CommandParse(#[from] CommandParseError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("Command '{command_id}' failed: {source}")]
    CommandExecution {
        command_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Macro(#[from] MacroError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Configuration error in '{path}': {message}")]
    Config { path: String, message: String },
}

impl KeybindError {
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Trigger(_) | Self::CommandParse(_) => ErrorSeverity::Warning,
            Self::Binding(_) => ErrorSeverity::Warning,
            Self::CommandExecution { .. } => ErrorSeverity::Error,
            Self::Macro(MacroError::InvalidStateTransition(_)) => ErrorSeverity::Info,
            Self::Macro(_) => ErrorSeverity::Error,
            Self::Storage(_) => ErrorSeverity::Critical,
            Self::Config { .. } => ErrorSeverity::Warning,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Trigger(e) => format!("Could not read key sequence: {}", e),
            Self::CommandParse(e) => format!("Could not read command: {}", e),
            Self::Binding(e) => e.to_string(),
            Self::CommandExecution { command_id, source } => {
                format!("The command '{}' failed: {}", command_id, source)
            }
            Self::Macro(MacroError::InvalidStateTransition(msg)) => msg.clone(),
            Self::Macro(e) => format!("Macro error: {}", e),
            Self::Storage(e) => format!("Could not access saved macros: {}", e),
            Self::Config { message, .. } => format!("Configuration issue: {}", message),
        }
    }
}

pub type Result<T> = std::result::Result<T, KeybindError>;

/// Extension trait for silent error logging with caller location tracking.
/// Use when the operation is recoverable and the user doesn't need to know.
///
/// # Examples
///
/// ```ignore
/// use keybind_macro::error::ResultExt;
///
/// let macro_file = storage.load_latest().log_err();
/// let config = load_config_from(path).warn_on_err();
/// ```
pub trait ResultExt<T> {
    /// Log error with caller location and return None. Use for recoverable failures.
    fn log_err(self) -> Option<T>;
    /// Log as warning with caller location and return None. Use for expected failures.
    fn warn_on_err(self) -> Option<T>;
}

impl<T, E: std::fmt::Debug> ResultExt<T> for std::result::Result<T, E> {
    #[track_caller]
    fn log_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                error!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation failed"
                );
                None
            }
        }
    }

    #[track_caller]
    fn warn_on_err(self) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(error) => {
                let caller = std::panic::Location::caller();
                warn!(
                    error = ?error,
                    file = caller.file(),
                    line = caller.line(),
                    "Operation had warning"
                );
                None
            }
        }
    }
}
