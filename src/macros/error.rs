use std::path::PathBuf;

use thiserror::Error;

/// Errors from recording, reconstructing or playing back macros.
#[derive(Error, Debug)]
pub enum MacroError {
    #[error("instruction map has no 'id' field")]
    MissingInstructionId,

    #[error("no instruction factory registered for '{0}'")]
    UnknownInstruction(String),

    #[error("malformed '{id}' instruction: {reason}")]
    MalformedInstruction { id: String, reason: String },

    #[error("{0}")]
    InvalidStateTransition(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl MacroError {
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInstruction {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

/// Returned by an instruction to stop playback early. Not reported as an error.
#[derive(Error, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[error("macro playback cancelled")]
pub struct MacroCancelled;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed macro file '{path}': {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
