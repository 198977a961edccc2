//! Macro record and playback.
//!
//! Recording: the dispatcher hands unconsumed key events and whitelisted
//! command executions to a [`MacroRecorder`], which appends instructions to
//! the active [`MacroManager`]. Stopping the recording persists every
//! instruction as a flat string map.
//!
//! Playback: the persisted maps are turned back into instructions through
//! an [`InstructionFactoryRegistry`] and executed in order against a
//! [`PlaybackContext`].

mod command;
mod console;
mod error;
mod factory;
mod handle;
mod instruction;
mod keystroke;
mod manager;
mod playback;
mod recorder;
mod storage;

#[cfg(test)]
#[path = "manager_tests.rs"]
mod manager_tests;

pub use command::{CommandInstruction, CommandInstructionFactory, COMMAND_INSTRUCTION_ID};
pub use console::{is_console_enabled, log_to_macro_console, set_console_enabled, set_console_writer};
pub use error::{MacroCancelled, MacroError, StorageError};
pub use factory::{InstructionFactory, InstructionFactoryRegistry};
pub use handle::{current, install, with_temporary_default_instance, TemporaryInstanceGuard};
pub use instruction::{InstructionMap, KeyEventTarget, MacroInstruction, PlaybackContext};
pub use keystroke::{KeystrokeFactory, KeystrokeInstruction, KEYSTROKE_INSTRUCTION_ID};
pub use manager::{MacroManager, MacroStateEvent, MacroStateListener};
pub use playback::{ConsolePlaybackContext, PlaybackReport};
pub use recorder::MacroRecorder;
pub use storage::{MacroStorage, SavedMacro};
