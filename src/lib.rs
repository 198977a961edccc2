//! keybind-macro - context-aware key binding dispatch with macro record/playback
//!
//! Raw key events flow into a [`dispatcher::KeyBindingDispatcher`], which
//! resolves multi-stroke trigger sequences against the binding tables of
//! the active contexts and executes the bound command through a
//! [`commands::CommandService`]. While a macro is recording, unconsumed keys
//! and whitelisted commands are captured and can later be played back.

pub mod bindings;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod keys;
pub mod logging;
pub mod macros;

pub use error::{KeybindError, ResultExt};
