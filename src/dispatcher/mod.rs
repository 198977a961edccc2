//! Key dispatch state machine.
//!
//! The dispatcher consumes key events, accumulates multi-stroke prefixes,
//! resolves them against the active binding tables and executes the bound
//! command through the command service. When a macro recorder is attached,
//! unconsumed keys and whitelisted command executions are handed to it.

mod key_dispatcher;
mod state;


pub use key_dispatcher::{DispatchOutcome, KeyBindingDispatcher};
pub use state::{
    ContinuationTimer, DispatchState, DispatcherConfig, ManualTimer, NoopTimer, TimeoutToken,
};
