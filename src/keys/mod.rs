//! Key strokes, trigger sequences and raw key events.
//!
//! # Example
//!
//! ```
//! use keybind_macro::keys::{KeyStroke, ModifierMask, TriggerSequence};
//!
//! let seq = TriggerSequence::parse("CTRL+5 CTRL+A").unwrap();
//! assert_eq!(seq.len(), 2);
//! assert_eq!(seq.strokes()[1], KeyStroke::new(ModifierMask::CTRL, 'a' as u32));
//! assert_eq!(seq.to_string(), "CTRL+5 CTRL+A");
//! ```

mod event;
mod types;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use event::{KeyEvent, KeyEventData, KeyEventKind};
pub use types::{
    key_codes, normalize_key, KeyStroke, ModifierMask, Platform, TriggerParseError,
    TriggerSequence,
};
