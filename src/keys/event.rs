//! Raw key events as delivered by the host toolkit.
//!
//! Events are plain values: nothing here references the originating widget,
//! so an event can be stored in a macro and replayed later.

use smallvec::SmallVec;

use super::types::{KeyStroke, ModifierMask};

/// Event subtype, with the toolkit's numeric codes (persisted as `type`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyEventKind {
    KeyDown,
    KeyUp,
    Traverse,
}

impl KeyEventKind {
    pub fn code(self) -> i32 {
        match self {
            Self::KeyDown => 1,
            Self::KeyUp => 2,
            Self::Traverse => 31,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::KeyDown),
            2 => Some(Self::KeyUp),
            31 => Some(Self::Traverse),
            _ => None,
        }
    }
}

/// Fixed payload shared by every key event variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyEventData {
    pub key_code: u32,
    pub state_mask: ModifierMask,
    pub character: Option<char>,
}

impl KeyEventData {
    pub fn new(key_code: u32, state_mask: ModifierMask, character: Option<char>) -> Self {
        Self {
            key_code,
            state_mask,
            character,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    KeyDown(KeyEventData),
    KeyUp(KeyEventData),
    Traverse(KeyEventData),
}

impl KeyEvent {
    pub fn key_down(key_code: u32, state_mask: ModifierMask, character: Option<char>) -> Self {
        Self::KeyDown(KeyEventData::new(key_code, state_mask, character))
    }

    pub fn key_up(key_code: u32, state_mask: ModifierMask, character: Option<char>) -> Self {
        Self::KeyUp(KeyEventData::new(key_code, state_mask, character))
    }

    pub fn from_parts(kind: KeyEventKind, data: KeyEventData) -> Self {
        match kind {
            KeyEventKind::KeyDown => Self::KeyDown(data),
            KeyEventKind::KeyUp => Self::KeyUp(data),
            KeyEventKind::Traverse => Self::Traverse(data),
        }
    }

    pub fn kind(&self) -> KeyEventKind {
        match self {
            Self::KeyDown(_) => KeyEventKind::KeyDown,
            Self::KeyUp(_) => KeyEventKind::KeyUp,
            Self::Traverse(_) => KeyEventKind::Traverse,
        }
    }

    pub fn data(&self) -> &KeyEventData {
        match self {
            Self::KeyDown(d) | Self::KeyUp(d) | Self::Traverse(d) => d,
        }
    }

    /// The matching key-up for a key-down (same payload).
    pub fn released(&self) -> Self {
        Self::KeyUp(*self.data())
    }

    /// True for a bare modifier press such as CTRL on its own.
    pub fn is_modifier_only(&self) -> bool {
        ModifierMask::from_modifier_key(self.data().key_code).is_some()
    }

    /// Candidate strokes for matching, most literal first.
    ///
    /// The first candidate is built from the key code. When the event carries
    /// a printable character that maps to a different key, a second candidate
    /// is built from that character; SHIFT is dropped from it if the
    /// character already encodes the shift (e.g. `(` rather than `9`).
    pub fn keystrokes(&self) -> SmallVec<[KeyStroke; 2]> {
        let mut candidates = SmallVec::new();
        if self.is_modifier_only() {
            return candidates;
        }

        let data = self.data();
        let primary = KeyStroke::new(data.state_mask, data.key_code).with_character(data.character);
        candidates.push(primary);

        if let Some(c) = data.character.filter(|c| !c.is_control()) {
            let mut modifiers = data.state_mask;
            if !c.is_alphabetic() {
                modifiers.remove(ModifierMask::SHIFT);
            }
            let secondary = KeyStroke::new(modifiers, c as u32).with_character(Some(c));
            if secondary != primary {
                candidates.push(secondary);
            }
        }

        candidates
    }
}
