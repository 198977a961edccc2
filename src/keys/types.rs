//! Key stroke and trigger sequence types with parsing and platform-aware display.
//!
//! This module provides:
//! - `ModifierMask` - Modifier key flags (alt, command, ctrl, shift)
//! - `KeyStroke` - One chord: modifiers + key, with the typed character if any
//! - `TriggerSequence` - An ordered, non-empty list of key strokes
//! - `TriggerParseError` - Detailed parse errors for config feedback
//!
//! Formal strings look like `CTRL+5 CTRL+A`: strokes separated by whitespace,
//! modifiers joined with `+` in the order ALT, COMMAND, CTRL, SHIFT.

use std::fmt;
use std::hash::{Hash, Hasher};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when parsing a key stroke or trigger sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TriggerParseError {
    #[error("trigger sequence is empty")]
    Empty,
    #[error("key stroke '{0}' has no key, only modifiers")]
    MissingKey(String),
    #[error("unknown token '{0}' in key stroke")]
    UnknownToken(String),
    #[error("unknown key '{0}'")]
    UnknownKey(String),
}

bitflags! {
    /// Modifier state of a key event.
    ///
    /// Bit values match the toolkit's state mask so persisted `stateMask`
    /// fields stay readable by the host.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ModifierMask: u32 {
        const ALT = 1 << 16;
        const SHIFT = 1 << 17;
        const CTRL = 1 << 18;
        const COMMAND = 1 << 22;
    }
}

impl ModifierMask {
    /// Platform accelerator: Command on macOS, Ctrl elsewhere (`M1`).
    pub fn primary_for(platform: Platform) -> Self {
        match platform {
            Platform::MacOS => Self::COMMAND,
            Platform::Windows | Platform::Linux => Self::CTRL,
        }
    }

    /// Mask of the modifier a modifier key produces, if `key` is one.
    pub fn from_modifier_key(key: u32) -> Option<Self> {
        Self::from_bits(key).filter(|m| m.bits().count_ones() == 1)
    }
}

/// Key codes for keys without a printable character.
///
/// Printable keys use their (upper-cased) character code point.
pub mod key_codes {
    pub const BS: u32 = 8;
    pub const TAB: u32 = 9;
    pub const CR: u32 = 13;
    pub const ESC: u32 = 27;
    pub const SPACE: u32 = 32;
    pub const DEL: u32 = 127;

    pub const KEYCODE_BIT: u32 = 1 << 24;
    pub const ARROW_UP: u32 = KEYCODE_BIT + 1;
    pub const ARROW_DOWN: u32 = KEYCODE_BIT + 2;
    pub const ARROW_LEFT: u32 = KEYCODE_BIT + 3;
    pub const ARROW_RIGHT: u32 = KEYCODE_BIT + 4;
    pub const PAGE_UP: u32 = KEYCODE_BIT + 5;
    pub const PAGE_DOWN: u32 = KEYCODE_BIT + 6;
    pub const HOME: u32 = KEYCODE_BIT + 7;
    pub const END: u32 = KEYCODE_BIT + 8;
    pub const INSERT: u32 = KEYCODE_BIT + 9;
    /// F1..F20 are consecutive from here.
    pub const F1: u32 = KEYCODE_BIT + 10;
    pub const F20: u32 = KEYCODE_BIT + 29;
}

/// Named keys in formal order: the first name for a code is the canonical one.
const NAMED_KEYS: &[(&str, u32)] = &[
    ("BS", key_codes::BS),
    ("BACKSPACE", key_codes::BS),
    ("TAB", key_codes::TAB),
    ("CR", key_codes::CR),
    ("ENTER", key_codes::CR),
    ("RETURN", key_codes::CR),
    ("ESC", key_codes::ESC),
    ("ESCAPE", key_codes::ESC),
    ("SPACE", key_codes::SPACE),
    ("DEL", key_codes::DEL),
    ("DELETE", key_codes::DEL),
    ("ARROW_UP", key_codes::ARROW_UP),
    ("UP", key_codes::ARROW_UP),
    ("ARROW_DOWN", key_codes::ARROW_DOWN),
    ("DOWN", key_codes::ARROW_DOWN),
    ("ARROW_LEFT", key_codes::ARROW_LEFT),
    ("LEFT", key_codes::ARROW_LEFT),
    ("ARROW_RIGHT", key_codes::ARROW_RIGHT),
    ("RIGHT", key_codes::ARROW_RIGHT),
    ("PAGE_UP", key_codes::PAGE_UP),
    ("PGUP", key_codes::PAGE_UP),
    ("PAGE_DOWN", key_codes::PAGE_DOWN),
    ("PGDN", key_codes::PAGE_DOWN),
    ("HOME", key_codes::HOME),
    ("END", key_codes::END),
    ("INSERT", key_codes::INSERT),
];

/// Platform enum for display formatting and `M1`..`M4` resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    MacOS,
    Windows,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        {
            Platform::MacOS
        }
        #[cfg(target_os = "windows")]
        {
            Platform::Windows
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            Platform::Linux
        }
    }
}

/// One physical chord: modifiers plus a key, with the produced character.
///
/// Equality and hashing only consider `key` and `modifiers`; the character
/// is carried for replay and display.
#[derive(Clone, Copy, Debug)]
pub struct KeyStroke {
    pub key: u32,
    pub modifiers: ModifierMask,
    pub character: Option<char>,
}

impl PartialEq for KeyStroke {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.modifiers == other.modifiers
    }
}

impl Eq for KeyStroke {}

impl Hash for KeyStroke {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.modifiers.hash(state);
    }
}

impl KeyStroke {
    /// Create a stroke; letter keys are normalised to upper case.
    pub fn new(modifiers: ModifierMask, key: u32) -> Self {
        Self {
            key: normalize_key(key),
            modifiers,
            character: None,
        }
    }

    pub fn with_character(mut self, character: Option<char>) -> Self {
        self.character = character;
        self
    }

    /// True when the key itself is a modifier (e.g. a bare CTRL press).
    pub fn is_modifier_only(&self) -> bool {
        ModifierMask::from_modifier_key(self.key).is_some()
    }

    /// Parse a single stroke such as `CTRL+SHIFT+K` or `M1+5`.
    pub fn parse(s: &str) -> Result<Self, TriggerParseError> {
        Self::parse_for_platform(s, Platform::current())
    }

    pub fn parse_for_platform(s: &str, platform: Platform) -> Result<Self, TriggerParseError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TriggerParseError::Empty);
        }

        // A trailing "++" means the key itself is '+'.
        let (body, plus_key) = match s.strip_suffix("++") {
            Some(rest) => (rest, true),
            None if s == "+" => ("", true),
            None => (s, false),
        };

        let mut modifiers = ModifierMask::empty();
        let mut key_part: Option<&str> = None;

        for part in body.split('+').filter(|p| !p.is_empty()) {
            match part.to_uppercase().as_str() {
                "ALT" | "OPT" | "OPTION" | "⌥" => modifiers |= ModifierMask::ALT,
                "COMMAND" | "CMD" | "META" | "⌘" => modifiers |= ModifierMask::COMMAND,
                "CTRL" | "CONTROL" | "⌃" => modifiers |= ModifierMask::CTRL,
                "SHIFT" | "⇧" => modifiers |= ModifierMask::SHIFT,
                "M1" => modifiers |= ModifierMask::primary_for(platform),
                "M2" => modifiers |= ModifierMask::SHIFT,
                "M3" => modifiers |= ModifierMask::ALT,
                "M4" => {
                    if platform == Platform::MacOS {
                        modifiers |= ModifierMask::CTRL;
                    }
                }
                _ => {
                    if key_part.is_some() || plus_key {
                        return Err(TriggerParseError::UnknownToken(part.to_string()));
                    }
                    key_part = Some(part);
                }
            }
        }

        let key = if plus_key {
            '+' as u32
        } else {
            let part = key_part.ok_or_else(|| TriggerParseError::MissingKey(s.to_string()))?;
            parse_key(part).ok_or_else(|| TriggerParseError::UnknownKey(part.to_string()))?
        };

        Ok(Self::new(modifiers, key))
    }

    /// Formal form, e.g. `ALT+CTRL+X`.
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if self.modifiers.contains(ModifierMask::ALT) {
            parts.push("ALT".to_string());
        }
        if self.modifiers.contains(ModifierMask::COMMAND) {
            parts.push("COMMAND".to_string());
        }
        if self.modifiers.contains(ModifierMask::CTRL) {
            parts.push("CTRL".to_string());
        }
        if self.modifiers.contains(ModifierMask::SHIFT) {
            parts.push("SHIFT".to_string());
        }
        parts.push(key_name(self.key));
        parts.join("+")
    }

    pub fn display(&self) -> String {
        self.display_for_platform(Platform::current())
    }

    pub fn display_for_platform(&self, platform: Platform) -> String {
        match platform {
            Platform::MacOS => {
                let mut s = String::new();
                if self.modifiers.contains(ModifierMask::CTRL) {
                    s.push('⌃');
                }
                if self.modifiers.contains(ModifierMask::ALT) {
                    s.push('⌥');
                }
                if self.modifiers.contains(ModifierMask::SHIFT) {
                    s.push('⇧');
                }
                if self.modifiers.contains(ModifierMask::COMMAND) {
                    s.push('⌘');
                }
                s.push_str(&key_glyph(self.key));
                s
            }
            Platform::Windows | Platform::Linux => {
                let mut parts: Vec<String> = Vec::new();
                if self.modifiers.contains(ModifierMask::CTRL) {
                    parts.push("Ctrl".to_string());
                }
                if self.modifiers.contains(ModifierMask::ALT) {
                    parts.push("Alt".to_string());
                }
                if self.modifiers.contains(ModifierMask::SHIFT) {
                    parts.push("Shift".to_string());
                }
                if self.modifiers.contains(ModifierMask::COMMAND) {
                    parts.push("Super".to_string());
                }
                parts.push(key_display_text(self.key));
                parts.join("+")
            }
        }
    }
}

impl fmt::Display for KeyStroke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

/// Ordered, non-empty list of key strokes bound as one trigger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TriggerSequence {
    strokes: Vec<KeyStroke>,
}

impl TriggerSequence {
    pub fn new(strokes: Vec<KeyStroke>) -> Result<Self, TriggerParseError> {
        if strokes.is_empty() {
            return Err(TriggerParseError::Empty);
        }
        Ok(Self { strokes })
    }

    pub fn single(stroke: KeyStroke) -> Self {
        Self {
            strokes: vec![stroke],
        }
    }

    /// Parse a formal string such as `CTRL+5 CTRL+A`.
    pub fn parse(s: &str) -> Result<Self, TriggerParseError> {
        Self::parse_for_platform(s, Platform::current())
    }

    pub fn parse_for_platform(s: &str, platform: Platform) -> Result<Self, TriggerParseError> {
        let strokes = s
            .split_whitespace()
            .map(|part| KeyStroke::parse_for_platform(part, platform))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(strokes)
    }

    pub fn strokes(&self) -> &[KeyStroke] {
        &self.strokes
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    /// A new sequence with `stroke` appended.
    pub fn extended(&self, stroke: KeyStroke) -> Self {
        let mut strokes = self.strokes.clone();
        strokes.push(stroke);
        Self { strokes }
    }

    /// True when `self` is a strict prefix of `other`.
    pub fn is_strict_prefix_of(&self, other: &TriggerSequence) -> bool {
        self.len() < other.len() && other.strokes[..self.len()] == self.strokes[..]
    }

    /// All strict prefixes, shortest first.
    pub fn strict_prefixes(&self) -> impl Iterator<Item = TriggerSequence> + '_ {
        (1..self.strokes.len()).map(move |n| Self {
            strokes: self.strokes[..n].to_vec(),
        })
    }

    pub fn format(&self) -> String {
        self.strokes
            .iter()
            .map(KeyStroke::format)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn display_for_platform(&self, platform: Platform) -> String {
        self.strokes
            .iter()
            .map(|s| s.display_for_platform(platform))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for TriggerSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl TryFrom<String> for TriggerSequence {
    type Error = TriggerParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TriggerSequence> for String {
    fn from(value: TriggerSequence) -> Self {
        value.format()
    }
}

/// Upper-case letter keys so `a` and `A` bind the same chord.
pub fn normalize_key(key: u32) -> u32 {
    match char::from_u32(key) {
        Some(c) if c.is_lowercase() => {
            let mut upper = c.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(u), None) => u as u32,
                _ => key,
            }
        }
        _ => key,
    }
}

fn parse_key(part: &str) -> Option<u32> {
    let upper = part.to_uppercase();
    if let Some((_, code)) = NAMED_KEYS.iter().find(|(name, _)| *name == upper) {
        return Some(*code);
    }
    if let Some(n) = upper.strip_prefix('F').and_then(|n| n.parse::<u32>().ok()) {
        if (1..=20).contains(&n) {
            return Some(key_codes::F1 + n - 1);
        }
    }
    // raw code, as written by key_name for unnamed keys
    if let Some(code) = part.strip_prefix('#').and_then(|n| n.parse::<u32>().ok()) {
        return Some(code);
    }
    let mut chars = part.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(normalize_key(c as u32)),
        _ => None,
    }
}

fn key_name(key: u32) -> String {
    if let Some((name, _)) = NAMED_KEYS.iter().find(|(_, code)| *code == key) {
        return (*name).to_string();
    }
    if (key_codes::F1..=key_codes::F20).contains(&key) {
        return format!("F{}", key - key_codes::F1 + 1);
    }
    match char::from_u32(key) {
        Some(c) if !c.is_control() => c.to_string(),
        _ => format!("#{}", key),
    }
}

fn key_glyph(key: u32) -> String {
    match key {
        key_codes::CR => "↵",
        key_codes::ESC => "⎋",
        key_codes::TAB => "⇥",
        key_codes::SPACE => "␣",
        key_codes::BS => "⌫",
        key_codes::DEL => "⌦",
        key_codes::ARROW_UP => "↑",
        key_codes::ARROW_DOWN => "↓",
        key_codes::ARROW_LEFT => "←",
        key_codes::ARROW_RIGHT => "→",
        key_codes::HOME => "↖",
        key_codes::END => "↘",
        key_codes::PAGE_UP => "⇞",
        key_codes::PAGE_DOWN => "⇟",
        k => return key_name(k),
    }
    .to_string()
}

fn key_display_text(key: u32) -> String {
    match key {
        key_codes::CR => "Enter",
        key_codes::ESC => "Esc",
        key_codes::TAB => "Tab",
        key_codes::SPACE => "Space",
        key_codes::BS => "Backspace",
        key_codes::DEL => "Delete",
        key_codes::ARROW_UP => "Up",
        key_codes::ARROW_DOWN => "Down",
        key_codes::ARROW_LEFT => "Left",
        key_codes::ARROW_RIGHT => "Right",
        key_codes::HOME => "Home",
        key_codes::END => "End",
        key_codes::PAGE_UP => "PageUp",
        key_codes::PAGE_DOWN => "PageDown",
        k => return key_name(k),
    }
    .to_string()
}
