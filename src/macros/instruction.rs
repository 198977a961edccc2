//! The instruction abstraction shared by recording, storage and playback.

use std::collections::BTreeMap;
use std::fmt;

use super::error::MacroError;
use crate::keys::{KeyEvent, KeyEventData, KeyEventKind, ModifierMask};

/// Flat persisted form of an instruction. Always carries an `id` entry.
pub type InstructionMap = BTreeMap<String, String>;

pub const ID: &str = "id";
pub const KEY_CODE: &str = "keyCode";
pub const STATE_MASK: &str = "stateMask";
pub const TYPE: &str = "type";
pub const CHARACTER: &str = "character";

/// Callbacks available to an instruction while it plays back.
pub trait PlaybackContext {
    fn log(&mut self, message: &str);
    fn error(&mut self, error: &anyhow::Error);
}

/// A recorded step of a macro.
pub trait MacroInstruction: Send + Sync + fmt::Debug {
    /// Discriminator used to find the factory on reconstruction.
    fn id(&self) -> &str;

    fn execute(&self, context: &mut dyn PlaybackContext) -> anyhow::Result<()>;

    /// Persisted form, including the `id` entry.
    fn to_map(&self) -> InstructionMap;

    /// Short description for the macro console.
    fn user_representation(&self) -> String;
}

/// Where replayed key events are delivered (the focused text widget).
pub trait KeyEventTarget: Send + Sync {
    fn send(&self, event: &KeyEvent) -> anyhow::Result<()>;
}

/// Write the raw key fields of `event` into `map`.
pub(crate) fn write_event(map: &mut InstructionMap, event: &KeyEvent) {
    let data = event.data();
    map.insert(KEY_CODE.to_string(), data.key_code.to_string());
    map.insert(STATE_MASK.to_string(), data.state_mask.bits().to_string());
    map.insert(TYPE.to_string(), event.kind().code().to_string());
    map.insert(
        CHARACTER.to_string(),
        data.character.map(String::from).unwrap_or_default(),
    );
}

/// Read the raw key fields written by [`write_event`].
///
/// Returns `Ok(None)` when none of the fields are present.
pub(crate) fn read_event(map: &InstructionMap, id: &str) -> Result<Option<KeyEvent>, MacroError> {
    if [KEY_CODE, STATE_MASK, TYPE].iter().all(|k| !map.contains_key(*k)) {
        return Ok(None);
    }

    let key_code: u32 = parse_field(map, id, KEY_CODE)?;
    let state_mask: u32 = parse_field(map, id, STATE_MASK)?;
    let type_code: i32 = parse_field(map, id, TYPE)?;

    let kind = KeyEventKind::from_code(type_code)
        .ok_or_else(|| MacroError::malformed(id, format!("unknown event type {}", type_code)))?;
    let state_mask = ModifierMask::from_bits(state_mask)
        .ok_or_else(|| MacroError::malformed(id, format!("unknown state mask bits {}", state_mask)))?;

    let character = match map.get(CHARACTER).map(String::as_str) {
        None | Some("") => None,
        Some(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => {
                    return Err(MacroError::malformed(
                        id,
                        format!("'{}' must be a single character, got '{}'", CHARACTER, s),
                    ))
                }
            }
        }
    };

    Ok(Some(KeyEvent::from_parts(
        kind,
        KeyEventData::new(key_code, state_mask, character),
    )))
}

fn parse_field<T: std::str::FromStr>(
    map: &InstructionMap,
    id: &str,
    field: &str,
) -> Result<T, MacroError> {
    let raw = map
        .get(field)
        .ok_or_else(|| MacroError::malformed(id, format!("missing '{}'", field)))?;
    raw.parse()
        .map_err(|_| MacroError::malformed(id, format!("'{}' is not a number: '{}'", field, raw)))
}
