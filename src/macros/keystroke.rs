use std::fmt;
use std::sync::Arc;

use super::error::MacroError;
use super::factory::InstructionFactory;
use super::instruction::{
    read_event, write_event, InstructionMap, KeyEventTarget, MacroInstruction, PlaybackContext, ID,
};
use crate::keys::KeyEvent;

pub const KEYSTROKE_INSTRUCTION_ID: &str = "keybind.macro.keystroke";

/// A raw key press captured by value. Replays as key-down then key-up.
pub struct KeystrokeInstruction {
    event: KeyEvent,
    target: Arc<dyn KeyEventTarget>,
}

impl KeystrokeInstruction {
    pub fn new(event: KeyEvent, target: Arc<dyn KeyEventTarget>) -> Self {
        Self { event, target }
    }

    pub fn event(&self) -> &KeyEvent {
        &self.event
    }
}

impl fmt::Debug for KeystrokeInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeystrokeInstruction")
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

impl MacroInstruction for KeystrokeInstruction {
    fn id(&self) -> &str {
        KEYSTROKE_INSTRUCTION_ID
    }

    fn execute(&self, _context: &mut dyn PlaybackContext) -> anyhow::Result<()> {
        self.target.send(&self.event)?;
        // The key-up is needed for listeners that act on release.
        self.target.send(&self.event.released())
    }

    fn to_map(&self) -> InstructionMap {
        let mut map = InstructionMap::new();
        map.insert(ID.to_string(), KEYSTROKE_INSTRUCTION_ID.to_string());
        write_event(&mut map, &self.event);
        map
    }

    fn user_representation(&self) -> String {
        match self.event.data().character {
            Some(c) if !c.is_control() => format!("Key: {}", c),
            _ => format!("Key: {}", self.event.data().key_code),
        }
    }
}

pub struct KeystrokeFactory {
    target: Arc<dyn KeyEventTarget>,
}

impl KeystrokeFactory {
    pub fn new(target: Arc<dyn KeyEventTarget>) -> Self {
        Self { target }
    }
}

impl InstructionFactory for KeystrokeFactory {
    fn create(&self, map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError> {
        let event = read_event(map, KEYSTROKE_INSTRUCTION_ID)?.ok_or_else(|| {
            MacroError::malformed(KEYSTROKE_INSTRUCTION_ID, "missing key event fields")
        })?;
        Ok(Box::new(KeystrokeInstruction::new(event, self.target.clone())))
    }
}
