//! Reconstruction of instructions from their persisted maps.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::command::{CommandInstructionFactory, COMMAND_INSTRUCTION_ID};
use super::error::MacroError;
use super::instruction::{InstructionMap, KeyEventTarget, MacroInstruction, ID};
use super::keystroke::{KeystrokeFactory, KEYSTROKE_INSTRUCTION_ID};
use crate::commands::CommandService;

/// Builds one kind of instruction from its map.
pub trait InstructionFactory: Send + Sync {
    fn create(&self, map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError>;
}

/// Factories keyed by instruction id.
#[derive(Default)]
pub struct InstructionFactoryRegistry {
    factories: BTreeMap<String, Arc<dyn InstructionFactory>>,
}

impl InstructionFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the keystroke and parameterized-command factories.
    pub fn with_defaults(target: Arc<dyn KeyEventTarget>, commands: Arc<dyn CommandService>) -> Self {
        let mut registry = Self::new();
        registry.register(KEYSTROKE_INSTRUCTION_ID, Arc::new(KeystrokeFactory::new(target)));
        registry.register(
            COMMAND_INSTRUCTION_ID,
            Arc::new(CommandInstructionFactory::new(commands)),
        );
        registry
    }

    /// Register a factory, returning the one it replaced.
    pub fn register(
        &mut self,
        id: impl Into<String>,
        factory: Arc<dyn InstructionFactory>,
    ) -> Option<Arc<dyn InstructionFactory>> {
        let id = id.into();
        debug!(instruction_id = %id, "Registered macro instruction factory");
        self.factories.insert(id, factory)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn from_map(&self, map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError> {
        let id = map.get(ID).ok_or(MacroError::MissingInstructionId)?;
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| MacroError::UnknownInstruction(id.clone()))?;
        factory.create(map)
    }
}
