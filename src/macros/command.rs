use std::fmt;
use std::sync::Arc;

use super::error::MacroError;
use super::factory::InstructionFactory;
use super::instruction::{
    read_event, write_event, InstructionMap, MacroInstruction, PlaybackContext, ID,
};
use crate::commands::{execute_command, CommandService, ExecutionOutcome, ParameterizedCommand};
use crate::keys::KeyEvent;

pub const COMMAND_INSTRUCTION_ID: &str = "keybind.macro.parameterized_command";
pub const COMMAND: &str = "command";

/// A whitelisted command execution. Replays through the command service,
/// the same path the dispatcher uses.
pub struct CommandInstruction {
    command: ParameterizedCommand,
    trigger: Option<KeyEvent>,
    commands: Arc<dyn CommandService>,
}

impl CommandInstruction {
    pub fn new(
        command: ParameterizedCommand,
        trigger: Option<KeyEvent>,
        commands: Arc<dyn CommandService>,
    ) -> Self {
        Self {
            command,
            trigger,
            commands,
        }
    }

    pub fn command(&self) -> &ParameterizedCommand {
        &self.command
    }
}

impl fmt::Debug for CommandInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInstruction")
            .field("command", &self.command)
            .field("trigger", &self.trigger)
            .finish_non_exhaustive()
    }
}

impl MacroInstruction for CommandInstruction {
    fn id(&self) -> &str {
        COMMAND_INSTRUCTION_ID
    }

    fn execute(&self, context: &mut dyn PlaybackContext) -> anyhow::Result<()> {
        context.log(&format!("Executing recorded command: {}", self.command));
        match execute_command(self.commands.as_ref(), &self.command, self.trigger.as_ref()) {
            ExecutionOutcome::Executed => Ok(()),
            ExecutionOutcome::NotExecuted(reason) => {
                anyhow::bail!("command '{}' not executed: {}", self.command.id(), reason)
            }
            ExecutionOutcome::Failed(error) => {
                Err(error.context(format!("command '{}' failed", self.command.id())))
            }
        }
    }

    fn to_map(&self) -> InstructionMap {
        let mut map = InstructionMap::new();
        map.insert(ID.to_string(), COMMAND_INSTRUCTION_ID.to_string());
        map.insert(COMMAND.to_string(), self.command.serialize());
        if let Some(trigger) = &self.trigger {
            write_event(&mut map, trigger);
        }
        map
    }

    fn user_representation(&self) -> String {
        let name = self
            .commands
            .command_name(self.command.id())
            .unwrap_or_else(|| self.command.id().to_string());
        format!("Command: {}", name)
    }
}

pub struct CommandInstructionFactory {
    commands: Arc<dyn CommandService>,
}

impl CommandInstructionFactory {
    pub fn new(commands: Arc<dyn CommandService>) -> Self {
        Self { commands }
    }
}

impl InstructionFactory for CommandInstructionFactory {
    fn create(&self, map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError> {
        let serialized = map
            .get(COMMAND)
            .ok_or_else(|| MacroError::malformed(COMMAND_INSTRUCTION_ID, "missing 'command'"))?;
        let command = ParameterizedCommand::deserialize(serialized)
            .map_err(|e| MacroError::malformed(COMMAND_INSTRUCTION_ID, e.to_string()))?;
        let trigger = read_event(map, COMMAND_INSTRUCTION_ID)?;
        Ok(Box::new(CommandInstruction::new(
            command,
            trigger,
            self.commands.clone(),
        )))
    }
}
