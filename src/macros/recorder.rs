use std::fmt;
use std::sync::Arc;

use tracing::trace;

use super::command::CommandInstruction;
use super::handle;
use super::instruction::KeyEventTarget;
use super::keystroke::KeystrokeInstruction;
use super::manager::MacroManager;
use crate::commands::{CommandService, ParameterizedCommand};
use crate::keys::KeyEvent;

/// Dispatcher-side observer that turns key traffic into macro instructions.
///
/// Without a pinned manager, instructions go to the process-wide current
/// manager, so a temporary instance installed for a test receives them.
#[derive(Clone)]
pub struct MacroRecorder {
    manager: Option<Arc<MacroManager>>,
    target: Arc<dyn KeyEventTarget>,
    commands: Arc<dyn CommandService>,
}

impl MacroRecorder {
    pub fn new(target: Arc<dyn KeyEventTarget>, commands: Arc<dyn CommandService>) -> Self {
        Self {
            manager: None,
            target,
            commands,
        }
    }

    pub fn with_manager(mut self, manager: Arc<MacroManager>) -> Self {
        self.manager = Some(manager);
        self
    }

    fn manager(&self) -> Arc<MacroManager> {
        self.manager.clone().unwrap_or_else(handle::current)
    }

    /// A key event the dispatcher did not consume.
    pub fn on_dispatched_event(&self, event: &KeyEvent) {
        let manager = self.manager();
        if !manager.is_recording() {
            return;
        }
        trace!(event = ?event, "Capturing keystroke");
        manager.add_instruction(Arc::new(KeystrokeInstruction::new(
            *event,
            self.target.clone(),
        )));
    }

    /// A whitelisted command the dispatcher executed.
    pub fn on_command_executed(&self, command: &ParameterizedCommand, trigger: Option<&KeyEvent>) {
        let manager = self.manager();
        if !manager.is_recording() {
            return;
        }
        trace!(command_id = command.id(), "Capturing command");
        manager.add_instruction(Arc::new(CommandInstruction::new(
            command.clone(),
            trigger.copied(),
            self.commands.clone(),
        )));
    }
}

impl fmt::Debug for MacroRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroRecorder")
            .field("pinned_manager", &self.manager.as_ref().map(|m| m.id()))
            .finish_non_exhaustive()
    }
}
