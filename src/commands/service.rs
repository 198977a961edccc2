//! Command execution boundary.
//!
//! The dispatcher and macro playback both go through [`execute_command`], so
//! a replayed command takes exactly the same path as a key-triggered one.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::command::ParameterizedCommand;
use crate::keys::KeyEvent;
use crate::logging;

/// External command/handler service the core executes commands through.
pub trait CommandService: Send + Sync {
    /// Whether any handler is active for the command.
    fn has_handler(&self, command: &ParameterizedCommand) -> bool;

    /// The handler's `CanExecute` predicate.
    fn can_execute(&self, command: &ParameterizedCommand) -> bool;

    fn execute(
        &self,
        command: &ParameterizedCommand,
        trigger: Option<&KeyEvent>,
    ) -> anyhow::Result<()>;

    /// Human-readable command name, if the command is defined.
    fn command_name(&self, _command_id: &str) -> Option<String> {
        None
    }
}

/// Why a resolved command did not run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotExecutedReason {
    NoHandler,
    Disabled,
}

impl fmt::Display for NotExecutedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHandler => f.write_str("no active handler"),
            Self::Disabled => f.write_str("handler cannot execute"),
        }
    }
}

/// Result of one attempt to run a command.
#[derive(Debug)]
pub enum ExecutionOutcome {
    Executed,
    NotExecuted(NotExecutedReason),
    Failed(anyhow::Error),
}

impl ExecutionOutcome {
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed)
    }
}

/// Run `command` through `service`, checking the handler and its predicate first.
pub fn execute_command(
    service: &dyn CommandService,
    command: &ParameterizedCommand,
    trigger: Option<&KeyEvent>,
) -> ExecutionOutcome {
    if !service.has_handler(command) {
        debug!(command_id = command.id(), "No handler for command");
        return ExecutionOutcome::NotExecuted(NotExecutedReason::NoHandler);
    }
    if !service.can_execute(command) {
        debug!(command_id = command.id(), "Command handler is disabled");
        return ExecutionOutcome::NotExecuted(NotExecutedReason::Disabled);
    }

    match service.execute(command, trigger) {
        Ok(()) => {
            logging::log_command_event(command.id(), "executed", true);
            ExecutionOutcome::Executed
        }
        Err(error) => {
            warn!(command_id = command.id(), error = %error, "Command execution failed");
            logging::log_command_event(command.id(), "failed", false);
            ExecutionOutcome::Failed(error)
        }
    }
}

/// A command handler with an optional `CanExecute` predicate.
pub trait Handler: Send + Sync {
    fn can_execute(&self, _command: &ParameterizedCommand) -> bool {
        true
    }

    fn execute(
        &self,
        command: &ParameterizedCommand,
        trigger: Option<&KeyEvent>,
    ) -> anyhow::Result<()>;
}

/// Adapter turning a closure into a [`Handler`].
pub struct FnHandler<F> {
    execute: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&ParameterizedCommand, Option<&KeyEvent>) -> anyhow::Result<()> + Send + Sync,
{
    fn execute(
        &self,
        command: &ParameterizedCommand,
        trigger: Option<&KeyEvent>,
    ) -> anyhow::Result<()> {
        (self.execute)(command, trigger)
    }
}

pub fn handler_fn<F>(execute: F) -> Arc<dyn Handler>
where
    F: Fn(&ParameterizedCommand, Option<&KeyEvent>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(FnHandler { execute })
}

/// In-memory command service: one active handler per command id.
#[derive(Default)]
pub struct HandlerService {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    names: RwLock<HashMap<String, String>>,
}

impl HandlerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_command(&self, id: impl Into<String>, name: impl Into<String>) {
        self.names.write().insert(id.into(), name.into());
    }

    /// Activate `handler` for `id`, returning the handler it replaced.
    pub fn activate_handler(
        &self,
        id: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Option<Arc<dyn Handler>> {
        self.handlers.write().insert(id.into(), handler)
    }

    pub fn deactivate_handler(&self, id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.write().remove(id)
    }

    fn handler(&self, id: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(id).cloned()
    }
}

impl CommandService for HandlerService {
    fn has_handler(&self, command: &ParameterizedCommand) -> bool {
        self.handlers.read().contains_key(command.id())
    }

    fn can_execute(&self, command: &ParameterizedCommand) -> bool {
        self.handler(command.id())
            .map(|h| h.can_execute(command))
            .unwrap_or(false)
    }

    fn execute(
        &self,
        command: &ParameterizedCommand,
        trigger: Option<&KeyEvent>,
    ) -> anyhow::Result<()> {
        // Clone the handler out so it may re-enter the service.
        let handler = self
            .handler(command.id())
            .ok_or_else(|| anyhow::anyhow!("No handler for command '{}'", command.id()))?;
        handler.execute(command, trigger)
    }

    fn command_name(&self, command_id: &str) -> Option<String> {
        self.names.read().get(command_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Guarded {
        enabled: bool,
        runs: AtomicUsize,
    }

    impl Handler for Guarded {
        fn can_execute(&self, _command: &ParameterizedCommand) -> bool {
            self.enabled
        }

        fn execute(
            &self,
            _command: &ParameterizedCommand,
            _trigger: Option<&KeyEvent>,
        ) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn missing_handler_is_not_executed() {
        let service = HandlerService::new();
        let outcome = execute_command(&service, &ParameterizedCommand::new("nope"), None);
        assert!(matches!(
            outcome,
            ExecutionOutcome::NotExecuted(NotExecutedReason::NoHandler)
        ));
    }

    #[test]
    fn disabled_handler_is_not_executed() {
        let service = HandlerService::new();
        let handler = Arc::new(Guarded {
            enabled: false,
            runs: AtomicUsize::new(0),
        });
        service.activate_handler("cmd", handler.clone());

        let outcome = execute_command(&service, &ParameterizedCommand::new("cmd"), None);
        assert!(matches!(
            outcome,
            ExecutionOutcome::NotExecuted(NotExecutedReason::Disabled)
        ));
        assert_eq!(handler.runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_error_is_reported_as_failed() {
        let service = HandlerService::new();
        service.activate_handler("boom", handler_fn(|_, _| anyhow::bail!("exploded")));

        match execute_command(&service, &ParameterizedCommand::new("boom"), None) {
            ExecutionOutcome::Failed(e) => assert_eq!(e.to_string(), "exploded"),
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn command_names_come_from_definitions() {
        let service = HandlerService::new();
        service.define_command("edit.copy", "Copy");
        assert_eq!(service.command_name("edit.copy"), Some("Copy".to_string()));
        assert_eq!(service.command_name("edit.paste"), None);
    }
}
