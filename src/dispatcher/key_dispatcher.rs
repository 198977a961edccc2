//! The key binding dispatcher: turns raw key events into command executions.
//!
//! ```text
//!            key-down, partial match
//!   Idle ─────────────────────────────▶ AwaitingContinuation(prefix)
//!    ▲  ◀─────────────────────────────    │  ▲     │
//!    │   full match / no match / cancel   │  │     │ key-down, partial match
//!    │   / timeout / command failure      │  └─────┘ (prefix extended)
//! ```

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::state::{
    ContinuationTimer, DispatchState, DispatcherConfig, NoopTimer, TimeoutToken,
};
use crate::bindings::{Binding, BindingTableManager, ContextManager, TableMatch};
use crate::commands::{
    execute_command, CommandService, CommandWhitelist, ExecutionOutcome, NotExecutedReason,
    ParameterizedCommand,
};
use crate::config::{Config, ConfigIssue};
use crate::error::KeybindError;
use crate::keys::{KeyEvent, KeyEventKind, TriggerSequence};
use crate::logging;
use crate::macros::MacroRecorder;

/// What a dispatched event led to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a binding; the host should process the event normally.
    Ignored,
    /// Swallowed as the end of an abandoned sequence.
    Consumed,
    /// Part of a multi-stroke sequence; waiting for the next stroke.
    Pending,
    Executed(ParameterizedCommand),
    /// Resolved, but the handler was missing or disabled. The event is dropped.
    NotExecuted {
        command: ParameterizedCommand,
        reason: NotExecutedReason,
    },
}

impl DispatchOutcome {
    /// Whether the host must stop further processing of the event.
    pub fn is_consumed(&self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

pub struct KeyBindingDispatcher {
    contexts: ContextManager,
    bindings: BindingTableManager,
    commands: Arc<dyn CommandService>,
    whitelist: CommandWhitelist,
    timer: Box<dyn ContinuationTimer>,
    config: DispatcherConfig,
    state: DispatchState,
    next_token: TimeoutToken,
    recorder: Option<MacroRecorder>,
}

impl KeyBindingDispatcher {
    pub fn new(commands: Arc<dyn CommandService>, whitelist: CommandWhitelist) -> Self {
        Self {
            contexts: ContextManager::new(),
            bindings: BindingTableManager::new(),
            commands,
            whitelist,
            timer: Box::new(NoopTimer),
            config: DispatcherConfig::default(),
            state: DispatchState::Idle,
            next_token: 0,
            recorder: None,
        }
    }

    /// Dispatcher with contexts, bindings, whitelist and timeout taken from
    /// `config`. Entries that could not be applied are returned alongside.
    pub fn from_config(
        config: &Config,
        commands: Arc<dyn CommandService>,
    ) -> (Self, Vec<ConfigIssue>) {
        let mut contexts = ContextManager::new();
        let mut issues = contexts.apply_config(config);
        let mut bindings = BindingTableManager::new();
        issues.extend(bindings.apply_config(config, &contexts));

        for issue in &issues {
            warn!(issue = %issue, "Config entry skipped");
        }

        let whitelist = CommandWhitelist::new(config.whitelisted_commands.iter().cloned());
        let dispatcher = Self::new(commands, whitelist)
            .with_config(DispatcherConfig::from(config))
            .with_contexts(contexts)
            .with_bindings(bindings);
        (dispatcher, issues)
    }

    pub fn with_timer(mut self, timer: impl ContinuationTimer + 'static) -> Self {
        self.timer = Box::new(timer);
        self
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_contexts(mut self, contexts: ContextManager) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn with_bindings(mut self, bindings: BindingTableManager) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn with_recorder(mut self, recorder: MacroRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn set_recorder(&mut self, recorder: Option<MacroRecorder>) {
        self.recorder = recorder;
    }

    pub fn state(&self) -> &DispatchState {
        &self.state
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn whitelist(&self) -> &CommandWhitelist {
        &self.whitelist
    }

    pub fn contexts(&self) -> &ContextManager {
        &self.contexts
    }

    /// Mutable contexts. Any pending prefix is abandoned first, since it may
    /// not be a valid prefix under the new active set.
    pub fn contexts_mut(&mut self) -> &mut ContextManager {
        self.reset();
        &mut self.contexts
    }

    pub fn bindings(&self) -> &BindingTableManager {
        &self.bindings
    }

    /// Mutable binding tables. Any pending prefix is abandoned first.
    pub fn bindings_mut(&mut self) -> &mut BindingTableManager {
        self.reset();
        &mut self.bindings
    }

    /// Explicitly abandon a pending sequence.
    pub fn cancel(&mut self) {
        if !self.state.is_idle() {
            debug!("Pending key sequence cancelled");
        }
        self.reset();
    }

    pub fn dispatch(&mut self, event: &KeyEvent) -> Result<DispatchOutcome, KeybindError> {
        self.dispatch_at(event, Instant::now())
    }

    /// Dispatch with an explicit "now", used for the deadline check.
    #[instrument(level = "debug", skip(self, now), fields(kind = ?event.kind()))]
    pub fn dispatch_at(
        &mut self,
        event: &KeyEvent,
        now: Instant,
    ) -> Result<DispatchOutcome, KeybindError> {
        if event.kind() == KeyEventKind::KeyUp || event.is_modifier_only() {
            return Ok(DispatchOutcome::Ignored);
        }

        let expired = match &self.state {
            DispatchState::AwaitingContinuation {
                deadline, token, ..
            } if now >= *deadline => Some(*token),
            _ => None,
        };
        let Some(token) = expired else {
            return self.dispatch_from_state(event, now);
        };

        // The late key is dispatched from Idle even when the expired
        // prefix's own binding fails; that failure is reported afterwards.
        debug!(token = token, "Continuation deadline passed before timer fired");
        let timed_out = self.handle_timeout(token);
        let outcome = self.dispatch_from_state(event, now);
        match timed_out {
            Err(e) => {
                warn!(error = %e, late_key = ?outcome, "Expired prefix binding failed");
                Err(e)
            }
            Ok(_) => outcome,
        }
    }

    fn dispatch_from_state(
        &mut self,
        event: &KeyEvent,
        now: Instant,
    ) -> Result<DispatchOutcome, KeybindError> {
        let awaiting = self.state.prefix().cloned();
        for stroke in event.keystrokes() {
            let sequence = match &awaiting {
                Some(prefix) => prefix.extended(stroke),
                None => TriggerSequence::single(stroke),
            };

            match self.bindings.resolve(&self.contexts, &sequence) {
                TableMatch::NoMatch => continue,
                TableMatch::Partial { exact } => {
                    logging::log_key_event(&sequence.format(), "partial", true);
                    self.await_continuation(sequence, exact, *event, now);
                    return Ok(DispatchOutcome::Pending);
                }
                TableMatch::Full(binding) => {
                    logging::log_key_event(&sequence.format(), "matched", true);
                    self.reset();
                    return self.execute(binding, event);
                }
            }
        }

        if let Some(prefix) = awaiting {
            logging::log_key_event(&prefix.format(), "abandoned", true);
            self.reset();
            return Ok(DispatchOutcome::Consumed);
        }

        if event.kind() == KeyEventKind::KeyDown {
            if let Some(recorder) = &self.recorder {
                recorder.on_dispatched_event(event);
            }
        }
        Ok(DispatchOutcome::Ignored)
    }

    /// Handle a fired continuation timeout.
    ///
    /// Stale tokens are ignored. Otherwise the pending prefix is abandoned
    /// and its own binding, if any, is executed.
    pub fn handle_timeout(
        &mut self,
        token: TimeoutToken,
    ) -> Result<Option<DispatchOutcome>, KeybindError> {
        let (prefix, exact, trigger) = match &self.state {
            DispatchState::AwaitingContinuation {
                prefix,
                exact,
                trigger,
                token: current,
                ..
            } if *current == token => (prefix.clone(), exact.clone(), *trigger),
            _ => {
                debug!(token = token, "Ignoring stale continuation timeout");
                return Ok(None);
            }
        };

        self.reset();
        match exact {
            Some(binding) => {
                info!(sequence = %prefix, command_id = binding.command.id(), "Continuation timed out, running prefix binding");
                self.execute(binding, &trigger).map(Some)
            }
            None => {
                logging::log_key_event(&prefix.format(), "timed_out", false);
                Ok(None)
            }
        }
    }

    fn await_continuation(
        &mut self,
        prefix: TriggerSequence,
        exact: Option<Binding>,
        trigger: KeyEvent,
        now: Instant,
    ) {
        if let DispatchState::AwaitingContinuation { token, .. } = &self.state {
            self.timer.cancel(*token);
        }
        self.next_token += 1;
        let token = self.next_token;
        let timeout = self.config.continuation_timeout;
        self.timer.schedule(token, timeout);
        self.state = DispatchState::AwaitingContinuation {
            prefix,
            exact,
            trigger,
            deadline: now + timeout,
            token,
        };
    }

    fn reset(&mut self) {
        if let DispatchState::AwaitingContinuation { token, .. } = &self.state {
            self.timer.cancel(*token);
        }
        self.state = DispatchState::Idle;
    }

    /// State is already Idle when this runs, so a failure cannot wedge it.
    fn execute(
        &mut self,
        binding: Binding,
        trigger: &KeyEvent,
    ) -> Result<DispatchOutcome, KeybindError> {
        let command = binding.command;
        match execute_command(self.commands.as_ref(), &command, Some(trigger)) {
            ExecutionOutcome::Executed => {
                if let Some(recorder) = &self.recorder {
                    if self.whitelist.contains(command.id()) {
                        recorder.on_command_executed(&command, Some(trigger));
                    } else {
                        debug!(command_id = command.id(), "Command not whitelisted for macro capture");
                    }
                }
                Ok(DispatchOutcome::Executed(command))
            }
            ExecutionOutcome::NotExecuted(reason) => {
                debug!(command_id = command.id(), reason = %reason, "Bound command not executed");
                Ok(DispatchOutcome::NotExecuted { command, reason })
            }
            ExecutionOutcome::Failed(source) => {
                warn!(command_id = command.id(), "Bound command failed");
                Err(KeybindError::CommandExecution {
                    command_id: command.id().to_string(),
                    source,
                })
            }
        }
    }
}
