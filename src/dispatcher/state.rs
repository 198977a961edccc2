//! Dispatch state and the continuation timer seam.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::bindings::Binding;
use crate::config::Config;
use crate::keys::{KeyEvent, TriggerSequence};

/// Identifies one armed continuation timeout. Tokens are never reused, so a
/// timeout that fires after the state moved on is recognised as stale.
pub type TimeoutToken = u64;

/// Transient per-dispatcher state.
#[derive(Clone, Debug, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    AwaitingContinuation {
        prefix: TriggerSequence,
        /// Binding for `prefix` itself, run if the continuation times out.
        exact: Option<Binding>,
        /// Event that extended the prefix last.
        trigger: KeyEvent,
        deadline: Instant,
        token: TimeoutToken,
    },
}

impl DispatchState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn prefix(&self) -> Option<&TriggerSequence> {
        match self {
            Self::Idle => None,
            Self::AwaitingContinuation { prefix, .. } => Some(prefix),
        }
    }
}

/// Host event-loop timer used to arm continuation timeouts.
///
/// When an armed timeout fires, the host calls
/// `KeyBindingDispatcher::handle_timeout` with the same token on the
/// dispatch thread.
pub trait ContinuationTimer: Send {
    fn schedule(&mut self, token: TimeoutToken, after: Duration);
    fn cancel(&mut self, token: TimeoutToken);
}

/// Timer that never fires; late keys are still caught by the deadline check.
#[derive(Debug, Default)]
pub struct NoopTimer;

impl ContinuationTimer for NoopTimer {
    fn schedule(&mut self, _token: TimeoutToken, _after: Duration) {}
    fn cancel(&mut self, _token: TimeoutToken) {}
}

/// Timer driven by hand: remembers the armed token so the caller can fire
/// it explicitly. Clones share the same slot.
#[derive(Clone, Debug, Default)]
pub struct ManualTimer {
    armed: Arc<Mutex<Option<(TimeoutToken, Duration)>>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently armed token and its delay.
    pub fn armed(&self) -> Option<(TimeoutToken, Duration)> {
        *self.armed.lock()
    }

    /// Disarm and return the armed token, as if it had fired.
    pub fn fire(&self) -> Option<TimeoutToken> {
        self.armed.lock().take().map(|(token, _)| token)
    }
}

impl ContinuationTimer for ManualTimer {
    fn schedule(&mut self, token: TimeoutToken, after: Duration) {
        *self.armed.lock() = Some((token, after));
    }

    fn cancel(&mut self, token: TimeoutToken) {
        let mut armed = self.armed.lock();
        if matches!(*armed, Some((t, _)) if t == token) {
            *armed = None;
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DispatcherConfig {
    pub continuation_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DispatcherConfig {
    fn from(config: &Config) -> Self {
        Self {
            continuation_timeout: config.get_continuation_timeout(),
        }
    }
}
