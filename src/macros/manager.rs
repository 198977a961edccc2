//! Recording and playback state for macros.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::console::log_to_macro_console;
use super::error::{MacroCancelled, MacroError};
use super::factory::InstructionFactoryRegistry;
use super::instruction::{InstructionMap, MacroInstruction, PlaybackContext};
use super::playback::PlaybackReport;
use super::storage::MacroStorage;
use crate::logging;

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

/// Snapshot of the manager's flags, passed to listeners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MacroStateEvent {
    pub recording: bool,
    pub playing_back: bool,
}

/// Notified after every record/playback state change.
pub trait MacroStateListener: Send + Sync {
    fn macro_state_changed(&self, state: MacroStateEvent);
}

#[derive(Default)]
struct MacroState {
    recording: bool,
    playing_back: bool,
    buffer: Vec<Arc<dyn MacroInstruction>>,
    last_macro: Option<Vec<InstructionMap>>,
}

pub struct MacroManager {
    id: u64,
    state: Mutex<MacroState>,
    storage: Option<MacroStorage>,
    factories: RwLock<InstructionFactoryRegistry>,
    listeners: Mutex<Vec<Arc<dyn MacroStateListener>>>,
}

impl MacroManager {
    /// Manager that keeps macros in memory only.
    pub fn in_memory(factories: InstructionFactoryRegistry) -> Self {
        Self::build(None, factories)
    }

    /// Manager persisting macros to `storage`. Call `reload_macros` to pick
    /// up the latest saved macro.
    pub fn with_storage(storage: MacroStorage, factories: InstructionFactoryRegistry) -> Self {
        Self::build(Some(storage), factories)
    }

    fn build(storage: Option<MacroStorage>, factories: InstructionFactoryRegistry) -> Self {
        Self {
            id: NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(MacroState::default()),
            storage,
            factories: RwLock::new(factories),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn storage(&self) -> Option<&MacroStorage> {
        self.storage.as_ref()
    }

    /// Mutable access to the factory registry, e.g. to register extra kinds.
    pub fn factories(&self) -> parking_lot::RwLockWriteGuard<'_, InstructionFactoryRegistry> {
        self.factories.write()
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    pub fn is_playing_back(&self) -> bool {
        self.state.lock().playing_back
    }

    pub fn state(&self) -> MacroStateEvent {
        let state = self.state.lock();
        MacroStateEvent {
            recording: state.recording,
            playing_back: state.playing_back,
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn MacroStateListener>) {
        self.listeners.lock().push(listener);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn MacroStateListener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// The persisted form of the most recent macro, if any.
    pub fn last_macro(&self) -> Option<Vec<InstructionMap>> {
        self.state.lock().last_macro.clone()
    }

    /// Number of instructions captured by the current recording.
    pub fn recorded_len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Start or stop recording. Returns whether recording is now active.
    ///
    /// Stopping persists the captured instructions (even none) and clears
    /// the buffer. Starting while a macro plays back fails without change.
    #[instrument(skip(self), fields(manager_id = self.id))]
    pub fn toggle_macro_record(&self) -> Result<bool, MacroError> {
        let (recording, recorded) = {
            let mut state = self.state.lock();
            if state.playing_back {
                return Err(MacroError::InvalidStateTransition(
                    "Cannot record a macro while a macro is playing back".to_string(),
                ));
            }
            if state.recording {
                state.recording = false;
                let maps: Vec<InstructionMap> =
                    state.buffer.drain(..).map(|i| i.to_map()).collect();
                state.last_macro = Some(maps.clone());
                (false, Some(maps))
            } else {
                state.recording = true;
                state.buffer.clear();
                (true, None)
            }
        };

        let saved = match recorded {
            None => {
                logging::log_macro_event("record_started", 0);
                log_to_macro_console("Recording started");
                Ok(())
            }
            Some(maps) => {
                logging::log_macro_event("record_stopped", maps.len());
                log_to_macro_console(&format!("Recording stopped ({} instructions)", maps.len()));
                match &self.storage {
                    Some(storage) => storage.save(&maps).map(|_| ()),
                    None => Ok(()),
                }
            }
        };

        self.notify_listeners();
        saved?;
        Ok(recording)
    }

    /// Append an instruction to the active recording. Ignored when not recording.
    pub fn add_instruction(&self, instruction: Arc<dyn MacroInstruction>) -> bool {
        let representation = instruction.user_representation();
        {
            let mut state = self.state.lock();
            if !state.recording {
                return false;
            }
            state.buffer.push(instruction);
        }
        debug!(instruction = %representation, "Macro instruction added");
        log_to_macro_console(&format!("Added: {}", representation));
        true
    }

    /// Replay the last macro in recorded order.
    ///
    /// Every instruction is reconstructed before anything runs; a map that
    /// cannot be reconstructed aborts playback. An instruction that fails
    /// while executing is reported to `context.error` and playback goes on.
    /// An instruction failing with [`MacroCancelled`] stops playback.
    #[instrument(skip(self, context), fields(manager_id = self.id))]
    pub fn playback_last_macro(
        &self,
        context: &mut dyn PlaybackContext,
    ) -> Result<PlaybackReport, MacroError> {
        let instructions = {
            let mut state = self.state.lock();
            if state.recording {
                return Err(MacroError::InvalidStateTransition(
                    "Cannot play back a macro while recording".to_string(),
                ));
            }
            if state.playing_back {
                return Err(MacroError::InvalidStateTransition(
                    "A macro is already playing back".to_string(),
                ));
            }
            let Some(maps) = state.last_macro.as_ref() else {
                info!("No macro recorded, nothing to play back");
                return Ok(PlaybackReport::default());
            };

            let factories = self.factories.read();
            let instructions = maps
                .iter()
                .map(|map| factories.from_map(map))
                .collect::<Result<Vec<_>, _>>()?;
            state.playing_back = true;
            instructions
        };

        let _reset = PlaybackGuard { manager: self };
        self.notify_listeners();
        logging::log_macro_event("playback_started", instructions.len());

        let mut report = PlaybackReport::default();
        for instruction in &instructions {
            let representation = instruction.user_representation();
            context.log(&format!("Playing back: {}", representation));
            match instruction.execute(context) {
                Ok(()) => report.executed += 1,
                Err(error) if error.is::<MacroCancelled>() => {
                    info!(instruction = %representation, "Macro playback cancelled");
                    report.cancelled = true;
                    break;
                }
                Err(error) => {
                    warn!(instruction = %representation, error = %error, "Macro instruction failed");
                    report.failed += 1;
                    context.error(&error);
                }
            }
        }

        logging::log_macro_event("playback_finished", report.executed);
        Ok(report)
    }

    /// Re-read the newest persisted macro into the last-macro slot.
    pub fn reload_macros(&self) -> Result<bool, MacroError> {
        let Some(storage) = &self.storage else {
            return Ok(false);
        };
        let latest = storage.load_latest()?;
        let found = latest.is_some();
        self.state.lock().last_macro = latest.map(|saved| saved.instructions);
        info!(found = found, dir = %storage.dir().display(), "Reloaded macros");
        Ok(found)
    }

    fn notify_listeners(&self) {
        let event = self.state();
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.macro_state_changed(event);
        }
    }
}

impl fmt::Debug for MacroManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroManager")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

/// Clears the playing-back flag when playback ends, including by panic.
struct PlaybackGuard<'a> {
    manager: &'a MacroManager,
}

impl Drop for PlaybackGuard<'_> {
    fn drop(&mut self) {
        self.manager.state.lock().playing_back = false;
        self.manager.notify_listeners();
    }
}
