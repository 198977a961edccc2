use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tempfile::TempDir;

use super::instruction::{CHARACTER, ID};
use super::*;
use crate::bindings::{Binding, BindingContext, BindingTable, BindingTableManager, ContextManager};
use crate::commands::{handler_fn, CommandWhitelist, HandlerService, ParameterizedCommand};
use crate::dispatcher::{DispatchOutcome, KeyBindingDispatcher};
use crate::keys::{KeyEvent, KeyEventKind, ModifierMask, TriggerSequence};

/// Text widget stand-in: key-downs with a character are inserted.
#[derive(Default)]
struct TextBuffer {
    text: Mutex<String>,
    events: Mutex<Vec<KeyEvent>>,
}

impl TextBuffer {
    fn text(&self) -> String {
        self.text.lock().clone()
    }
}

impl KeyEventTarget for TextBuffer {
    fn send(&self, event: &KeyEvent) -> anyhow::Result<()> {
        self.events.lock().push(*event);
        if event.kind() == KeyEventKind::KeyDown {
            if let Some(c) = event.data().character {
                self.text.lock().push(c);
            }
        }
        Ok(())
    }
}

/// Collects playback callbacks.
#[derive(Default)]
struct RecordingContext {
    logs: Vec<String>,
    errors: Vec<String>,
}

impl PlaybackContext for RecordingContext {
    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn error(&mut self, error: &anyhow::Error) {
        self.errors.push(format!("{:#}", error));
    }
}

struct Harness {
    manager: Arc<MacroManager>,
    dispatcher: KeyBindingDispatcher,
    target: Arc<TextBuffer>,
    service: Arc<HandlerService>,
    counts: Arc<Mutex<Vec<String>>>,
}

impl Harness {
    fn count(&self, id: &str) -> usize {
        self.counts.lock().iter().filter(|c| c.as_str() == id).count()
    }
}

/// Dispatcher bound to c1 (CTRL+1) and c3 (CTRL+3) with only c1
/// whitelisted, recording into its own manager.
fn harness(storage: Option<MacroStorage>) -> Harness {
    let mut contexts = ContextManager::new();
    contexts.define(BindingContext::new("window", "In Windows"));
    contexts.activate("window");

    let mut bindings = BindingTableManager::new();
    bindings.add_table(BindingTable::new("window"));

    let service = Arc::new(HandlerService::new());
    let counts = Arc::new(Mutex::new(Vec::new()));
    for (sequence, id) in [("CTRL+1", "c1"), ("CTRL+3", "c3")] {
        let sequence = TriggerSequence::parse(sequence).unwrap();
        bindings
            .add_binding(Binding::new(sequence, ParameterizedCommand::new(id), "window"))
            .unwrap();
        let counts = counts.clone();
        service.activate_handler(
            id,
            handler_fn(move |command, _| {
                counts.lock().push(command.id().to_string());
                Ok(())
            }),
        );
    }

    let target = Arc::new(TextBuffer::default());
    let factories = InstructionFactoryRegistry::with_defaults(target.clone(), service.clone());
    let manager = Arc::new(match storage {
        Some(storage) => MacroManager::with_storage(storage, factories),
        None => MacroManager::in_memory(factories),
    });

    let recorder = MacroRecorder::new(target.clone(), service.clone()).with_manager(manager.clone());
    let dispatcher = KeyBindingDispatcher::new(service.clone(), CommandWhitelist::new(["c1"]))
        .with_contexts(contexts)
        .with_bindings(bindings)
        .with_recorder(recorder);

    Harness {
        manager,
        dispatcher,
        target,
        service,
        counts,
    }
}

fn ctrl_digit(c: char) -> KeyEvent {
    KeyEvent::key_down(c as u32, ModifierMask::CTRL, None)
}

fn typed(c: char) -> KeyEvent {
    KeyEvent::key_down(c as u32, ModifierMask::empty(), Some(c))
}

#[test]
fn test_only_whitelisted_commands_are_recorded() {
    let mut h = harness(None);

    assert!(h.manager.toggle_macro_record().unwrap());
    assert_eq!(
        h.dispatcher.dispatch(&ctrl_digit('1')).unwrap(),
        DispatchOutcome::Executed(ParameterizedCommand::new("c1"))
    );
    assert_eq!(
        h.dispatcher.dispatch(&ctrl_digit('3')).unwrap(),
        DispatchOutcome::Executed(ParameterizedCommand::new("c3"))
    );
    assert!(!h.manager.toggle_macro_record().unwrap());

    let maps = h.manager.last_macro().unwrap();
    assert_eq!(maps.len(), 1, "c3 executed but must not be captured");
    assert_eq!(maps[0].get(ID).map(String::as_str), Some(COMMAND_INSTRUCTION_ID));
    assert!(maps
        .iter()
        .all(|map| map.values().all(|value| !value.contains("c3"))));

    let before = h.count("c1");
    let report = h.manager.playback_last_macro(&mut RecordingContext::default()).unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(h.count("c1"), before + 1);
    assert_eq!(h.count("c3"), 1);
}

#[test]
fn test_unbound_character_is_reinserted_once() {
    let dir = TempDir::new().unwrap();
    let mut h = harness(Some(MacroStorage::with_dir(dir.path(), 5)));

    h.manager.toggle_macro_record().unwrap();
    assert_eq!(h.dispatcher.dispatch(&typed('é')).unwrap(), DispatchOutcome::Ignored);
    // Key-ups are not captured; replay synthesizes them.
    let up = KeyEvent::key_up('é' as u32, ModifierMask::empty(), Some('é'));
    h.dispatcher.dispatch(&up).unwrap();
    h.manager.toggle_macro_record().unwrap();

    let maps = h.manager.last_macro().unwrap();
    assert_eq!(maps.len(), 1);
    assert_eq!(maps[0].get(ID).map(String::as_str), Some(KEYSTROKE_INSTRUCTION_ID));
    assert_eq!(maps[0].get(CHARACTER).map(String::as_str), Some("é"));

    // Replay from disk through a fresh manager
    let factories = InstructionFactoryRegistry::with_defaults(h.target.clone(), h.service.clone());
    let reloaded = MacroManager::with_storage(MacroStorage::with_dir(dir.path(), 5), factories);
    assert!(reloaded.reload_macros().unwrap());
    reloaded
        .playback_last_macro(&mut RecordingContext::default())
        .unwrap();

    assert_eq!(h.target.text(), "é");
    let kinds: Vec<KeyEventKind> = h.target.events.lock().iter().map(|e| e.kind()).collect();
    assert_eq!(kinds, vec![KeyEventKind::KeyDown, KeyEventKind::KeyUp]);
}

#[test]
fn test_empty_recordings_are_persisted() {
    let dir = TempDir::new().unwrap();
    let storage = MacroStorage::with_dir(dir.path(), 5);
    let manager = MacroManager::with_storage(storage.clone(), InstructionFactoryRegistry::new());

    assert!(manager.toggle_macro_record().unwrap());
    assert!(!manager.toggle_macro_record().unwrap());
    assert!(manager.toggle_macro_record().unwrap());
    assert!(!manager.toggle_macro_record().unwrap());

    assert_eq!(storage.list().unwrap().len(), 2);
    let latest = storage.load_latest().unwrap().unwrap();
    assert!(latest.instructions.is_empty());
    assert_eq!(manager.last_macro(), Some(Vec::new()));

    let report = manager
        .playback_last_macro(&mut RecordingContext::default())
        .unwrap();
    assert_eq!(report, PlaybackReport::default());
}

#[test]
fn test_reconstructed_instruction_behaves_like_original() {
    let target = Arc::new(TextBuffer::default());
    let service = Arc::new(HandlerService::new());
    let registry = InstructionFactoryRegistry::with_defaults(target.clone(), service.clone());

    let event = KeyEvent::key_down('q' as u32, ModifierMask::SHIFT, Some('Q'));
    let original = KeystrokeInstruction::new(event, target.clone());
    let rebuilt = registry.from_map(&original.to_map()).unwrap();

    assert_eq!(rebuilt.id(), original.id());
    assert_eq!(rebuilt.to_map(), original.to_map());
    assert_eq!(rebuilt.user_representation(), "Key: Q");

    let mut context = RecordingContext::default();
    original.execute(&mut context).unwrap();
    rebuilt.execute(&mut context).unwrap();
    assert_eq!(target.text(), "QQ");

    let command = ParameterizedCommand::new("edit.find").with_parameter("term", "a b=c");
    let original = CommandInstruction::new(command.clone(), Some(event), service.clone());
    let rebuilt = registry.from_map(&original.to_map()).unwrap();
    assert_eq!(rebuilt.to_map(), original.to_map());
}

#[test]
fn test_reconstruction_errors_are_distinct() {
    let registry = InstructionFactoryRegistry::with_defaults(
        Arc::new(TextBuffer::default()),
        Arc::new(HandlerService::new()),
    );

    let missing = InstructionMap::new();
    assert!(matches!(
        registry.from_map(&missing),
        Err(MacroError::MissingInstructionId)
    ));

    let mut unknown = InstructionMap::new();
    unknown.insert(ID.to_string(), "no.such.kind".to_string());
    assert!(matches!(
        registry.from_map(&unknown),
        Err(MacroError::UnknownInstruction(ref id)) if id == "no.such.kind"
    ));

    let mut malformed = KeystrokeInstruction::new(typed('a'), Arc::new(TextBuffer::default())).to_map();
    malformed.insert("keyCode".to_string(), "abc".to_string());
    assert!(matches!(
        registry.from_map(&malformed),
        Err(MacroError::MalformedInstruction { ref id, .. }) if id == KEYSTROKE_INSTRUCTION_ID
    ));
}

/// Factory-less instruction that fails on every run.
#[derive(Debug)]
struct Failing;

impl MacroInstruction for Failing {
    fn id(&self) -> &str {
        "test.failing"
    }
    fn execute(&self, _context: &mut dyn PlaybackContext) -> anyhow::Result<()> {
        anyhow::bail!("widget disposed")
    }
    fn to_map(&self) -> InstructionMap {
        InstructionMap::from([(ID.to_string(), self.id().to_string())])
    }
    fn user_representation(&self) -> String {
        "Failing".to_string()
    }
}

#[derive(Debug)]
struct Cancelling;

impl MacroInstruction for Cancelling {
    fn id(&self) -> &str {
        "test.cancel"
    }
    fn execute(&self, _context: &mut dyn PlaybackContext) -> anyhow::Result<()> {
        Err(MacroCancelled.into())
    }
    fn to_map(&self) -> InstructionMap {
        InstructionMap::from([(ID.to_string(), self.id().to_string())])
    }
    fn user_representation(&self) -> String {
        "Cancel".to_string()
    }
}

struct Fixed(fn() -> Box<dyn MacroInstruction>);

impl InstructionFactory for Fixed {
    fn create(&self, _map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError> {
        Ok((self.0)())
    }
}

fn failing() -> Box<dyn MacroInstruction> {
    Box::new(Failing)
}

fn cancelling() -> Box<dyn MacroInstruction> {
    Box::new(Cancelling)
}

fn manager_with_test_kinds(target: Arc<TextBuffer>) -> MacroManager {
    let mut registry =
        InstructionFactoryRegistry::with_defaults(target, Arc::new(HandlerService::new()));
    registry.register("test.failing", Arc::new(Fixed(failing)));
    registry.register("test.cancel", Arc::new(Fixed(cancelling)));
    MacroManager::in_memory(registry)
}

#[test]
fn test_execution_failure_is_reported_and_playback_continues() {
    let target = Arc::new(TextBuffer::default());
    let manager = manager_with_test_kinds(target.clone());

    manager.toggle_macro_record().unwrap();
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('a'), target.clone())));
    manager.add_instruction(Arc::new(Failing));
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('b'), target.clone())));
    manager.toggle_macro_record().unwrap();

    let mut context = RecordingContext::default();
    let report = manager.playback_last_macro(&mut context).unwrap();

    assert_eq!(report.executed, 2);
    assert_eq!(report.failed, 1);
    assert!(!report.cancelled);
    assert_eq!(target.text(), "ab");
    assert_eq!(context.errors.len(), 1);
    assert!(context.errors[0].contains("widget disposed"));
    assert_eq!(context.logs.len(), 3);
    assert!(context.logs[1].starts_with("Playing back: Failing"));
    assert!(!manager.is_playing_back());
}

#[test]
fn test_reconstruction_failure_aborts_before_anything_runs() {
    let target = Arc::new(TextBuffer::default());
    let manager = manager_with_test_kinds(target.clone());

    manager.toggle_macro_record().unwrap();
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('a'), target.clone())));
    manager.add_instruction(Arc::new(Failing));
    manager.toggle_macro_record().unwrap();

    // Drop the kind so the second map can no longer be rebuilt
    *manager.factories() = InstructionFactoryRegistry::with_defaults(
        target.clone(),
        Arc::new(HandlerService::new()),
    );

    let err = manager
        .playback_last_macro(&mut RecordingContext::default())
        .unwrap_err();
    assert!(matches!(err, MacroError::UnknownInstruction(ref id) if id == "test.failing"));
    assert_eq!(target.text(), "");
    assert!(!manager.is_playing_back());
}

#[test]
fn test_cancelled_instruction_stops_playback() {
    let target = Arc::new(TextBuffer::default());
    let manager = manager_with_test_kinds(target.clone());

    manager.toggle_macro_record().unwrap();
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('a'), target.clone())));
    manager.add_instruction(Arc::new(Cancelling));
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('b'), target.clone())));
    manager.toggle_macro_record().unwrap();

    let mut context = RecordingContext::default();
    let report = manager.playback_last_macro(&mut context).unwrap();

    assert!(report.cancelled);
    assert_eq!(report.executed, 1);
    assert_eq!(report.failed, 0);
    assert!(context.errors.is_empty());
    assert_eq!(target.text(), "a");
}

/// Tries to start recording from inside playback.
#[derive(Debug)]
struct StartsRecording(Arc<MacroManager>, Arc<Mutex<Option<String>>>);

impl MacroInstruction for StartsRecording {
    fn id(&self) -> &str {
        "test.record"
    }
    fn execute(&self, _context: &mut dyn PlaybackContext) -> anyhow::Result<()> {
        let refused = self.0.toggle_macro_record().err().map(|e| e.to_string());
        *self.1.lock() = refused;
        Ok(())
    }
    fn to_map(&self) -> InstructionMap {
        InstructionMap::from([(ID.to_string(), self.id().to_string())])
    }
    fn user_representation(&self) -> String {
        "Start recording".to_string()
    }
}

struct StartsRecordingFactory(Arc<Mutex<Option<Arc<MacroManager>>>>, Arc<Mutex<Option<String>>>);

impl InstructionFactory for StartsRecordingFactory {
    fn create(&self, _map: &InstructionMap) -> Result<Box<dyn MacroInstruction>, MacroError> {
        let manager = self
            .0
            .lock()
            .clone()
            .ok_or_else(|| MacroError::malformed("test.record", "manager not set"))?;
        Ok(Box::new(StartsRecording(manager, self.1.clone())))
    }
}

#[test]
fn test_record_and_playback_exclude_each_other() {
    let slot = Arc::new(Mutex::new(None));
    let refusal = Arc::new(Mutex::new(None));
    let mut registry = InstructionFactoryRegistry::new();
    registry.register(
        "test.record",
        Arc::new(StartsRecordingFactory(slot.clone(), refusal.clone())),
    );
    let manager = Arc::new(MacroManager::in_memory(registry));
    *slot.lock() = Some(manager.clone());

    manager.toggle_macro_record().unwrap();
    assert!(matches!(
        manager.playback_last_macro(&mut RecordingContext::default()),
        Err(MacroError::InvalidStateTransition(_))
    ));
    manager.add_instruction(Arc::new(StartsRecording(manager.clone(), refusal.clone())));
    manager.toggle_macro_record().unwrap();

    manager
        .playback_last_macro(&mut RecordingContext::default())
        .unwrap();

    let refused = refusal.lock().clone();
    assert!(refused.unwrap().contains("playing back"));
    assert!(!manager.is_recording());
    assert!(!manager.is_playing_back());
}

#[derive(Default)]
struct StateLog(Mutex<Vec<MacroStateEvent>>);

impl MacroStateListener for StateLog {
    fn macro_state_changed(&self, state: MacroStateEvent) {
        self.0.lock().push(state);
    }
}

#[test]
fn test_listeners_see_every_transition() {
    let target = Arc::new(TextBuffer::default());
    let manager = manager_with_test_kinds(target.clone());
    let log = Arc::new(StateLog::default());
    let listener: Arc<dyn MacroStateListener> = log.clone();
    manager.add_listener(listener.clone());

    manager.toggle_macro_record().unwrap();
    manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('a'), target)));
    manager.toggle_macro_record().unwrap();
    manager
        .playback_last_macro(&mut RecordingContext::default())
        .unwrap();

    let recording = |r, p| MacroStateEvent {
        recording: r,
        playing_back: p,
    };
    assert_eq!(
        *log.0.lock(),
        vec![
            recording(true, false),
            recording(false, false),
            recording(false, true),
            recording(false, false),
        ]
    );

    assert!(manager.remove_listener(&listener));
    manager.toggle_macro_record().unwrap();
    assert_eq!(log.0.lock().len(), 4);
}

#[test]
fn test_add_instruction_outside_recording_is_ignored() {
    let target = Arc::new(TextBuffer::default());
    let manager = manager_with_test_kinds(target.clone());

    assert!(!manager.add_instruction(Arc::new(KeystrokeInstruction::new(typed('a'), target))));
    assert_eq!(manager.recorded_len(), 0);
    assert!(manager.last_macro().is_none());
}

#[test]
fn test_reload_without_saved_macros() {
    let dir = TempDir::new().unwrap();
    let manager = MacroManager::with_storage(
        MacroStorage::with_dir(dir.path().join("missing"), 3),
        InstructionFactoryRegistry::new(),
    );
    assert!(!manager.reload_macros().unwrap());
    assert!(manager.last_macro().is_none());

    let memory = MacroManager::in_memory(InstructionFactoryRegistry::new());
    assert!(!memory.reload_macros().unwrap());
}

#[test]
fn test_temporary_instance_receives_unpinned_recordings() {
    let target = Arc::new(TextBuffer::default());
    let service = Arc::new(HandlerService::new());
    let recorder = MacroRecorder::new(target.clone(), service.clone());
    let temporary = Arc::new(MacroManager::in_memory(InstructionFactoryRegistry::new()));
    let previous = current();

    {
        let guard = with_temporary_default_instance(temporary.clone());
        assert!(Arc::ptr_eq(&current(), guard.manager()));

        temporary.toggle_macro_record().unwrap();
        recorder.on_dispatched_event(&typed('z'));
        recorder.on_command_executed(&ParameterizedCommand::new("c1"), None);
        assert_eq!(temporary.recorded_len(), 2);
        temporary.toggle_macro_record().unwrap();
    }

    assert!(Arc::ptr_eq(&current(), &previous));
    assert!(!previous.is_recording());
    let maps = temporary.last_macro().unwrap();
    assert_eq!(maps[0].get(CHARACTER).map(String::as_str), Some("z"));
    assert_eq!(
        maps[1].get(ID).map(String::as_str),
        Some(COMMAND_INSTRUCTION_ID)
    );

    // A panic inside the guarded scope still restores the previous instance.
    let panicking = Arc::new(MacroManager::in_memory(InstructionFactoryRegistry::new()));
    let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _guard = with_temporary_default_instance(panicking.clone());
        assert!(Arc::ptr_eq(&current(), &panicking));
        panic!("playback aborted");
    }));
    assert!(unwound.is_err());
    assert!(Arc::ptr_eq(&current(), &previous));
}

#[test]
fn test_command_replay_reports_missing_handler() {
    let service = Arc::new(HandlerService::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    service.activate_handler(
        "c1",
        handler_fn(move |_, _| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }),
    );
    let instruction = CommandInstruction::new(ParameterizedCommand::new("c1"), None, service.clone());
    let mut context = RecordingContext::default();

    instruction.execute(&mut context).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(context.logs, vec!["Executing recorded command: c1"]);

    service.deactivate_handler("c1");
    let err = instruction.execute(&mut context).unwrap_err();
    assert!(err.to_string().contains("not executed"));
}
