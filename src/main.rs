use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use keybind_macro::commands::{handler_fn, HandlerService, ParameterizedCommand};
use keybind_macro::config::{self, Config};
use keybind_macro::dispatcher::{DispatchOutcome, KeyBindingDispatcher, ManualTimer};
use keybind_macro::keys::{KeyEvent, KeyEventKind, KeyStroke, ModifierMask, Platform, TriggerSequence};
use keybind_macro::{logging, ResultExt};
use keybind_macro::macros::{
    self, ConsolePlaybackContext, InstructionFactoryRegistry, KeyEventTarget, MacroManager,
    MacroRecorder, MacroStorage,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (default: ~/.keybind-macro/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debug-level logging on stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the config, list bindings and report conflicts
    Check,
    /// Dispatch a key sequence (e.g. "CTRL+5 CTRL+A x") against the configured bindings
    Simulate {
        keys: String,
        /// Record the simulated keys as a macro
        #[arg(long)]
        record: bool,
    },
    /// Inspect and replay saved macros
    Macros {
        #[command(subcommand)]
        action: MacroAction,
    },
}

#[derive(Subcommand)]
enum MacroAction {
    /// List saved macro files, oldest first
    List,
    /// Print the instructions of the newest saved macro
    Show,
    /// Replay the newest saved macro against a printing target
    Play,
}

/// Prints replayed key-downs instead of inserting them into a widget.
struct PrintingTarget;

impl KeyEventTarget for PrintingTarget {
    fn send(&self, event: &KeyEvent) -> Result<()> {
        if event.kind() == KeyEventKind::KeyDown {
            match event.data().character {
                Some(c) if !c.is_control() => println!("  insert {:?}", c),
                _ => println!("  key {}", event.data().key_code),
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose);

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => config::load_config(),
    };
    macros::set_console_enabled(config.get_show_macro_console());

    match cli.command {
        Command::Check => check(&config),
        Command::Simulate { keys, record } => simulate(&config, &keys, record),
        Command::Macros { action } => run_macro_action(&config, action),
    }
}

/// Command service with a printing handler for every bound command.
fn printing_service(config: &Config) -> Arc<HandlerService> {
    let service = Arc::new(HandlerService::new());
    let ids: BTreeSet<String> = config
        .bindings
        .iter()
        .filter_map(|b| ParameterizedCommand::deserialize(b.command.trim()).ok())
        .map(|c| c.id().to_string())
        .collect();
    for id in ids {
        service.activate_handler(
            id,
            handler_fn(|command, _| {
                println!("  execute {}", command);
                Ok(())
            }),
        );
    }
    service
}

fn macro_manager(config: &Config, service: Arc<HandlerService>) -> Arc<MacroManager> {
    let storage = MacroStorage::with_dir(config.get_macros_dir(), config.get_max_saved_macros());
    let factories = InstructionFactoryRegistry::with_defaults(Arc::new(PrintingTarget), service);
    Arc::new(MacroManager::with_storage(storage, factories))
}

fn check(config: &Config) -> Result<()> {
    let (dispatcher, issues) = KeyBindingDispatcher::from_config(config, printing_service(config));
    let platform = Platform::current();

    println!("Bindings:");
    for binding in dispatcher.bindings().bindings() {
        let scheme = binding.scheme_id.as_deref().unwrap_or("*");
        println!(
            "  {:<24} {:<32} context={} scheme={} kind={:?}",
            binding.sequence.display_for_platform(platform),
            binding.command,
            binding.context_id,
            scheme,
            binding.kind,
        );
    }

    let conflicts = dispatcher.bindings().find_conflicts(dispatcher.contexts());
    if !conflicts.is_empty() {
        println!("Conflicts:");
        for conflict in &conflicts {
            println!(
                "  {:?} {}: {} ({}) wins over {} ({})",
                conflict.conflict_type,
                conflict.sequence,
                conflict.winner.command,
                conflict.winner.context_id,
                conflict.loser.command,
                conflict.loser.context_id,
            );
        }
    }

    if !issues.is_empty() {
        println!("Invalid entries:");
        for issue in &issues {
            println!("  {}", issue);
        }
        bail!("{} config entries could not be applied", issues.len());
    }
    println!("Config OK");
    Ok(())
}

/// The key-down event a host would deliver for `stroke`.
fn event_for(stroke: &KeyStroke) -> KeyEvent {
    let character = char::from_u32(stroke.key)
        .filter(|c| !c.is_control() && stroke.key < 0x80)
        .map(|c| {
            if stroke.modifiers.contains(ModifierMask::SHIFT) {
                c
            } else {
                c.to_ascii_lowercase()
            }
        });
    KeyEvent::key_down(stroke.key, stroke.modifiers, character)
}

fn simulate(config: &Config, keys: &str, record: bool) -> Result<()> {
    let sequence = TriggerSequence::parse_for_platform(keys, Platform::current())
        .with_context(|| format!("parsing key sequence '{}'", keys))?;

    let service = printing_service(config);
    let manager = macro_manager(config, service.clone());
    let timer = ManualTimer::new();
    let (dispatcher, issues) = KeyBindingDispatcher::from_config(config, service.clone());
    if !issues.is_empty() {
        println!("{} config entries skipped (run `check` for details)", issues.len());
    }
    let mut dispatcher = dispatcher
        .with_timer(timer.clone())
        .with_recorder(MacroRecorder::new(Arc::new(PrintingTarget), service).with_manager(manager.clone()));

    if record {
        manager.toggle_macro_record()?;
    }

    for stroke in sequence.strokes() {
        let event = event_for(stroke);
        let outcome = match dispatcher.dispatch(&event) {
            Ok(outcome) => outcome,
            Err(e) => {
                println!("{:<16} -> {}", stroke.format(), e.user_message());
                continue;
            }
        };
        println!("{:<16} -> {}", stroke.format(), describe(&outcome));
        if outcome == DispatchOutcome::Ignored {
            PrintingTarget.send(&event)?;
        }
    }

    if let Some(token) = timer.fire() {
        if let Some(outcome) = dispatcher.handle_timeout(token)? {
            println!("{:<16} -> {}", "(timeout)", describe(&outcome));
        } else {
            println!("{:<16} -> abandoned", "(timeout)");
        }
    }

    if record {
        manager.toggle_macro_record()?;
        if let Some(dir) = manager.storage().map(|s| s.dir().display().to_string()) {
            println!("Macro saved to {}", dir);
        }
    }
    Ok(())
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Ignored => "not bound".to_string(),
        DispatchOutcome::Consumed => "sequence abandoned".to_string(),
        DispatchOutcome::Pending => "waiting for next stroke".to_string(),
        DispatchOutcome::Executed(command) => format!("executed {}", command),
        DispatchOutcome::NotExecuted { command, reason } => {
            format!("{} not executed: {}", command, reason)
        }
    }
}

fn run_macro_action(config: &Config, action: MacroAction) -> Result<()> {
    let manager = macro_manager(config, printing_service(config));
    let Some(storage) = manager.storage() else {
        bail!("macro storage is not configured");
    };

    match action {
        MacroAction::List => {
            let files = storage.list()?;
            if files.is_empty() {
                println!("No saved macros in {}", storage.dir().display());
            }
            for path in files {
                let Some(saved) = storage.load(&path).warn_on_err() else {
                    continue;
                };
                println!(
                    "{}  {}  {} instructions  {}",
                    saved.name,
                    saved.created_at.to_rfc3339(),
                    saved.instructions.len(),
                    path.display()
                );
            }
        }
        MacroAction::Show => match storage.load_latest()? {
            Some(saved) => {
                println!("{} ({})", saved.name, saved.created_at.to_rfc3339());
                for map in &saved.instructions {
                    println!("  {}", serde_json::to_string(map)?);
                }
            }
            None => println!("No saved macros"),
        },
        MacroAction::Play => {
            if !manager.reload_macros()? {
                println!("No saved macros");
                return Ok(());
            }
            let mut context = ConsolePlaybackContext::new();
            let report = manager.playback_last_macro(&mut context)?;
            info!(
                executed = report.executed,
                failed = report.failed,
                cancelled = report.cancelled,
                "Playback finished"
            );
            println!(
                "Played {} instructions ({} failed{})",
                report.executed + report.failed,
                report.failed,
                if report.cancelled { ", cancelled" } else { "" }
            );
        }
    }
    Ok(())
}
