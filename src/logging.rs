//! Structured JSONL logging plus human-readable stderr output.
//!
//! Dual output:
//! - **JSONL to file** (~/.keybind-macro/logs/keybind-macro.jsonl) for tooling
//! - **Compact to stderr** for humans
//!
//! # Usage
//!
//! ```rust,ignore
//! use keybind_macro::logging;
//!
//! // Keep the guard alive for the duration of the program
//! let _guard = logging::init(false);
//!
//! tracing::info!(event_type = "app_lifecycle", "Started");
//! ```
//!
//! # JSONL Output Format
//!
//! ```json
//! {"timestamp":"2026-01-05T10:30:45.123Z","level":"INFO","target":"keybind_macro::dispatcher","fields":{"event_type":"key_event","sequence":"CTRL+5","action":"partial","consumed":true}}
//! ```

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use parking_lot::Mutex;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Recent structured events, for CLI summaries.
static EVENT_BUFFER: Mutex<VecDeque<String>> = parking_lot::const_mutex(VecDeque::new());
const MAX_BUFFERED_EVENTS: usize = 100;

/// Guard that must be kept alive for the duration of the program.
/// Dropping it flushes and closes the log file.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize the dual-output logging system.
///
/// `verbose` lowers the default stderr filter to `debug`; `RUST_LOG`
/// always wins.
pub fn init(verbose: bool) -> LoggingGuard {
    let log_dir = get_log_dir();
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("[LOGGING] Failed to create log directory: {}", e);
    }
    let log_path = log_dir.join("keybind-macro.jsonl");

    let file: Box<dyn Write + Send> = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => Box::new(file),
        Err(e) => {
            eprintln!("[LOGGING] Failed to open log file: {}", e);
            Box::new(std::io::sink())
        }
    };

    // Non-blocking so a slow disk never stalls key dispatch
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file);

    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_layer = fmt::layer()
        .json()
        .with_writer(non_blocking_file)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .with_span_events(FmtSpan::NONE);

    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .compact();

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(pretty_layer)
        .try_init();
    if let Err(e) = installed {
        eprintln!("[LOGGING] Subscriber already installed: {}", e);
    }

    tracing::info!(
        event_type = "app_lifecycle",
        action = "started",
        log_path = %log_path.display(),
        "Logging initialized"
    );

    LoggingGuard {
        _file_guard: file_guard,
    }
}

/// Get the log directory path (~/.keybind-macro/logs/)
fn get_log_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".keybind-macro").join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("keybind-macro-logs"))
}

/// Get the path to the JSONL log file
pub fn log_path() -> PathBuf {
    get_log_dir().join("keybind-macro.jsonl")
}

fn add_to_buffer(category: &str, message: &str) {
    let mut buffer = EVENT_BUFFER.lock();
    if buffer.len() >= MAX_BUFFERED_EVENTS {
        buffer.pop_front();
    }
    buffer.push_back(format!("[{}] {}", category, message));
}

/// Get recent structured events, oldest first
pub fn get_recent_events() -> Vec<String> {
    EVENT_BUFFER.lock().iter().cloned().collect()
}

pub fn clear_recent_events() {
    EVENT_BUFFER.lock().clear();
}

// =============================================================================
// STRUCTURED LOGGING HELPERS
// =============================================================================

/// Log a key sequence step with structured fields
pub fn log_key_event(sequence: &str, action: &str, consumed: bool) {
    add_to_buffer("KEY", &format!("{} {} (consumed={})", action, sequence, consumed));

    tracing::debug!(
        event_type = "key_event",
        sequence = sequence,
        action = action,
        consumed = consumed,
        "Key {} {}", action, sequence
    );
}

/// Log a command execution with structured fields
pub fn log_command_event(command_id: &str, action: &str, success: bool) {
    add_to_buffer(
        "COMMAND",
        &format!("{} {} (success={})", action, command_id, success),
    );

    if success {
        tracing::info!(
            event_type = "command_event",
            command_id = command_id,
            action = action,
            success = success,
            "Command {} {}", command_id, action
        );
    } else {
        tracing::warn!(
            event_type = "command_event",
            command_id = command_id,
            action = action,
            success = success,
            "Command {} {}", command_id, action
        );
    }
}

/// Log a macro lifecycle event with structured fields
pub fn log_macro_event(action: &str, instruction_count: usize) {
    add_to_buffer(
        "MACRO",
        &format!("{} ({} instructions)", action, instruction_count),
    );

    tracing::info!(
        event_type = "macro_event",
        action = action,
        instruction_count = instruction_count,
        "Macro {}", action
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_path_is_jsonl() {
        let path = log_path();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jsonl"));
        assert!(path.to_string_lossy().contains("keybind-macro"));
    }

    #[test]
    fn test_buffer_keeps_latest_events() {
        for i in 0..(MAX_BUFFERED_EVENTS + 5) {
            add_to_buffer("TEST", &format!("event {}", i));
        }
        let events = get_recent_events();
        assert!(events.len() <= MAX_BUFFERED_EVENTS);
    }
}
