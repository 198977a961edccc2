//! Macro console: a human-facing echo of macro activity.
//!
//! Separate from tracing. The writer is created lazily on first use
//! (stderr unless replaced) and guarded by a mutex; writes are best effort.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

static CONSOLE: Mutex<Option<Box<dyn Write + Send>>> = parking_lot::const_mutex(None);
static ENABLED: AtomicBool = AtomicBool::new(true);

pub fn set_console_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn is_console_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Replace the console writer, returning the previous one.
pub fn set_console_writer(writer: Box<dyn Write + Send>) -> Option<Box<dyn Write + Send>> {
    CONSOLE.lock().replace(writer)
}

/// Write one line to the macro console, if enabled.
pub fn log_to_macro_console(message: &str) {
    if !is_console_enabled() {
        return;
    }
    let mut console = CONSOLE.lock();
    let writer = console.get_or_insert_with(|| Box::new(std::io::stderr()));
    if writeln!(writer, "[macro] {}", message).is_err() {
        tracing::debug!("Macro console write failed");
    }
    if writer.flush().is_err() {
        tracing::debug!("Macro console flush failed");
    }
}
