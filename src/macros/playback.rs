use tracing::{info, warn};

use super::console::log_to_macro_console;
use super::instruction::PlaybackContext;

/// Playback context that reports through tracing and the macro console.
#[derive(Debug, Default)]
pub struct ConsolePlaybackContext {
    errors: Vec<String>,
}

impl ConsolePlaybackContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages of the errors reported so far.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }
}

impl PlaybackContext for ConsolePlaybackContext {
    fn log(&mut self, message: &str) {
        info!(event_type = "macro_playback", "{}", message);
        log_to_macro_console(message);
    }

    fn error(&mut self, error: &anyhow::Error) {
        warn!(event_type = "macro_playback", error = %error, "Macro instruction failed");
        log_to_macro_console(&format!("Error: {:#}", error));
        self.errors.push(format!("{:#}", error));
    }
}

/// Summary of one playback run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaybackReport {
    pub executed: usize,
    pub failed: usize,
    pub cancelled: bool,
}
