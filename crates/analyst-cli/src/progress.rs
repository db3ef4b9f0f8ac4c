//! Spinner and status lines for terminal feedback

use std::io::{stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

// ANSI escape codes
const CLEAR_LINE: &str = "\x1b[2K\r";
const HIDE_CURSOR: &str = "\x1b[?25l";
const SHOW_CURSOR: &str = "\x1b[?25h";
const CYAN: &str = "\x1b[96m";
const GREEN: &str = "\x1b[92m";
const YELLOW: &str = "\x1b[93m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Spinner animation frames
const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Alternative ASCII spinner for terminals that don't support Unicode
const ASCII_SPINNER: &[&str] = &["|", "/", "-", "\\"];

/// A terminal spinner shown while the assistant is working
pub struct Spinner {
    message: String,
    is_running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
    use_unicode: bool,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_running: Arc::new(AtomicBool::new(false)),
            handle: None,
            use_unicode: supports_unicode(),
        }
    }

    /// Start the spinner animation
    pub fn start(&mut self) {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return;
        }

        let is_running = self.is_running.clone();
        let message = self.message.clone();
        let frames = if self.use_unicode {
            SPINNER_FRAMES
        } else {
            ASCII_SPINNER
        };

        self.handle = Some(tokio::spawn(async move {
            let mut idx = 0;
            let mut tick = interval(Duration::from_millis(80));

            print!("{}", HIDE_CURSOR);
            let _ = stdout().flush();

            while is_running.load(Ordering::SeqCst) {
                print!("{}{}{} {}{}", CLEAR_LINE, CYAN, frames[idx], message, RESET);
                let _ = stdout().flush();
                idx = (idx + 1) % frames.len();
                tick.tick().await;
            }

            print!("{}{}", CLEAR_LINE, SHOW_CURSOR);
            let _ = stdout().flush();
        }));
    }

    /// Stop the spinner silently
    pub async fn stop(&mut self) {
        self.is_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if self.is_running.swap(false, Ordering::SeqCst) {
            print!("{}", SHOW_CURSOR);
            let _ = stdout().flush();
        }
    }
}

/// Status indicator for one-line messages
pub struct StatusLine {
    use_unicode: bool,
}

impl StatusLine {
    pub fn new() -> Self {
        Self {
            use_unicode: supports_unicode(),
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        let arrow = if self.use_unicode { "→" } else { ">" };
        println!("{}{} {}{}", DIM, arrow, message.into(), RESET);
    }

    pub fn success(&self, message: impl Into<String>) {
        let check = if self.use_unicode { "✓" } else { "+" };
        println!("{}{} {}{}", GREEN, check, message.into(), RESET);
    }

    pub fn warning(&self, message: impl Into<String>) {
        let warn = if self.use_unicode { "⚠" } else { "!" };
        println!("{}{} {}{}", YELLOW, warn, message.into(), RESET);
    }

    pub fn use_unicode(&self) -> bool {
        self.use_unicode
    }
}

impl Default for StatusLine {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if the terminal likely supports Unicode
pub fn supports_unicode() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term.contains("xterm") || term.contains("256color") || term.contains("kitty") {
            return true;
        }
    }

    for var in &["LC_ALL", "LC_CTYPE", "LANG"] {
        if let Ok(val) = std::env::var(var) {
            if val.to_lowercase().contains("utf") {
                return true;
            }
        }
    }

    false
}
