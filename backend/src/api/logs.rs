//! Pipeline logging, streamed to HTTP clients via Server-Sent Events (SSE).
//!
//! Every pipeline stage reports progress through a process-wide broadcast
//! channel. Entries are also mirrored to stderr, which is the CLI's progress
//! output; [`set_stderr_mirror`] turns that off. Stdout stays free for
//! emitted records.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Entries buffered per subscriber before slow SSE clients start lagging.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    fn marker(self) -> &'static str {
        match self {
            LogLevel::Info => "  ",
            LogLevel::Success => "ok",
            LogLevel::Warning => "!!",
            LogLevel::Error => "xx",
        }
    }
}

/// One progress line of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth under the previous top-level entry
    #[serde(default)]
    pub indent: u8,
    /// RFC 3339 time the entry was created
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn nested(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }

    /// Single line for the terminal.
    pub fn render(&self) -> String {
        format!(
            "{}{} {}",
            "   ".repeat(self.indent as usize),
            self.level.marker(),
            self.message
        )
    }
}

/// Process-wide broadcaster used by the `log_*` helpers
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Fans log entries out to every SSE subscriber
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    mirror: AtomicBool,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            mirror: AtomicBool::new(true),
        }
    }

    pub fn set_mirror(&self, enabled: bool) {
        self.mirror.store(enabled, Ordering::Relaxed);
    }

    pub fn mirrors(&self) -> bool {
        self.mirror.load(Ordering::Relaxed)
    }

    /// Print the entry to stderr (unless muted) and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        if self.mirrors() {
            eprintln!("{}", entry.render());
        }

        // No subscribers is the normal CLI case
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Enable or silence the stderr copy of the process-wide log.
pub fn set_stderr_mirror(enabled: bool) {
    LOG_BROADCASTER.set_mirror(enabled);
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).nested(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_serializes_camel_case() {
        let entry = LogEntry::new(LogLevel::Warning, "3 mapped columns missing").nested(1);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["indent"], 1);
        assert_eq!(json["message"], "3 mapped columns missing");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_render_indents() {
        assert_eq!(LogEntry::new(LogLevel::Success, "done").render(), "ok done");
        assert_eq!(
            LogEntry::new(LogLevel::Info, "nested").nested(2).render(),
            "         nested"
        );
    }

    #[test]
    fn test_subscribers_receive_entries() {
        let broadcaster = LogBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::new(LogLevel::Error, "boom"));
        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.message, "boom");
        assert_eq!(entry.level, LogLevel::Error);
    }

    #[test]
    fn test_muted_mirror_still_broadcasts() {
        let broadcaster = LogBroadcaster::new();
        assert!(broadcaster.mirrors());

        broadcaster.set_mirror(false);
        let mut rx = broadcaster.subscribe();
        broadcaster.log(LogEntry::new(LogLevel::Info, "quiet"));

        assert!(!broadcaster.mirrors());
        assert_eq!(rx.try_recv().unwrap().message, "quiet");
    }
}
