//! Observational line sink
//!
//! A single-method output channel for user-relevant notices (an editor
//! output panel, a status file). Diagnostics still go through `tracing`;
//! the sink only mirrors the lines a person watching the scheduler cares
//! about.

use std::sync::{Arc, Mutex};

/// Append-only line output
pub trait LogSink: Send + Sync {
    fn append_line(&self, line: &str);
}

/// Shared reference to a log sink
pub type SharedLogSink = Arc<dyn LogSink>;

/// Discards every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn append_line(&self, _line: &str) {}
}

/// Collects lines in memory
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    lines: Mutex<Vec<String>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all lines so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Whether any line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for MemoryLogSink {
    fn append_line(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}
