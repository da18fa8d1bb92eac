//! JSONL event log: append-only line-delimited JSON describing what the
//! harness did and why.
//!
//! Each line is a self-contained JSON object assembled in memory and written
//! with a single `write_all`, so a tailing process never sees a partial line.
//!
//! Three-level fallback chain:
//! 1. Primary file path
//! 2. stderr with `[SG-JSONL]` prefix
//! 3. Silent discard (a broken event log must never fail a suite)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::{GuardError, Result};

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Event types emitted by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SuiteStart,
    Outcome,
    FailureAction,
    PlanDeferred,
    PlanResolved,
    PlanForced,
    BailOut,
    SuiteFinish,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Assertion number the event concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
    /// Active failure policy label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Freeform details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    /// Create a new entry stamped with the current UTC time.
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: format_utc_now(),
            event,
            severity,
            test: None,
            description: None,
            passed: None,
            policy: None,
            executed: None,
            expected: None,
            exit_code: None,
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Append-only JSONL writer with stderr fallback.
pub struct JsonlWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    lines_written: u64,
}

impl JsonlWriter {
    /// Open the log file for appending. Falls back to stderr on failure.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match open_append(&path) {
            Ok(file) => Self {
                path,
                writer: Some(BufWriter::new(file)),
                state: WriterState::Normal,
                lines_written: 0,
            },
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SG-JSONL] {e}; using stderr");
                Self {
                    path,
                    writer: None,
                    state: WriterState::Stderr,
                    lines_written: 0,
                }
            }
        }
    }

    /// Write a single log entry as one JSONL line.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SG-JSONL] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffers.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state.
    pub fn state(&self) -> &str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Lines accepted so far, across every level of the fallback chain.
    pub fn lines_written(&self) -> u64 {
        self.lines_written
    }

    /// Path of the primary log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let failed = self
                    .writer
                    .as_mut()
                    .is_none_or(|w| w.write_all(line.as_bytes()).is_err());
                if failed {
                    self.degrade();
                    self.write_line(line);
                    return;
                }
                self.lines_written += 1;
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[SG-JSONL] {line}").is_err() {
                    self.degrade();
                    return;
                }
                self.lines_written += 1;
            }
            WriterState::Discard => {}
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        self.state = match self.state {
            WriterState::Normal => {
                let _ = writeln!(io::stderr(), "[SG-JSONL] write failed, using stderr");
                WriterState::Stderr
            }
            WriterState::Stderr | WriterState::Discard => WriterState::Discard,
        };
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

/// Cheaply-cloneable shared handle to an event log.
#[derive(Clone)]
pub struct EventLogHandle {
    inner: Arc<Mutex<JsonlWriter>>,
}

impl EventLogHandle {
    /// Open (or create) the event log at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(JsonlWriter::open(path))),
        }
    }

    /// Append an entry.
    pub fn emit(&self, entry: &LogEntry) {
        self.inner.lock().write_entry(entry);
    }

    /// Flush pending lines to the file.
    pub fn flush(&self) {
        self.inner.lock().flush();
    }

    /// Lines written so far.
    pub fn lines_written(&self) -> u64 {
        self.inner.lock().lines_written()
    }
}

impl std::fmt::Debug for EventLogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let w = self.inner.lock();
        f.debug_struct("EventLogHandle")
            .field("path", &w.path())
            .field("state", &w.state())
            .finish()
    }
}

fn open_append(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|source| GuardError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| GuardError::io(path, source))
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
