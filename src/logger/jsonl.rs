//! JSONL activity log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Four-level fallback chain:
//! 1. Primary file path
//! 2. Fallback path in the system temp dir
//! 3. stderr with `[PXP-JSONL]` prefix
//! 4. Silent discard (logging must never take the wizard down)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions, rename};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::catalog::ContextId;
use crate::core::config::LogConfig;
use crate::core::errors::{PxpError, Result};
use crate::validate::RejectReason;

/// Severity level for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// Log event types matching the wizard activity model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionStart,
    SessionEnd,
    UploadAccepted,
    UploadRejected,
    ContextSelected,
    OptimizeRefused,
    OptimizeComplete,
    DownloadSaved,
    Error,
}

/// A single JSONL log entry — all fields optional except `ts`, `event`, `severity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// ISO 8601 UTC timestamp.
    pub ts: String,
    /// Event type identifier.
    pub event: EventType,
    /// Severity level.
    pub severity: Severity,
    /// Affected filesystem path (when applicable).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Size in bytes of the affected file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Detected MIME type of an accepted upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Selected optimization context id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Stable refusal name for rejected actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Reported size of the optimized copy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_size: Option<u64>,
    /// Reported reduction percentage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ratio_percent: Option<u8>,
    /// Quota counter after the event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_today: Option<u32>,
    /// Whether the action succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    /// Error code if the action failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Human-readable error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
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
            path: None,
            size: None,
            mime: None,
            context: None,
            reason: None,
            optimized_size: None,
            ratio_percent: None,
            used_today: None,
            ok: None,
            error_code: None,
            error_message: None,
            details: None,
        }
    }
}

// ──────────────────────── activity events ────────────────────────

/// Domain events recorded in the activity log.
///
/// Plain data so the wizard can emit them from pure code; the runtime
/// converts each into a timestamped [`LogEntry`] at write time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityEvent {
    SessionStarted {
        config_hash: String,
        used_today: u32,
    },
    SessionEnded {
        completed: u32,
    },
    UploadAccepted {
        path: String,
        size: u64,
        mime: &'static str,
    },
    UploadRejected {
        path: Option<String>,
        reason: RejectReason,
    },
    ContextSelected {
        context: ContextId,
    },
    OptimizeRefused {
        reason: RejectReason,
    },
    OptimizeCompleted {
        path: String,
        context: ContextId,
        original_size: u64,
        optimized_size: u64,
        ratio_percent: u8,
        used_today: u32,
    },
    DownloadSaved {
        path: Option<String>,
        size: u64,
        ok: bool,
        details: Option<String>,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Convert an activity event into its log-entry representation.
#[must_use]
pub fn event_to_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::SessionStarted {
            config_hash,
            used_today,
        } => {
            let mut e = LogEntry::new(EventType::SessionStart, Severity::Info);
            e.details = Some(format!("config_hash={config_hash}"));
            e.used_today = Some(*used_today);
            e.ok = Some(true);
            e
        }
        ActivityEvent::SessionEnded { completed } => {
            let mut e = LogEntry::new(EventType::SessionEnd, Severity::Info);
            e.details = Some(format!("completed={completed}"));
            e.ok = Some(true);
            e
        }
        ActivityEvent::UploadAccepted { path, size, mime } => {
            let mut e = LogEntry::new(EventType::UploadAccepted, Severity::Info);
            e.path = Some(path.clone());
            e.size = Some(*size);
            e.mime = Some((*mime).to_string());
            e.ok = Some(true);
            e
        }
        ActivityEvent::UploadRejected { path, reason } => {
            let mut e = LogEntry::new(EventType::UploadRejected, Severity::Warning);
            e.path = path.clone();
            e.reason = Some(reason.name().to_string());
            e.details = Some(reason.description());
            e.ok = Some(false);
            e
        }
        ActivityEvent::ContextSelected { context } => {
            let mut e = LogEntry::new(EventType::ContextSelected, Severity::Info);
            e.context = Some(context.as_str().to_string());
            e
        }
        ActivityEvent::OptimizeRefused { reason } => {
            let mut e = LogEntry::new(EventType::OptimizeRefused, Severity::Warning);
            e.reason = Some(reason.name().to_string());
            e.details = Some(reason.description());
            e.ok = Some(false);
            e
        }
        ActivityEvent::OptimizeCompleted {
            path,
            context,
            original_size,
            optimized_size,
            ratio_percent,
            used_today,
        } => {
            let mut e = LogEntry::new(EventType::OptimizeComplete, Severity::Info);
            e.path = Some(path.clone());
            e.context = Some(context.as_str().to_string());
            e.size = Some(*original_size);
            e.optimized_size = Some(*optimized_size);
            e.ratio_percent = Some(*ratio_percent);
            e.used_today = Some(*used_today);
            e.ok = Some(true);
            e
        }
        ActivityEvent::DownloadSaved {
            path,
            size,
            ok,
            details,
        } => {
            let severity = if *ok { Severity::Info } else { Severity::Warning };
            let mut e = LogEntry::new(EventType::DownloadSaved, severity);
            e.path = path.clone();
            e.size = Some(*size);
            e.ok = Some(*ok);
            e.details = details.clone();
            e
        }
        ActivityEvent::Error { code, message } => {
            let mut e = LogEntry::new(EventType::Error, Severity::Critical);
            e.error_code = Some(code.clone());
            e.error_message = Some(message.clone());
            e.ok = Some(false);
            e
        }
    }
}

// ──────────────────────── writer ────────────────────────

/// Degradation state of the JSONL writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    /// Writing to primary path.
    Normal,
    /// Primary failed, writing to fallback path.
    Fallback,
    /// Both files failed, writing to stderr.
    Stderr,
    /// Everything failed, silently discarding.
    Discard,
}

/// Configuration for the JSONL writer.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// Optional fallback path (e.g. on a different filesystem).
    pub fallback_path: Option<PathBuf>,
    /// Maximum file size before rotation (bytes). Default: 10 MiB.
    pub max_size_bytes: u64,
    /// Number of rotated files to keep. Default: 3.
    pub max_rotated_files: u32,
}

impl JsonlConfig {
    /// Writer config derived from the `[log]` section.
    #[must_use]
    pub fn from_log_config(log: &LogConfig) -> Self {
        Self {
            path: log.path.clone(),
            ..Self::default()
        }
    }
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: LogConfig::default().path,
            fallback_path: Some(std::env::temp_dir().join("pixelpress.jsonl")),
            max_size_bytes: 10 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

/// Append-only JSONL log writer with rotation and multi-level fallback.
pub struct JsonlWriter {
    config: JsonlConfig,
    writer: Option<BufWriter<File>>,
    state: WriterState,
    bytes_written: u64,
}

impl JsonlWriter {
    /// Open the JSONL log file. Falls through the degradation chain on failure.
    pub fn open(config: JsonlConfig) -> Self {
        let mut w = Self {
            config,
            writer: None,
            state: WriterState::Discard,
            bytes_written: 0,
        };
        w.try_open_primary();
        w
    }

    /// Record an activity event as one JSONL line.
    pub fn record(&mut self, event: &ActivityEvent) {
        self.write_entry(&event_to_entry(event));
    }

    /// Write a single log entry as one atomic JSONL line.
    ///
    /// Flushes immediately: entries are rare user actions and a crash must
    /// not lose the tail of the session.
    pub fn write_entry(&mut self, entry: &LogEntry) {
        let line = match serde_json::to_string(entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                // Serialization failure is a programming error; log to stderr and bail.
                let _ = writeln!(io::stderr(), "[PXP-JSONL] serialize error: {e}");
                return;
            }
        };

        self.write_line(&line);
        self.flush();
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
            WriterState::Fallback => "fallback",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    /// Number of bytes written to the current file.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    // ──────────────────────── internals ────────────────────────

    fn write_line(&mut self, line: &str) {
        // Check if rotation is needed before writing.
        if self.bytes_written + line.len() as u64 > self.config.max_size_bytes
            && matches!(self.state, WriterState::Normal | WriterState::Fallback)
        {
            self.rotate();
        }

        match self.state {
            WriterState::Normal | WriterState::Fallback => {
                if let Some(w) = self.writer.as_mut() {
                    if w.write_all(line.as_bytes()).is_err() {
                        self.degrade();
                        self.write_line(line); // retry at next level
                        return;
                    }
                    self.bytes_written += line.len() as u64;
                } else {
                    self.degrade();
                    self.write_line(line);
                }
            }
            WriterState::Stderr => {
                let _ = write!(io::stderr(), "[PXP-JSONL] {line}");
            }
            WriterState::Discard => {
                // Silently drop.
            }
        }
    }

    fn try_open_primary(&mut self) {
        match open_append(&self.config.path) {
            Ok((file, size)) => {
                self.writer = Some(BufWriter::with_capacity(8 * 1024, file));
                self.state = WriterState::Normal;
                self.bytes_written = size;
            }
            Err(_) => {
                self.try_open_fallback();
            }
        }
    }

    fn try_open_fallback(&mut self) {
        if let Some(fb) = &self.config.fallback_path {
            match open_append(fb) {
                Ok((file, size)) => {
                    let _ = writeln!(
                        io::stderr(),
                        "[PXP-JSONL] primary path failed, using fallback: {}",
                        fb.display()
                    );
                    self.writer = Some(BufWriter::with_capacity(8 * 1024, file));
                    self.state = WriterState::Fallback;
                    self.bytes_written = size;
                }
                Err(_) => {
                    self.state = WriterState::Stderr;
                    let _ = writeln!(
                        io::stderr(),
                        "[PXP-JSONL] both primary and fallback paths failed, using stderr"
                    );
                }
            }
        } else {
            self.state = WriterState::Stderr;
            let _ = writeln!(
                io::stderr(),
                "[PXP-JSONL] primary path failed and no fallback configured, using stderr"
            );
        }
    }

    fn degrade(&mut self) {
        self.writer = None;
        match self.state {
            WriterState::Normal => {
                self.try_open_fallback();
            }
            WriterState::Fallback => {
                self.state = WriterState::Stderr;
                let _ = writeln!(
                    io::stderr(),
                    "[PXP-JSONL] fallback write failed, using stderr"
                );
            }
            WriterState::Stderr => {
                self.state = WriterState::Discard;
            }
            WriterState::Discard => {}
        }
    }

    fn rotate(&mut self) {
        // Flush and drop current file.
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
        self.writer = None;

        let base = match self.state {
            WriterState::Normal => &self.config.path,
            WriterState::Fallback => match &self.config.fallback_path {
                Some(p) => p,
                None => return,
            },
            _ => return,
        };

        // Shift existing rotations: .3→delete, .2→.3, .1→.2, current→.1
        for i in (1..self.config.max_rotated_files).rev() {
            let from = rotated_name(base, i);
            let to = rotated_name(base, i + 1);
            let _ = rename(&from, &to);
        }
        // Delete the oldest if it exceeds max.
        let oldest = rotated_name(base, self.config.max_rotated_files);
        let _ = fs::remove_file(&oldest);

        // Rename current → .1
        let _ = rename(base, &rotated_name(base, 1));

        // Reopen a fresh file.
        match open_append(base) {
            Ok((file, _)) => {
                self.writer = Some(BufWriter::with_capacity(8 * 1024, file));
                self.bytes_written = 0;
            }
            Err(_) => {
                self.degrade();
            }
        }
    }
}

// ──────────────────────── helpers ────────────────────────

/// Open or create a file for appending. Returns `(File, current_size)`.
fn open_append(path: &Path) -> Result<(File, u64)> {
    // Ensure parent directory exists.
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| PxpError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| PxpError::io(path, source))?;
    let size = file.metadata().map(|m| m.len()).unwrap_or(0);
    Ok((file, size))
}

/// Build a rotated filename: `foo.jsonl` → `foo.jsonl.3`.
fn rotated_name(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Format current UTC time as ISO 8601.
fn format_utc_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

// ──────────────────────── tests ────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(path: PathBuf) -> JsonlConfig {
        JsonlConfig {
            path,
            fallback_path: None,
            max_size_bytes: 1024 * 1024,
            max_rotated_files: 3,
        }
    }

    #[test]
    fn write_entry_produces_valid_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.jsonl");
        let mut writer = JsonlWriter::open(test_config(path.clone()));

        let entry = LogEntry::new(EventType::SessionStart, Severity::Info);
        writer.write_entry(&entry);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["event"], "session_start");
        assert_eq!(parsed["severity"], "info");
    }

    #[test]
    fn multiple_entries_are_separate_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.jsonl");
        let mut writer = JsonlWriter::open(test_config(path.clone()));

        for _ in 0..5 {
            writer.write_entry(&LogEntry::new(EventType::ContextSelected, Severity::Info));
        }

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 5);
        for line in lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }
    }

    #[test]
    fn rotation_shifts_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rot.jsonl");
        let config = JsonlConfig {
            max_size_bytes: 100, // tiny: force rotation after ~1 entry
            ..test_config(path.clone())
        };
        let mut writer = JsonlWriter::open(config);

        // Write enough entries to trigger multiple rotations.
        for _ in 0..10 {
            writer.write_entry(&LogEntry::new(EventType::ContextSelected, Severity::Info));
        }

        // Primary file should exist with recent data.
        assert!(path.exists());
        // At least one rotated file should exist.
        assert!(rotated_name(&path, 1).exists());
        // Counter resets on rotation, so it only covers the current file.
        assert!(writer.bytes_written() < 100);
    }

    #[test]
    fn fallback_when_primary_dir_unwritable() {
        let dir = tempfile::tempdir().unwrap();
        let bad_primary = PathBuf::from("/proc/pixelpress-no-such-dir/primary.jsonl");
        let fallback = dir.path().join("fallback.jsonl");
        let config = JsonlConfig {
            path: bad_primary,
            fallback_path: Some(fallback.clone()),
            ..JsonlConfig::default()
        };
        let mut writer = JsonlWriter::open(config);

        assert_eq!(writer.state(), "fallback");
        writer.write_entry(&LogEntry::new(EventType::Error, Severity::Warning));

        let contents = fs::read_to_string(&fallback).unwrap();
        assert!(!contents.is_empty());
    }

    #[test]
    fn state_reports_correctly() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonlWriter::open(test_config(dir.path().join("ok.jsonl")));
        assert_eq!(writer.state(), "normal");
    }

    #[test]
    fn entry_optional_fields_omitted_when_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sparse.jsonl");
        let mut writer = JsonlWriter::open(test_config(path.clone()));

        let entry = LogEntry::new(EventType::SessionStart, Severity::Info);
        writer.write_entry(&entry);

        let line = fs::read_to_string(&path).unwrap();
        // None-valued fields should NOT appear in the JSON.
        assert!(!line.contains("\"path\""));
        assert!(!line.contains("\"size\""));
        assert!(!line.contains("\"reason\""));
    }

    #[test]
    fn rejection_event_carries_reason_and_details() {
        let event = ActivityEvent::UploadRejected {
            path: Some("/tmp/big.png".to_string()),
            reason: RejectReason::FileTooLarge {
                size_bytes: 30 * 1024 * 1024,
                max_bytes: 20 * 1024 * 1024,
            },
        };
        let entry = event_to_entry(&event);
        assert_eq!(entry.event, EventType::UploadRejected);
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.reason.as_deref(), Some("file_too_large"));
        assert_eq!(entry.ok, Some(false));
        assert!(entry.details.is_some());
    }

    #[test]
    fn completion_event_carries_figures() {
        let event = ActivityEvent::OptimizeCompleted {
            path: "/tmp/photo.jpg".to_string(),
            context: ContextId::Instagram,
            original_size: 10_000_000,
            optimized_size: 3_500_000,
            ratio_percent: 65,
            used_today: 1,
        };
        let entry = event_to_entry(&event);
        assert_eq!(entry.event, EventType::OptimizeComplete);
        assert_eq!(entry.context.as_deref(), Some("instagram"));
        assert_eq!(entry.size, Some(10_000_000));
        assert_eq!(entry.optimized_size, Some(3_500_000));
        assert_eq!(entry.ratio_percent, Some(65));
        assert_eq!(entry.used_today, Some(1));
    }

    #[test]
    fn failed_download_is_a_warning() {
        let event = ActivityEvent::DownloadSaved {
            path: None,
            size: 2_048,
            ok: false,
            details: Some("disk full".to_string()),
        };
        let entry = event_to_entry(&event);
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.ok, Some(false));
    }
}
