use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::{ports::RequestLog, Result};

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for logs/telemetry).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Request Logging ==============

const LOG_MAX_TEXT: usize = 500;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RequestLogEntry {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl RequestLogEntry {
    fn new(event: &str, outcome: &str, status: u16) -> Self {
        Self {
            timestamp: iso_timestamp_utc(),
            event: event.to_string(),
            outcome: Some(outcome.to_string()),
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn delivered(
        user_id: i64,
        caption: &str,
        payload_bytes: usize,
        mime_type: &str,
        message_id: Option<i64>,
        chat_id: Option<i64>,
    ) -> Self {
        Self {
            user_id: Some(user_id),
            caption: Some(caption.to_string()),
            payload_bytes: Some(payload_bytes),
            mime_type: Some(mime_type.to_string()),
            message_id,
            chat_id,
            ..Self::new("send_photo", "delivered", 200)
        }
    }

    /// Request refused before reaching the provider (bad input, wrong user, ...).
    pub fn rejected(user_id: Option<i64>, status: u16, error: &str) -> Self {
        Self {
            user_id,
            error: Some(error.to_string()),
            ..Self::new("send_photo", "rejected", status)
        }
    }

    /// Request accepted but the provider (or the server) failed it.
    pub fn failed(user_id: Option<i64>, status: u16, payload_bytes: Option<usize>, error: &str) -> Self {
        Self {
            user_id,
            payload_bytes,
            error: Some(error.to_string()),
            ..Self::new("send_photo", "failed", status)
        }
    }

    pub fn bot_info(status: u16, error: Option<&str>) -> Self {
        let outcome = if error.is_some() { "failed" } else { "ok" };
        Self {
            error: error.map(|s| s.to_string()),
            ..Self::new("bot_info", outcome, status)
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = Some(ms);
        self
    }

    fn truncated(mut self) -> Self {
        if let Some(s) = &self.caption {
            self.caption = Some(truncate_text(s, LOG_MAX_TEXT));
        }
        if let Some(s) = &self.error {
            self.error = Some(truncate_text(s, LOG_MAX_TEXT));
        }
        self
    }
}

/// Snapshot of a sink's write health.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LogHealth {
    pub healthy: bool,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// JSON-lines request log, one file per UTC calendar day.
#[derive(Debug)]
pub struct DailyFileLog {
    dir: PathBuf,
    prefix: String,
    failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl DailyFileLog {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            failures: AtomicU64::new(0),
            last_error: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}-{}.log", self.prefix, date.format("%Y-%m-%d")))
    }

    pub fn current_path(&self) -> PathBuf {
        self.path_for(Utc::now().date_naive())
    }

    /// Append one entry; unlike [`RequestLog::record`] this reports failures.
    pub fn write(&self, entry: &RequestLogEntry) -> Result<()> {
        let mut line = serde_json::to_string(&entry.clone().truncated())?;
        line.push('\n');

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_path())?;

        // Single write so concurrent appenders never interleave within a line.
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl RequestLog for DailyFileLog {
    fn record(&self, entry: RequestLogEntry) {
        if let Err(e) = self.write(&entry) {
            tracing::warn!(error = %e, dir = %self.dir.display(), "request log write failed");
            self.failures.fetch_add(1, Ordering::Relaxed);
            if let Ok(mut last) = self.last_error.lock() {
                *last = Some(e.to_string());
            }
        }
    }

    fn health(&self) -> LogHealth {
        let failures = self.failures.load(Ordering::Relaxed);
        LogHealth {
            healthy: failures == 0,
            failures,
            last_error: self.last_error.lock().ok().and_then(|e| e.clone()),
        }
    }
}

/// In-memory sink. Used by tests and when file logging is disabled.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<RequestLogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<RequestLogEntry> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }
}

impl RequestLog for MemoryLog {
    fn record(&self, entry: RequestLogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.truncated());
        }
    }

    fn health(&self) -> LogHealth {
        LogHealth {
            healthy: true,
            failures: 0,
            last_error: None,
        }
    }
}

/// Cut `s` to at most `max_chars` characters, marking the cut with `...`.
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}...", &s[..cut]),
    }
}
