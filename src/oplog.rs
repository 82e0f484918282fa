//! Record of what was done to which file
//!
//! The log is an ordinary value owned by the caller. It can be appended
//! to a JSON-lines file and read back for display. Keys are never
//! recorded.

use crate::batch::{BatchReport, UnitOutcome};
use crate::error::{ErrorCategory, ErrorKind, Result, VaultburnError, io_error};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Shred,
    Encrypt,
    Decrypt,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Shred => "shred",
            OperationKind::Encrypt => "encrypt",
            OperationKind::Decrypt => "decrypt",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryOutcome {
    Ok,
    Failed { error: String, message: String },
    Cancelled,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: OperationKind,
    pub path: PathBuf,
    pub outcome: EntryOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl LogEntry {
    pub fn new(operation: OperationKind, path: impl Into<PathBuf>, outcome: EntryOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            path: path.into(),
            outcome,
            detail: None,
        }
    }

    pub fn ok(operation: OperationKind, path: impl Into<PathBuf>) -> Self {
        Self::new(operation, path, EntryOutcome::Ok)
    }

    pub fn failed(
        operation: OperationKind,
        path: impl Into<PathBuf>,
        err: &VaultburnError,
    ) -> Self {
        Self::new(
            operation,
            path,
            EntryOutcome::Failed {
                error: err.kind.map_or("error", ErrorKind::as_str).to_string(),
                message: err.display_chain(),
            },
        )
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// One line in the style `2026-01-02 03:04:05 - INFO - shred a.txt: ok (3 passes)`.
    pub fn render(&self) -> String {
        let timestamp = self
            .timestamp
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S");
        let (level, status) = match &self.outcome {
            EntryOutcome::Ok => ("INFO", "ok".to_string()),
            EntryOutcome::Failed { message, .. } => ("ERROR", format!("failed: {}", message)),
            EntryOutcome::Cancelled => ("WARNING", "cancelled".to_string()),
            EntryOutcome::Skipped { reason } => ("WARNING", format!("skipped: {}", reason)),
        };
        let detail = self
            .detail
            .as_ref()
            .map(|d| format!(" ({})", d))
            .unwrap_or_default();
        format!(
            "{} - {} - {} {}: {}{}",
            timestamp,
            level,
            self.operation.as_str(),
            self.path.display(),
            status,
            detail
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct OperationLog {
    entries: Vec<LogEntry>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records one entry per file of `report`. `detail` describes a
    /// successful output.
    pub fn extend_from_report<T>(
        &mut self,
        operation: OperationKind,
        report: &BatchReport<T>,
        detail: impl Fn(&T) -> Option<String>,
    ) {
        for result in &report.results {
            let entry = match &result.outcome {
                UnitOutcome::Done(output) => {
                    let entry = LogEntry::ok(operation, &result.path);
                    match detail(output) {
                        Some(d) => entry.with_detail(d),
                        None => entry,
                    }
                }
                UnitOutcome::Failed(e) => LogEntry::failed(operation, &result.path, e),
                UnitOutcome::Cancelled => {
                    LogEntry::new(operation, &result.path, EntryOutcome::Cancelled)
                }
            };
            self.record(entry);
        }
    }

    /// Appends all entries to `path` as JSON lines, creating the file and
    /// its directory when needed.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, "create", e))?;
        }

        let mut options = OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(|e| io_error(path, "open", e))?;

        let mut buf = String::new();
        for entry in &self.entries {
            let line = serde_json::to_string(entry).map_err(|e| {
                VaultburnError::with_source(
                    ErrorCategory::Internal,
                    "failed to serialize log entry",
                    e,
                )
            })?;
            buf.push_str(&line);
            buf.push('\n');
        }
        file.write_all(buf.as_bytes())
            .map_err(|e| io_error(path, "write to", e))?;
        Ok(())
    }

    /// Reads entries previously written by [`OperationLog::append_to`].
    ///
    /// A missing file is an empty log. Lines that do not parse are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == IoErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(io_error(path, "open", e)),
        };

        let mut log = Self::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_error(path, "read from", e))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) => log.record(entry),
                Err(e) => warn!(
                    "{}:{}: skipping unreadable log line: {}",
                    path.display(),
                    number + 1,
                    e
                ),
            }
        }
        Ok(log)
    }
}
