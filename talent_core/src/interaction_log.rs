//! Interaction log - append-only record of (query, response) pairs
//!
//! Records are kept in memory and, when a path is configured, appended to a
//! human-readable text file:
//!
//! ```text
//! [2024-05-01 09:30:00]
//! Q: who is on bench
//! A: 3 rows match on bench
//!
//! ```

use crate::error::Result;
use crate::types::InteractionRecord;
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct InteractionLog {
    path: Option<PathBuf>,
    records: Mutex<Vec<InteractionRecord>>,
}

impl InteractionLog {
    /// Log backed by an append-only file
    pub fn with_file(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Log kept only in memory
    pub fn in_memory() -> Self {
        Self {
            path: None,
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record.
    ///
    /// The lock is held across the file write so concurrent appends never
    /// interleave. A failed file write is logged and the in-memory record is
    /// still kept.
    pub fn append(&self, query: &str, response: &str) -> InteractionRecord {
        let record = InteractionRecord {
            timestamp: Local::now(),
            query_text: query.to_string(),
            response_text: response.to_string(),
        };

        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(path) = &self.path {
            if let Err(e) = write_record(path, &record) {
                warn!("failed to append to {}: {}", path.display(), e);
            }
        }
        records.push(record.clone());
        record
    }

    /// Snapshot of every record appended in this process
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole log as text: the file if there is one, else the in-memory records.
    pub fn read_all(&self) -> Result<String> {
        match &self.path {
            Some(path) if path.exists() => Ok(std::fs::read_to_string(path)?),
            Some(_) => Ok(String::new()),
            None => Ok(self.records().iter().map(format_record).collect()),
        }
    }
}

pub fn format_record(record: &InteractionRecord) -> String {
    format!(
        "[{}]\nQ: {}\nA: {}\n\n",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.query_text,
        record.response_text
    )
}

fn write_record(path: &Path, record: &InteractionRecord) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    // One write call per record
    file.write_all(format_record(record).as_bytes())
}
