use crate::app_dirs::AppDirs;
use crate::controller::{SessionSummary, StopReason};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// One finished session as stored in the history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub date: String,
    pub mode: String,
    pub cadence_secs: u32,
    pub time_limit_secs: u32,
    pub score: u64,
    pub reason: String,
}

impl HistoryRecord {
    pub fn from_summary(summary: &SessionSummary) -> Self {
        Self {
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            mode: summary.mode.clone(),
            cadence_secs: summary.cadence_secs,
            time_limit_secs: summary.time_limit_secs,
            score: summary.score,
            reason: summary.reason.to_string(),
        }
    }
}

/// Append-only CSV log of finished sessions
#[derive(Debug, Clone)]
pub struct SessionHistory {
    path: PathBuf,
}

impl SessionHistory {
    pub fn new() -> Option<Self> {
        AppDirs::history_path().map(Self::with_path)
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    /// Sessions that were reset or showed nothing are not worth keeping
    pub fn should_record(summary: &SessionSummary) -> bool {
        summary.score > 0 && summary.reason != StopReason::Reset
    }

    pub fn record(&self, summary: &SessionSummary) -> io::Result<bool> {
        if !Self::should_record(summary) {
            return Ok(false);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        // If the file doesn't exist yet, we need to emit a header
        let needs_header = !self.path.exists();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(HistoryRecord::from_summary(summary))
            .map_err(io::Error::other)?;
        writer.flush()?;
        Ok(true)
    }

    pub fn load(&self) -> io::Result<Vec<HistoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::Reader::from_path(&self.path).map_err(io::Error::other)?;
        reader
            .deserialize()
            .collect::<Result<Vec<HistoryRecord>, _>>()
            .map_err(io::Error::other)
    }

    /// Best score recorded for a mode
    pub fn best_score(&self, mode: &str) -> io::Result<Option<u64>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|r| r.mode == mode)
            .map(|r| r.score)
            .max())
    }
}
