use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::Phase;
use crate::config::data_dir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AttachmentDeleted,
    AttachmentNotFound,
    NameUpdated,
    AlreadyClean,
    RenameSkipped,
    CustomFieldUpdated,
    DescriptionCleared,
    CardFailed,
    FetchFailed,
    PhaseDisabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEvent {
    pub timestamp: String,
    pub phase: Phase,
    pub event: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn new_event(
    phase: Phase,
    event: EventKind,
    card_id: Option<&str>,
    card_name: Option<&str>,
    message: Option<&str>,
) -> SweepEvent {
    SweepEvent {
        timestamp: chrono::Utc::now().to_rfc3339(),
        phase,
        event,
        card_id: card_id.map(String::from),
        card_name: card_name.map(String::from),
        message: message.map(String::from),
    }
}

pub fn default_log_path() -> PathBuf {
    data_dir().join("activity.jsonl")
}

/// Append-only JSONL record of what a sweep did.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    path: Option<PathBuf>,
}

impl ActivityLog {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write failures are reported and swallowed; the sweep carries on.
    pub fn record(&self, event: &SweepEvent) {
        let Some(path) = &self.path else {
            return;
        };
        if let Err(e) = append_event(path, event) {
            warn!(error = %e, path = %path.display(), "Failed to write activity log");
        }
    }
}

pub fn append_event(path: &Path, event: &SweepEvent) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(event)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Most recent `limit` events, oldest first. Unreadable lines are skipped.
pub fn read_events(path: &Path, limit: Option<usize>) -> Vec<SweepEvent> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    let mut events: Vec<SweepEvent> = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect();

    if let Some(limit) = limit {
        let len = events.len();
        if len > limit {
            events = events.split_off(len - limit);
        }
    }

    events
}
