//! Structured event logging for audit runs.
//!
//! Writes append-only JSONL to `{out_dir}/{audit_id}/events.jsonl`.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ccm_core::AuditStage;
use serde::Serialize;

// ── Event types ──

/// An audit event. Serialized as tagged JSON (`"type": "audit_start"`, etc.).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    AuditStart {
        url: String,
        audit_id: String,
    },
    StageEntered {
        stage: AuditStage,
    },
    BannerDetected {
        provider: Option<String>,
    },
    ConsentAction {
        action: String,
        succeeded: bool,
        button_found: bool,
    },
    BranchSkipped {
        branch: String,
        reason: String,
    },
    SessionReset {
        ok: bool,
    },
    AuditFinalized {
        errors: usize,
        fatal: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct FullEvent {
    pub seq: u32,
    pub ts: String,
    #[serde(flatten)]
    pub event: Event,
}

// ── EventLogger ──

/// Append-only JSONL event writer.
pub struct EventLogger {
    jsonl_path: PathBuf,
    seq: u32,
}

pub fn events_path(out_dir: &Path, audit_id: &str) -> PathBuf {
    out_dir.join(audit_id).join("events.jsonl")
}

impl EventLogger {
    pub fn new(out_dir: &Path, audit_id: &str) -> Self {
        Self {
            jsonl_path: events_path(out_dir, audit_id),
            seq: 0,
        }
    }

    /// Record an event. Best-effort: write failures are only traced.
    pub fn record(&mut self, event: Event) {
        let full = FullEvent {
            seq: self.seq,
            ts: ccm_core::now_rfc3339(),
            event,
        };
        self.seq += 1;

        if let Ok(line) = serde_json::to_string(&full) {
            if let Err(e) = append_line(&self.jsonl_path, &line) {
                tracing::debug!(path = %self.jsonl_path.display(), error = %e, "event not written");
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
