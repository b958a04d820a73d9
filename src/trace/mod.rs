//! Append-only JSONL audit trace.
//!
//! Every run writes structured events, one JSON object per line, to a sink
//! owned by that run. Past lines are never rewritten; event order is write
//! order. Timestamps are RFC 3339 UTC with a `Z` suffix.

use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Trace failures.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Sink I/O failure.
    #[error("trace i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Event (de)serialization failure.
    #[error("trace serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The sink mutex was poisoned by a panicking writer.
    #[error("trace sink lock poisoned")]
    LockPoisoned,
}

/// Lifecycle event discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An intent entered the kernel.
    IntentReceived,
    /// A plan passed contract validation.
    PlanGenerated,
    /// The policy engine produced an allow/deny decision.
    PolicyDecision,
    /// A step is about to invoke its tool.
    StepStarted,
    /// A step's tool returned successfully.
    StepFinished,
    /// A step was refused before its tool was invoked.
    StepDenied,
    /// A terminal failure (schema, tool, or internal).
    Error,
    /// The run completed.
    RunFinished,
}

/// A single trace line.
///
/// Field order is the serialization order; optional fields are omitted when
/// absent so replayed lines match what was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    /// RFC 3339 UTC timestamp, `Z` suffix.
    pub ts: String,
    /// The run this event belongs to.
    pub run_id: String,
    /// Event discriminator.
    pub event_type: EventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    /// Policy outcome payload (`{decision, reason_codes, summary?}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Optional per-event fields passed to [`TraceEmitter::emit`].
#[derive(Debug, Default, Clone)]
pub struct EventFields {
    pub intent_id: Option<String>,
    pub plan_id: Option<String>,
    pub step_id: Option<String>,
    pub policy: Option<Value>,
    pub message: Option<String>,
    pub data: Option<Value>,
}

/// Append-only JSONL sink.
///
/// One sink per run; concurrent runs must use distinct paths.
pub struct TraceSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for TraceSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceSink").finish()
    }
}

impl TraceSink {
    /// Open a sink that appends to `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        Ok(Self {
            writer: Mutex::new(Box::new(file)),
        })
    }

    /// Build a sink over an arbitrary writer (used by tests).
    pub fn from_writer(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Append one event as a single JSON line and flush.
    pub fn append(&self, event: &TraceEvent) -> Result<(), TraceError> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().map_err(|_| TraceError::LockPoisoned)?;
        writeln!(writer, "{line}")?;
        writer.flush()?;
        Ok(())
    }
}

/// Stamps every event with the run id and a UTC timestamp before appending.
#[derive(Debug)]
pub struct TraceEmitter {
    sink: TraceSink,
    run_id: String,
}

impl TraceEmitter {
    /// Bind an emitter to a sink for one run.
    pub fn new(sink: TraceSink, run_id: impl Into<String>) -> Self {
        Self {
            sink,
            run_id: run_id.into(),
        }
    }

    /// The run id stamped on every event.
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Emit one event.
    pub fn emit(&self, event_type: EventType, fields: EventFields) -> Result<(), TraceError> {
        let event = TraceEvent {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            run_id: self.run_id.clone(),
            event_type,
            intent_id: fields.intent_id,
            plan_id: fields.plan_id,
            step_id: fields.step_id,
            policy: fields.policy,
            message: fields.message,
            data: fields.data,
        };
        self.sink.append(&event)
    }
}

/// Read back a trace file in write order.
///
/// A missing file yields an empty vec; blank lines are skipped.
pub fn read_events(path: impl AsRef<Path>) -> Result<Vec<TraceEvent>, TraceError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = std::fs::read_to_string(path)?;
    let mut events = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        events.push(serde_json::from_str(line)?);
    }
    Ok(events)
}
