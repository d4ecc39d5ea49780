//! Domain events for external observers and indexers.
//!
//! Sinks are best-effort observers: a sink failure never rolls back the
//! domain mutation that produced the event, so `emit` is infallible at the
//! trait boundary and file-backed sinks log their own I/O errors.

use crate::{now_ms, OperatorId, PlantId, RequestId, RequestKind};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DomainEvent {
    PlantDataSubmitted {
        plant_id: PlantId,
        operator: OperatorId,
        submitted_at_ms: i64,
    },
    OptimizationCalculated {
        plant_id: PlantId,
    },
    DecryptionRequested {
        request_id: RequestId,
        plant_id: PlantId,
        kind: RequestKind,
    },
    PlantDataDecrypted {
        plant_id: PlantId,
    },
}

/// Observer of domain events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &DomainEvent);
}

/// Sink that drops every event.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &DomainEvent) {}
}

/// In-memory event log for tests and embedded observers.
pub struct InMemoryEventLog {
    events: RwLock<Vec<DomainEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    /// Copy of the events emitted so far, in order.
    pub fn snapshot(&self) -> Vec<DomainEvent> {
        match self.events.read() {
            Ok(events) => events.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self.events.read() {
            Ok(events) => events.len(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for InMemoryEventLog {
    fn emit(&self, event: &DomainEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(*event);
        }
    }
}

/// One line of the on-disk event log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EventRecordV1 {
    pub record_version: u32,
    pub emitted_at_ms: i64,
    pub event: DomainEvent,
}

/// Append-only JSONL event recorder.
///
/// Each line is one JSON-encoded `EventRecordV1`, fsynced on append.
pub struct FileEventRecorder {
    path: PathBuf,
    /// Best-effort per-process serialization of writes.
    lock: Mutex<()>,
}

impl FileEventRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, event: &DomainEvent) -> std::io::Result<()> {
        let _guard = self.lock.lock().map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::Other, "event recorder lock poisoned")
        })?;

        let record = EventRecordV1 {
            record_version: 1,
            emitted_at_ms: now_ms().unwrap_or(0),
            event: *event,
        };
        let line = serde_json::to_vec(&record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        file.write_all(b"\n")?;
        file.sync_all()
    }
}

impl EventSink for FileEventRecorder {
    fn emit(&self, event: &DomainEvent) {
        if let Err(e) = self.append(event) {
            warn!(error = %e, "failed to append event record");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
