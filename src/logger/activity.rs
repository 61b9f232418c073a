//! Activity logger: a dedicated thread owns the [`JsonlWriter`]; sweep code
//! sends [`ActivityEvent`]s through a bounded crossbeam channel.
//!
//! `send()` uses `try_send()`, so scan workers are never blocked by logging
//! back-pressure. Dropped events are counted and reported in-band.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::core::errors::{AcsError, Result};
use crate::logger::jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

// ──────────────────── channel capacity ────────────────────

const CHANNEL_CAPACITY: usize = 1024;

// ──────────────────── public event type ────────────────────

/// Events emitted during a sweep.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityEvent {
    RunStarted {
        subscription_id: String,
        auto_delete: bool,
        config_hash: String,
    },
    PassCompleted {
        pass: &'static str,
        findings: usize,
        errors: usize,
        duration_ms: u64,
    },
    ResourceError {
        resource_group: String,
        name: String,
        resource_type: String,
        error_code: String,
        error_message: String,
    },
    DiskDeleteRequested {
        resource_group: String,
        name: String,
        size_gb: Option<u32>,
    },
    DiskDeleteAccepted {
        resource_group: String,
        name: String,
        completed: bool,
        duration_ms: u64,
    },
    DiskDeleteFailed {
        resource_group: String,
        name: String,
        error_code: String,
        error_message: String,
    },
    DiskSkipped {
        resource_group: String,
        name: String,
        reason: String,
    },
    CostQueryDegraded {
        details: String,
    },
    ReportWritten {
        path: String,
        findings: usize,
        cost_rows: usize,
    },
    RunCompleted {
        findings: usize,
        deletes_requested: usize,
        duration_ms: u64,
    },
    /// Sentinel asking the logger thread to flush and exit.
    Shutdown,
}

// ──────────────────── public handle ────────────────────

/// Cheaply-cloneable handle for sending log events from any thread.
#[derive(Clone)]
pub struct ActivityLoggerHandle {
    tx: Sender<ActivityEvent>,
    dropped_events: Arc<AtomicU64>,
}

impl ActivityLoggerHandle {
    /// Non-blocking send. A full channel drops the event and bumps the counter.
    pub fn send(&self, event: ActivityEvent) {
        if let Err(TrySendError::Full(_)) = self.tx.try_send(event) {
            self.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    /// Ask the logger thread to flush and stop. Blocks until queued.
    pub fn shutdown(&self) {
        let _ = self.tx.send(ActivityEvent::Shutdown);
    }

    /// A handle plus the receiving end, for tests that inspect emitted events.
    #[cfg(test)]
    pub(crate) fn capture(capacity: usize) -> (Self, Receiver<ActivityEvent>) {
        let (tx, rx) = bounded(capacity);
        (
            Self {
                tx,
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }
}

// ──────────────────── configuration ────────────────────

pub struct ActivityLoggerConfig {
    pub jsonl_config: JsonlConfig,
    pub channel_capacity: usize,
}

impl ActivityLoggerConfig {
    pub fn new(jsonl_config: JsonlConfig) -> Self {
        Self {
            jsonl_config,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }
}

// ──────────────────── spawn ────────────────────

/// Spawn the logger thread.
///
/// It runs until `handle.shutdown()` is called or every handle is dropped.
pub fn spawn_logger(
    config: ActivityLoggerConfig,
) -> Result<(ActivityLoggerHandle, thread::JoinHandle<()>)> {
    let (tx, rx) = bounded::<ActivityEvent>(config.channel_capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    let dropped_clone = Arc::clone(&dropped);

    let handle = ActivityLoggerHandle {
        tx,
        dropped_events: dropped,
    };

    let join = thread::Builder::new()
        .name("acs-logger".to_string())
        .spawn(move || logger_thread_main(rx, config.jsonl_config, dropped_clone))
        .map_err(|e| AcsError::Runtime {
            details: format!("failed to spawn logger thread: {e}"),
        })?;

    Ok((handle, join))
}

// ──────────────────── logger thread ────────────────────

#[allow(clippy::needless_pass_by_value)]
fn logger_thread_main(rx: Receiver<ActivityEvent>, jsonl_config: JsonlConfig, dropped: Arc<AtomicU64>) {
    let mut jsonl = JsonlWriter::open(jsonl_config);

    while let Ok(event) = rx.recv() {
        let d = dropped.swap(0, Ordering::Relaxed);
        if d > 0 {
            let mut warn = LogEntry::new(EventType::LogDropped, Severity::Warning);
            warn.count = Some(d);
            warn.details = Some(format!("{d} log events dropped due to back-pressure"));
            jsonl.write_entry(&warn);
        }

        if matches!(event, ActivityEvent::Shutdown) {
            break;
        }
        jsonl.write_entry(&event_to_log_entry(&event));
    }

    jsonl.flush();
}

// ──────────────────── event conversion ────────────────────

#[allow(clippy::too_many_lines)]
pub(crate) fn event_to_log_entry(event: &ActivityEvent) -> LogEntry {
    match event {
        ActivityEvent::RunStarted {
            subscription_id,
            auto_delete,
            config_hash,
        } => {
            let mut e = LogEntry::new(EventType::RunStart, Severity::Info);
            e.details = Some(format!(
                "subscription={subscription_id} auto_delete={auto_delete} config_hash={config_hash}"
            ));
            e
        }
        ActivityEvent::PassCompleted {
            pass,
            findings,
            errors,
            duration_ms,
        } => {
            let severity = if *errors > 0 {
                Severity::Warning
            } else {
                Severity::Info
            };
            let mut e = LogEntry::new(EventType::PassComplete, severity);
            e.count = Some(*findings as u64);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(*errors == 0);
            e.details = Some(format!("pass={pass} errors={errors}"));
            e
        }
        ActivityEvent::ResourceError {
            resource_group,
            name,
            resource_type,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::ResourceError, Severity::Warning);
            e.resource_group = Some(resource_group.clone());
            e.resource = Some(name.clone());
            e.resource_type = Some(resource_type.clone());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::DiskDeleteRequested {
            resource_group,
            name,
            size_gb,
        } => {
            let mut e = LogEntry::new(EventType::DiskDeleteRequest, Severity::Critical);
            e.resource_group = Some(resource_group.clone());
            e.resource = Some(name.clone());
            e.resource_type = Some("Disk".to_string());
            e.size_gb = *size_gb;
            e
        }
        ActivityEvent::DiskDeleteAccepted {
            resource_group,
            name,
            completed,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::DiskDeleteAccepted, Severity::Info);
            e.resource_group = Some(resource_group.clone());
            e.resource = Some(name.clone());
            e.resource_type = Some("Disk".to_string());
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e.details = Some(if *completed { "completed" } else { "pending" }.to_string());
            e
        }
        ActivityEvent::DiskDeleteFailed {
            resource_group,
            name,
            error_code,
            error_message,
        } => {
            let mut e = LogEntry::new(EventType::DiskDeleteFailed, Severity::Warning);
            e.resource_group = Some(resource_group.clone());
            e.resource = Some(name.clone());
            e.resource_type = Some("Disk".to_string());
            e.ok = Some(false);
            e.error_code = Some(error_code.clone());
            e.error_message = Some(error_message.clone());
            e
        }
        ActivityEvent::DiskSkipped {
            resource_group,
            name,
            reason,
        } => {
            let mut e = LogEntry::new(EventType::DiskSkip, Severity::Info);
            e.resource_group = Some(resource_group.clone());
            e.resource = Some(name.clone());
            e.resource_type = Some("Disk".to_string());
            e.details = Some(reason.clone());
            e
        }
        ActivityEvent::CostQueryDegraded { details } => {
            let mut e = LogEntry::new(EventType::CostDegraded, Severity::Warning);
            e.ok = Some(false);
            e.details = Some(details.clone());
            e
        }
        ActivityEvent::ReportWritten {
            path,
            findings,
            cost_rows,
        } => {
            let mut e = LogEntry::new(EventType::ReportWrite, Severity::Info);
            e.path = Some(path.clone());
            e.count = Some(*findings as u64);
            e.ok = Some(true);
            e.details = Some(format!("cost_rows={cost_rows}"));
            e
        }
        ActivityEvent::RunCompleted {
            findings,
            deletes_requested,
            duration_ms,
        } => {
            let mut e = LogEntry::new(EventType::RunComplete, Severity::Info);
            e.count = Some(*findings as u64);
            e.duration_ms = Some(*duration_ms);
            e.ok = Some(true);
            e.details = Some(format!("deletes_requested={deletes_requested}"));
            e
        }
        ActivityEvent::Shutdown => {
            let mut e = LogEntry::new(EventType::RunComplete, Severity::Info);
            e.details = Some("shutdown".to_string());
            e
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn events_reach_the_file_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let (handle, join) =
            spawn_logger(ActivityLoggerConfig::new(JsonlConfig::new(&path))).unwrap();

        handle.send(ActivityEvent::RunStarted {
            subscription_id: "sub-1".to_string(),
            auto_delete: false,
            config_hash: "abc".to_string(),
        });
        handle.send(ActivityEvent::DiskSkipped {
            resource_group: "rg1".to_string(),
            name: "data-disk-2".to_string(),
            reason: "protected".to_string(),
        });
        handle.shutdown();
        join.join().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let events: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["event"], "run_start");
        assert_eq!(events[1]["event"], "disk_skip");
        assert_eq!(events[1]["resource"], "data-disk-2");
    }

    #[test]
    fn full_channel_counts_drops() {
        let (handle, _rx) = ActivityLoggerHandle::capture(1);
        for _ in 0..3 {
            handle.send(ActivityEvent::CostQueryDegraded {
                details: "unsupported".to_string(),
            });
        }
        assert_eq!(handle.dropped_events(), 2);
    }

    #[test]
    fn drop_count_is_recorded_before_the_next_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("activity.jsonl");
        let (tx, rx) = bounded(4);
        let dropped = Arc::new(AtomicU64::new(3));
        tx.send(ActivityEvent::CostQueryDegraded {
            details: "unsupported".to_string(),
        })
        .unwrap();
        tx.send(ActivityEvent::Shutdown).unwrap();

        logger_thread_main(rx, JsonlConfig::new(&path), Arc::clone(&dropped));

        let events: Vec<serde_json::Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(events[0]["event"], "log_dropped");
        assert_eq!(events[0]["count"], 3);
        assert_eq!(events[1]["event"], "cost_degraded");
        assert_eq!(dropped.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn delete_failure_maps_error_fields() {
        let entry = event_to_log_entry(&ActivityEvent::DiskDeleteFailed {
            resource_group: "rg1".to_string(),
            name: "d".to_string(),
            error_code: "ACS-2002".to_string(),
            error_message: "conflict".to_string(),
        });
        assert_eq!(entry.event, EventType::DiskDeleteFailed);
        assert_eq!(entry.ok, Some(false));
        assert_eq!(entry.error_code.as_deref(), Some("ACS-2002"));
    }

    #[test]
    fn pass_with_errors_is_a_warning() {
        let entry = event_to_log_entry(&ActivityEvent::PassCompleted {
            pass: "vm",
            findings: 3,
            errors: 1,
            duration_ms: 12,
        });
        assert_eq!(entry.severity, Severity::Warning);
        assert_eq!(entry.count, Some(3));
    }
}
