// crates/transfer-mesh-agent/src/metrics.rs
// ============================================================================
// Module: Dispatcher Metrics Sinks
// Description: File and log destinations for dispatcher snapshots.
// Purpose: Persist periodic load reports without blocking the dispatcher.
// Dependencies: transfer-mesh-core, serde_json, tracing
// ============================================================================

//! ## Overview
//! [`FileMetricsSink`] appends one JSON object per snapshot to a file;
//! [`LogMetricsSink`] emits each snapshot as a structured `tracing` event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::info;
use transfer_mesh_core::DispatcherSnapshot;
use transfer_mesh_core::MetricsError;
use transfer_mesh_core::MetricsSink;

// ============================================================================
// SECTION: File Sink
// ============================================================================

/// Metrics sink that appends JSON lines to a file.
#[derive(Debug)]
pub struct FileMetricsSink {
    /// Destination path, kept for diagnostics.
    path: PathBuf,
    /// File handle used for append-only writes.
    file: Mutex<File>,
}

impl FileMetricsSink {
    /// Opens the metrics file in append mode, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Returns the metrics file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for FileMetricsSink {
    fn record(&self, snapshot: &DispatcherSnapshot) -> Result<(), MetricsError> {
        let payload =
            serde_json::to_string(snapshot).map_err(|err| MetricsError::Sink(err.to_string()))?;
        let mut file = self
            .file
            .lock()
            .map_err(|_| MetricsError::Sink("metrics file lock poisoned".to_string()))?;
        writeln!(file, "{payload}").map_err(|err| MetricsError::Sink(err.to_string()))?;
        file.flush().map_err(|err| MetricsError::Sink(err.to_string()))
    }
}

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Metrics sink that logs snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetricsSink;

impl MetricsSink for LogMetricsSink {
    fn record(&self, snapshot: &DispatcherSnapshot) -> Result<(), MetricsError> {
        info!(
            target: "transfer_mesh::metrics",
            queue_depth = snapshot.queue_depth,
            queue_capacity = snapshot.queue_capacity,
            workers = snapshot.workers,
            active_workers = snapshot.active_workers,
            submitted = snapshot.submitted,
            rejected = snapshot.rejected,
            completed = snapshot.completed,
            failed = snapshot.failed,
            "dispatcher snapshot"
        );
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use transfer_mesh_core::DispatcherSnapshot;
    use transfer_mesh_core::MetricsSink;

    use super::FileMetricsSink;

    fn snapshot(completed: u64) -> DispatcherSnapshot {
        DispatcherSnapshot {
            timestamp_ms: 1,
            queue_depth: 0,
            queue_capacity: 8,
            workers: 2,
            active_workers: 0,
            submitted: completed,
            rejected: 0,
            completed,
            failed: 0,
        }
    }

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.jsonl");
        let sink = FileMetricsSink::open(&path).unwrap();
        sink.record(&snapshot(1)).unwrap();
        sink.record(&snapshot(2)).unwrap();
        let text = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<DispatcherSnapshot> =
            text.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines, vec![snapshot(1), snapshot(2)]);
    }
}
