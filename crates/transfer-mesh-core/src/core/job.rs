// crates/transfer-mesh-core/src/core/job.rs
// ============================================================================
// Module: Transfer Mesh Job Model
// Description: Job identifiers, lifecycle states, and dispatcher snapshots.
// Purpose: Shared records reported by the dispatcher and the HTTP surface.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A job wraps one [`TransferRequest`] admitted to the dispatcher. It moves
//! `Queued -> Running -> {Succeeded, Failed}` exactly once; there are no
//! dispatcher-level retries. Terminal records stay queryable until evicted
//! from the bounded job history.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Deserialize;
use serde::Serialize;

use crate::core::catalog::TransferRequest;

// ============================================================================
// SECTION: Job Identity
// ============================================================================

/// Monotonic job identifier assigned at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SECTION: Job State
// ============================================================================

/// Lifecycle state of a dispatcher job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Admitted and waiting for a worker.
    Queued,
    /// Picked up by a worker.
    Running,
    /// Finished successfully.
    Succeeded,
    /// Finished with a permanent failure or exhausted retries.
    Failed,
}

impl JobState {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Returns the wire label of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

// ============================================================================
// SECTION: Job Record
// ============================================================================

/// Queryable record of a job and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Job identifier.
    pub id: JobId,
    /// Request the job executes.
    pub request: TransferRequest,
    /// Current lifecycle state.
    pub state: JobState,
    /// Executor attempts consumed by the last file processed.
    pub attempts: u32,
    /// Files transferred.
    pub files: u64,
    /// Files skipped because the destination already held them.
    pub skipped: u64,
    /// Bytes transferred.
    pub bytes: u64,
    /// Failure description for failed jobs.
    pub error: Option<String>,
    /// Admission time in unix milliseconds.
    pub submitted_at_ms: u64,
    /// Time a worker picked the job up.
    pub started_at_ms: Option<u64>,
    /// Completion time.
    pub finished_at_ms: Option<u64>,
}

impl JobRecord {
    /// Creates a queued record stamped with the current time.
    #[must_use]
    pub fn queued(id: JobId, request: TransferRequest) -> Self {
        Self {
            id,
            request,
            state: JobState::Queued,
            attempts: 0,
            files: 0,
            skipped: 0,
            bytes: 0,
            error: None,
            submitted_at_ms: unix_millis(),
            started_at_ms: None,
            finished_at_ms: None,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher Snapshot
// ============================================================================

/// Point-in-time dispatcher load report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherSnapshot {
    /// Snapshot time in unix milliseconds.
    pub timestamp_ms: u64,
    /// Jobs waiting in the queue.
    pub queue_depth: usize,
    /// Queue capacity `Q`.
    pub queue_capacity: usize,
    /// Configured worker count `W`.
    pub workers: usize,
    /// Workers currently executing a job.
    pub active_workers: usize,
    /// Jobs admitted since start.
    pub submitted: u64,
    /// Jobs rejected as busy since start.
    pub rejected: u64,
    /// Jobs that finished `Succeeded`.
    pub completed: u64,
    /// Jobs that finished `Failed`.
    pub failed: u64,
}

// ============================================================================
// SECTION: Time
// ============================================================================

/// Returns the current wall-clock time in unix milliseconds.
#[must_use]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}
