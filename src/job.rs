//! One unit of transformation work and its lifecycle.
//!
//! A [`Job`] wraps a source image, the parameter snapshot taken at
//! submission, and the mutable status/progress/result the scheduler
//! maintains. Status moves `Queued → Processing → Completed | Failed`;
//! a failed job may be reset to `Queued` by an explicit retry. The
//! scheduler is the only writer of these fields — workers report back by
//! message and never touch a job directly.
//!
//! Invariants the scheduler upholds (and tests pin):
//! - `result` is `Some` if and only if the status is `Completed`.
//! - `error` is `Some` if and only if the status is `Failed`.
//! - At most one worker processes a given job at a time.

use std::time::Instant;

use serde::Serialize;

use crate::buffer::PixelBuffer;
use crate::filters::TransformationParams;

/// Opaque unique token identifying a job within one scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct JobId(pub(crate) u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Terminal states accept no further worker messages.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobErrorKind {
    /// The processor does not implement the requested transformation.
    UnsupportedKind,
    /// A runtime fault inside the algorithm, caught at the worker boundary.
    Algorithm,
    /// The worker's processor failed to start; reported by the worker
    /// itself when it can still send messages.
    WorkerUnavailable,
    /// No terminal message arrived within the scheduler's deadline —
    /// covers hung workers and workers that died silently.
    Timeout,
}

/// Error record attached to a failed job; `message` is what the kiosk UI
/// shows next to the retry button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobError {
    pub kind: JobErrorKind,
    pub message: String,
}

impl JobError {
    pub fn new(kind: JobErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// A tracked transformation request.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub image: PixelBuffer,
    /// Parameter snapshot taken at enqueue time; later settings changes
    /// never affect a submitted job.
    pub params: TransformationParams,
    pub status: JobStatus,
    /// Worker-reported progress, 0–100. Informational only.
    pub progress: u8,
    pub result: Option<PixelBuffer>,
    pub error: Option<JobError>,
    pub submitted_at: Instant,
    /// Set each time the job enters `Processing`; drives the deadline sweep.
    pub(crate) started_at: Option<Instant>,
}

impl Job {
    pub(crate) fn new(id: JobId, image: PixelBuffer, params: TransformationParams) -> Self {
        Self {
            id,
            image,
            params,
            status: JobStatus::Queued,
            progress: 0,
            result: None,
            error: None,
            submitted_at: Instant::now(),
            started_at: None,
        }
    }
}
