//! Job queue and scheduler: bounded-concurrency admission over the
//! worker boundary.
//!
//! The [`Scheduler`] owns the job table, the pending FIFO, and the
//! concurrency budget; nothing else writes them (single-writer
//! discipline). Workers influence state only through the
//! [`WorkerMessage`]s the scheduler drains. Queue bookkeeping is cheap —
//! the scheduler never touches pixels.
//!
//! Scheduling policy:
//! - FIFO over queued jobs; every admission opportunity (an enqueue, a
//!   retry, a freed slot) fills all currently free slots in submission
//!   order.
//! - `count(Processing) <= concurrency_limit` at all times.
//! - A job whose kind the executor does not support fails immediately at
//!   dispatch with `UnsupportedKind` — no slot is consumed and scanning
//!   continues with the next queued job.
//! - A retried job is a re-enqueue: it joins at the current tail rather
//!   than resuming its original position.
//! - Jobs stuck in `Processing` past the configured deadline are failed
//!   with `Timeout` by the sweep in [`Scheduler::pump`]; this is the only
//!   defense against a worker that hangs or dies without a message.
//!
//! Terminal messages are applied only to jobs currently `Processing`.
//! Late or duplicate messages — for unknown ids, already-terminal jobs,
//! or jobs re-queued after a timeout — are discarded, which makes
//! delivery idempotent.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::buffer::{BufferError, PixelBuffer};
use crate::filters::TransformationParams;
use crate::job::{Job, JobError, JobErrorKind, JobId, JobStatus};
use crate::worker::{JobExecutor, WorkerMessage, WorkerRequest};

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("rejected image: {0}")]
    InvalidBuffer(#[from] BufferError),
}

/// Scheduler tuning.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Maximum number of jobs in `Processing` at once.
    pub concurrency_limit: usize,
    /// How long a dispatched job may run without a terminal message
    /// before the scheduler fails it as timed out.
    pub deadline: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 2,
            deadline: Duration::from_secs(30),
        }
    }
}

/// Bounded-concurrency job scheduler over a [`JobExecutor`].
pub struct Scheduler<E: JobExecutor> {
    executor: E,
    results: Receiver<WorkerMessage>,
    config: SchedulerConfig,
    /// Job table, keyed by id. Ids are monotonic, so iteration order is
    /// submission order.
    jobs: BTreeMap<JobId, Job>,
    pending: VecDeque<JobId>,
    next_id: u64,
}

impl<E: JobExecutor> Scheduler<E> {
    pub fn new(executor: E, results: Receiver<WorkerMessage>, config: SchedulerConfig) -> Self {
        Self {
            executor,
            results,
            config,
            jobs: BTreeMap::new(),
            pending: VecDeque::new(),
            next_id: 0,
        }
    }

    /// Submit a validated buffer. Always succeeds: the job is created in
    /// `Queued` and a dispatch pass runs before returning. Non-blocking.
    pub fn enqueue(&mut self, image: PixelBuffer, params: TransformationParams) -> JobId {
        self.next_id += 1;
        let id = JobId(self.next_id);
        self.jobs.insert(id, Job::new(id, image, params));
        self.pending.push_back(id);
        self.dispatch();
        id
    }

    /// Submit raw RGBA bytes, validating them first. Malformed input
    /// (zero dimension, mismatched length) is rejected outright — no
    /// doomed job is created.
    pub fn enqueue_rgba(
        &mut self,
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        params: TransformationParams,
    ) -> Result<JobId, QueueError> {
        let image = PixelBuffer::from_rgba(width, height, pixels)?;
        Ok(self.enqueue(image, params))
    }

    /// Reset a failed job to `Queued` at the current tail and run a
    /// dispatch pass. A no-op for unknown jobs or any non-`Failed`
    /// status. Non-blocking.
    pub fn retry(&mut self, id: JobId) {
        let Some(job) = self.jobs.get_mut(&id) else {
            return;
        };
        if job.status != JobStatus::Failed {
            return;
        }
        job.status = JobStatus::Queued;
        job.error = None;
        job.progress = 0;
        job.started_at = None;
        self.pending.push_back(id);
        self.dispatch();
    }

    /// Drain worker messages, expire deadlines, and fill free slots.
    /// Call whenever the owning thread wants the queue to make progress.
    pub fn pump(&mut self) {
        while let Ok(message) = self.results.try_recv() {
            self.apply(message);
        }
        self.expire_deadlines();
        self.dispatch();
    }

    /// Drive the queue until no job is `Queued` or `Processing`, waiting
    /// up to `poll` between bookkeeping passes. `on_terminal` fires once
    /// per job as it reaches `Completed` or `Failed` — the observation
    /// hook the kiosk UI hangs its status display on.
    pub fn run_to_completion<F>(&mut self, poll: Duration, mut on_terminal: F)
    where
        F: FnMut(&Job),
    {
        while self.has_active() {
            match self.results.recv_timeout(poll) {
                Ok(message) => {
                    if let Some(id) = self.apply(message) {
                        on_terminal(&self.jobs[&id]);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Workers are gone; only the deadline sweep can
                    // terminate the remaining jobs.
                    std::thread::sleep(poll);
                }
            }
            for id in self.expire_deadlines() {
                on_terminal(&self.jobs[&id]);
            }
            self.dispatch();
        }
    }

    /// Number of jobs currently executing.
    pub fn processing_count(&self) -> usize {
        self.count(JobStatus::Processing)
    }

    pub fn count(&self, status: JobStatus) -> usize {
        self.jobs.values().filter(|j| j.status == status).count()
    }

    /// Whether any job still needs scheduler attention.
    pub fn has_active(&self) -> bool {
        self.jobs.values().any(|j| !j.status.is_terminal())
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    /// All jobs in submission order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Fill every free execution slot from the front of the FIFO.
    fn dispatch(&mut self) {
        while self.processing_count() < self.config.concurrency_limit {
            let Some(id) = self.pending.pop_front() else {
                break;
            };
            let Some(kind) = self.jobs.get(&id).map(|j| j.params.kind()) else {
                continue;
            };

            if !self.executor.supports(kind) {
                // Fails without ever occupying a slot; keep scanning.
                if let Some(job) = self.jobs.get_mut(&id) {
                    Self::fail(
                        job,
                        JobError::new(
                            JobErrorKind::UnsupportedKind,
                            format!("no processor available for {kind} transformations"),
                        ),
                    );
                }
                continue;
            }

            let Some(job) = self.jobs.get_mut(&id) else {
                continue;
            };
            debug_assert_eq!(job.status, JobStatus::Queued);
            job.status = JobStatus::Processing;
            job.started_at = Some(Instant::now());
            // The worker gets its own copy; the table keeps the source
            // image so a failed job can be retried.
            let request = WorkerRequest {
                job_id: id,
                image: job.image.clone(),
                params: job.params,
            };
            self.executor.submit(request);
        }
    }

    /// Apply one worker message. Returns the job id if this message was
    /// a terminal transition.
    fn apply(&mut self, message: WorkerMessage) -> Option<JobId> {
        let id = message.job_id();
        let Some(job) = self.jobs.get_mut(&id) else {
            return None; // unknown id: late message from a previous run
        };
        if job.status != JobStatus::Processing {
            return None; // duplicate terminal, or job re-queued after timeout
        }

        match message {
            WorkerMessage::Progress { percent, .. } => {
                job.progress = percent.min(100);
                None
            }
            WorkerMessage::Completed { result, .. } => {
                job.status = JobStatus::Completed;
                job.progress = 100;
                job.result = Some(result);
                job.started_at = None;
                Some(id)
            }
            WorkerMessage::Failed { error, .. } => {
                Self::fail(job, error);
                Some(id)
            }
        }
    }

    /// Fail every processing job whose deadline has passed, freeing its
    /// slot. Returns the ids that timed out.
    fn expire_deadlines(&mut self) -> Vec<JobId> {
        let deadline = self.config.deadline;
        let mut expired = Vec::new();
        for job in self.jobs.values_mut() {
            if job.status != JobStatus::Processing {
                continue;
            }
            let running_for = job
                .started_at
                .map(|t| t.elapsed())
                .unwrap_or(Duration::ZERO);
            if running_for >= deadline {
                Self::fail(
                    job,
                    JobError::new(
                        JobErrorKind::Timeout,
                        format!("no result after {:.1}s", running_for.as_secs_f32()),
                    ),
                );
                expired.push(job.id);
            }
        }
        expired
    }

    fn fail(job: &mut Job, error: JobError) {
        job.status = JobStatus::Failed;
        job.error = Some(error);
        job.result = None;
        job.started_at = None;
    }
}
