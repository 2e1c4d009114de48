//! The worker execution boundary.
//!
//! Transformation work is CPU-bound and slow per image; it must never run
//! on the thread that owns the job table. Workers are plain threads that
//! receive owned `(job id, buffer, params)` requests over a channel and
//! answer exclusively with [`WorkerMessage`]s — zero-or-more `Progress`
//! followed by exactly one terminal `Completed` or `Failed` per job.
//! Nothing is shared: buffers go in by value, results come back by value,
//! and a worker that crashes or hangs can at worst leave a job without a
//! terminal message, which the scheduler's deadline sweep turns into a
//! timeout failure.
//!
//! The scheduler talks to workers through the [`JobExecutor`] seam so
//! tests can swap in a recording mock, the same way the rest of the
//! pipeline mocks its backends.

use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::buffer::PixelBuffer;
use crate::engine::{Engine, EngineError, Processor};
use crate::filters::{TransformationKind, TransformationParams};
use crate::job::{JobError, JobErrorKind, JobId};

/// One transformation request handed to a worker. Owns everything it
/// needs; the worker never reaches back into scheduler state.
#[derive(Debug)]
pub struct WorkerRequest {
    pub job_id: JobId,
    pub image: PixelBuffer,
    pub params: TransformationParams,
}

/// Worker-to-scheduler message. Per job, messages arrive in send order;
/// no ordering holds across jobs or workers.
#[derive(Debug)]
pub enum WorkerMessage {
    Progress { job_id: JobId, percent: u8 },
    Completed { job_id: JobId, result: PixelBuffer },
    Failed { job_id: JobId, error: JobError },
}

impl WorkerMessage {
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => *job_id,
        }
    }
}

/// Where the scheduler sends work. Production is [`WorkerPool`]; tests
/// use a recording mock.
pub trait JobExecutor {
    /// Whether the execution backend implements this kind. Checked by the
    /// scheduler before a slot is spent.
    fn supports(&self, kind: TransformationKind) -> bool;

    /// Hand a job to a worker. Must not block on the transformation.
    fn submit(&self, request: WorkerRequest);
}

/// Coarse milestone reported when a worker picks a job up.
const PROGRESS_STARTED: u8 = 10;

/// Fixed-size pool of worker threads sharing one request channel.
pub struct WorkerPool {
    requests: Option<Sender<WorkerRequest>>,
    handles: Vec<JoinHandle<()>>,
    supported: Vec<TransformationKind>,
}

impl WorkerPool {
    /// Spawn `workers` threads, each running its own [`Engine`] over the
    /// default CPU processor. Terminal and progress messages go to
    /// `results`.
    pub fn spawn(workers: usize, results: Sender<WorkerMessage>) -> Self {
        Self::with_processors(workers, results, || {
            Box::new(crate::engine::CpuProcessor::new())
        })
    }

    /// Spawn with a custom processor per worker (e.g. a restricted or
    /// failing one in tests; a GPU-backed one later).
    pub fn with_processors<F>(workers: usize, results: Sender<WorkerMessage>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn Processor>,
    {
        let all_kinds = [
            TransformationKind::Pencil,
            TransformationKind::Watercolor,
            TransformationKind::OilPainting,
        ];
        let probe = factory();
        let supported = all_kinds
            .into_iter()
            .filter(|&k| probe.supports(k))
            .collect();

        let (tx, rx) = channel::<WorkerRequest>();
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|_| {
                let rx = Arc::clone(&rx);
                let results = results.clone();
                let processor = factory();
                std::thread::spawn(move || worker_loop(rx, results, processor))
            })
            .collect();

        Self {
            requests: Some(tx),
            handles,
            supported,
        }
    }
}

impl JobExecutor for WorkerPool {
    fn supports(&self, kind: TransformationKind) -> bool {
        self.supported.contains(&kind)
    }

    fn submit(&self, request: WorkerRequest) {
        if let Some(tx) = &self.requests {
            // A send failure means every worker is gone; the job will hit
            // the scheduler's deadline and fail as a timeout.
            let _ = tx.send(request);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel lets each worker drain and exit.
        self.requests.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(
    rx: Arc<Mutex<Receiver<WorkerRequest>>>,
    results: Sender<WorkerMessage>,
    processor: Box<dyn Processor>,
) {
    let engine = Engine::new(processor);

    loop {
        // Hold the lock only for the receive; transforms run unlocked so
        // the other workers keep pulling jobs.
        let request = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => return,
        };
        let Ok(request) = request else { return };

        let message = match &engine {
            Ok(engine) => run_one(engine, &request, &results),
            Err(e) => WorkerMessage::Failed {
                job_id: request.job_id,
                error: JobError::new(
                    JobErrorKind::WorkerUnavailable,
                    format!("worker failed to start: {e}"),
                ),
            },
        };
        if results.send(message).is_err() {
            return; // scheduler is gone
        }
    }
}

fn run_one(
    engine: &Engine,
    request: &WorkerRequest,
    results: &Sender<WorkerMessage>,
) -> WorkerMessage {
    let _ = results.send(WorkerMessage::Progress {
        job_id: request.job_id,
        percent: PROGRESS_STARTED,
    });

    match engine.transform(&request.image, &request.params) {
        Ok(result) => WorkerMessage::Completed {
            job_id: request.job_id,
            result,
        },
        Err(e) => {
            let kind = match e {
                EngineError::UnsupportedKind(_) => JobErrorKind::UnsupportedKind,
                EngineError::Algorithm(_) | EngineError::Lifecycle(_) => JobErrorKind::Algorithm,
            };
            WorkerMessage::Failed {
                job_id: request.job_id,
                error: JobError::new(kind, e.to_string()),
            }
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::engine::tests::MockProcessor;
    use std::time::Duration;

    /// Executor that records submissions without running anything.
    /// Tests drive the scheduler by sending [`WorkerMessage`]s themselves.
    #[derive(Default)]
    pub struct MockExecutor {
        pub submitted: Mutex<Vec<(JobId, TransformationKind)>>,
        pub unsupported: Vec<TransformationKind>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn declining(kinds: &[TransformationKind]) -> Self {
            Self {
                submitted: Mutex::new(Vec::new()),
                unsupported: kinds.to_vec(),
            }
        }

        pub fn submissions(&self) -> Vec<(JobId, TransformationKind)> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl JobExecutor for MockExecutor {
        fn supports(&self, kind: TransformationKind) -> bool {
            !self.unsupported.contains(&kind)
        }

        fn submit(&self, request: WorkerRequest) {
            self.submitted
                .lock()
                .unwrap()
                .push((request.job_id, request.params.kind()));
        }
    }

    fn request(id: u64) -> WorkerRequest {
        WorkerRequest {
            job_id: JobId(id),
            image: PixelBuffer::filled(6, 6, [120, 60, 30, 255]).unwrap(),
            params: TransformationParams::defaults_for(TransformationKind::Watercolor),
        }
    }

    fn recv(rx: &Receiver<WorkerMessage>) -> WorkerMessage {
        rx.recv_timeout(Duration::from_secs(5)).expect("message")
    }

    #[test]
    fn pool_reports_progress_then_completion_in_order() {
        let (tx, rx) = channel();
        let pool = WorkerPool::spawn(1, tx);
        pool.submit(request(1));

        match recv(&rx) {
            WorkerMessage::Progress { job_id, percent } => {
                assert_eq!(job_id, JobId(1));
                assert!(percent <= 100);
            }
            other => panic!("expected progress first, got {other:?}"),
        }
        match recv(&rx) {
            WorkerMessage::Completed { job_id, result } => {
                assert_eq!(job_id, JobId(1));
                assert_eq!((result.width(), result.height()), (6, 6));
            }
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn pool_supports_matches_processor() {
        let (tx, _rx) = channel();
        let pool = WorkerPool::with_processors(1, tx, || {
            Box::new(MockProcessor::supporting(&[TransformationKind::Pencil]))
        });
        assert!(pool.supports(TransformationKind::Pencil));
        assert!(!pool.supports(TransformationKind::Watercolor));
    }

    #[test]
    fn processor_failure_becomes_failed_message() {
        let (tx, rx) = channel();
        let pool = WorkerPool::with_processors(1, tx, || {
            let mut mock = MockProcessor::supporting(&[TransformationKind::Watercolor]);
            mock.fail_with = Some("buffer went sideways".into());
            Box::new(mock)
        });
        pool.submit(request(9));

        // Progress milestone still precedes the failure.
        assert!(matches!(recv(&rx), WorkerMessage::Progress { .. }));
        match recv(&rx) {
            WorkerMessage::Failed { job_id, error } => {
                assert_eq!(job_id, JobId(9));
                assert_eq!(error.kind, JobErrorKind::Algorithm);
                assert!(error.message.contains("buffer went sideways"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn pool_drains_pending_requests_on_drop() {
        let (tx, rx) = channel();
        let pool = WorkerPool::spawn(2, tx);
        for i in 0..4 {
            pool.submit(request(i));
        }
        drop(pool); // joins workers after they drain the channel

        let terminals = rx
            .iter()
            .filter(|m| matches!(m, WorkerMessage::Completed { .. }))
            .count();
        assert_eq!(terminals, 4);
    }

    #[test]
    fn mock_executor_records_submissions() {
        let exec = MockExecutor::new();
        exec.submit(request(3));
        assert_eq!(
            exec.submissions(),
            vec![(JobId(3), TransformationKind::Watercolor)]
        );
    }
}
