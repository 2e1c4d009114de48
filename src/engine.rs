//! Transformation engine: the [`Processor`] trait and the dispatching
//! [`Engine`] that the workers run.
//!
//! A processor is anything that can turn a pixel buffer plus a parameter
//! record into a new pixel buffer. The production implementation is
//! [`CpuProcessor`] — the pure-Rust filters in [`filters`](crate::filters),
//! no warm-up state at all. The trait still carries an
//! `initialize`/`cleanup` lifecycle so a future processor that must
//! acquire real resources (a GPU context, a loaded model) slots in
//! without changing any call site; the engine runs the lifecycle, the
//! worker just calls [`Engine::transform`].
//!
//! A processor may support only a subset of kinds. The engine reports
//! [`EngineError::UnsupportedKind`] for anything its processor declines,
//! and the scheduler checks support *before* dispatch so such jobs fail
//! without ever occupying an execution slot.

use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::filters::{self, TransformationKind, TransformationParams};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no processor available for {0} transformations")]
    UnsupportedKind(TransformationKind),
    #[error("algorithm failure: {0}")]
    Algorithm(String),
    #[error("processor lifecycle failure: {0}")]
    Lifecycle(String),
}

/// A transformation backend with an explicit lifecycle.
///
/// `transform` must not mutate the input buffer and must be deterministic
/// for identical inputs. `initialize` runs once before the first
/// transform, `cleanup` once when the engine shuts down.
pub trait Processor: Send {
    fn name(&self) -> &'static str;

    /// Acquire whatever warm-up state the processor needs.
    fn initialize(&mut self) -> Result<(), EngineError>;

    /// Whether this processor implements the given kind.
    fn supports(&self, kind: TransformationKind) -> bool;

    /// Run one transformation, producing a new buffer of the same
    /// dimensions.
    fn transform(
        &self,
        input: &PixelBuffer,
        params: &TransformationParams,
    ) -> Result<PixelBuffer, EngineError>;

    /// Release resources acquired by `initialize`.
    fn cleanup(&mut self) -> Result<(), EngineError>;
}

/// Pure-CPU processor backed by the [`filters`] module. Stateless; the
/// lifecycle hooks are no-ops.
pub struct CpuProcessor;

impl CpuProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpuProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for CpuProcessor {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn initialize(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn supports(&self, _kind: TransformationKind) -> bool {
        true
    }

    fn transform(
        &self,
        input: &PixelBuffer,
        params: &TransformationParams,
    ) -> Result<PixelBuffer, EngineError> {
        Ok(match params {
            TransformationParams::Pencil(p) => filters::pencil::apply(input, p),
            TransformationParams::Watercolor(p) => filters::watercolor::apply(input, p),
            TransformationParams::OilPainting(p) => filters::oil::apply(input, p),
        })
    }

    fn cleanup(&mut self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Owns one processor and its lifecycle; the uniform transform contract
/// everything above the filters talks to.
pub struct Engine {
    processor: Box<dyn Processor>,
    closed: bool,
}

impl Engine {
    /// Wrap and initialize a processor.
    pub fn new(mut processor: Box<dyn Processor>) -> Result<Self, EngineError> {
        processor.initialize()?;
        Ok(Self {
            processor,
            closed: false,
        })
    }

    /// Engine over the default CPU processor.
    pub fn cpu() -> Self {
        // CpuProcessor::initialize is infallible.
        Self::new(Box::new(CpuProcessor::new())).expect("cpu processor initialization")
    }

    pub fn processor_name(&self) -> &'static str {
        self.processor.name()
    }

    pub fn supports(&self, kind: TransformationKind) -> bool {
        self.processor.supports(kind)
    }

    pub fn transform(
        &self,
        input: &PixelBuffer,
        params: &TransformationParams,
    ) -> Result<PixelBuffer, EngineError> {
        if !self.processor.supports(params.kind()) {
            return Err(EngineError::UnsupportedKind(params.kind()));
        }
        self.processor.transform(input, params)
    }

    /// Run the processor's cleanup. Preferred over dropping when the
    /// caller cares about cleanup errors.
    pub fn shutdown(mut self) -> Result<(), EngineError> {
        self.closed = true;
        self.processor.cleanup()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort; shutdown() is the error-aware path.
            let _ = self.processor.cleanup();
        }
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;

    /// Processor that records lifecycle/transform calls and can be
    /// restricted to a subset of kinds.
    pub struct MockProcessor {
        pub supported: Vec<TransformationKind>,
        pub calls: Arc<Mutex<Vec<String>>>,
        pub fail_with: Option<String>,
    }

    impl MockProcessor {
        pub fn supporting(kinds: &[TransformationKind]) -> Self {
            Self {
                supported: kinds.to_vec(),
                calls: Arc::new(Mutex::new(Vec::new())),
                fail_with: None,
            }
        }
    }

    impl Processor for MockProcessor {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn initialize(&mut self) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push("initialize".into());
            Ok(())
        }

        fn supports(&self, kind: TransformationKind) -> bool {
            self.supported.contains(&kind)
        }

        fn transform(
            &self,
            input: &PixelBuffer,
            params: &TransformationParams,
        ) -> Result<PixelBuffer, EngineError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("transform:{}", params.kind()));
            if let Some(msg) = &self.fail_with {
                return Err(EngineError::Algorithm(msg.clone()));
            }
            Ok(input.clone())
        }

        fn cleanup(&mut self) -> Result<(), EngineError> {
            self.calls.lock().unwrap().push("cleanup".into());
            Ok(())
        }
    }

    fn small_buffer() -> PixelBuffer {
        PixelBuffer::filled(4, 4, [100, 100, 100, 255]).unwrap()
    }

    #[test]
    fn cpu_processor_dispatches_every_kind() {
        let engine = Engine::cpu();
        for kind in [
            TransformationKind::Pencil,
            TransformationKind::Watercolor,
            TransformationKind::OilPainting,
        ] {
            let out = engine
                .transform(&small_buffer(), &TransformationParams::defaults_for(kind))
                .unwrap();
            assert_eq!((out.width(), out.height()), (4, 4));
        }
    }

    #[test]
    fn transform_does_not_mutate_input() {
        let input = small_buffer();
        let snapshot = input.clone();
        Engine::cpu()
            .transform(
                &input,
                &TransformationParams::defaults_for(TransformationKind::Watercolor),
            )
            .unwrap();
        assert_eq!(input, snapshot);
    }

    #[test]
    fn unsupported_kind_is_rejected() {
        let engine = Engine::new(Box::new(MockProcessor::supporting(&[
            TransformationKind::Pencil,
        ])))
        .unwrap();
        let err = engine
            .transform(
                &small_buffer(),
                &TransformationParams::defaults_for(TransformationKind::OilPainting),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnsupportedKind(TransformationKind::OilPainting)
        ));
    }

    #[test]
    fn lifecycle_runs_initialize_then_cleanup() {
        let mock = MockProcessor::supporting(&[TransformationKind::Pencil]);
        let calls = mock.calls.clone();
        let engine = Engine::new(Box::new(mock)).unwrap();
        engine
            .transform(
                &small_buffer(),
                &TransformationParams::defaults_for(TransformationKind::Pencil),
            )
            .unwrap();
        engine.shutdown().unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["initialize", "transform:pencil", "cleanup"]
        );
    }

    #[test]
    fn drop_runs_cleanup_once() {
        let mock = MockProcessor::supporting(&[]);
        let calls = mock.calls.clone();
        drop(Engine::new(Box::new(mock)).unwrap());
        assert_eq!(*calls.lock().unwrap(), vec!["initialize", "cleanup"]);
    }
}
