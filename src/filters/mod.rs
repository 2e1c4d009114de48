//! The three artistic pixel transformations.
//!
//! | Filter | Technique |
//! |---|---|
//! | [`pencil`] | Luminance plane → neighborhood edge detection → line shaping |
//! | [`watercolor`] | Separable box blur → per-channel posterization |
//! | [`oil`] | Kernel-mode filter over quantized intensity bins |
//!
//! Every filter is a pure function `(&PixelBuffer, &Params) -> PixelBuffer`:
//! deterministic, never mutating its input, always producing a fresh buffer
//! of the same dimensions. Rayon parallelizes row passes internally, but
//! each task writes a disjoint output row, so the bytes are identical run
//! to run.
//!
//! Parameter records live in [`params`]; dispatch by kind lives in
//! [`engine`](crate::engine).

pub mod oil;
pub mod params;
pub mod pencil;
pub mod watercolor;

pub use params::{
    OilPaintingParams, PencilParams, TransformationKind, TransformationParams, WatercolorParams,
};
