//! Kiosk settings: which transformation is active and how each one is
//! tuned.
//!
//! Settings load from a single TOML file with per-field defaults, so an
//! operator overrides only what they care about:
//!
//! ```toml
//! transformation = "watercolor"
//!
//! [watercolor]
//! blur_radius = 5
//! ```
//!
//! The settings object itself is read-only at submission time:
//! [`Settings::params_for`] takes a snapshot of the active record, and
//! that snapshot travels with the job. Editing settings mid-session
//! never changes a job that is already queued or processing.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::{
    OilPaintingParams, PencilParams, TransformationKind, TransformationParams, WatercolorParams,
};
use crate::queue::SchedulerConfig;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything the kiosk operator can tune.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Which filter new captures get.
    pub transformation: TransformationKind,
    pub pencil: PencilParams,
    pub watercolor: WatercolorParams,
    pub oilpainting: OilPaintingParams,
    pub queue: QueueSettings,
    pub processing: ProcessingSettings,
}

/// Queue sizing and the per-job deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSettings {
    /// Worker threads in the pool.
    pub workers: usize,
    /// Maximum jobs transforming at once.
    pub concurrency_limit: usize,
    /// Seconds a job may run without a terminal message before it is
    /// failed as timed out.
    pub deadline_secs: u64,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            workers: 2,
            concurrency_limit: 2,
            deadline_secs: 30,
        }
    }
}

impl QueueSettings {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            concurrency_limit: self.concurrency_limit.max(1),
            deadline: std::time::Duration::from_secs(self.deadline_secs.max(1)),
        }
    }
}

/// Pixel-pass parallelism.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Rayon threads per transformation; 0 means one per CPU core.
    pub threads: usize,
}

/// Resolve the rayon thread count: user can constrain down, not up.
pub fn effective_threads(processing: &ProcessingSettings) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    if processing.threads == 0 {
        cores
    } else {
        processing.threads.min(cores)
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Snapshot the parameter record for a kind. This copy is what a job
    /// carries; later settings edits do not reach it.
    pub fn params_for(&self, kind: TransformationKind) -> TransformationParams {
        match kind {
            TransformationKind::Pencil => TransformationParams::Pencil(self.pencil),
            TransformationKind::Watercolor => TransformationParams::Watercolor(self.watercolor),
            TransformationKind::OilPainting => TransformationParams::OilPainting(self.oilpainting),
        }
    }

    /// Snapshot for the currently active transformation.
    pub fn active_params(&self) -> TransformationParams {
        self.params_for(self.transformation)
    }
}

/// A fully documented settings file with every option at its default.
pub fn stock_settings_toml() -> String {
    r#"# atelier kiosk settings
#
# Every key is optional; anything omitted uses the default shown here.

# Filter applied to new captures: "pencil", "watercolor", or "oilpainting".
transformation = "pencil"

[pencil]
# Multiplier on detected gradients; higher draws darker lines.
edge_strength = 0.95
# Multiplier on edge intensity; higher draws thicker lines.
line_weight = 1.5
# Floor on output brightness as a fraction of white.
background_whiteness = 0.98
# Edge-detection neighborhood radius (rounded, minimum 1).
noise_reduction = 3.0

[watercolor]
# Box-blur radius in pixels; 0 disables the blur.
blur_radius = 3
# Posterization bucket size per channel (1 = no reduction).
color_reduction_factor = 32

[oilpainting]
# Kernel radius of the brush-stroke scan.
oil_radius = 2
# Number of intensity bins; more bins keep more detail.
oil_intensity = 20

[queue]
# Worker threads transforming images.
workers = 2
# Jobs allowed to transform at once.
concurrency_limit = 2
# Seconds before a silent job is failed as timed out.
deadline_secs = 30

[processing]
# Rayon threads per transformation; 0 = one per CPU core.
threads = 0
"#
    .to_string()
}
