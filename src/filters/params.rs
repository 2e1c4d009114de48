//! Typed parameter records for the three transformations.
//!
//! These structs describe *what* a filter should do, not *how*. Each kind
//! gets its own record with typed fields and documented defaults; the
//! effective parameter set for a job is this default record with any
//! caller-supplied overrides applied field by field (serde defaults give
//! exactly that union semantics when loading from TOML).
//!
//! The original kiosk passed a single stringly-keyed bag of numbers to
//! every algorithm, so a typo'd key silently fell back to a default and
//! watercolor happily received `oilRadius`. A tagged union per kind makes
//! both mistakes unrepresentable.

use serde::{Deserialize, Serialize};

/// The transformations the kiosk offers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransformationKind {
    /// The kiosk's signature filter; what first-time customers get.
    #[default]
    Pencil,
    Watercolor,
    #[serde(rename = "oilpainting")]
    #[value(name = "oilpainting")]
    OilPainting,
}

impl std::fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pencil => "pencil",
            Self::Watercolor => "watercolor",
            Self::OilPainting => "oilpainting",
        };
        f.write_str(name)
    }
}

/// Parameters for the pencil-sketch filter.
///
/// The shaping constants that are not operator-tunable
/// ([`EDGE_THRESHOLD`](super::pencil::EDGE_THRESHOLD),
/// [`MIN_LINE_INTENSITY`](super::pencil::MIN_LINE_INTENSITY),
/// [`MAX_LINE_INTENSITY`](super::pencil::MAX_LINE_INTENSITY)) live with
/// the algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PencilParams {
    /// Multiplier on the detected gradient; higher means darker lines. Default 0.95.
    pub edge_strength: f32,
    /// Multiplier on edge intensity before shaping; higher means thicker lines. Default 1.5.
    pub line_weight: f32,
    /// Floor on the output value as a fraction of white. Default 0.98.
    pub background_whiteness: f32,
    /// Edge-detection neighborhood radius; rounded, minimum 1. Default 3.
    pub noise_reduction: f32,
}

impl Default for PencilParams {
    fn default() -> Self {
        Self {
            edge_strength: 0.95,
            line_weight: 1.5,
            background_whiteness: 0.98,
            noise_reduction: 3.0,
        }
    }
}

/// Parameters for the watercolor filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatercolorParams {
    /// Box-blur radius in pixels; 0 skips the blur. Default 3.
    pub blur_radius: u32,
    /// Posterization bucket size per channel; clamped to at least 1
    /// (1 leaves colors untouched). Default 32.
    pub color_reduction_factor: u32,
}

impl Default for WatercolorParams {
    fn default() -> Self {
        Self {
            blur_radius: 3,
            color_reduction_factor: 32,
        }
    }
}

/// Parameters for the oil-painting filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OilPaintingParams {
    /// Neighborhood radius of the kernel scan. Default 2.
    pub oil_radius: u32,
    /// Number of discrete intensity bins; clamped to at least 1. Default 20.
    pub oil_intensity: u32,
}

impl Default for OilPaintingParams {
    fn default() -> Self {
        Self {
            oil_radius: 2,
            oil_intensity: 20,
        }
    }
}

/// A complete, self-contained request: which filter plus its settings.
///
/// Jobs carry this snapshot, so a job's behavior is fixed at enqueue time
/// and immune to later settings changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransformationParams {
    Pencil(PencilParams),
    Watercolor(WatercolorParams),
    #[serde(rename = "oilpainting")]
    OilPainting(OilPaintingParams),
}

impl TransformationParams {
    pub fn kind(&self) -> TransformationKind {
        match self {
            Self::Pencil(_) => TransformationKind::Pencil,
            Self::Watercolor(_) => TransformationKind::Watercolor,
            Self::OilPainting(_) => TransformationKind::OilPainting,
        }
    }

    /// The default record for a kind.
    pub fn defaults_for(kind: TransformationKind) -> Self {
        match kind {
            TransformationKind::Pencil => Self::Pencil(PencilParams::default()),
            TransformationKind::Watercolor => Self::Watercolor(WatercolorParams::default()),
            TransformationKind::OilPainting => Self::OilPainting(OilPaintingParams::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pencil_defaults() {
        let p = PencilParams::default();
        assert_eq!(p.edge_strength, 0.95);
        assert_eq!(p.line_weight, 1.5);
        assert_eq!(p.background_whiteness, 0.98);
        assert_eq!(p.noise_reduction, 3.0);
    }

    #[test]
    fn watercolor_defaults() {
        let p = WatercolorParams::default();
        assert_eq!(p.blur_radius, 3);
        assert_eq!(p.color_reduction_factor, 32);
    }

    #[test]
    fn oil_defaults() {
        let p = OilPaintingParams::default();
        assert_eq!(p.oil_radius, 2);
        assert_eq!(p.oil_intensity, 20);
    }

    #[test]
    fn partial_toml_overrides_union_with_defaults() {
        // Only one field given: the rest must come from the default record.
        let p: PencilParams = toml::from_str("edge_strength = 0.5").unwrap();
        assert_eq!(p.edge_strength, 0.5);
        assert_eq!(p.line_weight, 1.5);
        assert_eq!(p.background_whiteness, 0.98);
    }

    #[test]
    fn params_kind_matches_variant() {
        assert_eq!(
            TransformationParams::defaults_for(TransformationKind::Watercolor).kind(),
            TransformationKind::Watercolor
        );
        assert_eq!(
            TransformationParams::defaults_for(TransformationKind::OilPainting).kind(),
            TransformationKind::OilPainting
        );
    }

    #[test]
    fn kind_display_names() {
        assert_eq!(TransformationKind::Pencil.to_string(), "pencil");
        assert_eq!(TransformationKind::OilPainting.to_string(), "oilpainting");
    }

    #[test]
    fn params_serialize_tagged() {
        let json =
            serde_json::to_string(&TransformationParams::defaults_for(TransformationKind::Pencil))
                .unwrap();
        assert!(json.contains(r#""type":"pencil""#));
    }
}
