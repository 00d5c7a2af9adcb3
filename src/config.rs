//! Tuning constants and their overridable configuration structs.
//!
//! Every constant below is an empirically tuned value. They are collected in
//! [`WarpConfig`] and [`DetectorConfig`] so a deployment can override single
//! fields from a JSON file without touching the rest.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Logical label height that curvature values are authored against.
pub const REFERENCE_HEIGHT: f32 = 600.0;

/// Height every label is resampled to before warping.
pub const TARGET_HEIGHT: u32 = 600;

/// Widest normalized label the warp engine will allocate.
pub const MAX_LABEL_WIDTH: u32 = 16_384;

/// Rows of duplicated top edge added above the normalized label.
pub const EXTRA_TOP_SPACE: u32 = 20;

/// Rows of duplicated bottom edge added below the normalized label.
pub const EXTRA_BOTTOM_SPACE: u32 = 20;

/// Multiplier lifting the bottom side corners so they round off.
pub const BOTTOM_CORNER_SHIFT: f32 = 1.5;

/// Interior warp strength for the upper half of the label.
pub const TOP_WARP_COEFFICIENT: f32 = 0.02;

/// Interior warp strength for the lower half of the label.
pub const BOTTOM_WARP_COEFFICIENT: f32 = 0.035;

/// How far from the page origin registration marks are searched for.
pub const SCAN_DEPTH: u32 = 150;

/// Luminance (0-255) below which a pixel counts as mark ink.
pub const DARK_THRESHOLD: u8 = 100;

/// Width of the window a dark run is tested over.
pub const MIN_LINE_LENGTH: u32 = 8;

/// Minimum dark fraction inside the window for a run to count as a mark.
pub const MIN_DARK_RATIO: f32 = 0.3;

/// Distance past the outer mark where the inner (trim) mark search starts.
pub const INNER_MARK_OFFSET: u32 = 10;

/// Extent of the inner mark search window.
pub const INNER_MARK_RANGE: u32 = 40;

/// Smallest fraction of width and height a crop may retain.
pub const MIN_RETAINED_RATIO: f32 = 0.5;

/// Geometry constants for the normalization and curvature-warp engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WarpConfig {
    /// Height curvature values are authored against.
    pub reference_height: f32,
    /// Normalized label height.
    pub target_height: u32,
    /// Upper bound on the normalized label width.
    pub max_width: u32,
    /// Top padding band height.
    pub extra_top_space: u32,
    /// Bottom padding band height.
    pub extra_bottom_space: u32,
    /// Bottom corner lift multiplier.
    pub bottom_corner_shift: f32,
    /// Interior warp coefficient above the horizontal center line.
    pub top_coefficient: f32,
    /// Interior warp coefficient below the horizontal center line.
    pub bottom_coefficient: f32,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            reference_height: REFERENCE_HEIGHT,
            target_height: TARGET_HEIGHT,
            max_width: MAX_LABEL_WIDTH,
            extra_top_space: EXTRA_TOP_SPACE,
            extra_bottom_space: EXTRA_BOTTOM_SPACE,
            bottom_corner_shift: BOTTOM_CORNER_SHIFT,
            top_coefficient: TOP_WARP_COEFFICIENT,
            bottom_coefficient: BOTTOM_WARP_COEFFICIENT,
        }
    }
}

impl WarpConfig {
    /// Total output height: normalized height plus both padding bands.
    #[must_use]
    pub fn output_height(&self) -> u32 {
        self.target_height + self.extra_top_space + self.extra_bottom_space
    }
}

/// Tuning for the registration-mark detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Scan limit along the first row/column.
    pub scan_depth: u32,
    /// Luminance cut-off for ink.
    pub dark_threshold: u8,
    /// Window length for the dark-ratio test.
    pub min_line_length: u32,
    /// Dark fraction required inside the window.
    pub min_dark_ratio: f32,
    /// Offset of the inner mark search window.
    pub inner_offset: u32,
    /// Size of the inner mark search window.
    pub inner_range: u32,
    /// Safety floor on the retained area.
    pub min_retained_ratio: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            scan_depth: SCAN_DEPTH,
            dark_threshold: DARK_THRESHOLD,
            min_line_length: MIN_LINE_LENGTH,
            min_dark_ratio: MIN_DARK_RATIO,
            inner_offset: INNER_MARK_OFFSET,
            inner_range: INNER_MARK_RANGE,
            min_retained_ratio: MIN_RETAINED_RATIO,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Warp engine geometry.
    pub warp: WarpConfig,
    /// Mark detector tuning.
    pub detector: DetectorConfig,
}

impl PipelineConfig {
    /// Parse a (possibly partial) JSON document; absent fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the JSON is malformed or fails [`Self::validate`].
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, or [`Error::Config`]
    /// if its content is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let w = &self.warp;
        if !(w.reference_height.is_finite() && w.reference_height > 0.0) {
            return Err(Error::config("warp.reference_height must be positive"));
        }
        if w.target_height == 0 {
            return Err(Error::config("warp.target_height must be positive"));
        }
        if w.max_width == 0 {
            return Err(Error::config("warp.max_width must be positive"));
        }
        for (name, v) in [
            ("warp.bottom_corner_shift", w.bottom_corner_shift),
            ("warp.top_coefficient", w.top_coefficient),
            ("warp.bottom_coefficient", w.bottom_coefficient),
        ] {
            if !v.is_finite() {
                return Err(Error::config(format!("{name} must be finite")));
            }
        }

        let d = &self.detector;
        if d.scan_depth == 0 || d.min_line_length == 0 || d.inner_range == 0 {
            return Err(Error::config(
                "detector scan_depth, min_line_length and inner_range must be positive",
            ));
        }
        for (name, v) in [
            ("detector.min_dark_ratio", d.min_dark_ratio),
            ("detector.min_retained_ratio", d.min_retained_ratio),
        ] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(Error::config(format!("{name} must be in (0, 1]")));
            }
        }
        Ok(())
    }
}
