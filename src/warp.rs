//! Normalization and curvature-warp engine.
//!
//! Turns arbitrary label artwork into a fixed-height raster whose outline bows
//! like a label wrapped around a bottle. The work is split into phases:
//!
//! 1. **Normalize**: bicubic resample of premultiplied pixels to the target
//!    height, keeping aspect.
//! 2. **Scale curvature**: rescale the authored curvature by
//!    `normalized_height / reference_height`.
//! 3. **Interior warp** (enhanced mode only): pseudo-cylindrical vertical
//!    displacement `dy = k(rel_y) * rel_x^2 * height` with bilinear sampling
//!    and edge-row clamping.
//! 4. **Edge extension**: duplicate the first and last rows into padding bands.
//! 5. **Silhouette clip**: cut the padded raster to the curved outline.
//!
//! [`WarpJob`] runs one phase per [`WarpJob::step`] call, so a host can
//! interleave other work between phases. [`warp_label`] drives a job to
//! completion.

use std::fmt;

use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::config::WarpConfig;
use crate::error::{Error, Result};
use crate::parallel::{for_each_row_mut, CHANNELS};
use crate::raster::{premultiply, straight_rgba, unpremultiply, RasterImage};
use crate::silhouette::Silhouette;

/// How far the label's top and bottom edges bow, authored at the reference height.
///
/// Positive `top_curve` lifts the centre of the top edge; positive
/// `bottom_curve` lifts the bottom corners and sags the centre relative to them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CurvatureSpec {
    /// Top edge bow.
    pub top_curve: f32,
    /// Bottom edge bow.
    pub bottom_curve: f32,
}

impl CurvatureSpec {
    /// Create a curvature spec.
    #[must_use]
    pub fn new(top_curve: f32, bottom_curve: f32) -> Self {
        Self {
            top_curve,
            bottom_curve,
        }
    }

    /// Rescale to a label of `normalized_height` pixels.
    #[must_use]
    pub fn scaled(&self, normalized_height: u32, reference_height: f32) -> ScaledCurvature {
        #[allow(clippy::cast_precision_loss)]
        let height_scale = normalized_height as f32 / reference_height;
        ScaledCurvature {
            top_curve: self.top_curve * height_scale,
            bottom_curve: self.bottom_curve * height_scale,
            height_scale,
        }
    }
}

/// Curvature expressed in pixels of the normalized label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaledCurvature {
    /// Top edge bow in pixels.
    pub top_curve: f32,
    /// Bottom edge bow in pixels.
    pub bottom_curve: f32,
    /// `normalized_height / reference_height`.
    pub height_scale: f32,
}

/// Warp mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpOptions {
    /// Also displace interior pixels, not just clip the outline.
    pub enhanced: bool,
    /// Multiplier on the interior displacement.
    pub vertical_intensity: f32,
}

impl Default for WarpOptions {
    fn default() -> Self {
        Self {
            enhanced: false,
            vertical_intensity: 1.0,
        }
    }
}

/// Progress notification emitted after each warp phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Completion in `0..=100`, non-decreasing within one run.
    pub percent: u8,
    /// Short description of what just finished.
    pub message: String,
}

impl ProgressEvent {
    /// Create an event.
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }

    /// Terminal event for a finished label.
    #[must_use]
    pub fn done() -> Self {
        Self::new(100, "label ready")
    }
}

/// Warp phases, used to tag failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarpStep {
    /// Resample to the target height.
    Normalize,
    /// Rescale curvature to the normalized height.
    ScaleCurvature,
    /// Pseudo-cylindrical interior displacement.
    InteriorWarp,
    /// Duplicate edge rows into padding bands.
    EdgeExtension,
    /// Clip to the curved outline.
    SilhouetteClip,
}

impl WarpStep {
    /// Stable kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::ScaleCurvature => "scale-curvature",
            Self::InteriorWarp => "interior-warp",
            Self::EdgeExtension => "edge-extension",
            Self::SilhouetteClip => "silhouette-clip",
        }
    }

    fn percent(self) -> u8 {
        match self {
            Self::Normalize => 20,
            Self::ScaleCurvature => 40,
            Self::InteriorWarp => 70,
            Self::EdgeExtension => 85,
            Self::SilhouetteClip => 95,
        }
    }

    fn next(self) -> Phase {
        match self {
            Self::Normalize => Phase::Run(Self::ScaleCurvature),
            Self::ScaleCurvature => Phase::Run(Self::InteriorWarp),
            Self::InteriorWarp => Phase::Run(Self::EdgeExtension),
            Self::EdgeExtension => Phase::Run(Self::SilhouetteClip),
            Self::SilhouetteClip => Phase::Finish,
        }
    }
}

impl fmt::Display for WarpStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Run(WarpStep),
    Finish,
    Done,
    Failed,
}

/// A label warp that advances one phase at a time.
pub struct WarpJob<'a> {
    source: &'a RasterImage,
    curvature: CurvatureSpec,
    options: WarpOptions,
    config: &'a WarpConfig,
    phase: Phase,
    current: Option<RasterImage>,
    scaled: Option<ScaledCurvature>,
}

impl<'a> WarpJob<'a> {
    /// Prepare a job; nothing runs until [`Self::step`].
    #[must_use]
    pub fn new(
        source: &'a RasterImage,
        curvature: CurvatureSpec,
        options: WarpOptions,
        config: &'a WarpConfig,
    ) -> Self {
        Self {
            source,
            curvature,
            options,
            config,
            phase: Phase::Run(WarpStep::Normalize),
            current: None,
            scaled: None,
        }
    }

    /// Curvature after phase 2, if it has run.
    #[must_use]
    pub fn scaled_curvature(&self) -> Option<ScaledCurvature> {
        self.scaled
    }

    /// Whether the terminal event has been emitted.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    /// Run the next phase and return its progress event.
    ///
    /// Returns `Ok(None)` once the job has finished or failed. After an error
    /// no further events are produced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Warp`] tagged with the phase that failed.
    pub fn step(&mut self) -> Result<Option<ProgressEvent>> {
        match self.phase {
            Phase::Run(step) => match self.run(step) {
                Ok(message) => {
                    tracing::debug!(step = %step, "warp phase complete");
                    self.phase = step.next();
                    Ok(Some(ProgressEvent::new(step.percent(), message)))
                }
                Err(e) => {
                    self.phase = Phase::Failed;
                    self.current = None;
                    Err(e)
                }
            },
            Phase::Finish => {
                self.phase = Phase::Done;
                Ok(Some(ProgressEvent::done()))
            }
            Phase::Done | Phase::Failed => Ok(None),
        }
    }

    /// Take the finished label.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Warp`] if the job has not run to completion.
    pub fn into_output(self) -> Result<RasterImage> {
        match (self.phase, self.current) {
            (Phase::Done, Some(img)) => Ok(img),
            _ => Err(Error::warp(
                WarpStep::SilhouetteClip,
                "warp job did not run to completion",
            )),
        }
    }

    fn run(&mut self, step: WarpStep) -> Result<String> {
        match step {
            WarpStep::Normalize => {
                let img = normalize(
                    self.source,
                    self.config.target_height,
                    self.config.max_width,
                )?;
                let msg = format!("normalized to {}x{}", img.width(), img.height());
                self.current = Some(img);
                Ok(msg)
            }
            WarpStep::ScaleCurvature => {
                let c = self.curvature;
                if !(c.top_curve.is_finite() && c.bottom_curve.is_finite()) {
                    return Err(Error::warp(step, "curvature must be finite"));
                }
                let height = self.stage(step)?.height();
                let scaled = c.scaled(height, self.config.reference_height);
                self.scaled = Some(scaled);
                Ok(format!(
                    "curvature scaled by {:.3} (top {:.2}, bottom {:.2})",
                    scaled.height_scale, scaled.top_curve, scaled.bottom_curve
                ))
            }
            WarpStep::InteriorWarp => {
                if !self.options.enhanced {
                    return Ok("interior warp skipped".to_string());
                }
                let intensity = self.options.vertical_intensity;
                if !intensity.is_finite() {
                    return Err(Error::warp(step, "vertical intensity must be finite"));
                }
                let warped = interior_warp(
                    self.stage(step)?,
                    self.config.top_coefficient * intensity,
                    self.config.bottom_coefficient * intensity,
                );
                self.current = Some(warped);
                Ok("interior warp applied".to_string())
            }
            WarpStep::EdgeExtension => {
                let extended = extend_edges(
                    self.stage(step)?,
                    self.config.extra_top_space,
                    self.config.extra_bottom_space,
                );
                self.current = Some(extended);
                Ok("edges extended".to_string())
            }
            WarpStep::SilhouetteClip => {
                let scaled = self
                    .scaled
                    .ok_or_else(|| Error::warp(step, "curvature has not been scaled"))?;
                let img = self.stage(step)?;
                let top = self.config.extra_top_space;
                let content_height = img
                    .height()
                    .saturating_sub(top + self.config.extra_bottom_space);
                #[allow(clippy::cast_precision_loss)]
                let outline = Silhouette::new(
                    img.width(),
                    top as f32,
                    (top + content_height) as f32,
                    scaled.top_curve,
                    scaled.bottom_curve,
                    self.config.bottom_corner_shift,
                );
                let clipped = outline.clip(img);
                self.current = Some(clipped);
                Ok("silhouette clipped".to_string())
            }
        }
    }

    fn stage(&self, step: WarpStep) -> Result<&RasterImage> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::warp(step, "no intermediate raster"))
    }
}

/// Warp a label raster, reporting progress after every phase.
///
/// The final event always has `percent == 100`. Nothing is reported after an
/// error.
///
/// # Errors
///
/// Returns [`Error::Warp`] tagged with the failing phase.
#[tracing::instrument(
    skip_all,
    fields(w = source.width(), h = source.height(), enhanced = options.enhanced)
)]
pub fn warp_label<F>(
    source: &RasterImage,
    curvature: CurvatureSpec,
    options: WarpOptions,
    config: &WarpConfig,
    mut on_progress: F,
) -> Result<RasterImage>
where
    F: FnMut(&ProgressEvent),
{
    let mut job = WarpJob::new(source, curvature, options, config);
    while let Some(event) = job.step()? {
        on_progress(&event);
    }
    job.into_output()
}

/// Resample to `target_height`, preserving aspect ratio.
///
/// Fails instead of allocating a label wider than `max_width`.
fn normalize(source: &RasterImage, target_height: u32, max_width: u32) -> Result<RasterImage> {
    let (w, h) = source.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::warp(
            WarpStep::Normalize,
            format!("source has no pixels ({w}x{h})"),
        ));
    }
    if target_height == 0 {
        return Err(Error::warp(WarpStep::Normalize, "target height is zero"));
    }

    let aspect = f64::from(w) / f64::from(h);
    let width = (f64::from(target_height) * aspect).round().max(1.0);
    if width > f64::from(max_width) {
        return Err(Error::warp(
            WarpStep::Normalize,
            format!("normalized width {width} exceeds the {max_width} px limit ({w}x{h} source)"),
        ));
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let target_width = width as u32;

    if (target_width, target_height) == (w, h) {
        return Ok(source.clone());
    }
    let resized = imageops::resize(
        &premultiply(source),
        target_width,
        target_height,
        FilterType::CatmullRom,
    );
    Ok(unpremultiply(&resized))
}

/// Pseudo-cylindrical vertical displacement.
///
/// For destination `(x, y)` with `rel_x, rel_y` in `[-1, 1]` measured from the
/// centre, the source row is `y + k * rel_y * rel_x^2 * height`, where `k` is
/// `top_k` above the centre line and `bottom_k` below it. Samples beyond the
/// first or last row reuse that row.
fn interior_warp(src: &RasterImage, top_k: f32, bottom_k: f32) -> RasterImage {
    let (w, h) = src.dimensions();
    let mut out = RasterImage::new(w, h);

    #[allow(clippy::cast_precision_loss)]
    let (cx, cy, hf) = (
        (w.saturating_sub(1)) as f32 / 2.0,
        (h.saturating_sub(1)) as f32 / 2.0,
        h as f32,
    );

    for_each_row_mut(&mut out, w, |y, row| {
        #[allow(clippy::cast_precision_loss)]
        let yf = y as f32;
        let rel_y = if cy > 0.0 { (yf - cy) / cy } else { 0.0 };
        let k = if rel_y < 0.0 { top_k } else { bottom_k };
        let row_shift = k * rel_y * hf;

        for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let xf = x as f32;
            let rel_x = if cx > 0.0 { (xf - cx) / cx } else { 0.0 };
            let dy = row_shift * rel_x * rel_x;
            px.copy_from_slice(&sample_bilinear(src, xf, yf + dy));
        }
    });

    out
}

/// Bilinear sample with coordinates clamped to the raster.
///
/// Taps are weighted by their alpha so transparent neighbours contribute no color.
fn sample_bilinear(src: &RasterImage, x: f32, y: f32) -> [u8; 4] {
    let (w, h) = src.dimensions();
    #[allow(clippy::cast_precision_loss)]
    let (max_x, max_y) = ((w - 1) as f32, (h - 1) as f32);
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (x0, y0) = (x.floor() as u32, y.floor() as u32);
    let (x1, y1) = ((x0 + 1).min(w - 1), (y0 + 1).min(h - 1));
    #[allow(clippy::cast_precision_loss)]
    let (fx, fy) = (x - x0 as f32, y - y0 as f32);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x1, y0, fx * (1.0 - fy)),
        (x0, y1, (1.0 - fx) * fy),
        (x1, y1, fx * fy),
    ];

    let mut acc = [0.0f32; 4];
    for (tx, ty, weight) in taps {
        let px = src.get_pixel(tx, ty);
        let a = f32::from(px[3]) / 255.0 * weight;
        for (sum, &v) in acc[..3].iter_mut().zip(&px.0[..3]) {
            *sum += f32::from(v) / 255.0 * a;
        }
        acc[3] += a;
    }
    straight_rgba(acc).0
}

/// Pad with `top` copies of the first row and `bottom` copies of the last.
fn extend_edges(src: &RasterImage, top: u32, bottom: u32) -> RasterImage {
    let (w, h) = src.dimensions();
    let mut out = RasterImage::new(w, h + top + bottom);
    let row_len = w as usize * CHANNELS;
    let raw = src.as_raw();
    let last = h.saturating_sub(1) as usize;

    for_each_row_mut(&mut out, w, |y, row| {
        let src_y = y.saturating_sub(top as usize).min(last);
        let start = src_y * row_len;
        row.copy_from_slice(&raw[start..start + row_len]);
    });

    out
}
