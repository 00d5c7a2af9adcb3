//! Liquid recoloring for the wine layer seen through the bottle.
//!
//! A grayscale liquid mask is tinted with a target color per pixel:
//!
//! 1. `out = blend(g, c)` per channel, where `g` is the mask luminance and `c`
//!    the color channel, both in `[0, 1]`
//! 2. `out = clamp((out - 0.5) * contrast + 0.5, 0, 1)`
//! 3. `final = g * (1 - opacity) + out * opacity`
//!
//! Alpha is carried over unchanged and fully transparent pixels are copied
//! as is. The map is pure, so callers can run it on every slider change and
//! coalesce rapid changes themselves.

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::parallel::for_each_pixel_mut;
use crate::raster::{luminance, RasterImage};

/// Channel combination formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    /// `g * c`
    #[default]
    Multiply,
    /// Multiply or screen depending on the base.
    Overlay,
    /// Gentle contrast toward the color.
    SoftLight,
    /// Overlay with base and color swapped.
    HardLight,
    /// Darken the base to reflect the color.
    ColorBurn,
    /// Brighten the base to reflect the color.
    ColorDodge,
    /// `min(g, c)`
    Darken,
    /// `max(g, c)`
    Lighten,
    /// The color itself.
    Normal,
}

impl BlendMode {
    /// All modes, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Multiply,
        Self::Overlay,
        Self::SoftLight,
        Self::HardLight,
        Self::ColorBurn,
        Self::ColorDodge,
        Self::Darken,
        Self::Lighten,
        Self::Normal,
    ];

    /// Stable kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Multiply => "multiply",
            Self::Overlay => "overlay",
            Self::SoftLight => "soft-light",
            Self::HardLight => "hard-light",
            Self::ColorBurn => "color-burn",
            Self::ColorDodge => "color-dodge",
            Self::Darken => "darken",
            Self::Lighten => "lighten",
            Self::Normal => "normal",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::input(format!("unknown blend mode: {s}")))
    }
}

/// Recolor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WineSettings {
    /// Weight of the tinted result against the original gray, in `[0, 1]`.
    pub opacity: f32,
    /// Contrast around mid-gray; `1.0` leaves values unchanged.
    pub contrast: f32,
    /// Formula combining gray and color.
    pub blend_mode: BlendMode,
}

impl Default for WineSettings {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            contrast: 1.0,
            blend_mode: BlendMode::Multiply,
        }
    }
}

impl WineSettings {
    fn validate(&self) -> Result<()> {
        if !(self.opacity.is_finite() && (0.0..=1.0).contains(&self.opacity)) {
            return Err(Error::input(format!(
                "opacity must be in [0, 1], got {}",
                self.opacity
            )));
        }
        if !(self.contrast.is_finite() && self.contrast >= 0.0) {
            return Err(Error::input(format!(
                "contrast must be a non-negative number, got {}",
                self.contrast
            )));
        }
        Ok(())
    }
}

/// Combine base gray `g` with color channel `c`, both in `[0, 1]`.
#[must_use]
pub fn blend_channel(mode: BlendMode, g: f32, c: f32) -> f32 {
    match mode {
        BlendMode::Multiply => g * c,
        BlendMode::Overlay => {
            if g < 0.5 {
                2.0 * g * c
            } else {
                1.0 - 2.0 * (1.0 - g) * (1.0 - c)
            }
        }
        BlendMode::SoftLight => {
            if c < 0.5 {
                g - (1.0 - 2.0 * c) * g * (1.0 - g)
            } else {
                g + (2.0 * c - 1.0) * (g.sqrt() - g)
            }
        }
        BlendMode::HardLight => {
            if c < 0.5 {
                2.0 * g * c
            } else {
                1.0 - 2.0 * (1.0 - g) * (1.0 - c)
            }
        }
        BlendMode::ColorBurn => {
            if c <= 0.0 {
                0.0
            } else {
                (1.0 - (1.0 - g) / c).clamp(0.0, 1.0)
            }
        }
        BlendMode::ColorDodge => {
            if c >= 1.0 {
                1.0
            } else {
                (g / (1.0 - c)).clamp(0.0, 1.0)
            }
        }
        BlendMode::Darken => g.min(c),
        BlendMode::Lighten => g.max(c),
        BlendMode::Normal => c,
    }
}

/// Full per-channel transform: blend, contrast, then opacity mix.
fn tint_channel(g: f32, c: f32, settings: &WineSettings) -> f32 {
    let blended = blend_channel(settings.blend_mode, g, c);
    let contrasted = ((blended - 0.5) * settings.contrast + 0.5).clamp(0.0, 1.0);
    g * (1.0 - settings.opacity) + contrasted * settings.opacity
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Tint a liquid mask with `color`.
///
/// # Errors
///
/// Returns [`Error::Input`] if the mask has no pixels, or if opacity is
/// outside `[0, 1]` or contrast is negative or non-finite.
#[tracing::instrument(skip(mask), fields(w = mask.width(), h = mask.height()))]
pub fn recolor_liquid(
    mask: &RasterImage,
    color: Rgb<u8>,
    settings: &WineSettings,
) -> Result<RasterImage> {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return Err(Error::input(format!("liquid mask has no pixels ({w}x{h})")));
    }
    settings.validate()?;

    let target = [
        f32::from(color[0]) / 255.0,
        f32::from(color[1]) / 255.0,
        f32::from(color[2]) / 255.0,
    ];

    let mut out = mask.clone();
    for_each_pixel_mut(&mut out, |px| {
        if px[3] == 0 {
            return;
        }
        let g = luminance(&image::Rgba([px[0], px[1], px[2], px[3]])) / 255.0;
        for (ch, &c) in px.iter_mut().zip(&target) {
            *ch = to_u8(tint_channel(g, c, settings));
        }
    });

    Ok(out)
}

/// Parse `#rrggbb` or `rrggbb` into a color.
///
/// # Errors
///
/// Returns [`Error::Input`] for anything else.
pub fn parse_hex_color(s: &str) -> Result<Rgb<u8>> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::input(format!("expected a #rrggbb color, got {s:?}")));
    }
    let channel = |i: usize| {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|e| Error::input(format!("bad color {s:?}: {e}")))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}
