//! Curved label outline and clipping.
//!
//! The outline is a closed path: a quadratic Bezier across the top from
//! `(0, top_start)` to `(width, top_start)`, straight sides, and a quadratic
//! Bezier back across the bottom between the two lifted bottom corners. Both
//! control points sit at `x = width / 2`, so the curves are single-valued in `x`
//! and the parameter is simply `t = x / width`.

use crate::parallel::{for_each_row_mut, CHANNELS};
use crate::raster::RasterImage;

/// Label outline in output-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Silhouette {
    width: f32,
    top_start: f32,
    top_control: f32,
    bottom_corner: f32,
    bottom_control: f32,
}

impl Silhouette {
    /// Build the outline for a label of `width` whose unpadded content spans
    /// rows `top_start..bottom_edge`.
    ///
    /// The top control point is offset by `-top_curve`. The bottom corners are
    /// lifted by `bottom_curve * corner_shift` and the bottom control point sits
    /// `bottom_curve` below them.
    #[must_use]
    pub fn new(
        width: u32,
        top_start: f32,
        bottom_edge: f32,
        top_curve: f32,
        bottom_curve: f32,
        corner_shift: f32,
    ) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let width = width as f32;
        let bottom_corner = bottom_edge - bottom_curve * corner_shift;
        Self {
            width,
            top_start,
            top_control: top_start - top_curve,
            bottom_corner,
            bottom_control: bottom_corner + bottom_curve,
        }
    }

    /// Y coordinate of the top control point.
    #[must_use]
    pub fn top_control(&self) -> f32 {
        self.top_control
    }

    /// Y coordinate of the bottom control point.
    #[must_use]
    pub fn bottom_control(&self) -> f32 {
        self.bottom_control
    }

    /// Y coordinate of both bottom side corners.
    #[must_use]
    pub fn bottom_corner(&self) -> f32 {
        self.bottom_corner
    }

    /// Top boundary at horizontal position `x`.
    #[must_use]
    pub fn top_at(&self, x: f32) -> f32 {
        quad_y(self.top_start, self.top_control, self.top_start, self.t(x))
    }

    /// Bottom boundary at horizontal position `x`.
    #[must_use]
    pub fn bottom_at(&self, x: f32) -> f32 {
        quad_y(
            self.bottom_corner,
            self.bottom_control,
            self.bottom_corner,
            self.t(x),
        )
    }

    /// Fraction of pixel `(x, y)` inside the outline, sampled at the column centre.
    #[must_use]
    pub fn coverage(&self, x: u32, y: u32) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let (xc, y0) = (x as f32 + 0.5, y as f32);
        vertical_overlap(y0, self.top_at(xc), self.bottom_at(xc))
    }

    /// Return a copy of `img` with alpha scaled by outline coverage.
    ///
    /// Edges are anti-aliased along the vertical axis. Pixels fully outside
    /// the outline become transparent black.
    #[must_use]
    pub fn clip(&self, img: &RasterImage) -> RasterImage {
        let mut out = img.clone();
        let width = out.width();

        // Column boundaries are shared by every row.
        let bounds: Vec<(f32, f32)> = (0..width)
            .map(|x| {
                #[allow(clippy::cast_precision_loss)]
                let xc = x as f32 + 0.5;
                (self.top_at(xc), self.bottom_at(xc))
            })
            .collect();

        for_each_row_mut(&mut out, width, |y, row| {
            #[allow(clippy::cast_precision_loss)]
            let y0 = y as f32;
            for (px, &(top, bottom)) in row.chunks_exact_mut(CHANNELS).zip(&bounds) {
                let cov = vertical_overlap(y0, top, bottom);
                if cov >= 1.0 {
                    continue;
                }
                if cov <= 0.0 {
                    px.fill(0);
                    continue;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    px[3] = (f32::from(px[3]) * cov).round().clamp(0.0, 255.0) as u8;
                }
            }
        });

        out
    }

    fn t(&self, x: f32) -> f32 {
        if self.width <= 0.0 {
            0.0
        } else {
            (x / self.width).clamp(0.0, 1.0)
        }
    }
}

/// Quadratic Bezier y at parameter `t` with end points `p0`, `p2` and control `p1`.
fn quad_y(p0: f32, p1: f32, p2: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * p0 + 2.0 * u * t * p1 + t * t * p2
}

/// Length of `[y0, y0 + 1] ∩ [top, bottom]`.
fn vertical_overlap(y0: f32, top: f32, bottom: f32) -> f32 {
    ((y0 + 1.0).min(bottom) - y0.max(top)).clamp(0.0, 1.0)
}
