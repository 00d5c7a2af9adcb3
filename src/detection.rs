//! Registration-mark detection and bleed cropping for rasterized print pages.
//!
//! The detector looks for printer crop marks near the page origin:
//! 1. **Outer mark**: the first dark run along the top row, within the scan depth
//! 2. **Inner mark**: a second dark run in a window past the outer one; when
//!    present it marks the trim line and wins over the outer (bleed) mark
//! 3. **Column fallback**: the same search down the left column
//!
//! The margin found is applied to all four sides. A crop that would keep less
//! than the configured share of the page is treated as a false positive and the
//! page is returned unchanged. Nothing here fails: the worst case is the
//! original page.

use image::imageops;

use crate::config::DetectorConfig;
use crate::raster::{luminance, RasterImage};

/// Confidence reported when an inner (trim) mark was found.
const INNER_MARK_CONFIDENCE: f32 = 0.9;
/// Confidence reported when only the outer mark was found.
const OUTER_MARK_CONFIDENCE: f32 = 0.6;
/// Pixels more transparent than this never count as ink.
const MIN_INK_ALPHA: u8 = 128;

/// Crop rectangle computed for one page.
///
/// `right` and `bottom` are exclusive coordinates, not distances from the edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropMargins {
    /// First retained column.
    pub left: u32,
    /// One past the last retained column.
    pub right: u32,
    /// First retained row.
    pub top: u32,
    /// One past the last retained row.
    pub bottom: u32,
    /// Whether a registration mark was found.
    pub detected: bool,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

impl CropMargins {
    /// Margins that keep the whole page.
    #[must_use]
    pub fn full_page(width: u32, height: u32) -> Self {
        Self {
            left: 0,
            right: width,
            top: 0,
            bottom: height,
            detected: false,
            confidence: 0.0,
        }
    }

    /// Apply one margin to all four sides.
    #[must_use]
    pub fn symmetric(margin: u32, width: u32, height: u32, confidence: f32) -> Self {
        Self {
            left: margin,
            right: width.saturating_sub(margin),
            top: margin,
            bottom: height.saturating_sub(margin),
            detected: true,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Retained width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Retained height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    /// Smaller of the retained width and height fractions.
    #[must_use]
    pub fn retained_ratio(&self, width: u32, height: u32) -> f32 {
        if width == 0 || height == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let (rw, rh) = (
            self.width() as f32 / width as f32,
            self.height() as f32 / height as f32,
        );
        rw.min(rh)
    }
}

/// Direction a mark search runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanAxis {
    /// Horizontal runs, starting on the top row.
    Row,
    /// Vertical runs, starting on the left column.
    Column,
}

/// Marks located on one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkPositions {
    /// Axis the marks were found on.
    pub axis: ScanAxis,
    /// Outer (bleed) mark offset from the page edge.
    pub outer: u32,
    /// Inner (trim) mark offset, if one was found.
    pub inner: Option<u32>,
}

impl MarkPositions {
    /// Offset to crop at: the inner mark when present, else the outer one.
    #[must_use]
    pub fn margin(&self) -> u32 {
        self.inner.unwrap_or(self.outer)
    }

    fn confidence(&self) -> f32 {
        if self.inner.is_some() {
            INNER_MARK_CONFIDENCE
        } else {
            OUTER_MARK_CONFIDENCE
        }
    }
}

/// Read-only view of a page along one scan axis.
struct AxisView<'a> {
    page: &'a RasterImage,
    axis: ScanAxis,
    dark_threshold: f32,
}

impl AxisView<'_> {
    /// Page extent along the scan direction.
    fn len(&self) -> u32 {
        match self.axis {
            ScanAxis::Row => self.page.width(),
            ScanAxis::Column => self.page.height(),
        }
    }

    /// Page extent across the scan direction.
    fn depth(&self) -> u32 {
        match self.axis {
            ScanAxis::Row => self.page.height(),
            ScanAxis::Column => self.page.width(),
        }
    }

    fn is_dark(&self, along: u32, across: u32) -> bool {
        let (x, y) = match self.axis {
            ScanAxis::Row => (along, across),
            ScanAxis::Column => (across, along),
        };
        let px = self.page.get_pixel(x, y);
        px[3] >= MIN_INK_ALPHA && luminance(px) < self.dark_threshold
    }

    /// A dark run starts at `along`: the pixel is dark, its predecessor is not,
    /// and enough of the following window is dark.
    fn starts_run(&self, along: u32, across: u32, cfg: &DetectorConfig) -> bool {
        if !self.is_dark(along, across) {
            return false;
        }
        if along > 0 && self.is_dark(along - 1, across) {
            return false;
        }
        let end = along.saturating_add(cfg.min_line_length).min(self.len());
        let dark = (along..end).filter(|&a| self.is_dark(a, across)).count();
        #[allow(clippy::cast_precision_loss)]
        let ratio = dark as f32 / cfg.min_line_length as f32;
        ratio >= cfg.min_dark_ratio
    }

    fn find_outer(&self, cfg: &DetectorConfig) -> Option<u32> {
        if self.depth() == 0 {
            return None;
        }
        let limit = cfg.scan_depth.min(self.len() / 2);
        (0..limit).find(|&a| self.starts_run(a, 0, cfg))
    }

    /// Search the window past the outer mark, nearest rows first.
    ///
    /// The window spans `outer + offset ..= outer + offset + range` along the
    /// axis and rows `0 ..= offset + range` across it, so a trim mark drawn on
    /// the same line as the bleed mark is found too.
    fn find_inner(&self, outer: u32, cfg: &DetectorConfig) -> Option<u32> {
        let start = outer.saturating_add(cfg.inner_offset);
        let end = start
            .saturating_add(cfg.inner_range)
            .min(self.len().saturating_sub(1));
        let across_end = cfg
            .inner_offset
            .saturating_add(cfg.inner_range)
            .min(self.depth().saturating_sub(1));
        if start > end {
            return None;
        }
        (0..=across_end).find_map(|across| (start..=end).find(|&a| self.starts_run(a, across, cfg)))
    }
}

/// Locate registration marks near the page origin.
///
/// Tries the top row first and falls back to the left column.
#[must_use]
pub fn find_marks(page: &RasterImage, cfg: &DetectorConfig) -> Option<MarkPositions> {
    [ScanAxis::Row, ScanAxis::Column].into_iter().find_map(|axis| {
        let view = AxisView {
            page,
            axis,
            dark_threshold: f32::from(cfg.dark_threshold),
        };
        let outer = view.find_outer(cfg)?;
        let inner = view.find_inner(outer, cfg);
        Some(MarkPositions { axis, outer, inner })
    })
}

/// Compute crop margins for a page.
///
/// Returns [`CropMargins::full_page`] when no mark is found. The safety check
/// on retained area is applied by [`crop_to_margins`], not here.
#[must_use]
pub fn detect_marks(page: &RasterImage, cfg: &DetectorConfig) -> CropMargins {
    let (w, h) = page.dimensions();
    match find_marks(page, cfg) {
        Some(marks) => {
            tracing::debug!(
                axis = ?marks.axis,
                outer = marks.outer,
                inner = ?marks.inner,
                "registration marks found"
            );
            CropMargins::symmetric(marks.margin(), w, h, marks.confidence())
        }
        None => CropMargins::full_page(w, h),
    }
}

/// Crop a page to `margins`, or return it unchanged when the crop is unsafe.
///
/// A crop is unsafe when nothing was detected, or when it would keep less
/// than `cfg.min_retained_ratio` of the width or height.
#[must_use]
pub fn crop_to_margins(
    page: &RasterImage,
    margins: &CropMargins,
    cfg: &DetectorConfig,
) -> RasterImage {
    let (w, h) = page.dimensions();
    if !margins.detected {
        tracing::debug!(w, h, "no registration marks, page kept as is");
        return page.clone();
    }

    let retained = margins.retained_ratio(w, h);
    if retained < cfg.min_retained_ratio {
        tracing::warn!(
            margin = margins.left,
            retained,
            min = cfg.min_retained_ratio,
            "crop rejected as false positive, page kept as is"
        );
        return page.clone();
    }

    tracing::info!(
        margin = margins.left,
        confidence = margins.confidence,
        "cropping bleed at registration marks"
    );
    imageops::crop_imm(page, margins.left, margins.top, margins.width(), margins.height())
        .to_image()
}

/// Detect registration marks and crop the bleed.
#[must_use]
#[tracing::instrument(skip_all, fields(w = page.width(), h = page.height()))]
pub fn detect_and_crop(page: &RasterImage, cfg: &DetectorConfig) -> RasterImage {
    let margins = detect_marks(page, cfg);
    crop_to_margins(page, &margins, cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn blank(w: u32, h: u32) -> RasterImage {
        RasterImage::from_pixel(w, h, WHITE)
    }

    fn hline(page: &mut RasterImage, y: u32, xs: std::ops::Range<u32>) {
        for x in xs {
            page.put_pixel(x, y, BLACK);
        }
    }

    fn vline(page: &mut RasterImage, x: u32, ys: std::ops::Range<u32>) {
        for y in ys {
            page.put_pixel(x, y, BLACK);
        }
    }

    #[test]
    fn symmetric_margins_and_retained_ratio() {
        let m = CropMargins::symmetric(25, 200, 100, 0.9);
        assert_eq!((m.left, m.right, m.top, m.bottom), (25, 175, 25, 75));
        assert!((m.retained_ratio(200, 100) - 0.5).abs() < 1e-6);

        let oversized = CropMargins::symmetric(80, 100, 100, 0.9);
        assert_eq!(oversized.width(), 0);
        assert!(oversized.retained_ratio(100, 100).abs() < 1e-6);
    }

    #[test]
    fn blank_page_has_no_marks() {
        let page = blank(120, 90);
        let cfg = DetectorConfig::default();
        assert!(find_marks(&page, &cfg).is_none());
        let m = detect_marks(&page, &cfg);
        assert!(!m.detected);
        assert_eq!(m, CropMargins::full_page(120, 90));
    }

    #[test]
    fn inner_mark_wins_over_outer_mark() {
        let mut page = blank(400, 400);
        hline(&mut page, 0, 12..18);
        hline(&mut page, 0, 34..44);
        let marks = find_marks(&page, &DetectorConfig::default()).unwrap();
        assert_eq!(marks.axis, ScanAxis::Row);
        assert_eq!(marks.outer, 12);
        assert_eq!(marks.inner, Some(34));
        assert_eq!(marks.margin(), 34);
    }

    #[test]
    fn inner_mark_found_on_lower_row() {
        let mut page = blank(400, 400);
        hline(&mut page, 0, 20..26);
        hline(&mut page, 30, 45..60);
        let marks = find_marks(&page, &DetectorConfig::default()).unwrap();
        assert_eq!(marks.inner, Some(45));
    }

    #[test]
    fn long_outer_run_is_not_mistaken_for_inner_mark() {
        let mut page = blank(400, 400);
        hline(&mut page, 0, 10..60);
        let marks = find_marks(&page, &DetectorConfig::default()).unwrap();
        assert_eq!(marks.outer, 10);
        assert_eq!(marks.inner, None);
    }

    #[test]
    fn sparse_noise_is_not_a_mark() {
        let mut page = blank(300, 300);
        // Isolated dark pixels: 1/8 dark ratio, below the threshold.
        for x in (5..140).step_by(9) {
            page.put_pixel(x, 0, BLACK);
        }
        assert!(find_marks(&page, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn falls_back_to_left_column() {
        let mut page = blank(200, 200);
        vline(&mut page, 0, 20..30);
        let marks = find_marks(&page, &DetectorConfig::default()).unwrap();
        assert_eq!(marks.axis, ScanAxis::Column);
        assert_eq!(marks.margin(), 20);

        let out = detect_and_crop(&page, &DetectorConfig::default());
        assert_eq!(out.dimensions(), (160, 160));
    }

    #[test]
    fn marks_beyond_half_the_page_are_ignored() {
        let mut page = blank(60, 60);
        hline(&mut page, 0, 35..45);
        assert!(find_marks(&page, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn transparent_ink_is_ignored() {
        let mut page = blank(200, 200);
        for x in 10..20 {
            page.put_pixel(x, 0, Rgba([0, 0, 0, 0]));
        }
        assert!(find_marks(&page, &DetectorConfig::default()).is_none());
    }

    #[test]
    fn crop_keeps_expected_region() {
        let mut page = blank(400, 400);
        hline(&mut page, 0, 12..18);
        hline(&mut page, 0, 34..44);
        page.put_pixel(34, 34, Rgba([1, 2, 3, 255]));

        let out = detect_and_crop(&page, &DetectorConfig::default());
        assert_eq!(out.dimensions(), (332, 332));
        assert_eq!(*out.get_pixel(0, 0), Rgba([1, 2, 3, 255]));
    }

    #[test]
    fn crop_below_retained_floor_returns_original() {
        let mut page = blank(100, 100);
        hline(&mut page, 0, 30..40);
        let cfg = DetectorConfig::default();
        let m = detect_marks(&page, &cfg);
        assert!(m.detected);
        assert!(m.retained_ratio(100, 100) < cfg.min_retained_ratio);
        assert_eq!(detect_and_crop(&page, &cfg), page);
    }

    #[test]
    fn retained_floor_is_overridable() {
        let mut page = blank(100, 100);
        hline(&mut page, 0, 30..40);
        let cfg = DetectorConfig {
            min_retained_ratio: 0.3,
            ..DetectorConfig::default()
        };
        assert_eq!(detect_and_crop(&page, &cfg).dimensions(), (40, 40));
    }
}
