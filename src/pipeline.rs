//! Pipeline entry point tying cropping, warping and caching together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::cache::{LabelCache, ProcessedLabelKey, SourceFingerprint};
use crate::config::PipelineConfig;
use crate::detection::detect_and_crop;
use crate::error::Result;
use crate::raster::RasterImage;
use crate::warp::{warp_label, CurvatureSpec, ProgressEvent, WarpOptions};

/// Owns the configuration and the processed-label cache for one editing session.
///
/// Create once and share; every method takes `&self` and the type is
/// `Send + Sync`.
#[derive(Debug, Default)]
pub struct LabelPipeline {
    config: PipelineConfig,
    cache: LabelCache,
}

impl LabelPipeline {
    /// Create a pipeline with an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if `config` fails validation.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: LabelCache::new(),
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The processed-label cache.
    #[must_use]
    pub fn cache(&self) -> &LabelCache {
        &self.cache
    }

    /// Remove print bleed from a rasterized document page.
    #[must_use]
    pub fn crop_page(&self, page: &RasterImage) -> RasterImage {
        detect_and_crop(page, &self.config.detector)
    }

    /// Warp label artwork for the bottle outline `bottle`, reusing a cached
    /// result when the same artwork and parameters were processed before.
    ///
    /// A cache hit reports a single 100% event.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Warp`] if a warp phase fails. Nothing is cached
    /// in that case.
    pub fn process_label<F>(
        &self,
        source: &RasterImage,
        bottle: &str,
        curvature: CurvatureSpec,
        options: WarpOptions,
        mut on_progress: F,
    ) -> Result<Arc<RasterImage>>
    where
        F: FnMut(&ProgressEvent),
    {
        let key = ProcessedLabelKey::new(SourceFingerprint::of(source), bottle, curvature, options);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(bottle, "processed label served from cache");
            on_progress(&ProgressEvent::done());
            return Ok(hit);
        }

        let label = warp_label(
            source,
            curvature,
            options,
            &self.config.warp,
            &mut on_progress,
        )?;
        Ok(self.cache.insert(key, label))
    }

    /// Crop a rasterized print page, then warp it like [`Self::process_label`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Warp`] if a warp phase fails.
    pub fn process_document_page<F>(
        &self,
        page: &RasterImage,
        bottle: &str,
        curvature: CurvatureSpec,
        options: WarpOptions,
        mut on_progress: F,
    ) -> Result<Arc<RasterImage>>
    where
        F: FnMut(&ProgressEvent),
    {
        let cropped = self.crop_page(page);
        on_progress(&ProgressEvent::new(5, "print marks checked"));
        self.process_label(&cropped, bottle, curvature, options, on_progress)
    }
}

/// Ticket identifying one request against a [`LatestRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

/// Last-write-wins guard for one label target.
///
/// Each new request takes a ticket; when its result arrives it is accepted
/// only if no newer ticket has been issued in the meantime.
#[derive(Debug, Default)]
pub struct LatestRequest {
    latest: AtomicU64,
}

impl LatestRequest {
    /// Create a guard with no requests issued.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request, superseding all earlier ones.
    pub fn begin(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Whether `ticket` is still the newest request.
    #[must_use]
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::Acquire) == ticket.0
    }

    /// Pass `result` through if `ticket` is current, drop it otherwise.
    pub fn accept<T>(&self, ticket: RequestTicket, result: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(result)
        } else {
            tracing::debug!(ticket = ticket.0, "discarding superseded result");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[allow(clippy::cast_possible_truncation)]
    fn artwork() -> RasterImage {
        RasterImage::from_fn(30, 60, |x, y| Rgba([(x * 8) as u8, (y * 4) as u8, 128, 255]))
    }

    #[test]
    fn pipeline_rejects_invalid_config() {
        let mut cfg = PipelineConfig::default();
        cfg.warp.target_height = 0;
        assert!(LabelPipeline::new(cfg).is_err());
    }

    #[test]
    fn second_identical_request_is_a_cache_hit() {
        let pipeline = LabelPipeline::new(PipelineConfig::default()).unwrap();
        let src = artwork();
        let curvature = CurvatureSpec::new(4.0, 8.0);

        let mut first_events = Vec::new();
        let first = pipeline
            .process_label(&src, "bordeaux", curvature, WarpOptions::default(), |e| {
                first_events.push(e.percent);
            })
            .unwrap();
        assert!(first_events.len() > 1);

        let mut second_events = Vec::new();
        let second = pipeline
            .process_label(&src, "bordeaux", curvature, WarpOptions::default(), |e| {
                second_events.push(e.percent);
            })
            .unwrap();

        assert_eq!(second_events, vec![100]);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(pipeline.cache().len(), 1);
    }

    #[test]
    fn different_bottle_misses_cache() {
        let pipeline = LabelPipeline::default();
        let src = artwork();
        let c = CurvatureSpec::new(4.0, 8.0);
        pipeline
            .process_label(&src, "bordeaux", c, WarpOptions::default(), |_| {})
            .unwrap();
        pipeline
            .process_label(&src, "burgundy", c, WarpOptions::default(), |_| {})
            .unwrap();
        assert_eq!(pipeline.cache().len(), 2);
    }

    #[test]
    fn failed_warp_is_not_cached() {
        let pipeline = LabelPipeline::default();
        let empty = RasterImage::new(0, 0);
        let result = pipeline.process_label(
            &empty,
            "bordeaux",
            CurvatureSpec::default(),
            WarpOptions::default(),
            |_| {},
        );
        assert!(result.is_err());
        assert!(pipeline.cache().is_empty());
    }

    #[test]
    fn document_page_progress_starts_with_crop() {
        let pipeline = LabelPipeline::default();
        let page = RasterImage::from_pixel(80, 120, Rgba([250, 250, 250, 255]));
        let mut events = Vec::new();
        let out = pipeline
            .process_document_page(
                &page,
                "bordeaux",
                CurvatureSpec::default(),
                WarpOptions::default(),
                |e| events.push(e.percent),
            )
            .unwrap();
        assert_eq!(events.first(), Some(&5));
        assert_eq!(events.last(), Some(&100));
        assert_eq!(out.height(), pipeline.config().warp.output_height());
    }

    #[test]
    fn latest_request_wins() {
        let guard = LatestRequest::new();
        let stale = guard.begin();
        let fresh = guard.begin();
        assert!(stale < fresh);
        assert!(!guard.is_current(stale));
        assert_eq!(guard.accept(stale, "old"), None);
        assert_eq!(guard.accept(fresh, "new"), Some("new"));
    }
}
