//! Session cache of warped labels.
//!
//! Entries are keyed by the artwork content, the bottle outline and every warp
//! parameter, and live until the cache is dropped or cleared. There is no
//! eviction: the key space is bounded by the artwork/bottle combinations one
//! editing session tries.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::raster::RasterImage;
use crate::warp::{CurvatureSpec, WarpOptions};

/// 128-bit content fingerprint of a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceFingerprint {
    /// High half.
    pub hi: u64,
    /// Low half.
    pub lo: u64,
}

impl SourceFingerprint {
    /// Fingerprint the dimensions and pixel bytes of `img`.
    #[must_use]
    pub fn of(img: &RasterImage) -> Self {
        let mut a = Fnv1a64::new(0xcbf2_9ce4_8422_2325);
        let mut b = Fnv1a64::new(0x9ae1_6a3b_2f90_404f);
        for v in [img.width(), img.height()] {
            a.write(&v.to_le_bytes());
            b.write(&v.to_le_bytes());
        }
        a.write(img.as_raw());
        b.write(img.as_raw());
        Self {
            hi: a.finish(),
            lo: b.finish(),
        }
    }
}

/// Identity of one processed label.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProcessedLabelKey {
    source: SourceFingerprint,
    bottle: String,
    top_curve: u32,
    bottom_curve: u32,
    enhanced: bool,
    vertical_intensity: u32,
}

impl ProcessedLabelKey {
    /// Build a key. `-0.0` and `0.0` map to the same entry.
    #[must_use]
    pub fn new(
        source: SourceFingerprint,
        bottle: impl Into<String>,
        curvature: CurvatureSpec,
        options: WarpOptions,
    ) -> Self {
        Self {
            source,
            bottle: bottle.into(),
            top_curve: float_key(curvature.top_curve),
            bottom_curve: float_key(curvature.bottom_curve),
            enhanced: options.enhanced,
            vertical_intensity: float_key(options.vertical_intensity),
        }
    }

    /// Content fingerprint of the source artwork.
    #[must_use]
    pub fn source(&self) -> SourceFingerprint {
        self.source
    }

    /// Bottle outline identifier.
    #[must_use]
    pub fn bottle(&self) -> &str {
        &self.bottle
    }
}

fn float_key(v: f32) -> u32 {
    (v + 0.0).to_bits()
}

/// Thread-safe map from [`ProcessedLabelKey`] to a finished label.
#[derive(Debug, Default)]
pub struct LabelCache {
    entries: RwLock<HashMap<ProcessedLabelKey, Arc<RasterImage>>>,
}

impl LabelCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a finished label.
    #[must_use]
    pub fn get(&self, key: &ProcessedLabelKey) -> Option<Arc<RasterImage>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    /// Store a label and return the stored entry.
    ///
    /// If another writer stored the same key first, that entry is kept and
    /// returned.
    pub fn insert(&self, key: ProcessedLabelKey, label: RasterImage) -> Arc<RasterImage> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(key).or_insert_with(|| Arc::new(label)))
    }

    /// Number of stored labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

struct Fnv1a64 {
    state: u64,
}

impl Fnv1a64 {
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    fn new(offset_basis: u64) -> Self {
        Self {
            state: offset_basis,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state ^= u64::from(b);
            self.state = self.state.wrapping_mul(Self::PRIME);
        }
    }

    fn finish(&self) -> u64 {
        self.state
    }
}
