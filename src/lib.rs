//! Label raster pipeline for bottle configurators.
//!
//! Turns uploaded label artwork into a curved, print-safe label raster and
//! tints the liquid layer seen through the bottle. Three stages, each usable on
//! its own:
//!
//! - [`warp`]: normalize artwork to a fixed height, optionally bulge it
//!   pseudo-cylindrically, and clip it to the bottle's curved label outline.
//! - [`detection`]: find printer registration marks on a rasterized print page
//!   and crop the bleed, falling back to the uncropped page when unsure.
//! - [`compositor`]: recolor a grayscale liquid mask with a wine color, blend
//!   mode, contrast and opacity.
//!
//! # Quick Start
//!
//! ```no_run
//! use label_raster::{CurvatureSpec, LabelPipeline, PipelineConfig, WarpOptions};
//!
//! let pipeline = LabelPipeline::new(PipelineConfig::default()).expect("valid config");
//! let artwork = label_raster::raster::open("label.png".as_ref()).unwrap();
//! let label = pipeline
//!     .process_label(
//!         &artwork,
//!         "bordeaux-750",
//!         CurvatureSpec::new(-5.0, 10.0),
//!         WarpOptions { enhanced: true, vertical_intensity: 1.0 },
//!         |p| println!("{:>3}% {}", p.percent, p.message),
//!     )
//!     .unwrap();
//! label_raster::raster::save(&label, "label_curved.png".as_ref()).unwrap();
//! ```
//!
//! # Liquid color
//!
//! ```no_run
//! use image::Rgb;
//! use label_raster::{recolor_liquid, BlendMode, WineSettings};
//!
//! let mask = label_raster::raster::open("liquid.png".as_ref()).unwrap();
//! let settings = WineSettings { opacity: 0.9, contrast: 1.2, blend_mode: BlendMode::Multiply };
//! let wine = recolor_liquid(&mask, Rgb([114, 47, 55]), &settings).unwrap();
//! ```

#![deny(missing_docs)]

pub mod cache;
pub mod compositor;
pub mod config;
pub mod detection;
pub mod error;
mod parallel;
mod pipeline;
pub mod raster;
pub mod silhouette;
pub mod warp;

pub use cache::{LabelCache, ProcessedLabelKey, SourceFingerprint};
pub use compositor::{blend_channel, parse_hex_color, recolor_liquid, BlendMode, WineSettings};
pub use config::{DetectorConfig, PipelineConfig, WarpConfig};
pub use detection::{crop_to_margins, detect_and_crop, detect_marks, CropMargins};
pub use error::{Error, Result};
pub use pipeline::{LabelPipeline, LatestRequest, RequestTicket};
pub use raster::RasterImage;
pub use warp::{warp_label, CurvatureSpec, ProgressEvent, WarpJob, WarpOptions, WarpStep};
