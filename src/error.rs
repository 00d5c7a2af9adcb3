//! Error types for the label-raster crate.

use crate::warp::WarpStep;

/// Errors that can occur while preparing label and liquid rasters.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source bytes could not be interpreted as a raster image.
    #[error("failed to decode source image: {0}")]
    Decode(image::ImageError),

    /// A warp phase failed; the caller keeps whatever label it displayed before.
    #[error("label warp failed during {step}: {reason}")]
    Warp {
        /// Phase that was running when the failure occurred.
        step: WarpStep,
        /// Human-readable cause.
        reason: String,
    },

    /// Malformed input handed to a pure raster operation.
    #[error("invalid input: {0}")]
    Input(String),

    /// Configuration could not be parsed or holds out-of-range values.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The image format is not supported.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// An error occurred while encoding or saving an image.
    #[error("image processing error: {0}")]
    Image(#[from] image::ImageError),
}

impl Error {
    pub(crate) fn warp(step: WarpStep, reason: impl Into<String>) -> Self {
        Self::Warp {
            step,
            reason: reason.into(),
        }
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
