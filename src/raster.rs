//! Raster type, decoding and file helpers shared by every pipeline stage.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, Rgba, Rgba32FImage, RgbaImage};

use crate::error::{Error, Result};

/// An RGBA raster. Each pipeline stage returns a fresh one.
pub type RasterImage = RgbaImage;

/// Perceived luminance of a pixel in `[0, 255]`.
///
/// Uses the Rec. 601 weights `0.299*R + 0.587*G + 0.114*B`.
#[must_use]
pub fn luminance(px: &Rgba<u8>) -> f32 {
    0.299 * f32::from(px[0]) + 0.587 * f32::from(px[1]) + 0.114 * f32::from(px[2])
}

/// Premultiplied `f32` copy of `img` with every channel in `[0, 1]`.
///
/// Filters must run on premultiplied samples, otherwise the color stored in
/// fully transparent pixels bleeds into their opaque neighbours.
pub(crate) fn premultiply(img: &RasterImage) -> Rgba32FImage {
    let mut out = Rgba32FImage::new(img.width(), img.height());
    for (dst, src) in out.pixels_mut().zip(img.pixels()) {
        let a = f32::from(src[3]) / 255.0;
        *dst = Rgba([
            f32::from(src[0]) / 255.0 * a,
            f32::from(src[1]) / 255.0 * a,
            f32::from(src[2]) / 255.0 * a,
            a,
        ]);
    }
    out
}

/// Inverse of [`premultiply`].
pub(crate) fn unpremultiply(img: &Rgba32FImage) -> RasterImage {
    let mut out = RasterImage::new(img.width(), img.height());
    for (dst, src) in out.pixels_mut().zip(img.pixels()) {
        *dst = straight_rgba(src.0);
    }
    out
}

/// Convert one premultiplied sample back to straight 8-bit RGBA.
///
/// A sample whose alpha rounds to zero becomes `[0, 0, 0, 0]`.
pub(crate) fn straight_rgba(px: [f32; 4]) -> Rgba<u8> {
    let a = px[3].clamp(0.0, 1.0);
    let alpha = unit_to_byte(a);
    if alpha == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let color = |c: f32| unit_to_byte((c / a).clamp(0.0, 1.0));
    Rgba([color(px[0]), color(px[1]), color(px[2]), alpha])
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_byte(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Decode an in-memory image of any supported format into RGBA.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the bytes are not a readable image.
pub fn decode(bytes: &[u8]) -> Result<RasterImage> {
    let img = image::load_from_memory(bytes).map_err(Error::Decode)?;
    Ok(img.to_rgba8())
}

/// Load an image file into RGBA.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read and [`Error::Decode`] if its
/// content is not a readable image.
pub fn open(path: &Path) -> Result<RasterImage> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Save a raster, choosing the encoder from the file extension.
///
/// PNG, WebP and BMP keep the alpha channel. JPEG has none, so the raster is
/// flattened to RGB and written at quality 100. Missing parent directories are
/// created.
///
/// # Errors
///
/// Returns an error if the format is unsupported or writing fails.
pub fn save(img: &RasterImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }

    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            let file = std::fs::File::create(path)?;
            let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(file, 100);
            encoder.encode_image(&rgb)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.save(path)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }

    Ok(())
}

/// Generate a default output path from an input path.
///
/// The output is always PNG so transparency survives.
/// Example: `"artwork.jpg"` with suffix `"label"` becomes `"artwork_label.png"`.
#[must_use]
pub fn default_output_path(input: &Path, suffix: &str) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_{suffix}.png"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premultiplied_round_trip_keeps_visible_pixels() {
        let img = RasterImage::from_fn(3, 1, |x, _| match x {
            0 => Rgba([200, 100, 50, 255]),
            1 => Rgba([255, 255, 255, 128]),
            _ => Rgba([90, 90, 90, 0]),
        });
        let back = unpremultiply(&premultiply(&img));
        assert_eq!(back.get_pixel(0, 0), img.get_pixel(0, 0));
        assert_eq!(back.get_pixel(1, 0), img.get_pixel(1, 0));
        assert_eq!(back.get_pixel(2, 0), &Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn luminance_of_gray_is_identity() {
        for v in [0u8, 1, 127, 128, 254, 255] {
            let lum = luminance(&Rgba([v, v, v, 255]));
            assert!((lum - f32::from(v)).abs() < 1e-3, "{v} -> {lum}");
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "{err:?}");
    }

    #[test]
    fn decode_reads_encoded_png() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, img);
    }

    #[test]
    fn default_output_path_uses_png_suffix() {
        let p = default_output_path(Path::new("/tmp/artwork.jpg"), "label");
        assert_eq!(p, PathBuf::from("/tmp/artwork_label.png"));

        let p = default_output_path(Path::new("mask.png"), "wine");
        assert_eq!(p.file_name().unwrap().to_str().unwrap(), "mask_wine.png");
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("label.jpg")));
        assert!(is_supported_image(Path::new("label.JPEG")));
        assert!(is_supported_image(Path::new("label.png")));
        assert!(is_supported_image(Path::new("label.webp")));
        assert!(is_supported_image(Path::new("label.bmp")));
        assert!(!is_supported_image(Path::new("label.pdf")));
        assert!(!is_supported_image(Path::new("label")));
    }

    #[test]
    fn save_rejects_unknown_extension() {
        let img = RgbaImage::new(1, 1);
        let err = save(&img, Path::new("out.unknownext")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)), "{err:?}");
    }
}
