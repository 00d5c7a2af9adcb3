use image::{Rgb, Rgba};
use label_raster::config::{EXTRA_BOTTOM_SPACE, EXTRA_TOP_SPACE, TARGET_HEIGHT};
use label_raster::{
    detect_and_crop, recolor_liquid, warp_label, BlendMode, CurvatureSpec, DetectorConfig,
    LabelPipeline, PipelineConfig, RasterImage, WarpConfig, WarpJob, WarpOptions, WineSettings,
};

#[allow(clippy::cast_possible_truncation)]
fn artwork(w: u32, h: u32) -> RasterImage {
    RasterImage::from_fn(w, h, |x, y| {
        Rgba([
            (x * 255 / w) as u8,
            (y * 255 / h) as u8,
            ((x + y) % 256) as u8,
            255,
        ])
    })
}

fn warp(src: &RasterImage, c: CurvatureSpec, enhanced: bool) -> RasterImage {
    warp_label(
        src,
        c,
        WarpOptions {
            enhanced,
            vertical_intensity: 1.0,
        },
        &WarpConfig::default(),
        |_| {},
    )
    .unwrap()
}

#[test]
fn output_height_is_independent_of_source_resolution() {
    let expected = TARGET_HEIGHT + EXTRA_TOP_SPACE + EXTRA_BOTTOM_SPACE;
    for (w, h) in [(400, 1000), (50, 60), (1200, 300), (7, 7)] {
        let out = warp(&artwork(w, h), CurvatureSpec::new(3.0, 6.0), false);
        assert_eq!(out.height(), expected, "source {w}x{h}");
        let normalized_width = (f64::from(TARGET_HEIGHT) * f64::from(w) / f64::from(h)).round();
        assert!((f64::from(out.width()) - normalized_width).abs() < f64::EPSILON);
    }
}

#[test]
fn tall_artwork_scenario_has_exact_silhouette() {
    let src = artwork(400, 1000);
    let cfg = WarpConfig::default();
    let curvature = CurvatureSpec::new(-5.0, 10.0);

    let mut job = WarpJob::new(&src, curvature, WarpOptions::default(), &cfg);
    while job.step().unwrap().is_some() {}
    let scaled = job.scaled_curvature().unwrap();
    assert!((scaled.height_scale - 1.0).abs() < 1e-6);
    assert!((scaled.top_curve + 5.0).abs() < 1e-6);
    assert!((scaled.bottom_curve - 10.0).abs() < 1e-6);

    let out = job.into_output().unwrap();
    assert_eq!(out.dimensions(), (240, 640));

    // Top edge sags 2.5 px at the centre, none at the sides.
    assert_eq!(out.get_pixel(120, 21)[3], 0);
    assert_eq!(out.get_pixel(120, 23)[3], 255);
    assert_eq!(out.get_pixel(0, 19)[3], 0);
    assert_eq!(out.get_pixel(0, 21)[3], 255);

    // Bottom corners lifted by 15 px, centre by 10 px.
    assert_eq!(out.get_pixel(0, 604)[3], 255);
    assert_eq!(out.get_pixel(0, 606)[3], 0);
    assert_eq!(out.get_pixel(120, 608)[3], 255);
    assert_eq!(out.get_pixel(120, 611)[3], 0);
}

#[test]
fn enhanced_mode_only_changes_the_interior() {
    let src = artwork(300, 600);
    let c = CurvatureSpec::new(8.0, 12.0);
    let flat = warp(&src, c, false);
    let bulged = warp(&src, c, true);

    assert_eq!(flat.dimensions(), bulged.dimensions());
    let mut interior_diffs = 0;
    for (a, b) in flat.pixels().zip(bulged.pixels()) {
        assert_eq!(a[3], b[3], "silhouette alpha must match");
        if a[3] == 0 {
            assert_eq!(a, b, "outside the silhouette both are transparent");
        } else if a != b {
            interior_diffs += 1;
        }
    }
    assert!(interior_diffs > 0, "enhanced warp should move interior pixels");
}

#[test]
fn undecodable_bytes_are_a_decode_error() {
    let err = label_raster::raster::decode(&[0x89, b'P', b'N', b'G', 0, 0]).unwrap_err();
    assert!(matches!(err, label_raster::Error::Decode(_)), "{err:?}");
}

#[test]
fn detector_prefers_inner_trim_mark() {
    let mut page = RasterImage::from_pixel(400, 400, Rgba([255, 255, 255, 255]));
    for x in (12..18).chain(34..44) {
        page.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
    }
    let cropped = detect_and_crop(&page, &DetectorConfig::default());
    assert_eq!(cropped.dimensions(), (400 - 2 * 34, 400 - 2 * 34));
}

#[test]
fn clean_page_is_returned_byte_for_byte() {
    let page = artwork(320, 240);
    let page = RasterImage::from_fn(320, 240, |x, y| {
        // Light artwork only: nothing crosses the dark threshold.
        let p = page.get_pixel(x, y);
        Rgba([p[0] / 4 + 190, p[1] / 4 + 190, p[2] / 4 + 190, 255])
    });
    let out = detect_and_crop(&page, &DetectorConfig::default());
    assert_eq!(out.as_raw(), page.as_raw());
}

#[test]
fn oversized_margin_returns_original() {
    let mut page = RasterImage::from_pixel(120, 120, Rgba([255, 255, 255, 255]));
    for x in 40..50 {
        page.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
    }
    let out = detect_and_crop(&page, &DetectorConfig::default());
    assert_eq!(out, page);
}

#[test]
fn compositor_boundary_cases() {
    let mask = RasterImage::from_fn(20, 20, |x, y| {
        #[allow(clippy::cast_possible_truncation)]
        let v = (x * 12 + y) as u8;
        Rgba([v, v, v, 255])
    });
    let color = Rgb([150, 30, 60]);

    let exact = recolor_liquid(
        &mask,
        color,
        &WineSettings {
            opacity: 1.0,
            contrast: 1.0,
            blend_mode: BlendMode::Normal,
        },
    )
    .unwrap();
    assert!(exact.pixels().all(|p| *p == Rgba([150, 30, 60, 255])));

    let untouched = recolor_liquid(
        &mask,
        color,
        &WineSettings {
            opacity: 0.0,
            contrast: 0.5,
            blend_mode: BlendMode::ColorBurn,
        },
    )
    .unwrap();
    assert_eq!(untouched.as_raw(), mask.as_raw());
}

#[test]
fn document_page_flows_through_crop_and_warp() {
    let pipeline = LabelPipeline::new(PipelineConfig::default()).unwrap();
    let mut page = RasterImage::from_pixel(500, 700, Rgba([240, 240, 240, 255]));
    for x in 30..40 {
        page.put_pixel(x, 0, Rgba([0, 0, 0, 255]));
    }

    let mut percents = Vec::new();
    let label = pipeline
        .process_document_page(
            &page,
            "bordeaux",
            CurvatureSpec::new(4.0, 8.0),
            WarpOptions::default(),
            |p| percents.push(p.percent),
        )
        .unwrap();

    // 440x640 after cropping 30 px on each side, then normalized to 600 tall.
    assert_eq!(label.width(), 413);
    assert_eq!(label.height(), pipeline.config().warp.output_height());
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}
