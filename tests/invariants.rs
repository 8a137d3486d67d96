//! Contract Invariant Tests
//!
//! These tests verify the guarantees callers rely on.

use std::collections::HashMap;

use creativeforge_core::{
    aspect::crop_window,
    compliance::{BrandConfig, LegalConfig},
    overlay::{layout::place, Font, Rect},
    pixel_hash, ComplianceChecker, Compositor, CompositorError, CreativePipeline, CreativeRequest,
    PipelineConfig, PipelineError, RatioRegistry, Severity, TextOverlayConfig, TextOverlayRenderer,
    TextPosition,
};
use image::{imageops, DynamicImage, GenericImageView, Rgb, RgbImage};

fn solid(width: u32, height: u32, rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)))
}

fn renderer() -> TextOverlayRenderer {
    TextOverlayRenderer::with_font(TextOverlayConfig::default(), Font::builtin()).unwrap()
}

fn create_pipeline(config: PipelineConfig) -> CreativePipeline {
    let renderer = TextOverlayRenderer::with_font(config.text_overlay.clone(), Font::builtin()).unwrap();
    CreativePipeline::with_renderer(config, renderer).unwrap()
}

#[test]
fn invariant_variants_match_requested_ratios() {
    let source = solid(1000, 1000, [90, 120, 200]);
    let variants = Compositor::default().create_variants(&source, None).unwrap();

    assert_eq!(variants.ratios(), vec!["1:1", "9:16", "16:9"]);
    for variant in variants.iter() {
        let (w, h) = variant.image.dimensions();
        let target = RatioRegistry::default().get(&variant.ratio).unwrap().value();
        assert!((w as f64 / h as f64 - target).abs() < 0.01, "{} -> {}x{}", variant.ratio, w, h);
        assert!(w <= 1000 && h <= 1000);
    }
    assert_eq!(variants.get("9:16").map(|v| v.dimensions()), Some((562, 1000)));
}

#[test]
fn invariant_vertical_crop_biased_upward() {
    let nine_sixteen = RatioRegistry::default().get("9:16").cloned().unwrap();
    let window = crop_window(1000, 3000, &nine_sixteen);
    assert_eq!((window.width, window.height), (1000, 1777));
    // 30% of the removed height above the window, 70% below
    assert_eq!(window.y, 366);
    assert_eq!(window.x, 0);

    let square = RatioRegistry::default().get("1:1").cloned().unwrap();
    let window = crop_window(1600, 900, &square);
    assert_eq!((window.x, window.y, window.width, window.height), (350, 0, 900, 900));
}

#[test]
fn invariant_unsupported_ratio_rejected_up_front() {
    let source = solid(200, 200, [0, 0, 0]);
    let ratios = vec!["1:1".to_string(), "4:5".to_string()];
    let err = Compositor::default().create_variants(&source, Some(&ratios)).unwrap_err();
    assert!(matches!(err, CompositorError::UnsupportedAspectRatio(ref r) if r == "4:5"));
    assert!(err.to_string().contains("4:5"));
}

#[test]
fn invariant_source_never_modified() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_fn(640, 480, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
    }));
    let before = pixel_hash(&source);

    let pipeline = create_pipeline(PipelineConfig::default());
    pipeline.compile(&source, &CreativeRequest::new("Summer Sale 50% Off")).unwrap();
    renderer().render_overlay(&source, "Hello", None).unwrap();

    assert_eq!(pixel_hash(&source), before);
}

#[test]
fn invariant_overlay_changes_only_the_text_region() {
    let source = solid(1000, 1000, [128, 128, 128]);
    let rendered = renderer().render_overlay(&source, "Summer Sale", Some(TextPosition::Bottom)).unwrap();
    assert_eq!(rendered.dimensions(), (1000, 1000));

    let changed: Vec<(u32, u32)> = rendered
        .to_rgba8()
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0 != [128, 128, 128, 255])
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!changed.is_empty());
    assert!(changed.iter().all(|&(_, y)| y > 750), "bottom overlay drew above the lower quarter");
}

#[test]
fn invariant_empty_message_is_a_plain_copy() {
    let source = solid(300, 200, [10, 20, 30]);
    let rendered = renderer().render_overlay(&source, "   ", None).unwrap();
    assert_eq!(rendered.to_rgb8(), source.to_rgb8());
}

#[test]
fn invariant_adaptive_panel_tracks_brightness() {
    let renderer = renderer();
    let region = Rect { left: 0, top: 0, right: 100, bottom: 100 };

    let bright = solid(200, 200, [255, 255, 255]).to_rgba8();
    let dark = solid(200, 200, [0, 0, 0]).to_rgba8();
    let middle = solid(200, 200, [100, 100, 100]).to_rgba8();
    assert!((renderer.adapted_opacity(&bright, region) - 0.9).abs() < 1e-6);
    assert!((renderer.adapted_opacity(&dark, region) - 0.4).abs() < 1e-6);
    assert!((renderer.adapted_opacity(&middle, region) - 0.6).abs() < 1e-6);

    // A brighter background gets a darker panel
    let source = solid(800, 800, [255, 255, 255]);
    let plain = renderer.render_overlay(&source, "Bright", None).unwrap().to_rgba8();
    let adaptive = renderer.render_overlay_adaptive(&source, "Bright", None).unwrap().to_rgba8();
    let block = renderer.layout("Bright", 800, 800);
    let panel = place(&block, 800, 800, renderer.config().padding, TextPosition::Bottom).panel;
    let (x, y) = (panel.left as u32, panel.top as u32);
    assert!(adaptive.get_pixel(x, y).0[0] < plain.get_pixel(x, y).0[0]);
}

#[test]
fn invariant_legal_whole_words_with_severity() {
    let legal = LegalConfig::new(
        ["guarantee", "free"],
        HashMap::from([
            ("guarantee".to_string(), Severity::Blocking),
            ("free".to_string(), Severity::Warning),
        ]),
    );
    let checker = ComplianceChecker::new(BrandConfig::default(), legal);

    let result = checker.check_legal("Get it for free and guarantee success");
    assert!(!result.passed);
    assert_eq!(result.violations.len(), 2);
    assert!(result.violations.iter().any(|v| v.contains("guarantee") && v.contains("blocking")));
    assert!(result.violations.iter().any(|v| v.contains("free") && v.contains("warning")));

    assert!(checker.check_legal("Freedom is important").passed);
    assert!(!checker.check_legal("FREE delivery").passed);
}

#[test]
fn invariant_unconfigured_brand_passes() {
    let checker = ComplianceChecker::default();
    let result = checker.check_brand(&solid(120, 80, [1, 2, 3])).unwrap();
    assert!(result.passed);
    assert!(result.violations.is_empty());
}

#[test]
fn invariant_brand_logo_and_colors() {
    let logo = DynamicImage::ImageRgb8(RgbImage::from_fn(30, 30, |x, y| {
        if (x / 6 + y / 6) % 2 == 0 { Rgb([0, 82, 204]) } else { Rgb([255, 255, 255]) }
    }));
    let mut with_logo = RgbImage::from_pixel(150, 150, Rgb([0, 82, 204]));
    imageops::overlay(&mut with_logo, &logo.to_rgb8(), 100, 12);
    let with_logo = DynamicImage::ImageRgb8(with_logo);

    let dir = tempfile::tempdir().unwrap();
    let logo_path = dir.path().join("logo.png");
    logo.save(&logo_path).unwrap();

    let brand = BrandConfig::default()
        .with_logo_path(&logo_path)
        .with_colors(["#0052CC"]);
    let checker = ComplianceChecker::new(brand, LegalConfig::default());

    let result = checker.check_brand(&with_logo).unwrap();
    assert!(result.passed, "{:?}", result);

    let result = checker.check_brand(&solid(150, 150, [200, 30, 30])).unwrap();
    assert!(!result.passed);
    assert_eq!(result.violations.len(), 2);
}

#[test]
fn invariant_job_hash_stable_across_runs() {
    let pipeline = create_pipeline(PipelineConfig::default());
    let source = solid(400, 400, [50, 60, 70]);
    let request = CreativeRequest::new("Same message").with_ratios(["1:1", "9:16"]);

    let first = pipeline.compile(&source, &request).unwrap();
    let second = pipeline.compile(&source, &request).unwrap();

    assert_eq!(first.job_hash, second.job_hash);
    assert_ne!(first.id, second.id);
    for (a, b) in first.variants.iter().zip(&second.variants) {
        assert_eq!(a.hash, b.hash);
    }
}

#[test]
fn invariant_localized_message_is_screened() {
    let mut config = PipelineConfig::default();
    config.compliance.enabled = true;
    config.compliance.legal = LegalConfig::new(["gratis"], HashMap::new());

    let pipeline = create_pipeline(config);
    let request = CreativeRequest::new("Clean message").with_localized("Envio gratis");
    let creative = pipeline.compile(&solid(300, 300, [0, 0, 0]), &request).unwrap();

    assert_eq!(creative.message, "Envio gratis");
    assert!(!creative.passed());
    assert!(creative.variants.iter().all(|v| !v.passed()));
}

#[test]
fn invariant_pipeline_error_wraps_stage() {
    let pipeline = create_pipeline(PipelineConfig::default());
    let err = pipeline
        .compile(&solid(100, 100, [0, 0, 0]), &CreativeRequest::new("x").with_ratios(["2:3"]))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Compositor(_)));
}

#[test]
fn invariant_three_ratio_run_confines_overlay_to_panel() {
    let source = DynamicImage::ImageRgb8(RgbImage::from_fn(1000, 1000, |x, y| {
        Rgb([(60 + x / 8) as u8, (40 + y / 8) as u8, 140])
    }));
    let message = "Start your day right";
    let ratios = ["1:1", "9:16", "16:9"];
    let names: Vec<String> = ratios.iter().map(|r| r.to_string()).collect();

    let variants = Compositor::default().create_variants(&source, Some(&names)).unwrap();
    assert_eq!(variants.len(), 3);

    let renderer = renderer();
    let pipeline = create_pipeline(PipelineConfig::default());
    let creative = pipeline
        .compile(&source, &CreativeRequest::new(message).with_ratios(ratios))
        .unwrap();
    assert_eq!(creative.variants.len(), 3);

    for variant in variants.iter() {
        let (w, h) = variant.image.dimensions();
        let crop = variant.image.to_rgba8();
        let rendered = renderer.render_overlay_adaptive(&variant.image, message, None).unwrap();
        assert_eq!(rendered.dimensions(), (w, h));
        let rendered = rendered.to_rgba8();

        let block = renderer.layout(message, w, h);
        let panel = place(&block, w, h, renderer.config().padding, TextPosition::Bottom)
            .panel
            .clamp_to(w, h)
            .unwrap();

        let mut inside = 0;
        for (x, y, p) in rendered.enumerate_pixels() {
            let (xi, yi) = (x as i64, y as i64);
            let in_panel = xi >= panel.left && xi < panel.right && yi >= panel.top && yi < panel.bottom;
            if in_panel {
                inside += (p != crop.get_pixel(x, y)) as usize;
            } else {
                assert_eq!(p, crop.get_pixel(x, y), "{} changed at ({}, {})", variant.ratio, x, y);
            }
        }
        let area = ((panel.right - panel.left) * (panel.bottom - panel.top)) as usize;
        assert_eq!(inside, area, "{}: every panel pixel is tinted", variant.ratio);

        let compiled = creative.variant(&variant.ratio).unwrap();
        assert_eq!((compiled.width, compiled.height), (w, h));
        assert_eq!(compiled.image.to_rgba8(), rendered);
    }
}
