//! Integration test: evolve a mesh over a synthetic image and export it to
//! SVG and to a raster.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::PathBuf;

use image::{Rgb, RgbImage};
use vitrail_export::{SvgMetadata, rasterize, to_svg};
use vitrail_mesh::{Dimensions, Mesh, MeshConfig};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// Dark left half, light right half and an orange disk in the middle.
fn synthetic_image() -> RgbImage {
    RgbImage::from_fn(WIDTH, HEIGHT, |x, y| {
        let dx = f64::from(x) - 32.0;
        let dy = f64::from(y) - 24.0;
        if dx.hypot(dy) < 12.0 {
            Rgb([240, 140, 20])
        } else if x < WIDTH / 2 {
            Rgb([20, 30, 60])
        } else {
            Rgb([230, 230, 210])
        }
    })
}

fn mean_abs_diff(image: &RgbImage, render: &image::RgbaImage) -> f64 {
    let total: u64 = image
        .pixels()
        .zip(render.pixels())
        .map(|(a, b)| (0..3).map(|c| u64::from(a.0[c].abs_diff(b.0[c]))).sum::<u64>())
        .sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = total as f64 / f64::from(WIDTH * HEIGHT * 3);
    mean
}

#[test]
fn synthetic_image_mesh_to_svg_and_raster() {
    let image = synthetic_image();
    let config = MeshConfig {
        point_count: 80,
        initial_temperature: 3.0,
        cache_capacity: 8192,
        ..MeshConfig::default()
    };
    let mut mesh = Mesh::with_seed(image.clone(), config.clone(), 2024).unwrap();

    let initial_error = mesh.global_error().unwrap();
    let reports = mesh.run(40).expect("evolution should succeed");
    assert_eq!(reports.len(), 40);
    let final_error = mesh.global_error().unwrap();
    eprintln!("global error {initial_error:.0} -> {final_error:.0}");
    eprintln!("{}", reports.last().unwrap().summary());

    let triangles = mesh.colored_triangles().unwrap();
    assert!(!triangles.is_empty());
    let dimensions = Dimensions {
        width: WIDTH,
        height: HEIGHT,
    };

    // SVG export.
    let config_json = serde_json::to_string(&config).unwrap();
    let metadata = SvgMetadata {
        title: Some("synthetic"),
        description: Some("vitrail integration test"),
        config_json: Some(&config_json),
    };
    let svg = to_svg(&triangles, dimensions, &metadata);
    assert!(svg.contains("<svg"));
    assert!(svg.contains("</svg>"));
    assert_eq!(svg.matches("<polygon").count(), triangles.len());

    // The render should be much closer to the source than a flat fill.
    let render = rasterize(&triangles, dimensions).unwrap();
    let render_diff = mean_abs_diff(&image, &render);
    let flat = image::RgbaImage::from_pixel(WIDTH, HEIGHT, image::Rgba([128, 128, 128, 255]));
    let flat_diff = mean_abs_diff(&image, &flat);
    eprintln!("mean abs diff: render {render_diff:.1}, flat {flat_diff:.1}");
    assert!(render_diff < flat_diff / 2.0);

    let workspace_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf();
    let output_path = workspace_root.join("target/stained-glass-output.svg");
    if std::fs::write(&output_path, &svg).is_ok() {
        eprintln!("SVG written to {output_path:?} ({} bytes)", svg.len());
    }
}
