//! Triangle colorization: mean color and reconstruction error of the
//! pixels a triangle covers.
//!
//! This module defines the [`Colorizer`] trait for pluggable rasterizers
//! and the [`ColorizerKind`] enum for selecting one at runtime, the same
//! way the pipeline stages of this workspace pick their strategies.
//!
//! Both rasterizers reduce a triangle to a list of horizontal pixel
//! [`Span`]s inside its clamped bounding box and share the accumulation
//! step, so they differ only in which pixels they attribute to the
//! triangle.
//!
//! Colorizers are pure: they read the image and the triangle and return
//! a [`TriangleResult`]. That is what lets the triangulation fan them out
//! over a worker pool.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

use crate::types::{Color, Position, TriangleResult, TriangleVertices};

/// Selects which rasterizer attributes pixels to triangles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ColorizerKind {
    /// Per-row edge intersection. Fast and allocation free.
    #[default]
    Scanline,
    /// Filled polygon mask via `imageproc::drawing::draw_polygon_mut`.
    ///
    /// Falls back to [`Scanline`](Self::Scanline) when the rounded corners
    /// do not form three distinct points, which the polygon filler cannot
    /// draw.
    Mask,
}

/// Trait for triangle colorization strategies.
pub trait Colorizer {
    /// Compute the mean color, absolute error and pixel count of the
    /// pixels of `image` covered by `triangle`.
    fn colorize(&self, image: &RgbImage, triangle: &TriangleVertices) -> TriangleResult;
}

impl Colorizer for ColorizerKind {
    fn colorize(&self, image: &RgbImage, triangle: &TriangleVertices) -> TriangleResult {
        let Some(rect) = PixelRect::around(triangle, image) else {
            return TriangleResult::DEGENERATE;
        };
        let spans = match *self {
            Self::Scanline => scanline_spans(triangle, rect),
            Self::Mask => {
                mask_spans(triangle, rect).unwrap_or_else(|| scanline_spans(triangle, rect))
            }
        };
        accumulate(image, &spans)
    }
}

/// How per-triangle error is reported to the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorMetric {
    /// Sum of absolute channel differences over all covered pixels.
    #[default]
    Absolute,
    /// Absolute error divided by the covered pixel count and by 255, so a
    /// single-channel miss of the full 8-bit range costs 1.
    PerPixel,
}

impl ErrorMetric {
    /// Convert a colorizer result (always absolute) into this metric.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn apply(self, result: TriangleResult) -> TriangleResult {
        match self {
            Self::Absolute => result,
            Self::PerPixel => TriangleResult {
                error: result.error / result.pixel_count.max(1) as f64 / 255.0,
                ..result
            },
        }
    }
}

/// A run of pixels `left..=right` on row `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: u32,
    pub left: u32,
    pub right: u32,
}

/// Inclusive pixel bounding box, clamped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    west: u32,
    east: u32,
    south: u32,
    north: u32,
}

impl PixelRect {
    /// Floor/ceil of the triangle's extent, clamped to the image.
    /// `None` when the image is empty or the triangle lies outside it.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn around(triangle: &TriangleVertices, image: &RgbImage) -> Option<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return None;
        }
        let corners = triangle.corners();
        if !corners.iter().all(|p| p.is_finite()) {
            return None;
        }
        let min_x = corners.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = corners.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = corners.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = corners.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);

        let last_x = f64::from(width - 1);
        let last_y = f64::from(height - 1);
        if max_x < 0.0 || max_y < 0.0 || min_x > last_x + 1.0 || min_y > last_y + 1.0 {
            return None;
        }
        Some(Self {
            west: min_x.floor().clamp(0.0, last_x) as u32,
            east: max_x.ceil().clamp(0.0, last_x) as u32,
            south: min_y.floor().clamp(0.0, last_y) as u32,
            north: max_y.ceil().clamp(0.0, last_y) as u32,
        })
    }
}

/// Horizontal extent of the triangle on the line `y`, if it crosses it.
fn row_extent(corners: &[Position; 3], y: f64) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for i in 0..3 {
        let p = corners[i];
        let q = corners[(i + 1) % 3];
        if (p.y - q.y).abs() < f64::EPSILON {
            if (y - p.y).abs() < f64::EPSILON {
                lo = lo.min(p.x.min(q.x));
                hi = hi.max(p.x.max(q.x));
            }
            continue;
        }
        if y < p.y.min(q.y) || y > p.y.max(q.y) {
            continue;
        }
        let x = (y - p.y).mul_add((q.x - p.x) / (q.y - p.y), p.x);
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo <= hi).then_some((lo, hi))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn scanline_spans(triangle: &TriangleVertices, rect: PixelRect) -> Vec<Span> {
    let corners = triangle.corners();
    let west = f64::from(rect.west);
    let east = f64::from(rect.east);
    (rect.south..=rect.north)
        .filter_map(|y| {
            let (lo, hi) = row_extent(corners, f64::from(y))?;
            let left = lo.round().max(west);
            let right = hi.round().min(east);
            (left <= right).then(|| Span {
                y,
                left: left as u32,
                right: right as u32,
            })
        })
        .collect()
}

/// Rasterize the triangle into a binary mask the size of `rect` and read
/// back one span per row. `None` if the rounded corners coincide.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn mask_spans(triangle: &TriangleVertices, rect: PixelRect) -> Option<Vec<Span>> {
    let ox = f64::from(rect.west);
    let oy = f64::from(rect.south);
    let poly = triangle
        .corners()
        .map(|p| imageproc::point::Point::new((p.x - ox).round() as i32, (p.y - oy).round() as i32));
    if poly[0] == poly[1] || poly[1] == poly[2] || poly[0] == poly[2] {
        return None;
    }

    let mut mask = GrayImage::new(rect.east - rect.west + 1, rect.north - rect.south + 1);
    imageproc::drawing::draw_polygon_mut(&mut mask, &poly, Luma([255]));

    let spans = mask
        .rows()
        .enumerate()
        .filter_map(|(row, pixels)| {
            let mut set = pixels
                .enumerate()
                .filter(|(_, px)| px.0[0] > 0)
                .map(|(col, _)| col as u32);
            let first = set.next()?;
            let last = set.last().unwrap_or(first);
            Some(Span {
                y: rect.south + row as u32,
                left: rect.west + first,
                right: rect.west + last,
            })
        })
        .collect();
    Some(spans)
}

/// Mean color and absolute error over the pixels in `spans`.
///
/// Error is the sum of per-channel absolute differences from the mean, in
/// 8-bit units. Colors are normalized to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn accumulate(image: &RgbImage, spans: &[Span]) -> TriangleResult {
    let width = image.width() as usize;
    let raw = image.as_raw();
    let row_pixels = |span: &Span| {
        let start = (span.y as usize * width + span.left as usize) * 3;
        let end = (span.y as usize * width + span.right as usize + 1) * 3;
        raw[start..end].chunks_exact(3)
    };

    let mut sum = [0u64; 3];
    let mut pixel_count = 0u64;
    for span in spans {
        for px in row_pixels(span) {
            for (acc, &channel) in sum.iter_mut().zip(px) {
                *acc += u64::from(channel);
            }
            pixel_count += 1;
        }
    }
    if pixel_count == 0 {
        return TriangleResult::DEGENERATE;
    }

    let n = pixel_count as f64;
    let mean = sum.map(|s| s as f64 / n);
    let mut error = 0.0;
    for span in spans {
        for px in row_pixels(span) {
            for (m, &channel) in mean.iter().zip(px) {
                error += (f64::from(channel) - m).abs();
            }
        }
    }

    TriangleResult {
        color: Color::new(mean[0] / 255.0, mean[1] / 255.0, mean[2] / 255.0),
        error,
        pixel_count,
    }
}
