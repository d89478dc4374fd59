//! Raster rendering of a colored mesh with `tiny-skia`.

use image::{Rgba, RgbaImage};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use vitrail_mesh::{ColoredTriangle, Dimensions};

/// Errors from raster rendering.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The pixmap could not be allocated (zero or oversized dimensions).
    #[error("cannot allocate a {width}x{height} pixmap")]
    PixmapAllocation { width: u32, height: u32 },
}

/// Render the triangles into an image of the given dimensions.
///
/// Triangles are filled anti-aliased in order, over a transparent
/// background. Pixels covered by no triangle stay fully transparent.
///
/// # Errors
///
/// Returns [`ExportError::PixmapAllocation`] if either dimension is zero
/// or the pixmap is too large.
#[allow(clippy::cast_possible_truncation)]
pub fn rasterize(
    triangles: &[ColoredTriangle],
    dimensions: Dimensions,
) -> Result<RgbaImage, ExportError> {
    let Dimensions { width, height } = dimensions;
    let mut pixmap =
        Pixmap::new(width, height).ok_or(ExportError::PixmapAllocation { width, height })?;

    for triangle in triangles {
        let [a, b, c] = *triangle.vertices.corners();
        let mut pb = PathBuilder::new();
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
        pb.line_to(c.x as f32, c.y as f32);
        pb.close();
        // Degenerate input gives no path.
        let Some(path) = pb.finish() else {
            continue;
        };

        let [r, g, b] = triangle.color.to_rgb8();
        let mut paint = Paint::default();
        paint.set_color_rgba8(r, g, b, 255);
        paint.anti_alias = true;
        pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
    }

    Ok(unpremultiply(&pixmap))
}

/// Convert a premultiplied pixmap into a straight-alpha image.
#[allow(clippy::cast_possible_truncation)]
fn unpremultiply(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, src) in img.pixels_mut().zip(pixmap.data().chunks_exact(4)) {
        let a = src[3];
        *pixel = if a == 0 {
            Rgba([0, 0, 0, 0])
        } else {
            let channel = |v: u8| (u16::from(v) * 255 / u16::from(a)).min(255) as u8;
            Rgba([channel(src[0]), channel(src[1]), channel(src[2]), a])
        };
    }
    img
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vitrail_mesh::{Color, Position, TriangleVertices};

    use super::*;

    fn triangle(a: (f64, f64), b: (f64, f64), c: (f64, f64), color: Color) -> ColoredTriangle {
        ColoredTriangle {
            vertices: TriangleVertices::new(
                Position::new(a.0, a.1),
                Position::new(b.0, b.1),
                Position::new(c.0, c.1),
            ),
            color,
            error: 0.0,
            pixel_count: 0,
        }
    }

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    #[test]
    fn zero_size_is_an_error() {
        assert!(matches!(
            rasterize(&[], dims(0, 4)),
            Err(ExportError::PixmapAllocation {
                width: 0,
                height: 4
            })
        ));
    }

    #[test]
    fn empty_mesh_is_transparent() {
        let img = rasterize(&[], dims(4, 3)).unwrap();
        assert_eq!(img.dimensions(), (4, 3));
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn two_triangles_cover_the_rectangle() {
        let red = Color::new(1.0, 0.0, 0.0);
        let blue = Color::new(0.0, 0.0, 1.0);
        let triangles = [
            triangle((0.0, 0.0), (16.0, 0.0), (0.0, 16.0), red),
            triangle((16.0, 0.0), (16.0, 16.0), (0.0, 16.0), blue),
        ];
        let img = rasterize(&triangles, dims(16, 16)).unwrap();

        // Interior of each triangle is the solid fill.
        assert_eq!(img.get_pixel(2, 2).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(13, 13).0, [0, 0, 255, 255]);
        // Corners away from the diagonal are fully opaque.
        assert_eq!(img.get_pixel(0, 0).0[3], 255);
        assert_eq!(img.get_pixel(15, 15).0[3], 255);
    }

    #[test]
    fn later_triangles_paint_over_earlier_ones() {
        let corners = ((0.0, 0.0), (8.0, 0.0), (0.0, 8.0));
        let triangles = [
            triangle(corners.0, corners.1, corners.2, Color::new(1.0, 0.0, 0.0)),
            triangle(corners.0, corners.1, corners.2, Color::new(0.0, 1.0, 0.0)),
        ];
        let img = rasterize(&triangles, dims(8, 8)).unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [0, 255, 0, 255]);
        // Below the hypotenuse nothing was drawn.
        assert_eq!(img.get_pixel(7, 7).0[3], 0);
    }
}
