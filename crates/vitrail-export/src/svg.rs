//! SVG export serializer.
//!
//! Writes one filled `<polygon>` per triangle using the [`svg`] crate for
//! document construction and XML escaping. Each polygon is also stroked
//! with its own fill color at a hairline width, which hides the
//! anti-aliasing seams viewers otherwise show between adjacent triangles.
//!
//! Optional [`SvgMetadata`] embeds `<title>`, `<desc>` and the mesh
//! configuration.

use std::fmt::Write;

use svg::Document;
use svg::node::element::{Description, Element, Polygon, Title};
use svg::node::{Node, Text};

use vitrail_mesh::{Color, ColoredTriangle, Dimensions, TriangleVertices};

/// Stroke width, in pixels, drawn around every polygon.
const SEAM_STROKE_WIDTH: f64 = 0.5;

/// Metadata to embed in the SVG document.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized [`MeshConfig`](vitrail_mesh::MeshConfig), emitted inside
    /// `<metadata>` as a namespaced `<vitrail:mesh>` element.
    pub config_json: Option<&'a str>,
}

/// CSS hex notation (`#rrggbb`) of a color.
#[must_use]
pub fn hex_color(color: Color) -> String {
    let [r, g, b] = color.to_rgb8();
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// The `points` attribute of a triangle, coordinates rounded to 0.01 px.
///
/// ```
/// use vitrail_mesh::{Position, TriangleVertices};
/// use vitrail_export::svg::polygon_points;
///
/// let t = TriangleVertices::new(
///     Position::new(0.0, 0.0),
///     Position::new(10.5, 0.0),
///     Position::new(0.0, 7.25),
/// );
/// assert_eq!(polygon_points(&t), "0,0 10.5,0 0,7.25");
/// ```
#[must_use]
pub fn polygon_points(vertices: &TriangleVertices) -> String {
    let mut out = String::new();
    for (i, p) in vertices.corners().iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{},{}", round_coordinate(p.x), round_coordinate(p.y));
    }
    out
}

fn round_coordinate(v: f64) -> f64 {
    let rounded = (v * 100.0).round() / 100.0;
    // Avoid printing "-0".
    if rounded == 0.0 { 0.0 } else { rounded }
}

/// Serialize colored triangles into an SVG document string.
///
/// The `viewBox` matches the source image pixel grid given by
/// `dimensions`.
///
/// # Examples
///
/// ```
/// use vitrail_mesh::{Color, ColoredTriangle, Dimensions, Position, TriangleVertices};
/// use vitrail_export::{SvgMetadata, to_svg};
///
/// let triangle = ColoredTriangle {
///     vertices: TriangleVertices::new(
///         Position::new(0.0, 0.0),
///         Position::new(8.0, 0.0),
///         Position::new(0.0, 6.0),
///     ),
///     color: Color::new(1.0, 0.0, 0.0),
///     error: 0.0,
///     pixel_count: 24,
/// };
/// let dims = Dimensions { width: 8, height: 6 };
/// let metadata = SvgMetadata {
///     title: Some("red"),
///     ..SvgMetadata::default()
/// };
/// let svg = to_svg(&[triangle], dims, &metadata);
/// assert!(svg.contains("<title>red</title>"));
/// assert!(svg.contains(r##"fill="#ff0000""##));
/// ```
#[must_use]
pub fn to_svg(
    triangles: &[ColoredTriangle],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut mesh_el = Element::new("vitrail:mesh");
        mesh_el.assign("xmlns:vitrail", "https://vitrail.dev/ns/1");
        mesh_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(mesh_el);
        doc = doc.add(metadata_el);
    }

    for triangle in triangles {
        let color = hex_color(triangle.color);
        let polygon = Polygon::new()
            .set("points", polygon_points(&triangle.vertices))
            .set("fill", color.clone())
            .set("stroke", color)
            .set("stroke-width", SEAM_STROKE_WIDTH)
            .set("stroke-linejoin", "round");
        doc = doc.add(polygon);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use vitrail_mesh::Position;

    use super::*;

    fn triangle(color: Color) -> ColoredTriangle {
        ColoredTriangle {
            vertices: TriangleVertices::new(
                Position::new(0.0, 0.0),
                Position::new(10.0, 0.0),
                Position::new(0.0, 10.0),
            ),
            color,
            error: 1.0,
            pixel_count: 50,
        }
    }

    fn dims() -> Dimensions {
        Dimensions {
            width: 10,
            height: 10,
        }
    }

    #[test]
    fn hex_color_formats_channels() {
        assert_eq!(hex_color(Color::new(0.0, 0.0, 0.0)), "#000000");
        assert_eq!(hex_color(Color::new(1.0, 1.0, 1.0)), "#ffffff");
        assert_eq!(hex_color(Color::new(1.0, 0.0, 0.0)), "#ff0000");
    }

    #[test]
    fn polygon_points_rounds_to_hundredths() {
        let t = TriangleVertices::new(
            Position::new(1.234_56, -0.001),
            Position::new(2.0, 3.0),
            Position::new(4.005_1, 5.999_9),
        );
        assert_eq!(polygon_points(&t), "1.23,0 2,3 4.01,6");
    }

    #[test]
    fn empty_mesh_produces_valid_document() {
        let svg = to_svg(&[], dims(), &SvgMetadata::default());
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<svg"));
        assert!(svg.contains("viewBox=\"0 0 10 10\""));
        // A document without children is written self-closing.
        assert!(svg.trim_end().ends_with("/>"));
        assert!(!svg.contains("</svg>"));
        assert!(!svg.contains("<polygon"));
    }

    #[test]
    fn one_polygon_per_triangle() {
        let triangles = vec![
            triangle(Color::new(1.0, 0.0, 0.0)),
            triangle(Color::new(0.0, 1.0, 0.0)),
        ];
        let svg = to_svg(&triangles, dims(), &SvgMetadata::default());
        assert_eq!(svg.matches("<polygon").count(), 2);
        assert!(svg.contains("fill=\"#ff0000\""));
        assert!(svg.contains("fill=\"#00ff00\""));
        assert!(svg.contains("points=\"0,0 10,0 0,10\""));
    }

    #[test]
    fn metadata_is_escaped() {
        let metadata = SvgMetadata {
            title: Some("a & b"),
            description: Some("<stained>"),
            config_json: Some(r#"{"point_count":4}"#),
        };
        let svg = to_svg(&[], dims(), &metadata);
        assert!(svg.contains("<title>a &amp; b</title>"));
        assert!(svg.contains("&lt;stained&gt;"));
        assert!(svg.contains("<vitrail:mesh"));
        assert!(svg.contains("xmlns:vitrail="));
        assert!(!svg.contains("<desc><stained>"));
    }
}
