//! Shared types for the vitrail mesh engine.

use serde::{Deserialize, Serialize};

/// Re-export `RgbImage` so downstream crates can hand source pixels to
/// the engine without depending on `image` directly.
pub use image::RgbImage;

/// A 2D position in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another position.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Translate by `(dx, dy)`.
    #[must_use]
    pub fn offset(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Clamp into the rectangle `[0, bounds.x] x [0, bounds.y]`.
    #[must_use]
    pub fn clamp_to(self, bounds: Self) -> Self {
        Self::new(self.x.clamp(0.0, bounds.x), self.y.clamp(0.0, bounds.y))
    }

    /// Returns `true` when both coordinates are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image buffer.
    #[must_use]
    pub fn of(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// The far corner `(width, height)` as a position; the upper bound for
    /// every point of the mesh.
    #[must_use]
    pub fn max_position(self) -> Position {
        Position::new(f64::from(self.width), f64::from(self.height))
    }

    /// Total pixel count.
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// A normalized RGB color, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Quantize to 8-bit channels.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |c: f64| (c * 255.0).round().clamp(0.0, 255.0) as u8;
        [q(self.r), q(self.g), q(self.b)]
    }
}

/// The three corner positions of a triangle.
///
/// Triangles are rebuilt from point indices on every triangulation, so
/// this is a plain value with no identity beyond its coordinates (see
/// [`Fingerprint`](crate::fingerprint::Fingerprint)).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleVertices(pub [Position; 3]);

impl TriangleVertices {
    #[must_use]
    pub const fn new(a: Position, b: Position, c: Position) -> Self {
        Self([a, b, c])
    }

    /// Returns the corner positions.
    #[must_use]
    pub const fn corners(&self) -> &[Position; 3] {
        &self.0
    }

    /// Convert into a `geo` triangle for area and containment queries.
    #[must_use]
    pub fn to_geo(self) -> geo::Triangle<f64> {
        let [a, b, c] = self.0;
        geo::Triangle::new(
            geo::coord! { x: a.x, y: a.y },
            geo::coord! { x: b.x, y: b.y },
            geo::coord! { x: c.x, y: c.y },
        )
    }

    /// Unsigned area in square pixels.
    #[must_use]
    pub fn area(self) -> f64 {
        use geo::Area;
        self.to_geo().unsigned_area()
    }
}

/// Result of colorizing one triangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TriangleResult {
    /// Mean color of the covered pixels.
    pub color: Color,
    /// Accumulated reconstruction error of the covered pixels.
    pub error: f64,
    /// Number of pixels the rasterizer attributed to the triangle.
    pub pixel_count: u64,
}

impl TriangleResult {
    /// Result for a triangle that covers no pixels.
    pub const DEGENERATE: Self = Self {
        color: Color::BLACK,
        error: 0.0,
        pixel_count: 0,
    };

    /// A zero-pixel triangle's error says nothing about its quality.
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.pixel_count == 0
    }
}

/// A triangle with its resolved color and error, ready for a renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredTriangle {
    pub vertices: TriangleVertices,
    pub color: Color,
    pub error: f64,
    pub pixel_count: u64,
}

/// Errors raised by the mesh engine.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// The Delaunay routine rejected the point set on every attempt.
    #[error("triangulation failed after {attempts} attempt(s): {reason}")]
    TriangulationFailed {
        /// Number of attempts made.
        attempts: u32,
        /// Reason reported by the last attempt.
        reason: String,
    },

    /// The triangle has not been colorized yet.
    #[error("triangle result is not cached")]
    CacheMiss,

    /// The cache cannot hold every live triangle.
    #[error("cache capacity {capacity} must exceed the live triangle count {triangles}")]
    CapacityExceeded {
        /// Number of triangles in the triangulation.
        triangles: usize,
        /// Configured cache capacity.
        capacity: usize,
    },

    /// The requested mutation is not allowed.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Mesh configuration is invalid.
    #[error("invalid mesh configuration: {0}")]
    InvalidConfig(String),
}
