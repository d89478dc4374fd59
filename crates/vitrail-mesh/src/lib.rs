//! vitrail-mesh: low-polygon image approximation engine (sans-IO).
//!
//! Evolves a set of points over an image so that the Delaunay triangles
//! they span, each filled with its mean color, reproduce the image as
//! closely as possible:
//! triangulate -> colorize -> perturb -> retriangulate -> accept/reject ->
//! occasional purge.
//!
//! This crate has **no I/O dependencies**: it takes an in-memory
//! [`RgbImage`] and returns [`ColoredTriangle`]s. Decoding, rendering and
//! file output live in `vitrail-export` and the `vitrail` binary.

pub mod cache;
pub mod colorize;
pub mod config;
pub mod diagnostics;
pub mod fingerprint;
pub mod mesh;
pub mod movement;
pub mod point;
pub mod sample;
pub mod triangulation;
pub mod types;

pub use cache::{CacheStats, TriangleCache};
pub use colorize::{Colorizer, ColorizerKind, ErrorMetric};
pub use config::MeshConfig;
pub use diagnostics::StepReport;
pub use fingerprint::Fingerprint;
pub use mesh::Mesh;
pub use movement::{MovementKind, MovementStrategy};
pub use point::Point;
pub use sample::rand_point_in_triangle;
pub use triangulation::{NeighborhoodError, SpadeTriangulator, Triangulation, Triangulator};
pub use types::{
    Color, ColoredTriangle, Dimensions, MeshError, Position, RgbImage, TriangleResult,
    TriangleVertices,
};
