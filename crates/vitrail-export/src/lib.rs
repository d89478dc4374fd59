//! vitrail-export: pure serializers for evolved meshes (sans-IO)
//!
//! Converts colored triangles into output formats: SVG documents and
//! anti-aliased raster images.

pub mod raster;
pub mod svg;

pub use raster::{ExportError, rasterize};
pub use svg::{SvgMetadata, to_svg};
