//! Delaunay triangulation of the mesh points and its link to the cache.
//!
//! A [`Triangulation`] is a snapshot: a list of index triples into the
//! point array, the vertex positions at build time and one
//! [`Fingerprint`] per triangle. Colors and errors are never stored here;
//! they live in the [`TriangleCache`] and are looked up by fingerprint.
//!
//! The lifecycle within one step is
//! [`build`](Triangulation::build) ->
//! [`resolve_missing`](Triangulation::resolve_missing) ->
//! [`colorize_stack`](Triangulation::colorize_stack), after which
//! [`is_consistent`](Triangulation::is_consistent) holds and the error
//! queries can be answered.

use std::collections::HashSet;

use rayon::prelude::*;
use spade::{DelaunayTriangulation, Point2, Triangulation as _};

use crate::cache::TriangleCache;
use crate::colorize::{Colorizer, ErrorMetric};
use crate::fingerprint::Fingerprint;
use crate::point::Point;
use crate::types::{ColoredTriangle, MeshError, Position, RgbImage, TriangleResult, TriangleVertices};

/// Trait for Delaunay triangulation backends.
///
/// Implementations return triangles as index triples into `positions`.
/// Errors are reported as a human-readable reason; the caller decides how
/// often to retry.
pub trait Triangulator {
    /// Triangulate `positions`.
    ///
    /// # Errors
    ///
    /// Returns a description of why the point set was rejected.
    fn triangulate(&self, positions: &[Position]) -> Result<Vec<[usize; 3]>, String>;
}

/// Incremental Delaunay triangulation from the `spade` crate.
///
/// Coincident positions are merged by `spade`; such triangles reference
/// the first point at that position.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpadeTriangulator;

impl Triangulator for SpadeTriangulator {
    fn triangulate(&self, positions: &[Position]) -> Result<Vec<[usize; 3]>, String> {
        let mut dt: DelaunayTriangulation<Point2<f64>> = DelaunayTriangulation::new();
        // Vertex handle index -> index of the first point inserted there.
        let mut owner: Vec<usize> = Vec::with_capacity(positions.len());
        for (i, p) in positions.iter().enumerate() {
            let handle = dt
                .insert(Point2::new(p.x, p.y))
                .map_err(|e| format!("point {i} at ({}, {}): {e:?}", p.x, p.y))?;
            if handle.index() == owner.len() {
                owner.push(i);
            }
        }

        let triangles = dt
            .inner_faces()
            .map(|face| {
                let [a, b, c] = face.vertices();
                [
                    owner[a.fix().index()],
                    owner[b.fix().index()],
                    owner[c.fix().index()],
                ]
            })
            .collect();
        Ok(triangles)
    }
}

/// Error of a point's neighborhood under one triangulation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NeighborhoodError {
    /// Sum of the errors of every triangle whose three vertices are all
    /// neighbors of the point.
    pub error: f64,
    /// How many of those triangles covered no pixels.
    pub unknown: usize,
}

/// An indexed triangulation of the mesh points.
#[derive(Debug, Clone)]
pub struct Triangulation {
    triangles: Vec<[usize; 3]>,
    vertices: Vec<TriangleVertices>,
    fingerprints: Vec<Fingerprint>,
    missing: Vec<usize>,
}

impl Triangulation {
    /// Triangulate the current point positions.
    ///
    /// The triangulator is retried with the same input up to
    /// `max_attempts` times; an empty result counts as a failure.
    ///
    /// # Errors
    ///
    /// - [`MeshError::TriangulationFailed`] when every attempt failed.
    /// - [`MeshError::CapacityExceeded`] when the triangle count is not
    ///   strictly below `cache_capacity`.
    pub fn build<T: Triangulator + ?Sized>(
        points: &[Point],
        triangulator: &T,
        cache_capacity: usize,
        max_attempts: u32,
    ) -> Result<Self, MeshError> {
        let positions: Vec<Position> = points.iter().map(Point::position).collect();
        let attempts = max_attempts.max(1);
        let mut reason = String::new();
        let mut triangles = None;
        for attempt in 1..=attempts {
            match triangulator.triangulate(&positions) {
                Ok(found) if !found.is_empty() => {
                    triangles = Some(found);
                    break;
                }
                Ok(_) => reason = format!("no triangles from {} points", positions.len()),
                Err(e) => reason = e,
            }
            log::warn!("triangulation attempt {attempt}/{attempts} failed: {reason}");
        }
        let Some(triangles) = triangles else {
            return Err(MeshError::TriangulationFailed { attempts, reason });
        };

        if triangles.len() >= cache_capacity {
            return Err(MeshError::CapacityExceeded {
                triangles: triangles.len(),
                capacity: cache_capacity,
            });
        }

        let vertices: Vec<TriangleVertices> = triangles
            .iter()
            .map(|&[a, b, c]| TriangleVertices::new(positions[a], positions[b], positions[c]))
            .collect();
        let fingerprints = vertices.iter().map(Fingerprint::of).collect();

        Ok(Self {
            triangles,
            vertices,
            fingerprints,
            missing: Vec::new(),
        })
    }

    /// Look every triangle up in the cache and queue the misses for
    /// colorization. Hits are refreshed as most recently used.
    ///
    /// Returns the number of queued triangles.
    pub fn resolve_missing(&mut self, cache: &mut TriangleCache) -> usize {
        let mut queued: HashSet<Fingerprint> = self
            .missing
            .iter()
            .map(|&i| self.fingerprints[i])
            .collect();
        for (i, &key) in self.fingerprints.iter().enumerate() {
            if cache.get(key).is_err() && queued.insert(key) {
                self.missing.push(i);
            }
        }
        self.missing.len()
    }

    /// Colorize every queued triangle and store the results.
    ///
    /// With `parallel` the colorizer runs on the rayon pool over an
    /// immutable slice of vertex triples; results are written to the cache
    /// on the calling thread once all of them are in.
    ///
    /// Returns the number of triangles colorized.
    pub fn colorize_stack<C: Colorizer + Sync + ?Sized>(
        &mut self,
        image: &RgbImage,
        colorizer: &C,
        metric: ErrorMetric,
        cache: &mut TriangleCache,
        parallel: bool,
    ) -> usize {
        let queue = std::mem::take(&mut self.missing);
        let jobs: Vec<TriangleVertices> = queue.iter().map(|&i| self.vertices[i]).collect();
        let colorize = |t: &TriangleVertices| metric.apply(colorizer.colorize(image, t));
        let results: Vec<TriangleResult> = if parallel {
            jobs.par_iter().map(colorize).collect()
        } else {
            jobs.iter().map(colorize).collect()
        };
        for (&i, result) in queue.iter().zip(results) {
            cache.put(self.fingerprints[i], result);
        }
        queue.len()
    }

    /// `true` when nothing is queued and every triangle has a cached result.
    #[must_use]
    pub fn is_consistent(&self, cache: &TriangleCache) -> bool {
        self.missing.is_empty() && self.fingerprints.iter().all(|&key| cache.contains(key))
    }

    /// Record the vertices of each triangle as mutual neighbors.
    ///
    /// Neighbor sets accumulate; clearing them is the caller's job.
    pub fn assign_neighbors(&self, points: &mut [Point]) {
        for triangle in &self.triangles {
            for &v in triangle {
                points[v].add_neighbors(triangle);
            }
        }
    }

    /// Cached result of every triangle, in triangle order.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn results(&self, cache: &TriangleCache) -> Result<Vec<TriangleResult>, MeshError> {
        self.fingerprints.iter().map(|&key| cache.peek(key)).collect()
    }

    /// Per-point neighborhood error, looked up in the cache.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn neighborhood_errors(
        &self,
        points: &[Point],
        cache: &TriangleCache,
    ) -> Result<Vec<NeighborhoodError>, MeshError> {
        Ok(self.neighborhood_errors_from(points, &self.results(cache)?))
    }

    /// Per-point neighborhood error from results captured earlier with
    /// [`results`](Self::results).
    ///
    /// A triangle counts toward a point when all three of its vertices are
    /// in that point's neighbor set.
    #[must_use]
    pub fn neighborhood_errors_from(
        &self,
        points: &[Point],
        results: &[TriangleResult],
    ) -> Vec<NeighborhoodError> {
        let mut out = vec![NeighborhoodError::default(); points.len()];
        for (triangle, result) in self.triangles.iter().zip(results) {
            // Any point holding all three vertices is itself a neighbor of
            // the first one, so the candidates are that vertex's neighbors.
            for &p in points[triangle[0]].neighbors() {
                let neighbors = points[p].neighbors();
                if triangle.iter().all(|v| neighbors.contains(v)) {
                    out[p].error += result.error;
                    if result.is_degenerate() {
                        out[p].unknown += 1;
                    }
                }
            }
        }
        out
    }

    /// Sum of the errors of the triangles incident to each point.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn per_point_error(
        &self,
        point_count: usize,
        cache: &TriangleCache,
    ) -> Result<Vec<f64>, MeshError> {
        let mut out = vec![0.0; point_count];
        for (triangle, &key) in self.triangles.iter().zip(&self.fingerprints) {
            let error = cache.peek(key)?.error;
            for &v in triangle {
                if let Some(slot) = out.get_mut(v) {
                    *slot += error;
                }
            }
        }
        Ok(out)
    }

    /// Error of every triangle, in triangle order.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn per_triangle_error(&self, cache: &TriangleCache) -> Result<Vec<f64>, MeshError> {
        self.fingerprints
            .iter()
            .map(|&key| cache.peek(key).map(|r| r.error))
            .collect()
    }

    /// Sum of all triangle errors.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn global_error(&self, cache: &TriangleCache) -> Result<f64, MeshError> {
        Ok(self.per_triangle_error(cache)?.into_iter().sum())
    }

    /// Triangles joined with their cached colors, for rendering.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::CacheMiss`] if any triangle is not cached.
    pub fn colored_triangles(
        &self,
        cache: &TriangleCache,
    ) -> Result<Vec<ColoredTriangle>, MeshError> {
        self.vertices
            .iter()
            .zip(&self.fingerprints)
            .map(|(&vertices, &key)| {
                let result = cache.peek(key)?;
                Ok(ColoredTriangle {
                    vertices,
                    color: result.color,
                    error: result.error,
                    pixel_count: result.pixel_count,
                })
            })
            .collect()
    }

    /// Vertex positions of triangle `index` as of the build.
    #[must_use]
    pub fn triangle_vertices(&self, index: usize) -> Option<TriangleVertices> {
        self.vertices.get(index).copied()
    }

    #[must_use]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    #[must_use]
    pub fn fingerprints(&self) -> &[Fingerprint] {
        &self.fingerprints
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Triangles queued by [`resolve_missing`](Self::resolve_missing)
    /// and not yet colorized.
    #[must_use]
    pub fn missing_len(&self) -> usize {
        self.missing.len()
    }
}
