//! The mesh evolution engine.
//!
//! A [`Mesh`] owns the points, the triangle cache and the random number
//! generator, and advances everything one annealing iteration at a time
//! through [`Mesh::step`]:
//!
//! 1. **Snapshot**: triangulate the current points (A) and colorize it.
//! 2. **Perturb**: propose a new position for every movable point.
//! 3. **Retriangulate**: triangulate the perturbed points (B), colorize,
//!    and record A and B adjacency in the neighbor sets.
//! 4. **Compare**: neighborhood error of every point under A and under B.
//! 5. **Accept/Reject**: commit a move only when B is strictly better and
//!    fully known; otherwise restore the previous position.
//! 6. **Purge** (occasionally): drop the best-fitting points and split the
//!    worst-fitting triangles.
//!
//! The temperature decays geometrically after every step.

use std::sync::Arc;
use std::time::Instant;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use crate::cache::{CacheStats, TriangleCache};
use crate::config::{MIN_POINTS, MeshConfig};
use crate::diagnostics::StepReport;
use crate::movement::{MoveContext, MovementStrategy, Outcome};
use crate::point::Point;
use crate::sample::rand_point_in_triangle;
use crate::triangulation::{NeighborhoodError, SpadeTriangulator, Triangulation, Triangulator};
use crate::types::{
    ColoredTriangle, Dimensions, MeshError, Position, RgbImage, TriangleResult, TriangleVertices,
};

/// Smallest triangle area, in square pixels, that a purge will split.
pub const MIN_SPLIT_AREA: f64 = 0.5;

/// Low-polygon approximation of an image, evolved by simulated annealing.
pub struct Mesh<T = SpadeTriangulator> {
    image: Arc<RgbImage>,
    dimensions: Dimensions,
    config: MeshConfig,
    triangulator: T,
    points: Vec<Point>,
    cache: TriangleCache,
    rng: Pcg32,
    temperature: f64,
    iteration: u64,
    current: Option<Triangulation>,
}

impl Mesh<SpadeTriangulator> {
    /// Create a mesh seeded from the thread-local generator.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] for an invalid configuration or
    /// an empty image.
    pub fn new(image: impl Into<Arc<RgbImage>>, config: MeshConfig) -> Result<Self, MeshError> {
        let seed = rand::rng().random();
        Self::with_seed(image, config, seed)
    }

    /// Create a reproducible mesh: the same image, configuration and seed
    /// always evolve identically.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] for an invalid configuration or
    /// an empty image.
    pub fn with_seed(
        image: impl Into<Arc<RgbImage>>,
        config: MeshConfig,
        seed: u64,
    ) -> Result<Self, MeshError> {
        Self::with_triangulator(image, config, seed, SpadeTriangulator)
    }
}

impl<T: Triangulator> Mesh<T> {
    /// Create a mesh that triangulates through `triangulator`.
    ///
    /// The four image corners become fixed points `0..4`; the remaining
    /// `point_count - 4` points are scattered uniformly.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] for an invalid configuration or
    /// an empty image.
    pub fn with_triangulator(
        image: impl Into<Arc<RgbImage>>,
        config: MeshConfig,
        seed: u64,
        triangulator: T,
    ) -> Result<Self, MeshError> {
        config.validate()?;
        let image = image.into();
        let dimensions = Dimensions::of(&image);
        if dimensions.pixel_count() == 0 {
            return Err(MeshError::InvalidConfig(format!(
                "image must not be empty, got {}x{}",
                dimensions.width, dimensions.height
            )));
        }

        let mut rng = Pcg32::seed_from_u64(seed);
        let far = dimensions.max_position();
        let mut points = vec![
            Point::fixed(Position::new(0.0, 0.0)),
            Point::fixed(Position::new(far.x, 0.0)),
            Point::fixed(Position::new(0.0, far.y)),
            Point::fixed(far),
        ];
        points.extend((MIN_POINTS..config.point_count).map(|_| Point::random(&mut rng, far)));

        let cache = TriangleCache::new(config.cache_capacity)?;
        log::debug!(
            "mesh created: {}x{} image, {} points, seed {seed}",
            dimensions.width,
            dimensions.height,
            points.len()
        );

        Ok(Self {
            image,
            dimensions,
            temperature: config.initial_temperature,
            config,
            triangulator,
            points,
            cache,
            rng,
            iteration: 0,
            current: None,
        })
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub const fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Number of completed steps.
    #[must_use]
    pub const fn iteration(&self) -> u64 {
        self.iteration
    }

    #[must_use]
    pub const fn config(&self) -> &MeshConfig {
        &self.config
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    #[must_use]
    pub const fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Add a movable point and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidOperation`] if `position` is outside the
    /// image.
    pub fn add_point(&mut self, position: Position) -> Result<usize, MeshError> {
        self.check_in_bounds(position)?;
        self.points.push(Point::movable_with_velocity(position, &mut self.rng));
        self.current = None;
        Ok(self.points.len() - 1)
    }

    /// Remove the point at `index`. Points after it shift down by one.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidOperation`] for a fixed point or an
    /// index out of range.
    pub fn remove_point(&mut self, index: usize) -> Result<Point, MeshError> {
        let point = self.point_at(index)?;
        if point.is_fixed() {
            return Err(MeshError::InvalidOperation(format!(
                "cannot remove fixed point {index}"
            )));
        }
        self.current = None;
        Ok(self.points.remove(index))
    }

    /// Move the point at `index` and commit the new position.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidOperation`] for a fixed point, an index
    /// out of range or a position outside the image.
    pub fn move_point(&mut self, index: usize, position: Position) -> Result<(), MeshError> {
        self.point_at(index)?;
        self.check_in_bounds(position)?;
        let history_len = self.config.history_len;
        let point = &mut self.points[index];
        point.move_to(position)?;
        point.commit(history_len);
        self.current = None;
        Ok(())
    }

    /// Add a movable point at a uniformly random location inside
    /// `vertices` and return its index.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidOperation`] if the sampled point lies
    /// outside the image.
    pub fn split_triangle(&mut self, vertices: &TriangleVertices) -> Result<usize, MeshError> {
        let position = rand_point_in_triangle(&mut self.rng, vertices);
        self.add_point(position)
    }

    /// Triangulate and colorize the current points.
    ///
    /// # Errors
    ///
    /// Propagates triangulation failures and capacity violations.
    pub fn triangulate(&mut self) -> Result<&Triangulation, MeshError> {
        let triangulation = self.build_colored()?;
        let current: &Triangulation = self.current.insert(triangulation);
        Ok(current)
    }

    /// Colored triangles of the current points.
    ///
    /// # Errors
    ///
    /// Propagates triangulation failures and capacity violations.
    pub fn colored_triangles(&mut self) -> Result<Vec<ColoredTriangle>, MeshError> {
        self.refresh()?;
        match &self.current {
            Some(t) => t.colored_triangles(&self.cache),
            None => Err(MeshError::CacheMiss),
        }
    }

    /// Sum of the errors of the current triangles.
    ///
    /// # Errors
    ///
    /// Propagates triangulation failures and capacity violations.
    pub fn global_error(&mut self) -> Result<f64, MeshError> {
        self.refresh()?;
        match &self.current {
            Some(t) => t.global_error(&self.cache),
            None => Err(MeshError::CacheMiss),
        }
    }

    /// Run `n` steps and return their reports.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step and returns its error.
    pub fn run(&mut self, n: usize) -> Result<Vec<StepReport>, MeshError> {
        (0..n).map(|_| self.step()).collect()
    }

    /// Advance one annealing iteration.
    ///
    /// # Errors
    ///
    /// Propagates triangulation failures, capacity violations and cache
    /// misses; the points are left at their last accepted positions.
    pub fn step(&mut self) -> Result<StepReport, MeshError> {
        let started = Instant::now();
        let stats_before = self.cache.stats();
        let temperature = self.temperature;
        for point in &mut self.points {
            point.clear_neighbors();
        }

        // Snapshot. A's results are copied out now because colorizing B may
        // evict them from the cache.
        let a = self.build_colored()?;
        let a_results = a.results(&self.cache)?;
        let global_error: f64 = a_results.iter().map(|r| r.error).sum();

        // Perturb.
        let ctx = self.move_context();
        let movement = self.config.movement;
        let mut moved = Vec::new();
        for (i, point) in self.points.iter_mut().enumerate() {
            if point.is_fixed() {
                continue;
            }
            let target = movement.propose(point, &ctx, &mut self.rng);
            point.move_to(target)?;
            moved.push(i);
        }

        // Retriangulate.
        let b = match self.build_colored() {
            Ok(b) => b,
            Err(e) => {
                self.revert_all();
                return Err(e);
            }
        };
        a.assign_neighbors(&mut self.points);
        b.assign_neighbors(&mut self.points);
        let b_results = match b.results(&self.cache) {
            Ok(results) => results,
            Err(e) => {
                self.revert_all();
                return Err(e);
            }
        };

        // Compare.
        let before = a.neighborhood_errors_from(&self.points, &a_results);
        let after = b.neighborhood_errors_from(&self.points, &b_results);

        // Accept or reject.
        let history_len = self.config.history_len;
        let mut accepted = 0;
        for &i in &moved {
            let take = improves(before[i], after[i]);
            let point = &mut self.points[i];
            movement.settle(
                point,
                Outcome {
                    accepted: take,
                    error: after[i].error,
                },
                &ctx,
            );
            if take {
                point.commit(history_len);
                point.set_error(after[i].error);
                accepted += 1;
            } else {
                point.revert();
                point.set_error(before[i].error);
            }
        }
        let rejected = moved.len() - accepted;
        self.current = None;

        // Purge.
        let chance = self.config.purge_probability * temperature / self.config.initial_temperature;
        let (purged, split) = if self.rng.random::<f64>() < chance {
            self.purge()?
        } else {
            (0, 0)
        };

        self.temperature *= self.config.temperature_multiplier;
        self.iteration += 1;

        let stats = self.cache.stats();
        let report = StepReport {
            iteration: self.iteration,
            temperature,
            global_error,
            accepted,
            rejected,
            purged,
            split,
            triangles: b.len(),
            points: self.points.len(),
            cache: CacheStats {
                hits: stats.hits - stats_before.hits,
                misses: stats.misses - stats_before.misses,
                evictions: stats.evictions - stats_before.evictions,
            },
            duration: started.elapsed(),
        };
        log::debug!(
            "step {}: accepted {accepted}/{}, error {global_error:.1}, cache hits {} misses {} evictions {}",
            report.iteration,
            moved.len(),
            report.cache.hits,
            report.cache.misses,
            report.cache.evictions,
        );
        Ok(report)
    }

    /// Remove up to `purge_count` of the lowest-error movable points and
    /// split up to as many of the highest-error triangles, then
    /// retriangulate.
    ///
    /// Only triangles with an error above `split_error_threshold` that
    /// cover at least one pixel and [`MIN_SPLIT_AREA`] square pixels are
    /// split. The fixed corners are never
    /// removed, so the mesh keeps at least four points.
    ///
    /// Returns `(removed, split)`.
    ///
    /// # Errors
    ///
    /// Propagates triangulation failures and capacity violations.
    pub fn purge(&mut self) -> Result<(usize, usize), MeshError> {
        let budget = self.config.purge_count;
        let triangulation = self.build_colored()?;
        let point_errors = triangulation.per_point_error(self.points.len(), &self.cache)?;
        let triangle_results = triangulation.results(&self.cache)?;

        let mut removable: Vec<usize> = (0..self.points.len())
            .filter(|&i| !self.points[i].is_fixed())
            .collect();
        removable.sort_by(|&a, &b| point_errors[a].total_cmp(&point_errors[b]));
        let max_removed = self.points.len().saturating_sub(MIN_POINTS);
        removable.truncate(budget.min(max_removed));

        let mut worst: Vec<usize> = (0..triangle_results.len())
            .filter(|&i| {
                triangulation.triangle_vertices(i).is_some_and(|v| {
                    splittable(&triangle_results[i], &v, self.config.split_error_threshold)
                })
            })
            .collect();
        worst.sort_by(|&a, &b| triangle_results[b].error.total_cmp(&triangle_results[a].error));
        worst.truncate(budget);
        let bounds = self.dimensions.max_position();
        let spawned: Vec<Position> = worst
            .iter()
            .filter_map(|&i| triangulation.triangle_vertices(i))
            .map(|vertices| rand_point_in_triangle(&mut self.rng, &vertices).clamp_to(bounds))
            .collect();

        removable.sort_unstable_by(|a, b| b.cmp(a));
        for &i in &removable {
            self.points.remove(i);
        }
        for &position in &spawned {
            self.points.push(Point::movable_with_velocity(position, &mut self.rng));
        }

        log::info!(
            "purge at T={:.4}: removed {} points, split {} triangles, {} points remain",
            self.temperature,
            removable.len(),
            spawned.len(),
            self.points.len()
        );
        self.current = None;
        self.triangulate()?;
        Ok((removable.len(), spawned.len()))
    }

    fn build_colored(&mut self) -> Result<Triangulation, MeshError> {
        let mut triangulation = Triangulation::build(
            &self.points,
            &self.triangulator,
            self.config.cache_capacity,
            self.config.max_triangulation_attempts,
        )?;
        self.colorize(&mut triangulation);
        Ok(triangulation)
    }

    fn colorize(&mut self, triangulation: &mut Triangulation) {
        triangulation.resolve_missing(&mut self.cache);
        triangulation.colorize_stack(
            &self.image,
            &self.config.colorizer,
            self.config.error_metric,
            &mut self.cache,
            self.config.parallel,
        );
    }

    /// Make sure `current` matches the points and is fully cached.
    fn refresh(&mut self) -> Result<(), MeshError> {
        match self.current.take() {
            Some(mut t) => {
                self.colorize(&mut t);
                self.current = Some(t);
            }
            None => {
                self.triangulate()?;
            }
        }
        Ok(())
    }

    fn move_context(&self) -> MoveContext {
        MoveContext {
            temperature: self.temperature,
            bounds: self.dimensions.max_position(),
            swarm_attraction: self.config.swarm_attraction,
            swarm_decay: self.config.swarm_decay,
        }
    }

    fn revert_all(&mut self) {
        for point in &mut self.points {
            point.revert();
        }
        self.current = None;
    }

    fn point_at(&self, index: usize) -> Result<&Point, MeshError> {
        self.points.get(index).ok_or_else(|| {
            MeshError::InvalidOperation(format!(
                "point index {index} out of range for {} points",
                self.points.len()
            ))
        })
    }

    fn check_in_bounds(&self, position: Position) -> Result<(), MeshError> {
        let far = self.dimensions.max_position();
        let inside = position.is_finite()
            && (0.0..=far.x).contains(&position.x)
            && (0.0..=far.y).contains(&position.y);
        if inside {
            Ok(())
        } else {
            Err(MeshError::InvalidOperation(format!(
                "position ({}, {}) is outside the {}x{} image",
                position.x, position.y, self.dimensions.width, self.dimensions.height
            )))
        }
    }
}

/// Whether a purge may split this triangle.
fn splittable(result: &TriangleResult, vertices: &TriangleVertices, threshold: f64) -> bool {
    !result.is_degenerate() && result.error > threshold && vertices.area() >= MIN_SPLIT_AREA
}

/// A move is taken only if the new neighborhood is fully known and its
/// error is strictly lower. Zero-pixel triangles add nothing to either
/// side's error.
fn improves(before: NeighborhoodError, after: NeighborhoodError) -> bool {
    after.unknown == 0 && after.error < before.error
}
