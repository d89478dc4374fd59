//! Mesh points: positions plus the bookkeeping the optimizer needs.
//!
//! Points live in an index-stable `Vec` owned by the mesh. Triangles refer
//! to them by index only, and the neighbor set each point carries is
//! rebuilt on every step from the triangulations of that step.

use std::collections::{BTreeSet, VecDeque};

use rand::Rng;

use crate::types::{MeshError, Position};

/// A vertex of the mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    position: Position,
    fixed: bool,
    accepted: Position,
    error: f64,
    velocity: [f64; 2],
    best_position: Position,
    best_error: f64,
    history: VecDeque<Position>,
    neighbors: BTreeSet<usize>,
}

impl Point {
    fn with_flag(position: Position, fixed: bool) -> Self {
        Self {
            position,
            fixed,
            accepted: position,
            error: 0.0,
            velocity: [0.0, 0.0],
            best_position: position,
            best_error: f64::INFINITY,
            history: VecDeque::new(),
            neighbors: BTreeSet::new(),
        }
    }

    /// A point that can never move or be removed (the image corners).
    #[must_use]
    pub fn fixed(position: Position) -> Self {
        Self::with_flag(position, true)
    }

    /// A movable point at the given position.
    #[must_use]
    pub fn movable(position: Position) -> Self {
        Self::with_flag(position, false)
    }

    /// A movable point at `position` heading in a random direction.
    pub fn movable_with_velocity<R: Rng + ?Sized>(position: Position, rng: &mut R) -> Self {
        let mut point = Self::movable(position);
        let angle = rng.random::<f64>() * std::f64::consts::TAU;
        point.velocity = [angle.cos(), angle.sin()];
        point
    }

    /// A movable point placed uniformly in `[0, bounds.x] x [0, bounds.y]`
    /// with a random unit velocity.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, bounds: Position) -> Self {
        let position = Position::new(
            rng.random::<f64>() * bounds.x,
            rng.random::<f64>() * bounds.y,
        );
        Self::movable_with_velocity(position, rng)
    }

    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Position committed by the last accepted move.
    #[must_use]
    pub const fn last_accepted(&self) -> Position {
        self.accepted
    }

    /// Aggregated error of the incident triangles, as of the last
    /// assignment by the mesh.
    #[must_use]
    pub const fn error(&self) -> f64 {
        self.error
    }

    #[must_use]
    pub const fn velocity(&self) -> [f64; 2] {
        self.velocity
    }

    /// Best position seen by the swarm strategy and its (decaying) error.
    #[must_use]
    pub const fn best(&self) -> (Position, f64) {
        (self.best_position, self.best_error)
    }

    /// Recently accepted positions, oldest first.
    pub fn history(&self) -> impl ExactSizeIterator<Item = &Position> {
        self.history.iter()
    }

    /// Indices of every point sharing a triangle with this one during the
    /// current step, itself included.
    #[must_use]
    pub const fn neighbors(&self) -> &BTreeSet<usize> {
        &self.neighbors
    }

    /// Move to `position` without committing it.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidOperation`] for a fixed point.
    pub fn move_to(&mut self, position: Position) -> Result<(), MeshError> {
        if self.fixed {
            return Err(MeshError::InvalidOperation(format!(
                "cannot move fixed point at ({}, {})",
                self.position.x, self.position.y
            )));
        }
        self.position = position;
        Ok(())
    }

    /// Commit the current position as accepted and record it in the
    /// history, keeping at most `history_len` entries.
    pub fn commit(&mut self, history_len: usize) {
        self.accepted = self.position;
        if history_len == 0 {
            return;
        }
        while self.history.len() >= history_len {
            self.history.pop_front();
        }
        self.history.push_back(self.position);
    }

    /// Return to the last accepted position.
    pub const fn revert(&mut self) {
        self.position = self.accepted;
    }

    pub(crate) const fn set_error(&mut self, error: f64) {
        self.error = error;
    }

    pub(crate) const fn set_velocity(&mut self, velocity: [f64; 2]) {
        self.velocity = velocity;
    }

    pub(crate) const fn set_best(&mut self, position: Position, error: f64) {
        self.best_position = position;
        self.best_error = error;
    }

    pub(crate) fn add_neighbors(&mut self, indices: &[usize; 3]) {
        self.neighbors.extend(indices.iter().copied());
    }

    pub(crate) fn clear_neighbors(&mut self) {
        self.neighbors.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;

    #[test]
    fn fixed_point_refuses_to_move() {
        let mut p = Point::fixed(Position::new(0.0, 0.0));
        let result = p.move_to(Position::new(5.0, 5.0));
        assert!(matches!(result, Err(MeshError::InvalidOperation(_))));
        assert_eq!(p.position(), Position::new(0.0, 0.0));
    }

    #[test]
    fn movable_point_moves_and_reverts() {
        let mut p = Point::movable(Position::new(1.0, 1.0));
        p.move_to(Position::new(2.0, 3.0)).unwrap();
        assert_eq!(p.position(), Position::new(2.0, 3.0));
        assert_eq!(p.last_accepted(), Position::new(1.0, 1.0));
        p.revert();
        assert_eq!(p.position(), Position::new(1.0, 1.0));
    }

    #[test]
    fn commit_updates_accepted_and_history() {
        let mut p = Point::movable(Position::new(0.0, 0.0));
        for i in 1..=5 {
            p.move_to(Position::new(f64::from(i), 0.0)).unwrap();
            p.commit(3);
        }
        assert_eq!(p.last_accepted(), Position::new(5.0, 0.0));
        let xs: Vec<f64> = p.history().map(|h| h.x).collect();
        assert_eq!(xs, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn zero_history_len_keeps_nothing() {
        let mut p = Point::movable(Position::new(0.0, 0.0));
        p.commit(0);
        assert_eq!(p.history().len(), 0);
    }

    #[test]
    fn random_point_is_in_bounds_with_unit_velocity() {
        let mut rng = Pcg32::seed_from_u64(3);
        let bounds = Position::new(64.0, 32.0);
        for _ in 0..200 {
            let p = Point::random(&mut rng, bounds);
            let pos = p.position();
            assert!((0.0..=64.0).contains(&pos.x));
            assert!((0.0..=32.0).contains(&pos.y));
            assert!(!p.is_fixed());
            let [vx, vy] = p.velocity();
            assert!((vx.hypot(vy) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn movable_with_velocity_keeps_position() {
        let mut rng = Pcg32::seed_from_u64(4);
        let p = Point::movable_with_velocity(Position::new(7.0, 2.5), &mut rng);
        assert_eq!(p.position(), Position::new(7.0, 2.5));
        assert_eq!(p.last_accepted(), Position::new(7.0, 2.5));
        let [vx, vy] = p.velocity();
        assert!((vx.hypot(vy) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn neighbors_accumulate_until_cleared() {
        let mut p = Point::movable(Position::new(0.0, 0.0));
        p.add_neighbors(&[0, 1, 2]);
        p.add_neighbors(&[0, 2, 5]);
        assert_eq!(p.neighbors().iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 5]);
        p.clear_neighbors();
        assert!(p.neighbors().is_empty());
    }
}
