//! Movement strategies: how the optimizer proposes new point positions.
//!
//! [`MovementKind`] selects a strategy at runtime and implements the
//! [`MovementStrategy`] trait, so the mesh dispatches on one value instead
//! of keeping a family of point types with duplicated fields.
//!
//! Every strategy works with the same accept/reject protocol: the mesh
//! calls [`propose`](MovementStrategy::propose) for each movable point,
//! retriangulates, and then reports the outcome through
//! [`settle`](MovementStrategy::settle).

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::point::Point;
use crate::sample::rand_offset_in_disk;
use crate::types::Position;

/// Selects how points are perturbed each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovementKind {
    /// Independent uniform offset in `[-T, T]` on each axis from the
    /// current position.
    JitterShift,
    /// Particle-swarm style: move along a unit velocity scaled by the
    /// temperature, steering the velocity toward the best position seen.
    SwarmVelocity,
    /// Uniform sample in the disk of radius `T` around the last accepted
    /// position.
    #[default]
    AnnealingShift,
}

/// Parameters shared by every proposal within one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveContext {
    /// Current annealing temperature (step radius in pixels).
    pub temperature: f64,
    /// Upper corner of the image; proposals are clamped into
    /// `[0, bounds.x] x [0, bounds.y]`.
    pub bounds: Position,
    /// How strongly the swarm velocity turns toward the best position.
    pub swarm_attraction: f64,
    /// Factor the remembered best error grows by each step, so stale
    /// optima are eventually forgotten.
    pub swarm_decay: f64,
}

/// Outcome of one proposal, as decided by the mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outcome {
    pub accepted: bool,
    /// Neighborhood error at the proposed position.
    pub error: f64,
}

/// Trait for point movement strategies.
pub trait MovementStrategy {
    /// Propose a new position for a movable point. The result is already
    /// clamped to the image bounds.
    fn propose<R: Rng + ?Sized>(&self, point: &Point, ctx: &MoveContext, rng: &mut R) -> Position;

    /// Update strategy state after the mesh accepted or rejected the
    /// proposal. Called before the point is committed or reverted.
    fn settle(&self, point: &mut Point, outcome: Outcome, ctx: &MoveContext);
}

impl MovementStrategy for MovementKind {
    fn propose<R: Rng + ?Sized>(&self, point: &Point, ctx: &MoveContext, rng: &mut R) -> Position {
        let t = ctx.temperature;
        let target = match *self {
            Self::JitterShift => {
                let dx = rng.random::<f64>().mul_add(2.0, -1.0) * t;
                let dy = rng.random::<f64>().mul_add(2.0, -1.0) * t;
                point.position().offset(dx, dy)
            }
            Self::SwarmVelocity => {
                let [vx, vy] = point.velocity();
                point.position().offset(vx * t, vy * t)
            }
            Self::AnnealingShift => {
                let (dx, dy) = rand_offset_in_disk(rng, t);
                point.last_accepted().offset(dx, dy)
            }
        };
        target.clamp_to(ctx.bounds)
    }

    fn settle(&self, point: &mut Point, outcome: Outcome, ctx: &MoveContext) {
        if *self != Self::SwarmVelocity {
            return;
        }
        let (best, best_error) = point.best();
        let (best, best_error) = if outcome.accepted && outcome.error < best_error {
            (point.position(), outcome.error)
        } else {
            (best, best_error)
        };
        point.set_best(best, best_error * ctx.swarm_decay);

        let [mut vx, mut vy] = point.velocity();
        let dx = best.x - point.position().x;
        let dy = best.y - point.position().y;
        let pull = dx.hypot(dy);
        if pull > f64::EPSILON {
            vx += dx / pull * ctx.swarm_attraction;
            vy += dy / pull * ctx.swarm_attraction;
        }
        let speed = vx.hypot(vy);
        if speed > f64::EPSILON {
            point.set_velocity([vx / speed, vy / speed]);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;

    fn ctx(temperature: f64) -> MoveContext {
        MoveContext {
            temperature,
            bounds: Position::new(100.0, 100.0),
            swarm_attraction: 1.0,
            swarm_decay: 1.05,
        }
    }

    #[test]
    fn default_is_annealing() {
        assert_eq!(MovementKind::default(), MovementKind::AnnealingShift);
    }

    #[test]
    fn annealing_stays_within_temperature_of_accepted() {
        let mut rng = Pcg32::seed_from_u64(11);
        let p = Point::movable(Position::new(50.0, 50.0));
        for _ in 0..500 {
            let target = MovementKind::AnnealingShift.propose(&p, &ctx(4.0), &mut rng);
            assert!(target.distance(p.last_accepted()) <= 4.0 + 1e-9);
        }
    }

    #[test]
    fn jitter_stays_within_square() {
        let mut rng = Pcg32::seed_from_u64(12);
        let p = Point::movable(Position::new(50.0, 50.0));
        for _ in 0..500 {
            let target = MovementKind::JitterShift.propose(&p, &ctx(2.0), &mut rng);
            assert!((target.x - 50.0).abs() <= 2.0);
            assert!((target.y - 50.0).abs() <= 2.0);
        }
    }

    #[test]
    fn proposals_are_clamped_to_bounds() {
        let mut rng = Pcg32::seed_from_u64(13);
        let p = Point::movable(Position::new(0.5, 99.5));
        for kind in [
            MovementKind::JitterShift,
            MovementKind::SwarmVelocity,
            MovementKind::AnnealingShift,
        ] {
            for _ in 0..200 {
                let t = kind.propose(&p, &ctx(10.0), &mut rng);
                assert!((0.0..=100.0).contains(&t.x), "{kind:?} x {}", t.x);
                assert!((0.0..=100.0).contains(&t.y), "{kind:?} y {}", t.y);
            }
        }
    }

    #[test]
    fn swarm_moves_along_velocity() {
        let mut rng = Pcg32::seed_from_u64(14);
        let mut p = Point::movable(Position::new(10.0, 10.0));
        p.set_velocity([1.0, 0.0]);
        let t = MovementKind::SwarmVelocity.propose(&p, &ctx(3.0), &mut rng);
        assert_eq!(t, Position::new(13.0, 10.0));
    }

    #[test]
    fn swarm_settle_records_best_and_turns_toward_it() {
        let c = ctx(1.0);
        let mut p = Point::movable(Position::new(10.0, 10.0));
        p.set_velocity([1.0, 0.0]);
        MovementKind::SwarmVelocity.settle(
            &mut p,
            Outcome {
                accepted: true,
                error: 5.0,
            },
            &c,
        );
        let (best, best_error) = p.best();
        assert_eq!(best, Position::new(10.0, 10.0));
        assert!((best_error - 5.0 * 1.05).abs() < 1e-12);

        // Wander off, then a rejected proposal steers back toward the best.
        p.move_to(Position::new(10.0, 20.0)).unwrap();
        MovementKind::SwarmVelocity.settle(
            &mut p,
            Outcome {
                accepted: false,
                error: 1.0,
            },
            &c,
        );
        let [vx, vy] = p.velocity();
        assert!(vy < 0.0, "velocity should point back up, got ({vx}, {vy})");
        assert!((vx.hypot(vy) - 1.0).abs() < 1e-12);
        assert_eq!(p.best().0, Position::new(10.0, 10.0));
    }

    #[test]
    fn non_swarm_settle_is_a_no_op() {
        let c = ctx(1.0);
        let mut p = Point::movable(Position::new(1.0, 1.0));
        let before = p.clone();
        MovementKind::AnnealingShift.settle(
            &mut p,
            Outcome {
                accepted: true,
                error: 0.0,
            },
            &c,
        );
        assert_eq!(p, before);
    }
}
