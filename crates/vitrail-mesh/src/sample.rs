//! Random sampling helpers shared by the movement strategies and the
//! triangle splitter.

use rand::Rng;

use crate::types::{Position, TriangleVertices};

/// Uniform random point inside `triangle`.
///
/// Draws barycentric weights `(s, t)` from the unit square and rejects
/// pairs with `s + t > 1`, so the result is `a + s (b - a) + t (c - a)`
/// with `s, t >= 0` and `s + t <= 1`.
pub fn rand_point_in_triangle<R: Rng + ?Sized>(rng: &mut R, triangle: &TriangleVertices) -> Position {
    let [a, b, c] = *triangle.corners();
    let (s, t) = loop {
        let s: f64 = rng.random();
        let t: f64 = rng.random();
        if s + t <= 1.0 {
            break (s, t);
        }
    };
    Position::new(
        (c.x - a.x).mul_add(t, (b.x - a.x).mul_add(s, a.x)),
        (c.y - a.y).mul_add(t, (b.y - a.y).mul_add(s, a.y)),
    )
}

/// Uniform random offset inside the disk of the given radius.
pub fn rand_offset_in_disk<R: Rng + ?Sized>(rng: &mut R, radius: f64) -> (f64, f64) {
    loop {
        let dx = rng.random::<f64>().mul_add(2.0, -1.0);
        let dy = rng.random::<f64>().mul_add(2.0, -1.0);
        if dx.mul_add(dx, dy * dy) <= 1.0 {
            return (dx * radius, dy * radius);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;

    /// Barycentric coordinates `(u, v, w)` of `p` with respect to `triangle`,
    /// such that `p = u a + v b + w c`. `None` for a zero-area triangle.
    fn barycentric(p: Position, triangle: &TriangleVertices) -> Option<(f64, f64, f64)> {
        let [a, b, c] = *triangle.corners();
        let det = (b.y - c.y).mul_add(a.x - c.x, (c.x - b.x) * (a.y - c.y));
        if det.abs() < f64::EPSILON {
            return None;
        }
        let u = (b.y - c.y).mul_add(p.x - c.x, (c.x - b.x) * (p.y - c.y)) / det;
        let v = (c.y - a.y).mul_add(p.x - c.x, (a.x - c.x) * (p.y - c.y)) / det;
        Some((u, v, 1.0 - u - v))
    }

    const TOLERANCE: f64 = 1e-6;

    fn coordinate() -> impl Strategy<Value = f64> {
        0.0..500.0
    }

    fn triangle() -> impl Strategy<Value = TriangleVertices> {
        prop::array::uniform6(coordinate()).prop_map(|c| {
            TriangleVertices::new(
                Position::new(c[0], c[1]),
                Position::new(c[2], c[3]),
                Position::new(c[4], c[5]),
            )
        })
    }

    #[test]
    fn barycentric_of_corners() {
        let t = TriangleVertices::new(
            Position::new(0.0, 0.0),
            Position::new(4.0, 0.0),
            Position::new(0.0, 4.0),
        );
        let (u, v, w) = barycentric(Position::new(0.0, 0.0), &t).unwrap();
        assert_relative_eq!(u, 1.0);
        assert_relative_eq!(v, 0.0);
        assert_relative_eq!(w, 0.0);
        let (u, v, w) = barycentric(Position::new(1.0, 1.0), &t).unwrap();
        assert_relative_eq!(u, 0.5);
        assert_relative_eq!(v, 0.25);
        assert_relative_eq!(w, 0.25);
    }

    #[test]
    fn barycentric_of_flat_triangle_is_none() {
        let t = TriangleVertices::new(
            Position::new(0.0, 0.0),
            Position::new(1.0, 1.0),
            Position::new(2.0, 2.0),
        );
        assert!(barycentric(Position::new(1.0, 1.0), &t).is_none());
    }

    #[test]
    fn disk_offsets_stay_within_radius() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..1000 {
            let (dx, dy) = rand_offset_in_disk(&mut rng, 3.5);
            assert!(dx.hypot(dy) <= 3.5 + TOLERANCE);
        }
    }

    proptest! {
        /// Property: sampled points have barycentric coordinates in [0, 1].
        #[test]
        fn prop_sample_lies_in_triangle(t in triangle(), seed in any::<u64>()) {
            prop_assume!(t.area() > 1.0);
            let mut rng = Pcg32::seed_from_u64(seed);
            let p = rand_point_in_triangle(&mut rng, &t);
            let (u, v, w) = barycentric(p, &t).unwrap();
            for coord in [u, v, w] {
                prop_assert!((-TOLERANCE..=1.0 + TOLERANCE).contains(&coord), "coordinate {coord}");
            }
            prop_assert!((u + v + w - 1.0).abs() < TOLERANCE);
        }
    }
}
