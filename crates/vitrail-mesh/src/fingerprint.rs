//! Triangle fingerprints: stable cache keys for triangles that are rebuilt
//! on every triangulation.
//!
//! A triangle has no identity across triangulation runs other than where
//! its corners are. The fingerprint quantizes the three corners onto a
//! `1 / QUANTIZATION_STEPS` pixel grid, sorts them so that vertex order
//! does not matter, and hashes the result with 128-bit SipHash-1-3.
//! Coordinates are never mutated in place by the quantization; it only
//! affects the key.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip128::{Hasher128, SipHasher13};

use crate::types::TriangleVertices;

/// Grid subdivisions per pixel used before hashing.
pub const QUANTIZATION_STEPS: f64 = 1024.0;

/// Fixed SipHash keys. Fingerprints only need to be stable within one
/// process, but fixed keys keep them reproducible across runs too.
const KEY_0: u64 = 0x7669_7472_6169_6c00;
const KEY_1: u64 = 0x7472_6961_6e67_6c65;

/// Canonical, order-independent hash of a triangle's quantized corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(u128);

impl Fingerprint {
    /// Fingerprint the given triangle.
    #[must_use]
    pub fn of(vertices: &TriangleVertices) -> Self {
        let mut keys = vertices.corners().map(|p| (quantize(p.x), quantize(p.y)));
        keys.sort_unstable();

        let mut hasher = SipHasher13::new_with_keys(KEY_0, KEY_1);
        for (x, y) in keys {
            hasher.write_i64(x);
            hasher.write_i64(y);
        }
        Self(hasher.finish128().as_u128())
    }

    /// The raw 128-bit hash value.
    #[must_use]
    pub const fn value(self) -> u128 {
        self.0
    }
}

#[allow(clippy::cast_possible_truncation)]
fn quantize(coordinate: f64) -> i64 {
    (coordinate * QUANTIZATION_STEPS).round() as i64
}
