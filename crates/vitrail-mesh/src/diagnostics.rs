//! Per-step diagnostics for the mesh evolution engine.
//!
//! Durations are serialized as fractional seconds (`f64`) so a report can
//! be written as a JSON line.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheStats;

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom("step duration must be finite and non-negative seconds")
        })
    }
}

/// What happened during one call to [`Mesh::step`](crate::Mesh::step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// 1-based index of the step.
    pub iteration: u64,
    /// Temperature the step perturbed with (before the decay).
    pub temperature: f64,
    /// Global error of the snapshot triangulation.
    pub global_error: f64,
    /// Movable points whose proposal was committed.
    pub accepted: usize,
    /// Movable points restored to their previous position.
    pub rejected: usize,
    /// Points removed by a purge (0 when no purge ran).
    pub purged: usize,
    /// Triangles split by a purge.
    pub split: usize,
    /// Triangle count of the perturbed triangulation.
    pub triangles: usize,
    /// Point count at the end of the step.
    pub points: usize,
    /// Cache activity during this step only.
    pub cache: CacheStats,
    /// Wall-clock duration of the step (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl StepReport {
    /// Fraction of movable points whose proposal was accepted.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> f64 {
        let total = self.accepted + self.rejected;
        if total == 0 {
            0.0
        } else {
            self.accepted as f64 / total as f64
        }
    }

    /// Cache hit rate within this step.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache.hits + self.cache.misses;
        if total == 0 {
            0.0
        } else {
            self.cache.hits as f64 / total as f64
        }
    }

    /// One-line human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut line = format!(
            "step {:>6}  T={:.4}  error={:.1}  accepted {}/{} ({:.0}%)  triangles={}  points={}  cache hit {:.0}% ({} evicted)  {:.2}ms",
            self.iteration,
            self.temperature,
            self.global_error,
            self.accepted,
            self.accepted + self.rejected,
            self.acceptance_rate() * 100.0,
            self.triangles,
            self.points,
            self.hit_rate() * 100.0,
            self.cache.evictions,
            duration_ms(self.duration),
        );
        if self.purged > 0 || self.split > 0 {
            line.push_str(&format!("  purged {} split {}", self.purged, self.split));
        }
        line
    }
}

fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
