//! Mesh evolution parameters.

use serde::{Deserialize, Serialize};

use crate::colorize::{ColorizerKind, ErrorMetric};
use crate::movement::MovementKind;
use crate::types::MeshError;

/// Smallest mesh the engine will keep: the four fixed image corners.
pub const MIN_POINTS: usize = 4;

/// Configuration for a [`Mesh`](crate::Mesh).
///
/// Unknown fields are rejected and missing fields take their defaults, so
/// a partial JSON document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeshConfig {
    /// Total number of points, the four fixed corners included.
    pub point_count: usize,

    /// Starting perturbation radius in pixels.
    pub initial_temperature: f64,

    /// Factor applied to the temperature after every step. Must lie in
    /// `(0, 1)`.
    pub temperature_multiplier: f64,

    /// Purge probability at the initial temperature. The effective chance
    /// scales linearly with `temperature / initial_temperature`.
    pub purge_probability: f64,

    /// Maximum number of points removed (and triangles split) by one purge.
    pub purge_count: usize,

    /// Only triangles with an error strictly above this are split.
    pub split_error_threshold: f64,

    /// Number of triangle results the LRU cache holds. Must exceed the
    /// triangle count of every triangulation.
    pub cache_capacity: usize,

    /// Colorize cache misses on the rayon pool.
    pub parallel: bool,

    /// How points are perturbed.
    pub movement: MovementKind,

    /// Which rasterizer attributes pixels to triangles.
    pub colorizer: ColorizerKind,

    /// How triangle error is reported.
    pub error_metric: ErrorMetric,

    /// Attempts per triangulation before giving up.
    pub max_triangulation_attempts: u32,

    /// Accepted positions remembered per point.
    pub history_len: usize,

    /// Swarm steering strength toward the best position.
    pub swarm_attraction: f64,

    /// Swarm best-error growth per step.
    pub swarm_decay: f64,
}

impl MeshConfig {
    pub const DEFAULT_POINT_COUNT: usize = 500;
    pub const DEFAULT_INITIAL_TEMPERATURE: f64 = 5.0;
    pub const DEFAULT_TEMPERATURE_MULTIPLIER: f64 = 0.9997;
    pub const DEFAULT_PURGE_PROBABILITY: f64 = 0.1;
    pub const DEFAULT_PURGE_COUNT: usize = 10;
    pub const DEFAULT_SPLIT_ERROR_THRESHOLD: f64 = 0.0;
    pub const DEFAULT_CACHE_CAPACITY: usize = 65_536;
    pub const DEFAULT_MAX_TRIANGULATION_ATTEMPTS: u32 = 3;
    pub const DEFAULT_HISTORY_LEN: usize = 8;
    pub const DEFAULT_SWARM_ATTRACTION: f64 = 1.0;
    pub const DEFAULT_SWARM_DECAY: f64 = 1.05;

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`MeshError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), MeshError> {
        fn invalid(message: String) -> Result<(), MeshError> {
            Err(MeshError::InvalidConfig(message))
        }

        if self.point_count < MIN_POINTS {
            return invalid(format!(
                "point_count must be at least {MIN_POINTS}, got {}",
                self.point_count
            ));
        }
        if !(self.initial_temperature.is_finite() && self.initial_temperature > 0.0) {
            return invalid(format!(
                "initial_temperature must be positive, got {}",
                self.initial_temperature
            ));
        }
        if !(self.temperature_multiplier > 0.0 && self.temperature_multiplier < 1.0) {
            return invalid(format!(
                "temperature_multiplier must lie in (0, 1), got {}",
                self.temperature_multiplier
            ));
        }
        if !(0.0..=1.0).contains(&self.purge_probability) {
            return invalid(format!(
                "purge_probability must lie in [0, 1], got {}",
                self.purge_probability
            ));
        }
        if !self.split_error_threshold.is_finite() {
            return invalid("split_error_threshold must be finite".to_string());
        }
        if self.cache_capacity == 0 {
            return invalid("cache_capacity must be positive".to_string());
        }
        if self.max_triangulation_attempts == 0 {
            return invalid("max_triangulation_attempts must be at least 1".to_string());
        }
        if !self.swarm_attraction.is_finite() || self.swarm_attraction < 0.0 {
            return invalid(format!(
                "swarm_attraction must be non-negative, got {}",
                self.swarm_attraction
            ));
        }
        if !(self.swarm_decay.is_finite() && self.swarm_decay > 0.0) {
            return invalid(format!(
                "swarm_decay must be positive, got {}",
                self.swarm_decay
            ));
        }
        Ok(())
    }
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            point_count: Self::DEFAULT_POINT_COUNT,
            initial_temperature: Self::DEFAULT_INITIAL_TEMPERATURE,
            temperature_multiplier: Self::DEFAULT_TEMPERATURE_MULTIPLIER,
            purge_probability: Self::DEFAULT_PURGE_PROBABILITY,
            purge_count: Self::DEFAULT_PURGE_COUNT,
            split_error_threshold: Self::DEFAULT_SPLIT_ERROR_THRESHOLD,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            parallel: true,
            movement: MovementKind::default(),
            colorizer: ColorizerKind::default(),
            error_metric: ErrorMetric::default(),
            max_triangulation_attempts: Self::DEFAULT_MAX_TRIANGULATION_ATTEMPTS,
            history_len: Self::DEFAULT_HISTORY_LEN,
            swarm_attraction: Self::DEFAULT_SWARM_ATTRACTION,
            swarm_decay: Self::DEFAULT_SWARM_DECAY,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        MeshConfig::default().validate().unwrap();
    }

    #[test]
    fn default_values() {
        let config = MeshConfig::default();
        assert_eq!(config.point_count, 500);
        assert_eq!(config.cache_capacity, 65_536);
        assert_eq!(config.movement, MovementKind::AnnealingShift);
        assert_eq!(config.colorizer, ColorizerKind::Scanline);
        assert_eq!(config.error_metric, ErrorMetric::Absolute);
        assert!(config.parallel);
    }

    #[test]
    fn too_few_points_is_rejected() {
        let config = MeshConfig {
            point_count: 3,
            ..MeshConfig::default()
        };
        assert!(matches!(config.validate(), Err(MeshError::InvalidConfig(_))));
    }

    #[test]
    fn multiplier_outside_unit_interval_is_rejected() {
        for multiplier in [0.0, 1.0, 1.5, f64::NAN] {
            let config = MeshConfig {
                temperature_multiplier: multiplier,
                ..MeshConfig::default()
            };
            assert!(
                config.validate().is_err(),
                "multiplier {multiplier} should be rejected"
            );
        }
    }

    #[test]
    fn zero_attempts_is_rejected() {
        let config = MeshConfig {
            max_triangulation_attempts: 0,
            ..MeshConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config: MeshConfig =
            serde_json::from_str(r#"{"point_count": 64, "movement": "JitterShift"}"#).unwrap();
        assert_eq!(config.point_count, 64);
        assert_eq!(config.movement, MovementKind::JitterShift);
        assert_eq!(config.cache_capacity, MeshConfig::DEFAULT_CACHE_CAPACITY);
    }

    #[test]
    fn unknown_json_field_is_rejected() {
        let result: Result<MeshConfig, _> = serde_json::from_str(r#"{"points": 64}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serde_round_trip() {
        let config = MeshConfig {
            parallel: false,
            colorizer: ColorizerKind::Mask,
            ..MeshConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: MeshConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }
}
