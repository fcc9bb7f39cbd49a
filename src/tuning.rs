//! Data-driven game balance
//!
//! Every timing and scoring constant the engine uses lives here so a host can
//! ship a JSON override without rebuilding. Missing fields fall back to the
//! defaults below.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{FOV_DEGREES, MOTION_TICK_MS};

/// Errors produced while loading tuning overrides
#[derive(Debug, Error)]
pub enum TuningError {
    #[error("tuning JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid tuning value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Gameplay and timing constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tuning {
    // === Camera ===
    /// Vertical field of view (degrees)
    pub fov_degrees: f32,
    /// Margin around the viewport still counted as visible (px)
    pub view_margin_px: f32,

    // === Combat ===
    /// Crosshair hit radius around the viewport centre (px)
    pub hit_radius_px: f32,
    /// Starting lives
    pub lives: u8,
    /// Combo resets after this long without a kill (ms)
    pub combo_window_ms: f64,
    /// Distance from the origin below which an entity has escaped
    pub escape_distance: f32,
    /// Maximum entity age before it escapes (ms)
    pub max_entity_age_ms: f64,
    /// Particles emitted by a kill
    pub kill_particles: usize,
    /// Particles emitted by a non-lethal hit
    pub hit_particles: usize,

    // === Waves ===
    /// Pause between waves (ms)
    pub intermission_ms: f64,
    /// Spawn ring inner/outer distance
    pub spawn_distance: (f32, f32),
    /// Max azimuth offset from current yaw for spawns (degrees)
    pub spawn_spread_degrees: f32,
    /// Max vertical jitter for spawns
    pub spawn_height: f32,

    // === Power-ups ===
    /// Power-up lifetime in the world (ms)
    pub power_up_ttl_ms: f64,
    /// Minimum time between power-up spawns (ms)
    pub power_up_cooldown_ms: f64,
    /// Max live power-ups at once
    pub max_live_power_ups: usize,
    /// Chance per spawn check that a power-up appears
    pub power_up_chance: f64,
    /// Active durations (ms)
    pub freeze_ms: f64,
    pub rapid_ms: f64,
    pub double_ms: f64,
    pub shield_ms: f64,

    // === Timers ===
    pub motion_tick_ms: f64,
    pub wave_check_ms: f64,
    pub power_up_sweep_ms: f64,
    pub combo_check_ms: f64,
    pub power_up_spawn_ms: f64,
    pub permission_poll_ms: f64,

    // === Sensors ===
    /// Gyroscope implicit detection window (ms)
    pub gyro_detect_ms: f64,
    /// Orientation event verification window (ms)
    pub orientation_verify_ms: f64,
    /// Wait-for-data window after explicit consent (ms)
    pub consent_data_wait_ms: f64,
    /// Camera readiness timeout (ms)
    pub camera_timeout_ms: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            fov_degrees: FOV_DEGREES,
            view_margin_px: 200.0,

            hit_radius_px: 150.0,
            lives: 3,
            combo_window_ms: 2000.0,
            escape_distance: 0.5,
            max_entity_age_ms: 30_000.0,
            kill_particles: 20,
            hit_particles: 6,

            intermission_ms: 3000.0,
            spawn_distance: (20.0, 30.0),
            spawn_spread_degrees: 60.0,
            spawn_height: 1.5,

            power_up_ttl_ms: 15_000.0,
            power_up_cooldown_ms: 25_000.0,
            max_live_power_ups: 2,
            power_up_chance: 0.3,
            freeze_ms: 5000.0,
            rapid_ms: 8000.0,
            double_ms: 10_000.0,
            shield_ms: 8000.0,

            motion_tick_ms: MOTION_TICK_MS,
            wave_check_ms: 500.0,
            power_up_sweep_ms: 1000.0,
            combo_check_ms: 100.0,
            power_up_spawn_ms: 5000.0,
            permission_poll_ms: 100.0,

            gyro_detect_ms: 500.0,
            orientation_verify_ms: 1000.0,
            consent_data_wait_ms: 3000.0,
            camera_timeout_ms: 5000.0,
        }
    }
}

impl Tuning {
    /// Parse a JSON override and validate it
    pub fn from_json(json: &str) -> Result<Self, TuningError> {
        let tuning: Tuning = serde_json::from_str(json)?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reject values that would stall or break the simulation
    pub fn validate(&self) -> Result<(), TuningError> {
        if !(1.0..179.0).contains(&self.fov_degrees) {
            return Err(TuningError::Invalid {
                field: "fov_degrees",
                reason: format!("{} is outside 1..179", self.fov_degrees),
            });
        }
        if self.spawn_distance.0 <= self.escape_distance
            || self.spawn_distance.1 < self.spawn_distance.0
        {
            return Err(TuningError::Invalid {
                field: "spawn_distance",
                reason: format!("{:?} must be an ordered range beyond the escape distance", self.spawn_distance),
            });
        }
        if self.lives == 0 {
            return Err(TuningError::Invalid {
                field: "lives",
                reason: "a run needs at least one life".to_string(),
            });
        }
        let non_negative = [
            ("spawn_spread_degrees", self.spawn_spread_degrees),
            ("spawn_height", self.spawn_height),
        ];
        for (field, value) in non_negative {
            if value.is_nan() || value < 0.0 {
                return Err(TuningError::Invalid {
                    field,
                    reason: format!("must be zero or positive, got {value}"),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.power_up_chance) {
            return Err(TuningError::Invalid {
                field: "power_up_chance",
                reason: format!("{} is not a probability", self.power_up_chance),
            });
        }
        let intervals = [
            ("motion_tick_ms", self.motion_tick_ms),
            ("wave_check_ms", self.wave_check_ms),
            ("power_up_sweep_ms", self.power_up_sweep_ms),
            ("combo_check_ms", self.combo_check_ms),
            ("power_up_spawn_ms", self.power_up_spawn_ms),
            ("permission_poll_ms", self.permission_poll_ms),
        ];
        for (field, value) in intervals {
            if value <= 0.0 {
                return Err(TuningError::Invalid {
                    field,
                    reason: format!("interval must be positive, got {value}"),
                });
            }
        }
        Ok(())
    }

    /// Vertical FOV in radians
    pub fn fov_radians(&self) -> f32 {
        self.fov_degrees.to_radians()
    }
}
