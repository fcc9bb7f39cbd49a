//! Microbe AR - augmented-reality targeting and wave-combat engine
//!
//! Core modules:
//! - `sim`: Simulation (orientation fusion, projection, waves, combat, loop)
//! - `platform`: Sensor permission flows and the browser host
//! - `tuning`: Data-driven game balance
//! - `settings`: Player preferences

pub mod platform;
pub mod settings;
pub mod sim;
pub mod tuning;

pub use settings::{QualityPreset, Settings};
pub use tuning::{Tuning, TuningError};

use glam::Vec3;

/// Engine configuration constants
pub mod consts {
    /// Fixed motion tick (ms)
    pub const MOTION_TICK_MS: f64 = 16.0;
    /// Maximum catch-up firings per timer per frame
    pub const MAX_CATCH_UP: u32 = 8;
    /// Largest frame delta fed to the simulation clock (ms)
    pub const MAX_FRAME_DELTA_MS: f64 = 100.0;

    /// Lateral wobble speed of drifting microbes (world units/s)
    pub const WOBBLE_SPEED: f32 = 0.35;
    /// Wobble angular frequency (rad/ms)
    pub const WOBBLE_FREQ: f32 = 0.003;
    /// Length of one Tank/Boss flicker window (ms)
    pub const FLICKER_WINDOW_MS: f64 = 400.0;

    /// Vertical field of view of the pinhole camera (degrees)
    pub const FOV_DEGREES: f32 = 60.0;
    /// Depth at or beyond which a point counts as behind the camera
    pub const NEAR_EPSILON: f32 = 0.01;
}

/// Wrap an angle into [0, 2π)
#[inline]
pub fn wrap_angle(angle: f32) -> f32 {
    use std::f32::consts::TAU;
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Signed smallest difference `a - b`, in [-π, π)
#[inline]
pub fn angle_delta(a: f32, b: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    (a - b + PI).rem_euclid(TAU) - PI
}

/// Point in world space at a given azimuth (yaw convention), distance and height.
///
/// Azimuth 0 faces down -Z; positive azimuth turns left.
#[inline]
pub fn azimuth_to_world(azimuth: f32, distance: f32, height: f32) -> Vec3 {
    Vec3::new(-azimuth.sin() * distance, height, -azimuth.cos() * distance)
}
