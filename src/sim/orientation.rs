//! Orientation estimator
//!
//! Fuses absolute device-orientation events and integrated gyroscope rates into
//! one camera pose. Absolute wins whenever its latest sample is complete; the
//! gyroscope covers platforms where absolute events are null; with neither the
//! pose stays frozen and the player aims by tapping.

use serde::{Deserialize, Serialize};

use super::camera::{CameraPose, PoseMode};
use crate::platform::permission::{
    ConsentModel, PermissionFlow, PermissionOutcome, PermissionStatus,
};
use crate::tuning::Tuning;
use crate::wrap_angle;

/// Longest gap integrated in one gyroscope step (s)
const MAX_GYRO_STEP_S: f32 = 0.1;

/// Absolute orientation event (degrees, each field nullable)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteSample {
    pub alpha: Option<f32>,
    pub beta: Option<f32>,
    pub gamma: Option<f32>,
}

impl AbsoluteSample {
    pub fn new(alpha: f32, beta: f32, gamma: f32) -> Self {
        Self {
            alpha: Some(alpha),
            beta: Some(beta),
            gamma: Some(gamma),
        }
    }

    /// Complete enough to drive the pose
    pub fn is_complete(&self) -> bool {
        self.alpha.is_some() && self.beta.is_some()
    }

    /// Normalized (yaw, pitch) if both alpha and beta are present
    pub fn to_yaw_pitch(&self) -> Option<(f32, f32)> {
        match (self.alpha, self.beta) {
            (Some(alpha), Some(beta)) => Some((alpha_to_yaw(alpha), beta_to_pitch(beta))),
            _ => None,
        }
    }
}

/// Gyroscope rotation rate (rad/s about the device axes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GyroSample {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Compass heading (degrees) to yaw in [0, 2π)
#[inline]
pub fn alpha_to_yaw(alpha: f32) -> f32 {
    wrap_angle(alpha.to_radians())
}

/// Front-back tilt (degrees) to pitch; upright phone maps to zero
#[inline]
pub fn beta_to_pitch(beta: f32) -> f32 {
    use std::f32::consts::FRAC_PI_2;
    ((beta - 90.0).to_radians()).clamp(-FRAC_PI_2, FRAC_PI_2)
}

/// Which sensors a platform exposes and how they unlock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorPlatform {
    pub consent: ConsentModel,
    pub gyroscope_available: bool,
}

impl Default for SensorPlatform {
    fn default() -> Self {
        Self {
            consent: ConsentModel::Implicit,
            gyroscope_available: true,
        }
    }
}

/// Sensor a consent prompt belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorKind {
    Orientation,
    Gyroscope,
}

/// Integrated gyroscope state
#[derive(Debug, Clone, Copy, Default)]
struct GyroTrack {
    yaw: f32,
    pitch: f32,
    seeded: bool,
    last_at: Option<f64>,
    samples: u32,
}

/// Sensor fusion and permission bookkeeping
pub struct OrientationEstimator {
    platform: SensorPlatform,
    orientation_flow: Box<dyn PermissionFlow>,
    gyro_flow: Option<Box<dyn PermissionFlow>>,
    last_absolute: Option<AbsoluteSample>,
    gyro: GyroTrack,
    pose: CameraPose,
    status: String,
}

impl OrientationEstimator {
    pub fn new(platform: SensorPlatform, tuning: &Tuning) -> Self {
        let orientation_flow = platform
            .consent
            .flow(tuning.orientation_verify_ms, tuning.consent_data_wait_ms);
        let gyro_flow = platform.gyroscope_available.then(|| {
            platform
                .consent
                .flow(tuning.gyro_detect_ms, tuning.consent_data_wait_ms)
        });
        Self {
            platform,
            orientation_flow,
            gyro_flow,
            last_absolute: None,
            gyro: GyroTrack::default(),
            pose: CameraPose::FROZEN,
            status: "Motion sensors not started".to_string(),
        }
    }

    /// Current pose (copied out whole)
    #[inline]
    pub fn pose(&self) -> CameraPose {
        self.pose
    }

    /// User-facing description of the sensor state
    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn platform(&self) -> SensorPlatform {
        self.platform
    }

    /// Begin both permission flows. Returns the sensors whose consent prompt
    /// the host must raise now.
    pub fn request_permissions(&mut self, now: f64, user_gesture: bool) -> Vec<SensorKind> {
        self.reset();
        let mut prompts = Vec::new();
        if self.orientation_flow.request(now, user_gesture) {
            prompts.push(SensorKind::Orientation);
        }
        if let Some(flow) = self.gyro_flow.as_mut() {
            if flow.request(now, user_gesture) {
                prompts.push(SensorKind::Gyroscope);
            }
        }
        self.status = "Checking motion sensors...".to_string();
        prompts
    }

    /// Platform answer to a consent prompt
    pub fn consent(&mut self, sensor: SensorKind, granted: bool, now: f64) {
        match sensor {
            SensorKind::Orientation => self.orientation_flow.consent(granted, now),
            SensorKind::Gyroscope => {
                if let Some(flow) = self.gyro_flow.as_mut() {
                    flow.consent(granted, now);
                }
            }
        }
    }

    /// Advance permission deadlines. Returns true once every flow is resolved.
    pub fn poll_permissions(&mut self, now: f64) -> bool {
        let orientation = self.orientation_flow.poll(now);
        let gyro = self.gyro_flow.as_mut().map(|f| f.poll(now));
        self.refresh_pose();
        orientation.is_resolved() && gyro.is_none_or(|s| s.is_resolved())
    }

    /// Whether any orientation source is confirmed usable
    pub fn any_mode_confirmed(&self) -> bool {
        self.orientation_flow.status().granted() || self.gyro_granted()
    }

    fn gyro_granted(&self) -> bool {
        self.gyro_flow
            .as_ref()
            .is_some_and(|f| f.status().granted())
    }

    /// Handle an absolute orientation event
    pub fn on_absolute(&mut self, sample: AbsoluteSample, now: f64) {
        if sample.is_complete() {
            self.orientation_flow.observe_sample(now);
        }
        if !self.gyro.seeded {
            if let Some(alpha) = sample.alpha {
                // One-shot heading seed; the gyro drifts freely afterwards
                self.gyro.yaw = alpha_to_yaw(alpha);
                self.gyro.pitch = sample.beta.map(beta_to_pitch).unwrap_or(0.0);
                self.gyro.seeded = true;
                log::debug!("Gyro heading seeded at {:.1}°", alpha);
            }
        }
        self.last_absolute = Some(sample);
        self.refresh_pose();
    }

    /// Handle a gyroscope rate sample
    pub fn on_gyro(&mut self, sample: GyroSample, now: f64) {
        if !self.platform.gyroscope_available {
            return;
        }
        if let Some(flow) = self.gyro_flow.as_mut() {
            flow.observe_sample(now);
        }
        if let Some(last) = self.gyro.last_at {
            let dt = (((now - last) / 1000.0) as f32).clamp(0.0, MAX_GYRO_STEP_S);
            self.gyro.yaw = wrap_angle(self.gyro.yaw + sample.y * dt);
            self.gyro.pitch = (self.gyro.pitch + sample.x * dt)
                .clamp(-std::f32::consts::FRAC_PI_2, std::f32::consts::FRAC_PI_2);
        }
        self.gyro.last_at = Some(now);
        self.gyro.samples += 1;
        self.refresh_pose();
    }

    /// Pick the best source and publish a new pose
    fn refresh_pose(&mut self) {
        let absolute = self.last_absolute.and_then(|s| s.to_yaw_pitch());
        let relative_ready = self.gyro_granted() && self.gyro.samples > 0;

        let (pose, status) = if let Some((yaw, pitch)) = absolute {
            (CameraPose::new(yaw, pitch, PoseMode::Absolute), "Motion sensors active")
        } else if relative_ready {
            (
                CameraPose::new(self.gyro.yaw, self.gyro.pitch, PoseMode::Relative),
                "Gyroscope aiming active",
            )
        } else {
            (CameraPose::FROZEN, self.fallback_status())
        };

        if pose.mode != self.pose.mode {
            log::info!("Camera pose source: {:?} -> {:?}", self.pose.mode, pose.mode);
        }
        self.pose = pose;
        if self.status != status {
            self.status = status.to_string();
        }
    }

    fn fallback_status(&self) -> &'static str {
        let orientation = self.orientation_flow.status();
        let gyro = self.gyro_flow.as_ref().map(|f| f.status());
        let denied = |s: PermissionStatus| {
            s == PermissionStatus::Resolved(PermissionOutcome::Denied)
        };
        if !orientation.is_resolved() || gyro.is_some_and(|s| !s.is_resolved()) {
            "Checking motion sensors..."
        } else if denied(orientation) && gyro.is_none_or(denied) {
            "Motion permission denied - tap to aim"
        } else {
            "No motion data received - tap to aim"
        }
    }

    /// Forget all samples and in-flight permission requests
    pub fn reset(&mut self) {
        self.orientation_flow.reset();
        if let Some(flow) = self.gyro_flow.as_mut() {
            flow.reset();
        }
        self.last_absolute = None;
        self.gyro = GyroTrack::default();
        self.pose = CameraPose::FROZEN;
    }
}
