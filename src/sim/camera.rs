//! Pinhole camera projection
//!
//! The camera sits at the world origin. At yaw 0, pitch 0 it looks down -Z with
//! +Y up; positive yaw turns left, positive pitch looks up. Screen Y grows
//! downward.

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::consts::NEAR_EPSILON;

/// Which sensor the pose came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoseMode {
    /// Absolute device orientation events
    Absolute,
    /// Integrated gyroscope
    Relative,
    /// No sensor; touch-only aiming
    None,
}

/// Camera orientation estimate
///
/// Always replaced as a whole so a reader never sees yaw from one sample and
/// pitch from another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    /// Radians in [0, 2π)
    pub yaw: f32,
    /// Radians in [-π/2, π/2]
    pub pitch: f32,
    pub mode: PoseMode,
}

impl CameraPose {
    /// Pose used when no sensor is usable
    pub const FROZEN: CameraPose = CameraPose {
        yaw: 0.0,
        pitch: 0.0,
        mode: PoseMode::None,
    };

    pub fn new(yaw: f32, pitch: f32, mode: PoseMode) -> Self {
        use std::f32::consts::FRAC_PI_2;
        Self {
            yaw: crate::wrap_angle(yaw),
            pitch: pitch.clamp(-FRAC_PI_2, FRAC_PI_2),
            mode,
        }
    }

    /// Transform a world point into camera space
    pub fn to_camera_space(&self, world: Vec3) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        // -yaw about Y
        let x = world.x * cy - world.z * sy;
        let z = world.x * sy + world.z * cy;
        let (sp, cp) = self.pitch.sin_cos();
        // -pitch about X
        let y = world.y * cp + z * sp;
        let z = -world.y * sp + z * cp;
        Vec3::new(x, y, z)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::FROZEN
    }
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Focal length in pixels for a vertical FOV (radians)
    #[inline]
    pub fn focal_length(&self, fov: f32) -> f32 {
        self.height / (2.0 * (fov / 2.0).tan())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(390.0, 844.0)
    }
}

/// Projection parameters
#[derive(Debug, Clone, Copy)]
pub struct Lens {
    /// Vertical FOV (radians)
    pub fov: f32,
    /// Extra pixels around the viewport still counted as visible
    pub margin: f32,
}

impl Default for Lens {
    fn default() -> Self {
        Self {
            fov: crate::consts::FOV_DEGREES.to_radians(),
            margin: 200.0,
        }
    }
}

/// Result of projecting one world point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub screen_x: f32,
    pub screen_y: f32,
    /// In front of the camera AND inside the margin-expanded viewport.
    /// Screen coordinates are meaningless when the point is behind the camera.
    pub visible: bool,
    /// Euclidean distance from the camera
    pub distance: f32,
    /// Horizontal angle off the view axis (radians, positive = right)
    pub bearing: f32,
    /// Camera-space depth (negative in front)
    pub depth: f32,
}

impl Projection {
    #[inline]
    pub fn screen(&self) -> Vec2 {
        Vec2::new(self.screen_x, self.screen_y)
    }
}

/// Project a world point through the camera
pub fn project(world: Vec3, pose: &CameraPose, viewport: Viewport, lens: &Lens) -> Projection {
    let cam = pose.to_camera_space(world);
    let distance = world.length();
    let bearing = cam.x.atan2(-cam.z);

    if cam.z >= -NEAR_EPSILON {
        return Projection {
            screen_x: 0.0,
            screen_y: 0.0,
            visible: false,
            distance,
            bearing,
            depth: cam.z,
        };
    }

    let f = viewport.focal_length(lens.fov);
    let center = viewport.center();
    let inv_depth = 1.0 / -cam.z;
    let screen_x = center.x + cam.x * inv_depth * f;
    let screen_y = center.y - cam.y * inv_depth * f;

    let m = lens.margin;
    let visible = screen_x >= -m
        && screen_x <= viewport.width + m
        && screen_y >= -m
        && screen_y <= viewport.height + m;

    Projection {
        screen_x,
        screen_y,
        visible,
        distance,
        bearing,
        depth: cam.z,
    }
}

/// On-screen radius (px) of a sphere of `size` at camera depth `depth`
pub fn project_radius(size: f32, depth: f32, viewport: Viewport, lens: &Lens) -> f32 {
    if depth >= -NEAR_EPSILON {
        return 0.0;
    }
    size * viewport.focal_length(lens.fov) / -depth
}
