//! Radar minimap and off-screen indicators
//!
//! Both are derived from projector output only, so they always agree with
//! what the crosshair can hit.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::camera::{Projection, Viewport};
use super::state::EntityKind;

/// Range (world units) mapped to the radar's outer ring
pub const RADAR_RANGE: f32 = 30.0;
/// Inset of edge indicators from the viewport border (px)
pub const INDICATOR_INSET: f32 = 36.0;

/// A blip on the radar, in the unit disc. +y is straight ahead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadarBlip {
    pub id: u32,
    pub kind: EntityKind,
    pub x: f32,
    pub y: f32,
}

/// Arrow on the viewport edge pointing at an off-screen microbe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeIndicator {
    pub id: u32,
    pub kind: EntityKind,
    pub screen_x: f32,
    pub screen_y: f32,
    /// Screen-space arrow direction (radians, 0 = right, clockwise)
    pub angle: f32,
}

/// Radar position for a projected microbe
pub fn radar_blip(id: u32, kind: EntityKind, p: &Projection) -> RadarBlip {
    let r = (p.distance / RADAR_RANGE).min(1.0);
    RadarBlip {
        id,
        kind,
        x: p.bearing.sin() * r,
        y: p.bearing.cos() * r,
    }
}

/// Edge arrow for a microbe that is not visible; `None` when it is on screen
pub fn edge_indicator(
    id: u32,
    kind: EntityKind,
    p: &Projection,
    elevation: f32,
    viewport: Viewport,
) -> Option<EdgeIndicator> {
    if p.visible {
        return None;
    }
    // Screen direction: bearing drives x, elevation drives y (up is negative)
    let dir = Vec2::new(p.bearing.sin(), -elevation.sin()).normalize_or(Vec2::X);
    let center = viewport.center();
    let half = Vec2::new(
        (center.x - INDICATOR_INSET).max(0.0),
        (center.y - INDICATOR_INSET).max(0.0),
    );
    // Scale the direction until it touches the inset rectangle
    let tx = if dir.x.abs() > f32::EPSILON { half.x / dir.x.abs() } else { f32::INFINITY };
    let ty = if dir.y.abs() > f32::EPSILON { half.y / dir.y.abs() } else { f32::INFINITY };
    let edge = center + dir * tx.min(ty);
    Some(EdgeIndicator {
        id,
        kind,
        screen_x: edge.x,
        screen_y: edge.y,
        angle: dir.y.atan2(dir.x),
    })
}
