//! Read-only view of one frame for the renderer

use serde::{Deserialize, Serialize};

use super::camera::{CameraPose, Lens, Viewport, project, project_radius};
use super::combat::combo_multiplier;
use super::radar::{EdgeIndicator, RadarBlip, edge_indicator, radar_blip};
use super::state::{EntityKind, GamePhase, PowerUpKind, SimState, WavePhase};
use crate::settings::Settings;
use crate::tuning::Tuning;

/// A microbe as the renderer sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MicrobeView {
    pub id: u32,
    pub kind: EntityKind,
    pub screen_x: f32,
    pub screen_y: f32,
    /// Sprite radius (px)
    pub radius: f32,
    pub distance: f32,
    pub health: u32,
    pub max_health: u32,
    pub opacity: f32,
    pub color: u32,
}

/// A power-up as the renderer sees it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUpView {
    pub id: u32,
    pub kind: PowerUpKind,
    pub screen_x: f32,
    pub screen_y: f32,
    pub radius: f32,
    /// Remaining world lifetime (ms)
    pub remaining_ms: f64,
    pub color: u32,
}

/// A particle in screen space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticleView {
    pub screen_x: f32,
    pub screen_y: f32,
    pub life: f32,
    pub color: u32,
}

/// Everything needed to draw and annotate one frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSnapshot {
    pub phase: GamePhase,
    pub pose: CameraPose,
    pub viewport: Viewport,
    pub status: String,
    pub score: u64,
    pub lives: u8,
    pub wave: u32,
    pub wave_phase: WavePhase,
    pub wave_remaining: u32,
    pub combo: u32,
    pub combo_multiplier: f64,
    pub active_power_up: Option<(PowerUpKind, f64)>,
    pub fire_flash: f32,
    /// Visible microbes, far to near
    pub microbes: Vec<MicrobeView>,
    pub power_ups: Vec<PowerUpView>,
    pub particles: Vec<ParticleView>,
    pub indicators: Vec<EdgeIndicator>,
    pub radar: Vec<RadarBlip>,
}

impl FrameSnapshot {
    /// Project the current state through `pose`
    pub fn capture(
        phase: GamePhase,
        state: &SimState,
        pose: CameraPose,
        viewport: Viewport,
        tuning: &Tuning,
        settings: &Settings,
        status: &str,
    ) -> Self {
        let lens = Lens {
            fov: tuning.fov_radians(),
            margin: tuning.view_margin_px,
        };
        let now = state.now;

        let mut microbes = Vec::with_capacity(state.microbes.len());
        let mut indicators = Vec::new();
        let mut radar = Vec::new();
        for m in &state.microbes {
            let p = project(m.pos, &pose, viewport, &lens);
            if settings.show_radar {
                radar.push(radar_blip(m.id, m.kind, &p));
            }
            if p.visible {
                microbes.push(MicrobeView {
                    id: m.id,
                    kind: m.kind,
                    screen_x: p.screen_x,
                    screen_y: p.screen_y,
                    radius: project_radius(m.size, p.depth, viewport, &lens),
                    distance: p.distance,
                    health: m.health,
                    max_health: m.max_health,
                    opacity: m.opacity,
                    color: m.kind.stats(1).color,
                });
            } else if settings.show_indicators {
                let cam = pose.to_camera_space(m.pos);
                let elevation = cam.y.atan2(cam.x.hypot(cam.z));
                indicators.extend(edge_indicator(m.id, m.kind, &p, elevation, viewport));
            }
        }
        // Painter's order
        microbes.sort_by(|a, b| b.distance.total_cmp(&a.distance));

        let power_ups = state
            .power_ups
            .iter()
            .filter(|pu| pu.is_live(now, tuning.power_up_ttl_ms))
            .filter_map(|pu| {
                let p = project(pu.pos, &pose, viewport, &lens);
                p.visible.then(|| PowerUpView {
                    id: pu.id,
                    kind: pu.kind,
                    screen_x: p.screen_x,
                    screen_y: p.screen_y,
                    radius: project_radius(0.6, p.depth, viewport, &lens),
                    remaining_ms: tuning.power_up_ttl_ms - (now - pu.spawned_at),
                    color: pu.kind.color(),
                })
            })
            .collect();

        let particles = state
            .particles
            .iter()
            .filter_map(|pt| {
                let p = project(pt.pos, &pose, viewport, &lens);
                p.visible.then_some(ParticleView {
                    screen_x: p.screen_x,
                    screen_y: p.screen_y,
                    life: pt.life,
                    color: pt.color,
                })
            })
            .collect();

        let active_power_up = state
            .active_power_up
            .filter(|a| now < a.expires_at)
            .map(|a| (a.kind, a.expires_at - now));

        Self {
            phase,
            pose,
            viewport,
            status: status.to_string(),
            score: state.score,
            lives: state.lives,
            wave: state.wave.number,
            wave_phase: state.wave.phase,
            wave_remaining: state.wave.target_count.saturating_sub(state.wave.spawned_count)
                + state.microbes.len() as u32,
            combo: state.combo.count,
            combo_multiplier: combo_multiplier(state.combo.count),
            active_power_up,
            fire_flash: if settings.effective_flicker() { state.fire_flash } else { 0.0 },
            microbes,
            power_ups,
            particles,
            indicators,
            radar,
        }
    }
}
