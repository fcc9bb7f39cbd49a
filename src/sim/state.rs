//! Simulation state and core entity types
//!
//! `SimState` is the single authoritative copy of everything gameplay touches.
//! The renderer never sees it directly; it gets a `FrameSnapshot` instead.

use glam::Vec3;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use crate::tuning::Tuning;

/// Top-level game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Waiting for the player to start
    Menu,
    /// Camera and sensor permissions in flight
    RequestingPermissions,
    /// Active gameplay
    Playing,
    /// Frozen; frames keep redrawing the last state
    Paused,
    /// Run ended
    GameOver,
}

/// Microbe kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Basic,
    Fast,
    Tank,
    Golden,
    Boss,
}

/// Per-kind stats for a given wave
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindStats {
    pub health: u32,
    pub points: u32,
    /// World units per second
    pub speed: f32,
    pub size: f32,
    pub color: u32,
}

impl EntityKind {
    /// Stats for this kind at wave `wave` (1-based)
    pub fn stats(self, wave: u32) -> KindStats {
        let n = wave as f32;
        match self {
            EntityKind::Basic => KindStats {
                health: 1,
                points: 10,
                speed: 1.2 + n * 0.1,
                size: 1.0,
                color: 0x4ade80,
            },
            EntityKind::Fast => KindStats {
                health: 1,
                points: 25,
                speed: 2.4 + n * 0.15,
                size: 0.7,
                color: 0x38bdf8,
            },
            EntityKind::Tank => KindStats {
                health: 2 + wave / 2,
                points: 50,
                speed: 0.8 + n * 0.06,
                size: 1.5,
                color: 0xa855f7,
            },
            EntityKind::Golden => KindStats {
                health: 1,
                points: 100,
                speed: 3.0 + n * 0.15,
                size: 0.8,
                color: 0xfacc15,
            },
            EntityKind::Boss => KindStats {
                health: 8 + wave,
                points: 250,
                speed: 0.5 + n * 0.04,
                size: 2.5,
                color: 0xef4444,
            },
        }
    }

    /// Whether this kind flickers in and out of sight
    pub fn flickers(self) -> bool {
        matches!(self, EntityKind::Tank | EntityKind::Boss)
    }
}

/// A hostile microbe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Microbe {
    pub id: u32,
    pub pos: Vec3,
    pub kind: EntityKind,
    pub health: u32,
    pub max_health: u32,
    pub size: f32,
    pub speed: f32,
    pub points: u32,
    /// Simulation time at spawn (ms)
    pub spawned_at: f64,
    pub wobble_phase: f32,
    /// Visual only
    pub opacity: f32,
}

impl Microbe {
    pub fn new(id: u32, kind: EntityKind, wave: u32, pos: Vec3, now: f64, wobble_phase: f32) -> Self {
        let stats = kind.stats(wave);
        Self {
            id,
            pos,
            kind,
            health: stats.health,
            max_health: stats.health,
            size: stats.size,
            speed: stats.speed,
            points: stats.points,
            spawned_at: now,
            wobble_phase,
            opacity: 1.0,
        }
    }

    /// Distance from the camera at the world origin
    #[inline]
    pub fn distance(&self) -> f32 {
        self.pos.length()
    }

    #[inline]
    pub fn age_ms(&self, now: f64) -> f64 {
        now - self.spawned_at
    }
}

/// Power-up kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PowerUpKind {
    /// Suspends microbe motion
    Freeze,
    /// Tracked only; no gameplay effect
    Rapid,
    /// Doubles kill score
    Double,
    /// Suppresses life loss from escapes
    Shield,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 4] = [
        PowerUpKind::Freeze,
        PowerUpKind::Rapid,
        PowerUpKind::Double,
        PowerUpKind::Shield,
    ];

    /// How long the effect lasts once picked up (ms)
    pub fn duration_ms(self, tuning: &Tuning) -> f64 {
        match self {
            PowerUpKind::Freeze => tuning.freeze_ms,
            PowerUpKind::Rapid => tuning.rapid_ms,
            PowerUpKind::Double => tuning.double_ms,
            PowerUpKind::Shield => tuning.shield_ms,
        }
    }

    pub fn color(self) -> u32 {
        match self {
            PowerUpKind::Freeze => 0x67e8f9,
            PowerUpKind::Rapid => 0xfb923c,
            PowerUpKind::Double => 0xfde047,
            PowerUpKind::Shield => 0x60a5fa,
        }
    }
}

/// A power-up floating in the world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PowerUp {
    pub id: u32,
    pub kind: PowerUpKind,
    pub pos: Vec3,
    pub spawned_at: f64,
}

impl PowerUp {
    /// Whether the power-up still exists at `now` (pickable and drawable)
    #[inline]
    pub fn is_live(&self, now: f64, ttl_ms: f64) -> bool {
        now - self.spawned_at <= ttl_ms
    }
}

/// The effect currently in force
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePowerUp {
    pub kind: PowerUpKind,
    pub expires_at: f64,
}

/// A particle for visual effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec3,
    pub vel: Vec3,
    /// 0-1, decreases over time
    pub life: f32,
    pub color: u32,
}

/// Wave progression phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WavePhase {
    /// No run in progress
    Idle,
    /// Spawning
    Active,
    /// All spawned, waiting for the field to clear
    Draining,
    /// Rest period before the next wave
    Intermission,
}

/// Wave progression
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaveState {
    pub number: u32,
    pub target_count: u32,
    pub spawned_count: u32,
    pub phase: WavePhase,
    /// Next spawn time while Active (sim ms)
    pub next_spawn_at: f64,
    /// When the intermission ends (sim ms)
    pub intermission_ends_at: f64,
}

impl Default for WaveState {
    fn default() -> Self {
        Self {
            number: 0,
            target_count: 0,
            spawned_count: 0,
            phase: WavePhase::Idle,
            next_spawn_at: 0.0,
            intermission_ends_at: 0.0,
        }
    }
}

/// Consecutive-kill counter
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ComboState {
    pub count: u32,
    pub last_hit_at: f64,
}

/// Complete simulation state
#[derive(Debug, Clone)]
pub struct SimState {
    /// Run seed for reproducibility
    pub seed: u64,
    pub rng: Pcg32,
    /// Simulation clock (ms); only advances while Playing
    pub now: f64,
    pub lives: u8,
    pub score: u64,
    pub combo: ComboState,
    pub wave: WaveState,
    /// Live microbes in spawn order
    pub microbes: Vec<Microbe>,
    /// Live power-ups in spawn order
    pub power_ups: Vec<PowerUp>,
    pub active_power_up: Option<ActivePowerUp>,
    pub last_power_up_spawn: f64,
    /// Visual particles (not gameplay-affecting)
    pub particles: Vec<Particle>,
    /// Tap flash intensity, 0-1
    pub fire_flash: f32,
    pub kills: u32,
    next_id: u32,
}

impl SimState {
    /// Create a fresh run with the given seed
    pub fn new(seed: u64, lives: u8) -> Self {
        Self {
            seed,
            rng: Pcg32::seed_from_u64(seed),
            now: 0.0,
            lives,
            score: 0,
            combo: ComboState::default(),
            wave: WaveState::default(),
            microbes: Vec::new(),
            power_ups: Vec::new(),
            active_power_up: None,
            last_power_up_spawn: 0.0,
            particles: Vec::new(),
            fire_flash: 0.0,
            kills: 0,
            next_id: 1,
        }
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// The active effect if it has not expired yet
    pub fn active_effect(&self) -> Option<PowerUpKind> {
        self.active_power_up
            .filter(|p| self.now < p.expires_at)
            .map(|p| p.kind)
    }

    pub fn effect_active(&self, kind: PowerUpKind) -> bool {
        self.active_effect() == Some(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_stats_scale_with_wave() {
        assert_eq!(EntityKind::Tank.stats(4).health, 4);
        assert_eq!(EntityKind::Tank.stats(7).health, 5);
        assert_eq!(EntityKind::Boss.stats(6).health, 14);
        assert!(EntityKind::Basic.stats(5).speed > EntityKind::Basic.stats(1).speed);
        assert!(EntityKind::Golden.stats(1).speed > EntityKind::Basic.stats(1).speed);
    }

    #[test]
    fn test_power_up_ttl_boundary() {
        let p = PowerUp {
            id: 1,
            kind: PowerUpKind::Shield,
            pos: Vec3::new(0.0, 0.0, -10.0),
            spawned_at: 1000.0,
        };
        assert!(p.is_live(16_000.0, 15_000.0));
        assert!(!p.is_live(16_001.0, 15_000.0));
    }

    #[test]
    fn test_active_effect_expires() {
        let mut state = SimState::new(1, 3);
        state.active_power_up = Some(ActivePowerUp {
            kind: PowerUpKind::Double,
            expires_at: 500.0,
        });
        state.now = 499.0;
        assert!(state.effect_active(PowerUpKind::Double));
        state.now = 500.0;
        assert_eq!(state.active_effect(), None);
    }
}
