//! Combat resolver
//!
//! Tap hit-testing against the crosshair, damage and scoring, combo upkeep,
//! power-up pickup/expiry and escapes. This is the only place microbes and
//! power-ups leave the world.

use glam::{Vec2, Vec3};
use rand::Rng;

use super::camera::{CameraPose, Lens, Projection, Viewport, project};
use super::events::{GameEvent, GameListener};
use super::state::{ActivePowerUp, Particle, PowerUpKind, SimState};
use crate::tuning::Tuning;

/// Outcome of a tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// Picked up a power-up
    PowerUp(PowerUpKind),
    /// Damaged a microbe that survived
    Hit { id: u32, health: u32 },
    /// Killed a microbe
    Kill { id: u32, awarded: u64 },
    /// Nothing under the crosshair
    Miss,
}

/// Score multiplier for a combo count (taken after the kill increments it)
#[inline]
pub fn combo_multiplier(combo: u32) -> f64 {
    1.0 + (combo / 5) as f64 * 0.5
}

/// Points awarded for a kill
#[inline]
pub fn kill_score(base_points: u32, combo: u32, double: bool) -> u64 {
    let power_up = if double { 2.0 } else { 1.0 };
    (base_points as f64 * combo_multiplier(combo) * power_up).floor() as u64
}

/// Resolve a tap. `aim` is the crosshair position in screen space: the
/// viewport centre when a sensor drives the camera, the tap point otherwise.
pub fn resolve_tap(
    state: &mut SimState,
    pose: &CameraPose,
    viewport: Viewport,
    aim: Vec2,
    tuning: &Tuning,
    max_particles: usize,
    listener: &mut dyn GameListener,
) -> TapOutcome {
    let lens = Lens {
        fov: tuning.fov_radians(),
        margin: tuning.view_margin_px,
    };
    let now = state.now;
    state.fire_flash = 1.0;

    // Power-ups take the tap first
    let picked = nearest_under_crosshair(
        state
            .power_ups
            .iter()
            .filter(|p| p.is_live(now, tuning.power_up_ttl_ms))
            .map(|p| (p.id, project(p.pos, pose, viewport, &lens))),
        aim,
        tuning.hit_radius_px,
    );
    if let Some(id) = picked {
        if let Some(index) = state.power_ups.iter().position(|p| p.id == id) {
            let power_up = state.power_ups.remove(index);
            activate_power_up(state, power_up.kind, tuning, listener);
            return TapOutcome::PowerUp(power_up.kind);
        }
    }

    let target = nearest_under_crosshair(
        state
            .microbes
            .iter()
            .map(|m| (m.id, project(m.pos, pose, viewport, &lens))),
        aim,
        tuning.hit_radius_px,
    );

    let Some(index) = target.and_then(|id| state.microbes.iter().position(|m| m.id == id)) else {
        reset_combo(state, listener);
        return TapOutcome::Miss;
    };

    let microbe = &mut state.microbes[index];
    microbe.health = microbe.health.saturating_sub(1);
    let (id, health, pos, color, points) = (
        microbe.id,
        microbe.health,
        microbe.pos,
        microbe.kind.stats(1).color,
        microbe.points,
    );

    if health > 0 {
        emit_burst(state, pos, color, tuning.hit_particles, 2.0, max_particles);
        return TapOutcome::Hit { id, health };
    }

    state.microbes.remove(index);
    emit_burst(state, pos, color, tuning.kill_particles, 5.0, max_particles);

    state.combo.count += 1;
    state.combo.last_hit_at = now;
    state.kills += 1;
    let awarded = kill_score(points, state.combo.count, state.effect_active(PowerUpKind::Double));
    state.score += awarded;

    listener.dispatch(&GameEvent::ComboChanged(state.combo.count));
    listener.dispatch(&GameEvent::ScoreChanged(state.score));
    listener.dispatch(&GameEvent::EntityEliminated);
    TapOutcome::Kill { id, awarded }
}

/// Pick the nearest visible candidate within `radius` px of the crosshair.
/// Equal distances keep the first enumerated.
fn nearest_under_crosshair(
    candidates: impl Iterator<Item = (u32, Projection)>,
    aim: Vec2,
    radius: f32,
) -> Option<u32> {
    let mut best: Option<(u32, f32)> = None;
    for (id, p) in candidates {
        if !p.visible || p.screen().distance(aim) > radius {
            continue;
        }
        if best.is_none_or(|(_, d)| p.distance < d) {
            best = Some((id, p.distance));
        }
    }
    best.map(|(id, _)| id)
}

fn activate_power_up(
    state: &mut SimState,
    kind: PowerUpKind,
    tuning: &Tuning,
    listener: &mut dyn GameListener,
) {
    // Overwrites whatever was active
    state.active_power_up = Some(ActivePowerUp {
        kind,
        expires_at: state.now + kind.duration_ms(tuning),
    });
    log::info!("Power-up {:?} active for {:.0}ms", kind, kind.duration_ms(tuning));
    listener.dispatch(&GameEvent::PowerUpActivated(kind));
}

fn reset_combo(state: &mut SimState, listener: &mut dyn GameListener) {
    if state.combo.count != 0 {
        state.combo.count = 0;
        listener.dispatch(&GameEvent::ComboChanged(0));
    }
}

/// Periodic combo decay check (~100 ms)
pub fn decay_combo(state: &mut SimState, tuning: &Tuning, listener: &mut dyn GameListener) {
    if state.combo.count > 0 && state.now - state.combo.last_hit_at > tuning.combo_window_ms {
        log::debug!("Combo of {} expired", state.combo.count);
        reset_combo(state, listener);
    }
}

/// Remove escaped microbes, costing a life each unless shielded. Every escape
/// signals once even when the life counter is already at zero.
/// Returns the number of escapes signalled.
pub fn resolve_escapes(state: &mut SimState, tuning: &Tuning, listener: &mut dyn GameListener) -> u32 {
    let now = state.now;
    let before = state.microbes.len();
    state.microbes.retain(|m| {
        m.distance() >= tuning.escape_distance && m.age_ms(now) <= tuning.max_entity_age_ms
    });
    let escaped = (before - state.microbes.len()) as u32;
    if escaped == 0 {
        return 0;
    }

    if state.effect_active(PowerUpKind::Shield) {
        log::debug!("Shield absorbed {} escapes", escaped);
        return 0;
    }

    for _ in 0..escaped {
        state.lives = state.lives.saturating_sub(1);
        listener.dispatch(&GameEvent::LifeLost);
    }
    log::info!("{} microbe(s) escaped, {} lives left", escaped, state.lives);
    escaped
}

/// Periodic sweep of expired power-ups and effects (~1000 ms)
pub fn sweep_power_ups(state: &mut SimState, tuning: &Tuning) {
    let now = state.now;
    state
        .power_ups
        .retain(|p| p.is_live(now, tuning.power_up_ttl_ms));
    if let Some(active) = state.active_power_up {
        if now >= active.expires_at {
            log::info!("Power-up {:?} expired", active.kind);
            state.active_power_up = None;
        }
    }
}

fn emit_burst(state: &mut SimState, pos: Vec3, color: u32, count: usize, speed: f32, max: usize) {
    let room = max.saturating_sub(state.particles.len());
    for _ in 0..count.min(room) {
        let dir = Vec3::new(
            state.rng.random_range(-1.0..1.0),
            state.rng.random_range(-1.0..1.0),
            state.rng.random_range(-1.0..1.0),
        )
        .normalize_or_zero();
        let jitter: f32 = state.rng.random_range(0.5..1.0);
        let vel = dir * speed * jitter;
        state.particles.push(Particle {
            pos,
            vel,
            life: 1.0,
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::state::{EntityKind, Microbe, PowerUp};

    fn viewport() -> Viewport {
        Viewport::new(400.0, 800.0)
    }

    fn microbe(state: &mut SimState, kind: EntityKind, pos: Vec3) -> u32 {
        let id = state.next_entity_id();
        let now = state.now;
        state.microbes.push(Microbe::new(id, kind, 1, pos, now, 0.0));
        id
    }

    fn tap(state: &mut SimState, events: &mut Vec<GameEvent>) -> TapOutcome {
        resolve_tap(
            state,
            &CameraPose::FROZEN,
            viewport(),
            viewport().center(),
            &Tuning::default(),
            500,
            events,
        )
    }

    #[test]
    fn test_combo_multiplier_table() {
        assert_eq!(combo_multiplier(4), 1.0);
        assert_eq!(combo_multiplier(5), 1.5);
        assert_eq!(combo_multiplier(10), 2.0);
        assert_eq!(kill_score(25, 5, false), 37);
        assert_eq!(kill_score(25, 5, true), 75);
    }

    #[test]
    fn test_nearest_candidate_is_hit() {
        let mut state = SimState::new(1, 3);
        let far = microbe(&mut state, EntityKind::Tank, Vec3::new(0.1, 0.0, -7.0));
        let near = microbe(&mut state, EntityKind::Tank, Vec3::new(-0.1, 0.0, -3.0));
        let mut events = Vec::new();

        let outcome = tap(&mut state, &mut events);
        assert_eq!(outcome, TapOutcome::Hit { id: near, health: 1 });
        let far_health = state.microbes.iter().find(|m| m.id == far).unwrap().health;
        assert_eq!(far_health, 2);
        // Non-lethal hits leave score and combo alone
        assert!(events.is_empty());
        assert_eq!(state.particles.len(), Tuning::default().hit_particles);
    }

    #[test]
    fn test_equidistant_keeps_first_enumerated() {
        let mut state = SimState::new(1, 3);
        let first = microbe(&mut state, EntityKind::Basic, Vec3::new(0.5, 0.0, -5.0));
        microbe(&mut state, EntityKind::Basic, Vec3::new(-0.5, 0.0, -5.0));
        let mut events = Vec::new();
        assert!(matches!(tap(&mut state, &mut events), TapOutcome::Kill { id, .. } if id == first));
    }

    #[test]
    fn test_kill_scores_and_fires_callbacks() {
        let mut state = SimState::new(1, 3);
        microbe(&mut state, EntityKind::Golden, Vec3::new(0.0, 0.0, -10.0));
        let mut events = Vec::new();

        assert!(matches!(tap(&mut state, &mut events), TapOutcome::Kill { awarded: 100, .. }));
        assert!(state.microbes.is_empty());
        assert_eq!(
            events,
            vec![
                GameEvent::ComboChanged(1),
                GameEvent::ScoreChanged(100),
                GameEvent::EntityEliminated,
            ]
        );
        assert_eq!(state.particles.len(), Tuning::default().kill_particles);
    }

    #[test]
    fn test_fifth_kill_gets_combo_bonus_and_double() {
        let mut state = SimState::new(1, 3);
        state.combo.count = 4;
        state.active_power_up = Some(ActivePowerUp {
            kind: PowerUpKind::Double,
            expires_at: 1e9,
        });
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        let mut events = Vec::new();
        assert!(matches!(tap(&mut state, &mut events), TapOutcome::Kill { awarded: 30, .. }));
        assert_eq!(state.combo.count, 5);
    }

    #[test]
    fn test_offscreen_and_behind_are_not_candidates() {
        let mut state = SimState::new(1, 3);
        state.combo.count = 3;
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, 10.0));
        microbe(&mut state, EntityKind::Basic, Vec3::new(8.0, 0.0, -10.0));
        let mut events = Vec::new();
        assert_eq!(tap(&mut state, &mut events), TapOutcome::Miss);
        assert_eq!(state.combo.count, 0);
        assert_eq!(events, vec![GameEvent::ComboChanged(0)]);
        assert_eq!(state.microbes.len(), 2);
    }

    #[test]
    fn test_escape_costs_exactly_one_life() {
        let mut state = SimState::new(1, 3);
        let id = microbe(&mut state, EntityKind::Tank, Vec3::new(0.0, 0.0, -0.4));
        state.microbes[0].health = 1;
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        let mut events = Vec::new();

        assert_eq!(resolve_escapes(&mut state, &Tuning::default(), &mut events), 1);
        assert_eq!(events, vec![GameEvent::LifeLost]);
        assert_eq!(state.lives, 2);
        assert!(state.microbes.iter().all(|m| m.id != id));

        // Already removed, never counted twice
        assert_eq!(resolve_escapes(&mut state, &Tuning::default(), &mut events), 0);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_simultaneous_escapes_each_signal_on_last_life() {
        let mut state = SimState::new(1, 1);
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -0.3));
        microbe(&mut state, EntityKind::Fast, Vec3::new(0.1, 0.0, -0.3));
        let mut events = Vec::new();

        assert_eq!(resolve_escapes(&mut state, &Tuning::default(), &mut events), 2);
        assert_eq!(events, vec![GameEvent::LifeLost, GameEvent::LifeLost]);
        assert_eq!(state.lives, 0);
        assert!(state.microbes.is_empty());
    }

    #[test]
    fn test_old_microbe_escapes() {
        let mut state = SimState::new(1, 3);
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -25.0));
        state.now = 30_001.0;
        let mut events = Vec::new();
        assert_eq!(resolve_escapes(&mut state, &Tuning::default(), &mut events), 1);
    }

    #[test]
    fn test_shield_absorbs_escapes() {
        let mut state = SimState::new(1, 3);
        state.active_power_up = Some(ActivePowerUp {
            kind: PowerUpKind::Shield,
            expires_at: 1e9,
        });
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -0.2));
        let mut events = Vec::new();
        assert_eq!(resolve_escapes(&mut state, &Tuning::default(), &mut events), 0);
        assert!(state.microbes.is_empty());
        assert_eq!(state.lives, 3);
        assert!(events.is_empty());
    }

    #[test]
    fn test_combo_decay() {
        let tuning = Tuning::default();
        let mut state = SimState::new(1, 3);
        state.combo.count = 3;
        state.combo.last_hit_at = 1000.0;
        let mut events = Vec::new();

        state.now = 3000.0;
        decay_combo(&mut state, &tuning, &mut events);
        assert_eq!(state.combo.count, 3);

        state.now = 3001.0;
        decay_combo(&mut state, &tuning, &mut events);
        assert_eq!(state.combo.count, 0);
        assert_eq!(events, vec![GameEvent::ComboChanged(0)]);
    }

    #[test]
    fn test_power_up_pickup_and_expiry() {
        let tuning = Tuning::default();
        let mut state = SimState::new(1, 3);
        state.power_ups.push(PowerUp {
            id: 99,
            kind: PowerUpKind::Freeze,
            pos: Vec3::new(0.0, 0.0, -10.0),
            spawned_at: 0.0,
        });
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -5.0));
        let mut events = Vec::new();

        state.now = 1000.0;
        assert_eq!(tap(&mut state, &mut events), TapOutcome::PowerUp(PowerUpKind::Freeze));
        assert_eq!(events, vec![GameEvent::PowerUpActivated(PowerUpKind::Freeze)]);
        assert!(state.effect_active(PowerUpKind::Freeze));
        assert_eq!(state.microbes.len(), 1);

        state.now = 1000.0 + tuning.freeze_ms;
        sweep_power_ups(&mut state, &tuning);
        assert!(state.active_power_up.is_none());
    }

    #[test]
    fn test_expired_power_up_not_pickable() {
        let tuning = Tuning::default();
        let mut state = SimState::new(1, 3);
        state.power_ups.push(PowerUp {
            id: 5,
            kind: PowerUpKind::Double,
            pos: Vec3::new(0.0, 0.0, -10.0),
            spawned_at: 0.0,
        });
        let mut events = Vec::new();

        state.now = 15_001.0;
        assert_eq!(tap(&mut state, &mut events), TapOutcome::Miss);
        assert!(state.active_power_up.is_none());

        sweep_power_ups(&mut state, &tuning);
        assert!(state.power_ups.is_empty());
    }

    #[test]
    fn test_particle_cap() {
        let mut state = SimState::new(1, 3);
        microbe(&mut state, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        let mut events = Vec::new();
        resolve_tap(
            &mut state,
            &CameraPose::FROZEN,
            viewport(),
            viewport().center(),
            &Tuning::default(),
            4,
            &mut events,
        );
        assert_eq!(state.particles.len(), 4);
    }
}
