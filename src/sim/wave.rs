//! Wave scheduler
//!
//! Drives spawn timing, the microbe kind mix and wave progression. Later waves
//! are larger, spawn faster and unlock nastier kinds.

use glam::Vec3;
use rand::Rng;

use super::events::{GameEvent, GameListener};
use super::state::{EntityKind, Microbe, PowerUp, PowerUpKind, SimState, WavePhase};
use crate::azimuth_to_world;
use crate::tuning::Tuning;

/// Microbes in wave `n`
#[inline]
pub fn target_count(wave: u32) -> u32 {
    5 + 3 * wave
}

/// Nominal length of wave `n` in seconds
#[inline]
pub fn wave_duration_s(wave: u32) -> u32 {
    22u32.saturating_sub(2 * wave).max(10)
}

/// Time between spawns in wave `n` (ms)
#[inline]
pub fn spawn_interval_ms(wave: u32) -> f64 {
    wave_duration_s(wave) as f64 * 1000.0 / target_count(wave) as f64
}

/// Map a uniform roll in [0, 100) to a kind. First match wins.
pub fn roll_kind(wave: u32, roll: f32) -> EntityKind {
    if wave > 5 && roll < 5.0 {
        EntityKind::Boss
    } else if roll < 5.0 {
        EntityKind::Golden
    } else if wave > 3 && roll < 20.0 {
        EntityKind::Tank
    } else if wave > 2 && roll < 35.0 {
        EntityKind::Fast
    } else {
        EntityKind::Basic
    }
}

/// Reset wave progression and open wave 1
pub fn begin_run(state: &mut SimState, listener: &mut dyn GameListener) {
    start_wave(state, 1, listener);
}

fn start_wave(state: &mut SimState, number: u32, listener: &mut dyn GameListener) {
    let wave = &mut state.wave;
    wave.number = number;
    wave.target_count = target_count(number);
    wave.spawned_count = 0;
    wave.phase = WavePhase::Active;
    wave.next_spawn_at = state.now + spawn_interval_ms(number);
    log::info!(
        "Wave {} started: {} microbes every {:.0}ms",
        number,
        wave.target_count,
        spawn_interval_ms(number)
    );
    listener.dispatch(&GameEvent::WaveStarted(number));
}

/// Spawn every microbe that has come due. Called from the motion tick.
pub fn spawn_due(state: &mut SimState, yaw: f32, tuning: &Tuning) {
    if state.wave.phase != WavePhase::Active {
        return;
    }
    let interval = spawn_interval_ms(state.wave.number);
    while state.wave.spawned_count < state.wave.target_count && state.now >= state.wave.next_spawn_at {
        spawn_microbe(state, yaw, tuning);
        state.wave.next_spawn_at += interval;
    }
    if state.wave.spawned_count >= state.wave.target_count {
        state.wave.phase = WavePhase::Draining;
        log::debug!("Wave {} fully spawned, draining", state.wave.number);
    }
}

/// Spawn one microbe near the player's current facing
pub fn spawn_microbe(state: &mut SimState, yaw: f32, tuning: &Tuning) {
    let wave = state.wave.number.max(1);
    let roll: f32 = state.rng.random_range(0.0..100.0);
    let kind = roll_kind(wave, roll);
    let pos = random_spawn_point(
        state,
        yaw,
        tuning.spawn_distance,
        tuning.spawn_spread_degrees.to_radians(),
        tuning.spawn_height,
    );
    let wobble_phase = state.rng.random_range(0.0..std::f32::consts::TAU);
    let id = state.next_entity_id();
    state
        .microbes
        .push(Microbe::new(id, kind, wave, pos, state.now, wobble_phase));
    state.wave.spawned_count += 1;
}

fn random_spawn_point(
    state: &mut SimState,
    yaw: f32,
    (near, far): (f32, f32),
    spread: f32,
    height: f32,
) -> Vec3 {
    let distance = if far > near {
        state.rng.random_range(near..far)
    } else {
        near
    };
    let azimuth = yaw + state.rng.random_range(-spread..=spread);
    let y = state.rng.random_range(-height..=height);
    azimuth_to_world(azimuth, distance, y)
}

/// Periodic completion check (~500 ms)
pub fn check_progress(state: &mut SimState, tuning: &Tuning, listener: &mut dyn GameListener) {
    let wave = &mut state.wave;
    if wave.phase == WavePhase::Active && wave.spawned_count >= wave.target_count {
        wave.phase = WavePhase::Draining;
    }
    if wave.phase == WavePhase::Draining && state.microbes.is_empty() {
        wave.phase = WavePhase::Intermission;
        wave.intermission_ends_at = state.now + tuning.intermission_ms;
        log::info!("Wave {} cleared", wave.number);
    }
    if wave.phase == WavePhase::Intermission && state.now >= wave.intermission_ends_at {
        let next = wave.number + 1;
        start_wave(state, next, listener);
    }
}

/// Periodic power-up spawn roll (~5000 ms)
pub fn maybe_spawn_power_up(state: &mut SimState, yaw: f32, tuning: &Tuning) -> Option<PowerUpKind> {
    if state.now - state.last_power_up_spawn < tuning.power_up_cooldown_ms {
        return None;
    }
    let now = state.now;
    let live = state
        .power_ups
        .iter()
        .filter(|p| p.is_live(now, tuning.power_up_ttl_ms))
        .count();
    if live >= tuning.max_live_power_ups {
        return None;
    }
    if !state.rng.random_bool(tuning.power_up_chance) {
        return None;
    }

    let kind = PowerUpKind::ALL[state.rng.random_range(0..PowerUpKind::ALL.len())];
    let pos = random_spawn_point(state, yaw, (8.0, 14.0), 45f32.to_radians(), 1.0);
    let id = state.next_entity_id();
    state.power_ups.push(PowerUp {
        id,
        kind,
        pos,
        spawned_at: now,
    });
    state.last_power_up_spawn = now;
    log::info!("Power-up {:?} spawned", kind);
    Some(kind)
}
