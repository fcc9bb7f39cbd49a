//! Simulation loop and top-level game state machine
//!
//! `Engine::frame` is the one per-frame driver. It advances the simulation
//! clock, runs every due fixed-interval timer against the single `SimState`,
//! advances visual effects, and finally projects a `FrameSnapshot`. Motion is
//! always applied before projection.

use glam::{Vec2, Vec3};
use thiserror::Error;

use super::camera::{CameraPose, PoseMode, Viewport};
use super::combat::{self, TapOutcome};
use super::events::{GameEvent, GameListener};
use super::orientation::{AbsoluteSample, GyroSample, OrientationEstimator, SensorKind, SensorPlatform};
use super::snapshot::FrameSnapshot;
use super::state::{GamePhase, PowerUpKind, SimState};
use super::timers::{TimerKind, TimerSet};
use super::wave;
use crate::consts::{FLICKER_WINDOW_MS, MAX_FRAME_DELTA_MS, WOBBLE_FREQ, WOBBLE_SPEED};
use crate::settings::Settings;
use crate::tuning::Tuning;

/// Engine-level failures surfaced to the host
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("the AR mode has not been unlocked")]
    Locked,
    #[error("camera unavailable and no motion sensor confirmed ({status})")]
    PermissionsUnconfirmed { status: String },
    #[error("camera stream unavailable")]
    CameraFailed,
}

/// Whether the player has unlocked this mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    Unlocked,
    Locked,
}

/// Camera stream readiness, as reported by the host
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraStatus {
    NotRequested,
    Pending { deadline: f64 },
    Ready,
    Failed,
}

/// Construction parameters
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tuning: Tuning,
    pub settings: Settings,
    pub platform: SensorPlatform,
    pub entitlement: Entitlement,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tuning: Tuning::default(),
            settings: Settings::default(),
            platform: SensorPlatform::default(),
            entitlement: Entitlement::Locked,
            seed: 0,
        }
    }
}

/// The AR game engine
pub struct Engine {
    tuning: Tuning,
    settings: Settings,
    entitlement: Entitlement,
    phase: GamePhase,
    state: SimState,
    estimator: OrientationEstimator,
    timers: TimerSet,
    viewport: Viewport,
    camera: CameraStatus,
    listener: Box<dyn GameListener>,
    last_frame_at: Option<f64>,
    next_permission_poll: f64,
    last_error: Option<EngineError>,
    seed: u64,
    runs: u64,
}

impl Engine {
    /// Build an engine. Tuning that fails validation is replaced by the
    /// defaults.
    pub fn new(config: EngineConfig, listener: Box<dyn GameListener>) -> Self {
        let tuning = match config.tuning.validate() {
            Ok(()) => config.tuning,
            Err(e) => {
                log::warn!("Rejected tuning ({e}); using defaults");
                Tuning::default()
            }
        };
        let estimator = OrientationEstimator::new(config.platform, &tuning);
        Self {
            state: SimState::new(config.seed, tuning.lives),
            tuning,
            settings: config.settings,
            entitlement: config.entitlement,
            phase: GamePhase::Menu,
            estimator,
            timers: TimerSet::new(),
            viewport: Viewport::default(),
            camera: CameraStatus::NotRequested,
            listener,
            last_frame_at: None,
            next_permission_poll: 0.0,
            last_error: None,
            seed: config.seed,
            runs: 0,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Read-only simulation state
    pub fn state(&self) -> &SimState {
        &self.state
    }

    pub fn pose(&self) -> CameraPose {
        self.estimator.pose()
    }

    pub fn status(&self) -> &str {
        self.estimator.status()
    }

    pub fn camera_status(&self) -> CameraStatus {
        self.camera
    }

    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    pub fn timers(&self) -> &TimerSet {
        &self.timers
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    // === Lifecycle ===

    /// Start (or replay) a run. Must be called from a user gesture on
    /// explicit-consent platforms. Returns the sensors whose consent prompt
    /// the host must raise and answer through `consent`.
    pub fn start(&mut self, now: f64, user_gesture: bool) -> Result<Vec<SensorKind>, EngineError> {
        if self.entitlement == Entitlement::Locked {
            return Err(EngineError::Locked);
        }
        if !matches!(self.phase, GamePhase::Menu | GamePhase::GameOver) {
            log::debug!("Ignoring start while {:?}", self.phase);
            return Ok(Vec::new());
        }

        self.timers.cancel_all();
        self.last_error = None;
        self.phase = GamePhase::RequestingPermissions;
        if self.camera != CameraStatus::Ready {
            self.camera = CameraStatus::Pending {
                deadline: now + self.tuning.camera_timeout_ms,
            };
        }
        self.next_permission_poll = now;
        let prompts = self.estimator.request_permissions(now, user_gesture);
        log::info!("Requesting permissions (prompts: {:?})", prompts);
        Ok(prompts)
    }

    /// Platform answer to a sensor consent prompt
    pub fn consent(&mut self, sensor: SensorKind, granted: bool, now: f64) {
        self.estimator.consent(sensor, granted, now);
    }

    /// Host report on the camera stream
    pub fn camera_ready(&mut self, ok: bool) {
        if ok {
            self.camera = CameraStatus::Ready;
        } else {
            self.camera_failed();
        }
    }

    fn camera_failed(&mut self) {
        self.camera = CameraStatus::Failed;
        log::warn!("Camera stream unavailable; continuing without video");
        self.emit(GameEvent::Status(EngineError::CameraFailed.to_string()));
        self.last_error = Some(EngineError::CameraFailed);
    }

    pub fn pause(&mut self) {
        if self.phase == GamePhase::Playing {
            self.timers.suspend();
            self.phase = GamePhase::Paused;
            log::info!("Paused at {:.0}ms", self.state.now);
        } else {
            log::debug!("Ignoring pause while {:?}", self.phase);
        }
    }

    pub fn resume(&mut self) {
        if self.phase == GamePhase::Paused {
            self.timers.resume();
            self.phase = GamePhase::Playing;
            log::info!("Resumed");
        } else {
            log::debug!("Ignoring resume while {:?}", self.phase);
        }
    }

    /// Tear down the run and return to the menu
    pub fn quit(&mut self) {
        self.timers.cancel_all();
        self.estimator.reset();
        self.phase = GamePhase::Menu;
        log::info!("Returned to menu");
    }

    // === Inputs ===

    pub fn resize(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.viewport = Viewport::new(width, height);
        }
    }

    pub fn on_orientation(&mut self, sample: AbsoluteSample, now: f64) {
        self.estimator.on_absolute(sample, now);
    }

    pub fn on_gyro(&mut self, sample: GyroSample, now: f64) {
        self.estimator.on_gyro(sample, now);
    }

    /// Tap/click at viewport coordinates. No-op unless playing.
    pub fn tap(&mut self, x: f32, y: f32) -> Option<TapOutcome> {
        if self.phase != GamePhase::Playing {
            log::debug!("Ignoring tap while {:?}", self.phase);
            return None;
        }
        let pose = self.estimator.pose();
        let aim = if pose.mode == PoseMode::None {
            Vec2::new(x, y)
        } else {
            self.viewport.center()
        };
        let outcome = combat::resolve_tap(
            &mut self.state,
            &pose,
            self.viewport,
            aim,
            &self.tuning,
            self.settings.max_particles(),
            self.listener.as_mut(),
        );
        Some(outcome)
    }

    // === Frame driver ===

    /// Advance one rendered frame and return what to draw
    pub fn frame(&mut self, now: f64) -> FrameSnapshot {
        let dt = self
            .last_frame_at
            .map(|last| (now - last).clamp(0.0, MAX_FRAME_DELTA_MS))
            .unwrap_or(0.0);
        self.last_frame_at = Some(now);

        match self.phase {
            GamePhase::RequestingPermissions => self.poll_permissions(now),
            GamePhase::Playing => self.advance(dt),
            // Keep redrawing the frozen state
            GamePhase::Menu | GamePhase::Paused | GamePhase::GameOver => {}
        }
        self.snapshot()
    }

    /// Current frame without advancing anything
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot::capture(
            self.phase,
            &self.state,
            self.estimator.pose(),
            self.viewport,
            &self.tuning,
            &self.settings,
            self.estimator.status(),
        )
    }

    fn poll_permissions(&mut self, now: f64) {
        if now < self.next_permission_poll {
            return;
        }
        self.next_permission_poll = now + self.tuning.permission_poll_ms;

        if let CameraStatus::Pending { deadline } = self.camera {
            if now >= deadline {
                log::warn!("Camera did not start within {:.0}ms", self.tuning.camera_timeout_ms);
                self.camera_failed();
            }
        }
        let sensors_done = self.estimator.poll_permissions(now);
        if !sensors_done || matches!(self.camera, CameraStatus::Pending { .. }) {
            return;
        }

        let status = self.estimator.status().to_string();
        if self.camera == CameraStatus::Failed && !self.estimator.any_mode_confirmed() {
            log::warn!("Cannot start: {}", status);
            let error = EngineError::PermissionsUnconfirmed {
                status: status.clone(),
            };
            self.emit(GameEvent::Status(error.to_string()));
            self.last_error = Some(error);
            self.phase = GamePhase::Menu;
            return;
        }
        self.emit(GameEvent::Status(status));
        self.begin_play();
    }

    fn begin_play(&mut self) {
        self.runs += 1;
        let seed = self
            .seed
            .wrapping_add(self.runs.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        self.state = SimState::new(seed, self.tuning.lives);
        self.timers.arm(self.state.now, &self.tuning);
        self.phase = GamePhase::Playing;
        log::info!(
            "Run {} started (seed {}, aiming via {:?})",
            self.runs,
            seed,
            self.estimator.pose().mode
        );
        self.emit(GameEvent::ScoreChanged(0));
        wave::begin_run(&mut self.state, self.listener.as_mut());
    }

    fn advance(&mut self, dt_ms: f64) {
        let frame_now = self.state.now + dt_ms;
        for firing in self.timers.due(frame_now) {
            if self.phase != GamePhase::Playing || !self.timers.is_current(&firing) {
                break;
            }
            self.state.now = firing.at;
            self.run_timer(firing.kind);
        }
        self.state.now = frame_now;
        self.advance_effects(dt_ms as f32 / 1000.0);
    }

    fn run_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Motion => self.motion_tick(),
            TimerKind::WaveCheck => {
                wave::check_progress(&mut self.state, &self.tuning, self.listener.as_mut())
            }
            TimerKind::PowerUpSweep => combat::sweep_power_ups(&mut self.state, &self.tuning),
            TimerKind::ComboDecay => {
                combat::decay_combo(&mut self.state, &self.tuning, self.listener.as_mut())
            }
            TimerKind::PowerUpSpawn => {
                let yaw = self.estimator.pose().yaw;
                wave::maybe_spawn_power_up(&mut self.state, yaw, &self.tuning);
            }
        }
    }

    fn motion_tick(&mut self) {
        let dt = (self.tuning.motion_tick_ms / 1000.0) as f32;
        let now = self.state.now;
        let frozen = self.state.effect_active(PowerUpKind::Freeze);
        let flicker = self.settings.effective_flicker();

        for m in &mut self.state.microbes {
            if !frozen {
                let inward = -m.pos.normalize_or_zero();
                let lateral = inward.cross(Vec3::Y).normalize_or_zero();
                let sway = (now as f32 * WOBBLE_FREQ + m.wobble_phase).sin();
                m.pos += inward * m.speed * dt + lateral * sway * WOBBLE_SPEED * dt;
            }
            m.opacity = if flicker && m.kind.flickers() {
                let window = (m.age_ms(now) / FLICKER_WINDOW_MS) as u64;
                if window % 6 == 5 { 0.35 } else { 1.0 }
            } else {
                1.0
            };
        }

        combat::resolve_escapes(&mut self.state, &self.tuning, self.listener.as_mut());
        if self.state.lives == 0 {
            self.game_over();
            return;
        }

        let yaw = self.estimator.pose().yaw;
        wave::spawn_due(&mut self.state, yaw, &self.tuning);
    }

    fn advance_effects(&mut self, dt: f32) {
        for p in &mut self.state.particles {
            p.pos += p.vel * dt;
            p.vel *= 0.96;
            p.life -= dt * 1.5;
        }
        self.state.particles.retain(|p| p.life > 0.0);
        let cap = self.settings.max_particles();
        if self.state.particles.len() > cap {
            let excess = self.state.particles.len() - cap;
            self.state.particles.drain(..excess);
        }
        self.state.fire_flash = (self.state.fire_flash - dt * 6.0).max(0.0);
    }

    fn game_over(&mut self) {
        self.timers.cancel_all();
        self.phase = GamePhase::GameOver;
        log::info!(
            "Game over: score {} at wave {}",
            self.state.score,
            self.state.wave.number
        );
        self.emit(GameEvent::GameOver {
            score: self.state.score,
            wave: self.state.wave.number,
        });
    }

    fn emit(&mut self, event: GameEvent) {
        self.listener.dispatch(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::permission::ConsentModel;
    use crate::sim::state::{EntityKind, Microbe, WavePhase};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Listener that shares its log with the test
    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<GameEvent>>>);

    impl GameListener for Recorder {
        fn dispatch(&mut self, event: &GameEvent) {
            self.0.borrow_mut().push(event.clone());
        }
    }

    impl Recorder {
        fn take(&self) -> Vec<GameEvent> {
            std::mem::take(&mut *self.0.borrow_mut())
        }
    }

    fn engine(platform: SensorPlatform) -> (Engine, Recorder) {
        let recorder = Recorder::default();
        let config = EngineConfig {
            platform,
            entitlement: Entitlement::Unlocked,
            seed: 42,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(recorder.clone()));
        engine.resize(400.0, 800.0);
        (engine, recorder)
    }

    /// Drive frames every 16 ms from `from` up to `to` (wall clock)
    fn run(engine: &mut Engine, from: f64, to: f64) -> f64 {
        let mut t = from;
        while t < to {
            t += 16.0;
            engine.frame(t);
        }
        t
    }

    /// Start a run on an implicit platform with live absolute orientation
    fn playing() -> (Engine, Recorder, f64) {
        let (mut engine, recorder) = engine(SensorPlatform::default());
        engine.frame(0.0);
        engine.start(0.0, true).unwrap();
        engine.camera_ready(true);
        engine.on_orientation(AbsoluteSample::new(0.0, 90.0, 0.0), 10.0);
        let t = run(&mut engine, 0.0, 1100.0);
        assert_eq!(engine.phase(), GamePhase::Playing);
        (engine, recorder, t)
    }

    fn place(engine: &mut Engine, kind: EntityKind, pos: Vec3) {
        let now = engine.state.now;
        let id = engine.state.next_entity_id();
        engine
            .state
            .microbes
            .push(Microbe::new(id, kind, 1, pos, now, 0.0));
    }

    #[test]
    fn test_locked_engine_refuses_start() {
        let mut engine = Engine::new(EngineConfig::default(), Box::new(Vec::<GameEvent>::new()));
        assert_eq!(engine.start(0.0, true), Err(EngineError::Locked));
        assert_eq!(engine.phase(), GamePhase::Menu);
    }

    #[test]
    fn test_start_reaches_playing_with_absolute_pose() {
        let (engine, recorder, _) = playing();
        assert_eq!(engine.pose().mode, PoseMode::Absolute);
        assert!(engine.timers().is_armed());
        let events = recorder.take();
        assert!(events.contains(&GameEvent::WaveStarted(1)));
        assert!(events.contains(&GameEvent::Status("Motion sensors active".to_string())));
    }

    #[test]
    fn test_no_camera_and_no_sensor_falls_back_to_menu() {
        let (mut engine, recorder) = engine(SensorPlatform {
            consent: ConsentModel::Implicit,
            gyroscope_available: false,
        });
        engine.frame(0.0);
        engine.start(0.0, true).unwrap();
        engine.camera_ready(false);
        run(&mut engine, 0.0, 1200.0);
        assert_eq!(engine.phase(), GamePhase::Menu);
        assert!(matches!(
            engine.last_error(),
            Some(EngineError::PermissionsUnconfirmed { .. })
        ));
        assert!(recorder.take().iter().any(|e| matches!(e, GameEvent::Status(_))));
    }

    #[test]
    fn test_camera_timeout_with_sensor_still_plays() {
        let (mut engine, _) = engine(SensorPlatform::default());
        engine.frame(0.0);
        engine.start(0.0, true).unwrap();
        engine.on_orientation(AbsoluteSample::new(0.0, 90.0, 0.0), 10.0);
        run(&mut engine, 0.0, 4900.0);
        assert_eq!(engine.phase(), GamePhase::RequestingPermissions);

        run(&mut engine, 4900.0, 5200.0);
        assert_eq!(engine.camera_status(), CameraStatus::Failed);
        assert_eq!(engine.last_error(), Some(&EngineError::CameraFailed));
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.pose().mode, PoseMode::Absolute);
    }

    #[test]
    fn test_camera_without_sensors_plays_touch_only() {
        let (mut engine, _) = engine(SensorPlatform {
            consent: ConsentModel::Implicit,
            gyroscope_available: false,
        });
        engine.frame(0.0);
        engine.start(0.0, true).unwrap();
        engine.camera_ready(true);
        run(&mut engine, 0.0, 1200.0);
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.pose(), CameraPose::FROZEN);

        // Touch-only aiming follows the tap point
        let now = engine.state.now;
        let id = engine.state.next_entity_id();
        engine.state.microbes.push(Microbe::new(
            id,
            EntityKind::Basic,
            1,
            Vec3::new(5.0, 0.0, -10.0),
            now,
            0.0,
        ));
        let f = engine.viewport.focal_length(engine.tuning.fov_radians());
        let x = 200.0 + 0.5 * f;
        assert!(matches!(engine.tap(x, 400.0), Some(TapOutcome::Kill { .. })));
    }

    #[test]
    fn test_explicit_consent_flow_through_engine() {
        let (mut engine, _) = engine(SensorPlatform {
            consent: ConsentModel::Explicit,
            gyroscope_available: true,
        });
        engine.frame(0.0);
        let prompts = engine.start(0.0, true).unwrap();
        assert_eq!(prompts, vec![SensorKind::Orientation, SensorKind::Gyroscope]);
        engine.camera_ready(true);
        engine.consent(SensorKind::Orientation, true, 200.0);
        engine.consent(SensorKind::Gyroscope, false, 200.0);
        run(&mut engine, 0.0, 500.0);
        assert_eq!(engine.phase(), GamePhase::RequestingPermissions);

        engine.on_orientation(AbsoluteSample::new(45.0, 90.0, 0.0), 510.0);
        run(&mut engine, 500.0, 700.0);
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.pose().mode, PoseMode::Absolute);
    }

    #[test]
    fn test_tap_while_paused_is_noop() {
        let (mut engine, _, _) = playing();
        place(&mut engine, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        engine.pause();
        assert_eq!(engine.tap(200.0, 400.0), None);
        assert_eq!(engine.state().microbes.len(), 1);
    }

    #[test]
    fn test_paused_frames_do_not_mutate() {
        let (mut engine, _, t) = playing();
        place(&mut engine, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        engine.pause();
        assert!(!engine.timers().is_armed());
        let before = engine.state().microbes[0].pos;
        let sim_before = engine.state().now;

        let t = run(&mut engine, t, t + 5000.0);
        assert_eq!(engine.state().microbes[0].pos, before);
        assert_eq!(engine.state().now, sim_before);
        assert_eq!(engine.frame(t + 16.0).phase, GamePhase::Paused);

        engine.resume();
        run(&mut engine, t + 16.0, t + 200.0);
        assert!(engine.state().microbes[0].pos.z > before.z);
    }

    #[test]
    fn test_frequent_pauses_keep_slow_timers_on_schedule() {
        let (mut engine, _, mut t) = playing();
        engine.tuning.power_up_chance = 1.0;
        let generation = engine.timers().generation();

        while engine.state().now < 31_000.0 {
            for _ in 0..250 {
                t += 16.0;
                engine.frame(t);
                engine.state.microbes.clear();
            }
            engine.pause();
            engine.resume();
        }
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert_eq!(engine.timers().generation(), generation);
        assert!(engine.state().last_power_up_spawn >= 25_000.0);
    }

    #[test]
    fn test_invalid_tuning_falls_back_to_defaults() {
        let config = EngineConfig {
            tuning: Tuning {
                spawn_height: -1.0,
                lives: 0,
                ..Tuning::default()
            },
            entitlement: Entitlement::Unlocked,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::new(Vec::<GameEvent>::new()));
        assert_eq!(engine.tuning, Tuning::default());
        assert_eq!(engine.state().lives, 3);

        engine.frame(0.0);
        engine.start(0.0, true).unwrap();
        engine.camera_ready(true);
        engine.on_orientation(AbsoluteSample::new(0.0, 90.0, 0.0), 10.0);
        run(&mut engine, 0.0, 4000.0);
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert!(!engine.state().microbes.is_empty());
    }

    #[test]
    fn test_motion_before_projection() {
        let (mut engine, _, t) = playing();
        place(&mut engine, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        let snap = engine.frame(t + 100.0);
        let m = &engine.state().microbes[0];
        let view = snap.microbes.iter().find(|v| v.id == m.id).unwrap();
        assert!((view.distance - m.distance()).abs() < 1e-6);
        assert!(view.distance < 10.0);
    }

    #[test]
    fn test_freeze_stops_motion_but_not_aging() {
        let (mut engine, _, t) = playing();
        place(&mut engine, EntityKind::Basic, Vec3::new(0.0, 0.0, -10.0));
        engine.state.active_power_up = Some(crate::sim::state::ActivePowerUp {
            kind: PowerUpKind::Freeze,
            expires_at: engine.state.now + 1e6,
        });
        let before = engine.state().microbes[0].pos;
        run(&mut engine, t, t + 500.0);
        assert_eq!(engine.state().microbes[0].pos, before);
    }

    #[test]
    fn test_escape_costs_one_life_through_loop() {
        let (mut engine, recorder, t) = playing();
        recorder.take();
        place(&mut engine, EntityKind::Boss, Vec3::new(0.0, 0.0, -0.55));
        run(&mut engine, t, t + 200.0);
        let lost = recorder
            .take()
            .iter()
            .filter(|e| **e == GameEvent::LifeLost)
            .count();
        assert_eq!(lost, 1);
        assert_eq!(engine.state().lives, 2);
    }

    #[test]
    fn test_game_over_cancels_timers_and_replay_starts_fresh() {
        let (mut engine, recorder, t) = playing();
        for _ in 0..3 {
            place(&mut engine, EntityKind::Basic, Vec3::new(0.0, 0.0, -0.3));
        }
        let t = run(&mut engine, t, t + 50.0);
        assert_eq!(engine.phase(), GamePhase::GameOver);
        assert!(!engine.timers().is_armed());
        assert!(recorder
            .take()
            .iter()
            .any(|e| matches!(e, GameEvent::GameOver { .. })));

        let generation = engine.timers().generation();
        engine.start(t, true).unwrap();
        engine.on_orientation(AbsoluteSample::new(0.0, 90.0, 0.0), t + 5.0);
        run(&mut engine, t, t + 1200.0);
        assert_eq!(engine.phase(), GamePhase::Playing);
        assert!(engine.timers().generation() > generation);
        assert_eq!(engine.state().wave.number, 1);
        assert_eq!(engine.state().lives, 3);
        assert_eq!(engine.state().score, 0);
    }

    #[test]
    fn test_full_wave_cycle() {
        let (mut engine, recorder, mut t) = playing();
        // Clear each microbe as it spawns by tapping repeatedly
        let mut guard = 0;
        while engine.state().wave.number == 1 && guard < 10_000 {
            t += 16.0;
            engine.frame(t);
            // Keep spawns centered so they are hittable
            let ids: Vec<u32> = engine.state().microbes.iter().map(|m| m.id).collect();
            for id in ids {
                if let Some(m) = engine.state.microbes.iter_mut().find(|m| m.id == id) {
                    m.pos = Vec3::new(0.0, 0.0, -m.pos.length());
                }
                engine.tap(200.0, 400.0);
            }
            guard += 1;
        }
        assert_eq!(engine.state().wave.number, 2);
        assert_eq!(engine.state().wave.phase, WavePhase::Active);
        assert_eq!(engine.state().wave.spawned_count, 0);
        assert_eq!(engine.state().kills, 8);
        let events = recorder.take();
        assert!(events.contains(&GameEvent::WaveStarted(2)));
        assert_eq!(
            events.iter().filter(|e| **e == GameEvent::EntityEliminated).count(),
            8
        );
    }

    #[test]
    fn test_combo_decays_through_timer() {
        let (mut engine, recorder, t) = playing();
        engine.state.combo.count = 3;
        engine.state.combo.last_hit_at = engine.state.now;
        recorder.take();
        run(&mut engine, t, t + 2200.0);
        assert_eq!(engine.state().combo.count, 0);
        assert!(recorder.take().contains(&GameEvent::ComboChanged(0)));
    }
}
