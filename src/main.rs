//! Microbe AR entry point
//!
//! On the web this boots the browser host. Natively it runs a headless
//! autopilot session on a virtual clock and logs how it went.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    microbe_ar::platform::web::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod demo {
    use microbe_ar::sim::{
        AbsoluteSample, Engine, EngineConfig, Entitlement, GameListener, GamePhase, PowerUpKind,
    };

    /// Frame period of the virtual display (ms)
    const FRAME_MS: f64 = 16.0;
    /// Autopilot trigger cadence (ms)
    const TAP_EVERY_MS: f64 = 250.0;

    /// Logs every callback
    #[derive(Default)]
    struct LogListener {
        lives_lost: u32,
    }

    impl GameListener for LogListener {
        fn on_wave_started(&mut self, wave: u32) {
            log::info!("== Wave {wave} ==");
        }

        fn on_life_lost(&mut self) {
            self.lives_lost += 1;
            log::info!("Life lost ({} so far)", self.lives_lost);
        }

        fn on_power_up_activated(&mut self, kind: PowerUpKind) {
            log::info!("Picked up {kind:?}");
        }

        fn on_game_over(&mut self, score: u64, wave: u32) {
            log::info!("GAME OVER - score {score}, reached wave {wave}");
        }

        fn on_status(&mut self, message: &str) {
            log::info!("Status: {message}");
        }
    }

    /// Orientation event that points the phone at a world position
    fn aim_at(x: f32, y: f32, z: f32) -> AbsoluteSample {
        let azimuth = (-x).atan2(-z);
        let pitch = y.atan2(x.hypot(z));
        AbsoluteSample::new(azimuth.to_degrees(), 90.0 + pitch.to_degrees(), 0.0)
    }

    pub fn run(seed: u64, seconds: f64) {
        let config = EngineConfig {
            entitlement: Entitlement::Unlocked,
            seed,
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, Box::<LogListener>::default());

        let mut t = 0.0;
        engine.frame(t);
        if let Err(e) = engine.start(t, true) {
            log::error!("Could not start: {e}");
            return;
        }
        engine.camera_ready(true);
        engine.on_orientation(AbsoluteSample::new(0.0, 90.0, 0.0), t);

        let mut next_tap = 0.0;
        let end = seconds * 1000.0;
        while t < end {
            t += FRAME_MS;
            let snapshot = engine.frame(t);
            match snapshot.phase {
                GamePhase::GameOver => break,
                GamePhase::Playing => {}
                _ => continue,
            }

            // Swing toward the closest microbe and keep the sensor fed
            let target = engine
                .state()
                .microbes
                .iter()
                .min_by(|a, b| a.distance().total_cmp(&b.distance()))
                .map(|m| m.pos);
            let sample = match target {
                Some(p) => aim_at(p.x, p.y, p.z),
                None => aim_at(0.0, 0.0, -1.0),
            };
            engine.on_orientation(sample, t);

            if t >= next_tap && target.is_some() {
                let center = snapshot.viewport.center();
                if let Some(outcome) = engine.tap(center.x, center.y) {
                    log::debug!("{t:.0}ms: {outcome:?}");
                }
                next_tap = t + TAP_EVERY_MS;
            }
        }

        let state = engine.state();
        log::info!(
            "Session over after {:.1}s: score {}, wave {}, {} kills, {} lives left",
            state.now / 1000.0,
            state.score,
            state.wave.number,
            state.kills,
            state.lives
        );
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Microbe AR (native) starting...");
    log::info!("Native mode runs a headless autopilot; build for wasm32 for the browser version");

    let mut args = std::env::args().skip(1);
    let seed = args.next().and_then(|s| s.parse().ok()).unwrap_or(42);
    let seconds = args.next().and_then(|s| s.parse().ok()).unwrap_or(120.0);
    demo::run(seed, seconds);
}
