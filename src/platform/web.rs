//! Browser host
//!
//! Binds DOM sensor events, consent prompts, the camera stream and the
//! animation-frame loop to one shared `Engine`. Drawing is left to the page:
//! every frame is published as JSON through a `microbe-frame` event.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{DeviceOrientationEvent, Document, HtmlCanvasElement, PointerEvent};

use crate::platform::permission::ConsentModel;
use crate::settings::{QualityPreset, Settings};
use crate::sim::events::GameListener;
use crate::sim::orientation::{AbsoluteSample, GyroSample, SensorKind, SensorPlatform};
use crate::sim::state::{GamePhase, PowerUpKind};
use crate::sim::tick::{CameraStatus, Engine, EngineConfig, Entitlement};
use crate::tuning::Tuning;

#[wasm_bindgen(inline_js = "
    export function needs_explicit_consent() {
        return typeof DeviceOrientationEvent !== 'undefined'
            && typeof DeviceOrientationEvent.requestPermission === 'function';
    }

    export function gyroscope_available() {
        return typeof Gyroscope === 'function';
    }

    export function request_orientation_permission() {
        return DeviceOrientationEvent.requestPermission().catch(() => 'denied');
    }

    export function request_motion_permission() {
        if (typeof DeviceMotionEvent === 'undefined'
            || typeof DeviceMotionEvent.requestPermission !== 'function') {
            return Promise.resolve('granted');
        }
        return DeviceMotionEvent.requestPermission().catch(() => 'denied');
    }

    export function start_gyroscope(callback) {
        try {
            const sensor = new Gyroscope({ frequency: 60 });
            sensor.addEventListener('reading', () => callback(sensor.x, sensor.y, sensor.z));
            sensor.start();
            return true;
        } catch (e) {
            return false;
        }
    }

    export function start_camera() {
        const video = document.getElementById('camera');
        if (!video || !navigator.mediaDevices) {
            return Promise.resolve(false);
        }
        return navigator.mediaDevices
            .getUserMedia({ video: { facingMode: 'environment' }, audio: false })
            .then((stream) => { video.srcObject = stream; return video.play(); })
            .then(() => true)
            .catch(() => false);
    }

    export function is_unlocked() {
        return document.body && document.body.dataset.unlocked === 'true';
    }

    export function quality_override() {
        const quality = document.body && document.body.dataset.quality;
        return quality || undefined;
    }

    export function publish_frame(json) {
        window.dispatchEvent(new CustomEvent('microbe-frame', { detail: json }));
    }
")]
extern "C" {
    fn needs_explicit_consent() -> bool;
    fn gyroscope_available() -> bool;
    fn request_orientation_permission() -> js_sys::Promise;
    fn request_motion_permission() -> js_sys::Promise;
    fn start_gyroscope(callback: &Closure<dyn FnMut(f64, f64, f64)>) -> bool;
    fn start_camera() -> js_sys::Promise;
    fn is_unlocked() -> bool;
    fn quality_override() -> Option<String>;
    fn publish_frame(json: &str);
}

type Shared = Rc<RefCell<Engine>>;

/// Host clock (ms)
fn now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
}

/// Mirrors engine callbacks into the HUD
struct DomListener {
    document: Document,
}

impl DomListener {
    fn set_text(&self, id: &str, text: &str) {
        if let Some(el) = self.document.get_element_by_id(id) {
            el.set_text_content(Some(text));
        }
    }

    fn set_visible(&self, id: &str, visible: bool) {
        if let Some(el) = self.document.get_element_by_id(id) {
            let _ = el.set_attribute("class", if visible { "" } else { "hidden" });
        }
    }
}

impl GameListener for DomListener {
    fn on_score_changed(&mut self, score: u64) {
        self.set_text("score", &score.to_string());
    }

    fn on_life_lost(&mut self) {
        log::info!("Life lost");
    }

    fn on_combo_changed(&mut self, combo: u32) {
        self.set_text("combo", &if combo > 1 { format!("x{combo}") } else { String::new() });
    }

    fn on_wave_started(&mut self, wave: u32) {
        self.set_text("wave", &wave.to_string());
    }

    fn on_power_up_activated(&mut self, kind: PowerUpKind) {
        self.set_text("power-up", &format!("{kind:?}"));
    }

    fn on_game_over(&mut self, score: u64, wave: u32) {
        self.set_text("final-score", &score.to_string());
        self.set_text("final-wave", &wave.to_string());
        self.set_visible("game-over", true);
    }

    fn on_status(&mut self, message: &str) {
        self.set_text("status", message);
    }
}

/// Page entry point
pub fn run() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(log::Level::Info).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
    log::info!("Microbe AR starting...");

    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let canvas: HtmlCanvasElement = document
        .get_element_by_id("canvas")
        .ok_or("no canvas")?
        .dyn_into()?;

    let platform = SensorPlatform {
        consent: if needs_explicit_consent() {
            ConsentModel::Explicit
        } else {
            ConsentModel::Implicit
        },
        gyroscope_available: gyroscope_available(),
    };
    let mut settings = Settings::load();
    if let Some(requested) = quality_override() {
        match QualityPreset::parse(&requested) {
            Some(preset) => settings.quality = preset,
            None => log::warn!("Unknown quality preset {requested:?}"),
        }
    }
    log::info!("Quality preset: {}", settings.quality.as_str());

    let config = EngineConfig {
        tuning: Tuning::default(),
        settings,
        platform,
        entitlement: if is_unlocked() {
            Entitlement::Unlocked
        } else {
            Entitlement::Locked
        },
        seed: js_sys::Date::now() as u64,
    };
    log::info!("Platform: {:?}, seed {}", platform, config.seed);

    let listener = DomListener {
        document: document.clone(),
    };
    let engine: Shared = Rc::new(RefCell::new(Engine::new(config, Box::new(listener))));
    engine
        .borrow_mut()
        .resize(canvas.client_width() as f32, canvas.client_height() as f32);

    setup_sensors(&window, platform, engine.clone())?;
    setup_input(&canvas, engine.clone())?;
    setup_buttons(&document, engine.clone());
    setup_auto_pause(&window, &document, engine.clone())?;

    request_animation_frame(engine);
    log::info!("Microbe AR running!");
    Ok(())
}

fn setup_sensors(window: &web_sys::Window, platform: SensorPlatform, engine: Shared) -> Result<(), JsValue> {
    {
        let engine = engine.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: DeviceOrientationEvent| {
            let sample = AbsoluteSample {
                alpha: event.alpha().map(|v| v as f32),
                beta: event.beta().map(|v| v as f32),
                gamma: event.gamma().map(|v| v as f32),
            };
            engine.borrow_mut().on_orientation(sample, now());
        });
        window.add_event_listener_with_callback("deviceorientation", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    if platform.gyroscope_available {
        let closure = Closure::<dyn FnMut(f64, f64, f64)>::new(move |x: f64, y: f64, z: f64| {
            let sample = GyroSample {
                x: x as f32,
                y: y as f32,
                z: z as f32,
            };
            engine.borrow_mut().on_gyro(sample, now());
        });
        if !start_gyroscope(&closure) {
            log::warn!("Gyroscope present but failed to start");
        }
        closure.forget();
    }
    Ok(())
}

fn setup_input(canvas: &HtmlCanvasElement, engine: Shared) -> Result<(), JsValue> {
    {
        let engine = engine.clone();
        let target = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: PointerEvent| {
            let rect = target.get_bounding_client_rect();
            let x = event.client_x() as f64 - rect.left();
            let y = event.client_y() as f64 - rect.top();
            if let Some(outcome) = engine.borrow_mut().tap(x as f32, y as f32) {
                log::debug!("Tap at ({x:.0}, {y:.0}): {outcome:?}");
            }
        });
        canvas.add_event_listener_with_callback("pointerdown", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    {
        let target = canvas.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            engine
                .borrow_mut()
                .resize(target.client_width() as f32, target.client_height() as f32);
        });
        if let Some(window) = web_sys::window() {
            window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref())?;
        }
        closure.forget();
    }
    Ok(())
}

/// Start (or replay) from a click. Consent prompts must be raised inside the
/// gesture, so the promises are created here and awaited afterwards.
fn start_run(engine: &Shared) {
    let at = now();
    let prompts = match engine.borrow_mut().start(at, true) {
        Ok(prompts) => prompts,
        Err(e) => {
            log::warn!("Start refused: {e}");
            return;
        }
    };

    for sensor in prompts {
        let promise = match sensor {
            SensorKind::Orientation => request_orientation_permission(),
            SensorKind::Gyroscope => request_motion_permission(),
        };
        let engine = engine.clone();
        spawn_local(async move {
            let answer = JsFuture::from(promise).await.ok().and_then(|v| v.as_string());
            let granted = answer.as_deref() == Some("granted");
            log::info!("{sensor:?} permission: {answer:?}");
            engine.borrow_mut().consent(sensor, granted, now());
        });
    }

    if engine.borrow().camera_status() != CameraStatus::Ready {
        let promise = start_camera();
        let engine = engine.clone();
        spawn_local(async move {
            let ok = JsFuture::from(promise)
                .await
                .ok()
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            engine.borrow_mut().camera_ready(ok);
        });
    }
}

fn setup_buttons(document: &Document, engine: Shared) {
    let bind = |id: &str, action: Box<dyn Fn(&Shared)>| {
        let Some(btn) = document.get_element_by_id(id) else {
            log::debug!("No #{id} button on the page");
            return;
        };
        let engine = engine.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
            action(&engine);
        });
        let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    };

    bind("start-btn", Box::new(start_run));
    bind("restart-btn", Box::new(start_run));
    bind("pause-btn", Box::new(|engine: &Shared| engine.borrow_mut().pause()));
    bind("resume-btn", Box::new(|engine: &Shared| engine.borrow_mut().resume()));
    bind("quit-btn", Box::new(|engine: &Shared| engine.borrow_mut().quit()));
    bind(
        "reduced-motion-btn",
        Box::new(|engine: &Shared| {
            let mut e = engine.borrow_mut();
            let mut settings = e.settings().clone();
            settings.reduced_motion = !settings.reduced_motion;
            settings.save();
            log::info!("Reduced motion: {}", settings.reduced_motion);
            e.set_settings(settings);
        }),
    );
}

fn setup_auto_pause(window: &web_sys::Window, document: &Document, engine: Shared) -> Result<(), JsValue> {
    // Visibility change (tab switch, minimize)
    {
        let engine = engine.clone();
        let doc = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            if doc.visibility_state() == web_sys::VisibilityState::Hidden {
                let mut e = engine.borrow_mut();
                if e.phase() == GamePhase::Playing {
                    e.pause();
                    log::info!("Auto-paused (tab hidden)");
                }
            }
        });
        document.add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }

    // Window blur
    {
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let mut e = engine.borrow_mut();
            if e.phase() == GamePhase::Playing {
                e.pause();
                log::info!("Auto-paused (window blur)");
            }
        });
        window.add_event_listener_with_callback("blur", closure.as_ref().unchecked_ref())?;
        closure.forget();
    }
    Ok(())
}

fn request_animation_frame(engine: Shared) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let closure = Closure::once(move |time: f64| {
        game_loop(engine, time);
    });
    let _ = window.request_animation_frame(closure.as_ref().unchecked_ref());
    closure.forget();
}

fn game_loop(engine: Shared, time: f64) {
    let snapshot = engine.borrow_mut().frame(time);
    match serde_json::to_string(&snapshot) {
        Ok(json) => publish_frame(&json),
        Err(e) => log::error!("Failed to encode frame: {e}"),
    }
    request_animation_frame(engine);
}
