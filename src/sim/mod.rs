//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Simulation clock only (advances while playing)
//! - Seeded RNG only
//! - Stable iteration order (spawn order)
//! - No rendering or platform dependencies

pub mod camera;
pub mod combat;
pub mod events;
pub mod orientation;
pub mod radar;
pub mod snapshot;
pub mod state;
pub mod tick;
pub mod timers;
pub mod wave;

pub use camera::{CameraPose, Lens, PoseMode, Projection, Viewport, project, project_radius};
pub use combat::TapOutcome;
pub use events::{GameEvent, GameListener, NullListener};
pub use orientation::{AbsoluteSample, GyroSample, OrientationEstimator, SensorKind, SensorPlatform};
pub use snapshot::FrameSnapshot;
pub use state::{
    EntityKind, GamePhase, Microbe, PowerUp, PowerUpKind, SimState, WavePhase, WaveState,
};
pub use tick::{CameraStatus, Engine, EngineConfig, EngineError, Entitlement};
pub use timers::{TimerKind, TimerSet};
