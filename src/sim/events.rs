//! Callbacks fired to the host application
//!
//! Fired synchronously from the combat resolver and the loop, in the order the
//! underlying state changes happen.

use serde::{Deserialize, Serialize};

use super::state::PowerUpKind;

/// Everything the engine reports outward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    ScoreChanged(u64),
    LifeLost,
    EntityEliminated,
    ComboChanged(u32),
    WaveStarted(u32),
    PowerUpActivated(PowerUpKind),
    GameOver { score: u64, wave: u32 },
    Status(String),
}

/// Host-side receiver. Every method defaults to a no-op.
pub trait GameListener {
    fn on_score_changed(&mut self, _score: u64) {}
    fn on_life_lost(&mut self) {}
    fn on_entity_eliminated(&mut self) {}
    fn on_combo_changed(&mut self, _combo: u32) {}
    fn on_wave_started(&mut self, _wave: u32) {}
    fn on_power_up_activated(&mut self, _kind: PowerUpKind) {}
    fn on_game_over(&mut self, _score: u64, _wave: u32) {}
    fn on_status(&mut self, _message: &str) {}

    /// Route a `GameEvent` to the matching callback
    fn dispatch(&mut self, event: &GameEvent) {
        match event {
            GameEvent::ScoreChanged(score) => self.on_score_changed(*score),
            GameEvent::LifeLost => self.on_life_lost(),
            GameEvent::EntityEliminated => self.on_entity_eliminated(),
            GameEvent::ComboChanged(combo) => self.on_combo_changed(*combo),
            GameEvent::WaveStarted(wave) => self.on_wave_started(*wave),
            GameEvent::PowerUpActivated(kind) => self.on_power_up_activated(*kind),
            GameEvent::GameOver { score, wave } => self.on_game_over(*score, *wave),
            GameEvent::Status(message) => self.on_status(message),
        }
    }
}

/// Discards everything
#[derive(Debug, Default)]
pub struct NullListener;

impl GameListener for NullListener {}

/// Records events in order (tests, replays, JSON bridges)
impl GameListener for Vec<GameEvent> {
    fn dispatch(&mut self, event: &GameEvent) {
        self.push(event.clone());
    }
}
