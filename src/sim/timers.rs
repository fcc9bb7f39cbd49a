//! Fixed-interval timers sharing one simulation state
//!
//! All periodic work lives in one `TimerSet` so it can be cancelled as a unit.
//! Every arm bumps the generation; a firing computed under an older generation
//! is stale and must not be applied.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_CATCH_UP;
use crate::tuning::Tuning;

/// Periodic jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    /// Entity motion, escapes, spawns
    Motion,
    /// Wave completion check
    WaveCheck,
    /// Expired power-up sweep
    PowerUpSweep,
    /// Combo decay check
    ComboDecay,
    /// Power-up spawn roll
    PowerUpSpawn,
}

impl TimerKind {
    pub const ALL: [TimerKind; 5] = [
        TimerKind::Motion,
        TimerKind::WaveCheck,
        TimerKind::PowerUpSweep,
        TimerKind::ComboDecay,
        TimerKind::PowerUpSpawn,
    ];

    pub fn interval_ms(self, tuning: &Tuning) -> f64 {
        match self {
            TimerKind::Motion => tuning.motion_tick_ms,
            TimerKind::WaveCheck => tuning.wave_check_ms,
            TimerKind::PowerUpSweep => tuning.power_up_sweep_ms,
            TimerKind::ComboDecay => tuning.combo_check_ms,
            TimerKind::PowerUpSpawn => tuning.power_up_spawn_ms,
        }
    }
}

#[derive(Debug, Clone)]
struct Timer {
    kind: TimerKind,
    interval_ms: f64,
    next_due: f64,
}

/// A due timer firing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Firing {
    pub kind: TimerKind,
    /// Scheduled time of this firing
    pub at: f64,
    pub generation: u64,
}

/// All periodic timers of one run
#[derive(Debug, Clone, Default)]
pub struct TimerSet {
    timers: Vec<Timer>,
    generation: u64,
    suspended: bool,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm every timer starting at `now`, replacing whatever was armed
    pub fn arm(&mut self, now: f64, tuning: &Tuning) {
        self.generation += 1;
        self.suspended = false;
        self.timers = TimerKind::ALL
            .iter()
            .map(|&kind| {
                let interval_ms = kind.interval_ms(tuning);
                Timer {
                    kind,
                    interval_ms,
                    next_due: now + interval_ms,
                }
            })
            .collect();
    }

    /// Cancel every timer at once
    pub fn cancel_all(&mut self) {
        if !self.timers.is_empty() {
            log::debug!("Cancelled {} timers (generation {})", self.timers.len(), self.generation);
        }
        self.timers.clear();
        self.suspended = false;
        self.generation += 1;
    }

    /// Stop firing without losing each timer's schedule. The simulation clock
    /// stands still meanwhile, so `resume` picks up every timer mid-period.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Armed and not suspended
    pub fn is_armed(&self) -> bool {
        !self.timers.is_empty() && !self.suspended
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a firing belongs to the current arming
    pub fn is_current(&self, firing: &Firing) -> bool {
        self.is_armed() && firing.generation == self.generation
    }

    /// Collect every firing due by `now`, in time order. Each timer fires at
    /// most `MAX_CATCH_UP` times; the rest of a backlog is dropped.
    pub fn due(&mut self, now: f64) -> Vec<Firing> {
        let mut firings = Vec::new();
        if self.suspended {
            return firings;
        }
        for timer in &mut self.timers {
            let mut fired = 0;
            while timer.next_due <= now && fired < MAX_CATCH_UP {
                firings.push(Firing {
                    kind: timer.kind,
                    at: timer.next_due,
                    generation: self.generation,
                });
                timer.next_due += timer.interval_ms;
                fired += 1;
            }
            if timer.next_due <= now {
                // Skip the backlog rather than spiral
                let missed = ((now - timer.next_due) / timer.interval_ms).floor() + 1.0;
                timer.next_due += missed * timer.interval_ms;
            }
        }
        // Stable sort keeps the ALL order (motion first) for simultaneous firings
        firings.sort_by(|a, b| a.at.total_cmp(&b.at));
        firings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_fires_in_time_order() {
        let tuning = Tuning::default();
        let mut timers = TimerSet::new();
        timers.arm(0.0, &tuning);

        let firings = timers.due(100.0);
        let motion = firings.iter().filter(|f| f.kind == TimerKind::Motion).count();
        assert_eq!(motion, 6);
        assert!(firings.iter().any(|f| f.kind == TimerKind::ComboDecay));
        assert!(firings.windows(2).all(|w| w[0].at <= w[1].at));
        // Simultaneous firings keep motion first
        let at_96: Vec<_> = firings.iter().filter(|f| f.at == 96.0).collect();
        assert_eq!(at_96[0].kind, TimerKind::Motion);

        assert!(timers.due(100.0).is_empty());
    }

    #[test]
    fn test_catch_up_is_capped() {
        let tuning = Tuning::default();
        let mut timers = TimerSet::new();
        timers.arm(0.0, &tuning);
        let firings = timers.due(10_000.0);
        let motion = firings.iter().filter(|f| f.kind == TimerKind::Motion).count();
        assert_eq!(motion, MAX_CATCH_UP as usize);
        // Backlog dropped, next motion firing is in the future
        let next = timers.due(10_016.0);
        assert!(next.iter().filter(|f| f.kind == TimerKind::Motion).count() <= 1);
    }

    #[test]
    fn test_cancel_all_invalidates_firings() {
        let tuning = Tuning::default();
        let mut timers = TimerSet::new();
        timers.arm(0.0, &tuning);
        let firings = timers.due(20.0);
        assert!(timers.is_current(&firings[0]));

        timers.cancel_all();
        assert!(!timers.is_armed());
        assert!(!timers.is_current(&firings[0]));
        assert!(timers.due(100_000.0).is_empty());

        timers.arm(0.0, &tuning);
        assert!(!timers.is_current(&firings[0]));
    }

    #[test]
    fn test_suspend_keeps_schedule_and_generation() {
        let tuning = Tuning::default();
        let mut timers = TimerSet::new();
        timers.arm(0.0, &tuning);
        timers.due(4000.0);
        let generation = timers.generation();

        timers.suspend();
        assert!(!timers.is_armed());
        assert!(timers.due(4900.0).is_empty());

        timers.resume();
        assert_eq!(timers.generation(), generation);
        let firings = timers.due(5000.0);
        assert!(firings
            .iter()
            .any(|f| f.kind == TimerKind::PowerUpSpawn && f.at == 5000.0));
        assert!(firings.iter().all(|f| timers.is_current(f)));
    }
}
