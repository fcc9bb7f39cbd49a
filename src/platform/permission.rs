//! Sensor permission flows
//!
//! Browsers disagree on how motion sensors are unlocked. Some demand an
//! explicit prompt fired from a user gesture; others hand out events freely but
//! may never actually deliver one. Both are driven through `PermissionFlow` and
//! polled with the host clock, so a flow that never hears back still resolves
//! at its deadline instead of hanging.

use serde::{Deserialize, Serialize};

/// Final answer of a permission flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionOutcome {
    /// Consent given and real samples observed
    Granted,
    /// Consent refused (or requested outside a user gesture)
    Denied,
    /// Consent assumed or given, but no sample arrived in time
    Unverifiable,
}

/// Progress of a permission flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionStatus {
    /// Not requested yet
    Idle,
    /// Waiting on the platform's consent prompt
    AwaitingConsent,
    /// Waiting for a first real sample
    Verifying,
    Resolved(PermissionOutcome),
}

impl PermissionStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, PermissionStatus::Resolved(_))
    }

    pub fn granted(&self) -> bool {
        matches!(self, PermissionStatus::Resolved(PermissionOutcome::Granted))
    }
}

/// How a platform hands out sensor access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsentModel {
    /// A prompt must be raised from a user gesture
    Explicit,
    /// Access is assumed; delivery still has to be verified
    Implicit,
}

impl ConsentModel {
    /// Build the flow for this model. `verify_ms` is the implicit verification
    /// window, `data_wait_ms` the post-consent wait for data.
    pub fn flow(self, verify_ms: f64, data_wait_ms: f64) -> Box<dyn PermissionFlow> {
        match self {
            ConsentModel::Explicit => Box::new(ExplicitConsent::new(data_wait_ms)),
            ConsentModel::Implicit => Box::new(ImplicitConsent::new(verify_ms)),
        }
    }
}

/// Capability interface for one sensor's permission
pub trait PermissionFlow {
    /// Start the flow. Returns true when the host must raise a consent prompt
    /// and report the answer through `consent`.
    fn request(&mut self, now: f64, user_gesture: bool) -> bool;

    /// Platform's answer to the consent prompt
    fn consent(&mut self, granted: bool, now: f64);

    /// A real sample arrived
    fn observe_sample(&mut self, now: f64);

    /// Advance deadlines and report progress
    fn poll(&mut self, now: f64) -> PermissionStatus;

    /// Current progress without advancing
    fn status(&self) -> PermissionStatus;

    /// Drop any in-flight request
    fn reset(&mut self);
}

/// Prompt-gated flow (explicit-consent platforms)
#[derive(Debug, Clone)]
pub struct ExplicitConsent {
    status: PermissionStatus,
    data_wait_ms: f64,
    deadline: f64,
    sample_seen: bool,
}

impl ExplicitConsent {
    pub fn new(data_wait_ms: f64) -> Self {
        Self {
            status: PermissionStatus::Idle,
            data_wait_ms,
            deadline: 0.0,
            sample_seen: false,
        }
    }
}

impl PermissionFlow for ExplicitConsent {
    fn request(&mut self, _now: f64, user_gesture: bool) -> bool {
        self.sample_seen = false;
        if !user_gesture {
            // The platform rejects prompts raised outside a user action
            log::warn!("Sensor permission requested without a user gesture");
            self.status = PermissionStatus::Resolved(PermissionOutcome::Denied);
            return false;
        }
        self.status = PermissionStatus::AwaitingConsent;
        true
    }

    fn consent(&mut self, granted: bool, now: f64) {
        if self.status != PermissionStatus::AwaitingConsent {
            log::debug!("Ignoring late consent answer ({granted})");
            return;
        }
        if granted {
            self.status = PermissionStatus::Verifying;
            self.deadline = now + self.data_wait_ms;
        } else {
            self.status = PermissionStatus::Resolved(PermissionOutcome::Denied);
        }
    }

    fn observe_sample(&mut self, _now: f64) {
        self.sample_seen = true;
    }

    fn poll(&mut self, now: f64) -> PermissionStatus {
        if self.status == PermissionStatus::Verifying {
            if self.sample_seen {
                self.status = PermissionStatus::Resolved(PermissionOutcome::Granted);
            } else if now >= self.deadline {
                self.status = PermissionStatus::Resolved(PermissionOutcome::Unverifiable);
            }
        }
        self.status
    }

    fn status(&self) -> PermissionStatus {
        self.status
    }

    fn reset(&mut self) {
        self.status = PermissionStatus::Idle;
        self.sample_seen = false;
    }
}

/// Listen-and-verify flow (implicit-consent platforms)
#[derive(Debug, Clone)]
pub struct ImplicitConsent {
    status: PermissionStatus,
    verify_ms: f64,
    deadline: f64,
    sample_seen: bool,
}

impl ImplicitConsent {
    pub fn new(verify_ms: f64) -> Self {
        Self {
            status: PermissionStatus::Idle,
            verify_ms,
            deadline: 0.0,
            sample_seen: false,
        }
    }
}

impl PermissionFlow for ImplicitConsent {
    fn request(&mut self, now: f64, _user_gesture: bool) -> bool {
        self.sample_seen = false;
        self.status = PermissionStatus::Verifying;
        self.deadline = now + self.verify_ms;
        false
    }

    fn consent(&mut self, _granted: bool, _now: f64) {}

    fn observe_sample(&mut self, _now: f64) {
        self.sample_seen = true;
    }

    fn poll(&mut self, now: f64) -> PermissionStatus {
        if self.status == PermissionStatus::Verifying {
            if self.sample_seen {
                self.status = PermissionStatus::Resolved(PermissionOutcome::Granted);
            } else if now >= self.deadline {
                self.status = PermissionStatus::Resolved(PermissionOutcome::Unverifiable);
            }
        }
        self.status
    }

    fn status(&self) -> PermissionStatus {
        self.status
    }

    fn reset(&mut self) {
        self.status = PermissionStatus::Idle;
        self.sample_seen = false;
    }
}
