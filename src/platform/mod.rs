//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Sensor permission flows (explicit prompt vs. implicit access)
//! - Browser event wiring and the animation-frame loop (wasm32 only)

pub mod permission;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use permission::{
    ConsentModel, ExplicitConsent, ImplicitConsent, PermissionFlow, PermissionOutcome,
    PermissionStatus,
};
