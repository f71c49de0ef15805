//! Workspace umbrella crate.
//!
//! Host applications can depend on `subsonic-offline-workspace` and enable the
//! `desktop-shims` feature instead of wiring each workspace crate by hand.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
