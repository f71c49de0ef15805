//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the offline caching core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! Every other core crate depends on this one for its configuration types,
//! its logging conventions and the typed event channel used to broadcast
//! download and connectivity changes.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
