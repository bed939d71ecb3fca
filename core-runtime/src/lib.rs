//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus for discrete playback events
//!
//! ## Overview
//!
//! Other crates depend on this one for their logging conventions, their
//! configuration types and the broadcast channel UI observers subscribe to.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
