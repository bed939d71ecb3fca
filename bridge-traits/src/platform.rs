//! Marker traits keeping bridge bounds in one place.
//!
//! Native hosts share bridge implementations across Tokio worker threads, so
//! every bridge must be `Send + Sync`. Spelling the bound through a marker
//! trait lets a future single-threaded target relax it without touching each
//! trait definition.

/// Marker trait that applies `Send + Sync`.
pub trait PlatformSendSync: Send + Sync {}

impl<T> PlatformSendSync for T where T: Send + Sync {}

/// Marker trait equivalent to `Send`.
pub trait PlatformSend: Send {}

impl<T> PlatformSend for T where T: Send {}
