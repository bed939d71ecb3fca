//! Workspace facade crate.
//!
//! Host applications depend on `healing-player` to get the playback
//! controller, the native bridge contracts and the runtime helpers (logging,
//! configuration, event bus) without wiring each workspace crate individually.

pub use bridge_traits;
pub use core_playback;
pub use core_runtime;

pub use bridge_traits::{NativePlayer, RemoteCommand, RepeatMode};
pub use core_playback::{
    PlaybackController, PlaybackError, PlaybackFailure, PlaybackState, PlaybackStatus,
    PlayerCommand, Track,
};
pub use core_runtime::config::{CoreConfig, PlaybackSettings};
pub use core_runtime::events::{CoreEvent, EventStream};
