//! # Playback Error Types
//!
//! Errors surfaced by the playback controller and its native adapter.

use bridge_traits::{BridgeError, NativeErrorReason};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// The native player could not open the track (URL unreachable or invalid).
    #[error("Failed to load track {track_id}: {source}")]
    LoadFailed {
        track_id: String,
        #[source]
        source: BridgeError,
    },

    /// A native command or native playback failed.
    #[error("Native backend error: {0}")]
    NativeBackend(#[from] BridgeError),

    /// Command issued in a state where it has no meaning (seek without a
    /// track, ...). Logged and ignored by the controller.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The controller task has shut down.
    #[error("Playback controller is closed")]
    ControllerClosed,

    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::LoadFailed { source, .. } | PlaybackError::NativeBackend(source) => {
                source.is_transient()
            }
            _ => false,
        }
    }

    /// Returns `true` if this error is due to network issues.
    pub fn is_network_error(&self) -> bool {
        self.native_reason() == Some(NativeErrorReason::NetworkError)
    }

    /// Native reason code, when the error came from the native backend.
    pub fn native_reason(&self) -> Option<NativeErrorReason> {
        match self {
            PlaybackError::LoadFailed { source, .. } | PlaybackError::NativeBackend(source) => {
                Some(source.reason())
            }
            _ => None,
        }
    }

    /// Stable machine-readable code used in events and state.
    pub fn code(&self) -> &'static str {
        match self {
            PlaybackError::LoadFailed { .. } => "loadFailed",
            PlaybackError::NativeBackend(_) => "nativeBackendError",
            PlaybackError::InvalidCommand(_) => "invalidCommand",
            PlaybackError::ControllerClosed => "controllerClosed",
            PlaybackError::Config(_) => "config",
            PlaybackError::Internal(_) => "internal",
        }
    }
}

impl From<core_runtime::Error> for PlaybackError {
    fn from(err: core_runtime::Error) -> Self {
        match err {
            core_runtime::Error::Internal(msg) | core_runtime::Error::Logging(msg) => {
                PlaybackError::Internal(msg)
            }
            other => PlaybackError::Config(other.to_string()),
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Snapshot of the last failure, kept in `PlaybackState` while
/// `status == Error` so the UI can explain it and offer a retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackFailure {
    /// `loadFailed` or `nativeBackendError`
    pub kind: String,
    pub reason: NativeErrorReason,
    pub message: String,
    pub recoverable: bool,
}

impl From<&PlaybackError> for PlaybackFailure {
    fn from(err: &PlaybackError) -> Self {
        Self {
            kind: err.code().to_string(),
            reason: err.native_reason().unwrap_or(NativeErrorReason::Unknown),
            message: err.to_string(),
            recoverable: err.is_transient(),
        }
    }
}
