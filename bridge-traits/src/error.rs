use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failure reported by a host bridge, most importantly the native media
/// backend. Platform exceptions are converted into one of these variants at
/// the bridge boundary so the core never sees opaque platform errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Operation not supported by native backend: {0}")]
    Unsupported(String),

    #[error("Native backend network error: {0}")]
    Network(String),

    #[error("Audio device busy: {0}")]
    DeviceBusy(String),

    #[error("Native backend failure: {0}")]
    Unknown(String),
}

impl BridgeError {
    /// Classify the error into the native reason taxonomy.
    pub fn reason(&self) -> NativeErrorReason {
        match self {
            BridgeError::Unsupported(_) => NativeErrorReason::Unsupported,
            BridgeError::Network(_) => NativeErrorReason::NetworkError,
            BridgeError::DeviceBusy(_) => NativeErrorReason::DeviceBusy,
            BridgeError::Unknown(_) => NativeErrorReason::Unknown,
        }
    }

    /// Human-readable detail without the reason prefix.
    pub fn detail(&self) -> &str {
        match self {
            BridgeError::Unsupported(msg)
            | BridgeError::Network(msg)
            | BridgeError::DeviceBusy(msg)
            | BridgeError::Unknown(msg) => msg,
        }
    }

    /// Returns `true` when retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::DeviceBusy(_))
    }
}

/// Reason code carried by every native backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NativeErrorReason {
    Unsupported,
    NetworkError,
    DeviceBusy,
    Unknown,
}

impl fmt::Display for NativeErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            NativeErrorReason::Unsupported => "unsupported",
            NativeErrorReason::NetworkError => "networkError",
            NativeErrorReason::DeviceBusy => "deviceBusy",
            NativeErrorReason::Unknown => "unknown",
        };
        f.write_str(code)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
