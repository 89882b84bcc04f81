use std::path::PathBuf;

use nearoffers_client::ClientError;
use thiserror::Error;

/// Failure of a position read, mirroring the platform geolocation error
/// codes plus the "capability absent" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum PositionError {
    #[error("geolocation is not supported on this platform")]
    Unsupported,
    #[error("location access denied by the user")]
    PermissionDenied,
    #[error("location information is unavailable")]
    PositionUnavailable,
    #[error("timed out obtaining the location")]
    Timeout,
}

impl PositionError {
    /// Maps a platform failure code (`1` denied, `2` unavailable,
    /// `3` timeout). Unknown codes are reported as unavailable.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => PositionError::PermissionDenied,
            3 => PositionError::Timeout,
            _ => PositionError::PositionUnavailable,
        }
    }

    /// Platform code for this error; `None` for [`PositionError::Unsupported`],
    /// which has no platform counterpart.
    #[must_use]
    pub fn code(self) -> Option<u16> {
        match self {
            PositionError::Unsupported => None,
            PositionError::PermissionDenied => Some(1),
            PositionError::PositionUnavailable => Some(2),
            PositionError::Timeout => Some(3),
        }
    }

    /// Short status-bar text shown to the user.
    #[must_use]
    pub fn status_message(self) -> &'static str {
        match self {
            PositionError::Unsupported => "Geolocation not supported",
            PositionError::PermissionDenied => "Location access denied",
            PositionError::PositionUnavailable => "Location unavailable",
            PositionError::Timeout => "Timed out getting location",
        }
    }
}

/// Errors raised inside the tracker. None of them is fatal: callers log and
/// degrade to "no data".
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The offers or businesses query failed.
    #[error("network error: {0}")]
    Network(#[from] ClientError),

    /// A persisted value exists but does not parse.
    #[error("stored value under '{key}' is corrupt: {source}")]
    StorageCorrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage I/O error at {path}: {source}")]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A registered listener returned an error or panicked.
    #[error("{kind} listener #{index} failed: {reason}")]
    ListenerFailure {
        kind: &'static str,
        index: usize,
        reason: String,
    },
}
