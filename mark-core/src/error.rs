//! Error taxonomy for board operations.

use std::io;

use firmata_proto::{EncodeError, PinMode, RangeError};
use thiserror::Error;

use crate::pin::PinId;

/// Errors raised synchronously by board and pin operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Value outside the range the protocol can represent.
    #[error(transparent)]
    Range(#[from] RangeError),

    /// Illegal mode transition.
    #[error("{pin} cannot be set to {mode:?}: {reason}")]
    Mode {
        pin: PinId,
        mode: PinMode,
        reason: &'static str,
    },

    /// Operation not allowed in the pin's current mode.
    #[error("{pin} is in {mode:?} mode: {reason}")]
    State {
        pin: PinId,
        mode: PinMode,
        reason: &'static str,
    },

    /// Pin, port or slot index out of range, or reserved.
    #[error("invalid pin: {0}")]
    Pin(String),

    /// The transport could not be opened.
    #[error("failed to connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    /// I/O failure on an open transport.
    #[error("transport error")]
    Transport(#[from] io::Error),

    /// The board has been disconnected.
    #[error("board is disconnected")]
    Closed,

    /// A poller is already running for this board.
    #[error("poller already running")]
    PollerRunning,
}

impl From<EncodeError> for Error {
    fn from(err: EncodeError) -> Self {
        match err {
            EncodeError::Range(err) => Error::Range(err),
            EncodeError::Channel(ch) => Error::Pin(format!("index {ch} does not fit a channel")),
            EncodeError::Mode(mode) => Error::Pin(format!("mode {mode:?} cannot be sent")),
        }
    }
}

/// Result alias for board operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_error_mapping() {
        let err: Error = EncodeError::Channel(16).into();
        assert!(matches!(err, Error::Pin(_)));

        let err: Error = EncodeError::Range(RangeError {
            value: 40_000,
            max: 32_767,
        })
        .into();
        assert!(matches!(err, Error::Range(_)));
    }

    #[test]
    fn test_range_is_transparent() {
        let err = Error::from(RangeError {
            value: 300,
            max: 255,
        });
        assert_eq!(err.to_string(), "value 300 exceeds maximum 255");
        assert!(std::error::Error::source(&err).is_none());

        let boxed: Box<dyn std::error::Error> = Box::new(EncodeError::Range(RangeError {
            value: 40_000,
            max: 32_767,
        }));
        assert!(boxed.source().is_some());
    }

    #[test]
    fn test_display() {
        let err = Error::Mode {
            pin: PinId::Analog(2),
            mode: PinMode::Servo,
            reason: "only digital pins drive servos",
        };
        assert_eq!(
            err.to_string(),
            "analog pin 2 cannot be set to Servo: only digital pins drive servos"
        );
    }
}
