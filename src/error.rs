// SPDX-License-Identifier: MPL-2.0
use thiserror::Error as ThisError;

use crate::domain::error::{AudioDeviceError, DecoderError, FilterError, InputError};
use crate::domain::media::MediaKind;

/// Crate-level error.
///
/// Transient and epoch-stale conditions never reach this type; anything that
/// does is fatal for the thread that produced it.
#[derive(Debug, Clone, ThisError)]
pub enum Error {
    #[error("I/O Error: {0}")]
    Io(String),

    #[error("Config Error: {0}")]
    Config(String),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Decoder(#[from] DecoderError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    AudioDevice(#[from] AudioDeviceError),

    /// A stream of the requested kind does not exist or cannot be opened.
    #[error("No usable {} stream", .0.label())]
    NoStream(MediaKind),

    /// A worker thread could not be spawned.
    #[error("Failed to spawn thread: {0}")]
    Spawn(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_formats_io_error() {
        let err = Error::Io("disk failure".to_string());
        assert_eq!(format!("{err}"), "I/O Error: disk failure");
    }

    #[test]
    fn from_io_error_produces_io_variant() {
        let io_error = std::io::Error::other("boom");
        let err: Error = io_error.into();
        match err {
            Error::Io(message) => assert!(message.contains("boom")),
            _ => panic!("expected Io variant"),
        }
    }

    #[test]
    fn domain_errors_are_transparent() {
        let err: Error = DecoderError::DecodingFailed("bad bitstream".into()).into();
        assert_eq!(err.to_string(), "Decoding failed: bad bitstream");
        let err: Error = InputError::Interrupted.into();
        assert!(matches!(err, Error::Input(InputError::Interrupted)));
    }

    #[test]
    fn no_stream_names_the_kind() {
        assert_eq!(
            Error::NoStream(MediaKind::Video).to_string(),
            "No usable video stream"
        );
    }
}
