// SPDX-License-Identifier: MPL-2.0
//! Domain error types.
//!
//! These errors are produced by the collaborator ports (input, decoder,
//! filter, audio device). They are independent of any codec library so the
//! synchronizer core can match on them without knowing the backend.

use std::fmt;

/// Errors raised by the demultiplexed input.
///
/// End of file is not an error; it is reported through
/// [`ReadOutcome::EndOfFile`](crate::application::port::ReadOutcome).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// The input could not be opened.
    Open(String),
    /// A read failed at the I/O layer.
    Io(String),
    /// The requested seek could not be performed.
    Seek(String),
    /// The session abort flag interrupted a blocking call.
    Interrupted,
    /// Any other backend failure.
    Other(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::Open(msg) => write!(f, "Failed to open input: {msg}"),
            InputError::Io(msg) => write!(f, "Input I/O error: {msg}"),
            InputError::Seek(msg) => write!(f, "Seek failed: {msg}"),
            InputError::Interrupted => write!(f, "Input interrupted"),
            InputError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for InputError {}

/// Errors raised by a decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    /// The stream codec has no available decoder.
    UnsupportedCodec(String),
    /// The decoder could not be opened.
    Open(String),
    /// Decoding failed hard; the component cannot continue.
    DecodingFailed(String),
}

impl fmt::Display for DecoderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecoderError::UnsupportedCodec(codec) => write!(f, "Unsupported codec: {codec}"),
            DecoderError::Open(msg) => write!(f, "Failed to open decoder: {msg}"),
            DecoderError::DecodingFailed(msg) => write!(f, "Decoding failed: {msg}"),
        }
    }
}

impl std::error::Error for DecoderError {}

/// Errors raised by the filter/convert stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Building the pipeline for a new source format failed.
    Configure(String),
    /// Pushing or pulling a frame failed.
    Process(String),
    /// The filter has no pipeline yet.
    NotConfigured,
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Configure(msg) => write!(f, "Filter configuration failed: {msg}"),
            FilterError::Process(msg) => write!(f, "Filter processing failed: {msg}"),
            FilterError::NotConfigured => write!(f, "Filter used before configuration"),
        }
    }
}

impl std::error::Error for FilterError {}

/// Errors raised by the audio output device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioDeviceError {
    /// No output device is available.
    NoDevice,
    /// The device rejected every candidate configuration.
    UnsupportedConfig(String),
    /// Starting or controlling the stream failed.
    Stream(String),
}

impl fmt::Display for AudioDeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioDeviceError::NoDevice => write!(f, "No audio output device found"),
            AudioDeviceError::UnsupportedConfig(msg) => {
                write!(f, "Unsupported audio configuration: {msg}")
            }
            AudioDeviceError::Stream(msg) => write!(f, "Audio stream error: {msg}"),
        }
    }
}

impl std::error::Error for AudioDeviceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_error_display() {
        assert_eq!(
            InputError::Io("broken pipe".into()).to_string(),
            "Input I/O error: broken pipe"
        );
        assert_eq!(InputError::Interrupted.to_string(), "Input interrupted");
    }

    #[test]
    fn decoder_error_display_contains_codec() {
        let err = DecoderError::UnsupportedCodec("vp9".into());
        assert!(err.to_string().contains("vp9"));
    }

    #[test]
    fn filter_and_device_errors_display() {
        assert!(FilterError::Configure("bad".into())
            .to_string()
            .starts_with("Filter configuration failed"));
        assert_eq!(
            AudioDeviceError::NoDevice.to_string(),
            "No audio output device found"
        );
    }
}
