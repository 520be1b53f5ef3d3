// SPDX-License-Identifier: MPL-2.0
//! `FFmpeg` adapters for the input, decoder and filter ports.
//!
//! - [`FfmpegInput`] demultiplexes a file or URL and opens decoders
//! - [`FfmpegDecoder`] wraps the send/receive codec API
//! - [`FfmpegFilterFactory`] builds swscale and swresample converters
//!
//! `FFmpeg` contexts hold raw pointers and are not `Send`. Every adapter owns
//! its contexts exclusively and is only ever used by one thread at a time.

pub mod decoder;
pub mod filter;
pub mod input;

use std::sync::Once;

use crate::domain::error::InputError;
use crate::domain::media::{PixelFormat, Rational};

pub use decoder::FfmpegDecoder;
pub use filter::FfmpegFilterFactory;
pub use input::FfmpegInput;

static FFMPEG_INIT: Once = Once::new();

/// Initialize `FFmpeg` once and silence its warning chatter.
///
/// # Errors
///
/// Returns [`InputError::Other`] if the library fails to initialize.
pub fn init_ffmpeg() -> Result<(), InputError> {
    let mut init_result = Ok(());

    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg_next::init() {
            init_result = Err(InputError::Other(format!("FFmpeg initialization failed: {e}")));
            return;
        }

        // SAFETY: av_log_set_level is thread-safe and only affects logging
        unsafe {
            ffmpeg_next::ffi::av_log_set_level(ffmpeg_next::ffi::AV_LOG_ERROR);
        }
    });

    init_result
}

pub(crate) fn from_ffmpeg_rational(rational: ffmpeg_next::Rational) -> Rational {
    Rational::new(rational.numerator(), rational.denominator())
}

pub(crate) fn to_pixel(format: PixelFormat) -> ffmpeg_next::format::Pixel {
    use ffmpeg_next::format::Pixel;
    match format {
        PixelFormat::Rgba => Pixel::RGBA,
        PixelFormat::Bgra => Pixel::BGRA,
        PixelFormat::Rgb24 => Pixel::RGB24,
        PixelFormat::Yuv420p => Pixel::YUV420P,
        PixelFormat::Nv12 => Pixel::NV12,
    }
}

pub(crate) fn from_pixel(format: ffmpeg_next::format::Pixel) -> Option<PixelFormat> {
    use ffmpeg_next::format::Pixel;
    match format {
        Pixel::RGBA => Some(PixelFormat::Rgba),
        Pixel::BGRA => Some(PixelFormat::Bgra),
        Pixel::RGB24 => Some(PixelFormat::Rgb24),
        Pixel::YUV420P => Some(PixelFormat::Yuv420p),
        Pixel::NV12 => Some(PixelFormat::Nv12),
        _ => None,
    }
}

/// Converts FFmpeg's "no value" timestamp sentinel to `None`.
pub(crate) fn timestamp(value: i64) -> Option<i64> {
    (value != ffmpeg_next::ffi::AV_NOPTS_VALUE).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        assert!(init_ffmpeg().is_ok());
        assert!(init_ffmpeg().is_ok());
    }

    #[test]
    fn pixel_formats_map_both_ways() {
        for format in [
            PixelFormat::Rgba,
            PixelFormat::Bgra,
            PixelFormat::Rgb24,
            PixelFormat::Yuv420p,
            PixelFormat::Nv12,
        ] {
            assert_eq!(from_pixel(to_pixel(format)), Some(format));
        }
        assert_eq!(from_pixel(ffmpeg_next::format::Pixel::GRAY8), None);
    }

    #[test]
    fn nopts_is_none() {
        assert_eq!(timestamp(ffmpeg_next::ffi::AV_NOPTS_VALUE), None);
        assert_eq!(timestamp(42), Some(42));
    }
}
