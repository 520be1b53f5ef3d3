// SPDX-License-Identifier: MPL-2.0
//! Audio output using cpal, implementing the [`AudioDevice`] port.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
//! that owns it from creation until [`AudioDevice::close`].

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::application::port::{AudioDevice, AudioSource, OpenedAudio};
use crate::config::defaults::{AUDIO_MAX_CALLBACKS_PER_SEC, AUDIO_MIN_BUFFER_FRAMES};
use crate::domain::error::AudioDeviceError;
use crate::domain::media::AudioSpec;
use crate::playback::time::now_secs;

/// Channels the playback core produces at most; extra device channels stay silent.
const MAX_SOURCE_CHANNELS: u16 = 2;

struct Worker {
    stop_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Default system output device.
#[derive(Default)]
pub struct CpalAudioDevice {
    worker: Option<Worker>,
}

impl std::fmt::Debug for CpalAudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalAudioDevice")
            .field("open", &self.worker.is_some())
            .finish()
    }
}

impl CpalAudioDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Callback size in sample frames: the smallest power of two giving at most
/// [`AUDIO_MAX_CALLBACKS_PER_SEC`] callbacks, never below
/// [`AUDIO_MIN_BUFFER_FRAMES`].
fn preferred_buffer_frames(sample_rate: u32) -> u32 {
    let per_callback = (sample_rate / AUDIO_MAX_CALLBACKS_PER_SEC).max(1);
    AUDIO_MIN_BUFFER_FRAMES.max(2 << per_callback.ilog2())
}

fn buffer_size(supported: &cpal::SupportedBufferSize, wanted: u32) -> (cpal::BufferSize, u32) {
    match supported {
        cpal::SupportedBufferSize::Range { min, max } => {
            let frames = wanted.clamp(*min, *max);
            (cpal::BufferSize::Fixed(frames), frames)
        }
        cpal::SupportedBufferSize::Unknown => (cpal::BufferSize::Default, wanted),
    }
}

/// Copies interleaved `source` frames onto `device_channels`. Mono feeds the
/// first two outputs; channels beyond the source get silence.
fn spread_channels<T: cpal::SizedSample + cpal::FromSample<f32>>(
    source: &[f32],
    source_channels: usize,
    out: &mut [T],
    device_channels: usize,
) {
    for (out_frame, in_frame) in out
        .chunks_mut(device_channels)
        .zip(source.chunks(source_channels))
    {
        for (channel, sample) in out_frame.iter_mut().enumerate() {
            let value = match in_frame.get(channel) {
                Some(value) => *value,
                None if source_channels == 1 && channel < 2 => in_frame[0],
                None => 0.0,
            };
            // Clamping below 1.0 avoids integer overflow in from_sample.
            *sample = T::from_sample(value.clamp(-1.0, 0.999_999_9));
        }
    }
}

fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    source_channels: u16,
    source: Arc<dyn AudioSource>,
) -> Result<cpal::Stream, AudioDeviceError> {
    let device_channels = usize::from(config.channels.max(1));
    let source_channels = usize::from(source_channels.max(1));
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let callback_time = now_secs();
                let frames = data.len() / device_channels;
                scratch.resize(frames * source_channels, 0.0);
                source.refill_output_buffer(&mut scratch, callback_time);
                spread_channels(&scratch, source_channels, data, device_channels);
            },
            |err| {
                tracing::error!("Audio output error: {err}");
            },
            None,
        )
        .map_err(|e| AudioDeviceError::Stream(format!("Failed to build audio stream: {e}")))
}

/// Opens the default device and starts pulling from `source`.
fn start_stream(source: Arc<dyn AudioSource>) -> Result<(cpal::Stream, OpenedAudio), AudioDeviceError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioDeviceError::NoDevice)?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioDeviceError::UnsupportedConfig(format!("Failed to get audio config: {e}")))?;

    let sample_rate = supported.sample_rate();
    let spec = AudioSpec {
        sample_rate,
        channels: supported.channels().min(MAX_SOURCE_CHANNELS),
    };
    let (buffer, frames) = buffer_size(supported.buffer_size(), preferred_buffer_frames(sample_rate));
    let mut config: cpal::StreamConfig = supported.config();
    config.buffer_size = buffer;

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, spec.channels, source)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, spec.channels, source)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, spec.channels, source)?,
        other => {
            return Err(AudioDeviceError::UnsupportedConfig(format!(
                "Unsupported audio sample format {other:?}"
            )))
        }
    };
    stream
        .play()
        .map_err(|e| AudioDeviceError::Stream(format!("Failed to start audio stream: {e}")))?;

    let opened = OpenedAudio {
        spec,
        hw_buffer_bytes: frames as usize * spec.frame_bytes(),
    };
    Ok((stream, opened))
}

impl AudioDevice for CpalAudioDevice {
    fn open(
        &mut self,
        wanted: AudioSpec,
        source: Arc<dyn AudioSource>,
    ) -> Result<OpenedAudio, AudioDeviceError> {
        self.close();

        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("avpace/audio-out".into())
            .spawn(move || match start_stream(source) {
                Ok((stream, opened)) => {
                    let _ = ready_tx.send(Ok(opened));
                    // Blocks until close() signals or drops the sender.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| AudioDeviceError::Stream(format!("Failed to spawn audio thread: {e}")))?;

        let opened = ready_rx
            .recv()
            .map_err(|_| AudioDeviceError::Stream("audio thread exited early".into()))
            .and_then(|result| result);
        match opened {
            Ok(opened) => {
                tracing::info!(
                    wanted_rate = wanted.sample_rate,
                    wanted_channels = wanted.channels,
                    rate = opened.spec.sample_rate,
                    channels = opened.spec.channels,
                    hw_buffer_bytes = opened.hw_buffer_bytes,
                    "audio device opened"
                );
                self.worker = Some(Worker { stop_tx, handle });
                Ok(opened)
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                tracing::warn!("audio output thread panicked");
            }
            tracing::debug!("audio device closed");
        }
    }
}

impl Drop for CpalAudioDevice {
    fn drop(&mut self) {
        self.close();
    }
}
