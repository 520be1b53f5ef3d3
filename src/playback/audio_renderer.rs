// SPDX-License-Identifier: MPL-2.0
//! Audio sample delivery to the output device.
//!
//! [`AudioRenderer`] is the [`AudioSource`] handed to the audio device. Each
//! device callback drains chunks from the audio frame queue, corrects them
//! toward the master clock when audio is not the master, applies volume, and
//! finally re-anchors the audio clock to what the hardware is about to play.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::application::port::{AudioSource, OpenedAudio};
use crate::config::{AUDIO_DIFF_AVG_NB, NOSYNC_THRESHOLD, SAMPLE_CORRECTION_PERCENT_MAX};
use crate::domain::media::{GroupIndex, MediaKind};
use crate::domain::video::SyncMode;
use crate::playback::session::Session;

/// Length of the silence chunk emitted when no samples are ready.
const SILENCE_CHUNK_BYTES: usize = 512;

/// Averages audio/master drift and turns it into a sample-count correction.
#[derive(Debug, Clone)]
pub struct DriftCorrector {
    cumulative: f64,
    avg_coef: f64,
    threshold: f64,
    count: u32,
}

impl DriftCorrector {
    /// Creates a corrector that acts once the averaged drift exceeds
    /// `threshold` seconds.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            cumulative: 0.0,
            avg_coef: (0.01_f64.ln() / f64::from(AUDIO_DIFF_AVG_NB)).exp(),
            threshold,
            count: 0,
        }
    }

    pub fn reset(&mut self) {
        self.cumulative = 0.0;
        self.count = 0;
    }

    /// Returns how many sample frames a chunk of `samples` should be
    /// stretched or shrunk to, given the current drift `diff` in seconds.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn wanted_samples(&mut self, samples: usize, diff: f64, sample_rate: u32) -> usize {
        if diff.is_nan() || diff.abs() >= NOSYNC_THRESHOLD {
            // Too far apart: probably initial PTS garbage.
            self.reset();
            return samples;
        }
        self.cumulative = diff + self.avg_coef * self.cumulative;
        if self.count < AUDIO_DIFF_AVG_NB {
            self.count += 1;
            return samples;
        }
        let avg_diff = self.cumulative * (1.0 - self.avg_coef);
        if avg_diff.abs() < self.threshold {
            return samples;
        }
        let wanted = samples as i64 + (diff * f64::from(sample_rate)) as i64;
        let min = (samples * (100 - SAMPLE_CORRECTION_PERCENT_MAX) / 100) as i64;
        let max = (samples * (100 + SAMPLE_CORRECTION_PERCENT_MAX) / 100) as i64;
        tracing::trace!(diff, avg_diff, wanted, "audio drift correction");
        wanted.clamp(min, max) as usize
    }
}

#[derive(Debug)]
struct RendererState {
    opened: Option<OpenedAudio>,
    /// Current chunk, already corrected. Empty while emitting silence.
    chunk: Vec<f32>,
    silent: bool,
    chunk_len: usize,
    index: usize,
    /// Time at the end of the current chunk.
    audio_clock: f64,
    audio_clock_group: GroupIndex,
    drift: DriftCorrector,
}

/// Pull-side audio renderer; one per opened audio component.
#[derive(Debug)]
pub struct AudioRenderer {
    session: Arc<Session>,
    state: Mutex<RendererState>,
}

impl AudioRenderer {
    #[must_use]
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            state: Mutex::new(RendererState {
                opened: None,
                chunk: Vec::new(),
                silent: true,
                chunk_len: 0,
                index: 0,
                audio_clock: f64::NAN,
                audio_clock_group: -1,
                drift: DriftCorrector::new(0.0),
            }),
        }
    }

    /// Records what the device opened. Until then callbacks emit silence.
    #[allow(clippy::cast_precision_loss)]
    pub fn configure(&self, opened: OpenedAudio) {
        let mut state = self.state.lock();
        let bytes_per_sec = opened.spec.bytes_per_sec().max(1);
        state.drift = DriftCorrector::new(opened.hw_buffer_bytes as f64 / bytes_per_sec as f64);
        state.opened = Some(opened);
        state.chunk_len = 0;
        state.index = 0;
    }

    /// Loads the next live chunk from the frame queue. Returns false when
    /// none is available, leaving a silence chunk.
    fn next_chunk(&self, state: &mut RendererState, opened: OpenedAudio) -> bool {
        let queues = self.session.queues(MediaKind::Audio);
        if self.session.is_paused() {
            return false;
        }
        loop {
            let Some(frame) = queues.frames.peek_showable() else {
                return false;
            };
            let live = frame.group_index == queues.packets.group_index();
            if live {
                let Some(audio) = frame.data.as_audio() else {
                    drop(frame);
                    queues.frames.dequeue();
                    continue;
                };
                state.chunk.clear();
                state.chunk.extend_from_slice(&audio.samples);
                let samples = audio.frame_count();
                let time = frame.time;
                state.audio_clock_group = frame.group_index;
                drop(frame);
                queues.frames.dequeue();

                let wanted = self.wanted_samples(state, samples, opened);
                resize_chunk(&mut state.chunk, samples, wanted, usize::from(opened.spec.channels));
                #[allow(clippy::cast_precision_loss)]
                let chunk_secs = samples as f64 / f64::from(opened.spec.sample_rate.max(1));
                state.audio_clock = if time.is_nan() { f64::NAN } else { time + chunk_secs };
                return true;
            }
            drop(frame);
            queues.frames.dequeue();
        }
    }

    fn wanted_samples(&self, state: &mut RendererState, samples: usize, opened: OpenedAudio) -> usize {
        if self.session.master_sync() == SyncMode::Audio {
            return samples;
        }
        let diff = self.session.clocks.audio.value() - self.session.master_clock().value();
        state
            .drift
            .wanted_samples(samples, diff, opened.spec.sample_rate)
    }
}

/// Shrinks `chunk` to `wanted` sample frames, or pads it by repeating the
/// last frame.
fn resize_chunk(chunk: &mut Vec<f32>, samples: usize, wanted: usize, channels: usize) {
    let channels = channels.max(1);
    if wanted < samples {
        chunk.truncate(wanted * channels);
    } else if wanted > samples && chunk.len() >= channels {
        let last: Vec<f32> = chunk[chunk.len() - channels..].to_vec();
        for _ in samples..wanted {
            chunk.extend_from_slice(&last);
        }
    }
}

impl AudioSource for AudioRenderer {
    #[allow(clippy::cast_precision_loss)]
    fn refill_output_buffer(&self, out: &mut [f32], callback_time: f64) {
        let mut state = self.state.lock();
        let Some(opened) = state.opened else {
            out.fill(0.0);
            return;
        };
        let channels = usize::from(opened.spec.channels.max(1));
        let muted = self.session.is_muted();
        let gain = self.session.volume().gain();

        let mut written = 0;
        while written < out.len() {
            if state.index >= state.chunk_len {
                if self.next_chunk(&mut state, opened) {
                    state.silent = false;
                    state.chunk_len = state.chunk.len();
                } else {
                    state.silent = true;
                    let frames = (SILENCE_CHUNK_BYTES / opened.spec.frame_bytes().max(1)).max(1);
                    state.chunk_len = frames * channels;
                }
                state.index = 0;
                if state.chunk_len == 0 {
                    continue;
                }
            }
            let len = (state.chunk_len - state.index).min(out.len() - written);
            let target = &mut out[written..written + len];
            if state.silent || muted {
                target.fill(0.0);
            } else {
                let source = &state.chunk[state.index..state.index + len];
                for (dst, src) in target.iter_mut().zip(source) {
                    *dst = src * gain;
                }
            }
            written += len;
            state.index += len;
        }

        if !state.audio_clock.is_nan() {
            let pending_bytes = (state.chunk_len - state.index) * std::mem::size_of::<f32>();
            let bytes_per_sec = opened.spec.bytes_per_sec().max(1) as f64;
            let latency = (2 * opened.hw_buffer_bytes + pending_bytes) as f64 / bytes_per_sec;
            let clocks = &self.session.clocks;
            clocks
                .audio
                .set_at(state.audio_clock - latency, state.audio_clock_group, callback_time);
            clocks.external.sync_to_slave(&clocks.audio);
        }
    }
}
