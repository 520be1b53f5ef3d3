// SPDX-License-Identifier: MPL-2.0
//! Presentation drivers.
//!
//! A driver calls [`VideoPacer::tick`] in a loop, sleeping for the time the
//! pacer reports until the next picture is due, capped at the refresh rate so
//! pause toggles and forced redraws are picked up promptly.

use std::thread::{self, JoinHandle};

use crate::config::REFRESH_RATE;
use crate::error::{Error, Result};
use crate::playback::pacing::VideoPacer;
use crate::playback::time::secs_to_duration;

/// Runs one tick and returns how long to sleep before the next one.
#[must_use]
pub fn refresh_once(pacer: &VideoPacer) -> f64 {
    let mut remaining = REFRESH_RATE;
    pacer.tick(&mut remaining);
    remaining.clamp(0.0, REFRESH_RATE)
}

/// Drives the pacer on the tokio runtime until the session is aborted.
pub async fn drive(pacer: VideoPacer) {
    while !pacer.is_aborted() {
        let remaining = refresh_once(&pacer);
        if remaining > 0.0 {
            tokio::time::sleep(secs_to_duration(remaining)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
    tracing::debug!("presentation driver stopped");
}

/// Drives the pacer on a dedicated thread for hosts without an async runtime.
///
/// # Errors
///
/// Returns [`Error::Spawn`] if the thread cannot be started.
pub fn spawn_refresh_thread(pacer: VideoPacer) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("avpace/refresh".to_string())
        .spawn(move || {
            while !pacer.is_aborted() {
                let remaining = refresh_once(&pacer);
                if remaining > 0.0 {
                    thread::sleep(secs_to_duration(remaining));
                }
            }
            tracing::debug!("refresh thread stopped");
        })
        .map_err(|err| Error::Spawn(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::options::PlaybackOptions;
    use crate::playback::session::tests::session;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn idle_pacer_sleeps_one_refresh_period() {
        let pacer = VideoPacer::new(Arc::new(session(PlaybackOptions::default())));
        let remaining = refresh_once(&pacer);
        assert!((remaining - REFRESH_RATE).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn driver_stops_on_abort() {
        let session = Arc::new(session(PlaybackOptions::default()));
        let pacer = VideoPacer::new(Arc::clone(&session));
        let driver = tokio::spawn(drive(pacer));
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        session.abort.store(true, Ordering::Release);
        let stopped = tokio::time::timeout(std::time::Duration::from_secs(1), driver).await;
        assert!(matches!(stopped, Ok(Ok(()))));
    }

    #[test]
    fn refresh_thread_joins_after_abort() {
        let session = Arc::new(session(PlaybackOptions::default()));
        let handle = spawn_refresh_thread(VideoPacer::new(Arc::clone(&session))).expect("spawn");
        session.abort.store(true, Ordering::Release);
        assert!(handle.join().is_ok());
    }
}
