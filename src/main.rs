// SPDX-License-Identifier: MPL-2.0
//! Headless player: opens an input, plays its audio, paces its pictures and
//! logs what would be shown.

use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use avpace::application::port::Presenter;
use avpace::config::{self, SeekByBytes};
use avpace::domain::media::{MediaKind, Rational};
use avpace::domain::video::{FrameDropPolicy, SeekStep, SyncMode, Volume};
use avpace::infrastructure::{CpalAudioDevice, FfmpegFilterFactory, FfmpegInput};
use avpace::playback::{presentation, Container, Frame, PlaybackOptions, PlayerEvent};
use avpace::{Error, Result};

const HELP: &str = "\
avpace: play a media file with audio/video sync

USAGE:
  avpace [OPTIONS] INPUT

OPTIONS:
  --config PATH      Read settings from PATH instead of the user config
  --sync MODE        Master clock: audio, video or ext
  --ss SECS          Start position
  -t SECS            Play duration
  --loop N           Number of plays, 0 loops forever
  --autoexit         Exit once playback finishes
  --framedrop        Always allow dropping late pictures
  --noframedrop      Never drop pictures
  --infbuf           Do not limit the read-ahead buffer
  --bytes MODE       Seek by bytes: auto, on or off
  --seek-step SECS   Interval for relative seeks
  --volume V         Initial volume, 0.0 to 1.5
  -an | -vn | -sn    Disable audio, video or subtitles
  -h, --help         Print this help

CONTROLS (type a key, then Enter):
  p        Pause or resume
  s        Step to the next frame
  f, b     Seek forward or backward by the seek step
  9, 0     Decrease or increase volume
  m        Mute or unmute
  a, v, t  Cycle audio, video or subtitle stream
  q        Quit
";

/// Playback control read from standard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    TogglePause,
    Step,
    SeekForward,
    SeekBackward,
    VolumeDown,
    VolumeUp,
    ToggleMute,
    Cycle(MediaKind),
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let command = match line.trim() {
            "p" => Self::TogglePause,
            "s" => Self::Step,
            "f" => Self::SeekForward,
            "b" => Self::SeekBackward,
            "9" | "/" => Self::VolumeDown,
            "0" | "*" => Self::VolumeUp,
            "m" => Self::ToggleMute,
            "a" => Self::Cycle(MediaKind::Audio),
            "v" => Self::Cycle(MediaKind::Video),
            "t" => Self::Cycle(MediaKind::Subtitle),
            "q" => Self::Quit,
            _ => return None,
        };
        Some(command)
    }

    /// Applies the command. Returns false for [`Command::Quit`].
    fn apply(self, container: &Container) -> bool {
        match self {
            Self::TogglePause => container.toggle_pause(),
            Self::Step => container.step_to_next_frame(),
            Self::SeekForward => container.seek_forward(),
            Self::SeekBackward => container.seek_backward(),
            Self::VolumeDown => container.set_volume(container.volume().decrease()),
            Self::VolumeUp => container.set_volume(container.volume().increase()),
            Self::ToggleMute => container.toggle_mute(),
            Self::Cycle(kind) => container.cycle_stream(kind),
            Self::Quit => return false,
        }
        true
    }
}

/// Forwards stdin lines from a plain thread; the thread ends with stdin.
fn spawn_command_reader() -> tokio::sync::mpsc::UnboundedReceiver<String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let spawned = std::thread::Builder::new()
        .name("avpace/stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!("keyboard controls unavailable: {e}");
    }
    rx
}

/// Stand-in renderer that logs picture activity.
#[derive(Debug, Default)]
struct LoggingPresenter {
    rendered: AtomicU64,
}

impl Presenter for LoggingPresenter {
    fn on_picture_size_changed(&self, width: u32, height: u32, sample_aspect_ratio: Rational) {
        tracing::info!(
            width,
            height,
            sar = %format!("{}:{}", sample_aspect_ratio.num, sample_aspect_ratio.den),
            "picture size changed"
        );
    }

    fn render_frame(&self, picture: &Frame, subtitle: Option<&Frame>) {
        if picture.is_uploaded {
            return;
        }
        let count = self.rendered.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(time = picture.time, count, subtitle = subtitle.is_some(), "render");
    }

    fn on_fatal_error(&self, error: &Error) {
        tracing::error!("{error}");
    }
}

fn parse_sync(value: &str) -> std::result::Result<SyncMode, String> {
    match value {
        "audio" => Ok(SyncMode::Audio),
        "video" => Ok(SyncMode::Video),
        "ext" | "external" => Ok(SyncMode::External),
        other => Err(format!("unknown sync mode '{other}'")),
    }
}

fn parse_bytes(value: &str) -> std::result::Result<SeekByBytes, String> {
    match value {
        "auto" | "-1" => Ok(SeekByBytes::Auto),
        "on" | "1" => Ok(SeekByBytes::On),
        "off" | "0" => Ok(SeekByBytes::Off),
        other => Err(format!("unknown byte seek mode '{other}'")),
    }
}

fn cli_error(err: pico_args::Error) -> Error {
    Error::Config(err.to_string())
}

/// Parses the command line into an input path and playback options.
fn parse_args() -> Result<Option<(PathBuf, PlaybackOptions)>> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    let config_path: Option<PathBuf> = args.opt_value_from_str("--config").map_err(cli_error)?;
    let config = match config_path {
        Some(path) => config::load_from_path(&path)?,
        None => config::load().unwrap_or_default(),
    };
    let mut options = PlaybackOptions::from(config);

    if let Some(sync) = args.opt_value_from_fn("--sync", parse_sync).map_err(cli_error)? {
        options.sync_mode = sync;
    }
    if let Some(start) = args.opt_value_from_str("--ss").map_err(cli_error)? {
        options.start_time = Some(start);
    }
    if let Some(duration) = args.opt_value_from_str("-t").map_err(cli_error)? {
        options.play_duration = Some(duration);
    }
    if let Some(loops) = args.opt_value_from_str("--loop").map_err(cli_error)? {
        options.loop_count = loops;
    }
    if let Some(bytes) = args.opt_value_from_fn("--bytes", parse_bytes).map_err(cli_error)? {
        options.seek_by_bytes = bytes;
    }
    if let Some(step) = args.opt_value_from_str("--seek-step").map_err(cli_error)? {
        options.seek_interval = SeekStep::new(step);
    }
    if let Some(volume) = args.opt_value_from_str("--volume").map_err(cli_error)? {
        options.volume = Volume::new(volume);
    }
    if args.contains("--autoexit") {
        options.exit_on_finish = true;
    }
    if args.contains("--framedrop") {
        options.frame_drop = FrameDropPolicy::Always;
    }
    if args.contains("--noframedrop") {
        options.frame_drop = FrameDropPolicy::Never;
    }
    if args.contains("--infbuf") {
        options.infinite_buffer = Some(true);
    }
    options.audio_enabled &= !args.contains("-an");
    options.video_enabled &= !args.contains("-vn");
    options.subtitles_enabled &= !args.contains("-sn");

    let path = args
        .finish()
        .into_iter()
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| Error::Config("missing INPUT".into()))?;
    Ok(Some((path, options)))
}

async fn run(path: PathBuf, options: PlaybackOptions) -> Result<()> {
    let exit_on_finish = options.exit_on_finish;
    let input = FfmpegInput::open(&path)?;
    let mut container = Container::open(
        Box::new(input),
        Arc::new(FfmpegFilterFactory),
        Box::new(CpalAudioDevice::new()),
        Arc::new(LoggingPresenter::default()),
        options,
    )?;
    if let Some(duration) = container.duration() {
        tracing::info!(path = %path.display(), duration, "playing");
    }

    let Some(mut events) = container.take_events() else {
        return Err(Error::Config("event receiver already taken".into()));
    };
    let driver = tokio::spawn(presentation::drive(container.pacer()));
    let mut status = tokio::time::interval(Duration::from_secs(1));
    let mut commands = spawn_command_reader();
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PlayerEvent::Finished) if exit_on_finish => break,
                Some(PlayerEvent::Finished) => tracing::info!("playback finished, Ctrl+C to exit"),
                Some(PlayerEvent::Fatal(error)) => {
                    outcome = Err(error);
                    break;
                }
                Some(event) => tracing::debug!(?event, "player event"),
                None => break,
            },
            Some(line) = commands.recv() => match Command::parse(&line) {
                Some(command) => {
                    tracing::debug!(?command, "control");
                    if !command.apply(&container) {
                        break;
                    }
                }
                None => tracing::warn!(input = line.trim(), "unknown control"),
            },
            _ = status.tick() => {
                let stats = container.stats();
                tracing::debug!(
                    position = container.position(),
                    drift = stats.av_drift,
                    buffered = stats.total_bytes(),
                    drops = stats.total_drops(),
                    "status"
                );
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    if let Err(e) = tokio::task::spawn_blocking(move || drop(container)).await {
        tracing::warn!("shutdown failed: {e}");
    }
    if let Err(e) = driver.await {
        tracing::warn!("presentation driver failed: {e}");
    }
    outcome
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let (path, options) = match parse_args() {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            print!("{HELP}");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{e}\n\n{HELP}");
            return ExitCode::FAILURE;
        }
    };

    match run(path, options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn controls_parse_from_single_keys() {
        assert_eq!(Command::parse("p"), Some(Command::TogglePause));
        assert_eq!(Command::parse(" f \n"), Some(Command::SeekForward));
        assert_eq!(Command::parse("0"), Some(Command::VolumeUp));
        assert_eq!(Command::parse("t"), Some(Command::Cycle(MediaKind::Subtitle)));
        assert_eq!(Command::parse("q"), Some(Command::Quit));
        assert_eq!(Command::parse("x"), None);
    }
}
