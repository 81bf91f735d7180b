/// Playlist Host - console driver for the playback coordinator
///
/// Loads a playlist file, plays it on simulated renderers and reads
/// commands from stdin. Playback events are written to stdout as JSON
/// lines; logs go to stderr.
mod hooks;
mod input;
mod simulated;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, unbounded, Receiver};
use hooks::{ConsoleHooks, LogPresentation};
use input::Input;
use playlist_core::{
    Collaborators, Engine, EngineHandle, EventStream, MediaType, PlaybackConfig, PlaylistCursor,
    PlaylistId, PlaylistItem, RemoteCommand, RendererRegistry,
};
use serde::Deserialize;
use simulated::{SimulatedRenderer, Timing};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "playlist-host")]
#[command(about = "Drive a playlist through simulated renderers", long_about = None)]
struct Cli {
    /// Playlist file (JSON)
    playlist: PathBuf,

    /// Configuration file path
    #[arg(short, long, env = "PLAYLIST_CONFIG")]
    config: Option<PathBuf>,

    /// Pretend the network is down; only items with a local copy play
    #[arg(long)]
    offline: bool,

    /// Simulated length of every item, in milliseconds
    #[arg(long, default_value_t = 30_000)]
    item_ms: u64,

    /// Simulated preparation latency, in milliseconds
    #[arg(long, default_value_t = 250)]
    prepare_ms: u64,

    /// Simulated seek latency, in milliseconds
    #[arg(long, default_value_t = 80)]
    seek_ms: u64,

    /// Start playing as soon as the playlist is loaded
    #[arg(long)]
    autoplay: bool,
}

/// Playlist file contents
#[derive(Debug, Deserialize)]
struct PlaylistFile {
    #[serde(default)]
    id: Option<PlaylistId>,

    #[serde(default)]
    start_index: usize,

    items: Vec<PlaylistItem>,
}

impl PlaylistFile {
    fn read(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read playlist {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse playlist {}", path.display()))
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "playlist_host=info,playlist_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = PlaybackConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let playlist = PlaylistFile::read(&cli.playlist)?;
    info!(
        "Loaded {} items from {}",
        playlist.items.len(),
        cli.playlist.display()
    );

    let timing = Timing {
        prepare: Duration::from_millis(cli.prepare_ms),
        seek: Duration::from_millis(cli.seek_ms),
        item_length: Duration::from_millis(cli.item_ms),
    };
    let registry = RendererRegistry::new()
        .with(SimulatedRenderer::new("speaker", MediaType::AUDIO, timing)?)
        .with(SimulatedRenderer::new("screen", MediaType::VIDEO, timing)?);

    let collaborators = Collaborators::new(&config)
        .with_hooks(ConsoleHooks::new(&config, cli.offline))
        .with_presentation(LogPresentation::default());
    let cursor = PlaylistCursor::empty(config.allowed_types);

    let engine = Engine::spawn(config, cursor, registry, collaborators)
        .context("Failed to start playback engine")?;
    let handle = engine.handle();

    let events = start_session(&handle, playlist, cli.autoplay)?;

    let lines = spawn_stdin_reader()?;
    let result = run(&handle, &events, &lines);

    engine.shutdown();
    result
}

/// Load the playlist and optionally start it
///
/// The stream is opened first so the initial item change and the first
/// states reach stdout.
fn start_session(handle: &EngineHandle, playlist: PlaylistFile, autoplay: bool) -> Result<EventStream> {
    let events = handle.events().event_stream();

    handle.load_playlist(playlist.id, playlist.items, playlist.start_index)?;
    if autoplay {
        handle.send(RemoteCommand::START)?;
    }

    Ok(events)
}

/// Forward stdin lines until EOF
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = unbounded();

    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("Failed to spawn stdin reader")?;

    Ok(rx)
}

fn run(handle: &EngineHandle, events: &EventStream, lines: &Receiver<String>) -> Result<()> {
    let stdout = std::io::stdout();

    loop {
        select! {
            recv(lines) -> line => {
                let Ok(line) = line else {
                    info!("Input closed");
                    return Ok(());
                };

                match input::parse_line(&line) {
                    Ok(Some(Input::Quit)) => return Ok(()),
                    Ok(Some(input)) => dispatch(handle, input, &mut stdout.lock())?,
                    Ok(None) => {}
                    Err(e) => warn!("{:#}", e),
                }
            }
            recv(events.receiver()) -> event => {
                let Ok(event) = event else {
                    error!("Event stream closed");
                    return Ok(());
                };

                let mut out = stdout.lock();
                serde_json::to_writer(&mut out, &event)?;
                writeln!(out)?;
            }
        }
    }
}

fn dispatch(handle: &EngineHandle, input: Input, out: &mut impl Write) -> Result<()> {
    match input {
        Input::Command(command) => handle.send(command)?,
        Input::Focus(change) => handle.focus_changed(change)?,
        Input::Select(index) => handle.set_index(index)?,
        Input::Status => {
            serde_json::to_writer(&mut *out, &handle.status())?;
            writeln!(out)?;
        }
        Input::Quit => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use playlist_core::{PlaybackEvent, PlaybackState};

    #[test]
    fn reads_playlist_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "id": 4,
                "start_index": 1,
                "items": [
                    {{"id": 1, "playlist_id": 4, "media_type": 1, "media_url": "http://a/1.mp3"}},
                    {{"id": 2, "playlist_id": 4, "media_type": 2, "media_url": "http://a/2.mp4",
                      "downloaded_uri": "/media/2.mp4", "title": "Clip"}}
                ]
            }}"#
        )
        .unwrap();

        let playlist = PlaylistFile::read(file.path()).unwrap();
        assert_eq!(playlist.id, Some(4));
        assert_eq!(playlist.start_index, 1);
        assert_eq!(playlist.items.len(), 2);
        assert_eq!(playlist.items[1].media_type, MediaType::VIDEO);
        assert_eq!(playlist.items[1].title.as_deref(), Some("Clip"));
    }

    #[test]
    fn playlist_id_and_start_are_optional() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"items": []}}"#).unwrap();

        let playlist = PlaylistFile::read(file.path()).unwrap();
        assert!(playlist.id.is_none());
        assert_eq!(playlist.start_index, 0);
        assert!(playlist.items.is_empty());
    }

    #[test]
    fn missing_playlist_file_is_an_error() {
        assert!(PlaylistFile::read(Path::new("/nonexistent/playlist.json")).is_err());
    }

    #[test]
    fn session_stream_sees_initial_item_and_state() {
        let config = PlaybackConfig::default();
        let timing = Timing {
            prepare: Duration::from_millis(10),
            seek: Duration::from_millis(10),
            item_length: Duration::from_secs(60),
        };
        let registry = RendererRegistry::new()
            .with(SimulatedRenderer::new("speaker", MediaType::AUDIO, timing).unwrap());
        let cursor = PlaylistCursor::empty(config.allowed_types);
        let collaborators = Collaborators::new(&config);
        let engine = Engine::spawn(config, cursor, registry, collaborators).unwrap();

        let playlist: PlaylistFile = serde_json::from_str(
            r#"{"id": 4, "items": [
                {"id": 1, "playlist_id": 4, "media_type": 1, "media_url": "http://a/1.mp3"}
            ]}"#,
        )
        .unwrap();
        let events = start_session(&engine.handle(), playlist, true).unwrap();

        let first = events.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(first, PlaybackEvent::ItemChanged { item: Some(item), .. } if item.id == 1));

        let state = loop {
            match events.recv_timeout(Duration::from_secs(5)).unwrap() {
                PlaybackEvent::StateChanged { state } => break state,
                _ => continue,
            }
        };
        assert_eq!(state, PlaybackState::Preparing);

        engine.shutdown();
    }
}
