//! Playlist Core - Playlist Playback Coordination
//!
//! Platform-agnostic coordinator that drives external media renderers
//! through an ordered playlist.
//!
//! This crate provides:
//! - A playback state machine (prepare, play, pause, seek, retry, stop)
//! - A playlist cursor with allowed-type filtering
//! - Renderer selection by priority, including remote handover
//! - Audio focus and network wake coordination
//! - Progress sampling with host clock overrides
//! - An event bus for item, state and progress observers
//! - A remote command surface (typed and string-encoded)
//!
//! # Architecture
//!
//! `playlist-core` does not play media itself:
//! - Renderers (local audio, video surface, cast device) implement [`Renderer`]
//! - Focus, wake locks, presentation and host predicates are traits
//! - Playlists come from any [`PlaylistSource`]
//!
//! The [`Engine`] owns a [`PlaybackStateMachine`] on one thread and feeds it
//! commands, renderer callbacks and progress ticks from a single queue.
//!
//! # Example
//!
//! ```rust,no_run
//! use playlist_core::{
//!     Collaborators, Engine, MediaEvent, MediaStatusHandle, MediaType, PlaybackConfig,
//!     PlaylistCursor, PlaylistItem, RemoteCommand, Renderer, RendererRegistry,
//! };
//!
//! // A renderer that is ready as soon as it is asked to play
//! #[derive(Default)]
//! struct InstantRenderer {
//!     handle: Option<MediaStatusHandle>,
//! }
//!
//! impl Renderer for InstantRenderer {
//!     fn name(&self) -> &str { "instant" }
//!     fn claims(&self, item: &PlaylistItem) -> bool { item.media_type.is_audio() }
//!     fn play_item(&mut self, _item: &PlaylistItem, _uri: &str) {
//!         if let Some(handle) = &self.handle {
//!             handle.post(MediaEvent::Prepared);
//!         }
//!     }
//!     fn play(&mut self) {}
//!     fn pause(&mut self) {}
//!     fn stop(&mut self) {}
//!     fn reset(&mut self) {}
//!     fn release(&mut self) {}
//!     fn set_volume(&mut self, _left: f32, _right: f32) {}
//!     fn seek_to(&mut self, _position_ms: u64) {}
//!     fn current_position(&self) -> u64 { 0 }
//!     fn duration(&self) -> u64 { 0 }
//!     fn set_media_status_listener(&mut self, handle: MediaStatusHandle) {
//!         self.handle = Some(handle);
//!     }
//! }
//!
//! # fn main() -> playlist_core::Result<()> {
//! let config = PlaybackConfig::default();
//! let cursor = PlaylistCursor::empty(config.allowed_types);
//! let registry = RendererRegistry::new().with(InstantRenderer::default());
//! let collaborators = Collaborators::new(&config);
//!
//! let engine = Engine::spawn(config, cursor, registry, collaborators)?;
//! let handle = engine.handle();
//!
//! let items = vec![
//!     PlaylistItem::new(1, 7, MediaType::AUDIO, "https://example.com/one.mp3"),
//!     PlaylistItem::new(2, 7, MediaType::AUDIO, "https://example.com/two.mp3"),
//! ];
//! handle.load_playlist(Some(7), items, 0)?;
//! handle.send(RemoteCommand::START)?;
//! handle.send_action("NEXT", &Default::default())?;
//!
//! println!("{:?}", handle.status().state);
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod command;
pub mod config;
pub mod cursor;
pub mod engine;
mod error;
pub mod events;
pub mod focus;
pub mod host;
pub mod machine;
pub mod presentation;
pub mod renderer;
pub mod source;
pub mod ticker;
pub mod types;
pub mod wake;

// Public exports
pub use clock::{ClockOverride, ProgressClock, StopWatch};
pub use command::{actions, CommandExtras, RemoteCommand};
pub use config::{PlaybackConfig, ENV_PREFIX, MAX_RETRY_COUNT};
pub use cursor::PlaylistCursor;
pub use engine::{mailbox, Engine, EngineHandle, EngineMessage, Mailbox, PlaybackStatus, PlaylistUpdate};
pub use error::{CoordinatorError, Result};
pub use events::{
    EventBus, EventStream, PlaybackEvent, PlaylistListener, ProgressListener, StateListener,
    Subscription,
};
pub use focus::{AlwaysGranted, AudioFocusCoordinator, AudioFocusProvider, FocusChange};
pub use host::{DefaultHostHooks, HostHooks};
pub use machine::{Collaborators, PlaybackStateMachine};
pub use presentation::{NoPresentation, PresentationMediaState, PresentationSink, PresentationUpdate};
pub use renderer::{MediaEvent, MediaStatusHandle, Renderer, RendererId, RendererRegistry};
pub use source::{PlaylistSource, RowSet, RowSetSource};
pub use ticker::ProgressTicker;
pub use types::{
    AudioFocus, ItemChange, ItemId, MediaProgress, MediaType, PlaybackState, PlaylistId,
    PlaylistItem, RemoteConnectionState,
};
pub use wake::{NetworkWakeCoordinator, NetworkWakeLock, NoWakeLock};
