//! Playback engine
//!
//! Runs the [`PlaybackStateMachine`] on a dedicated thread. Everything that
//! touches playback state (commands, renderer callbacks, focus changes,
//! playlist updates and progress ticks) goes through one queue and is handled
//! one work item at a time, so the machine never needs a lock.

use crate::clock::ClockOverride;
use crate::command::{CommandExtras, RemoteCommand};
use crate::config::PlaybackConfig;
use crate::cursor::PlaylistCursor;
use crate::error::{CoordinatorError, Result};
use crate::events::EventBus;
use crate::focus::FocusChange;
use crate::machine::{Collaborators, PlaybackStateMachine};
use crate::renderer::{MediaEvent, RendererId, RendererRegistry};
use crate::source::PlaylistSource;
use crate::types::{
    AudioFocus, ItemId, MediaProgress, PlaybackState, PlaylistId, PlaylistItem,
};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Sending side of the engine queue
pub type Mailbox = Sender<EngineMessage>;

/// One work item of the engine queue
#[derive(Debug)]
pub enum EngineMessage {
    Command(RemoteCommand),

    /// Renderer callback, tagged with the epoch of the handle it came through
    Media {
        renderer: RendererId,
        epoch: u64,
        event: MediaEvent,
    },

    Focus(FocusChange),

    Playlist(PlaylistUpdate),

    Clock(ClockOverride),

    /// Stop the session, release renderers and end the loop
    Shutdown,
}

/// Host-side playlist changes
pub enum PlaylistUpdate {
    /// Replace the playlist; an active session is stopped first
    Load {
        playlist_id: Option<PlaylistId>,
        source: Box<dyn PlaylistSource>,
        start_index: usize,
    },

    /// Move the cursor (clamped, snapped to an allowed item)
    SetIndex(usize),

    /// Move the cursor to the item with this id
    SetCurrentItem(ItemId),
}

impl std::fmt::Debug for PlaylistUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load {
                playlist_id,
                source,
                start_index,
            } => f
                .debug_struct("Load")
                .field("playlist_id", playlist_id)
                .field("count", &source.count())
                .field("start_index", start_index)
                .finish(),
            Self::SetIndex(index) => f.debug_tuple("SetIndex").field(index).finish(),
            Self::SetCurrentItem(id) => f.debug_tuple("SetCurrentItem").field(id).finish(),
        }
    }
}

/// Snapshot of the engine, refreshed after every work item
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub current_item: Option<PlaylistItem>,
    pub progress: MediaProgress,
    pub has_next: bool,
    pub has_previous: bool,
    pub focus: AudioFocus,
    pub wake_held: bool,

    /// Name of the active renderer
    pub renderer: Option<String>,

    pub session_id: Option<Uuid>,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Stopped,
            current_item: None,
            progress: MediaProgress::default(),
            has_next: false,
            has_previous: false,
            focus: AudioFocus::NoFocus,
            wake_held: false,
            renderer: None,
            session_id: None,
        }
    }
}

/// Create an engine queue
///
/// Useful for driving a [`PlaybackStateMachine`] without a thread.
pub fn mailbox() -> (Mailbox, Receiver<EngineMessage>) {
    unbounded()
}

/// Cloneable handle for posting work to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    mailbox: Mailbox,
    status: Arc<Mutex<PlaybackStatus>>,
    bus: EventBus,
}

impl EngineHandle {
    pub fn send(&self, command: RemoteCommand) -> Result<()> {
        self.post(EngineMessage::Command(command))
    }

    /// Decode and send a string action
    pub fn send_action(&self, action: &str, extras: &CommandExtras) -> Result<()> {
        let command = RemoteCommand::from_action(action, extras)?;
        self.send(command)
    }

    /// Replace the playlist and move to `start_index`
    pub fn load_playlist(
        &self,
        playlist_id: Option<PlaylistId>,
        source: impl PlaylistSource + 'static,
        start_index: usize,
    ) -> Result<()> {
        self.post(EngineMessage::Playlist(PlaylistUpdate::Load {
            playlist_id,
            source: Box::new(source),
            start_index,
        }))
    }

    pub fn set_index(&self, index: usize) -> Result<()> {
        self.post(EngineMessage::Playlist(PlaylistUpdate::SetIndex(index)))
    }

    pub fn set_current_item(&self, id: ItemId) -> Result<()> {
        self.post(EngineMessage::Playlist(PlaylistUpdate::SetCurrentItem(id)))
    }

    /// Forward an audio focus change from the host
    pub fn focus_changed(&self, change: FocusChange) -> Result<()> {
        self.post(EngineMessage::Focus(change))
    }

    pub fn override_clock(&self, change: ClockOverride) -> Result<()> {
        self.post(EngineMessage::Clock(change))
    }

    /// Latest status snapshot
    pub fn status(&self) -> PlaybackStatus {
        self.status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    fn post(&self, message: EngineMessage) -> Result<()> {
        self.mailbox
            .send(message)
            .map_err(|_| CoordinatorError::EngineStopped)
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").finish_non_exhaustive()
    }
}

/// Running playback engine
///
/// Owns the engine thread. Dropping it shuts the engine down.
pub struct Engine {
    handle: EngineHandle,
    thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Spawn the engine thread
    pub fn spawn(
        config: PlaybackConfig,
        cursor: PlaylistCursor,
        registry: RendererRegistry,
        collaborators: Collaborators,
    ) -> Result<Self> {
        let (mailbox, inbox) = mailbox();
        let bus = collaborators.bus.clone();
        let (wakeup, wakeups) = bounded(1);
        bus.notify_progress_subscriptions(wakeup);

        let machine =
            PlaybackStateMachine::new(config, cursor, registry, collaborators, mailbox.clone());
        let status = machine.status_handle();

        let thread = thread::Builder::new()
            .name("playlist-engine".to_string())
            .spawn(move || run(machine, &inbox, &wakeups))?;

        Ok(Self {
            handle: EngineHandle {
                mailbox,
                status,
                bus,
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Stop the session, release renderers and join the engine thread
    pub fn shutdown(mut self) {
        self.join();
    }

    fn join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        // Fails only if the thread already exited
        let _ = self.handle.mailbox.send(EngineMessage::Shutdown);
        if thread.join().is_err() {
            error!("Playback engine thread panicked");
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.join();
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("running", &self.thread.is_some())
            .finish()
    }
}

fn run(
    mut machine: PlaybackStateMachine,
    inbox: &Receiver<EngineMessage>,
    wakeups: &Receiver<()>,
) {
    info!("Playback engine started");

    loop {
        let ticks = machine.tick_receiver();

        select! {
            recv(inbox) -> message => match message {
                Ok(EngineMessage::Shutdown) | Err(_) => break,
                Ok(message) => machine.handle_message(message),
            },
            recv(ticks) -> _ => machine.on_tick(),
            // A progress listener subscribed; the ticker check below restarts it
            recv(wakeups) -> _ => {}
        }

        machine.resume_ticker_if_needed();
    }

    debug!("Playback engine shutting down");
    machine.shutdown();
    info!("Playback engine stopped");
}
