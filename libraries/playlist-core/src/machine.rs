//! Playback state machine
//!
//! The single source of truth for playback. It owns the cursor, the
//! renderer registry and the focus/wake coordinators, consumes commands and
//! renderer callbacks one at a time, and publishes every state and item
//! change to the event bus.
//!
//! The machine never blocks and never spawns: the [`Engine`](crate::Engine)
//! feeds it from a queue on a dedicated thread, and tests can feed it
//! directly with [`PlaybackStateMachine::handle_message`].

use crate::clock::ProgressClock;
use crate::command::RemoteCommand;
use crate::config::{PlaybackConfig, MAX_RETRY_COUNT};
use crate::cursor::PlaylistCursor;
use crate::engine::{EngineMessage, Mailbox, PlaybackStatus, PlaylistUpdate};
use crate::events::EventBus;
use crate::focus::{AlwaysGranted, AudioFocusCoordinator, AudioFocusProvider, FocusChange};
use crate::host::{DefaultHostHooks, HostHooks};
use crate::presentation::{NoPresentation, PresentationMediaState, PresentationSink, PresentationUpdate};
use crate::renderer::{MediaEvent, MediaStatusHandle, Renderer, RendererId, RendererRegistry};
use crate::ticker::ProgressTicker;
use crate::types::{
    AudioFocus, ItemChange, MediaProgress, MediaType, PlaybackState, PlaylistItem,
    RemoteConnectionState,
};
use crate::wake::{NetworkWakeCoordinator, NetworkWakeLock, NoWakeLock};
use crossbeam_channel::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Span};
use uuid::Uuid;

/// Host-provided collaborators of the state machine
pub struct Collaborators {
    pub focus: Arc<dyn AudioFocusProvider>,
    pub wake: Arc<dyn NetworkWakeLock>,
    pub presentation: Box<dyn PresentationSink>,
    pub hooks: Box<dyn HostHooks>,
    pub bus: EventBus,
}

impl Collaborators {
    /// No-op collaborators with hooks derived from `config`
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            focus: Arc::new(AlwaysGranted),
            wake: Arc::new(NoWakeLock),
            presentation: Box::new(NoPresentation),
            hooks: Box::new(DefaultHostHooks::new(config)),
            bus: EventBus::new(),
        }
    }

    #[must_use]
    pub fn with_focus(mut self, focus: Arc<dyn AudioFocusProvider>) -> Self {
        self.focus = focus;
        self
    }

    #[must_use]
    pub fn with_wake(mut self, wake: Arc<dyn NetworkWakeLock>) -> Self {
        self.wake = wake;
        self
    }

    #[must_use]
    pub fn with_presentation(mut self, presentation: impl PresentationSink + 'static) -> Self {
        self.presentation = Box::new(presentation);
        self
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: impl HostHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }
}

/// One activation from START to Stopped
struct Session {
    id: Uuid,
    span: Span,
    started_at: Instant,
}

impl Session {
    fn begin() -> Self {
        let id = Uuid::new_v4();
        let span = info_span!("session", id = %id);
        info!(parent: &span, "Session started");
        Self {
            id,
            span,
            started_at: Instant::now(),
        }
    }
}

/// Why playback is being paused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PauseReason {
    /// PAUSE / PLAY_PAUSE; abandons focus and cancels any auto-resume
    User,
    /// Focus lost without ducking; resumes on regain
    FocusLoss,
    /// SEEK_STARTED; resumes when the seek completes
    Seek,
    /// A remote renderer is connecting
    Handover,
}

/// Playback state machine
pub struct PlaybackStateMachine {
    config: PlaybackConfig,
    cursor: PlaylistCursor,
    registry: RendererRegistry,
    focus: AudioFocusCoordinator,
    wake: NetworkWakeCoordinator,
    clock: ProgressClock,
    ticker: ProgressTicker,
    bus: EventBus,
    presentation: Box<dyn PresentationSink>,
    hooks: Box<dyn HostHooks>,
    mailbox: Mailbox,
    status: Arc<Mutex<PlaybackStatus>>,

    state: PlaybackState,
    current_item: Option<PlaylistItem>,
    active: Option<RendererId>,
    session: Option<Session>,
    progress: MediaProgress,

    /// Tag of the latest prepare or seek; older callbacks are stale
    epoch: u64,

    /// Applied on the next `Prepared`
    seek_to_ms: u64,
    start_paused: bool,

    paused_for_seek: bool,
    paused_for_focus_loss: bool,
    retry_count: u32,

    /// Whether playback was running when a remote renderer started connecting
    remote_resume: Option<bool>,
    last_buffered_percent: u8,
    released: bool,
}

impl PlaybackStateMachine {
    /// Create a machine around a caller-owned cursor and registry
    ///
    /// `mailbox` is the engine queue renderer callbacks are posted into.
    pub fn new(
        config: PlaybackConfig,
        cursor: PlaylistCursor,
        registry: RendererRegistry,
        collaborators: Collaborators,
        mailbox: Mailbox,
    ) -> Self {
        let Collaborators {
            focus,
            wake,
            mut presentation,
            hooks,
            bus,
        } = collaborators;

        if let Some(icon) = &config.app_icon {
            presentation.set_base(icon);
        }

        let mut machine = Self {
            focus: AudioFocusCoordinator::new(focus, hooks.audio_duck_volume()),
            wake: NetworkWakeCoordinator::new(wake),
            clock: ProgressClock::new(),
            ticker: ProgressTicker::new(config.progress_interval()),
            config,
            cursor,
            registry,
            bus,
            presentation,
            hooks,
            mailbox,
            status: Arc::new(Mutex::new(PlaybackStatus::default())),
            state: PlaybackState::Stopped,
            current_item: None,
            active: None,
            session: None,
            progress: MediaProgress::default(),
            epoch: 0,
            seek_to_ms: 0,
            start_paused: false,
            paused_for_seek: false,
            paused_for_focus_loss: false,
            retry_count: 0,
            remote_resume: None,
            last_buffered_percent: 0,
            released: false,
        };

        // Inactive renderers still need a way to report connection changes
        for (id, renderer) in machine.registry.iter_mut() {
            renderer.set_media_status_listener(MediaStatusHandle::new(
                id,
                0,
                machine.mailbox.clone(),
            ));
        }

        machine.refresh_status();
        machine
    }

    // ===== Accessors =====

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_item(&self) -> Option<&PlaylistItem> {
        self.current_item.as_ref()
    }

    pub fn cursor(&self) -> &PlaylistCursor {
        &self.cursor
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    pub fn active_renderer(&self) -> Option<RendererId> {
        self.active
    }

    pub fn focus(&self) -> AudioFocus {
        self.focus.current()
    }

    pub fn wake_held(&self) -> bool {
        self.wake.is_held()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_paused_for_seek(&self) -> bool {
        self.paused_for_seek
    }

    pub fn is_paused_for_focus_loss(&self) -> bool {
        self.paused_for_focus_loss
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|session| session.id)
    }

    /// Last published progress
    pub fn progress(&self) -> MediaProgress {
        self.progress
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.is_running()
    }

    /// Ticker channel for the engine loop to select on
    pub fn tick_receiver(&self) -> Receiver<Instant> {
        self.ticker.receiver()
    }

    /// Shared snapshot updated after every work item
    pub fn status_handle(&self) -> Arc<Mutex<PlaybackStatus>> {
        Arc::clone(&self.status)
    }

    // ===== Work Items =====

    /// Process one queued work item to completion
    pub fn handle_message(&mut self, message: EngineMessage) {
        let span = self.session.as_ref().map(|session| session.span.clone());
        let _entered = span.as_ref().map(Span::enter);

        match message {
            EngineMessage::Command(command) => self.dispatch(command),
            EngineMessage::Media {
                renderer,
                epoch,
                event,
            } => self.on_media_event(renderer, epoch, event),
            EngineMessage::Focus(change) => self.on_focus_change(change),
            EngineMessage::Playlist(update) => self.apply_playlist_update(update),
            EngineMessage::Clock(change) => self.clock.apply(change),
            EngineMessage::Shutdown => self.shutdown(),
        }

        self.refresh_status();
    }

    /// Route a remote command
    pub fn dispatch(&mut self, command: RemoteCommand) {
        debug!("Command {} in state {}", command, self.state);

        match command {
            RemoteCommand::Start {
                seek_position,
                start_paused,
            } => self.start(seek_position, start_paused),
            RemoteCommand::PlayPause => self.toggle(),
            RemoteCommand::Next => self.next(),
            RemoteCommand::Previous => self.previous(),
            RemoteCommand::Stop => self.stop(),
            RemoteCommand::Repeat => self.hooks.on_repeat(),
            RemoteCommand::Shuffle => self.hooks.on_shuffle(),
            RemoteCommand::SeekStarted => self.seek_started(),
            RemoteCommand::SeekEnded { seek_position } => self.seek(seek_position),
            RemoteCommand::AllowedTypeChanged { mask } => self.set_allowed(mask),
            RemoteCommand::UpdatePresentation => self.update_presentation(),
        }
    }

    /// Sample progress and publish it; halts the ticker without listeners
    pub fn on_tick(&mut self) {
        if self.state != PlaybackState::Playing {
            self.stop_progress();
            return;
        }

        self.progress = self.clock.sample(self.renderer());
        if self.bus.publish_progress(&self.progress) == 0 {
            debug!("No progress listeners; halting ticker");
            self.stop_progress();
        }

        self.refresh_status();
    }

    /// Restart a halted ticker once a progress listener shows up
    pub fn resume_ticker_if_needed(&mut self) {
        if self.state == PlaybackState::Playing
            && !self.ticker.is_running()
            && self.bus.has_progress_listeners()
        {
            self.start_progress();
        }
    }

    /// End any session and release every renderer (idempotent)
    pub fn shutdown(&mut self) {
        if self.released {
            return;
        }

        self.stop();
        for (_, renderer) in self.registry.iter_mut() {
            renderer.release();
        }
        self.presentation.release();
        self.released = true;
        self.refresh_status();
    }

    // ===== Playback Control =====

    /// Begin a session with the cursor's current item
    ///
    /// No-op when the cursor has no current item (e.g. an empty playlist).
    pub fn start(&mut self, seek_to_ms: u64, start_paused: bool) {
        if self.cursor.current_item().is_none() {
            debug!("START ignored: cursor has no current item");
            return;
        }

        self.seek_to_ms = seek_to_ms;
        self.start_paused = start_paused;
        self.start_item_playback();
    }

    pub fn play(&mut self) {
        match self.state {
            PlaybackState::Paused => {
                self.paused_for_focus_loss = false;
                self.paused_for_seek = false;

                if self.focus_applies() && !self.focus.request_focus() {
                    debug!("PLAY ignored: audio focus denied");
                    return;
                }
                self.resume_playback();
            }
            PlaybackState::Preparing => self.start_paused = false,
            PlaybackState::Seeking => self.paused_for_seek = true,
            state => debug!("PLAY ignored in {}", state),
        }
    }

    pub fn pause(&mut self) {
        self.pause_with(PauseReason::User);
    }

    /// PLAY_PAUSE
    pub fn toggle(&mut self) {
        match self.state {
            PlaybackState::Preparing => self.start_paused = !self.start_paused,
            PlaybackState::Seeking if !self.paused_for_seek => self.play(),
            PlaybackState::Playing | PlaybackState::Seeking => self.pause(),
            _ if self.paused_for_focus_loss => self.pause(),
            _ => self.play(),
        }
    }

    pub fn next(&mut self) {
        if self.state == PlaybackState::Stopped {
            debug!("NEXT ignored while stopped");
            return;
        }

        self.seek_to_ms = 0;
        self.start_paused = !self.is_playing();
        self.cursor.next();
        self.start_item_playback();
    }

    pub fn previous(&mut self) {
        if self.state == PlaybackState::Stopped {
            debug!("PREVIOUS ignored while stopped");
            return;
        }

        self.seek_to_ms = 0;
        self.start_paused = !self.is_playing();
        self.cursor.previous();
        self.start_item_playback();
    }

    /// End the session (idempotent)
    pub fn stop(&mut self) {
        let had_session = self.session.is_some() || self.state != PlaybackState::Stopped;

        self.stop_progress();
        self.clock.reset();
        self.epoch += 1;
        self.with_renderer(|renderer| {
            renderer.stop();
            renderer.reset();
        });
        self.focus.abandon_focus();
        self.wake.release();

        if let Some(item) = self.current_item.take() {
            self.hooks.on_playback_stopped(&item);
        }

        self.cursor.reset();
        self.seek_to_ms = 0;
        self.start_paused = false;
        self.paused_for_seek = false;
        self.paused_for_focus_loss = false;
        self.retry_count = 0;
        self.remote_resume = None;
        self.progress = MediaProgress::default();

        self.set_state(PlaybackState::Stopped);

        if had_session {
            self.presentation.set_enabled(false);
            if let Some(session) = self.session.take() {
                info!(
                    parent: &session.span,
                    "Session ended after {:?}",
                    session.started_at.elapsed()
                );
            }
            self.hooks.on_session_ended();
        }
    }

    /// SEEK_STARTED: pause while the user drags, resume after the seek
    pub fn seek_started(&mut self) {
        if self.state == PlaybackState::Playing {
            self.pause_with(PauseReason::Seek);
        } else {
            debug!("SEEK_STARTED ignored in {}", self.state);
        }
    }

    /// SEEK_ENDED
    ///
    /// While playing the renderer is paused and the machine enters
    /// `Seeking` until the matching `SeekComplete`. While paused the seek is
    /// issued without resuming, unless the pause came from SEEK_STARTED.
    pub fn seek(&mut self, position_ms: u64) {
        match self.state {
            PlaybackState::Playing => {
                self.with_renderer(|renderer| renderer.pause());
                self.stop_progress();
                self.paused_for_seek = true;
                self.issue_seek(position_ms);
                self.set_state(PlaybackState::Seeking);
            }
            PlaybackState::Paused | PlaybackState::Seeking => self.issue_seek(position_ms),
            PlaybackState::Preparing => self.seek_to_ms = position_ms,
            state => debug!("SEEK_ENDED ignored in {}", state),
        }
    }

    /// ALLOWED_TYPE_CHANGED
    pub fn set_allowed(&mut self, mask: MediaType) {
        self.cursor.set_allowed(mask);

        let Some(index) = self.cursor.current_index() else {
            return;
        };
        if self.cursor.current_item().is_none() || self.cursor.current_is_allowed() {
            return;
        }

        if self.state == PlaybackState::Stopped {
            // Keep the cursor on an allowed item for the next START
            self.cursor.set_index(index);
            self.publish_item_change(self.cursor.current_item());
        } else {
            info!("Current item no longer allowed; advancing");
            self.next();
        }
    }

    /// Push the current state to the presentation sink
    pub fn update_presentation(&mut self) {
        let state = PresentationMediaState {
            is_playing: self.state == PlaybackState::Playing,
            has_next: self.cursor.has_next(),
            has_previous: self.cursor.has_previous(),
        };
        let click_target = self
            .hooks
            .notification_click_target()
            .or_else(|| self.config.notification_click_target.clone());

        let update = PresentationUpdate::for_item(self.current_item.as_ref(), state, click_target);
        self.presentation.update(&update);
    }

    // ===== Item Playback =====

    fn start_item_playback(&mut self) {
        self.begin_session();
        self.end_current_item();
        self.retry_count = 0;
        self.paused_for_seek = false;
        self.paused_for_focus_loss = false;
        self.remote_resume = None;

        loop {
            let found_offline = self.seek_to_next_playable();

            let Some(item) = self.cursor.current_item() else {
                self.current_item = None;
                self.publish_item_change(None);
                if found_offline {
                    info!("Reached the end of the playlist");
                    self.hooks.on_playlist_ended();
                }
                self.stop();
                return;
            };

            self.current_item = Some(item.clone());
            self.publish_item_change(Some(item.clone()));

            if let Some(renderer) = self.registry.select(&item) {
                self.play_item_on(renderer, &item);
                return;
            }

            warn!("No renderer claims item {}; skipping", item.id);
            self.hooks.on_item_skipped(&item);
            if !self.cursor.has_next() {
                self.current_item = None;
                self.stop();
                return;
            }
            self.cursor.next();
        }
    }

    /// Skip streamed items while offline
    ///
    /// Returns false when the network is absent and no downloaded item
    /// remains; the cursor is then at its terminal position.
    fn seek_to_next_playable(&mut self) -> bool {
        if self.hooks.is_network_available() {
            return true;
        }

        let mut candidate = self.cursor.current_item();
        while let Some(item) = candidate {
            if self.hooks.is_downloaded(&item) {
                return true;
            }
            candidate = self.cursor.next();
        }

        info!("Network unavailable and no downloaded items remain");
        self.hooks.on_no_offline_items_available();
        false
    }

    fn play_item_on(&mut self, id: RendererId, item: &PlaylistItem) {
        self.switch_renderer(id);
        self.stop_progress();
        self.clock.reset();
        self.last_buffered_percent = 0;
        self.progress = MediaProgress::default();

        let downloaded = self.hooks.is_downloaded(item);
        let uri = item.playback_uri(downloaded).to_string();
        let handle = self.next_handle(id);

        self.set_state(PlaybackState::Preparing);

        if let Some(renderer) = self.registry.get_mut(id) {
            debug!("Preparing item {} on {}: {}", item.id, renderer.name(), uri);
            renderer.reset();
            renderer.set_media_status_listener(handle);
            renderer.play_item(item, &uri);
        }

        if self.focus_applies() {
            self.focus.request_focus();
        }
        self.wake.update(!downloaded);
        self.update_presentation();
    }

    /// Re-prepare the current item after a transient error
    fn retry_item(&mut self) {
        let (Some(id), Some(item)) = (self.active, self.current_item.clone()) else {
            return;
        };

        if matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            self.seek_to_ms = self.current_position();
            self.start_paused = self.state == PlaybackState::Paused;
        }

        let downloaded = self.hooks.is_downloaded(&item);
        let uri = item.playback_uri(downloaded).to_string();
        let handle = self.next_handle(id);

        self.stop_progress();
        self.set_state(PlaybackState::Preparing);

        if let Some(renderer) = self.registry.get_mut(id) {
            renderer.reset();
            renderer.set_media_status_listener(handle);
            renderer.play_item(&item, &uri);
        }
    }

    fn switch_renderer(&mut self, id: RendererId) {
        if self.active == Some(id) {
            return;
        }

        let previous = self.active.replace(id);
        let previous_name = previous.and_then(|old| {
            let renderer = self.registry.get_mut(old)?;
            renderer.stop();
            renderer.reset();
            Some(renderer.name().to_string())
        });
        let current_name = self.registry.name(id).map(str::to_string);

        info!("Renderer changed: {:?} -> {:?}", previous_name, current_name);
        self.hooks
            .on_renderer_changed(previous_name.as_deref(), current_name.as_deref());

        if self
            .renderer()
            .is_some_and(|renderer| renderer.handles_own_audio_focus())
        {
            self.focus.abandon_focus();
        }
    }

    fn end_current_item(&mut self) {
        if !matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Seeking
        ) {
            return;
        }

        if let Some(item) = &self.current_item {
            let progress = self.clock.sample(self.renderer());
            self.hooks
                .on_playback_ended(item, progress.position_ms, progress.duration_ms);
        }
    }

    // ===== Renderer Callbacks =====

    fn on_media_event(&mut self, renderer: RendererId, epoch: u64, event: MediaEvent) {
        if event.is_lifecycle() && (self.active != Some(renderer) || epoch != self.epoch) {
            debug!(
                "Discarding stale {:?} from {:?} (epoch {}, current {})",
                event, renderer, epoch, self.epoch
            );
            return;
        }

        match event {
            MediaEvent::Prepared => self.on_prepared(),
            MediaEvent::Completed => self.on_completed(),
            MediaEvent::Error { message } => self.on_error(&message),
            MediaEvent::SeekComplete => self.on_seek_complete(),
            MediaEvent::BufferingUpdate(percent) => self.on_buffering_update(percent),
            MediaEvent::RemoteConnectionChanged(state) => {
                self.on_remote_connection_change(renderer, state);
            }
            MediaEvent::MediaInfoChanged => {
                self.publish_item_change(self.current_item.clone());
                self.update_presentation();
            }
        }
    }

    fn on_prepared(&mut self) {
        if self.state != PlaybackState::Preparing {
            debug!("Prepared ignored in {}", self.state);
            return;
        }

        self.retry_count = 0;

        let focused = !self.focus_applies() || self.focus.request_focus();
        if !focused {
            debug!("Audio focus denied; starting paused");
            self.paused_for_focus_loss = true;
        }
        self.apply_volume();

        if self.seek_to_ms > 0 {
            let position = std::mem::take(&mut self.seek_to_ms);
            self.issue_seek(position);
        }

        let start_paused = std::mem::take(&mut self.start_paused) || !focused;
        if start_paused {
            self.set_state(PlaybackState::Playing);
            let reason = if focused {
                PauseReason::Handover
            } else {
                PauseReason::FocusLoss
            };
            self.pause_with(reason);
            return;
        }

        self.with_renderer(|renderer| renderer.play());
        self.start_progress();
        self.set_state(PlaybackState::Playing);

        if let Some(item) = &self.current_item {
            let progress = self.clock.sample(self.renderer());
            self.hooks
                .on_playback_started(item, progress.position_ms, progress.duration_ms);
        }
    }

    fn on_completed(&mut self) {
        if !matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Seeking
        ) {
            debug!("Completion ignored in {}", self.state);
            return;
        }

        debug!("Item completed");
        self.seek_to_ms = 0;
        self.start_paused = false;
        self.cursor.next();
        self.start_item_playback();
    }

    fn on_error(&mut self, message: &str) {
        if !self.state.is_active() {
            debug!("Renderer error ignored in {}: {}", self.state, message);
            return;
        }

        let is_audio = self
            .current_item
            .as_ref()
            .is_some_and(|item| item.media_type.is_audio());

        if is_audio && self.retry_count < MAX_RETRY_COUNT {
            self.retry_count += 1;
            warn!(
                "Renderer error ({}); retry {}/{}",
                message, self.retry_count, MAX_RETRY_COUNT
            );
            self.retry_item();
            return;
        }

        error!("Renderer error: {}", message);
        self.fail();
    }

    /// Unrecoverable error: release everything but keep the cursor
    fn fail(&mut self) {
        self.stop_progress();
        self.epoch += 1;
        self.with_renderer(|renderer| {
            renderer.stop();
            renderer.reset();
        });
        self.wake.release();
        self.focus.abandon_focus();
        self.start_paused = false;
        self.paused_for_seek = false;
        self.paused_for_focus_loss = false;
        self.set_state(PlaybackState::Error);

        if let Some(session) = self.session.take() {
            error!(parent: &session.span, "Session failed");
        }
    }

    fn on_seek_complete(&mut self) {
        match self.state {
            PlaybackState::Seeking => {
                let resume = std::mem::take(&mut self.paused_for_seek);
                if resume && self.focus_applies() && !self.focus.request_focus() {
                    debug!("Audio focus denied after seek; staying paused");
                    self.paused_for_focus_loss = true;
                    self.set_state(PlaybackState::Paused);
                } else if resume {
                    self.resume_playback();
                } else {
                    self.set_state(PlaybackState::Paused);
                }
            }
            PlaybackState::Paused if self.paused_for_seek => self.play(),
            state => debug!("SeekComplete ignored in {}", state),
        }
    }

    fn on_buffering_update(&mut self, percent: u8) {
        let percent = percent.min(100);
        let changed = percent != self.last_buffered_percent;
        self.last_buffered_percent = percent;

        // The ticker covers the playing case
        if changed && self.state != PlaybackState::Playing {
            self.progress = self.clock.sample(self.renderer());
            self.bus.publish_progress(&self.progress);
        }
    }

    fn on_remote_connection_change(&mut self, renderer: RendererId, state: RemoteConnectionState) {
        info!("Renderer {:?} connection: {:?}", renderer, state);

        if self.current_item.is_none() || !self.state.is_active() {
            return;
        }
        if self.active.is_some_and(|active| active < renderer) {
            debug!("Ignoring connection change of lower-priority renderer");
            return;
        }

        let is_active = self.active == Some(renderer);
        match state {
            RemoteConnectionState::Connecting if !is_active => {
                self.remote_resume = Some(self.is_playing());
                self.seek_to_ms = self.current_position();
                self.pause_with(PauseReason::Handover);
            }
            RemoteConnectionState::Connected if !is_active => self.restart_on_selected_renderer(),
            RemoteConnectionState::NotConnected if is_active => self.restart_on_selected_renderer(),
            _ => {}
        }
    }

    /// Re-select a renderer for the current item and restart it in place
    fn restart_on_selected_renderer(&mut self) {
        let resume = match self.remote_resume.take() {
            Some(resume) => resume,
            None => {
                self.seek_to_ms = self.current_position();
                self.is_playing()
            }
        };
        self.start_paused = !resume;

        let Some(item) = self.current_item.clone() else {
            return;
        };

        match self.registry.select(&item) {
            Some(id) => {
                self.retry_count = 0;
                self.play_item_on(id, &item);
            }
            None => {
                warn!("No renderer claims item {} after connection change", item.id);
                self.hooks.on_item_skipped(&item);
                self.seek_to_ms = 0;
                self.cursor.next();
                self.start_item_playback();
            }
        }
    }

    // ===== Focus =====

    fn on_focus_change(&mut self, change: FocusChange) {
        if self.session.is_none() {
            debug!("Focus change after session end ignored: {:?}", change);
            return;
        }
        if !self.focus_applies() {
            debug!("Focus change ignored for current renderer: {:?}", change);
            return;
        }
        let Some(change) = self.focus.apply(change) else {
            return;
        };

        match change {
            FocusChange::Gained => {
                if self.paused_for_focus_loss && self.state == PlaybackState::Paused {
                    self.paused_for_focus_loss = false;
                    self.resume_playback();
                } else {
                    self.apply_volume();
                }
            }
            FocusChange::Lost { can_duck: true } => self.apply_volume(),
            FocusChange::Lost { can_duck: false } => match self.state {
                PlaybackState::Playing => self.pause_with(PauseReason::FocusLoss),
                PlaybackState::Preparing => {
                    self.start_paused = true;
                    self.paused_for_focus_loss = true;
                }
                // Land in Paused when the seek completes, resume on regain
                PlaybackState::Seeking if self.paused_for_seek => {
                    self.paused_for_seek = false;
                    self.paused_for_focus_loss = true;
                }
                _ => {}
            },
        }
    }

    /// Focus matters for audio items on renderers that do not manage it
    fn focus_applies(&self) -> bool {
        let audio = self
            .current_item
            .as_ref()
            .is_some_and(|item| item.media_type.is_audio());
        let local = self
            .renderer()
            .is_some_and(|renderer| !renderer.handles_own_audio_focus());
        audio && local
    }

    fn apply_volume(&mut self) {
        let volume = if self.focus_applies() {
            self.focus.volume()
        } else {
            1.0
        };
        self.with_renderer(|renderer| renderer.set_volume(volume, volume));
    }

    // ===== Internals =====

    fn pause_with(&mut self, reason: PauseReason) {
        match self.state {
            PlaybackState::Playing => {
                self.with_renderer(|renderer| renderer.pause());
                self.stop_progress();
                self.set_state(PlaybackState::Paused);

                match reason {
                    PauseReason::User => {
                        self.paused_for_focus_loss = false;
                        self.paused_for_seek = false;
                        self.focus.abandon_focus();
                    }
                    PauseReason::FocusLoss => self.paused_for_focus_loss = true,
                    PauseReason::Seek => self.paused_for_seek = true,
                    PauseReason::Handover => {}
                }
            }
            PlaybackState::Preparing if reason == PauseReason::User => self.start_paused = true,
            PlaybackState::Seeking if reason == PauseReason::User => self.paused_for_seek = false,
            PlaybackState::Paused if reason == PauseReason::User => {
                self.paused_for_focus_loss = false;
                self.paused_for_seek = false;
                self.focus.abandon_focus();
            }
            state => debug!("Pause ({:?}) ignored in {}", reason, state),
        }
    }

    /// Paused/Seeking -> Playing
    fn resume_playback(&mut self) {
        self.apply_volume();
        self.with_renderer(|renderer| renderer.play());
        self.start_progress();
        self.set_state(PlaybackState::Playing);
    }

    fn issue_seek(&mut self, position_ms: u64) {
        let Some(id) = self.active else {
            return;
        };

        let handle = self.next_handle(id);
        if let Some(renderer) = self.registry.get_mut(id) {
            renderer.set_media_status_listener(handle);
            renderer.seek_to(position_ms);
        }
    }

    fn set_state(&mut self, next: PlaybackState) -> bool {
        if !self.state.can_transition_to(next) {
            debug!("Illegal transition {} -> {} ignored", self.state, next);
            return false;
        }
        if self.state == next && next == PlaybackState::Stopped {
            return true;
        }

        debug!("State {} -> {}", self.state, next);
        self.state = next;
        self.bus.publish_state(next);
        self.update_presentation();
        true
    }

    fn publish_item_change(&mut self, item: Option<PlaylistItem>) {
        let change = ItemChange {
            item,
            has_next: self.cursor.has_next(),
            has_previous: self.cursor.has_previous(),
        };
        self.bus.publish_item_change(&change);
        self.update_presentation();
    }

    fn begin_session(&mut self) {
        if self.session.is_some() {
            return;
        }

        self.session = Some(Session::begin());
        self.focus.set_duck_volume(self.hooks.audio_duck_volume());
        self.presentation.set_enabled(true);
    }

    /// Playing, or on the way to playing
    fn is_playing(&self) -> bool {
        match self.state {
            PlaybackState::Playing => true,
            PlaybackState::Preparing => !self.start_paused,
            PlaybackState::Seeking => self.paused_for_seek,
            _ => false,
        }
    }

    fn start_progress(&mut self) {
        self.clock.start();
        self.ticker.start();
    }

    fn stop_progress(&mut self) {
        self.ticker.stop();
        self.clock.stop();
    }

    fn current_position(&self) -> u64 {
        self.clock.position(self.renderer())
    }

    fn next_handle(&mut self, id: RendererId) -> MediaStatusHandle {
        self.epoch += 1;
        MediaStatusHandle::new(id, self.epoch, self.mailbox.clone())
    }

    fn renderer(&self) -> Option<&dyn Renderer> {
        self.active.and_then(|id| self.registry.get(id))
    }

    fn with_renderer(&mut self, action: impl FnOnce(&mut dyn Renderer)) {
        if let Some(renderer) = self.active.and_then(|id| self.registry.get_mut(id)) {
            action(renderer);
        }
    }

    fn apply_playlist_update(&mut self, update: PlaylistUpdate) {
        match update {
            PlaylistUpdate::Load {
                playlist_id,
                source,
                start_index,
            } => {
                if self.state != PlaybackState::Stopped {
                    self.stop();
                }
                self.cursor.set_playlist(playlist_id, source, start_index);
                info!(
                    "Loaded playlist {:?} with {} items",
                    playlist_id,
                    self.cursor.count()
                );
                self.publish_item_change(self.cursor.current_item());
            }
            PlaylistUpdate::SetIndex(index) => {
                self.cursor.set_index(index);
                self.follow_cursor();
            }
            PlaylistUpdate::SetCurrentItem(id) => {
                if self.cursor.set_current_item(id) {
                    self.follow_cursor();
                } else {
                    debug!("Unknown item {} ignored", id);
                }
            }
        }
    }

    /// After a host cursor move: restart playback when a session runs
    fn follow_cursor(&mut self) {
        if self.state == PlaybackState::Stopped {
            self.publish_item_change(self.cursor.current_item());
            return;
        }

        self.seek_to_ms = 0;
        self.start_paused = !self.is_playing();
        self.start_item_playback();
    }

    fn refresh_status(&self) {
        let status = PlaybackStatus {
            state: self.state,
            current_item: self.current_item.clone(),
            progress: self.progress,
            has_next: self.cursor.has_next(),
            has_previous: self.cursor.has_previous(),
            focus: self.focus.current(),
            wake_held: self.wake.is_held(),
            renderer: self
                .active
                .and_then(|id| self.registry.name(id))
                .map(str::to_string),
            session_id: self.session_id(),
        };

        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }
}

impl std::fmt::Debug for PlaybackStateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackStateMachine")
            .field("state", &self.state)
            .field("cursor", &self.cursor)
            .field("registry", &self.registry)
            .field("active", &self.active)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}
