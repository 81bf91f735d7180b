//! Shared test doubles for the integration tests
//!
//! Every double records what the coordinator did to it behind an
//! `Arc<Mutex<..>>`, so tests keep a probe after handing the double over.

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use playlist_core::{
    mailbox, AudioFocusProvider, Collaborators, EngineMessage, HostHooks, ItemChange,
    MediaEvent, MediaProgress, MediaStatusHandle, MediaType, NetworkWakeLock, PlaybackConfig,
    PlaybackState, PlaybackStateMachine, PlaylistCursor, PlaylistItem, PlaylistListener,
    PresentationSink, PresentationUpdate, ProgressListener, RemoteCommand, Renderer,
    RendererRegistry, StateListener, Subscription,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub const PLAYLIST: u64 = 7;

// ===== Items =====

pub fn audio(id: u64) -> PlaylistItem {
    PlaylistItem::new(
        id,
        PLAYLIST,
        MediaType::AUDIO,
        format!("https://media.test/{id}.mp3"),
    )
    .with_title(format!("Track {id}"))
}

pub fn video(id: u64) -> PlaylistItem {
    PlaylistItem::new(
        id,
        PLAYLIST,
        MediaType::VIDEO,
        format!("https://media.test/{id}.mp4"),
    )
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

// ===== Renderer =====

/// Something the coordinator asked a renderer to do
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PlayItem { id: u64, uri: String },
    Play,
    Pause,
    Stop,
    Reset,
    Release,
    Volume(f32),
    SeekTo(u64),
}

#[derive(Default)]
struct RendererState {
    calls: Vec<Call>,
    handles: Vec<MediaStatusHandle>,
    position_ms: u64,
    duration_ms: u64,
    connected: bool,
}

/// Test-side view of a [`MockRenderer`]
#[derive(Clone, Default)]
pub struct RendererProbe(Arc<Mutex<RendererState>>);

impl RendererProbe {
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.0).calls.clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.0).calls.clear();
    }

    pub fn count(&self, call: &Call) -> usize {
        lock(&self.0).calls.iter().filter(|c| *c == call).count()
    }

    /// Ids of every item the renderer was asked to prepare
    pub fn prepared(&self) -> Vec<u64> {
        lock(&self.0)
            .calls
            .iter()
            .filter_map(|call| match call {
                Call::PlayItem { id, .. } => Some(*id),
                _ => None,
            })
            .collect()
    }

    pub fn last_uri(&self) -> Option<String> {
        lock(&self.0).calls.iter().rev().find_map(|call| match call {
            Call::PlayItem { uri, .. } => Some(uri.clone()),
            _ => None,
        })
    }

    pub fn last_volume(&self) -> Option<f32> {
        lock(&self.0).calls.iter().rev().find_map(|call| match call {
            Call::Volume(volume) => Some(*volume),
            _ => None,
        })
    }

    /// Number of handles received so far
    pub fn handle_count(&self) -> usize {
        lock(&self.0).handles.len()
    }

    /// Handle received `index`-th
    pub fn handle(&self, index: usize) -> MediaStatusHandle {
        lock(&self.0).handles[index].clone()
    }

    /// Post through the latest handle
    pub fn post(&self, event: MediaEvent) {
        let handle = lock(&self.0).handles.last().cloned().unwrap();
        assert!(handle.post(event));
    }

    pub fn set_position(&self, position_ms: u64) {
        lock(&self.0).position_ms = position_ms;
    }

    pub fn set_duration(&self, duration_ms: u64) {
        lock(&self.0).duration_ms = duration_ms;
    }

    pub fn set_connected(&self, connected: bool) {
        lock(&self.0).connected = connected;
    }
}

/// Scripted renderer
///
/// Local renderers claim one media type. Remote renderers claim anything
/// while connected and manage audio focus themselves.
pub struct MockRenderer {
    name: &'static str,
    media_type: MediaType,
    remote: bool,
    probe: RendererProbe,
}

impl MockRenderer {
    pub fn audio(name: &'static str) -> (Self, RendererProbe) {
        Self::build(name, MediaType::AUDIO, false)
    }

    pub fn video(name: &'static str) -> (Self, RendererProbe) {
        Self::build(name, MediaType::VIDEO, false)
    }

    pub fn remote(name: &'static str) -> (Self, RendererProbe) {
        Self::build(name, MediaType::ANY, true)
    }

    fn build(name: &'static str, media_type: MediaType, remote: bool) -> (Self, RendererProbe) {
        let probe = RendererProbe::default();
        let renderer = Self {
            name,
            media_type,
            remote,
            probe: probe.clone(),
        };
        (renderer, probe)
    }

    fn record(&self, call: Call) {
        lock(&self.probe.0).calls.push(call);
    }
}

impl Renderer for MockRenderer {
    fn name(&self) -> &str {
        self.name
    }

    fn claims(&self, item: &PlaylistItem) -> bool {
        if self.remote && !lock(&self.probe.0).connected {
            return false;
        }
        item.media_type.intersects(self.media_type)
    }

    fn play_item(&mut self, item: &PlaylistItem, uri: &str) {
        self.record(Call::PlayItem {
            id: item.id,
            uri: uri.to_string(),
        });
    }

    fn play(&mut self) {
        self.record(Call::Play);
    }

    fn pause(&mut self) {
        self.record(Call::Pause);
    }

    fn stop(&mut self) {
        self.record(Call::Stop);
    }

    fn reset(&mut self) {
        self.record(Call::Reset);
    }

    fn release(&mut self) {
        self.record(Call::Release);
    }

    fn set_volume(&mut self, left: f32, _right: f32) {
        self.record(Call::Volume(left));
    }

    fn seek_to(&mut self, position_ms: u64) {
        lock(&self.probe.0).position_ms = position_ms;
        self.record(Call::SeekTo(position_ms));
    }

    fn current_position(&self) -> u64 {
        lock(&self.probe.0).position_ms
    }

    fn duration(&self) -> u64 {
        lock(&self.probe.0).duration_ms
    }

    fn handles_own_audio_focus(&self) -> bool {
        self.remote
    }

    fn set_media_status_listener(&mut self, handle: MediaStatusHandle) {
        lock(&self.probe.0).handles.push(handle);
    }
}

// ===== Host Hooks =====

/// Notification the coordinator sent to the host
#[derive(Debug, Clone, PartialEq)]
pub enum HookEvent {
    NoOfflineItems,
    SessionEnded,
    ItemSkipped(u64),
    RendererChanged(Option<String>, Option<String>),
    PlaybackStarted(u64),
    PlaybackEnded(u64),
    PlaybackStopped(u64),
    PlaylistEnded,
    Repeat,
    Shuffle,
}

struct HookState {
    network: bool,
    downloaded: HashSet<u64>,
    events: Vec<HookEvent>,
}

#[derive(Clone)]
pub struct HooksProbe(Arc<Mutex<HookState>>);

impl Default for HooksProbe {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(HookState {
            network: true,
            downloaded: HashSet::new(),
            events: Vec::new(),
        })))
    }
}

impl HooksProbe {
    pub fn set_network(&self, available: bool) {
        lock(&self.0).network = available;
    }

    pub fn mark_downloaded(&self, id: u64) {
        lock(&self.0).downloaded.insert(id);
    }

    pub fn events(&self) -> Vec<HookEvent> {
        lock(&self.0).events.clone()
    }

    pub fn saw(&self, event: &HookEvent) -> bool {
        lock(&self.0).events.contains(event)
    }

    fn push(&self, event: HookEvent) {
        lock(&self.0).events.push(event);
    }
}

pub struct RecordingHooks(pub HooksProbe);

impl HostHooks for RecordingHooks {
    fn is_network_available(&self) -> bool {
        lock(&self.0 .0).network
    }

    fn is_downloaded(&self, item: &PlaylistItem) -> bool {
        lock(&self.0 .0).downloaded.contains(&item.id)
    }

    fn audio_duck_volume(&self) -> f32 {
        0.2
    }

    fn on_no_offline_items_available(&self) {
        self.0.push(HookEvent::NoOfflineItems);
    }

    fn on_session_ended(&self) {
        self.0.push(HookEvent::SessionEnded);
    }

    fn on_item_skipped(&self, item: &PlaylistItem) {
        self.0.push(HookEvent::ItemSkipped(item.id));
    }

    fn on_renderer_changed(&self, previous: Option<&str>, current: Option<&str>) {
        self.0.push(HookEvent::RendererChanged(
            previous.map(str::to_string),
            current.map(str::to_string),
        ));
    }

    fn on_playback_started(&self, item: &PlaylistItem, _position_ms: u64, _duration_ms: u64) {
        self.0.push(HookEvent::PlaybackStarted(item.id));
    }

    fn on_playback_ended(&self, item: &PlaylistItem, _position_ms: u64, _duration_ms: u64) {
        self.0.push(HookEvent::PlaybackEnded(item.id));
    }

    fn on_playback_stopped(&self, item: &PlaylistItem) {
        self.0.push(HookEvent::PlaybackStopped(item.id));
    }

    fn on_playlist_ended(&self) {
        self.0.push(HookEvent::PlaylistEnded);
    }

    fn on_repeat(&self) {
        self.0.push(HookEvent::Repeat);
    }

    fn on_shuffle(&self) {
        self.0.push(HookEvent::Shuffle);
    }
}

// ===== Focus / Wake =====

#[derive(Default)]
pub struct MockFocus {
    pub deny: AtomicBool,
    pub requests: AtomicUsize,
    pub abandons: AtomicUsize,
}

impl AudioFocusProvider for MockFocus {
    fn request_focus(&self) -> bool {
        self.requests.fetch_add(1, Ordering::SeqCst);
        !self.deny.load(Ordering::SeqCst)
    }

    fn abandon_focus(&self) {
        self.abandons.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockWake {
    pub held: AtomicBool,
    pub acquisitions: AtomicUsize,
}

impl NetworkWakeLock for MockWake {
    fn acquire(&self) {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
    }

    fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

// ===== Presentation =====

#[derive(Default)]
pub struct PresentationState {
    pub enabled: bool,
    pub base: Option<String>,
    pub updates: Vec<PresentationUpdate>,
    pub released: bool,
}

#[derive(Clone, Default)]
pub struct PresentationProbe(pub Arc<Mutex<PresentationState>>);

impl PresentationProbe {
    pub fn state(&self) -> MutexGuard<'_, PresentationState> {
        lock(&self.0)
    }

    pub fn last(&self) -> Option<PresentationUpdate> {
        lock(&self.0).updates.last().cloned()
    }
}

pub struct RecordingPresentation(pub PresentationProbe);

impl PresentationSink for RecordingPresentation {
    fn set_enabled(&mut self, enabled: bool) {
        self.0.state().enabled = enabled;
    }

    fn set_base(&mut self, app_icon: &str) {
        self.0.state().base = Some(app_icon.to_string());
    }

    fn update(&mut self, update: &PresentationUpdate) {
        self.0.state().updates.push(update.clone());
    }

    fn release(&mut self) {
        self.0.state().released = true;
    }
}

// ===== Listeners =====

/// Records every publication of the bus
#[derive(Default)]
pub struct Recorder {
    pub states: Mutex<Vec<PlaybackState>>,
    pub items: Mutex<Vec<ItemChange>>,
    pub progress: Mutex<Vec<MediaProgress>>,
}

impl Recorder {
    pub fn states(&self) -> Vec<PlaybackState> {
        lock(&self.states).clone()
    }

    pub fn items(&self) -> Vec<ItemChange> {
        lock(&self.items).clone()
    }

    pub fn progress(&self) -> Vec<MediaProgress> {
        lock(&self.progress).clone()
    }
}

impl StateListener for Recorder {
    fn on_playback_state_changed(&self, state: PlaybackState) -> bool {
        lock(&self.states).push(state);
        false
    }
}

impl PlaylistListener for Recorder {
    fn on_playlist_item_changed(&self, change: &ItemChange) -> bool {
        lock(&self.items).push(change.clone());
        false
    }
}

impl ProgressListener for Recorder {
    fn on_progress_updated(&self, progress: &MediaProgress) -> bool {
        lock(&self.progress).push(*progress);
        false
    }
}

// ===== Harness =====

/// A state machine driven synchronously by the test
pub struct Harness {
    pub machine: PlaybackStateMachine,
    pub inbox: Receiver<EngineMessage>,
    pub hooks: HooksProbe,
    pub focus: Arc<MockFocus>,
    pub wake: Arc<MockWake>,
    pub presentation: PresentationProbe,
    pub recorder: Arc<Recorder>,
    _subscriptions: Vec<Subscription>,
    progress_subscription: Option<Subscription>,
}

impl Harness {
    /// Machine over `items` with the cursor at index 0
    pub fn new(items: Vec<PlaylistItem>, registry: RendererRegistry) -> Self {
        Self::with_config(items, registry, PlaybackConfig::default())
    }

    pub fn with_config(
        items: Vec<PlaylistItem>,
        registry: RendererRegistry,
        config: PlaybackConfig,
    ) -> Self {
        let hooks = HooksProbe::default();
        let focus = Arc::new(MockFocus::default());
        let wake = Arc::new(MockWake::default());
        let presentation = PresentationProbe::default();

        let collaborators = Collaborators::new(&config)
            .with_focus(focus.clone())
            .with_wake(wake.clone())
            .with_presentation(RecordingPresentation(presentation.clone()))
            .with_hooks(RecordingHooks(hooks.clone()));

        let recorder = Arc::new(Recorder::default());
        let subscriptions = vec![
            collaborators.bus.subscribe_state(&recorder),
            collaborators.bus.subscribe_playlist(&recorder),
        ];
        let progress_subscription = Some(collaborators.bus.subscribe_progress(&recorder));

        let mut cursor = PlaylistCursor::empty(config.allowed_types);
        let has_items = !items.is_empty();
        cursor.set_playlist(Some(PLAYLIST), Box::new(items), 0);
        if !has_items {
            cursor.reset();
        }

        let (mailbox, inbox) = mailbox();
        let machine = PlaybackStateMachine::new(config, cursor, registry, collaborators, mailbox);

        Self {
            machine,
            inbox,
            hooks,
            focus,
            wake,
            presentation,
            recorder,
            _subscriptions: subscriptions,
            progress_subscription,
        }
    }

    /// Stop recording progress; the bus is left without progress listeners
    pub fn unsubscribe_progress(&mut self) {
        self.progress_subscription = None;
    }

    pub fn subscribe_progress(&mut self) {
        self.progress_subscription = Some(self.machine.events().subscribe_progress(&self.recorder));
    }

    /// Handle everything renderers posted so far
    pub fn pump(&mut self) {
        while let Ok(message) = self.inbox.try_recv() {
            self.machine.handle_message(message);
        }
    }

    pub fn command(&mut self, command: RemoteCommand) {
        self.machine.handle_message(EngineMessage::Command(command));
        self.pump();
    }

    pub fn send(&mut self, message: EngineMessage) {
        self.machine.handle_message(message);
        self.pump();
    }

    /// Post a renderer event through its latest handle and handle it
    pub fn renderer_event(&mut self, probe: &RendererProbe, event: MediaEvent) {
        probe.post(event);
        self.pump();
    }

    /// START and report the first item prepared
    pub fn start_playing(&mut self, probe: &RendererProbe) {
        self.command(RemoteCommand::START);
        self.renderer_event(probe, MediaEvent::Prepared);
        assert_eq!(self.machine.state(), PlaybackState::Playing);
    }

    pub fn state(&self) -> PlaybackState {
        self.machine.state()
    }

    pub fn current_id(&self) -> Option<u64> {
        self.machine.current_item().map(|item| item.id)
    }
}
