//! Playback events
//!
//! Fan-out of coordinator output to observers. There are three independent
//! listener sets:
//! - Playlist changes (current item, has next/previous)
//! - Playback state changes
//! - Progress updates (periodic, while playing)
//!
//! Listeners are held weakly and registered through a [`Subscription`]
//! token; dropping either the listener or the token unregisters it. Dead
//! entries are pruned while publishing. Callbacks run in registration order
//! and a callback returning `true` ("consumed") stops delivery of that event.

use crate::types::{ItemChange, MediaProgress, PlaybackState, PlaylistItem};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::warn;

/// Observer of current-item changes
pub trait PlaylistListener: Send + Sync {
    /// Return true to stop delivery to later listeners
    fn on_playlist_item_changed(&self, change: &ItemChange) -> bool;
}

/// Observer of playback state changes
pub trait StateListener: Send + Sync {
    /// Return true to stop delivery to later listeners
    fn on_playback_state_changed(&self, state: PlaybackState) -> bool;
}

/// Observer of progress updates
pub trait ProgressListener: Send + Sync {
    /// Return true to stop delivery to later listeners
    fn on_progress_updated(&self, progress: &MediaProgress) -> bool;
}

/// Serializable form of everything the bus publishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// Playback state changed
    StateChanged {
        /// The new state
        state: PlaybackState,
    },

    /// Current item changed
    ItemChanged {
        /// The new item (`None` when the playlist is exhausted)
        item: Option<PlaylistItem>,
        has_next: bool,
        has_previous: bool,
    },

    /// Periodic progress
    Progress {
        position_ms: u64,
        duration_ms: u64,
        buffered_percent: u8,
    },
}

impl From<&ItemChange> for PlaybackEvent {
    fn from(change: &ItemChange) -> Self {
        Self::ItemChanged {
            item: change.item.clone(),
            has_next: change.has_next,
            has_previous: change.has_previous,
        }
    }
}

impl From<&MediaProgress> for PlaybackEvent {
    fn from(progress: &MediaProgress) -> Self {
        Self::Progress {
            position_ms: progress.position_ms,
            duration_ms: progress.duration_ms,
            buffered_percent: progress.buffered_percent,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum ListenerKind {
    Playlist,
    State,
    Progress,
}

struct ListenerSet<L: ?Sized> {
    entries: Vec<(u64, Weak<L>)>,
}

impl<L: ?Sized> ListenerSet<L> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn insert(&mut self, id: u64, listener: Weak<L>) {
        self.entries.push((id, listener));
    }

    fn remove(&mut self, id: u64) {
        self.entries.retain(|(entry, _)| *entry != id);
    }

    /// Live listeners in registration order; prunes dead entries
    fn snapshot(&mut self) -> Vec<Arc<L>> {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|(_, weak)| match weak.upgrade() {
            Some(listener) => {
                live.push(listener);
                true
            }
            None => false,
        });
        live
    }

    fn has_live(&self) -> bool {
        self.entries.iter().any(|(_, weak)| weak.strong_count() > 0)
    }
}

struct BusInner {
    next_id: u64,
    playlist: ListenerSet<dyn PlaylistListener>,
    state: ListenerSet<dyn StateListener>,
    progress: ListenerSet<dyn ProgressListener>,

    /// Signalled when a progress listener subscribes
    progress_wakeup: Option<Sender<()>>,
}

impl BusInner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, kind: ListenerKind, id: u64) {
        match kind {
            ListenerKind::Playlist => self.playlist.remove(id),
            ListenerKind::State => self.state.remove(id),
            ListenerKind::Progress => self.progress.remove(id),
        }
    }
}

/// Registration token; dropping it unregisters the listener
#[must_use = "dropping a Subscription unregisters the listener"]
pub struct Subscription {
    bus: Weak<Mutex<BusInner>>,
    kind: ListenerKind,
    id: u64,
}

impl Subscription {
    /// Keep the listener registered for as long as it is alive
    pub fn detach(mut self) {
        self.bus = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.bus.upgrade() {
            lock(&inner).remove(self.kind, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

/// Shared listener registry
///
/// Cloning yields another handle to the same registry, so observers can
/// subscribe from any thread while the engine publishes.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                playlist: ListenerSet::new(),
                state: ListenerSet::new(),
                progress: ListenerSet::new(),
                progress_wakeup: None,
            })),
        }
    }

    // ===== Registration =====

    pub fn subscribe_playlist<L: PlaylistListener + 'static>(
        &self,
        listener: &Arc<L>,
    ) -> Subscription {
        let weak: Weak<L> = Arc::downgrade(listener);
        let mut inner = lock(&self.inner);
        let id = inner.next_id();
        inner.playlist.insert(id, weak);
        self.subscription(ListenerKind::Playlist, id)
    }

    pub fn subscribe_state<L: StateListener + 'static>(&self, listener: &Arc<L>) -> Subscription {
        let weak: Weak<L> = Arc::downgrade(listener);
        let mut inner = lock(&self.inner);
        let id = inner.next_id();
        inner.state.insert(id, weak);
        self.subscription(ListenerKind::State, id)
    }

    pub fn subscribe_progress<L: ProgressListener + 'static>(
        &self,
        listener: &Arc<L>,
    ) -> Subscription {
        let weak: Weak<L> = Arc::downgrade(listener);
        let mut inner = lock(&self.inner);
        let id = inner.next_id();
        inner.progress.insert(id, weak);
        if let Some(wakeup) = &inner.progress_wakeup {
            // A full channel already holds a pending wakeup
            wakeup.try_send(()).ok();
        }
        self.subscription(ListenerKind::Progress, id)
    }

    /// Signal `wakeup` whenever a progress listener subscribes
    ///
    /// The engine selects on the receiving end so a halted ticker restarts
    /// without waiting for unrelated work.
    pub(crate) fn notify_progress_subscriptions(&self, wakeup: Sender<()>) {
        lock(&self.inner).progress_wakeup = Some(wakeup);
    }

    /// Subscribe a channel to all three listener sets
    pub fn event_stream(&self) -> EventStream {
        let (sender, receiver) = unbounded();
        let listener = Arc::new(ChannelListener { sender });
        let subscriptions = vec![
            self.subscribe_playlist(&listener),
            self.subscribe_state(&listener),
            self.subscribe_progress(&listener),
        ];

        EventStream {
            _listener: listener,
            receiver,
            _subscriptions: subscriptions,
        }
    }

    /// Whether any progress listener is still alive
    pub fn has_progress_listeners(&self) -> bool {
        lock(&self.inner).progress.has_live()
    }

    // ===== Publication =====

    /// Returns the number of listeners that received the change
    pub fn publish_item_change(&self, change: &ItemChange) -> usize {
        let listeners = lock(&self.inner).playlist.snapshot();
        deliver(&listeners, |listener| listener.on_playlist_item_changed(change))
    }

    /// Returns the number of listeners that received the state
    pub fn publish_state(&self, state: PlaybackState) -> usize {
        let listeners = lock(&self.inner).state.snapshot();
        deliver(&listeners, |listener| listener.on_playback_state_changed(state))
    }

    /// Returns the number of listeners that received the progress
    pub fn publish_progress(&self, progress: &MediaProgress) -> usize {
        let listeners = lock(&self.inner).progress.snapshot();
        deliver(&listeners, |listener| listener.on_progress_updated(progress))
    }

    fn subscription(&self, kind: ListenerKind, id: u64) -> Subscription {
        Subscription {
            bus: Arc::downgrade(&self.inner),
            kind,
            id,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(inner: &Mutex<BusInner>) -> MutexGuard<'_, BusInner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Invoke listeners outside the bus lock, stopping at the first consumer
fn deliver<L: ?Sized>(listeners: &[Arc<L>], mut call: impl FnMut(&L) -> bool) -> usize {
    let mut delivered = 0;

    for listener in listeners {
        delivered += 1;
        match catch_unwind(AssertUnwindSafe(|| call(&**listener))) {
            Ok(true) => break,
            Ok(false) => {}
            Err(_) => warn!("Listener panicked; continuing delivery"),
        }
    }

    delivered
}

/// Forwards bus traffic into a channel
struct ChannelListener {
    sender: Sender<PlaybackEvent>,
}

impl PlaylistListener for ChannelListener {
    fn on_playlist_item_changed(&self, change: &ItemChange) -> bool {
        self.sender.send(change.into()).ok();
        false
    }
}

impl StateListener for ChannelListener {
    fn on_playback_state_changed(&self, state: PlaybackState) -> bool {
        self.sender.send(PlaybackEvent::StateChanged { state }).ok();
        false
    }
}

impl ProgressListener for ChannelListener {
    fn on_progress_updated(&self, progress: &MediaProgress) -> bool {
        self.sender.send(progress.into()).ok();
        false
    }
}

/// Receiving end of [`EventBus::event_stream`]; dropping it unsubscribes
pub struct EventStream {
    _listener: Arc<ChannelListener>,
    receiver: Receiver<PlaybackEvent>,
    _subscriptions: Vec<Subscription>,
}

impl EventStream {
    pub fn receiver(&self) -> &Receiver<PlaybackEvent> {
        &self.receiver
    }

    pub fn try_recv(&self) -> Option<PlaybackEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<PlaybackEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything received so far
    pub fn drain(&self) -> Vec<PlaybackEvent> {
        self.receiver.try_iter().collect()
    }
}
