//! Renderer contract and registry
//!
//! Renderers are the external capability that actually plays media: a local
//! audio output, a video surface, a cast device. The coordinator drives them
//! through [`Renderer`] and receives their lifecycle callbacks as
//! [`MediaEvent`]s posted into the engine queue.

use crate::engine::{EngineMessage, Mailbox};
use crate::types::{PlaylistItem, RemoteConnectionState};
use serde::{Deserialize, Serialize};

/// Position of a renderer in its registry
///
/// Lower ids have higher priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RendererId(pub usize);

/// Lifecycle callback of a renderer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaEvent {
    /// Preparation finished; playback can start
    Prepared,

    /// The item played to its end
    Completed,

    /// Preparation or playback failed
    Error {
        /// Renderer-specific description
        message: String,
    },

    /// A seek finished
    SeekComplete,

    /// Buffered percentage changed
    BufferingUpdate(u8),

    /// A remote renderer's connection changed
    RemoteConnectionChanged(RemoteConnectionState),

    /// A remote renderer reported new metadata for the current item
    MediaInfoChanged,
}

impl MediaEvent {
    /// Whether the event belongs to a prepare/seek operation and must match
    /// the current epoch
    pub fn is_lifecycle(&self) -> bool {
        !matches!(
            self,
            Self::RemoteConnectionChanged(_) | Self::MediaInfoChanged
        )
    }
}

/// Where a renderer posts its [`MediaEvent`]s
///
/// Every prepare and every seek hands the renderer a fresh handle tagged with
/// a new epoch. Renderers should post the completion of an operation through
/// the handle that was current when the operation was issued; completions of
/// superseded operations are then discarded by the engine.
#[derive(Debug, Clone)]
pub struct MediaStatusHandle {
    renderer: RendererId,
    epoch: u64,
    mailbox: Mailbox,
}

impl MediaStatusHandle {
    pub(crate) fn new(renderer: RendererId, epoch: u64, mailbox: Mailbox) -> Self {
        Self {
            renderer,
            epoch,
            mailbox,
        }
    }

    /// Post an event to the engine
    ///
    /// Returns false once the engine has shut down.
    pub fn post(&self, event: MediaEvent) -> bool {
        self.mailbox
            .send(EngineMessage::Media {
                renderer: self.renderer,
                epoch: self.epoch,
                event,
            })
            .is_ok()
    }

    /// Renderer this handle belongs to
    pub fn renderer(&self) -> RendererId {
        self.renderer
    }

    /// Epoch the handle was issued with
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

/// A media renderer
///
/// All methods are called from the engine thread. Long operations
/// (`play_item`, `seek_to`) must return immediately and report completion
/// through the [`MediaStatusHandle`].
pub trait Renderer: Send {
    /// Short name for logs and status snapshots
    fn name(&self) -> &str;

    /// Whether this renderer wants to play `item`
    ///
    /// Remote renderers claim every item while connected, which gives them
    /// precedence over local renderers registered after them.
    fn claims(&self, item: &PlaylistItem) -> bool;

    /// Begin preparing `item` from `uri`; post [`MediaEvent::Prepared`] when ready
    fn play_item(&mut self, item: &PlaylistItem, uri: &str);

    fn play(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    /// Drop the current item; pending operations must not complete afterwards
    fn reset(&mut self);

    /// Release every resource held by the renderer
    fn release(&mut self);

    /// Set channel volumes, each within `0.0..=1.0`
    fn set_volume(&mut self, left: f32, right: f32);

    /// Begin seeking; post [`MediaEvent::SeekComplete`] when done
    fn seek_to(&mut self, position_ms: u64);

    /// Position in milliseconds (0 if not prepared)
    fn current_position(&self) -> u64;

    /// Duration in milliseconds (0 if not prepared or unknown)
    fn duration(&self) -> u64;

    /// Buffered percentage (0-100)
    fn buffered_percent(&self) -> u8 {
        0
    }

    /// Remote renderers manage audio focus on their own device
    fn handles_own_audio_focus(&self) -> bool {
        false
    }

    /// Install the handle future events are posted through
    fn set_media_status_listener(&mut self, handle: MediaStatusHandle);
}

/// Ordered set of renderers
///
/// Selection returns the first renderer that claims an item, so the
/// registration order is the priority order.
#[derive(Default)]
pub struct RendererRegistry {
    renderers: Vec<Box<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a renderer (lowest priority so far)
    pub fn register(&mut self, renderer: impl Renderer + 'static) -> RendererId {
        self.renderers.push(Box::new(renderer));
        RendererId(self.renderers.len() - 1)
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with(mut self, renderer: impl Renderer + 'static) -> Self {
        self.register(renderer);
        self
    }

    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// First renderer that claims `item`
    pub fn select(&self, item: &PlaylistItem) -> Option<RendererId> {
        self.renderers
            .iter()
            .position(|renderer| renderer.claims(item))
            .map(RendererId)
    }

    pub fn get(&self, id: RendererId) -> Option<&dyn Renderer> {
        self.renderers.get(id.0).map(|renderer| &**renderer)
    }

    pub fn get_mut(&mut self, id: RendererId) -> Option<&mut (dyn Renderer + 'static)> {
        self.renderers.get_mut(id.0).map(|renderer| &mut **renderer)
    }

    /// Name of the renderer with `id`
    pub fn name(&self, id: RendererId) -> Option<&str> {
        self.get(id).map(|renderer| renderer.name())
    }

    pub(crate) fn iter_mut(
        &mut self,
    ) -> impl Iterator<Item = (RendererId, &mut (dyn Renderer + 'static))> {
        self.renderers
            .iter_mut()
            .enumerate()
            .map(|(index, renderer)| (RendererId(index), &mut **renderer))
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.renderers.iter().map(|renderer| renderer.name()))
            .finish()
    }
}
