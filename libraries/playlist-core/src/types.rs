//! Core types for playlist coordination

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Identifier of a single playlist item
pub type ItemId = u64;

/// Opaque identifier of a playlist
pub type PlaylistId = u64;

/// Media type bitfield
///
/// Items carry exactly one type; cursors filter with a mask that may
/// combine several (`MediaType::AUDIO | MediaType::VIDEO`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaType(u32);

impl MediaType {
    /// Matches nothing
    pub const NONE: Self = Self(0);

    /// Audio content
    pub const AUDIO: Self = Self(1);

    /// Video content
    pub const VIDEO: Self = Self(1 << 1);

    /// Matches every type, including host-defined ones
    pub const ANY: Self = Self(u32::MAX);

    /// Wrap raw bits (host-defined types use the bits above `VIDEO`)
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// True when the two bitfields share at least one bit
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True for items whose type includes audio
    pub const fn is_audio(self) -> bool {
        self.intersects(Self::AUDIO)
    }

    /// True for items whose type includes video
    pub const fn is_video(self) -> bool {
        self.intersects(Self::VIDEO)
    }
}

impl Default for MediaType {
    fn default() -> Self {
        Self::AUDIO
    }
}

impl BitOr for MediaType {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for MediaType {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for MediaType {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// A playable media entity
///
/// Items are immutable from the coordinator's point of view. The playlist
/// they belong to is owned by the caller and read through a
/// [`PlaylistSource`](crate::PlaylistSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistItem {
    /// Item identifier, unique within its playlist
    pub id: ItemId,

    /// Playlist the item belongs to
    pub playlist_id: PlaylistId,

    /// Single media type bit (audio, video or host-defined)
    #[serde(default)]
    pub media_type: MediaType,

    /// Primary (streamed) URI
    pub media_url: String,

    /// Local copy, preferred when the host reports the item as downloaded
    #[serde(default)]
    pub downloaded_uri: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub album: Option<String>,

    #[serde(default)]
    pub artist: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    #[serde(default)]
    pub artwork_url: Option<String>,
}

impl PlaylistItem {
    /// Create an item with no metadata
    pub fn new(
        id: ItemId,
        playlist_id: PlaylistId,
        media_type: MediaType,
        media_url: impl Into<String>,
    ) -> Self {
        Self {
            id,
            playlist_id,
            media_type,
            media_url: media_url.into(),
            downloaded_uri: None,
            title: None,
            album: None,
            artist: None,
            thumbnail_url: None,
            artwork_url: None,
        }
    }

    /// Set the title
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the local copy URI
    #[must_use]
    pub fn with_downloaded_uri(mut self, uri: impl Into<String>) -> Self {
        self.downloaded_uri = Some(uri.into());
        self
    }

    /// URI a renderer should open
    ///
    /// The local copy wins when the host says the item is downloaded and one
    /// is known; otherwise the primary URI is streamed.
    pub fn playback_uri(&self, downloaded: bool) -> &str {
        match (&self.downloaded_uri, downloaded) {
            (Some(local), true) => local,
            _ => &self.media_url,
        }
    }

    /// Same identity as `other` (item id and playlist id)
    pub fn same_identity(&self, other: &Self) -> bool {
        self.id == other.id && self.playlist_id == other.playlist_id
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Resolving media before preparation (host-driven, never entered by the core)
    Retrieving,

    /// Renderer is preparing the current item
    Preparing,

    /// Currently playing
    Playing,

    /// Paused mid-item
    Paused,

    /// Renderer is seeking
    Seeking,

    /// No session
    Stopped,

    /// Session failed and waits for START, NEXT, PREVIOUS or STOP
    Error,
}

impl PlaybackState {
    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// `Preparing -> Preparing` is a restart on another item. `Stopped ->
    /// Stopped` is allowed so STOP stays idempotent; it is never republished.
    pub fn can_transition_to(self, next: Self) -> bool {
        use PlaybackState::{Error, Paused, Playing, Preparing, Seeking, Stopped};

        matches!(
            (self, next),
            (Stopped, Preparing | Stopped)
                | (Preparing, Playing | Error | Preparing | Stopped)
                | (Playing, Paused | Seeking | Preparing | Stopped | Error)
                | (Paused, Playing | Preparing | Stopped | Error)
                | (Seeking, Playing | Paused | Preparing | Stopped | Error)
                | (Error, Preparing | Stopped)
        )
    }

    /// True while a session holds a renderer (wake and focus may be held)
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Preparing | Self::Playing | Self::Paused | Self::Seeking
        )
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieving => "retrieving",
            Self::Preparing => "preparing",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Seeking => "seeking",
            Self::Stopped => "stopped",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Connection state reported by remote renderers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteConnectionState {
    NotConnected,
    Connecting,
    Connected,
}

/// Audio focus held by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFocus {
    /// Full focus, unity volume
    Focused,

    /// Another source plays on top; volume is ducked
    TransientDuck,

    /// No focus
    NoFocus,
}

/// Snapshot of playback progress
///
/// Values are clamped on construction so published progress always has
/// `position_ms <= duration_ms` (when the duration is known) and a buffer
/// percentage within `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaProgress {
    /// Position in milliseconds
    pub position_ms: u64,

    /// Buffered percentage (0-100)
    pub buffered_percent: u8,

    /// Duration in milliseconds (0 = unknown)
    pub duration_ms: u64,
}

impl MediaProgress {
    /// Build a clamped progress value
    pub fn new(position_ms: u64, buffered_percent: u8, duration_ms: u64) -> Self {
        let position_ms = if duration_ms > 0 {
            position_ms.min(duration_ms)
        } else {
            position_ms
        };

        Self {
            position_ms,
            buffered_percent: buffered_percent.min(100),
            duration_ms,
        }
    }
}

/// Published when the current item (or its neighbourhood) changes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    /// The new current item (`None` once the playlist is exhausted)
    pub item: Option<PlaylistItem>,

    /// Whether NEXT would find an allowed item
    pub has_next: bool,

    /// Whether PREVIOUS would find an allowed item
    pub has_previous: bool,
}
