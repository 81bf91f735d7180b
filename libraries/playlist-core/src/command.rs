//! Remote command surface
//!
//! Inside the engine commands are a tagged enum. Host components that encode
//! commands as strings (notification buttons, media keys, IPC) use the
//! action names in [`actions`] plus [`CommandExtras`].

use crate::error::{CoordinatorError, Result};
use crate::types::MediaType;
use serde::{Deserialize, Serialize};

/// Action names of the string surface
pub mod actions {
    pub const START: &str = "START";
    pub const PLAY_PAUSE: &str = "PLAY_PAUSE";
    pub const NEXT: &str = "NEXT";
    pub const PREVIOUS: &str = "PREVIOUS";
    pub const STOP: &str = "STOP";
    pub const REPEAT: &str = "REPEAT";
    pub const SHUFFLE: &str = "SHUFFLE";
    pub const SEEK_STARTED: &str = "SEEK_STARTED";
    pub const SEEK_ENDED: &str = "SEEK_ENDED";
    pub const ALLOWED_TYPE_CHANGED: &str = "ALLOWED_TYPE_CHANGED";
    pub const UPDATE_PRESENTATION: &str = "UPDATE_PRESENTATION";
}

/// Command accepted by the engine
///
/// Serialized with an `action` tag, e.g.
/// `{"action":"SEEK_ENDED","seek_position":30000}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteCommand {
    /// Begin a session with the cursor's current item
    Start {
        /// Position to start from, in milliseconds
        #[serde(default)]
        seek_position: u64,
        /// Prepare the item but stay paused
        #[serde(default)]
        start_paused: bool,
    },

    /// Toggle between playing and paused
    PlayPause,

    Next,

    Previous,

    /// End the session
    Stop,

    /// Extension hook
    Repeat,

    /// Extension hook
    Shuffle,

    /// The user started dragging a seek bar
    SeekStarted,

    /// The user released a seek bar
    SeekEnded {
        /// Target position in milliseconds
        seek_position: u64,
    },

    /// Replace the allowed-type mask
    AllowedTypeChanged {
        /// New mask
        mask: MediaType,
    },

    /// Push the current state to the presentation sink again
    UpdatePresentation,
}

/// Typed extras of the string surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandExtras {
    #[serde(default)]
    pub seek_position: Option<u64>,

    #[serde(default)]
    pub start_paused: Option<bool>,

    #[serde(default)]
    pub mask: Option<u32>,
}

impl RemoteCommand {
    /// START from the beginning, playing
    pub const START: Self = Self::Start {
        seek_position: 0,
        start_paused: false,
    };

    /// Decode a string action with its extras
    pub fn from_action(action: &str, extras: &CommandExtras) -> Result<Self> {
        let command = match action {
            actions::START => Self::Start {
                seek_position: extras.seek_position.unwrap_or(0),
                start_paused: extras.start_paused.unwrap_or(false),
            },
            actions::PLAY_PAUSE => Self::PlayPause,
            actions::NEXT => Self::Next,
            actions::PREVIOUS => Self::Previous,
            actions::STOP => Self::Stop,
            actions::REPEAT => Self::Repeat,
            actions::SHUFFLE => Self::Shuffle,
            actions::SEEK_STARTED => Self::SeekStarted,
            actions::SEEK_ENDED => Self::SeekEnded {
                seek_position: extras.seek_position.ok_or_else(|| {
                    CoordinatorError::MissingExtra {
                        action: action.to_string(),
                        field: "seek_position",
                    }
                })?,
            },
            actions::ALLOWED_TYPE_CHANGED => Self::AllowedTypeChanged {
                mask: extras
                    .mask
                    .map(MediaType::from_bits)
                    .ok_or_else(|| CoordinatorError::MissingExtra {
                        action: action.to_string(),
                        field: "mask",
                    })?,
            },
            actions::UPDATE_PRESENTATION => Self::UpdatePresentation,
            unknown => return Err(CoordinatorError::UnknownAction(unknown.to_string())),
        };

        Ok(command)
    }

    /// Action name of the string surface
    pub fn action(&self) -> &'static str {
        match self {
            Self::Start { .. } => actions::START,
            Self::PlayPause => actions::PLAY_PAUSE,
            Self::Next => actions::NEXT,
            Self::Previous => actions::PREVIOUS,
            Self::Stop => actions::STOP,
            Self::Repeat => actions::REPEAT,
            Self::Shuffle => actions::SHUFFLE,
            Self::SeekStarted => actions::SEEK_STARTED,
            Self::SeekEnded { .. } => actions::SEEK_ENDED,
            Self::AllowedTypeChanged { .. } => actions::ALLOWED_TYPE_CHANGED,
            Self::UpdatePresentation => actions::UPDATE_PRESENTATION,
        }
    }

    /// Extras needed to rebuild this command with [`from_action`](Self::from_action)
    pub fn extras(&self) -> CommandExtras {
        match *self {
            Self::Start {
                seek_position,
                start_paused,
            } => CommandExtras {
                seek_position: Some(seek_position),
                start_paused: Some(start_paused),
                mask: None,
            },
            Self::SeekEnded { seek_position } => CommandExtras {
                seek_position: Some(seek_position),
                ..CommandExtras::default()
            },
            Self::AllowedTypeChanged { mask } => CommandExtras {
                mask: Some(mask.bits()),
                ..CommandExtras::default()
            },
            _ => CommandExtras::default(),
        }
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.action())
    }
}
