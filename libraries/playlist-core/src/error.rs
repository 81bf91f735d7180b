//! Error types for playlist coordination

use thiserror::Error;

/// Coordinator errors
///
/// Renderer failures are not represented here: they travel through the
/// engine queue as [`MediaEvent::Error`](crate::MediaEvent::Error) and end
/// up as state transitions.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The engine thread has shut down and no longer accepts work
    #[error("Playback engine has stopped")]
    EngineStopped,

    /// The engine thread could not be spawned
    #[error("Failed to spawn playback engine: {0}")]
    Spawn(#[from] std::io::Error),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration was loaded but holds unusable values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A string command did not name a known action
    #[error("Unknown command action: {0}")]
    UnknownAction(String),

    /// A string command was missing a required extra
    #[error("Command {action} requires `{field}`")]
    MissingExtra {
        /// Action name as received
        action: String,
        /// Name of the missing extra
        field: &'static str,
    },
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, CoordinatorError>;
