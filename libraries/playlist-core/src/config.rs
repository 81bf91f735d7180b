//! Coordinator configuration
//!
//! Values come from built-in defaults, then an optional TOML file, then
//! `PLAYLIST_`-prefixed environment variables.

use crate::error::{CoordinatorError, Result};
use crate::types::MediaType;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix (`PLAYLIST_PROGRESS_INTERVAL_MS=100`)
pub const ENV_PREFIX: &str = "PLAYLIST";

/// Audio items get one extra prepare attempt before the session fails
pub const MAX_RETRY_COUNT: u32 = 1;

/// Configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Progress ticker period in milliseconds (default: 33, roughly 30 Hz)
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Volume applied while another source ducks us (default: 0.1)
    #[serde(default = "default_duck_volume")]
    pub duck_volume: f32,

    /// Allowed-type mask for newly created cursors (default: audio)
    #[serde(default = "default_allowed_types")]
    pub allowed_types: MediaType,

    /// Icon handed to the presentation sink once at startup
    #[serde(default)]
    pub app_icon: Option<String>,

    /// Opaque target attached to presentation updates
    #[serde(default)]
    pub notification_click_target: Option<String>,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            progress_interval_ms: default_progress_interval_ms(),
            duck_volume: default_duck_volume(),
            allowed_types: default_allowed_types(),
            app_icon: None,
            notification_click_target: None,
        }
    }
}

impl PlaybackConfig {
    /// Load configuration from an optional file and the environment
    ///
    /// A path that is given must exist. Environment variables override file
    /// values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(
            path,
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
    }

    fn load_with(path: Option<&Path>, environment: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path).required(true));
        }

        settings = settings.add_source(environment);

        let config = settings
            .build()
            .map_err(|e| CoordinatorError::Config(e.to_string()))?;

        let loaded: Self = config
            .try_deserialize()
            .map_err(|e| CoordinatorError::Config(e.to_string()))?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval_ms == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "progress_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.duck_volume) {
            return Err(CoordinatorError::InvalidConfig(format!(
                "duck_volume must be within 0.0..=1.0, got {}",
                self.duck_volume
            )));
        }

        Ok(())
    }

    /// Ticker period
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.max(1))
    }
}

// Default values
fn default_progress_interval_ms() -> u64 {
    33
}

fn default_duck_volume() -> f32 {
    0.1
}

fn default_allowed_types() -> MediaType {
    MediaType::AUDIO
}
