//! Host environment hooks
//!
//! Predicates the coordinator asks the host (network, downloads, duck
//! volume) and notifications it sends back. Every method except
//! [`HostHooks::audio_duck_volume`] has a default.

use crate::config::PlaybackConfig;
use crate::types::PlaylistItem;

/// Host predicates and notifications
pub trait HostHooks: Send {
    /// Whether the network is usable; when false only downloaded items play
    fn is_network_available(&self) -> bool {
        true
    }

    /// Whether `item` has a usable local copy
    fn is_downloaded(&self, _item: &PlaylistItem) -> bool {
        false
    }

    /// Volume (0.0-1.0) used while another source ducks playback
    fn audio_duck_volume(&self) -> f32;

    /// Opaque value attached to presentation updates
    fn notification_click_target(&self) -> Option<String> {
        None
    }

    /// The network is gone and no downloaded item remains
    fn on_no_offline_items_available(&self) {}

    /// The session ended; the host may tear down its service
    fn on_session_ended(&self) {}

    /// No renderer claimed `item`, so it was skipped
    fn on_item_skipped(&self, _item: &PlaylistItem) {}

    /// The active renderer changed
    fn on_renderer_changed(&self, _previous: Option<&str>, _current: Option<&str>) {}

    /// `item` started playing
    fn on_playback_started(&self, _item: &PlaylistItem, _position_ms: u64, _duration_ms: u64) {}

    /// `item` stopped being the current item
    fn on_playback_ended(&self, _item: &PlaylistItem, _position_ms: u64, _duration_ms: u64) {}

    /// Playback of `item` was stopped by STOP
    fn on_playback_stopped(&self, _item: &PlaylistItem) {}

    /// Traversal ran past the last allowed item
    fn on_playlist_ended(&self) {}

    /// REPEAT command
    fn on_repeat(&self) {}

    /// SHUFFLE command
    fn on_shuffle(&self) {}
}

/// Hooks driven by [`PlaybackConfig`]: always online, nothing downloaded
#[derive(Debug, Clone)]
pub struct DefaultHostHooks {
    duck_volume: f32,
    click_target: Option<String>,
}

impl DefaultHostHooks {
    pub fn new(config: &PlaybackConfig) -> Self {
        Self {
            duck_volume: config.duck_volume,
            click_target: config.notification_click_target.clone(),
        }
    }
}

impl Default for DefaultHostHooks {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default())
    }
}

impl HostHooks for DefaultHostHooks {
    fn audio_duck_volume(&self) -> f32 {
        self.duck_volume
    }

    fn notification_click_target(&self) -> Option<String> {
        self.click_target.clone()
    }
}
