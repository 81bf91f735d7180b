//! Console implementations of the host contracts

use playlist_core::{HostHooks, PlaybackConfig, PlaylistItem, PresentationSink, PresentationUpdate};
use tracing::{debug, info, warn};

/// Host hooks for a console session
///
/// An item counts as downloaded when the playlist file gives it a local
/// copy. In offline mode only those items play.
#[derive(Debug, Clone)]
pub struct ConsoleHooks {
    offline: bool,
    duck_volume: f32,
    click_target: Option<String>,
}

impl ConsoleHooks {
    pub fn new(config: &PlaybackConfig, offline: bool) -> Self {
        Self {
            offline,
            duck_volume: config.duck_volume,
            click_target: config.notification_click_target.clone(),
        }
    }
}

impl HostHooks for ConsoleHooks {
    fn is_network_available(&self) -> bool {
        !self.offline
    }

    fn is_downloaded(&self, item: &PlaylistItem) -> bool {
        item.downloaded_uri.is_some()
    }

    fn audio_duck_volume(&self) -> f32 {
        self.duck_volume
    }

    fn notification_click_target(&self) -> Option<String> {
        self.click_target.clone()
    }

    fn on_no_offline_items_available(&self) {
        warn!("Offline and nothing downloaded is left to play");
    }

    fn on_session_ended(&self) {
        info!("Session ended");
    }

    fn on_item_skipped(&self, item: &PlaylistItem) {
        warn!("No renderer for item {} ({:?}), skipping", item.id, item.media_type);
    }

    fn on_renderer_changed(&self, previous: Option<&str>, current: Option<&str>) {
        info!(
            "Renderer changed: {} -> {}",
            previous.unwrap_or("none"),
            current.unwrap_or("none")
        );
    }

    fn on_playback_started(&self, item: &PlaylistItem, position_ms: u64, duration_ms: u64) {
        info!(
            "Playing {} at {}/{} ms",
            display_name(item),
            position_ms,
            duration_ms
        );
    }

    fn on_playback_ended(&self, item: &PlaylistItem, position_ms: u64, duration_ms: u64) {
        debug!(
            "Left {} at {}/{} ms",
            display_name(item),
            position_ms,
            duration_ms
        );
    }

    fn on_playback_stopped(&self, item: &PlaylistItem) {
        info!("Stopped {}", display_name(item));
    }

    fn on_playlist_ended(&self) {
        info!("Reached the end of the playlist");
    }

    fn on_repeat(&self) {
        info!("Repeat is not supported by this host");
    }

    fn on_shuffle(&self) {
        info!("Shuffle is not supported by this host");
    }
}

/// Presentation sink that logs what a notification would show
#[derive(Debug, Default)]
pub struct LogPresentation {
    enabled: bool,
}

impl PresentationSink for LogPresentation {
    fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            debug!("Presentation {}", if enabled { "shown" } else { "hidden" });
        }
        self.enabled = enabled;
    }

    fn set_base(&mut self, app_icon: &str) {
        debug!("Presentation icon: {}", app_icon);
    }

    fn update(&mut self, update: &PresentationUpdate) {
        if !self.enabled {
            return;
        }

        info!(
            "Now {}: {} - {}{}{}",
            if update.state.is_playing { "playing" } else { "paused" },
            update.artist.as_deref().unwrap_or("Unknown artist"),
            update.title.as_deref().unwrap_or("Untitled"),
            if update.state.has_previous { " [prev]" } else { "" },
            if update.state.has_next { " [next]" } else { "" },
        );
    }

    fn release(&mut self) {
        self.enabled = false;
        debug!("Presentation released");
    }
}

fn display_name(item: &PlaylistItem) -> String {
    item.title
        .clone()
        .unwrap_or_else(|| format!("item {}", item.id))
}
