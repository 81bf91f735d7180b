//! Presentation sink
//!
//! Narrow outbound contract towards notifications, lock screens and remote
//! views. The coordinator only pushes data; rendering, image loading and
//! scaling are the sink's business.

use crate::types::PlaylistItem;
use serde::{Deserialize, Serialize};

/// Playback flags shown next to the metadata
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationMediaState {
    pub is_playing: bool,
    pub has_next: bool,
    pub has_previous: bool,
}

/// Everything a presentation update carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentationUpdate {
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,

    /// Large image (item artwork)
    pub primary_image: Option<String>,

    /// Small image (item thumbnail)
    pub secondary_image: Option<String>,

    pub state: PresentationMediaState,

    /// Opaque value the sink attaches to clicks
    pub click_target: Option<String>,
}

impl PresentationUpdate {
    /// Build an update for `item` (or an empty one)
    pub fn for_item(
        item: Option<&PlaylistItem>,
        state: PresentationMediaState,
        click_target: Option<String>,
    ) -> Self {
        let Some(item) = item else {
            return Self {
                state,
                click_target,
                ..Self::default()
            };
        };

        Self {
            title: item.title.clone(),
            album: item.album.clone(),
            artist: item.artist.clone(),
            primary_image: item.artwork_url.clone(),
            secondary_image: item.thumbnail_url.clone(),
            state,
            click_target,
        }
    }
}

/// Receiver of presentation updates
pub trait PresentationSink: Send {
    /// Show or hide the presentation (foreground entry and exit)
    fn set_enabled(&mut self, enabled: bool);

    /// Base configuration, sent once when the engine starts
    fn set_base(&mut self, app_icon: &str);

    fn update(&mut self, update: &PresentationUpdate);

    /// Tear down; sent once when the engine shuts down
    fn release(&mut self);
}

/// Sink for hosts without any presentation
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPresentation;

impl PresentationSink for NoPresentation {
    fn set_enabled(&mut self, _enabled: bool) {}

    fn set_base(&mut self, _app_icon: &str) {}

    fn update(&mut self, _update: &PresentationUpdate) {}

    fn release(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MediaType;

    #[test]
    fn update_maps_item_metadata() {
        let mut item = PlaylistItem::new(1, 1, MediaType::AUDIO, "a").with_title("Song");
        item.artist = Some("Artist".to_string());
        item.artwork_url = Some("art.png".to_string());
        item.thumbnail_url = Some("thumb.png".to_string());

        let state = PresentationMediaState {
            is_playing: true,
            has_next: true,
            has_previous: false,
        };
        let update = PresentationUpdate::for_item(Some(&item), state, Some("open".to_string()));

        assert_eq!(update.title.as_deref(), Some("Song"));
        assert_eq!(update.artist.as_deref(), Some("Artist"));
        assert_eq!(update.primary_image.as_deref(), Some("art.png"));
        assert_eq!(update.secondary_image.as_deref(), Some("thumb.png"));
        assert_eq!(update.click_target.as_deref(), Some("open"));
        assert!(update.state.is_playing);
    }

    #[test]
    fn update_without_item_is_empty() {
        let update = PresentationUpdate::for_item(None, PresentationMediaState::default(), None);
        assert_eq!(update, PresentationUpdate::default());
    }
}
