//! Playlist cursor
//!
//! Tracks the current position inside a caller-owned playlist and filters
//! traversal by an allowed media-type mask.
//!
//! Positions past the last item are represented by `count()`, the terminal
//! position: `next()` from the last allowed item lands there, and
//! `current_item()` is `None` while the cursor sits on it.

use crate::source::PlaylistSource;
use crate::types::{ItemId, MediaType, PlaylistId, PlaylistItem};

/// Position within a playlist plus the allowed-type filter
///
/// Structure:
/// ```text
///  index:    0        1        2        3 (terminal)
///  items:  [audio]  [video]  [audio]
///  mask: AUDIO      ^ skipped on next/previous
/// ```
pub struct PlaylistCursor {
    /// Caller-owned items
    source: Box<dyn PlaylistSource>,

    /// Playlist identifier (`None` = invalid)
    playlist_id: Option<PlaylistId>,

    /// Current index (`None` = invalid, `Some(count)` = terminal)
    current_index: Option<usize>,

    /// Item types traversal may stop on
    allowed: MediaType,
}

impl PlaylistCursor {
    /// Create a cursor with no playlist id and an invalid index
    pub fn new(source: impl PlaylistSource + 'static, allowed: MediaType) -> Self {
        Self {
            source: Box::new(source),
            playlist_id: None,
            current_index: None,
            allowed,
        }
    }

    /// Create an empty cursor
    pub fn empty(allowed: MediaType) -> Self {
        Self::new(Vec::new(), allowed)
    }

    /// Replace the items and playlist id, then move to `start_index`
    pub fn set_playlist(
        &mut self,
        playlist_id: Option<PlaylistId>,
        source: Box<dyn PlaylistSource>,
        start_index: usize,
    ) {
        self.source = source;
        self.playlist_id = playlist_id;
        self.set_index(start_index);
    }

    // ===== Source Access =====

    /// Number of items in the playlist
    pub fn count(&self) -> usize {
        self.source.count()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<PlaylistItem> {
        self.source.at(index)
    }

    /// Index of the item with `id`
    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.source.position_of(id)
    }

    /// Playlist identifier
    pub fn playlist_id(&self) -> Option<PlaylistId> {
        self.playlist_id
    }

    // ===== Position =====

    /// Current index (`None` = invalid, may equal `count()` at the end)
    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    /// Item at the current index
    pub fn current_item(&self) -> Option<PlaylistItem> {
        self.current_index.and_then(|index| self.get(index))
    }

    /// True once traversal has run past the last allowed item
    pub fn is_at_end(&self) -> bool {
        self.current_index
            .is_some_and(|index| index >= self.count())
    }

    /// Move to `index`
    ///
    /// The index is clamped to the playlist and then snapped forward to the
    /// first allowed item at or after it (terminal if there is none).
    pub fn set_index(&mut self, index: usize) {
        let clamped = index.min(self.count().saturating_sub(1));
        self.current_index = Some(self.find_next_allowed(clamped));
    }

    /// Move to the item with `id`; unknown ids leave the cursor unchanged
    pub fn set_current_item(&mut self, id: ItemId) -> bool {
        match self.position_of(id) {
            Some(index) => {
                self.set_index(index);
                true
            }
            None => false,
        }
    }

    /// Advance to the next allowed item
    pub fn next(&mut self) -> Option<PlaylistItem> {
        let start = self.current_index.map_or(0, |index| index.saturating_add(1));
        self.current_index = Some(self.find_next_allowed(start));
        self.current_item()
    }

    /// Step back to the previous allowed item
    pub fn previous(&mut self) -> Option<PlaylistItem> {
        self.current_index = Some(match self.before_current() {
            Some(start) => self.find_previous_allowed(start),
            None => self.count(),
        });
        self.current_item()
    }

    /// Forget the playlist id and the position
    pub fn reset(&mut self) {
        self.current_index = None;
        self.playlist_id = None;
    }

    // ===== Filtering =====

    /// Allowed-type mask
    pub fn allowed(&self) -> MediaType {
        self.allowed
    }

    /// Replace the allowed-type mask
    ///
    /// The cursor does not move; callers check [`current_is_allowed`] and
    /// advance when the current item no longer qualifies.
    ///
    /// [`current_is_allowed`]: Self::current_is_allowed
    pub fn set_allowed(&mut self, allowed: MediaType) {
        self.allowed = allowed;
    }

    /// Whether `item` passes the allowed-type mask
    pub fn is_allowed(&self, item: &PlaylistItem) -> bool {
        item.media_type.intersects(self.allowed)
    }

    /// Whether the current item passes the mask (false with no current item)
    pub fn current_is_allowed(&self) -> bool {
        self.current_item()
            .is_some_and(|item| self.is_allowed(&item))
    }

    /// Whether a next allowed item exists
    pub fn has_next(&self) -> bool {
        let start = self.current_index.map_or(0, |index| index.saturating_add(1));
        self.find_next_allowed(start) < self.count()
    }

    /// Whether a previous allowed item exists
    pub fn has_previous(&self) -> bool {
        self.before_current()
            .is_some_and(|start| self.find_previous_allowed(start) != self.count())
    }

    /// Whether `item` is the current item of this playlist
    pub fn is_playing(&self, item: &PlaylistItem) -> bool {
        match (self.current_item(), self.playlist_id) {
            (Some(current), Some(playlist_id)) => {
                item.id == current.id && item.playlist_id == playlist_id
            }
            _ => false,
        }
    }

    // ===== Traversal =====

    /// First allowed index at or after `start`, or `count()` if none
    pub fn find_next_allowed(&self, start: usize) -> usize {
        let count = self.count();
        (start..count)
            .find(|&index| self.index_is_allowed(index))
            .unwrap_or(count)
    }

    /// Last allowed index at or before `start`, or `count()` if none
    pub fn find_previous_allowed(&self, start: usize) -> usize {
        let count = self.count();
        if start >= count {
            return count;
        }

        (0..=start)
            .rev()
            .find(|&index| self.index_is_allowed(index))
            .unwrap_or(count)
    }

    fn index_is_allowed(&self, index: usize) -> bool {
        self.get(index)
            .is_some_and(|item| self.is_allowed(&item))
    }

    fn before_current(&self) -> Option<usize> {
        self.current_index.and_then(|index| index.checked_sub(1))
    }
}

impl std::fmt::Debug for PlaylistCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistCursor")
            .field("count", &self.count())
            .field("playlist_id", &self.playlist_id)
            .field("current_index", &self.current_index)
            .field("allowed", &self.allowed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: ItemId, media_type: MediaType) -> PlaylistItem {
        PlaylistItem::new(id, 1, media_type, format!("https://media/{id}"))
    }

    /// [A:audio, B:video, C:audio]
    fn mixed() -> PlaylistCursor {
        let mut cursor = PlaylistCursor::new(
            vec![
                item(0, MediaType::AUDIO),
                item(1, MediaType::VIDEO),
                item(2, MediaType::AUDIO),
            ],
            MediaType::AUDIO,
        );
        cursor.set_index(0);
        cursor
    }

    #[test]
    fn next_skips_disallowed() {
        let mut cursor = mixed();
        assert_eq!(cursor.current_index(), Some(0));

        let next = cursor.next().unwrap();
        assert_eq!(next.id, 2);
        assert_eq!(cursor.current_index(), Some(2));

        assert!(cursor.next().is_none());
        assert_eq!(cursor.current_index(), Some(3));
        assert!(cursor.is_at_end());

        // Terminal is sticky
        assert!(cursor.next().is_none());
        assert_eq!(cursor.current_index(), Some(3));
    }

    #[test]
    fn previous_skips_disallowed() {
        let mut cursor = mixed();
        cursor.set_index(2);

        assert_eq!(cursor.previous().unwrap().id, 0);
        assert!(cursor.previous().is_none());
        assert_eq!(cursor.current_index(), Some(3));
    }

    #[test]
    fn previous_from_terminal_returns_last_allowed() {
        let mut cursor = mixed();
        cursor.next();
        cursor.next();
        assert!(cursor.is_at_end());

        assert_eq!(cursor.previous().unwrap().id, 2);
    }

    #[test]
    fn next_from_invalid_starts_at_first_allowed() {
        let mut cursor = PlaylistCursor::new(
            vec![item(5, MediaType::VIDEO), item(6, MediaType::AUDIO)],
            MediaType::AUDIO,
        );
        assert_eq!(cursor.current_index(), None);
        assert!(cursor.has_next());
        assert!(!cursor.has_previous());

        assert_eq!(cursor.next().unwrap().id, 6);
    }

    #[test]
    fn set_index_clamps_and_snaps_forward() {
        let mut cursor = mixed();

        cursor.set_index(1);
        assert_eq!(cursor.current_index(), Some(2));

        cursor.set_index(50);
        assert_eq!(cursor.current_index(), Some(2));

        cursor.set_allowed(MediaType::VIDEO);
        cursor.set_index(2);
        assert_eq!(cursor.current_index(), Some(3));
        assert!(cursor.current_item().is_none());
    }

    #[test]
    fn empty_playlist() {
        let mut cursor = PlaylistCursor::empty(MediaType::AUDIO);
        cursor.set_index(0);

        assert_eq!(cursor.count(), 0);
        assert!(cursor.current_item().is_none());
        assert!(!cursor.has_next());
        assert!(!cursor.has_previous());
        assert!(cursor.next().is_none());
    }

    #[test]
    fn has_next_and_previous() {
        let mut cursor = mixed();
        assert!(cursor.has_next());
        assert!(!cursor.has_previous());

        cursor.next();
        assert!(!cursor.has_next());
        assert!(cursor.has_previous());
    }

    #[test]
    fn is_playing_requires_matching_playlist() {
        let mut cursor = mixed();
        let first = item(0, MediaType::AUDIO);

        // No playlist id yet
        assert!(!cursor.is_playing(&first));

        cursor.set_playlist(
            Some(1),
            Box::new(vec![first.clone(), item(1, MediaType::AUDIO)]),
            0,
        );
        assert!(cursor.is_playing(&first));

        let mut other_playlist = first.clone();
        other_playlist.playlist_id = 2;
        assert!(!cursor.is_playing(&other_playlist));
    }

    #[test]
    fn reset_invalidates() {
        let mut cursor = mixed();
        cursor.set_playlist(Some(4), Box::new(vec![item(0, MediaType::AUDIO)]), 0);
        cursor.reset();

        assert_eq!(cursor.current_index(), None);
        assert_eq!(cursor.playlist_id(), None);
        assert!(cursor.current_item().is_none());
    }

    #[test]
    fn set_current_item_by_id() {
        let mut cursor = mixed();
        assert!(cursor.set_current_item(2));
        assert_eq!(cursor.current_index(), Some(2));

        assert!(!cursor.set_current_item(42));
        assert_eq!(cursor.current_index(), Some(2));
    }

    #[test]
    fn current_is_allowed_tracks_mask() {
        let mut cursor = mixed();
        cursor.set_allowed(MediaType::AUDIO | MediaType::VIDEO);
        cursor.set_index(1);
        assert!(cursor.current_is_allowed());

        cursor.set_allowed(MediaType::AUDIO);
        assert!(!cursor.current_is_allowed());
    }
}
