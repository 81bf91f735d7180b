//! Caller-owned playlist sources
//!
//! The coordinator never owns a playlist. It reads items through
//! [`PlaylistSource`], which both in-memory lists and forward-only row sets
//! (database query results and the like) can implement.

use crate::types::{ItemId, PlaylistItem};
use std::sync::Mutex;

/// Read-through access to an ordered list of items
///
/// Implementors must be cheap to query: the cursor scans linearly when it
/// looks for the next item of an allowed type.
pub trait PlaylistSource: Send {
    /// Number of items
    fn count(&self) -> usize;

    /// Item at `index`, `None` when out of range or unreadable
    fn at(&self, index: usize) -> Option<PlaylistItem>;

    /// Index of the item with `id`
    ///
    /// The default performs a linear scan through [`at`](Self::at).
    fn position_of(&self, id: ItemId) -> Option<usize> {
        (0..self.count()).find(|&index| self.at(index).is_some_and(|item| item.id == id))
    }
}

impl PlaylistSource for Vec<PlaylistItem> {
    fn count(&self) -> usize {
        self.len()
    }

    fn at(&self, index: usize) -> Option<PlaylistItem> {
        self.get(index).cloned()
    }

    fn position_of(&self, id: ItemId) -> Option<usize> {
        self.iter().position(|item| item.id == id)
    }
}

/// A positioned row set, such as a database cursor
///
/// Rows are read by moving to a position and then reading the row there.
pub trait RowSet: Send {
    /// Number of rows
    fn row_count(&self) -> usize;

    /// Move to `row`, returning false if the row cannot be reached
    fn move_to(&mut self, row: usize) -> bool;

    /// Read the row at the current position
    fn read(&self) -> Option<PlaylistItem>;

    /// Item id of the row at the current position, without building the item
    fn read_id(&self) -> Option<ItemId> {
        self.read().map(|item| item.id)
    }
}

/// Adapts a [`RowSet`] to [`PlaylistSource`]
///
/// Moving a row set needs `&mut`, so the rows sit behind a mutex.
pub struct RowSetSource<R: RowSet> {
    rows: Mutex<R>,
}

impl<R: RowSet> RowSetSource<R> {
    /// Wrap a row set
    pub fn new(rows: R) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// Unwrap the row set
    pub fn into_inner(self) -> R {
        self.rows
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn with_row<T>(&self, row: usize, read: impl FnOnce(&R) -> Option<T>) -> Option<T> {
        let mut rows = self
            .rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if row >= rows.row_count() || !rows.move_to(row) {
            return None;
        }

        read(&*rows)
    }
}

impl<R: RowSet> PlaylistSource for RowSetSource<R> {
    fn count(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .row_count()
    }

    fn at(&self, index: usize) -> Option<PlaylistItem> {
        self.with_row(index, R::read)
    }

    fn position_of(&self, id: ItemId) -> Option<usize> {
        (0..self.count()).find(|&row| self.with_row(row, R::read_id) == Some(id))
    }
}
