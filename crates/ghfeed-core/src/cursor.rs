// Row selection across pages
//
// Tracks the selected row of the feed as an absolute position in the
// filtered result set, so moving past the end of a page lands on the next
// page instead of stopping.

use serde::Serialize;

/// Selected row: 1-based page, 0-based row within the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub page: u32,
    pub row: usize,
}

/// Result of moving the selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CursorMove {
    pub position: Position,
    /// The new row is on a different page, which has to be loaded
    pub page_changed: bool,
}

/// Keyboard-style selection over a paged result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedCursor {
    page_size: u32,
    /// Absolute index into the filtered set
    selected: usize,
}

impl FeedCursor {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            selected: 0,
        }
    }

    pub fn position(&self) -> Position {
        let size = self.page_size as usize;
        Position {
            page: (self.selected / size) as u32 + 1,
            row: self.selected % size,
        }
    }

    /// Select a row on a page
    pub fn select(&mut self, page: u32, row: usize) -> Position {
        let page = page.max(1) as usize - 1;
        let row = row.min(self.page_size as usize - 1);
        self.selected = page * self.page_size as usize + row;
        self.position()
    }

    /// Move down one row; `None` at the end of the result set
    pub fn next(&mut self, total_filtered: usize) -> Option<CursorMove> {
        if self.selected + 1 >= total_filtered {
            return None;
        }
        Some(self.move_to(self.selected + 1))
    }

    /// Move up one row; `None` at the top
    pub fn prev(&mut self) -> Option<CursorMove> {
        if self.selected == 0 {
            return None;
        }
        Some(self.move_to(self.selected - 1))
    }

    /// Keep the selection valid after the result set shrank (e.g. a new filter)
    pub fn clamp(&mut self, total_filtered: usize) {
        self.selected = self.selected.min(total_filtered.saturating_sub(1));
    }

    /// Back to the first row, used when filters change
    pub fn reset(&mut self) {
        self.selected = 0;
    }

    fn move_to(&mut self, selected: usize) -> CursorMove {
        let before = self.position().page;
        self.selected = selected;
        let position = self.position();
        CursorMove {
            position,
            page_changed: position.page != before,
        }
    }
}
