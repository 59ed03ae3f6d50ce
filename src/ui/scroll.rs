/// Scroll offset into a bounded list of rows.
///
/// `offset` never leaves `[0, max_offset]`; every mutation clamps.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScrollState {
    offset: usize,
    max_offset: usize,
    viewport_height: usize,
    content_len: usize,
}

impl ScrollState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    #[cfg(test)]
    pub fn max_offset(&self) -> usize {
        self.max_offset
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// Set the upper bound, pulling the offset down if it now exceeds it.
    pub fn set_max_offset(&mut self, max: usize) {
        self.max_offset = max;
        if self.offset > max {
            self.offset = max;
        }
    }

    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset.min(self.max_offset);
    }

    /// Number of rows visible at once. Recomputes the max offset.
    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height;
        self.recompute();
    }

    /// Number of rows in the backing list. Recomputes the max offset.
    pub fn set_content_len(&mut self, len: usize) {
        self.content_len = len;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.set_max_offset(self.content_len.saturating_sub(self.viewport_height));
    }

    pub fn scroll_up(&mut self) {
        self.set_offset(self.offset.saturating_sub(1));
    }

    pub fn scroll_down(&mut self) {
        self.set_offset(self.offset.saturating_add(1));
    }

    pub fn page_up(&mut self) {
        self.set_offset(self.offset.saturating_sub(self.viewport_height));
    }

    pub fn page_down(&mut self) {
        self.set_offset(self.offset.saturating_add(self.viewport_height));
    }

    pub fn to_top(&mut self) {
        self.offset = 0;
    }

    pub fn to_bottom(&mut self) {
        self.offset = self.max_offset;
    }

    #[cfg(test)]
    pub fn is_at_top(&self) -> bool {
        self.offset == 0
    }

    #[cfg(test)]
    pub fn is_at_bottom(&self) -> bool {
        self.offset >= self.max_offset
    }

    /// Percentage label for the status line; empty when everything fits.
    pub fn scroll_percent(&self) -> String {
        if self.max_offset == 0 {
            return String::new();
        }
        format!("{}%", (self.offset * 100 / self.max_offset).min(100))
    }

    /// Scrollbar thumb `(position, length)` inside a track of `track` cells.
    /// Returns `None` when the content fits in the viewport.
    pub fn thumb(&self, track: usize) -> Option<(usize, usize)> {
        if track == 0 || self.max_offset == 0 || self.content_len == 0 {
            return None;
        }
        let visible = self.viewport_height.min(self.content_len);
        let len = (track * visible / self.content_len).clamp(1, track);
        let pos = self.offset * (track - len) / self.max_offset;
        Some((pos, len))
    }
}

/// Selected row plus the scroll window that keeps it visible.
#[derive(Debug, Default, Clone)]
pub struct ListState {
    selected: usize,
    len: usize,
    scroll: ScrollState,
}

impl ListState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    #[cfg(test)]
    pub fn offset(&self) -> usize {
        self.scroll.offset()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn scroll(&self) -> &ScrollState {
        &self.scroll
    }

    /// Rows moved by a page jump. Never zero, so a view that has not been
    /// positioned yet still moves one row at a time.
    pub fn page_size(&self) -> usize {
        self.scroll.viewport_height().max(1)
    }

    /// Update the item count after a refresh, re-clamping the selection.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.scroll.set_content_len(len);
        self.selected = self.selected.min(len.saturating_sub(1));
        self.adjust_offset();
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.scroll.set_viewport_height(height);
        self.adjust_offset();
    }

    /// Select a specific row, clamped to the list.
    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.len.saturating_sub(1));
        self.adjust_offset();
    }

    pub fn move_down(&mut self) {
        self.select(self.selected.saturating_add(1));
    }

    pub fn move_up(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    pub fn page_down(&mut self) {
        self.select(self.selected.saturating_add(self.page_size()));
    }

    pub fn page_up(&mut self) {
        self.select(self.selected.saturating_sub(self.page_size()));
    }

    pub fn to_top(&mut self) {
        self.selected = 0;
        self.scroll.to_top();
    }

    pub fn to_bottom(&mut self) {
        self.selected = self.len.saturating_sub(1);
        self.scroll.to_bottom();
    }

    pub fn reset(&mut self) {
        self.selected = 0;
        self.scroll.to_top();
    }

    /// Move the window the minimum distance needed to show the selection.
    fn adjust_offset(&mut self) {
        let page = self.page_size();
        let offset = self.scroll.offset();
        if self.selected < offset {
            self.scroll.set_offset(self.selected);
        } else if self.selected >= offset + page {
            self.scroll.set_offset(self.selected + 1 - page);
        }
    }

    /// Range of item indices visible in the current window.
    pub fn visible_range(&self) -> std::ops::Range<usize> {
        let start = self.scroll.offset().min(self.len);
        let end = (start + self.scroll.viewport_height()).min(self.len);
        start..end
    }
}
