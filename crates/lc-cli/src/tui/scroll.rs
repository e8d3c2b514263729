//! Scroll position of the transcript.

/// Transcript scroll position.
///
/// While `follow` is set the view sticks to the newest line, so streamed
/// deltas stay visible. Scrolling up releases it; reaching the bottom again
/// re-arms it.
#[derive(Debug, Clone)]
pub struct ScrollState {
    offset: u16,
    content_height: u16,
    viewport_height: u16,
    follow: bool,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            offset: 0,
            content_height: 0,
            viewport_height: 0,
            follow: true,
        }
    }
}

impl ScrollState {
    pub fn offset(&self) -> u16 {
        self.offset
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    /// Called on every draw with the measured transcript.
    pub fn set_dimensions(&mut self, content_height: u16, viewport_height: u16) {
        self.content_height = content_height;
        self.viewport_height = viewport_height;
        if self.follow {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, amount: u16) {
        self.offset = self.offset.saturating_sub(amount);
        self.follow = false;
    }

    pub fn scroll_down(&mut self, amount: u16) {
        let max = self.max_offset();
        self.offset = self.offset.saturating_add(amount).min(max);
        self.follow = self.offset >= max;
    }

    pub fn page_up(&mut self) {
        self.scroll_up((self.viewport_height / 2).max(5));
    }

    pub fn page_down(&mut self) {
        self.scroll_down((self.viewport_height / 2).max(5));
    }

    pub fn scroll_to_top(&mut self) {
        self.offset = 0;
        self.follow = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
        self.follow = true;
    }
}
