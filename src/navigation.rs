//! Page cursor and the navigation intents that move it.

use log::debug;
use serde::Serialize;

use crate::controls::ControlsState;
use crate::sequencer::RenderRequest;

/// Emitted whenever the cursor moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageChange {
    pub page: u32,
    pub total_pages: u32,
}

/// Bounded page cursor over a loaded document.
///
/// Every move requests a render of the new page and returns the resulting
/// [`PageChange`]. Moves that would leave `1..=total_pages` are ignored and
/// return `None`; the cursor, the renderer and observers are left untouched.
pub struct Navigator<R> {
    current: u32,
    total: u32,
    renderer: R,
}

impl<R: RenderRequest> Navigator<R> {
    /// Starts on page 1. `total_pages` must be at least 1.
    pub fn new(total_pages: u32, renderer: R) -> Self {
        Self {
            current: 1,
            total: total_pages,
            renderer,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current
    }

    pub fn total_pages(&self) -> u32 {
        self.total
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn previous(&mut self) -> Option<PageChange> {
        if self.current <= 1 {
            return None;
        }
        Some(self.move_to(self.current - 1))
    }

    pub fn next(&mut self) -> Option<PageChange> {
        if self.current >= self.total {
            return None;
        }
        Some(self.move_to(self.current + 1))
    }

    pub fn go_to(&mut self, page: u32) -> Option<PageChange> {
        if page < 1 || page > self.total {
            debug!("ignoring go-to page {} outside 1..={}", page, self.total);
            return None;
        }
        Some(self.move_to(page))
    }

    pub fn is_previous_disabled(&self) -> bool {
        self.current <= 1
    }

    pub fn is_next_disabled(&self) -> bool {
        self.current >= self.total
    }

    pub fn controls_state(&self) -> ControlsState {
        ControlsState {
            current_page: self.current,
            total_pages: self.total,
            is_prev_disabled: self.is_previous_disabled(),
            is_next_disabled: self.is_next_disabled(),
        }
    }

    fn move_to(&mut self, page: u32) -> PageChange {
        self.current = page;
        self.renderer.request_render(page);
        PageChange {
            page,
            total_pages: self.total,
        }
    }
}
