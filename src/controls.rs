//! Navigation controls: the state they render from and the default surface.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::sync::lock;

/// Everything a controls surface needs to draw itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlsState {
    pub current_page: u32,
    pub total_pages: u32,
    pub is_prev_disabled: bool,
    pub is_next_disabled: bool,
}

impl ControlsState {
    pub fn label(&self) -> String {
        format!("Page: {} / {}", self.current_page, self.total_pages)
    }
}

pub type NavigationAction = Arc<dyn Fn() + Send + Sync>;

/// Controls state plus the actions its buttons trigger.
#[derive(Clone)]
pub struct ControlsProps {
    pub state: ControlsState,
    pub on_prev_page: NavigationAction,
    pub on_next_page: NavigationAction,
}

impl fmt::Debug for ControlsProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlsProps").field("state", &self.state).finish_non_exhaustive()
    }
}

/// A replaceable presentation of the navigation affordances.
///
/// `present` is called after the document loads and after every page change.
/// Implementations must draw purely from `props`.
pub trait ControlsSurface: Send + Sync {
    fn present(&self, props: &ControlsProps);
}

/// Default controls: previous/next buttons and a `Page: n / total` indicator.
#[derive(Default)]
pub struct PageIndicator {
    latest: Mutex<Option<ControlsProps>>,
}

impl PageIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ControlsState {
        lock(&self.latest)
            .as_ref()
            .map(|props| props.state)
            .unwrap_or_default()
    }

    pub fn label(&self) -> String {
        self.state().label()
    }

    /// Press "Previous". Does nothing while the button is disabled.
    pub fn click_previous(&self) -> bool {
        let action = lock(&self.latest)
            .as_ref()
            .filter(|props| !props.state.is_prev_disabled)
            .map(|props| Arc::clone(&props.on_prev_page));
        fire(action)
    }

    /// Press "Next". Does nothing while the button is disabled.
    pub fn click_next(&self) -> bool {
        let action = lock(&self.latest)
            .as_ref()
            .filter(|props| !props.state.is_next_disabled)
            .map(|props| Arc::clone(&props.on_next_page));
        fire(action)
    }
}

fn fire(action: Option<NavigationAction>) -> bool {
    match action {
        Some(act) => {
            act();
            true
        }
        None => false,
    }
}

impl ControlsSurface for PageIndicator {
    fn present(&self, props: &ControlsProps) {
        *lock(&self.latest) = Some(props.clone());
    }
}

impl<T: ControlsSurface + ?Sized> ControlsSurface for Arc<T> {
    fn present(&self, props: &ControlsProps) {
        (**self).present(props)
    }
}
