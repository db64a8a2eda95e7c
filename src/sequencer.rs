//! Single-flight page rendering.
//!
//! At most one engine render runs at a time. Requests that arrive while a
//! render is in flight collapse into a single pending slot that only keeps
//! the newest page; it is rendered as soon as the current render finishes.
//! A burst of requests therefore costs at most two engine calls, and the
//! surface always converges to the last page asked for.

use std::sync::{Arc, Mutex, Weak};

use log::{debug, warn};
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::error::{EngineError, ViewerError};
use crate::pdf::RenderEngine;
use crate::surface::{DrawingSurface, Frame};
use crate::sync::lock;

/// Where the sequencer is in its render cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum RenderState {
    #[default]
    Idle,
    Rendering { page: u32 },
    RenderingWithPending { page: u32, pending: u32 },
}

impl RenderState {
    /// Register a request. Returns the page to start rendering now, if any.
    pub fn request(&mut self, page: u32) -> Option<u32> {
        match *self {
            RenderState::Idle => {
                *self = RenderState::Rendering { page };
                Some(page)
            }
            RenderState::Rendering { page: current }
            | RenderState::RenderingWithPending { page: current, .. } => {
                *self = RenderState::RenderingWithPending {
                    page: current,
                    pending: page,
                };
                None
            }
        }
    }

    /// Register completion of the in-flight render, successful or not.
    /// Returns the pending page to start next, if any.
    pub fn complete(&mut self) -> Option<u32> {
        match *self {
            RenderState::RenderingWithPending { pending, .. } => {
                *self = RenderState::Rendering { page: pending };
                Some(pending)
            }
            RenderState::Rendering { .. } | RenderState::Idle => {
                *self = RenderState::Idle;
                None
            }
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, RenderState::Idle)
    }

    /// Page currently being rendered.
    pub fn in_flight(&self) -> Option<u32> {
        match *self {
            RenderState::Idle => None,
            RenderState::Rendering { page } | RenderState::RenderingWithPending { page, .. } => Some(page),
        }
    }

    pub fn pending(&self) -> Option<u32> {
        match *self {
            RenderState::RenderingWithPending { pending, .. } => Some(pending),
            _ => None,
        }
    }
}

/// A render that did not make it onto the surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderFailure {
    pub page: u32,
    pub message: String,
}

impl From<&RenderFailure> for ViewerError {
    fn from(failure: &RenderFailure) -> Self {
        ViewerError::PageRender {
            page: failure.page,
            message: failure.message.clone(),
        }
    }
}

/// Observable sequencer state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderStatus {
    pub state: RenderState,
    pub last_rendered: Option<u32>,
    pub last_failure: Option<RenderFailure>,
    /// Number of renders finished so far, successful or not.
    pub completed: u64,
}

/// Anything that accepts page render requests.
pub trait RenderRequest {
    fn request_render(&self, page: u32);
}

/// Serializes render requests for one document against one engine.
pub struct PageRenderSequencer<E: RenderEngine> {
    inner: Arc<Inner<E>>,
}

impl<E: RenderEngine> Clone for PageRenderSequencer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<E: RenderEngine> {
    engine: Arc<E>,
    document: E::Document,
    scale: f32,
    runtime: Handle,
    surface: Mutex<DrawingSurface>,
    status: watch::Sender<RenderStatus>,
}

impl<E: RenderEngine> PageRenderSequencer<E> {
    /// Must be called from within a tokio runtime; renders are spawned on it.
    pub fn new(engine: Arc<E>, document: E::Document, scale: f32) -> Result<Self, ViewerError> {
        let runtime = Handle::try_current().map_err(|e| ViewerError::NoRuntime(e.to_string()))?;
        let (status, _) = watch::channel(RenderStatus::default());
        Ok(Self {
            inner: Arc::new(Inner {
                engine,
                document,
                scale,
                runtime,
                surface: Mutex::new(DrawingSurface::new()),
                status,
            }),
        })
    }

    pub fn status(&self) -> RenderStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RenderStatus> {
        self.inner.status.subscribe()
    }

    /// Resolves once no render is in flight or pending.
    pub async fn settled(&self) {
        let mut rx = self.inner.status.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|status| status.state.is_idle()).await;
    }

    pub fn frame(&self) -> Option<Frame> {
        lock(&self.inner.surface).snapshot()
    }

    /// Follow finished renders without keeping the sequencer alive.
    pub fn feed(&self) -> RenderFeed<E> {
        RenderFeed {
            status: self.inner.status.subscribe(),
            sequencer: Arc::downgrade(&self.inner),
            shown: None,
            last_failure: None,
            primed: false,
        }
    }
}

/// Output that appeared since the previous [`RenderFeed::next`].
#[derive(Debug, Clone, Default)]
pub struct RenderUpdate {
    /// A newly presented frame.
    pub frame: Option<Frame>,
    /// A new render failure.
    pub failure: Option<RenderFailure>,
}

/// Stream of render output for one sequencer.
///
/// Holds only a weak reference, so it ends when the sequencer is dropped,
/// e.g. because the viewer loaded another document or went away.
pub struct RenderFeed<E: RenderEngine> {
    status: watch::Receiver<RenderStatus>,
    sequencer: Weak<Inner<E>>,
    shown: Option<Frame>,
    last_failure: Option<RenderFailure>,
    primed: bool,
}

impl<E: RenderEngine> RenderFeed<E> {
    /// Wait for fresh output. `None` once the sequencer is gone.
    pub async fn next(&mut self) -> Option<RenderUpdate> {
        loop {
            if self.primed {
                self.status.changed().await.ok()?;
            }
            self.primed = true;

            let status = self.status.borrow_and_update().clone();
            let frame = lock(&self.sequencer.upgrade()?.surface).snapshot();

            let mut update = RenderUpdate::default();
            if status.last_failure != self.last_failure {
                self.last_failure = status.last_failure.clone();
                update.failure = status.last_failure;
            }
            if let Some(frame) = frame {
                let fresh = self.shown.as_ref().map_or(true, |shown| {
                    shown.page != frame.page || !Arc::ptr_eq(&shown.pixels, &frame.pixels)
                });
                if fresh {
                    self.shown = Some(frame.clone());
                    update.frame = Some(frame);
                }
            }

            if update.frame.is_some() || update.failure.is_some() {
                return Some(update);
            }
        }
    }
}

impl<E: RenderEngine> RenderRequest for PageRenderSequencer<E> {
    fn request_render(&self, page: u32) {
        let mut start = None;
        self.inner.status.send_modify(|status| {
            start = status.state.request(page);
        });

        match start {
            Some(page) => {
                debug!("render page {}", page);
                let inner = Arc::clone(&self.inner);
                self.inner.runtime.spawn(inner.drive(page));
            }
            None => debug!("render busy, page {} queued", page),
        }
    }
}

impl<E: RenderEngine> Inner<E> {
    async fn drive(self: Arc<Self>, first: u32) {
        let mut page = first;
        loop {
            let outcome = self.render_once(page).await;
            if let Err(e) = &outcome {
                warn!("failed to render page {}: {}", page, e);
            }

            let mut next = None;
            self.status.send_modify(|status| {
                match &outcome {
                    Ok(()) => status.last_rendered = Some(page),
                    Err(e) => {
                        status.last_failure = Some(RenderFailure {
                            page,
                            message: e.to_string(),
                        })
                    }
                }
                status.completed += 1;
                next = status.state.complete();
            });

            match next {
                Some(pending) => {
                    debug!("render page {} (coalesced)", pending);
                    page = pending;
                }
                None => break,
            }
        }
    }

    async fn render_once(&self, page: u32) -> Result<(), EngineError> {
        let handle = self.engine.get_page(&self.document, page).await?;
        let bitmap = self.engine.render(&handle, self.scale).await?;
        lock(&self.surface).present(page, bitmap);
        Ok(())
    }
}
