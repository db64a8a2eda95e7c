//! The viewer shell: one document, one cursor, one sequencer.
//!
//! The engine is injected, either ready-made ([`Viewer::new`]) or as an
//! initializer future ([`Viewer::initialize`]). Page state can be pulled
//! ([`Viewer::get_current_page`]) or pushed, through the `on_page_change`
//! hook or a [`Viewer::subscribe`] watch; all three read the same state.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use log::{error, info};
use serde::Serialize;
use tokio::sync::watch;

use crate::controls::{ControlsProps, ControlsState, ControlsSurface, PageIndicator};
use crate::error::{EngineError, ViewerError};
use crate::navigation::{Navigator, PageChange};
use crate::options::ViewerOptions;
use crate::pdf::{DocumentHandle, DocumentSource, RenderEngine};
use crate::sequencer::{PageRenderSequencer, RenderFeed, RenderRequest, RenderStatus};
use crate::surface::Frame;
use crate::sync::lock;

type PageChangeHook = Box<dyn Fn(u32, u32) + Send + Sync>;
type DocumentLoadHook = Box<dyn Fn(u32) + Send + Sync>;

/// Optional callbacks and a replacement controls surface.
#[derive(Default)]
pub struct ViewerHooks {
    on_page_change: Option<PageChangeHook>,
    on_document_load: Option<DocumentLoadHook>,
    controls: Option<Arc<dyn ControlsSurface>>,
}

impl ViewerHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called with `(page, total_pages)` after every successful navigation.
    pub fn on_page_change(mut self, hook: impl Fn(u32, u32) + Send + Sync + 'static) -> Self {
        self.on_page_change = Some(Box::new(hook));
        self
    }

    /// Called with the page count once a document has loaded.
    pub fn on_document_load(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_document_load = Some(Box::new(hook));
        self
    }

    /// Replace the default [`PageIndicator`] controls.
    pub fn render_controls(mut self, controls: impl ControlsSurface + 'static) -> Self {
        self.controls = Some(Arc::new(controls));
        self
    }
}

/// Lifecycle of the viewer as seen by the embedder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "phase", content = "detail", rename_all = "camelCase")]
pub enum ViewerPhase {
    Uninitialized,
    Loading,
    #[serde(rename_all = "camelCase")]
    Ready { total_pages: u32 },
    Failed(ViewerError),
}

type Session<E> = Navigator<PageRenderSequencer<E>>;

/// Notifications waiting to be delivered, in the order the cursor moved.
#[derive(Default)]
struct Outbox {
    queue: VecDeque<(Option<PageChange>, ControlsState)>,
    delivering: bool,
}

/// Releases the delivery slot if a hook panics mid-delivery.
struct Delivery<'a>(&'a Mutex<Outbox>);

impl Drop for Delivery<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            lock(self.0).delivering = false;
        }
    }
}

/// A PDF viewer bound to one rendering engine. Cheap to clone; clones share state.
pub struct Viewer<E: RenderEngine> {
    inner: Arc<ViewerInner<E>>,
}

impl<E: RenderEngine> Clone for Viewer<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ViewerInner<E: RenderEngine> {
    engine: Result<Arc<E>, ViewerError>,
    options: Mutex<ViewerOptions>,
    hooks: ViewerHooks,
    controls: Arc<dyn ControlsSurface>,
    session: Mutex<Option<Session<E>>>,
    outbox: Mutex<Outbox>,
    phase: watch::Sender<ViewerPhase>,
    page: watch::Sender<PageChange>,
    generation: AtomicU64,
}

impl<E: RenderEngine> Viewer<E> {
    pub fn new(engine: Arc<E>, options: ViewerOptions, hooks: ViewerHooks) -> Self {
        Self::with_engine(Ok(engine), options, hooks)
    }

    /// Await the engine initializer. If it fails the viewer stays in
    /// `Failed(EngineLoad)` for good; nothing is retried.
    pub async fn initialize<F>(init: F, options: ViewerOptions, hooks: ViewerHooks) -> Self
    where
        F: Future<Output = Result<E, EngineError>>,
    {
        let engine = match init.await {
            Ok(engine) => Ok(Arc::new(engine)),
            Err(e) => {
                error!("rendering engine failed to initialize: {}", e);
                Err(ViewerError::EngineLoad(e.to_string()))
            }
        };
        Self::with_engine(engine, options, hooks)
    }

    fn with_engine(engine: Result<Arc<E>, ViewerError>, options: ViewerOptions, mut hooks: ViewerHooks) -> Self {
        let initial = match &engine {
            Ok(_) => ViewerPhase::Uninitialized,
            Err(e) => ViewerPhase::Failed(e.clone()),
        };
        let controls = hooks
            .controls
            .take()
            .unwrap_or_else(|| Arc::new(PageIndicator::new()) as Arc<dyn ControlsSurface>);
        let (phase, _) = watch::channel(initial);
        let (page, _) = watch::channel(PageChange {
            page: 0,
            total_pages: 0,
        });

        Self {
            inner: Arc::new(ViewerInner {
                engine,
                options: Mutex::new(options),
                hooks,
                controls,
                session: Mutex::new(None),
                outbox: Mutex::new(Outbox::default()),
                phase,
                page,
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// Fetch the configured document and show its first page.
    ///
    /// Any previously loaded document is dropped first. Returns the page count.
    pub async fn load(&self) -> Result<u32, ViewerError> {
        let engine = self.inner.engine.clone()?;
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        *lock(&self.inner.session) = None;
        self.inner.page.send_replace(PageChange {
            page: 0,
            total_pages: 0,
        });

        let options = lock(&self.inner.options).clone();
        if let Err(e) = options.validate() {
            return Err(self.fail(generation, e));
        }
        self.inner.phase.send_replace(ViewerPhase::Loading);

        let source = match DocumentSource::parse(&options.document_url) {
            Ok(source) => source,
            Err(e) => return Err(self.fail(generation, ViewerError::DocumentLoad(e.to_string()))),
        };
        let document = match engine.load_document(&source).await {
            Ok(document) => document,
            Err(e) => return Err(self.fail(generation, ViewerError::DocumentLoad(e.to_string()))),
        };

        let total_pages = document.page_count();
        if total_pages == 0 {
            let err = ViewerError::DocumentLoad(format!("{} has no pages", source));
            return Err(self.fail(generation, err));
        }
        let sequencer = match PageRenderSequencer::new(engine, document, options.scale) {
            Ok(sequencer) => sequencer,
            Err(e) => return Err(self.fail(generation, e)),
        };

        {
            let mut session = lock(&self.inner.session);
            if self.inner.generation.load(Ordering::SeqCst) != generation {
                return Err(ViewerError::DocumentLoad(format!(
                    "loading {} was superseded by a newer document",
                    source
                )));
            }
            let navigator = Navigator::new(total_pages, sequencer.clone());
            lock(&self.inner.outbox)
                .queue
                .push_back((None, navigator.controls_state()));
            *session = Some(navigator);
            self.inner.phase.send_replace(ViewerPhase::Ready { total_pages });
            self.inner.page.send_replace(PageChange {
                page: 1,
                total_pages,
            });
        }
        info!("document ready: {} ({} pages)", source, total_pages);

        if let Some(hook) = &self.inner.hooks.on_document_load {
            hook(total_pages);
        }
        self.deliver();
        sequencer.request_render(1);
        Ok(total_pages)
    }

    /// Swap in a different document and load it.
    pub async fn set_document_url(&self, document_url: impl Into<String>) -> Result<u32, ViewerError> {
        lock(&self.inner.options).document_url = document_url.into();
        self.load().await
    }

    pub fn options(&self) -> ViewerOptions {
        lock(&self.inner.options).clone()
    }

    pub fn phase(&self) -> ViewerPhase {
        self.inner.phase.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<ViewerPhase> {
        self.inner.phase.subscribe()
    }

    /// Current page, or 0 while no document is loaded.
    pub fn get_current_page(&self) -> u32 {
        self.inner.page.borrow().page
    }

    pub fn total_pages(&self) -> u32 {
        self.inner.page.borrow().total_pages
    }

    /// Push-based view of the page cursor.
    pub fn subscribe(&self) -> watch::Receiver<PageChange> {
        self.inner.page.subscribe()
    }

    pub fn go_to_page(&self, page: u32) -> Option<PageChange> {
        self.navigate(|nav| nav.go_to(page))
    }

    pub fn next(&self) -> Option<PageChange> {
        self.navigate(Navigator::next)
    }

    pub fn previous(&self) -> Option<PageChange> {
        self.navigate(Navigator::previous)
    }

    pub fn is_previous_disabled(&self) -> bool {
        self.controls_state().map_or(true, |state| state.is_prev_disabled)
    }

    pub fn is_next_disabled(&self) -> bool {
        self.controls_state().map_or(true, |state| state.is_next_disabled)
    }

    pub fn controls_state(&self) -> Option<ControlsState> {
        lock(&self.inner.session).as_ref().map(Navigator::controls_state)
    }

    /// What the drawing surface currently shows.
    pub fn frame(&self) -> Option<Frame> {
        self.sequencer().and_then(|seq| seq.frame())
    }

    pub fn render_status(&self) -> Option<watch::Receiver<RenderStatus>> {
        self.sequencer().map(|seq| seq.subscribe())
    }

    /// Finished renders of the current document. The feed ends when the
    /// document is replaced or the viewer is dropped.
    pub fn render_feed(&self) -> Option<RenderFeed<E>> {
        self.sequencer().map(|seq| seq.feed())
    }

    /// Wait until no render is in flight. Returns immediately without a document.
    pub async fn settled(&self) {
        if let Some(seq) = self.sequencer() {
            seq.settled().await;
        }
    }

    /// An imperative handle for embedders.
    pub fn handle(&self) -> ViewerHandle<E> {
        ViewerHandle {
            viewer: Arc::downgrade(&self.inner),
        }
    }

    fn sequencer(&self) -> Option<PageRenderSequencer<E>> {
        lock(&self.inner.session)
            .as_ref()
            .map(|nav| nav.renderer().clone())
    }

    fn navigate(&self, op: impl FnOnce(&mut Session<E>) -> Option<PageChange>) -> Option<PageChange> {
        let change = {
            let mut session = lock(&self.inner.session);
            let navigator = session.as_mut()?;
            let change = op(navigator)?;
            self.inner.page.send_replace(change);
            lock(&self.inner.outbox)
                .queue
                .push_back((Some(change), navigator.controls_state()));
            change
        };

        self.deliver();
        Some(change)
    }

    /// Run hooks and controls for queued notifications, outside every lock.
    ///
    /// Only one caller delivers at a time; anyone arriving meanwhile (another
    /// thread, or a hook navigating re-entrantly) just queues, so the last
    /// controls state presented is always the newest one.
    fn deliver(&self) {
        {
            let mut outbox = lock(&self.inner.outbox);
            if outbox.delivering {
                return;
            }
            outbox.delivering = true;
        }

        let _delivery = Delivery(&self.inner.outbox);
        loop {
            let next = {
                let mut outbox = lock(&self.inner.outbox);
                let next = outbox.queue.pop_front();
                if next.is_none() {
                    outbox.delivering = false;
                }
                next
            };
            let Some((change, state)) = next else {
                break;
            };

            if let (Some(change), Some(hook)) = (change, &self.inner.hooks.on_page_change) {
                hook(change.page, change.total_pages);
            }
            self.present_controls(state);
        }
    }

    fn present_controls(&self, state: ControlsState) {
        let prev = Arc::downgrade(&self.inner);
        let next = Arc::downgrade(&self.inner);
        let props = ControlsProps {
            state,
            on_prev_page: Arc::new(move || {
                if let Some(inner) = prev.upgrade() {
                    Viewer { inner }.previous();
                }
            }),
            on_next_page: Arc::new(move || {
                if let Some(inner) = next.upgrade() {
                    Viewer { inner }.next();
                }
            }),
        };
        self.inner.controls.present(&props);
    }

    fn fail(&self, generation: u64, err: ViewerError) -> ViewerError {
        error!("{}", err);
        if self.inner.generation.load(Ordering::SeqCst) == generation {
            self.inner.phase.send_replace(ViewerPhase::Failed(err.clone()));
        }
        err
    }
}

/// The imperative API handed to embedders. Does not keep the viewer alive.
pub struct ViewerHandle<E: RenderEngine> {
    viewer: Weak<ViewerInner<E>>,
}

impl<E: RenderEngine> Clone for ViewerHandle<E> {
    fn clone(&self) -> Self {
        Self {
            viewer: Weak::clone(&self.viewer),
        }
    }
}

impl<E: RenderEngine> ViewerHandle<E> {
    fn upgrade(&self) -> Option<Viewer<E>> {
        self.viewer.upgrade().map(|inner| Viewer { inner })
    }

    /// 0 when no document is loaded or the viewer is gone.
    pub fn get_current_page(&self) -> u32 {
        self.upgrade().map_or(0, |viewer| viewer.get_current_page())
    }

    /// Out-of-range pages are ignored.
    pub fn go_to_page(&self, page: u32) {
        if let Some(viewer) = self.upgrade() {
            viewer.go_to_page(page);
        }
    }
}
