//! End-to-end viewer behaviour against a scripted engine.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pageturn_lib::{
    DocumentHandle, DocumentSource, EngineError, PageBitmap, RenderEngine, Viewer, ViewerError,
    ViewerHooks, ViewerOptions, ViewerPhase,
};
use tokio::sync::Semaphore;

#[derive(Clone)]
struct Doc(u32);

impl DocumentHandle for Doc {
    fn page_count(&self) -> u32 {
        self.0
    }
}

/// Each render blocks until the test releases it.
struct ScriptedEngine {
    pages: u32,
    gate: Semaphore,
    failing: HashSet<u32>,
    calls: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedEngine {
    fn new(pages: u32, failing: &[u32]) -> Arc<Self> {
        Arc::new(Self {
            pages,
            gate: Semaphore::new(0),
            failing: failing.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    fn release(&self, renders: usize) {
        self.gate.add_permits(renders);
    }

    fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

impl RenderEngine for ScriptedEngine {
    type Document = Doc;
    type Page = u32;

    async fn load_document(&self, _source: &DocumentSource) -> Result<Doc, EngineError> {
        Ok(Doc(self.pages))
    }

    async fn get_page(&self, _document: &Doc, number: u32) -> Result<u32, EngineError> {
        Ok(number)
    }

    async fn render(&self, page: &u32, _scale: f32) -> Result<PageBitmap, EngineError> {
        self.calls.lock().unwrap().push(*page);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let permit = self.gate.acquire().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        permit
            .map_err(|e| EngineError::RenderError(e.to_string()))?
            .forget();

        if self.failing.contains(page) {
            return Err(EngineError::RenderError(format!("page {} failed", page)));
        }
        PageBitmap::from_rgba(1, 1, vec![*page as u8, 0, 0, 255])
    }
}

async fn open(engine: &Arc<ScriptedEngine>, hooks: ViewerHooks) -> Viewer<ScriptedEngine> {
    let viewer = Viewer::new(Arc::clone(engine), ViewerOptions::new("manual.pdf"), hooks);
    viewer.load().await.expect("document loads");
    viewer
}

#[tokio::test]
async fn ten_page_document_opens_on_first_page() {
    let engine = ScriptedEngine::new(10, &[]);
    let viewer = open(&engine, ViewerHooks::new()).await;

    assert_eq!(viewer.phase(), ViewerPhase::Ready { total_pages: 10 });
    assert_eq!(viewer.get_current_page(), 1);
    assert!(viewer.is_previous_disabled());
    assert!(!viewer.is_next_disabled());
}

#[tokio::test]
async fn rapid_next_renders_only_the_latest_page() {
    let engine = ScriptedEngine::new(10, &[]);
    let viewer = open(&engine, ViewerHooks::new()).await;

    // Page 1 is still rendering
    tokio::task::yield_now().await;
    viewer.next();
    viewer.next();
    viewer.next();
    assert_eq!(viewer.get_current_page(), 4);

    engine.release(2);
    viewer.settled().await;

    assert_eq!(engine.calls(), vec![1, 4]);
    assert_eq!(engine.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(viewer.frame().map(|f| f.page), Some(4));
    assert_eq!(viewer.get_current_page(), 4);
}

#[tokio::test]
async fn boundary_navigation_issues_no_render() {
    let engine = ScriptedEngine::new(2, &[]);
    let viewer = open(&engine, ViewerHooks::new()).await;
    engine.release(10);
    viewer.settled().await;

    assert!(viewer.previous().is_none());
    assert_eq!(viewer.get_current_page(), 1);

    viewer.go_to_page(2);
    viewer.settled().await;
    assert!(viewer.next().is_none());
    assert!(viewer.go_to_page(3).is_none());
    assert!(viewer.go_to_page(0).is_none());
    viewer.settled().await;

    assert_eq!(viewer.get_current_page(), 2);
    assert_eq!(engine.calls(), vec![1, 2]);
}

#[tokio::test]
async fn go_to_notifies_exactly_once() {
    let changes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&changes);
    let hooks = ViewerHooks::new().on_page_change(move |page, total| sink.lock().unwrap().push((page, total)));
    let engine = ScriptedEngine::new(10, &[]);
    let viewer = open(&engine, hooks).await;

    let handle = viewer.handle();
    handle.go_to_page(6);
    handle.go_to_page(42);

    assert_eq!(handle.get_current_page(), 6);
    assert_eq!(*changes.lock().unwrap(), vec![(6, 10)]);
    assert_eq!(viewer.subscribe().borrow().page, 6);
}

#[tokio::test]
async fn failed_render_does_not_block_later_navigation() {
    let engine = ScriptedEngine::new(10, &[5]);
    let viewer = open(&engine, ViewerHooks::new()).await;
    engine.release(1);
    viewer.settled().await;

    viewer.go_to_page(5);
    engine.release(1);
    viewer.settled().await;
    assert_eq!(viewer.get_current_page(), 5);

    let status = viewer.render_status().unwrap().borrow().clone();
    let failure = status.last_failure.expect("page 5 failed");
    assert!(matches!(ViewerError::from(&failure), ViewerError::PageRender { page: 5, .. }));
    assert!(status.state.is_idle());

    viewer.go_to_page(6);
    engine.release(1);
    viewer.settled().await;

    assert_eq!(engine.calls(), vec![1, 5, 6]);
    assert_eq!(viewer.frame().map(|f| f.page), Some(6));
}

#[tokio::test]
async fn pending_page_survives_a_failed_render() {
    let engine = ScriptedEngine::new(10, &[5]);
    let viewer = open(&engine, ViewerHooks::new()).await;
    engine.release(1);
    viewer.settled().await;

    viewer.go_to_page(5);
    tokio::task::yield_now().await;
    viewer.go_to_page(8);
    engine.release(2);
    viewer.settled().await;

    assert_eq!(engine.calls(), vec![1, 5, 8]);
    assert_eq!(viewer.frame().map(|f| f.page), Some(8));
}

#[tokio::test]
async fn render_feed_closes_when_viewer_is_replaced() {
    let engine = ScriptedEngine::new(3, &[]);
    let viewer = open(&engine, ViewerHooks::new()).await;
    let mut feed = viewer.render_feed().expect("document is loaded");

    let forwarder = tokio::spawn(async move {
        let mut pages = Vec::new();
        while let Some(update) = feed.next().await {
            pages.extend(update.frame.map(|frame| frame.page));
        }
        pages
    });

    engine.release(1);
    viewer.settled().await;

    let next_engine = ScriptedEngine::new(2, &[]);
    let replacement = open(&next_engine, ViewerHooks::new()).await;
    drop(viewer);

    let forwarded = tokio::time::timeout(std::time::Duration::from_secs(1), forwarder)
        .await
        .expect("forwarder stops once the old viewer is gone")
        .unwrap();
    assert!(forwarded.len() <= 1);
    assert_eq!(replacement.get_current_page(), 1);
}
