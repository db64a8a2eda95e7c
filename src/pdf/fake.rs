//! Scripted engine for unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;

use super::{DocumentHandle, DocumentSource, PageBitmap, RenderEngine};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub(crate) struct FakeDocument {
    pages: u32,
}

impl FakeDocument {
    pub(crate) fn new(pages: u32) -> Self {
        Self { pages }
    }
}

impl DocumentHandle for FakeDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }
}

/// Records every render call. With a gate, each render waits for one permit.
#[derive(Default)]
pub(crate) struct FakeEngine {
    pages: u32,
    fail_load: bool,
    failing: Mutex<HashSet<u32>>,
    gate: Option<Arc<Semaphore>>,
    calls: Mutex<Vec<u32>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeEngine {
    pub(crate) fn with_pages(pages: u32) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    pub(crate) fn gated(pages: u32) -> Self {
        Self {
            pages,
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    pub(crate) fn broken() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub(crate) fn fail_page(&self, page: u32) {
        self.failing.lock().unwrap().insert(page);
    }

    /// Let `renders` gated render calls complete.
    pub(crate) fn release(&self, renders: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(renders);
        }
    }

    pub(crate) fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl RenderEngine for FakeEngine {
    type Document = FakeDocument;
    type Page = u32;

    async fn load_document(&self, source: &DocumentSource) -> Result<FakeDocument, EngineError> {
        tokio::task::yield_now().await;
        if self.fail_load {
            return Err(EngineError::LoadError(format!("cannot open {}", source)));
        }
        Ok(FakeDocument { pages: self.pages })
    }

    async fn get_page(&self, document: &FakeDocument, number: u32) -> Result<u32, EngineError> {
        if number == 0 || number > document.pages {
            return Err(EngineError::InvalidPage(number));
        }
        Ok(number)
    }

    async fn render(&self, page: &u32, _scale: f32) -> Result<PageBitmap, EngineError> {
        let page = *page;
        self.calls.lock().unwrap().push(page);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        match &self.gate {
            Some(gate) => match gate.acquire().await {
                Ok(permit) => permit.forget(),
                Err(e) => {
                    self.in_flight.fetch_sub(1, Ordering::SeqCst);
                    return Err(EngineError::RenderError(e.to_string()));
                }
            },
            None => tokio::task::yield_now().await,
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.lock().unwrap().contains(&page) {
            return Err(EngineError::RenderError(format!("page {} is corrupt", page)));
        }
        PageBitmap::from_rgba(2, 2, vec![page as u8; 16])
    }
}
