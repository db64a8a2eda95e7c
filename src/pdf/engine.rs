//! The contract between the viewer and whatever engine rasterizes pages.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::DocumentSource;
use crate::error::EngineError;

/// A loaded document as seen by the viewer.
pub trait DocumentHandle: Clone + Send + Sync + 'static {
    /// Total number of pages. Fixed once the document is loaded.
    fn page_count(&self) -> u32;
}

/// An external engine that parses documents and rasterizes their pages.
///
/// Every operation is asynchronous and may fail; callers never assume a
/// synchronous completion. Page numbers are 1-based.
pub trait RenderEngine: Send + Sync + 'static {
    type Document: DocumentHandle;
    type Page: Send + 'static;

    fn load_document(
        &self,
        source: &DocumentSource,
    ) -> impl Future<Output = Result<Self::Document, EngineError>> + Send;

    fn get_page(
        &self,
        document: &Self::Document,
        number: u32,
    ) -> impl Future<Output = Result<Self::Page, EngineError>> + Send;

    /// Rasterize `page` at `scale` (1.0 = 72 DPI).
    fn render(
        &self,
        page: &Self::Page,
        scale: f32,
    ) -> impl Future<Output = Result<PageBitmap, EngineError>> + Send;
}

/// Pixel dimensions of a page at a given scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Scale a page size given in PDF points. Never smaller than 1x1.
    pub fn at_scale(width_pt: f32, height_pt: f32, scale: f32) -> Self {
        let px = |pt: f32| ((pt * scale).round().max(1.0)) as u32;
        Self {
            width: px(width_pt),
            height: px(height_pt),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// A rasterized page: tightly packed RGBA8 rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageBitmap {
    viewport: Viewport,
    pixels: Arc<[u8]>,
}

impl PageBitmap {
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let viewport = Viewport { width, height };
        if pixels.len() != viewport.byte_len() {
            return Err(EngineError::RenderError(format!(
                "bitmap of {}x{} needs {} bytes, got {}",
                width,
                height,
                viewport.byte_len(),
                pixels.len()
            )));
        }
        Ok(Self {
            viewport,
            pixels: pixels.into(),
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub(crate) fn into_pixels(self) -> Arc<[u8]> {
        self.pixels
    }
}
