//! PDFium-backed rendering engine.
//!
//! Note: pdfium-render's Pdfium struct is not Send+Sync, so we bind the library
//! on-demand within each blocking operation rather than storing it in shared
//! state. Only the document bytes are shared between operations.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};

use super::{DocumentHandle, DocumentSource, PageBitmap, RenderEngine, Viewport};
use crate::error::EngineError;

/// Page metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Page number (1-based)
    pub number: u32,
    /// Page width in PDF points
    pub width: f32,
    /// Page height in PDF points
    pub height: f32,
}

impl PageInfo {
    pub fn viewport(&self, scale: f32) -> Viewport {
        Viewport::at_scale(self.width, self.height, scale)
    }
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    /// Total number of pages
    pub page_count: u32,
    /// PDF version string
    pub pdf_version: String,
}

/// A document opened through PDFium.
#[derive(Debug, Clone)]
pub struct PdfiumDocument {
    bytes: Arc<Vec<u8>>,
    info: DocumentInfo,
}

impl PdfiumDocument {
    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }
}

impl DocumentHandle for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.info.page_count
    }
}

/// A page resolved through PDFium, ready to be rasterized.
#[derive(Debug, Clone)]
pub struct PdfiumPage {
    bytes: Arc<Vec<u8>>,
    info: PageInfo,
}

impl PdfiumPage {
    pub fn info(&self) -> &PageInfo {
        &self.info
    }
}

/// Rendering engine backed by a dynamically bound PDFium library.
#[derive(Debug, Clone, Default)]
pub struct PdfiumEngine {
    library_path: Option<PathBuf>,
}

impl PdfiumEngine {
    /// Bind PDFium once to make sure it is loadable, searching the usual
    /// locations. An explicit `library_path` is tried first.
    pub fn bind(library_path: Option<PathBuf>) -> Result<Self, EngineError> {
        bind_pdfium(library_path.as_deref())?;
        Ok(Self { library_path })
    }

    /// Like [`PdfiumEngine::bind`] but off the calling thread.
    pub async fn initialize(library_path: Option<PathBuf>) -> Result<Self, EngineError> {
        tokio::task::spawn_blocking(move || Self::bind(library_path))
            .await
            .map_err(|e| EngineError::InitError(e.to_string()))?
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, EngineError>
    where
        T: Send + 'static,
        F: FnOnce(&Pdfium) -> Result<T, EngineError> + Send + 'static,
    {
        let library_path = self.library_path.clone();
        tokio::task::spawn_blocking(move || {
            let pdfium = bind_pdfium(library_path.as_deref())?;
            op(&pdfium)
        })
        .await
        .map_err(|e| EngineError::RenderError(format!("PDFium worker failed: {}", e)))?
    }
}

impl RenderEngine for PdfiumEngine {
    type Document = PdfiumDocument;
    type Page = PdfiumPage;

    async fn load_document(&self, source: &DocumentSource) -> Result<PdfiumDocument, EngineError> {
        let bytes = Arc::new(source.fetch().await?);
        let shared = Arc::clone(&bytes);
        let info = self
            .blocking(move |pdfium| read_document_info(pdfium, &shared))
            .await?;
        info!("opened {} ({} pages, {})", source, info.page_count, info.pdf_version);
        Ok(PdfiumDocument { bytes, info })
    }

    async fn get_page(&self, document: &PdfiumDocument, number: u32) -> Result<PdfiumPage, EngineError> {
        if number == 0 || number > document.info.page_count {
            return Err(EngineError::InvalidPage(number));
        }
        let bytes = Arc::clone(&document.bytes);
        let shared = Arc::clone(&bytes);
        let info = self
            .blocking(move |pdfium| read_page_info(pdfium, &shared, number))
            .await?;
        Ok(PdfiumPage { bytes, info })
    }

    async fn render(&self, page: &PdfiumPage, scale: f32) -> Result<PageBitmap, EngineError> {
        let bytes = Arc::clone(&page.bytes);
        let number = page.info.number;
        let viewport = page.info.viewport(scale);
        self.blocking(move |pdfium| render_page(pdfium, &bytes, number, viewport))
            .await
    }
}

/// Bind to PDFium library and return a usable Pdfium instance.
/// This is called on-demand for each operation since Pdfium is not Send+Sync.
fn bind_pdfium(library_path: Option<&Path>) -> Result<Pdfium, EngineError> {
    static LOGGED_SUCCESS: AtomicBool = AtomicBool::new(false);

    let log_once = |how: &str| {
        if !LOGGED_SUCCESS.swap(true, Ordering::Relaxed) {
            info!("loaded PDFium {}", how);
        }
    };

    // Strategy 1: explicitly configured library
    if let Some(path) = library_path {
        let candidate = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path)
        } else {
            path.to_path_buf()
        };
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                log_once(&format!("from {:?}", candidate));
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => warn!("failed to bind configured PDFium {:?}: {:?}", candidate, e),
        }
    }

    // Strategy 2: next to the executable (bundled app), or the macOS Frameworks dir
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let mut candidates = vec![Pdfium::pdfium_platform_library_name_at_path(exe_dir)];
            if cfg!(target_os = "macos") {
                candidates.push(exe_dir.join("..").join("Frameworks").join("libpdfium.dylib"));
            }
            for candidate in candidates.into_iter().filter(|c| c.exists()) {
                match Pdfium::bind_to_library(&candidate) {
                    Ok(bindings) => {
                        log_once(&format!("bundled at {:?}", candidate));
                        return Ok(Pdfium::new(bindings));
                    }
                    Err(e) => warn!("failed bundled PDFium {:?}: {:?}", candidate, e),
                }
            }
        }
    }

    // Strategy 3: working directory, then the system library (for development)
    if let Ok(bindings) = Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path("./")) {
        log_once("from the working directory");
        return Ok(Pdfium::new(bindings));
    }
    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            log_once("from the system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => Err(EngineError::InitError(format!(
            "could not load the PDFium library: {:?}",
            e
        ))),
    }
}

fn open<'a>(pdfium: &'a Pdfium, bytes: &'a [u8]) -> Result<PdfDocument<'a>, EngineError> {
    pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| EngineError::LoadError(e.to_string()))
}

fn page_index(number: u32) -> Result<u16, EngineError> {
    number
        .checked_sub(1)
        .and_then(|index| u16::try_from(index).ok())
        .ok_or(EngineError::InvalidPage(number))
}

fn read_document_info(pdfium: &Pdfium, bytes: &[u8]) -> Result<DocumentInfo, EngineError> {
    let doc = open(pdfium, bytes)?;
    Ok(DocumentInfo {
        page_count: doc.pages().len() as u32,
        pdf_version: format!("{:?}", doc.version()),
    })
}

fn read_page_info(pdfium: &Pdfium, bytes: &[u8], number: u32) -> Result<PageInfo, EngineError> {
    let doc = open(pdfium, bytes)?;
    let page = doc
        .pages()
        .get(page_index(number)?)
        .map_err(|_| EngineError::InvalidPage(number))?;

    Ok(PageInfo {
        number,
        width: page.width().value,
        height: page.height().value,
    })
}

/// PDFium takes target sizes as `i32`.
fn target_size(viewport: Viewport) -> Result<(i32, i32), EngineError> {
    let side = |px: u32| {
        i32::try_from(px).map_err(|_| {
            EngineError::RenderError(format!(
                "target size {}x{} is too large",
                viewport.width, viewport.height
            ))
        })
    };
    Ok((side(viewport.width)?, side(viewport.height)?))
}

fn render_page(
    pdfium: &Pdfium,
    bytes: &[u8],
    number: u32,
    viewport: Viewport,
) -> Result<PageBitmap, EngineError> {
    let doc = open(pdfium, bytes)?;
    let page = doc
        .pages()
        .get(page_index(number)?)
        .map_err(|_| EngineError::InvalidPage(number))?;

    let (width, height) = target_size(viewport)?;
    let config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| EngineError::RenderError(e.to_string()))?;

    let image = bitmap.as_image().to_rgba8();
    debug!("rasterized page {} at {}x{}", number, image.width(), image.height());
    PageBitmap::from_rgba(image.width(), image.height(), image.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_index_is_zero_based() {
        assert_eq!(page_index(1), Ok(0));
        assert_eq!(page_index(70_000), Err(EngineError::InvalidPage(70_000)));
        assert_eq!(page_index(0), Err(EngineError::InvalidPage(0)));
    }

    #[test]
    fn test_page_info_viewport() {
        let info = PageInfo {
            number: 3,
            width: 595.0,
            height: 842.0,
        };
        assert_eq!(info.viewport(1.0), Viewport { width: 595, height: 842 });
        assert_eq!(info.viewport(2.0), Viewport { width: 1190, height: 1684 });
    }

    #[test]
    fn test_target_size_rejects_oversized_viewport() {
        assert_eq!(target_size(Viewport { width: 918, height: 1188 }), Ok((918, 1188)));

        // A huge scale must not wrap into a negative size
        let info = PageInfo {
            number: 1,
            width: 612.0,
            height: 792.0,
        };
        let err = target_size(info.viewport(1e7)).unwrap_err();
        assert!(matches!(err, EngineError::RenderError(_)));
    }

    #[tokio::test]
    async fn test_get_page_rejects_out_of_range_without_binding() {
        let engine = PdfiumEngine::default();
        let document = PdfiumDocument {
            bytes: Arc::new(Vec::new()),
            info: DocumentInfo {
                page_count: 2,
                pdf_version: "Pdf17".to_string(),
            },
        };
        assert_eq!(document.page_count(), 2);
        assert!(matches!(
            engine.get_page(&document, 3).await,
            Err(EngineError::InvalidPage(3))
        ));
        assert!(matches!(
            engine.get_page(&document, 0).await,
            Err(EngineError::InvalidPage(0))
        ));
    }
}
