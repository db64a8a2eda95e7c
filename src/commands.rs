//! Tauri commands for the viewer.
//!
//! These commands expose the viewer's imperative API to the WebView frontend
//! via IPC, and forward its notifications as events:
//! `document-load`, `page-change`, `controls-changed`, `page-rendered` and
//! `render-failed`.

use std::path::PathBuf;
use std::sync::Mutex;

use log::warn;
use serde::Serialize;
use tauri::{AppHandle, Emitter, State};

use crate::controls::{ControlsProps, ControlsState, ControlsSurface};
use crate::error::ViewerError;
use crate::navigation::PageChange;
use crate::options::ViewerOptions;
use crate::pdf::PdfiumEngine;
use crate::sync::lock;
use crate::viewer::{Viewer, ViewerHooks, ViewerPhase};

/// Application state: the one viewer the window shows.
pub struct AppState {
    viewer: Mutex<Option<Viewer<PdfiumEngine>>>,
    /// Explicit PDFium location (file or directory), if configured
    pdfium_path: Option<PathBuf>,
    /// PDF passed on launch, handed out once
    launch_file: Mutex<Option<String>>,
}

impl AppState {
    pub fn new(pdfium_path: Option<PathBuf>, launch_file: Option<String>) -> Self {
        Self {
            viewer: Mutex::new(None),
            pdfium_path,
            launch_file: Mutex::new(launch_file),
        }
    }

    fn viewer(&self) -> Result<Viewer<PdfiumEngine>, ViewerError> {
        lock(&self.viewer).clone().ok_or(ViewerError::NotReady)
    }
}

/// A rendered page as shipped to the webview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage {
    pub page: u32,
    pub width: u32,
    pub height: u32,
    pub data_url: String,
}

fn emit<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) {
    if let Err(e) = app.emit(event, payload) {
        warn!("failed to emit {}: {}", event, e);
    }
}

/// Controls surface that lets the webview draw the buttons.
struct WebviewControls {
    app: AppHandle,
}

impl ControlsSurface for WebviewControls {
    fn present(&self, props: &ControlsProps) {
        emit(&self.app, "controls-changed", props.state);
    }
}

/// Open a document, replacing whatever was shown. Returns the page count.
#[tauri::command]
pub async fn open_document(
    options: ViewerOptions,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<u32, ViewerError> {
    options.validate()?;

    let on_load = app.clone();
    let on_change = app.clone();
    let hooks = ViewerHooks::new()
        .on_document_load(move |total| emit(&on_load, "document-load", total))
        .on_page_change(move |page, total_pages| {
            emit(&on_change, "page-change", PageChange { page, total_pages })
        })
        .render_controls(WebviewControls { app: app.clone() });

    let viewer = Viewer::initialize(
        PdfiumEngine::initialize(state.pdfium_path.clone()),
        options,
        hooks,
    )
    .await;
    *lock(&state.viewer) = Some(viewer.clone());

    let total = viewer.load().await?;
    forward_renders(app, &viewer);
    Ok(total)
}

/// Push every finished render to the webview until the document is replaced.
fn forward_renders(app: AppHandle, viewer: &Viewer<PdfiumEngine>) {
    let Some(mut feed) = viewer.render_feed() else {
        return;
    };

    tauri::async_runtime::spawn(async move {
        // The feed only holds the sequencer weakly: it ends when the viewer
        // loads another document or is replaced in `AppState`.
        while let Some(update) = feed.next().await {
            if let Some(failure) = &update.failure {
                emit(&app, "render-failed", ViewerError::from(failure));
            }
            let Some(frame) = update.frame else {
                continue;
            };
            match frame.to_data_url() {
                Ok(data_url) => emit(
                    &app,
                    "page-rendered",
                    RenderedPage {
                        page: frame.page,
                        width: frame.viewport.width,
                        height: frame.viewport.height,
                        data_url,
                    },
                ),
                Err(e) => warn!("failed to encode page {}: {}", frame.page, e),
            }
        }
    });
}

#[tauri::command]
pub fn get_current_page(state: State<AppState>) -> u32 {
    state.viewer().map_or(0, |viewer| viewer.get_current_page())
}

#[tauri::command]
pub fn go_to_page(page: u32, state: State<AppState>) -> Result<Option<PageChange>, ViewerError> {
    Ok(state.viewer()?.go_to_page(page))
}

#[tauri::command]
pub fn next_page(state: State<AppState>) -> Result<Option<PageChange>, ViewerError> {
    Ok(state.viewer()?.next())
}

#[tauri::command]
pub fn previous_page(state: State<AppState>) -> Result<Option<PageChange>, ViewerError> {
    Ok(state.viewer()?.previous())
}

#[tauri::command]
pub fn get_controls(state: State<AppState>) -> Result<ControlsState, ViewerError> {
    state.viewer()?.controls_state().ok_or(ViewerError::NotReady)
}

#[tauri::command]
pub fn get_viewer_phase(state: State<AppState>) -> ViewerPhase {
    state
        .viewer()
        .map_or(ViewerPhase::Uninitialized, |viewer| viewer.phase())
}

/// The surface as a PNG data URL, if anything has rendered yet.
#[tauri::command]
pub fn get_frame(state: State<AppState>) -> Result<Option<String>, ViewerError> {
    let Some(frame) = state.viewer()?.frame() else {
        return Ok(None);
    };
    frame
        .to_data_url()
        .map(Some)
        .map_err(|e| ViewerError::PageRender {
            page: frame.page,
            message: e.to_string(),
        })
}

/// Get the file path that was passed on launch (if any).
/// Frontend calls this on startup to check if a PDF should be opened.
#[tauri::command]
pub fn get_launch_file(state: State<AppState>) -> Option<String> {
    lock(&state.launch_file).take()
}
