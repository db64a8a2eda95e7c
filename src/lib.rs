// Pageturn - single-document PDF viewer
//
// A viewer component over an injected rendering engine (PDFium by default):
// single-flight page rendering, bounded navigation, replaceable controls and
// page-change notifications. The `desktop` feature hosts it in a Tauri webview.

pub mod controls;
pub mod error;
pub mod launch;
pub mod navigation;
pub mod options;
pub mod pdf;
pub mod sequencer;
pub mod surface;
mod sync;
pub mod viewer;

#[cfg(feature = "desktop")]
mod commands;

pub use controls::{ControlsProps, ControlsState, ControlsSurface, PageIndicator};
pub use error::{EngineError, ViewerError};
pub use navigation::{Navigator, PageChange};
pub use options::{ViewerOptions, DEFAULT_SCALE};
pub use pdf::{DocumentHandle, DocumentSource, PageBitmap, PdfiumEngine, RenderEngine, Viewport};
pub use sequencer::{PageRenderSequencer, RenderFeed, RenderRequest, RenderState, RenderStatus, RenderUpdate};
pub use surface::{DrawingSurface, Frame};
pub use viewer::{Viewer, ViewerHandle, ViewerHooks, ViewerPhase};

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use log::{debug, error, info, warn};
    use tauri::{Emitter, RunEvent};

    use crate::commands::{
        get_controls, get_current_page, get_frame, get_launch_file, get_viewer_phase, go_to_page,
        next_page, open_document, previous_page, AppState,
    };
    use crate::launch::{document_from_args, is_pdf_file, looks_like_pdf, url_to_file_path};

    /// Environment variable pointing at the PDFium library (file or directory).
    const PDFIUM_PATH_ENV: &str = "PAGETURN_PDFIUM_PATH";

    /// Handle file associations - extract PDF paths from URLs and emit to frontend.
    #[cfg_attr(not(any(target_os = "macos", target_os = "ios")), allow(dead_code))]
    fn handle_file_associations<R: tauri::Runtime>(app_handle: &tauri::AppHandle<R>, urls: Vec<url::Url>) {
        debug!("received file open event with {} URLs", urls.len());

        for url in urls {
            let Some(path_str) = url_to_file_path(&url) else {
                warn!("could not convert URL to file path: {}", url);
                continue;
            };

            // A path that only looks like a PDF may not be readable yet; the
            // frontend reports the load error if so.
            if is_pdf_file(&path_str) || looks_like_pdf(&path_str) {
                info!("opening {}", path_str);
                if let Err(e) = app_handle.emit("open-file", &path_str) {
                    error!("failed to emit open-file event: {}", e);
                }
                // Only open the first PDF
                return;
            }
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        let pdfium_path = std::env::var_os(PDFIUM_PATH_ENV).map(std::path::PathBuf::from);

        // Check for PDF file in launch arguments (Windows/Linux primarily)
        let launch_file = document_from_args(std::env::args().skip(1));
        if let Some(ref file) = launch_file {
            info!("launch file from args: {}", file);
        }

        let app = tauri::Builder::default()
            .manage(AppState::new(pdfium_path, launch_file))
            .invoke_handler(tauri::generate_handler![
                open_document,
                get_current_page,
                go_to_page,
                next_page,
                previous_page,
                get_controls,
                get_viewer_phase,
                get_frame,
                get_launch_file,
            ])
            .build(tauri::generate_context!());

        let app = match app {
            Ok(app) => app,
            Err(e) => {
                error!("error while building tauri application: {}", e);
                return;
            }
        };

        app.run(|_app_handle, _event| {
            match _event {
                // Handle macOS "Open With" / double-click file associations
                #[cfg(any(target_os = "macos", target_os = "ios"))]
                RunEvent::Opened { urls } => {
                    handle_file_associations(_app_handle, urls);
                }
                RunEvent::Exit => debug!("exiting"),
                _ => {}
            }
        });
    }
}
