//! Finding a document to open from launch arguments or OS "open with" URLs.

use std::path::Path;

use log::debug;

/// Check if a path is an existing PDF file.
pub fn is_pdf_file(path: &str) -> bool {
    let path = Path::new(path);
    path.is_file()
        && path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
}

/// Extension check only, for paths that may not be readable yet.
pub fn looks_like_pdf(path: &str) -> bool {
    path.to_lowercase().ends_with(".pdf")
}

/// Convert a `file://` URL to a path string.
pub fn url_to_file_path(url: &url::Url) -> Option<String> {
    url.to_file_path()
        .ok()
        .and_then(|p| p.to_str().map(|s| s.to_string()))
}

/// Pick the first PDF among launch arguments (executable path excluded).
///
/// Accepts direct paths, `file://` URLs and percent-encoded paths; flags are
/// skipped.
pub fn document_from_args<I>(args: I) -> Option<String>
where
    I: IntoIterator<Item = String>,
{
    for arg in args {
        if arg.starts_with('-') {
            continue;
        }

        if is_pdf_file(&arg) {
            debug!("launch document (direct): {}", arg);
            return Some(arg);
        }

        if arg.starts_with("file://") {
            if let Some(path) = url::Url::parse(&arg).ok().as_ref().and_then(url_to_file_path) {
                if is_pdf_file(&path) {
                    debug!("launch document (file URL): {}", path);
                    return Some(path);
                }
            }
        }

        if let Ok(decoded) = urlencoding::decode(&arg) {
            if decoded != arg.as_str() && is_pdf_file(&decoded) {
                debug!("launch document (URL-decoded): {}", decoded);
                return Some(decoded.into_owned());
            }
        }
    }

    None
}
