//! Error types shared by the engine collaborator and the viewer shell.

use serde::Serialize;
use thiserror::Error;

/// Errors reported by a rendering engine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Failed to initialize PDFium: {0}")]
    InitError(String),

    #[error("Failed to fetch document: {0}")]
    FetchError(String),

    #[error("Failed to load PDF: {0}")]
    LoadError(String),

    #[error("Invalid page number: {0}")]
    InvalidPage(u32),

    #[error("Rendering failed: {0}")]
    RenderError(String),

    #[error("Image encoding failed: {0}")]
    ImageError(String),
}

impl Serialize for EngineError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Errors surfaced to whoever embeds the viewer.
///
/// Out-of-range navigation is deliberately absent: it is a no-op, not a failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ViewerError {
    /// The rendering engine could not be initialized. Terminal for the viewer.
    #[error("Rendering engine unavailable: {0}")]
    EngineLoad(String),

    /// The document could not be fetched or parsed. Terminal for that document.
    #[error("Failed to load document: {0}")]
    DocumentLoad(String),

    /// A single page failed to render. Later navigation still works.
    #[error("Failed to render page {page}: {message}")]
    PageRender { page: u32, message: String },

    #[error("No document loaded")]
    NotReady,

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Invalid viewer options: {0}")]
    InvalidOptions(String),
}

impl Serialize for ViewerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
