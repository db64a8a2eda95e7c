//! PDF engine boundary and the PDFium implementation behind it.
//!
//! This module provides:
//! - The `RenderEngine` contract the viewer drives
//! - Document source parsing and fetching (paths, file:// and http(s) URLs)
//! - A PDFium engine bound at runtime through pdfium-render

mod engine;
mod renderer;
mod source;

#[cfg(test)]
pub(crate) mod fake;

pub use engine::*;
pub use renderer::*;
pub use source::*;
