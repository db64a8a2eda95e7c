//! Viewer configuration.

use serde::{Deserialize, Serialize};

use crate::error::ViewerError;

/// Render scale used when none is configured (1.0 = 72 DPI).
pub const DEFAULT_SCALE: f32 = 1.5;

fn default_scale() -> f32 {
    DEFAULT_SCALE
}

/// Declarative viewer options, as an embedder would pass them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    /// Path, `file://` URL or `http(s)://` URL of the document
    #[serde(alias = "pdfUrl")]
    pub document_url: String,

    #[serde(default = "default_scale")]
    pub scale: f32,
}

impl ViewerOptions {
    pub fn new(document_url: impl Into<String>) -> Self {
        Self {
            document_url: document_url.into(),
            scale: DEFAULT_SCALE,
        }
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, ViewerError> {
        let options: Self =
            serde_json::from_str(json).map_err(|e| ViewerError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.document_url.trim().is_empty() {
            return Err(ViewerError::InvalidOptions("documentUrl is required".to_string()));
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ViewerError::InvalidOptions(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        Ok(())
    }
}
