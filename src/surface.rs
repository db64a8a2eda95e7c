//! The raster target pages are drawn onto.

use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use image::{ImageFormat, RgbaImage};

use crate::error::EngineError;
use crate::pdf::{PageBitmap, Viewport};

/// Single-buffered RGBA surface. Each render replaces its whole content and
/// resizes it to the rendered page's viewport.
#[derive(Debug, Clone)]
pub struct DrawingSurface {
    page: Option<u32>,
    viewport: Viewport,
    pixels: Arc<[u8]>,
}

impl Default for DrawingSurface {
    fn default() -> Self {
        Self {
            page: None,
            viewport: Viewport::default(),
            pixels: Arc::from(Vec::new()),
        }
    }
}

impl DrawingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(&mut self, page: u32, bitmap: PageBitmap) {
        self.viewport = bitmap.viewport();
        self.pixels = bitmap.into_pixels();
        self.page = Some(page);
    }

    /// The page currently shown, if any render has landed.
    pub fn page(&self) -> Option<u32> {
        self.page
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn snapshot(&self) -> Option<Frame> {
        self.page.map(|page| Frame {
            page,
            viewport: self.viewport,
            pixels: Arc::clone(&self.pixels),
        })
    }
}

/// An immutable copy of what the surface showed at some instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub page: u32,
    pub viewport: Viewport,
    pub pixels: Arc<[u8]>,
}

impl Frame {
    pub fn to_png(&self) -> Result<Vec<u8>, EngineError> {
        let image = RgbaImage::from_raw(self.viewport.width, self.viewport.height, self.pixels.to_vec())
            .ok_or_else(|| EngineError::ImageError("frame buffer does not match its size".to_string()))?;

        let mut png_bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
            .map_err(|e| EngineError::ImageError(e.to_string()))?;
        Ok(png_bytes)
    }

    /// PNG encoded as a `data:` URL, ready for an `<img>` in the webview.
    pub fn to_data_url(&self) -> Result<String, EngineError> {
        let png = self.to_png()?;
        Ok(format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_overwrites_and_resizes() {
        let mut surface = DrawingSurface::new();
        assert!(surface.snapshot().is_none());

        surface.present(1, PageBitmap::from_rgba(2, 1, vec![10; 8]).unwrap());
        surface.present(7, PageBitmap::from_rgba(1, 3, vec![20; 12]).unwrap());

        let frame = surface.snapshot().unwrap();
        assert_eq!(frame.page, 7);
        assert_eq!(frame.viewport, Viewport { width: 1, height: 3 });
        assert!(frame.pixels.iter().all(|&b| b == 20));
        assert_eq!(surface.page(), Some(7));
    }

    #[test]
    fn test_frame_encodes_png_data_url() {
        let mut surface = DrawingSurface::new();
        surface.present(2, PageBitmap::from_rgba(3, 2, vec![255; 24]).unwrap());
        let frame = surface.snapshot().unwrap();

        let png = frame.to_png().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let url = frame.to_data_url().unwrap();
        assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo"));
    }
}
