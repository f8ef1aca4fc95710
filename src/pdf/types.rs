//! Core types for page rasterization

use std::path::Path;

use crate::geometry::{PageSize, RasterScale};

/// Rendered page bitmap.
///
/// Contains RGB pixel data sized exactly to the page viewport at the scale it
/// was rendered with.
#[derive(Clone)]
pub struct PageBitmap {
    /// Raw RGB pixel data (3 bytes per pixel: R, G, B)
    pub pixels: Vec<u8>,
    /// Image width in pixels
    pub width_px: u32,
    /// Image height in pixels
    pub height_px: u32,
    /// Page number (1-indexed)
    pub page_number: usize,
    /// Scale factor used for rendering
    pub scale: RasterScale,
}

impl PageBitmap {
    /// Write the bitmap out as a PNG file
    pub fn save_png(&self, path: &Path) -> image::ImageResult<()> {
        image::save_buffer(
            path,
            &self.pixels,
            self.width_px,
            self.height_px,
            image::ExtendedColorType::Rgb8,
        )
    }
}

impl std::fmt::Debug for PageBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageBitmap")
            .field("page_number", &self.page_number)
            .field("width_px", &self.width_px)
            .field("height_px", &self.height_px)
            .field("scale", &self.scale)
            .field("pixels_len", &self.pixels.len())
            .finish()
    }
}

/// Document metadata captured when a document is opened
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// Page sizes in PDF units, index 0 is page 1
    pub page_sizes: Vec<PageSize>,
}

impl DocumentInfo {
    /// Size of a 1-indexed page
    #[must_use]
    pub fn page_size(&self, page_number: usize) -> Option<PageSize> {
        page_number
            .checked_sub(1)
            .and_then(|idx| self.page_sizes.get(idx))
            .copied()
    }
}
