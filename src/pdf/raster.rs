//! Rasterizer abstraction
//!
//! The render worker only talks to these traits, so the controller can be
//! driven by MuPDF in the binary and by a scripted fake in tests.

use super::request::{CancelToken, RasterFault};
use super::types::{DocumentInfo, PageBitmap};
use crate::geometry::{PageSize, RasterScale};

/// Opens PDF bytes for rendering.
///
/// Shared between the controller (metadata probe) and the worker thread.
pub trait Rasterizer: Send + Sync {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn RasterDocument>, RasterFault>;
}

/// A document opened by a [`Rasterizer`]. Page numbers are 1-indexed.
pub trait RasterDocument {
    fn page_count(&self) -> usize;

    fn page_size(&self, page_number: usize) -> Result<PageSize, RasterFault>;

    /// Render a page into a bitmap sized to `page_size(page_number) * scale`.
    ///
    /// Implementations should check `cancel` whenever they can and return
    /// [`RasterFault::Cancelled`] once it is set.
    fn render_page(
        &self,
        page_number: usize,
        scale: RasterScale,
        cancel: &CancelToken,
    ) -> Result<PageBitmap, RasterFault>;

    fn info(&self) -> Result<DocumentInfo, RasterFault> {
        let page_count = self.page_count();
        let page_sizes = (1..=page_count)
            .map(|page| self.page_size(page))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentInfo {
            page_count,
            page_sizes,
        })
    }
}

/// Check a 1-indexed page number against a page count
pub fn check_page(page_number: usize, page_count: usize) -> Result<(), RasterFault> {
    if page_number == 0 || page_number > page_count {
        Err(RasterFault::PageOutOfRange {
            page_number,
            page_count,
        })
    } else {
        Ok(())
    }
}
