//! MuPDF-backed rasterizer

use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::raster::{RasterDocument, Rasterizer, check_page};
use super::request::{CancelToken, RasterFault};
use super::types::PageBitmap;
use crate::geometry::{PageSize, RasterScale};

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Default, Clone, Copy)]
pub struct MupdfRasterizer;

impl Rasterizer for MupdfRasterizer {
    fn open(&self, bytes: &[u8]) -> Result<Box<dyn RasterDocument>, RasterFault> {
        let doc = Document::from_bytes(bytes, PDF_MIME)?;
        let page_count = doc.page_count()? as usize;
        Ok(Box::new(MupdfDocument { doc, page_count }))
    }
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl RasterDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page_size(&self, page_number: usize) -> Result<PageSize, RasterFault> {
        check_page(page_number, self.page_count)?;
        let page = self.doc.load_page((page_number - 1) as i32)?;
        let bounds = page.bounds()?;
        Ok(PageSize {
            width: bounds.x1 - bounds.x0,
            height: bounds.y1 - bounds.y0,
        })
    }

    fn render_page(
        &self,
        page_number: usize,
        scale: RasterScale,
        cancel: &CancelToken,
    ) -> Result<PageBitmap, RasterFault> {
        check_page(page_number, self.page_count)?;
        let page = self.doc.load_page((page_number - 1) as i32)?;

        if cancel.is_cancelled() {
            return Err(RasterFault::Cancelled);
        }

        let transform = Matrix::new_scale(scale.factor(), scale.factor());
        let rgb = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&transform, &rgb, false, false)?;

        if cancel.is_cancelled() {
            return Err(RasterFault::Cancelled);
        }

        let pixels = pixmap_to_rgb(&pixmap)?;

        Ok(PageBitmap {
            pixels,
            width_px: pixmap.width(),
            height_px: pixmap.height(),
            page_number,
            scale,
        })
    }
}

fn pixmap_to_rgb(pixmap: &Pixmap) -> Result<Vec<u8>, RasterFault> {
    let n = pixmap.n() as usize;
    if n < 3 {
        return Err(RasterFault::generic(format!(
            "Unsupported pixmap format: {n} channels"
        )));
    }

    let width = pixmap.width() as usize;
    let height = pixmap.height() as usize;
    let stride = pixmap.stride() as usize;
    let samples = pixmap.samples();
    let row_bytes = width * n;
    let expected_min = stride.saturating_mul(height);
    if samples.len() < expected_min || row_bytes > stride {
        return Err(RasterFault::generic("Pixmap buffer size mismatch"));
    }

    let mut out = Vec::with_capacity(width * height * 3);
    for y in 0..height {
        let row_start = y * stride;
        let row = &samples[row_start..row_start + row_bytes];
        if n == 3 {
            out.extend_from_slice(row);
        } else {
            for px in row.chunks_exact(n) {
                out.extend_from_slice(&px[..3]);
            }
        }
    }

    Ok(out)
}
