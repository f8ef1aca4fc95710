//! Render worker - runs in a dedicated thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, warn};

use super::raster::{RasterDocument, Rasterizer};
use super::request::{CancelToken, JobId, RasterFault, RenderRequest, RenderResponse};
use crate::geometry::RasterScale;

/// Main worker function.
///
/// Owns the opened document; requests are served strictly in arrival order,
/// so a cancel issued before a new request is always observed first.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    rasterizer: Arc<dyn Rasterizer>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let mut doc: Option<Box<dyn RasterDocument>> = None;

    for request in requests {
        match request {
            RenderRequest::Open { bytes } => {
                doc = match rasterizer.open(&bytes) {
                    Ok(d) => Some(d),
                    Err(e) => {
                        warn!("Render worker could not open document: {e}");
                        let _ = responses.send(RenderResponse::OpenFailed(e));
                        None
                    }
                };
            }

            RenderRequest::Page {
                id,
                page_number,
                scale,
                cancel,
            } => {
                let response = handle_page_request(doc.as_deref(), id, page_number, scale, &cancel);
                let _ = responses.send(response);
            }

            RenderRequest::Shutdown => break,
        }
    }
    debug!("Render worker exiting");
}

fn handle_page_request(
    doc: Option<&dyn RasterDocument>,
    id: JobId,
    page_number: usize,
    scale: RasterScale,
    cancel: &CancelToken,
) -> RenderResponse {
    if cancel.is_cancelled() {
        return RenderResponse::Cancelled(id);
    }

    let Some(doc) = doc else {
        return RenderResponse::Error {
            id,
            error: RasterFault::NoDocument,
        };
    };

    match doc.render_page(page_number, scale, cancel) {
        // The job may have been superseded while the rasterizer was busy
        Ok(_) if cancel.is_cancelled() => RenderResponse::Cancelled(id),
        Ok(bitmap) => RenderResponse::Page {
            id,
            page_number,
            bitmap: Arc::new(bitmap),
        },
        Err(RasterFault::Cancelled) => RenderResponse::Cancelled(id),
        Err(error) => RenderResponse::Error { id, error },
    }
}
