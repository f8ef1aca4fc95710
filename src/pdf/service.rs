//! Render controller - owns the worker thread and the single active job

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use super::raster::Rasterizer;
use super::request::{CancelToken, JobId, RasterFault, RenderRequest, RenderResponse};
use super::state::{Command, Effect, RenderState};
use super::types::{DocumentInfo, PageBitmap};
use super::worker::render_worker;
use crate::geometry::{PageLayout, RasterScale, ScreenPoint};

const WORKER_GONE: &str = "render worker is not running";

/// Where the controller is in its per-view state machine
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Rendering(JobId),
    /// The last job was cancelled and nothing replaced it yet
    Cancelled(JobId),
    /// The last job failed; the previous frame is still on display
    Failed { id: JobId, message: String },
}

/// User-relevant outcome of a render job
#[derive(Debug)]
pub enum RenderEvent {
    Frame {
        id: JobId,
        page_number: usize,
        bitmap: Arc<PageBitmap>,
    },
    Failed {
        id: JobId,
        page_number: usize,
        error: RasterFault,
    },
}

#[derive(Debug)]
struct ActiveJob {
    id: JobId,
    page_number: usize,
    cancel: CancelToken,
}

/// Manages page rasterization for one open document.
///
/// At most one job is active. Starting a job always cancels the previous
/// one first, and any result that does not belong to the active job is
/// dropped on arrival.
pub struct RenderController {
    state: RenderState,
    rasterizer: Arc<dyn Rasterizer>,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_job_id: u64,
    active: Option<ActiveJob>,
    phase: RenderPhase,
    frame: Option<Arc<PageBitmap>>,
    doc_info: Option<DocumentInfo>,
    worker: Option<JoinHandle<()>>,
}

impl RenderController {
    #[must_use]
    pub fn new(rasterizer: Arc<dyn Rasterizer>, scale: RasterScale) -> Self {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let worker_rasterizer = Arc::clone(&rasterizer);
        let worker = std::thread::Builder::new()
            .name("pdfstamp-render".into())
            .spawn(move || render_worker(worker_rasterizer, request_rx, response_tx))
            .map_err(|e| error!("Failed to spawn render worker: {e}"))
            .ok();

        Self {
            state: RenderState::new(scale),
            rasterizer,
            request_tx,
            response_rx,
            next_job_id: 1,
            active: None,
            phase: RenderPhase::Idle,
            frame: None,
            doc_info: None,
            worker,
        }
    }

    /// Replace the displayed document and render it.
    ///
    /// With `keep_page` the current page number survives (clamped to the new
    /// page count), otherwise the view starts at page 1.
    pub fn load_document(
        &mut self,
        bytes: Arc<[u8]>,
        keep_page: bool,
    ) -> Result<&DocumentInfo, RasterFault> {
        let info = self.rasterizer.open(&bytes)?.info()?;
        if info.page_count == 0 {
            return Err(RasterFault::generic("document has no pages"));
        }
        info!("Loaded document with {} pages", info.page_count);

        self.cancel_active();
        if !keep_page {
            self.state.page_number = 1;
        }
        if self.request_tx.send(RenderRequest::Open { bytes }).is_err() {
            error!("Render worker is not running, document not handed over");
        }

        let _ = self.apply_command(Command::SetPageCount(info.page_count));
        let _ = self.apply_command(Command::Rerender);

        Ok(self.doc_info.insert(info))
    }

    /// Apply a command to the view state, returning the job it started
    pub fn apply_command(&mut self, cmd: Command) -> Option<JobId> {
        let effects = self.state.apply(cmd);
        let mut started = None;
        for effect in effects {
            match effect {
                Effect::RenderCurrentPage => {
                    started = Some(self.request_render(self.state.page_number));
                }
            }
        }
        started
    }

    pub fn next_page(&mut self) -> Option<JobId> {
        self.apply_command(Command::NextPage)
    }

    pub fn previous_page(&mut self) -> Option<JobId> {
        self.apply_command(Command::PreviousPage)
    }

    /// Start rendering `page_number`, cancelling whatever is in flight
    pub fn request_render(&mut self, page_number: usize) -> JobId {
        self.cancel_active();

        let id = self.next_id();
        let cancel = CancelToken::new();
        let sent = self.request_tx.send(RenderRequest::Page {
            id,
            page_number,
            scale: self.state.scale,
            cancel: cancel.clone(),
        });
        if sent.is_err() {
            error!("Render worker is not running, page {page_number} not rendered");
            self.phase = RenderPhase::Failed {
                id,
                message: WORKER_GONE.to_string(),
            };
            return id;
        }
        debug!("Requested render {id} for page {page_number}");

        self.active = Some(ActiveJob {
            id,
            page_number,
            cancel,
        });
        self.phase = RenderPhase::Rendering(id);
        id
    }

    fn cancel_active(&mut self) {
        if let Some(job) = self.active.take() {
            job.cancel.cancel();
            debug!("Cancelled render {} for page {}", job.id, job.page_number);
            self.phase = RenderPhase::Cancelled(job.id);
        }
    }

    /// Drain finished jobs without blocking
    pub fn poll(&mut self) -> Vec<RenderEvent> {
        let mut events = vec![];
        while let Ok(response) = self.response_rx.try_recv() {
            if let Some(event) = self.handle_response(response) {
                events.push(event);
            }
        }
        events
    }

    /// Block until the active job settles or `timeout` elapses.
    ///
    /// Returns `None` on timeout or when no job is active.
    pub fn wait_for_render(&mut self, timeout: Duration) -> Option<RenderEvent> {
        let deadline = Instant::now() + timeout;
        while self.active.is_some() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if let Some(event) = self.handle_response(response) {
                        return Some(event);
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!("Timed out waiting for render");
                    return None;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    error!("Render worker is gone");
                    return None;
                }
            }
        }
        None
    }

    pub(crate) fn handle_response(&mut self, response: RenderResponse) -> Option<RenderEvent> {
        let active_id = self.active.as_ref().map(|job| job.id);

        match response {
            RenderResponse::Page {
                id,
                page_number,
                bitmap,
            } => {
                if active_id != Some(id) {
                    debug!("Discarding stale render {id} for page {page_number}");
                    return None;
                }
                self.active = None;
                self.phase = RenderPhase::Idle;
                self.frame = Some(Arc::clone(&bitmap));
                Some(RenderEvent::Frame {
                    id,
                    page_number,
                    bitmap,
                })
            }

            RenderResponse::Cancelled(id) => {
                debug!("Rendering cancelled {id}");
                if active_id == Some(id) {
                    self.active = None;
                    self.phase = RenderPhase::Cancelled(id);
                }
                None
            }

            RenderResponse::Error { id, error } => {
                if active_id != Some(id) {
                    debug!("Ignoring failure of stale render {id}: {error}");
                    return None;
                }
                let page_number = self
                    .active
                    .take()
                    .map_or(self.state.page_number, |job| job.page_number);
                error!("Rendering page {page_number} failed: {error}");
                self.phase = RenderPhase::Failed {
                    id,
                    message: error.to_string(),
                };
                Some(RenderEvent::Failed {
                    id,
                    page_number,
                    error,
                })
            }

            RenderResponse::OpenFailed(error) => {
                // Page requests queued behind the failed open report NoDocument
                error!("Render worker failed to open document: {error}");
                None
            }
        }
    }

    /// Forget the document and any in-flight job
    pub fn reset(&mut self) {
        self.cancel_active();
        self.phase = RenderPhase::Idle;
        self.frame = None;
        self.doc_info = None;
        let _ = self.state.apply(Command::SetPageCount(0));
    }

    #[must_use]
    pub fn phase(&self) -> &RenderPhase {
        &self.phase
    }

    #[must_use]
    pub fn active_job(&self) -> Option<JobId> {
        self.active.as_ref().map(|job| job.id)
    }

    /// Last successfully rendered frame
    #[must_use]
    pub fn current_frame(&self) -> Option<&Arc<PageBitmap>> {
        self.frame.as_ref()
    }

    #[must_use]
    pub fn document_info(&self) -> Option<&DocumentInfo> {
        self.doc_info.as_ref()
    }

    #[must_use]
    pub fn page_number(&self) -> usize {
        self.state.page_number
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.state.page_count
    }

    #[must_use]
    pub fn scale(&self) -> RasterScale {
        self.state.scale
    }

    /// Mapping for overlays drawn over `page_number` with the canvas at
    /// `canvas_offset`
    #[must_use]
    pub fn layout_for_page(&self, page_number: usize, canvas_offset: ScreenPoint) -> Option<PageLayout> {
        let size = self.doc_info.as_ref()?.page_size(page_number)?;
        Some(PageLayout::new(canvas_offset, self.state.scale, size.height))
    }

    /// Shutdown the worker
    pub fn shutdown(&mut self) {
        self.cancel_active();
        let _ = self.request_tx.send(RenderRequest::Shutdown);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    fn next_id(&mut self) -> JobId {
        let id = JobId::new(self.next_job_id);
        self.next_job_id += 1;
        id
    }
}

impl Drop for RenderController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockRasterizer;

    fn bitmap(page_number: usize) -> Arc<PageBitmap> {
        Arc::new(PageBitmap {
            pixels: vec![255; 3],
            width_px: 1,
            height_px: 1,
            page_number,
            scale: RasterScale::default(),
        })
    }

    fn controller() -> RenderController {
        RenderController::new(Arc::new(MockRasterizer::new(3)), RasterScale::default())
    }

    #[test]
    fn new_request_cancels_previous_job() {
        let mut ctl = controller();
        let first = ctl.request_render(1);
        let second = ctl.request_render(2);

        assert_ne!(first, second);
        assert_eq!(ctl.active_job(), Some(second));
        assert_eq!(ctl.phase(), &RenderPhase::Rendering(second));
    }

    #[test]
    fn stale_result_is_discarded() {
        let mut ctl = controller();
        let first = ctl.request_render(1);
        let second = ctl.request_render(2);

        let event = ctl.handle_response(RenderResponse::Page {
            id: first,
            page_number: 1,
            bitmap: bitmap(1),
        });
        assert!(event.is_none());
        assert!(ctl.current_frame().is_none());
        assert_eq!(ctl.phase(), &RenderPhase::Rendering(second));

        let event = ctl.handle_response(RenderResponse::Page {
            id: second,
            page_number: 2,
            bitmap: bitmap(2),
        });
        assert!(matches!(event, Some(RenderEvent::Frame { page_number: 2, .. })));
        assert_eq!(ctl.phase(), &RenderPhase::Idle);
        assert_eq!(ctl.current_frame().map(|f| f.page_number), Some(2));
    }

    #[test]
    fn cancellation_is_absorbed() {
        let mut ctl = controller();
        let first = ctl.request_render(1);
        let second = ctl.request_render(2);

        assert!(ctl.handle_response(RenderResponse::Cancelled(first)).is_none());
        assert_eq!(ctl.phase(), &RenderPhase::Rendering(second));
    }

    #[test]
    fn failure_keeps_previous_frame() {
        let mut ctl = controller();
        let first = ctl.request_render(1);
        let _ = ctl.handle_response(RenderResponse::Page {
            id: first,
            page_number: 1,
            bitmap: bitmap(1),
        });

        let second = ctl.request_render(2);
        let event = ctl.handle_response(RenderResponse::Error {
            id: second,
            error: RasterFault::generic("bad page"),
        });

        assert!(matches!(event, Some(RenderEvent::Failed { page_number: 2, .. })));
        assert!(matches!(ctl.phase(), RenderPhase::Failed { id, .. } if *id == second));
        assert_eq!(ctl.current_frame().map(|f| f.page_number), Some(1));
        assert_eq!(ctl.active_job(), None);
    }

    #[test]
    fn stale_failure_is_ignored() {
        let mut ctl = controller();
        let first = ctl.request_render(1);
        let second = ctl.request_render(2);

        let event = ctl.handle_response(RenderResponse::Error {
            id: first,
            error: RasterFault::generic("late"),
        });
        assert!(event.is_none());
        assert_eq!(ctl.phase(), &RenderPhase::Rendering(second));
    }

    #[test]
    fn request_without_worker_fails_instead_of_hanging() {
        let mut ctl = controller();
        ctl.shutdown();

        let id = ctl.request_render(1);
        assert_eq!(ctl.active_job(), None);
        assert!(matches!(ctl.phase(), RenderPhase::Failed { id: failed, .. } if *failed == id));
        assert!(ctl.wait_for_render(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn navigation_without_document_requests_nothing() {
        let mut ctl = controller();
        assert_eq!(ctl.next_page(), None);
        assert_eq!(ctl.previous_page(), None);
        assert_eq!(ctl.active_job(), None);
    }
}
