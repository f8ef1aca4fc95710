//! Editing session
//!
//! Binds the overlay model, the render controller and the commit engine to a
//! single open document. Front ends feed it [`EditorEvent`]s; everything the
//! user should see besides the frame goes through the notification manager.

use std::ffi::OsStr;
use std::fs;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::commit::{
    CommitEngine, CommitError, CommittedDocument, DocumentMutator, LopdfMutator, TARGET_PAGE_INDEX,
};
use crate::event_source::{EditorEvent, EventSource};
use crate::geometry::ScreenPoint;
use crate::notification::NotificationManager;
use crate::overlay::{AnnotationId, OverlayModel, PointerScope};
use crate::pdf::{DocumentInfo, RasterFault, Rasterizer, RenderController, RenderEvent};
use crate::settings::Settings;

/// Every PDF file starts with this
pub const PDF_MAGIC: &[u8] = b"%PDF-";

const TARGET_PAGE_NUMBER: usize = TARGET_PAGE_INDEX + 1;
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{name} is not a PDF: {reason}")]
    InputRejected { name: String, reason: &'static str },

    #[error("no document is open")]
    NoDocument,

    #[error("nothing has been committed yet")]
    NothingCommitted,

    #[error("commit failed")]
    Commit(#[from] CommitError),

    #[error("rendering failed")]
    Render(#[from] RasterFault),

    #[error("I/O error on {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render an error and its sources as `outer: inner: root`
pub fn describe(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

struct SourceDocument {
    name: String,
    bytes: Arc<[u8]>,
}

pub struct EditorSession<M = LopdfMutator> {
    settings: Settings,
    overlay: OverlayModel,
    renderer: RenderController,
    engine: CommitEngine<M>,
    source: Option<SourceDocument>,
    committed: Option<CommittedDocument>,
    canvas_offset: ScreenPoint,
    export_dir: PathBuf,
    notifications: NotificationManager,
}

impl<M: DocumentMutator> EditorSession<M> {
    pub fn new(settings: Settings, rasterizer: Arc<dyn Rasterizer>, mutator: M) -> Self {
        let renderer = RenderController::new(rasterizer, settings.raster_scale());
        let engine = CommitEngine::new(mutator, settings.commit_style());
        let overlay = OverlayModel::with_defaults(settings.annotation_defaults());
        Self {
            settings,
            overlay,
            renderer,
            engine,
            source: None,
            committed: None,
            canvas_offset: ScreenPoint::default(),
            export_dir: PathBuf::from("."),
            notifications: NotificationManager::new(),
        }
    }

    /// Directory `download` writes to when no path is given
    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    /// Open a file. Only `.pdf` files with a PDF header are admitted.
    pub fn open_file(&mut self, path: &Path) -> Result<&DocumentInfo, SessionError> {
        let name = path.display().to_string();
        let is_pdf = path
            .extension()
            .and_then(OsStr::to_str)
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf {
            return Err(self.reject(name, "expected a .pdf file"));
        }

        let bytes = fs::read(path).map_err(|source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.open_bytes(name, bytes)
    }

    /// Replace the current document with `bytes`.
    ///
    /// On success the overlay and any committed output are discarded and page
    /// 1 starts rendering. On failure the previous document stays open.
    pub fn open_bytes(
        &mut self,
        name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<&DocumentInfo, SessionError> {
        let name = name.into();
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(self.reject(name, "missing %PDF- header"));
        }

        let bytes: Arc<[u8]> = Arc::from(bytes);
        if let Err(e) = self.renderer.load_document(Arc::clone(&bytes), false) {
            error!("Failed to open {name}: {e}");
            self.notifications
                .error(format!("Could not open {name}: {e}"));
            return Err(e.into());
        }

        self.overlay.clear();
        self.committed = None;
        info!("Opened {name} ({} bytes)", bytes.len());
        self.notifications.info(format!("Opened {name}"));
        self.source = Some(SourceDocument { name, bytes });

        self.renderer.document_info().ok_or(SessionError::NoDocument)
    }

    fn reject(&mut self, name: String, reason: &'static str) -> SessionError {
        warn!("Rejected {name}: {reason}");
        self.notifications
            .error(format!("{name} is not a PDF: {reason}"));
        SessionError::InputRejected { name, reason }
    }

    pub fn set_canvas_offset(&mut self, offset: ScreenPoint) {
        self.canvas_offset = offset;
    }

    /// Place a new annotation where the canvas was clicked
    pub fn click(&mut self, point: ScreenPoint) -> Result<AnnotationId, SessionError> {
        if self.source.is_none() {
            self.notifications.warn("Open a PDF before placing text");
            return Err(SessionError::NoDocument);
        }
        Ok(self.overlay.create_annotation(point).id)
    }

    /// Press on an annotation. Returns the annotation that started dragging.
    pub fn pointer_down(&mut self, point: ScreenPoint, scope: PointerScope) -> Option<AnnotationId> {
        let id = self.overlay.hit_test(point)?;
        self.overlay.begin_drag(id, point, scope).then_some(id)
    }

    pub fn pointer_move(&mut self, point: ScreenPoint) -> bool {
        match self.overlay.dragging() {
            Some(id) => self.overlay.drag_to(id, point),
            None => false,
        }
    }

    pub fn pointer_up(&mut self) -> bool {
        match self.overlay.dragging() {
            Some(id) => self.overlay.end_drag(id),
            None => false,
        }
    }

    pub fn edit_text(&mut self, id: AnnotationId, text: impl Into<String>) -> bool {
        self.overlay.update_text(id, text)
    }

    pub fn next_page(&mut self) -> bool {
        self.renderer.next_page().is_some()
    }

    pub fn previous_page(&mut self) -> bool {
        self.renderer.previous_page().is_some()
    }

    /// Draw every annotation into a fresh copy of the original document and
    /// display the result on the current page.
    ///
    /// Failures leave the displayed document and the overlay untouched.
    pub fn commit(&mut self) -> Result<&CommittedDocument, SessionError> {
        let Some(source) = &self.source else {
            self.notifications.warn("Open a PDF before committing");
            return Err(SessionError::NoDocument);
        };
        // Text always lands on the first page, so map against its height
        let layout = self
            .renderer
            .layout_for_page(TARGET_PAGE_NUMBER, self.canvas_offset)
            .ok_or(SessionError::NoDocument)?;
        let annotations = self.overlay.snapshot();

        let committed = match self.engine.commit(&source.bytes, &annotations, &layout) {
            Ok(doc) => doc,
            Err(e) => {
                let message = describe(&e);
                error!("Commit of {} failed: {message}", source.name);
                self.notifications.error(format!("Commit failed: {message}"));
                return Err(e.into());
            }
        };

        if let Err(e) = self.renderer.load_document(committed.shared(), true) {
            error!("Committed document could not be displayed: {e}");
            self.notifications
                .error(format!("Could not display the edited document: {e}"));
            return Err(e.into());
        }

        self.notifications
            .info(format!("Committed {} annotation(s)", annotations.len()));
        Ok(self.committed.insert(committed))
    }

    #[must_use]
    pub fn can_download(&self) -> bool {
        self.committed.is_some()
    }

    /// Write the committed document to `path`, or to the configured export
    /// name inside the export directory
    pub fn download(&mut self, path: Option<&Path>) -> Result<PathBuf, SessionError> {
        let Some(committed) = &self.committed else {
            self.notifications.warn("Nothing to download, commit first");
            return Err(SessionError::NothingCommitted);
        };
        let target = path.map_or_else(
            || self.export_dir.join(&self.settings.export_file_name),
            Path::to_path_buf,
        );

        fs::write(&target, committed.as_bytes()).map_err(|source| SessionError::Io {
            path: target.clone(),
            source,
        })?;
        info!("Saved {} bytes to {target:?}", committed.len());
        self.notifications
            .info(format!("Saved {}", target.display()));
        Ok(target)
    }

    /// Bytes currently on display: the last commit, else the original
    #[must_use]
    pub fn displayed_bytes(&self) -> Option<&[u8]> {
        self.committed
            .as_ref()
            .map(CommittedDocument::as_bytes)
            .or_else(|| self.source.as_ref().map(|s| &*s.bytes))
    }

    /// Drain finished renders without blocking
    pub fn pump_render_events(&mut self) -> Vec<RenderEvent> {
        let events = self.renderer.poll();
        for event in &events {
            self.note_render_event(event);
        }
        events
    }

    /// Block until the active render settles or the configured timeout passes
    pub fn wait_for_render(&mut self) -> Option<RenderEvent> {
        let event = self
            .renderer
            .wait_for_render(self.settings.render_timeout())?;
        self.note_render_event(&event);
        Some(event)
    }

    fn note_render_event(&mut self, event: &RenderEvent) {
        if let RenderEvent::Failed {
            page_number, error, ..
        } = event
        {
            self.notifications
                .error(format!("Could not render page {page_number}: {error}"));
        }
    }

    /// Apply one input event
    pub fn handle_event(&mut self, event: EditorEvent) -> Result<ControlFlow<()>, SessionError> {
        match event {
            EditorEvent::Click(point) => {
                let id = self.click(point)?;
                debug!("Click at ({}, {}) created annotation {id}", point.x, point.y);
            }
            EditorEvent::PointerDown { point, scope } => {
                self.pointer_down(point, scope);
            }
            EditorEvent::PointerMove(point) => {
                self.pointer_move(point);
            }
            EditorEvent::PointerUp => {
                self.pointer_up();
            }
            EditorEvent::EditText { id, text } => {
                self.edit_text(id, text);
            }
            EditorEvent::CanvasOffset(offset) => self.set_canvas_offset(offset),
            EditorEvent::NextPage => {
                self.next_page();
            }
            EditorEvent::PreviousPage => {
                self.previous_page();
            }
            EditorEvent::Commit => {
                self.commit()?;
            }
            EditorEvent::Download(path) => {
                self.download(path.as_deref())?;
            }
            EditorEvent::Quit => return Ok(ControlFlow::Break(())),
        }
        Ok(ControlFlow::Continue(()))
    }

    #[must_use]
    pub fn overlay(&self) -> &OverlayModel {
        &self.overlay
    }

    #[must_use]
    pub fn renderer(&self) -> &RenderController {
        &self.renderer
    }

    #[must_use]
    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationManager {
        &mut self.notifications
    }

    #[must_use]
    pub fn canvas_offset(&self) -> ScreenPoint {
        self.canvas_offset
    }

    #[must_use]
    pub fn page_number(&self) -> usize {
        self.renderer.page_number()
    }

    #[must_use]
    pub fn committed(&self) -> Option<&CommittedDocument> {
        self.committed.as_ref()
    }
}

/// Drive a session from an event source until it quits or runs dry.
///
/// Session errors are recoverable and only logged here; they have already
/// been surfaced as notifications. `after_event` runs once the render
/// triggered by an event has settled.
pub fn run_with_event_source<M, E, F>(
    session: &mut EditorSession<M>,
    events: &mut E,
    mut after_event: F,
) -> anyhow::Result<()>
where
    M: DocumentMutator,
    E: EventSource + ?Sized,
    F: FnMut(&mut EditorSession<M>) -> anyhow::Result<()>,
{
    loop {
        if !events.poll(POLL_INTERVAL)? {
            info!("Input exhausted");
            break;
        }
        let event = events.read()?;
        debug!("Event: {event:?}");

        let flow = session.handle_event(event).unwrap_or_else(|e| {
            warn!("{}", describe(&e));
            ControlFlow::Continue(())
        });

        if session.renderer().active_job().is_some() {
            session.wait_for_render();
        }
        session.pump_render_events();
        after_event(session)?;

        if flow.is_break() {
            break;
        }
    }
    Ok(())
}
