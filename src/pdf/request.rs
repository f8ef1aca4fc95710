//! Render request and response types

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::types::PageBitmap;
use crate::geometry::RasterScale;

/// Unique identifier for render jobs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct JobId(pub u64);

impl JobId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Cooperative cancellation flag shared between the controller and the worker
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Replace the worker's document
    Open { bytes: Arc<[u8]> },

    /// Render a page (1-indexed)
    Page {
        id: JobId,
        page_number: usize,
        scale: RasterScale,
        cancel: CancelToken,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Errors from the rasterizer
#[derive(Debug, thiserror::Error)]
pub enum RasterFault {
    #[cfg(feature = "pdf")]
    #[error("PDF engine: {0}")]
    Pdf(#[from] mupdf::error::Error),

    /// The job was cancelled before it produced a bitmap
    #[error("render cancelled")]
    Cancelled,

    #[error("page {page_number} out of range (document has {page_count} pages)")]
    PageOutOfRange {
        page_number: usize,
        page_count: usize,
    },

    #[error("no document loaded")]
    NoDocument,

    #[error("{detail}")]
    Generic { detail: String },
}

impl RasterFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Rendered page
    Page {
        id: JobId,
        page_number: usize,
        bitmap: Arc<PageBitmap>,
    },

    /// Job was cancelled
    Cancelled(JobId),

    /// Error during rendering
    Error { id: JobId, error: RasterFault },

    /// The worker failed to open the document it was given
    OpenFailed(RasterFault),
}
