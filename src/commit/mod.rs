//! Commit engine - bakes pending annotations into the PDF
//!
//! Every commit starts from the original bytes and draws the complete
//! annotation set, so committing twice never stacks the same text.

mod lopdf_mutator;
mod mutator;

use std::sync::Arc;

use log::{debug, info};

pub use lopdf_mutator::{LopdfDocument, LopdfMutator};
pub use mutator::{DocumentMutator, DrawTextOptions, MutableDocument, MutatorFault, TextColor};

use crate::geometry::PageLayout;
use crate::overlay::{Annotation, AnnotationId};

pub const DEFAULT_FONT_SIZE: f32 = 24.0;

/// Annotations are always drawn on the first page
pub const TARGET_PAGE_INDEX: usize = 0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CommitStyle {
    pub font_size: f32,
    pub color: TextColor,
}

impl Default for CommitStyle {
    fn default() -> Self {
        Self {
            font_size: DEFAULT_FONT_SIZE,
            color: TextColor::BLACK,
        }
    }
}

/// Serialized output of a commit. Cheap to clone.
#[derive(Clone, PartialEq, Eq)]
pub struct CommittedDocument {
    bytes: Arc<[u8]>,
}

impl CommittedDocument {
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Shared handle for the render worker
    #[must_use]
    pub fn shared(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for CommittedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommittedDocument")
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("could not parse the document")]
    ParseFailed(#[source] MutatorFault),

    #[error("the document has no pages")]
    EmptyDocument,

    #[error("could not draw annotation {id}")]
    Draw {
        id: AnnotationId,
        #[source]
        source: MutatorFault,
    },

    #[error("could not write the edited document")]
    Serialize(#[source] MutatorFault),
}

pub struct CommitEngine<M> {
    mutator: M,
    style: CommitStyle,
}

impl<M: DocumentMutator> CommitEngine<M> {
    #[must_use]
    pub fn new(mutator: M, style: CommitStyle) -> Self {
        Self { mutator, style }
    }

    #[must_use]
    pub fn style(&self) -> CommitStyle {
        self.style
    }

    #[must_use]
    pub fn mutator(&self) -> &M {
        &self.mutator
    }

    /// Draw `annotations` onto a fresh parse of `original`.
    ///
    /// `layout` must be the one the on-screen frame was produced with. The
    /// input bytes are never touched; draws only become visible through the
    /// returned buffer.
    pub fn commit(
        &self,
        original: &[u8],
        annotations: &[Annotation],
        layout: &PageLayout,
    ) -> Result<CommittedDocument, CommitError> {
        let mut doc = self
            .mutator
            .parse(original)
            .map_err(CommitError::ParseFailed)?;
        if doc.page_count() == 0 {
            return Err(CommitError::EmptyDocument);
        }

        for annotation in annotations {
            let anchor = layout.to_page_space(annotation.position());
            let options = DrawTextOptions {
                x: anchor.x,
                y: anchor.y,
                font_size: self.style.font_size,
                color: self.style.color,
                max_width: layout.length_to_page(annotation.width),
            };
            debug!(
                "Drawing annotation {} at ({:.2}, {:.2})",
                annotation.id, anchor.x, anchor.y
            );
            doc.draw_text(TARGET_PAGE_INDEX, &annotation.text, &options)
                .map_err(|source| CommitError::Draw {
                    id: annotation.id,
                    source,
                })?;
        }

        let bytes = doc.serialize().map_err(CommitError::Serialize)?;
        info!(
            "Committed {} annotation(s), {} bytes",
            annotations.len(),
            bytes.len()
        );
        Ok(CommittedDocument::new(bytes))
    }
}
