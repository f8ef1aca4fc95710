// Export modules for use in tests
pub mod commit;
pub mod event_source;
pub mod geometry;
pub mod notification;
pub mod overlay;
pub mod panic_handler;
pub mod pdf;
pub mod session;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use commit::{CommitEngine, CommitError, CommitStyle, CommittedDocument, LopdfMutator};
pub use geometry::{PageLayout, RasterScale, ScreenPoint, to_page_space, to_screen_space};
pub use overlay::{Annotation, AnnotationId, OverlayModel, PointerScope};
pub use session::{EditorSession, SessionError, run_with_event_source};
