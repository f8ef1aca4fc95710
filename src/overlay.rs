//! Pending text annotations placed over the rendered page
//!
//! Annotations live here until a commit draws them into the document. The
//! model keeps them in creation order, which doubles as z-order for hit
//! testing and as draw order for commits.

use log::debug;

use crate::geometry::ScreenPoint;

pub const DEFAULT_PLACEHOLDER: &str = "New text";
pub const DEFAULT_ANNOTATION_WIDTH: f32 = 200.0;
pub const DEFAULT_ANNOTATION_HEIGHT: f32 = 32.0;

/// Opaque, session-unique annotation identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnnotationId(u64);

impl AnnotationId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    /// Being dragged; `grab` is the pointer offset from the box' top-left
    Dragging { grab: ScreenPoint },
}

/// Where a pointer-down landed, resolved by the input layer.
///
/// A press inside the text input of a box belongs to text editing (caret
/// placement, selection) and must never start a drag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerScope {
    Canvas,
    TextEditing,
}

/// A user-placed text box, positioned in screen space
#[derive(Clone, Debug, PartialEq)]
pub struct Annotation {
    pub id: AnnotationId,
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub drag_state: DragState,
}

impl Annotation {
    #[must_use]
    pub fn position(&self) -> ScreenPoint {
        ScreenPoint::new(self.x, self.y)
    }

    #[must_use]
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    #[must_use]
    pub fn is_dragging(&self) -> bool {
        matches!(self.drag_state, DragState::Dragging { .. })
    }
}

/// Defaults applied to freshly created annotations
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationDefaults {
    pub placeholder: String,
    pub width: f32,
    pub height: f32,
}

impl Default for AnnotationDefaults {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            width: DEFAULT_ANNOTATION_WIDTH,
            height: DEFAULT_ANNOTATION_HEIGHT,
        }
    }
}

#[derive(Debug)]
pub struct OverlayModel {
    annotations: Vec<Annotation>,
    next_id: u64,
    defaults: AnnotationDefaults,
}

impl Default for OverlayModel {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlayModel {
    #[must_use]
    pub fn new() -> Self {
        Self::with_defaults(AnnotationDefaults::default())
    }

    #[must_use]
    pub fn with_defaults(defaults: AnnotationDefaults) -> Self {
        Self {
            annotations: Vec::new(),
            next_id: 1,
            defaults,
        }
    }

    /// Place a new annotation at `point`, on top of all existing ones
    pub fn create_annotation(&mut self, point: ScreenPoint) -> &Annotation {
        let id = AnnotationId::new(self.next_id);
        self.next_id += 1;

        debug!("Created annotation {id} at ({}, {})", point.x, point.y);
        let index = self.annotations.len();
        self.annotations.push(Annotation {
            id,
            text: self.defaults.placeholder.clone(),
            x: point.x,
            y: point.y,
            width: self.defaults.width,
            height: self.defaults.height,
            drag_state: DragState::Idle,
        });
        &self.annotations[index]
    }

    /// Replace the text of an annotation. Unknown ids are ignored.
    pub fn update_text(&mut self, id: AnnotationId, text: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(annotation) => {
                annotation.text = text.into();
                true
            }
            None => {
                debug!("Ignoring text update for unknown annotation {id}");
                false
            }
        }
    }

    /// Start dragging `id` from `pointer`.
    ///
    /// Returns `false` without touching the annotation when the press
    /// belongs to text editing or the id is unknown. At most one annotation
    /// is dragged at a time; a new drag ends any other.
    pub fn begin_drag(&mut self, id: AnnotationId, pointer: ScreenPoint, scope: PointerScope) -> bool {
        if scope == PointerScope::TextEditing {
            return false;
        }
        if self.get(id).is_none() {
            debug!("Ignoring drag start for unknown annotation {id}");
            return false;
        }
        for other in self.annotations.iter_mut().filter(|a| a.id != id) {
            other.drag_state = DragState::Idle;
        }
        let Some(annotation) = self.get_mut(id) else {
            return false;
        };
        annotation.drag_state = DragState::Dragging {
            grab: ScreenPoint::new(pointer.x - annotation.x, pointer.y - annotation.y),
        };
        true
    }

    /// Move a dragged annotation so that its grab point follows `pointer`
    pub fn drag_to(&mut self, id: AnnotationId, pointer: ScreenPoint) -> bool {
        let Some(annotation) = self.get_mut(id) else {
            return false;
        };
        let DragState::Dragging { grab } = annotation.drag_state else {
            return false;
        };
        annotation.x = pointer.x - grab.x;
        annotation.y = pointer.y - grab.y;
        true
    }

    pub fn end_drag(&mut self, id: AnnotationId) -> bool {
        match self.get_mut(id) {
            Some(annotation) if annotation.is_dragging() => {
                annotation.drag_state = DragState::Idle;
                true
            }
            _ => false,
        }
    }

    /// The annotation currently being dragged, if any
    #[must_use]
    pub fn dragging(&self) -> Option<AnnotationId> {
        self.annotations
            .iter()
            .find(|a| a.is_dragging())
            .map(|a| a.id)
    }

    /// Topmost annotation under `point`
    #[must_use]
    pub fn hit_test(&self, point: ScreenPoint) -> Option<AnnotationId> {
        self.annotations
            .iter()
            .rev()
            .find(|a| a.contains(point))
            .map(|a| a.id)
    }

    #[must_use]
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    fn get_mut(&mut self, id: AnnotationId) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    /// All annotations in creation order
    #[must_use]
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Copy of the current set, as consumed by a commit
    #[must_use]
    pub fn snapshot(&self) -> Vec<Annotation> {
        self.annotations.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Drop every annotation. Ids keep increasing so stale ids never alias.
    pub fn clear(&mut self) {
        self.annotations.clear();
    }
}
