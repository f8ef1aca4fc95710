//! Document mutator abstraction

/// Fill color with components in `0.0..=1.0`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Parse `#RRGGBB` or `RRGGBB`
    #[must_use]
    pub fn from_hex(color: &str) -> Option<Self> {
        let hex = color.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16)
                .ok()
                .map(|v| f32::from(v) / 255.0)
        };
        Some(Self {
            r: channel(0..2)?,
            g: channel(2..4)?,
            b: channel(4..6)?,
        })
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::BLACK
    }
}

/// Placement and style of one `draw_text` call, in page space.
///
/// Coordinates are relative to the bottom-left corner of the page's visible
/// box, which is what a rendered frame shows.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawTextOptions {
    /// Left edge of the text block
    pub x: f32,
    /// Top edge of the text block
    pub y: f32,
    pub font_size: f32,
    pub color: TextColor,
    /// Lines are wrapped to this width
    pub max_width: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum MutatorFault {
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    #[error("page index {0} does not exist")]
    PageNotFound(usize),

    #[error("failed to update page: {0}")]
    Edit(String),

    #[error("failed to serialize PDF: {0}")]
    Serialize(String),
}

/// Parses PDF bytes into an editable document
pub trait DocumentMutator {
    type Document: MutableDocument;

    fn parse(&self, bytes: &[u8]) -> Result<Self::Document, MutatorFault>;
}

/// An in-memory document. Nothing is observable outside until
/// [`MutableDocument::serialize`] runs.
pub trait MutableDocument {
    fn page_count(&self) -> usize;

    /// Draw `text` on the page at `page_index` (0-indexed)
    fn draw_text(
        &mut self,
        page_index: usize,
        text: &str,
        options: &DrawTextOptions,
    ) -> Result<(), MutatorFault>;

    fn serialize(self) -> Result<Vec<u8>, MutatorFault>;
}
