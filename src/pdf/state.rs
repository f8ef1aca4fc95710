//! Page view state management

use crate::geometry::RasterScale;

/// Current view state for an open document
#[derive(Clone, Debug)]
pub struct RenderState {
    /// Scale pages are rasterized with, fixed for the life of the view
    pub scale: RasterScale,

    /// Current page (1-indexed, 0 only while no document is loaded)
    pub page_number: usize,

    /// Total page count
    pub page_count: usize,
}

impl RenderState {
    #[must_use]
    pub fn new(scale: RasterScale) -> Self {
        Self {
            scale,
            page_number: 0,
            page_count: 0,
        }
    }

    /// Apply a command and return resulting effects
    #[must_use]
    pub fn apply(&mut self, cmd: Command) -> Vec<Effect> {
        match cmd {
            Command::NextPage => {
                if self.page_number < self.page_count {
                    self.page_number += 1;
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::PreviousPage => {
                if self.page_number > 1 {
                    self.page_number -= 1;
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }

            Command::SetPageCount(count) => {
                self.page_count = count;
                self.page_number = if count == 0 {
                    0
                } else {
                    self.page_number.clamp(1, count)
                };
                vec![]
            }

            Command::Rerender => {
                if self.page_count > 0 {
                    vec![Effect::RenderCurrentPage]
                } else {
                    vec![]
                }
            }
        }
    }
}

/// Commands that modify view state
#[derive(Clone, Debug)]
pub enum Command {
    /// Advance one page, no-op on the last page
    NextPage,
    /// Go back one page, no-op on the first page
    PreviousPage,
    /// Update the page count (new document)
    SetPageCount(usize),
    /// Render the current page again (document bytes changed)
    Rerender,
}

/// Effects produced by state changes
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Render the current page
    RenderCurrentPage,
}
