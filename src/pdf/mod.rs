//! PDF rendering infrastructure

#[cfg(feature = "pdf")]
mod mupdf_raster;
mod raster;
mod request;
mod service;
mod state;
mod types;
mod worker;

#[cfg(feature = "pdf")]
pub use mupdf_raster::MupdfRasterizer;
pub use raster::{RasterDocument, Rasterizer, check_page};
pub use request::{CancelToken, JobId, RasterFault, RenderRequest, RenderResponse};
pub use service::{RenderController, RenderEvent, RenderPhase};
pub use state::{Command, Effect, RenderState};
pub use types::*;
