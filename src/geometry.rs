//! Coordinate mapping between screen, canvas and PDF page space
//!
//! Three spaces are involved when an overlay is committed:
//!
//! - **Screen space**: pointer coordinates as delivered by the input layer,
//!   origin top-left, Y pointing down.
//! - **Canvas space**: pixels of the rasterized page, origin at the canvas'
//!   top-left corner. Obtained by subtracting the canvas offset.
//! - **Page space**: native PDF units, origin bottom-left, Y pointing up,
//!   independent of the raster scale.
//!
//! ```text
//! pdf_x = (screen_x - offset_x) / scale
//! pdf_y = page_height - (screen_y - offset_y) / scale
//! ```

use thiserror::Error;

/// Scale used when the viewer rasterizes a page.
pub const DEFAULT_RASTER_SCALE: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("raster scale must be a finite positive number, got {0}")]
pub struct InvalidScale(pub f32);

/// Uniform multiplier applied when rasterizing a page.
///
/// The same value has to be used for mapping overlay positions back into page
/// space, otherwise committed text lands at the wrong place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterScale(f32);

impl RasterScale {
    pub fn new(factor: f32) -> Result<Self, InvalidScale> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(InvalidScale(factor))
        }
    }

    #[must_use]
    pub const fn factor(self) -> f32 {
        self.0
    }
}

impl Default for RasterScale {
    fn default() -> Self {
        Self(DEFAULT_RASTER_SCALE)
    }
}

/// A point in screen (pointer) space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point relative to the canvas' top-left corner, in raster pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanvasPoint {
    pub x: f32,
    pub y: f32,
}

/// A point in PDF page space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PagePoint {
    pub x: f32,
    pub y: f32,
}

impl PagePoint {
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Page dimensions in PDF units
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    /// US Letter, used when a page carries no usable MediaBox
    pub const LETTER: Self = Self {
        width: 612.0,
        height: 792.0,
    };

    /// Raster dimensions in pixels for this page at `scale`
    #[must_use]
    pub fn viewport(self, scale: RasterScale) -> (u32, u32) {
        (
            (self.width * scale.factor()).round().max(1.0) as u32,
            (self.height * scale.factor()).round().max(1.0) as u32,
        )
    }
}

/// Everything needed to translate between screen and page space for the
/// frame currently on display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    /// Top-left of the canvas, in screen space
    pub canvas_offset: ScreenPoint,
    /// Scale the displayed frame was rasterized with
    pub scale: RasterScale,
    /// Height of the target page in PDF units
    pub page_height: f32,
}

impl PageLayout {
    #[must_use]
    pub const fn new(canvas_offset: ScreenPoint, scale: RasterScale, page_height: f32) -> Self {
        Self {
            canvas_offset,
            scale,
            page_height,
        }
    }

    #[must_use]
    pub fn to_canvas(&self, point: ScreenPoint) -> CanvasPoint {
        CanvasPoint {
            x: point.x - self.canvas_offset.x,
            y: point.y - self.canvas_offset.y,
        }
    }

    #[must_use]
    pub fn to_page_space(&self, point: ScreenPoint) -> PagePoint {
        let local = self.to_canvas(point);
        let scale = self.scale.factor();
        PagePoint {
            x: local.x / scale,
            y: self.page_height - local.y / scale,
        }
    }

    #[must_use]
    pub fn to_screen_space(&self, point: PagePoint) -> ScreenPoint {
        let scale = self.scale.factor();
        ScreenPoint {
            x: point.x * scale + self.canvas_offset.x,
            y: (self.page_height - point.y) * scale + self.canvas_offset.y,
        }
    }

    /// Convert a horizontal or vertical screen length to page units
    #[must_use]
    pub fn length_to_page(&self, screen_len: f32) -> f32 {
        screen_len / self.scale.factor()
    }
}

/// Map a screen position into page space.
///
/// `canvas_offset` is the canvas' top-left in the same space as the pointer
/// coordinates.
#[must_use]
pub fn to_page_space(
    screen_x: f32,
    screen_y: f32,
    canvas_offset: ScreenPoint,
    page_height: f32,
    scale: RasterScale,
) -> PagePoint {
    PageLayout::new(canvas_offset, scale, page_height)
        .to_page_space(ScreenPoint::new(screen_x, screen_y))
}

/// Inverse of [`to_page_space`]
#[must_use]
pub fn to_screen_space(
    page_x: f32,
    page_y: f32,
    canvas_offset: ScreenPoint,
    page_height: f32,
    scale: RasterScale,
) -> ScreenPoint {
    PageLayout::new(canvas_offset, scale, page_height)
        .to_screen_space(PagePoint::new(page_x, page_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn scale_rejects_zero_negative_and_nan() {
        assert!(RasterScale::new(0.0).is_err());
        assert!(RasterScale::new(-1.5).is_err());
        assert!(RasterScale::new(f32::NAN).is_err());
        assert!(RasterScale::new(f32::INFINITY).is_err());
        assert_eq!(RasterScale::new(2.0).map(RasterScale::factor), Ok(2.0));
    }

    #[test]
    fn maps_click_into_page_space_with_inverted_y() {
        let scale = RasterScale::new(1.5).unwrap();
        let p = to_page_space(100.0, 200.0, ScreenPoint::new(10.0, 10.0), 792.0, scale);
        assert!(approx(p.x, 60.0), "x = {}", p.x);
        assert!(approx(p.y, 792.0 - 190.0 / 1.5), "y = {}", p.y);
    }

    #[test]
    fn canvas_origin_maps_to_top_left_of_page() {
        let layout = PageLayout::new(ScreenPoint::new(25.0, 40.0), RasterScale::default(), 842.0);
        let p = layout.to_page_space(ScreenPoint::new(25.0, 40.0));
        assert!(approx(p.x, 0.0));
        assert!(approx(p.y, 842.0));
    }

    #[test]
    fn round_trip_reproduces_screen_point() {
        let offsets = [(0.0, 0.0), (10.0, 10.0), (-35.5, 120.25)];
        let scales = [0.5, 1.0, 1.5, 2.75];
        let heights = [792.0, 842.0, 300.0];
        let points = [(0.0, 0.0), (100.0, 200.0), (613.7, 1021.3)];

        for &(ox, oy) in &offsets {
            for &s in &scales {
                for &h in &heights {
                    let layout =
                        PageLayout::new(ScreenPoint::new(ox, oy), RasterScale::new(s).unwrap(), h);
                    for &(x, y) in &points {
                        let screen = ScreenPoint::new(x, y);
                        let back = layout.to_screen_space(layout.to_page_space(screen));
                        assert!(approx(back.x, x) && approx(back.y, y), "{screen:?} -> {back:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn page_point_round_trips_through_screen_space() {
        let layout = PageLayout::new(ScreenPoint::new(8.0, 64.0), RasterScale::default(), 792.0);
        let page = PagePoint::new(72.0, 720.0);
        let back = layout.to_page_space(layout.to_screen_space(page));
        assert!(approx(back.x, page.x) && approx(back.y, page.y));
    }

    #[test]
    fn viewport_is_page_size_times_scale() {
        assert_eq!(PageSize::LETTER.viewport(RasterScale::default()), (918, 1188));
        assert_eq!(
            PageSize::LETTER.viewport(RasterScale::new(1.0).unwrap()),
            (612, 792)
        );
    }

    #[test]
    fn lengths_are_unscaled() {
        let layout = PageLayout::new(ScreenPoint::default(), RasterScale::new(2.0).unwrap(), 792.0);
        assert!(approx(layout.length_to_page(200.0), 100.0));
    }
}
