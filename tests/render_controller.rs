use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pdfstamp::geometry::{RasterScale, ScreenPoint};
use pdfstamp::pdf::{RenderController, RenderEvent, RenderPhase};
use pdfstamp::test_utils::{MockRasterizer, sample_pdf};

const TIMEOUT: Duration = Duration::from_secs(5);

fn pdf_bytes(pages: usize) -> Arc<[u8]> {
    Arc::from(sample_pdf(pages))
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn superseded_render_is_cancelled_and_newest_wins() {
    let (mock, gate) = MockRasterizer::new(3).gated();
    let mock = Arc::new(mock);
    let mut ctl = RenderController::new(mock.clone(), RasterScale::default());

    ctl.load_document(pdf_bytes(3), false).unwrap();
    let first = ctl.active_job().unwrap();
    // The worker is now blocked inside the page 1 render
    wait_until(|| mock.rendered_pages() == vec![1]);

    let second = ctl.request_render(2);
    assert_ne!(first, second);
    assert_eq!(ctl.phase(), &RenderPhase::Rendering(second));

    gate.send(()).unwrap();
    gate.send(()).unwrap();

    match ctl.wait_for_render(TIMEOUT) {
        Some(RenderEvent::Frame {
            id, page_number, ..
        }) => {
            assert_eq!(id, second);
            assert_eq!(page_number, 2);
        }
        other => panic!("expected a frame for the second job, got {other:?}"),
    }
    assert_eq!(ctl.phase(), &RenderPhase::Idle);
    assert_eq!(ctl.current_frame().map(|f| f.page_number), Some(2));
    assert!(ctl.poll().is_empty());
}

#[test]
fn frame_matches_page_viewport() {
    let mut ctl = RenderController::new(Arc::new(MockRasterizer::new(1)), RasterScale::default());
    ctl.load_document(pdf_bytes(1), false).unwrap();

    let Some(RenderEvent::Frame { bitmap, .. }) = ctl.wait_for_render(TIMEOUT) else {
        panic!("expected a frame");
    };
    assert_eq!((bitmap.width_px, bitmap.height_px), (918, 1188));
    assert_eq!(bitmap.pixels.len(), 918 * 1188 * 3);
}

#[test]
fn failed_page_keeps_previous_frame_and_navigation() {
    let mock = Arc::new(MockRasterizer::new(3).failing_page(2));
    let mut ctl = RenderController::new(mock.clone(), RasterScale::default());
    ctl.load_document(pdf_bytes(3), false).unwrap();
    assert!(matches!(
        ctl.wait_for_render(TIMEOUT),
        Some(RenderEvent::Frame { page_number: 1, .. })
    ));

    assert!(ctl.next_page().is_some());
    assert!(matches!(
        ctl.wait_for_render(TIMEOUT),
        Some(RenderEvent::Failed { page_number: 2, .. })
    ));
    assert!(matches!(ctl.phase(), RenderPhase::Failed { .. }));
    assert_eq!(ctl.current_frame().map(|f| f.page_number), Some(1));

    assert!(ctl.next_page().is_some());
    assert!(matches!(
        ctl.wait_for_render(TIMEOUT),
        Some(RenderEvent::Frame { page_number: 3, .. })
    ));
    assert_eq!(ctl.phase(), &RenderPhase::Idle);
}

#[test]
fn next_at_last_page_requests_nothing() {
    let mock = Arc::new(MockRasterizer::new(1));
    let mut ctl = RenderController::new(mock.clone(), RasterScale::default());
    ctl.load_document(pdf_bytes(1), false).unwrap();
    let _ = ctl.wait_for_render(TIMEOUT);

    assert_eq!(ctl.next_page(), None);
    assert_eq!(ctl.previous_page(), None);
    assert_eq!(ctl.active_job(), None);
    assert_eq!(ctl.page_number(), 1);
    assert_eq!(mock.rendered_pages(), vec![1]);
}

#[test]
fn reload_can_keep_the_current_page() {
    let mut ctl = RenderController::new(Arc::new(MockRasterizer::new(3)), RasterScale::default());
    ctl.load_document(pdf_bytes(3), false).unwrap();
    let _ = ctl.wait_for_render(TIMEOUT);
    ctl.next_page();
    let _ = ctl.wait_for_render(TIMEOUT);

    ctl.load_document(pdf_bytes(3), true).unwrap();
    assert!(matches!(
        ctl.wait_for_render(TIMEOUT),
        Some(RenderEvent::Frame { page_number: 2, .. })
    ));

    ctl.load_document(pdf_bytes(3), false).unwrap();
    assert_eq!(ctl.page_number(), 1);
}

#[test]
fn empty_document_is_refused() {
    let mut ctl = RenderController::new(Arc::new(MockRasterizer::new(0)), RasterScale::default());
    assert!(ctl.load_document(pdf_bytes(0), false).is_err());
    assert!(ctl.document_info().is_none());
    assert_eq!(ctl.active_job(), None);
}

#[test]
fn layout_uses_page_height_and_scale() {
    let mut ctl = RenderController::new(Arc::new(MockRasterizer::new(1)), RasterScale::default());
    ctl.load_document(pdf_bytes(1), false).unwrap();

    let layout = ctl
        .layout_for_page(1, ScreenPoint::new(10.0, 10.0))
        .unwrap();
    assert_eq!(layout.page_height, 792.0);
    let point = layout.to_page_space(ScreenPoint::new(100.0, 200.0));
    assert!((point.x - 60.0).abs() < 1e-3);
    assert!((point.y - 665.333).abs() < 1e-3);
    assert!(ctl.layout_for_page(2, ScreenPoint::default()).is_none());
}
