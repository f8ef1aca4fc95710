use std::fs;
use std::sync::Arc;

use lopdf::Document;

use pdfstamp::commit::LopdfMutator;
use pdfstamp::geometry::ScreenPoint;
use pdfstamp::pdf::RenderEvent;
use pdfstamp::session::{EditorSession, SessionError, run_with_event_source};
use pdfstamp::settings::Settings;
use pdfstamp::test_utils::{MockRasterizer, RecordingMutator, TestScenarioBuilder, sample_pdf};

fn lopdf_session(pages: usize) -> (EditorSession, Arc<MockRasterizer>) {
    let mock = Arc::new(MockRasterizer::new(pages));
    let mut session = EditorSession::new(Settings::default(), mock.clone(), LopdfMutator);
    session.open_bytes("sample.pdf", sample_pdf(pages)).unwrap();
    assert!(matches!(
        session.wait_for_render(),
        Some(RenderEvent::Frame { page_number: 1, .. })
    ));
    (session, mock)
}

fn page_one_mentions(bytes: &[u8], needle: &str) -> bool {
    let doc = Document::load_mem(bytes).unwrap();
    let page_id = *doc.get_pages().get(&1).unwrap();
    let content = doc.get_page_content(page_id).unwrap();
    String::from_utf8_lossy(&content).contains(needle)
}

#[test]
fn place_edit_navigate_commit_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("signed.pdf");
    let (mut session, _mock) = lopdf_session(3);

    let mut events = TestScenarioBuilder::new()
        .offset(10.0, 10.0)
        .click(100.0, 200.0)
        .type_text(1, "Hello")
        .next_page()
        .commit()
        .download_to(&target)
        .quit()
        .build();
    run_with_event_source(&mut session, &mut events, |_| Ok(())).unwrap();

    // The commit re-rendered the page that was on screen
    assert_eq!(session.page_number(), 2);
    assert_eq!(
        session.renderer().current_frame().map(|f| f.page_number),
        Some(2)
    );
    assert_eq!(session.overlay().len(), 1);
    assert!(session.can_download());

    let saved = fs::read(&target).unwrap();
    assert_eq!(Some(saved.as_slice()), session.displayed_bytes());
    assert_eq!(Document::load_mem(&saved).unwrap().get_pages().len(), 3);
    assert!(page_one_mentions(&saved, "(Hello)"));
}

#[test]
fn download_defaults_to_configured_name() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Arc::new(MockRasterizer::new(1));
    let mut session =
        EditorSession::new(Settings::default(), mock, LopdfMutator).with_export_dir(dir.path());
    session.open_bytes("sample.pdf", sample_pdf(1)).unwrap();
    session.wait_for_render();

    assert!(matches!(
        session.download(None),
        Err(SessionError::NothingCommitted)
    ));

    session.commit().unwrap();
    let path = session.download(None).unwrap();
    assert_eq!(path, dir.path().join("edited.pdf"));
    assert!(path.exists());
}

#[test]
fn files_without_pdf_header_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("fake.pdf");
    fs::write(&fake, b"PK\x03\x04 not really a pdf").unwrap();
    let text = dir.path().join("notes.txt");
    fs::write(&text, sample_pdf(1)).unwrap();

    let mut session = EditorSession::new(
        Settings::default(),
        Arc::new(MockRasterizer::new(1)),
        LopdfMutator,
    );
    assert!(matches!(
        session.open_file(&fake),
        Err(SessionError::InputRejected { .. })
    ));
    assert!(matches!(
        session.open_file(&text),
        Err(SessionError::InputRejected { .. })
    ));
    assert!(session.displayed_bytes().is_none());
    assert_eq!(session.notifications().count(), 2);
}

#[test]
fn opening_another_file_resets_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let second = dir.path().join("second.pdf");
    fs::write(&second, sample_pdf(3)).unwrap();

    let (mut session, _mock) = lopdf_session(3);
    session.click(ScreenPoint::new(40.0, 40.0)).unwrap();
    session.next_page();
    session.wait_for_render();
    session.commit().unwrap();
    assert!(session.can_download());

    session.open_file(&second).unwrap();
    assert!(session.overlay().is_empty());
    assert!(!session.can_download());
    assert_eq!(session.page_number(), 1);
    assert_eq!(session.displayed_bytes(), Some(fs::read(&second).unwrap().as_slice()));
}

#[test]
fn next_on_last_page_is_a_no_op() {
    let (mut session, mock) = lopdf_session(1);
    assert!(!session.next_page());
    assert!(session.wait_for_render().is_none());
    assert_eq!(mock.rendered_pages(), vec![1]);
}

#[test]
fn dragged_annotation_commits_at_its_final_position() {
    let mutator = RecordingMutator::new(1);
    let mut session = EditorSession::new(
        Settings::default(),
        Arc::new(MockRasterizer::new(1)),
        mutator.clone(),
    );
    session.open_bytes("sample.pdf", sample_pdf(1)).unwrap();
    session.wait_for_render();

    let mut events = TestScenarioBuilder::new()
        .offset(10.0, 10.0)
        .click(100.0, 200.0)
        .drag((110.0, 210.0), (160.0, 260.0))
        .commit()
        .build();
    run_with_event_source(&mut session, &mut events, |_| Ok(())).unwrap();

    let calls = mutator.draw_calls();
    assert_eq!(calls.len(), 1);
    // Box moved to (150, 250): ((150 - 10) / 1.5, 792 - (250 - 10) / 1.5)
    assert!((calls[0].options.x - 93.333).abs() < 0.01);
    assert!((calls[0].options.y - 632.0).abs() < 0.01);
}

#[test]
fn failed_commit_keeps_original_on_display() {
    let mut session = EditorSession::new(
        Settings::default(),
        Arc::new(MockRasterizer::new(1)),
        RecordingMutator::failing_parse(),
    );
    let original = sample_pdf(1);
    session.open_bytes("sample.pdf", original.clone()).unwrap();
    session.wait_for_render();
    session.click(ScreenPoint::new(20.0, 20.0)).unwrap();

    let mut events = TestScenarioBuilder::new().commit().build();
    run_with_event_source(&mut session, &mut events, |_| Ok(())).unwrap();

    assert_eq!(session.displayed_bytes(), Some(original.as_slice()));
    assert!(!session.can_download());
    assert!(
        session
            .notifications()
            .current()
            .is_some_and(|n| n.message.starts_with("Commit failed"))
    );
}
