//! Fixtures shared by unit and integration tests

pub mod test_helpers {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use flume::{Receiver, Sender};
    use lopdf::content::{Content, Operation};
    use lopdf::{Document, Object, Stream, dictionary};

    use crate::commit::{DocumentMutator, DrawTextOptions, MutableDocument, MutatorFault};
    use crate::event_source::{EditorEvent, SimulatedEventSource};
    use crate::geometry::{PageSize, RasterScale, ScreenPoint};
    use crate::overlay::{AnnotationId, PointerScope};
    use crate::pdf::{
        CancelToken, PageBitmap, RasterDocument, RasterFault, Rasterizer, check_page,
    };
    use crate::session::PDF_MAGIC;

    /// Build a letter-sized PDF with `pages` pages, each showing its number.
    ///
    /// Fonts and the MediaBox sit on the page tree root so pages inherit them.
    pub fn sample_pdf(pages: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids = Vec::with_capacity(pages);
        for page in 1..=pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), Object::Integer(36)]),
                    Operation::new("Td", vec![Object::Integer(72), Object::Integer(700)]),
                    Operation::new("Tj", vec![Object::string_literal(format!("Page {page}"))]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("content encodes"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let page_tree = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(pages as i64),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        };
        doc.objects.insert(pages_id, Object::Dictionary(page_tree));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("sample PDF serializes");
        out
    }

    /// Rasterizer returning blank pages of a fixed size.
    ///
    /// Renders can be held back with [`MockRasterizer::gated`] to observe
    /// in-flight cancellation, and individual pages can be made to fail.
    pub struct MockRasterizer {
        page_count: usize,
        page_size: PageSize,
        failing_pages: HashSet<usize>,
        gate: Option<Receiver<()>>,
        renders: Arc<Mutex<Vec<usize>>>,
    }

    impl MockRasterizer {
        pub fn new(page_count: usize) -> Self {
            Self {
                page_count,
                page_size: PageSize::LETTER,
                failing_pages: HashSet::new(),
                gate: None,
                renders: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing_page(mut self, page_number: usize) -> Self {
            self.failing_pages.insert(page_number);
            self
        }

        /// Every render blocks until one message arrives on the returned
        /// sender (or the sender is dropped)
        pub fn gated(mut self) -> (Self, Sender<()>) {
            let (tx, rx) = flume::unbounded();
            self.gate = Some(rx);
            (self, tx)
        }

        /// Pages whose rendering started, in order
        pub fn rendered_pages(&self) -> Vec<usize> {
            self.renders.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    impl Rasterizer for MockRasterizer {
        fn open(&self, bytes: &[u8]) -> Result<Box<dyn RasterDocument>, RasterFault> {
            if !bytes.starts_with(PDF_MAGIC) {
                return Err(RasterFault::generic("not a PDF"));
            }
            Ok(Box::new(MockDocument {
                page_count: self.page_count,
                page_size: self.page_size,
                failing_pages: self.failing_pages.clone(),
                gate: self.gate.clone(),
                renders: Arc::clone(&self.renders),
            }))
        }
    }

    struct MockDocument {
        page_count: usize,
        page_size: PageSize,
        failing_pages: HashSet<usize>,
        gate: Option<Receiver<()>>,
        renders: Arc<Mutex<Vec<usize>>>,
    }

    impl RasterDocument for MockDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn page_size(&self, page_number: usize) -> Result<PageSize, RasterFault> {
            check_page(page_number, self.page_count)?;
            Ok(self.page_size)
        }

        fn render_page(
            &self,
            page_number: usize,
            scale: RasterScale,
            cancel: &CancelToken,
        ) -> Result<PageBitmap, RasterFault> {
            check_page(page_number, self.page_count)?;
            if let Ok(mut renders) = self.renders.lock() {
                renders.push(page_number);
            }
            if let Some(gate) = &self.gate {
                let _ = gate.recv();
            }
            if cancel.is_cancelled() {
                return Err(RasterFault::Cancelled);
            }
            if self.failing_pages.contains(&page_number) {
                return Err(RasterFault::generic(format!("page {page_number} is broken")));
            }

            let (width_px, height_px) = self.page_size.viewport(scale);
            Ok(PageBitmap {
                pixels: vec![255; width_px as usize * height_px as usize * 3],
                width_px,
                height_px,
                page_number,
                scale,
            })
        }
    }

    /// One recorded `draw_text` call
    #[derive(Clone, Debug, PartialEq)]
    pub struct DrawCall {
        pub page_index: usize,
        pub text: String,
        pub options: DrawTextOptions,
    }

    #[derive(Debug, Default)]
    struct MutationLog {
        draws: Vec<DrawCall>,
        serialized: usize,
    }

    /// Mutator that records draws instead of editing a PDF.
    ///
    /// Draws only reach the shared log on `serialize`, matching the rule that
    /// nothing is observable before serialization. Clones share the log.
    #[derive(Clone)]
    pub struct RecordingMutator {
        page_count: usize,
        fail_parse: bool,
        log: Arc<Mutex<MutationLog>>,
    }

    impl RecordingMutator {
        pub fn new(page_count: usize) -> Self {
            Self {
                page_count,
                fail_parse: false,
                log: Arc::default(),
            }
        }

        pub fn failing_parse() -> Self {
            Self {
                fail_parse: true,
                ..Self::new(1)
            }
        }

        pub fn draw_calls(&self) -> Vec<DrawCall> {
            self.log
                .lock()
                .map(|log| log.draws.clone())
                .unwrap_or_default()
        }

        pub fn serialize_count(&self) -> usize {
            self.log.lock().map(|log| log.serialized).unwrap_or(0)
        }
    }

    impl DocumentMutator for RecordingMutator {
        type Document = RecordingDocument;

        fn parse(&self, bytes: &[u8]) -> Result<Self::Document, MutatorFault> {
            if self.fail_parse {
                return Err(MutatorFault::Parse("refusing to parse".into()));
            }
            Ok(RecordingDocument {
                source: bytes.to_vec(),
                page_count: self.page_count,
                pending: Vec::new(),
                log: Arc::clone(&self.log),
            })
        }
    }

    pub struct RecordingDocument {
        source: Vec<u8>,
        page_count: usize,
        pending: Vec<DrawCall>,
        log: Arc<Mutex<MutationLog>>,
    }

    impl MutableDocument for RecordingDocument {
        fn page_count(&self) -> usize {
            self.page_count
        }

        fn draw_text(
            &mut self,
            page_index: usize,
            text: &str,
            options: &DrawTextOptions,
        ) -> Result<(), MutatorFault> {
            if page_index >= self.page_count {
                return Err(MutatorFault::PageNotFound(page_index));
            }
            self.pending.push(DrawCall {
                page_index,
                text: text.to_string(),
                options: options.clone(),
            });
            Ok(())
        }

        fn serialize(self) -> Result<Vec<u8>, MutatorFault> {
            let mut out = self.source;
            out.extend_from_slice(format!("\n% {} draw(s)\n", self.pending.len()).as_bytes());
            if let Ok(mut log) = self.log.lock() {
                log.draws.extend(self.pending);
                log.serialized += 1;
            }
            Ok(out)
        }
    }

    /// Builder for creating test scenarios with simulated user input
    #[derive(Default)]
    pub struct TestScenarioBuilder {
        events: Vec<EditorEvent>,
    }

    impl TestScenarioBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn offset(mut self, x: f32, y: f32) -> Self {
            self.events
                .push(EditorEvent::CanvasOffset(ScreenPoint::new(x, y)));
            self
        }

        pub fn click(mut self, x: f32, y: f32) -> Self {
            self.events.push(EditorEvent::Click(ScreenPoint::new(x, y)));
            self
        }

        /// Press, move and release, dragging whatever is under `from`
        pub fn drag(mut self, from: (f32, f32), to: (f32, f32)) -> Self {
            self.events.push(EditorEvent::PointerDown {
                point: ScreenPoint::new(from.0, from.1),
                scope: PointerScope::Canvas,
            });
            self.events
                .push(EditorEvent::PointerMove(ScreenPoint::new(to.0, to.1)));
            self.events.push(EditorEvent::PointerUp);
            self
        }

        pub fn type_text(mut self, id: u64, text: &str) -> Self {
            self.events.push(EditorEvent::EditText {
                id: AnnotationId::new(id),
                text: text.to_string(),
            });
            self
        }

        pub fn next_page(mut self) -> Self {
            self.events.push(EditorEvent::NextPage);
            self
        }

        pub fn previous_page(mut self) -> Self {
            self.events.push(EditorEvent::PreviousPage);
            self
        }

        pub fn commit(mut self) -> Self {
            self.events.push(EditorEvent::Commit);
            self
        }

        pub fn download_to(mut self, path: impl Into<std::path::PathBuf>) -> Self {
            self.events.push(EditorEvent::Download(Some(path.into())));
            self
        }

        pub fn quit(mut self) -> Self {
            self.events.push(EditorEvent::Quit);
            self
        }

        /// Build the simulated event source
        pub fn build(self) -> SimulatedEventSource {
            SimulatedEventSource::new(self.events)
        }
    }
}

pub use test_helpers::*;
