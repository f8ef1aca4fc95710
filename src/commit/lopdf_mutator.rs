//! `lopdf`-backed document mutator
//!
//! Text is appended as an extra content stream per draw call. The first time
//! a page is touched its existing content is wrapped in `q … Q` so whatever
//! graphics state it leaves behind cannot leak into the overlay, and a
//! Helvetica resource is registered next to the page's own fonts.

use std::collections::HashSet;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};

use super::mutator::{DocumentMutator, DrawTextOptions, MutableDocument, MutatorFault};

const FONT_RESOURCE: &str = "FStamp";
const LINE_HEIGHT_FACTOR: f32 = 1.2;
/// Average Helvetica advance as a fraction of the font size
const AVG_GLYPH_EM: f32 = 0.5;
/// Guards against cyclic `Parent` chains in malformed page trees
const MAX_TREE_DEPTH: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfMutator;

impl DocumentMutator for LopdfMutator {
    type Document = LopdfDocument;

    fn parse(&self, bytes: &[u8]) -> Result<Self::Document, MutatorFault> {
        let doc = Document::load_mem(bytes).map_err(|e| MutatorFault::Parse(e.to_string()))?;
        let pages = doc.get_pages().into_values().collect();
        Ok(LopdfDocument {
            doc,
            pages,
            prepared: HashSet::new(),
            font_id: None,
        })
    }
}

pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    prepared: HashSet<ObjectId>,
    font_id: Option<ObjectId>,
}

impl LopdfDocument {
    fn dict(&self, id: ObjectId) -> Option<&Dictionary> {
        self.doc.get_object(id).and_then(Object::as_dict).ok()
    }

    fn font_id(&mut self) -> ObjectId {
        if let Some(id) = self.font_id {
            return id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        self.font_id = Some(id);
        id
    }

    /// Look up a page attribute, following `Parent` links for inherited ones.
    /// References are resolved.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = self.dict(page_id);
        for _ in 0..MAX_TREE_DEPTH {
            let dict = current?;
            match dict.get(key) {
                Ok(Object::Reference(id)) => return self.doc.get_object(*id).ok(),
                Ok(value) => return Some(value),
                Err(_) => {}
            }
            current = dict
                .get(b"Parent")
                .and_then(Object::as_reference)
                .ok()
                .and_then(|id| self.dict(id));
        }
        None
    }

    fn inherited_dict(&self, page_id: ObjectId, key: &[u8]) -> Dictionary {
        self.inherited(page_id, key)
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default()
    }

    /// Lower-left corner of the visible page box (CropBox, else MediaBox)
    /// in user space
    fn visible_origin(&self, page_id: ObjectId) -> (f32, f32) {
        [b"CropBox".as_slice(), b"MediaBox".as_slice()]
            .into_iter()
            .find_map(|key| self.page_box(page_id, key))
            .map_or((0.0, 0.0), |[x0, y0, x1, y1]| (x0.min(x1), y0.min(y1)))
    }

    fn page_box(&self, page_id: ObjectId, key: &[u8]) -> Option<[f32; 4]> {
        let items = self.inherited(page_id, key)?.as_array().ok()?;
        if items.len() != 4 {
            return None;
        }
        let mut corners = [0.0; 4];
        for (slot, item) in corners.iter_mut().zip(items) {
            let item = match item {
                Object::Reference(id) => self.doc.get_object(*id).ok()?,
                other => other,
            };
            *slot = number(item)?;
        }
        Some(corners)
    }

    fn content_refs(&self, contents: Option<&Object>) -> Vec<Object> {
        match contents {
            Some(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Some(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    fn prepare_page(&mut self, page_id: ObjectId) -> Result<(), MutatorFault> {
        if self.prepared.contains(&page_id) {
            return Ok(());
        }

        let font_id = self.font_id();
        let mut resources = self.inherited_dict(page_id, b"Resources");
        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Dictionary(d)) => d.clone(),
            Ok(Object::Reference(id)) => self.dict(*id).cloned().unwrap_or_default(),
            _ => Dictionary::new(),
        };
        fonts.set(FONT_RESOURCE, Object::Reference(font_id));
        resources.set("Font", Object::Dictionary(fonts));

        let existing = {
            let page = self
                .dict(page_id)
                .ok_or_else(|| MutatorFault::Edit(format!("page object {page_id:?} is not a dictionary")))?;
            self.content_refs(page.get(b"Contents").ok())
        };

        let open_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let close_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, b"Q\n".to_vec()));

        let mut contents = Vec::with_capacity(existing.len() + 2);
        contents.push(Object::Reference(open_id));
        contents.extend(existing);
        contents.push(Object::Reference(close_id));

        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| MutatorFault::Edit(e.to_string()))?;
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Array(contents));

        self.prepared.insert(page_id);
        Ok(())
    }

    fn append_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), MutatorFault> {
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page = self
            .doc
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| MutatorFault::Edit(e.to_string()))?;
        match page.get_mut(b"Contents") {
            Ok(Object::Array(items)) => items.push(Object::Reference(content_id)),
            _ => page.set("Contents", Object::Array(vec![Object::Reference(content_id)])),
        }
        Ok(())
    }
}

impl MutableDocument for LopdfDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn draw_text(
        &mut self,
        page_index: usize,
        text: &str,
        options: &DrawTextOptions,
    ) -> Result<(), MutatorFault> {
        let page_id = *self
            .pages
            .get(page_index)
            .ok_or(MutatorFault::PageNotFound(page_index))?;

        if text.trim().is_empty() {
            return Ok(());
        }

        let (origin_x, origin_y) = self.visible_origin(page_id);
        let placed = DrawTextOptions {
            x: options.x + origin_x,
            y: options.y + origin_y,
            ..options.clone()
        };

        self.prepare_page(page_id)?;
        let content = text_operations(text, &placed)
            .encode()
            .map_err(|e| MutatorFault::Edit(e.to_string()))?;
        self.append_content(page_id, content)
    }

    fn serialize(mut self) -> Result<Vec<u8>, MutatorFault> {
        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| MutatorFault::Serialize(e.to_string()))?;
        Ok(out)
    }
}

fn text_operations(text: &str, options: &DrawTextOptions) -> Content {
    let line_height = options.font_size * LINE_HEIGHT_FACTOR;
    let first_baseline = options.y - options.font_size;
    let color = options.color;

    let mut operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "rg",
            vec![
                Object::Real(color.r),
                Object::Real(color.g),
                Object::Real(color.b),
            ],
        ),
        Operation::new("BT", vec![]),
        Operation::new(
            "Tf",
            vec![
                Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
                Object::Real(options.font_size),
            ],
        ),
    ];

    for (i, line) in wrap_lines(text, options.max_width, options.font_size)
        .iter()
        .enumerate()
    {
        let baseline = first_baseline - i as f32 * line_height;
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Real(options.x),
                Object::Real(baseline),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(win_ansi_bytes(line), StringFormat::Literal)],
        ));
    }

    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));
    Content { operations }
}

fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(v) => Some(*v as f32),
        Object::Real(v) => Some(*v),
        _ => None,
    }
}

/// Wrap text to the number of average glyphs that fit in `max_width`
fn wrap_lines(text: &str, max_width: f32, font_size: f32) -> Vec<String> {
    let columns = (max_width / (font_size * AVG_GLYPH_EM)).floor().max(1.0) as usize;
    textwrap::wrap(text, columns)
        .into_iter()
        .map(std::borrow::Cow::into_owned)
        .collect()
}

/// Helvetica without embedding only covers Latin-1
fn win_ansi_bytes(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7E | code @ 0xA0..=0xFF => code as u8,
            _ => b'?',
        })
        .collect()
}
