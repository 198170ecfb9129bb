//! Fixture PDFs for integration tests.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document, Object, Stream};

/// One page of a fixture document.
pub struct Page {
    pub content: Vec<u8>,
    pub media_box: Object,
    pub compress: bool,
}

impl Page {
    /// US Letter page with the given content stream.
    pub fn letter(content: &str) -> Self {
        Self {
            content: content.as_bytes().to_vec(),
            media_box: media_box(0.0, 0.0, 612.0, 792.0),
            compress: false,
        }
    }

    /// Same content, stored FlateDecode-compressed.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    pub fn with_media_box(mut self, media_box: Object) -> Self {
        self.media_box = media_box;
        self
    }
}

pub fn media_box(llx: f64, lly: f64, urx: f64, ury: f64) -> Object {
    Object::Array(
        [llx, lly, urx, ury]
            .iter()
            .map(|v| Object::Real(*v as f32))
            .collect(),
    )
}

/// Serialize a document with one Helvetica font `F1` shared by all pages.
pub fn build_pdf(pages: Vec<Page>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let stream = if page.compress {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&page.content).unwrap();
            Stream::new(
                dictionary! { "Filter" => "FlateDecode" },
                encoder.finish().unwrap(),
            )
        } else {
            Stream::new(dictionary! {}, page.content)
        };
        let content_id = doc.add_object(stream);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => page.media_box,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// A page box of the 1-indexed `page`, if present and numeric.
pub fn page_box(bytes: &[u8], page: u32, key: &str) -> Option<[f64; 4]> {
    let doc = Document::load_mem(bytes).unwrap();
    let id = doc.get_pages()[&page];
    let dict = doc.get_dictionary(id).unwrap();
    let array = dict.get(key.as_bytes()).ok()?.as_array().ok()?;
    let values: Vec<f64> = array
        .iter()
        .map(|o| match o {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r as f64),
            _ => None,
        })
        .collect::<Option<_>>()?;
    values.try_into().ok()
}

pub fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

/// Text spanning (100,100)-(500,700) in top-left page coordinates.
pub const SCENARIO_TEXT: &str =
    "BT /F1 20 Tf 100 672 Td (cksvxyzJcksvxyzJcksvxyzJcksvxyzJcksvxyzJ) Tj 0 -580 Td (a) Tj ET";
