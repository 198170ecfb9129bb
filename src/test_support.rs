//! In-memory fixture documents for unit tests.

use lopdf::{dictionary, Dictionary, Document, Object, Stream};

/// Description of one fixture page.
pub struct PageSpec {
    pub content: Vec<u8>,
    pub media_box: [f64; 4],
    /// Replaces the MediaBox entry verbatim (for malformed boxes).
    pub media_box_override: Option<Object>,
    /// Put the MediaBox on the page tree node instead of the page.
    pub inherit_media_box: bool,
    pub crop_box: Option<[f64; 4]>,
}

impl PageSpec {
    pub fn letter(content: Vec<u8>) -> Self {
        Self {
            content,
            media_box: [0.0, 0.0, 612.0, 792.0],
            media_box_override: None,
            inherit_media_box: false,
            crop_box: None,
        }
    }
}

pub fn rect(values: [f64; 4]) -> Object {
    Object::Array(values.iter().map(|v| Object::Real(*v as f32)).collect())
}

/// A document whose pages share one Helvetica font resource named `F1`.
pub fn document(pages: &[PageSpec]) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::new();
    for fixture in pages {
        let content_id = doc.add_object(Stream::new(Dictionary::new(), fixture.content.clone()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        if !fixture.inherit_media_box {
            let media = fixture
                .media_box_override
                .clone()
                .unwrap_or_else(|| rect(fixture.media_box));
            page.set("MediaBox", media);
        }
        if let Some(crop) = fixture.crop_box {
            page.set("CropBox", rect(crop));
        }
        kids.push(Object::Reference(doc.add_object(page)));
    }

    let mut tree = dictionary! {
        "Type" => "Pages",
        "Count" => pages.len() as i64,
        "Kids" => kids,
    };
    if let Some(first) = pages.first().filter(|p| p.inherit_media_box) {
        tree.set("MediaBox", rect(first.media_box));
    }
    doc.objects.insert(pages_id, Object::Dictionary(tree));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn single_page_document(fixture: &PageSpec) -> Document {
    document(std::slice::from_ref(fixture))
}

pub fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
