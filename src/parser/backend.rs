//! PDF backend abstraction layer.
//!
//! Provides a trait-based interface for the read-only side of a trim,
//! isolating the concrete PDF library (lopdf) from the analyzers.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use lopdf::{Dictionary, Document as LopdfDocument, Object, Stream};

use super::fonts::FontMetrics;
use crate::error::{Error, Result};
use crate::geometry::{Matrix, PageGeometry};

/// Page identifier: (object number, generation number).
pub type PageId = (u32, u16);

/// Indirect object identifier.
pub type ObjectRef = (u32, u16);

/// Upper bound on `/Parent` hops when resolving inherited attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// A value from a PDF content stream operand.
#[derive(Debug, Clone)]
pub enum PdfValue {
    Integer(i64),
    Real(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

/// A single operation from a PDF content stream.
#[derive(Debug, Clone)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

/// An XObject entry of a resource dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XObjectKind {
    Image,
    Form(ObjectRef),
}

/// Resolved resources of a page or form.
#[derive(Debug, Clone, Default)]
pub struct PageResources {
    pub fonts: HashMap<Vec<u8>, Arc<FontMetrics>>,
    pub xobjects: HashMap<Vec<u8>, XObjectKind>,
}

/// A form XObject ready to be interpreted.
#[derive(Debug, Clone)]
pub struct FormXObject {
    pub content: Vec<u8>,
    pub matrix: Matrix,
    /// `None` when the form inherits its caller's resources.
    pub resources: Option<PageResources>,
}

/// Abstract interface for read-only PDF access.
///
/// Implementations provide page enumeration, page geometry, content
/// streams and resources without exposing any concrete PDF library types.
pub trait PdfBackend: Sync {
    /// Return all pages as (page_number → PageId).
    fn pages(&self) -> BTreeMap<u32, PageId>;

    /// Visible box of a page. Never fails; unreadable boxes come back
    /// with non-finite fields.
    fn page_geometry(&self, page: PageId) -> PageGeometry;

    /// The concatenated, decompressed content streams of a page.
    fn page_content(&self, page: PageId) -> Result<Vec<u8>>;

    /// Fonts and XObjects reachable from a page.
    fn page_resources(&self, page: PageId) -> Result<PageResources>;

    /// Load a form XObject by reference.
    fn form_xobject(&self, id: ObjectRef) -> Result<FormXObject>;

    /// Parse raw content stream bytes into a sequence of operations.
    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>>;
}

// ---------------------------------------------------------------------------
// LopdfBackend: lopdf-backed implementation
// ---------------------------------------------------------------------------

/// Concrete [`PdfBackend`] backed by `lopdf::Document`.
pub struct LopdfBackend {
    doc: LopdfDocument,
}

impl LopdfBackend {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        Ok(Self {
            doc: load_document(data)?,
        })
    }

    /// Wrap an already decoded document.
    pub fn from_document(doc: LopdfDocument) -> Self {
        Self { doc }
    }
}

/// Decode a document, rejecting encrypted files.
pub fn load_document(data: &[u8]) -> Result<LopdfDocument> {
    let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
        lopdf::Error::Decryption(_) => Error::Encrypted,
        _ => Error::from(e),
    })?;
    if doc.is_encrypted() {
        return Err(Error::Encrypted);
    }
    Ok(doc)
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_geometry(&self, page: PageId) -> PageGeometry {
        page_geometry(&self.doc, page)
    }

    fn page_content(&self, page_id: PageId) -> Result<Vec<u8>> {
        let page_dict = self
            .doc
            .get_dictionary(page_id)
            .map_err(|e| Error::PdfParse(e.to_string()))?;

        // A page without /Contents is blank.
        let Ok(contents) = page_dict.get(b"Contents") else {
            return Ok(Vec::new());
        };

        match resolve(&self.doc, contents) {
            Object::Stream(s) => stream_bytes(s),
            Object::Array(arr) => {
                let mut content = Vec::new();
                for obj in arr {
                    if let Object::Stream(s) = resolve(&self.doc, obj) {
                        match stream_bytes(s) {
                            Ok(data) => {
                                content.extend_from_slice(&data);
                                content.push(b' ');
                            }
                            Err(e) => log::debug!("skipping unreadable content stream: {}", e),
                        }
                    }
                }
                Ok(content)
            }
            _ => Err(Error::PdfParse("Invalid content stream".to_string())),
        }
    }

    fn page_resources(&self, page: PageId) -> Result<PageResources> {
        match inherited(&self.doc, page, b"Resources").and_then(|o| resolve_dict(&self.doc, o)) {
            Some(dict) => Ok(collect_resources(&self.doc, dict)),
            None => Ok(PageResources::default()),
        }
    }

    fn form_xobject(&self, id: ObjectRef) -> Result<FormXObject> {
        let stream = match self.doc.get_object(id)? {
            Object::Stream(s) => s,
            _ => {
                return Err(Error::PdfParse(format!(
                    "XObject {} {} R is not a stream",
                    id.0, id.1
                )))
            }
        };

        let matrix = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| matrix_from_object(&self.doc, o))
            .unwrap_or_default();

        let resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(&self.doc, o))
            .map(|dict| collect_resources(&self.doc, dict));

        Ok(FormXObject {
            content: stream_bytes(stream)?,
            matrix,
            resources,
        })
    }

    fn decode_content(&self, data: &[u8]) -> Result<Vec<ContentOp>> {
        let content =
            lopdf::content::Content::decode(data).map_err(|e| Error::PdfParse(e.to_string()))?;

        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operator: op.operator,
                operands: op.operands.iter().map(convert_object).collect(),
            })
            .collect())
    }
}

fn collect_resources(doc: &LopdfDocument, resources: &Dictionary) -> PageResources {
    let mut out = PageResources::default();

    if let Some(fonts) = resources
        .get(b"Font")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    {
        for (name, obj) in fonts.iter() {
            let metrics = resolve_dict(doc, obj)
                .map(|dict| FontMetrics::from_dict(doc, dict))
                .unwrap_or_default();
            out.fonts.insert(name.clone(), Arc::new(metrics));
        }
    }

    if let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|o| resolve_dict(doc, o))
    {
        for (name, obj) in xobjects.iter() {
            let Ok(id) = obj.as_reference() else {
                continue;
            };
            let Ok(Object::Stream(stream)) = doc.get_object(id) else {
                continue;
            };
            let kind = match stream.dict.get(b"Subtype").ok().and_then(|o| o.as_name().ok()) {
                Some(b"Image") => XObjectKind::Image,
                Some(b"Form") => XObjectKind::Form(id),
                _ => continue,
            };
            out.xobjects.insert(name.clone(), kind);
        }
    }

    out
}

/// Raw or decompressed bytes of a stream, depending on `/Filter`.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| Error::PdfParse(e.to_string()))
    } else {
        Ok(stream.content.clone())
    }
}

/// Follow indirect references (bounded).
pub(crate) fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> &'a Object {
    let mut current = obj;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        match current {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => current = next,
                Err(_) => return current,
            },
            _ => return current,
        }
    }
    current
}

/// Resolve to a dictionary (a stream's dictionary counts).
pub(crate) fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Look up a page attribute, walking `/Parent` for inheritable keys.
pub(crate) fn inherited<'a>(
    doc: &'a LopdfDocument,
    page: PageId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// A four-number rectangle, or `None` if the entry is malformed.
pub(crate) fn rect_from_object(doc: &LopdfDocument, obj: &Object) -> Option<[f64; 4]> {
    let arr = resolve(doc, obj).as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let mut rect = [0.0; 4];
    for (slot, item) in rect.iter_mut().zip(arr) {
        *slot = number(resolve(doc, item))?;
    }
    Some(rect)
}

fn matrix_from_object(doc: &LopdfDocument, obj: &Object) -> Option<Matrix> {
    let arr = resolve(doc, obj).as_array().ok()?;
    let values: Vec<f64> = arr
        .iter()
        .map(|o| number(resolve(doc, o)))
        .collect::<Option<_>>()?;
    match values.as_slice() {
        [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// The page's MediaBox, inherited if needed. Invalid when missing or malformed.
pub(crate) fn media_box(doc: &LopdfDocument, page: PageId) -> PageGeometry {
    inherited(doc, page, b"MediaBox")
        .and_then(|o| rect_from_object(doc, o))
        .map(PageGeometry::from_rect)
        .unwrap_or_else(PageGeometry::invalid)
}

/// The visible box: CropBox clipped to the MediaBox.
///
/// A malformed or disjoint CropBox is ignored in favor of the MediaBox.
pub(crate) fn page_geometry(doc: &LopdfDocument, page: PageId) -> PageGeometry {
    let media = media_box(doc, page);
    if !media.is_valid() {
        return media;
    }
    inherited(doc, page, b"CropBox")
        .and_then(|o| rect_from_object(doc, o))
        .map(PageGeometry::from_rect)
        .and_then(|crop| media.intersect(&crop))
        .unwrap_or(media)
}

/// Convert a `lopdf::Object` to [`PdfValue`].
fn convert_object(obj: &Object) -> PdfValue {
    match obj {
        Object::Integer(i) => PdfValue::Integer(*i),
        Object::Real(r) => PdfValue::Real(*r),
        Object::Name(n) => PdfValue::Name(n.clone()),
        Object::String(b, _) => PdfValue::Str(b.clone()),
        Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

/// Helper: extract a number from a [`PdfValue`].
pub fn number_from_value(val: &PdfValue) -> Option<f64> {
    match val {
        PdfValue::Integer(i) => Some(*i as f64),
        PdfValue::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}
