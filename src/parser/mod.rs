//! PDF reading: backend abstraction, font metrics and the content interpreter.

pub mod backend;
pub mod fonts;
pub mod interpreter;
pub mod standard_fonts;

pub use backend::{
    ContentOp, FormXObject, LopdfBackend, ObjectRef, PageId, PageResources, PdfBackend, PdfValue,
    XObjectKind,
};
pub use fonts::FontMetrics;
pub use interpreter::{
    ContentInterpreter, ContentSink, FillRule, PaintedPath, PathSegment, Rgb, TextShow,
};
