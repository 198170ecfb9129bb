//! Content stream interpreter.
//!
//! Walks the operations of a page with graphics and text state, following
//! form XObjects, and reports everything that would put ink on the page
//! to a [`ContentSink`]. Clipping, shadings and transparency are ignored:
//! callers only need to know *where* marks land, not how they blend.

use std::collections::HashSet;
use std::sync::Arc;

use super::backend::{
    number_from_value, ContentOp, ObjectRef, PageId, PageResources, PdfBackend, PdfValue,
    XObjectKind,
};
use super::fonts::FontMetrics;
use crate::error::Result;
use crate::geometry::Matrix;

/// Nesting limit for form XObjects.
const MAX_FORM_DEPTH: usize = 16;

/// Operations one page may execute, counting those inside forms.
pub const DEFAULT_OP_BUDGET: usize = 2_000_000;

/// RGB color with components in `0.0..=1.0`.
pub type Rgb = [f32; 3];

const BLACK: Rgb = [0.0, 0.0, 0.0];

/// One segment of a path in user space (before the CTM).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CurveTo(f64, f64, f64, f64, f64, f64),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillRule {
    NonZero,
    EvenOdd,
}

/// A path painting operation.
#[derive(Debug, Clone)]
pub struct PaintedPath<'a> {
    pub segments: &'a [PathSegment],
    pub ctm: Matrix,
    pub fill: Option<FillRule>,
    pub stroke: bool,
    pub fill_color: Rgb,
    pub stroke_color: Rgb,
    pub line_width: f64,
}

/// One shown string (`Tj`, `'`, `"`) or `TJ` array.
#[derive(Debug, Clone)]
pub struct TextShow {
    /// Text matrix concatenated with the CTM at the start of the string.
    pub text_to_user: Matrix,
    pub font_size: f64,
    /// `Tz / 100`.
    pub horizontal_scale: f64,
    pub rise: f64,
    /// Total displacement along the baseline in unscaled text space.
    pub advance: f64,
    pub render_mode: u8,
    pub glyph_count: usize,
    pub fill_color: Rgb,
    pub stroke_color: Rgb,
}

impl TextShow {
    /// Glyph space origin mapped to user space: `[Tfs·Th 0 0 Tfs 0 Trise] × Tm × CTM`.
    pub fn rendering_matrix(&self) -> Matrix {
        Matrix::new(
            self.font_size * self.horizontal_scale,
            0.0,
            0.0,
            self.font_size,
            0.0,
            self.rise,
        )
        .then(&self.text_to_user)
    }

    /// Text render modes 3 and 7 paint nothing.
    pub fn is_visible(&self) -> bool {
        !matches!(self.render_mode, 3 | 7)
    }
}

/// Receiver for paint events. All methods default to no-ops.
pub trait ContentSink {
    fn paint_path(&mut self, _path: &PaintedPath<'_>) {}
    fn show_text(&mut self, _text: &TextShow) {}
    /// An image occupying the unit square under `ctm`.
    fn paint_image(&mut self, _ctm: &Matrix) {}
}

#[derive(Debug, Clone)]
struct TextState {
    font: Arc<FontMetrics>,
    size: f64,
    char_spacing: f64,
    word_spacing: f64,
    horizontal_scale: f64,
    leading: f64,
    rise: f64,
    render_mode: u8,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Arc::new(FontMetrics::default()),
            size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            leading: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    fill: Rgb,
    stroke: Rgb,
    line_width: f64,
    text: TextState,
}

impl GraphicsState {
    fn new(ctm: Matrix) -> Self {
        Self {
            ctm,
            fill: BLACK,
            stroke: BLACK,
            line_width: 1.0,
            text: TextState::default(),
        }
    }
}

/// Walks content streams and feeds a [`ContentSink`].
///
/// Each page gets a fixed operation budget shared by all the forms it
/// invokes. Once spent, interpretation stops and whatever was already
/// reported to the sink stands.
pub struct ContentInterpreter<'a, B: PdfBackend + ?Sized> {
    backend: &'a B,
    form_stack: HashSet<ObjectRef>,
    op_budget: usize,
    ops_left: usize,
    truncated: bool,
}

impl<'a, B: PdfBackend + ?Sized> ContentInterpreter<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self {
            backend,
            form_stack: HashSet::new(),
            op_budget: DEFAULT_OP_BUDGET,
            ops_left: DEFAULT_OP_BUDGET,
            truncated: false,
        }
    }

    /// Override the per-page operation budget.
    pub fn with_op_budget(mut self, budget: usize) -> Self {
        self.op_budget = budget;
        self.ops_left = budget;
        self
    }

    /// Whether the last page ran out of budget before finishing.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Interpret a page's content with `base` as the initial CTM.
    pub fn run_page<S: ContentSink + ?Sized>(
        &mut self,
        page: PageId,
        base: Matrix,
        sink: &mut S,
    ) -> Result<()> {
        let content = self.backend.page_content(page)?;
        let ops = self.backend.decode_content(&content)?;
        let resources = self.backend.page_resources(page)?;
        self.ops_left = self.op_budget;
        self.truncated = false;
        self.run_ops(&ops, &resources, GraphicsState::new(base), sink);
        if self.truncated {
            log::debug!(
                "page {:?}: stopped after {} operations, keeping partial content",
                page,
                self.op_budget
            );
        }
        Ok(())
    }

    fn run_ops<S: ContentSink + ?Sized>(
        &mut self,
        ops: &[ContentOp],
        resources: &PageResources,
        initial: GraphicsState,
        sink: &mut S,
    ) {
        let mut gs = initial;
        let mut stack: Vec<GraphicsState> = Vec::new();
        let mut path: Vec<PathSegment> = Vec::new();
        let mut current = (0.0, 0.0);
        let mut tm = Matrix::IDENTITY;
        let mut tlm = Matrix::IDENTITY;

        for op in ops {
            if self.ops_left == 0 {
                self.truncated = true;
                return;
            }
            self.ops_left -= 1;
            let args = &op.operands;
            match op.operator.as_str() {
                // Graphics state
                "q" => stack.push(gs.clone()),
                "Q" => {
                    if let Some(saved) = stack.pop() {
                        gs = saved;
                    }
                }
                "cm" => {
                    if let Some(m) = matrix_operand(args) {
                        gs.ctm = m.then(&gs.ctm);
                    }
                }
                "w" => {
                    if let Some(w) = num(args, 0) {
                        gs.line_width = w;
                    }
                }

                // Color
                "g" => gs.fill = gray(args).unwrap_or(gs.fill),
                "G" => gs.stroke = gray(args).unwrap_or(gs.stroke),
                "rg" => gs.fill = rgb(args).unwrap_or(gs.fill),
                "RG" => gs.stroke = rgb(args).unwrap_or(gs.stroke),
                "k" => gs.fill = cmyk(args).unwrap_or(gs.fill),
                "K" => gs.stroke = cmyk(args).unwrap_or(gs.stroke),
                "cs" => gs.fill = BLACK,
                "CS" => gs.stroke = BLACK,
                "sc" | "scn" => gs.fill = color_components(args).unwrap_or(gs.fill),
                "SC" | "SCN" => gs.stroke = color_components(args).unwrap_or(gs.stroke),

                // Path construction
                "m" => {
                    if let (Some(x), Some(y)) = (num(args, 0), num(args, 1)) {
                        path.push(PathSegment::MoveTo(x, y));
                        current = (x, y);
                    }
                }
                "l" => {
                    if let (Some(x), Some(y)) = (num(args, 0), num(args, 1)) {
                        path.push(PathSegment::LineTo(x, y));
                        current = (x, y);
                    }
                }
                "c" => {
                    if let Some([x1, y1, x2, y2, x3, y3]) = numbers::<6>(args) {
                        path.push(PathSegment::CurveTo(x1, y1, x2, y2, x3, y3));
                        current = (x3, y3);
                    }
                }
                "v" => {
                    if let Some([x2, y2, x3, y3]) = numbers::<4>(args) {
                        path.push(PathSegment::CurveTo(current.0, current.1, x2, y2, x3, y3));
                        current = (x3, y3);
                    }
                }
                "y" => {
                    if let Some([x1, y1, x3, y3]) = numbers::<4>(args) {
                        path.push(PathSegment::CurveTo(x1, y1, x3, y3, x3, y3));
                        current = (x3, y3);
                    }
                }
                "h" => path.push(PathSegment::Close),
                "re" => {
                    if let Some([x, y, w, h]) = numbers::<4>(args) {
                        path.push(PathSegment::MoveTo(x, y));
                        path.push(PathSegment::LineTo(x + w, y));
                        path.push(PathSegment::LineTo(x + w, y + h));
                        path.push(PathSegment::LineTo(x, y + h));
                        path.push(PathSegment::Close);
                        current = (x, y);
                    }
                }

                // Path painting
                "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    let operator = op.operator.as_str();
                    if matches!(operator, "s" | "b" | "b*") {
                        path.push(PathSegment::Close);
                    }
                    let fill = match operator {
                        "f" | "F" | "B" | "b" => Some(FillRule::NonZero),
                        "f*" | "B*" | "b*" => Some(FillRule::EvenOdd),
                        _ => None,
                    };
                    let stroke = matches!(operator, "S" | "s" | "B" | "B*" | "b" | "b*");
                    if !path.is_empty() {
                        sink.paint_path(&PaintedPath {
                            segments: &path,
                            ctm: gs.ctm,
                            fill,
                            stroke,
                            fill_color: gs.fill,
                            stroke_color: gs.stroke,
                            line_width: gs.line_width,
                        });
                    }
                    path.clear();
                }
                "n" => path.clear(),

                // Text objects and state
                "BT" => {
                    tm = Matrix::IDENTITY;
                    tlm = Matrix::IDENTITY;
                }
                "ET" => {}
                "Tf" => {
                    if let Some(PdfValue::Name(name)) = args.first() {
                        gs.text.font = resources
                            .fonts
                            .get(name)
                            .cloned()
                            .unwrap_or_else(|| Arc::new(FontMetrics::default()));
                    }
                    if let Some(size) = num(args, 1) {
                        gs.text.size = size;
                    }
                }
                "Tc" => gs.text.char_spacing = num(args, 0).unwrap_or(gs.text.char_spacing),
                "Tw" => gs.text.word_spacing = num(args, 0).unwrap_or(gs.text.word_spacing),
                "Tz" => {
                    if let Some(scale) = num(args, 0) {
                        gs.text.horizontal_scale = scale / 100.0;
                    }
                }
                "TL" => gs.text.leading = num(args, 0).unwrap_or(gs.text.leading),
                "Ts" => gs.text.rise = num(args, 0).unwrap_or(gs.text.rise),
                "Tr" => {
                    if let Some(mode) = num(args, 0) {
                        gs.text.render_mode = mode.clamp(0.0, 7.0) as u8;
                    }
                }

                // Text positioning
                "Td" => {
                    if let (Some(tx), Some(ty)) = (num(args, 0), num(args, 1)) {
                        tlm = Matrix::translation(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "TD" => {
                    if let (Some(tx), Some(ty)) = (num(args, 0), num(args, 1)) {
                        gs.text.leading = -ty;
                        tlm = Matrix::translation(tx, ty).then(&tlm);
                        tm = tlm;
                    }
                }
                "Tm" => {
                    if let Some(m) = matrix_operand(args) {
                        tlm = m;
                        tm = m;
                    }
                }
                "T*" => {
                    tlm = Matrix::translation(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                }

                // Text showing
                "Tj" => {
                    if let Some(PdfValue::Str(bytes)) = args.first() {
                        show(&gs, &mut tm, &[TjItem::Text(bytes)], sink);
                    }
                }
                "'" => {
                    tlm = Matrix::translation(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(PdfValue::Str(bytes)) = args.first() {
                        show(&gs, &mut tm, &[TjItem::Text(bytes)], sink);
                    }
                }
                "\"" => {
                    if let (Some(aw), Some(ac)) = (num(args, 0), num(args, 1)) {
                        gs.text.word_spacing = aw;
                        gs.text.char_spacing = ac;
                    }
                    tlm = Matrix::translation(0.0, -gs.text.leading).then(&tlm);
                    tm = tlm;
                    if let Some(PdfValue::Str(bytes)) = args.get(2) {
                        show(&gs, &mut tm, &[TjItem::Text(bytes)], sink);
                    }
                }
                "TJ" => {
                    if let Some(PdfValue::Array(items)) = args.first() {
                        let items: Vec<TjItem<'_>> = items
                            .iter()
                            .filter_map(|item| match item {
                                PdfValue::Str(bytes) => Some(TjItem::Text(bytes)),
                                other => number_from_value(other).map(TjItem::Adjust),
                            })
                            .collect();
                        show(&gs, &mut tm, &items, sink);
                    }
                }

                // XObjects and inline images
                "Do" => {
                    if let Some(PdfValue::Name(name)) = args.first() {
                        match resources.xobjects.get(name) {
                            Some(XObjectKind::Image) => sink.paint_image(&gs.ctm),
                            Some(XObjectKind::Form(id)) => {
                                self.run_form(*id, resources, &gs, sink);
                            }
                            None => log::debug!(
                                "unknown XObject /{}",
                                String::from_utf8_lossy(name)
                            ),
                        }
                    }
                }
                "BI" => sink.paint_image(&gs.ctm),

                _ => {}
            }
        }
    }

    fn run_form<S: ContentSink + ?Sized>(
        &mut self,
        id: ObjectRef,
        parent_resources: &PageResources,
        gs: &GraphicsState,
        sink: &mut S,
    ) {
        if self.form_stack.len() >= MAX_FORM_DEPTH || !self.form_stack.insert(id) {
            log::debug!("not entering form {} {} R (cycle or too deep)", id.0, id.1);
            return;
        }

        match self.backend.form_xobject(id) {
            Ok(form) => match self.backend.decode_content(&form.content) {
                Ok(ops) => {
                    let mut inner = gs.clone();
                    inner.ctm = form.matrix.then(&gs.ctm);
                    let resources = form.resources.as_ref().unwrap_or(parent_resources);
                    self.run_ops(&ops, resources, inner, sink);
                }
                Err(e) => log::debug!("form {} {} R content unreadable: {}", id.0, id.1, e),
            },
            Err(e) => log::debug!("form {} {} R unreadable: {}", id.0, id.1, e),
        }

        self.form_stack.remove(&id);
    }
}

enum TjItem<'a> {
    Text(&'a [u8]),
    /// Thousandths of text space, subtracted from the advance.
    Adjust(f64),
}

/// Emit one [`TextShow`] for a run of strings and advance the text matrix.
fn show<S: ContentSink + ?Sized>(
    gs: &GraphicsState,
    tm: &mut Matrix,
    items: &[TjItem<'_>],
    sink: &mut S,
) {
    let text = &gs.text;
    let start = *tm;
    let mut advance = 0.0;
    let mut glyph_count = 0;

    for item in items {
        match item {
            TjItem::Text(bytes) => {
                for code in text.font.codes(bytes) {
                    let mut tx = text.font.width(code) / 1000.0 * text.size + text.char_spacing;
                    if text.font.is_word_space(code) {
                        tx += text.word_spacing;
                    }
                    advance += tx * text.horizontal_scale;
                    glyph_count += 1;
                }
            }
            TjItem::Adjust(adjust) => {
                advance -= adjust / 1000.0 * text.size * text.horizontal_scale;
            }
        }
    }

    if glyph_count > 0 {
        sink.show_text(&TextShow {
            text_to_user: start.then(&gs.ctm),
            font_size: text.size,
            horizontal_scale: text.horizontal_scale,
            rise: text.rise,
            advance,
            render_mode: text.render_mode,
            glyph_count,
            fill_color: gs.fill,
            stroke_color: gs.stroke,
        });
    }

    *tm = Matrix::translation(advance, 0.0).then(tm);
}

fn num(args: &[PdfValue], index: usize) -> Option<f64> {
    args.get(index).and_then(number_from_value)
}

fn numbers<const N: usize>(args: &[PdfValue]) -> Option<[f64; N]> {
    if args.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, value) in out.iter_mut().zip(args) {
        *slot = number_from_value(value)?;
    }
    Some(out)
}

fn matrix_operand(args: &[PdfValue]) -> Option<Matrix> {
    numbers::<6>(args).map(|[a, b, c, d, e, f]| Matrix::new(a, b, c, d, e, f))
}

fn unit(v: f64) -> f32 {
    v.clamp(0.0, 1.0) as f32
}

fn gray(args: &[PdfValue]) -> Option<Rgb> {
    let [g] = numbers::<1>(args)?;
    Some([unit(g); 3])
}

fn rgb(args: &[PdfValue]) -> Option<Rgb> {
    let [r, g, b] = numbers::<3>(args)?;
    Some([unit(r), unit(g), unit(b)])
}

fn cmyk(args: &[PdfValue]) -> Option<Rgb> {
    let [c, m, y, k] = numbers::<4>(args)?;
    let k = 1.0 - k.clamp(0.0, 1.0);
    Some([
        unit((1.0 - c) * k),
        unit((1.0 - m) * k),
        unit((1.0 - y) * k),
    ])
}

/// `sc`/`scn` operands interpreted by count; patterns fall back to black.
fn color_components(args: &[PdfValue]) -> Option<Rgb> {
    let values: Vec<f64> = args.iter().filter_map(number_from_value).collect();
    match values.len() {
        0 => Some(BLACK),
        1 => gray(args),
        3 => rgb(args),
        4 => cmyk(args),
        _ => None,
    }
}
