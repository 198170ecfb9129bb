//! Page-space geometry shared by the analyzers, the mapper and the mutator.
//!
//! Two coordinate conventions meet here:
//!
//! - **view space**: origin at the top-left corner of the page's visible
//!   box, y grows downwards, units are points. Analyzers report
//!   [`ContentBox`] values in this space.
//! - **page space**: origin at the bottom-left of the visible box, y grows
//!   upwards. [`CropRegion`] values live here and are what gets written to
//!   the page dictionary (offset by the box origin).

pub mod mapper;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use mapper::{pad_and_clamp, to_crop_region, MIN_CROP_SIZE};

/// A 2D affine transform `[a b c d e f]` as used by PDF content streams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// `self × other`: apply `self` first, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    pub fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f]
            .iter()
            .all(|v| v.is_finite())
    }
}

/// The visible box of a page at scale 1, unrotated.
///
/// `origin_x` / `origin_y` locate the lower-left corner of the box in the
/// page's user space. Malformed box entries produce non-finite fields so
/// that [`PageGeometry::is_valid`] rejects the page instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    pub origin_x: f64,
    pub origin_y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    /// A box anchored at the user-space origin.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin_x: 0.0,
            origin_y: 0.0,
            width,
            height,
        }
    }

    /// Build from a `[llx lly urx ury]` rectangle, normalizing swapped corners.
    pub fn from_rect(rect: [f64; 4]) -> Self {
        let [x0, y0, x1, y1] = rect;
        Self {
            origin_x: x0.min(x1),
            origin_y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Geometry for a page whose boxes could not be read.
    pub fn invalid() -> Self {
        Self {
            origin_x: f64::NAN,
            origin_y: f64::NAN,
            width: f64::NAN,
            height: f64::NAN,
        }
    }

    /// Finite and strictly positive in both dimensions.
    pub fn is_valid(&self) -> bool {
        self.origin_x.is_finite()
            && self.origin_y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Intersection with another box, or `None` when they do not overlap.
    pub fn intersect(&self, other: &PageGeometry) -> Option<PageGeometry> {
        let llx = self.origin_x.max(other.origin_x);
        let lly = self.origin_y.max(other.origin_y);
        let urx = (self.origin_x + self.width).min(other.origin_x + other.width);
        let ury = (self.origin_y + self.height).min(other.origin_y + other.height);
        if urx > llx && ury > lly {
            Some(PageGeometry::from_rect([llx, lly, urx, ury]))
        } else {
            None
        }
    }

    /// Maps page user space into view space (top-left origin, y down).
    pub fn user_to_view(&self) -> Matrix {
        Matrix::new(
            1.0,
            0.0,
            0.0,
            -1.0,
            -self.origin_x,
            self.origin_y + self.height,
        )
    }
}

/// Detected content extent in view space (points, top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl ContentBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// The whole visible page: `{0, 0, width, height}`.
    pub fn full_page(geometry: &PageGeometry) -> Self {
        Self::new(0.0, 0.0, geometry.width, geometry.height)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }
}

/// Running min/max accumulator for building a [`ContentBox`].
#[derive(Debug, Clone, Copy)]
pub struct BoundsAccumulator {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

impl Default for BoundsAccumulator {
    fn default() -> Self {
        Self {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
        }
    }
}

impl BoundsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point; non-finite points are ignored.
    pub fn add_point(&mut self, x: f64, y: f64) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn is_empty(&self) -> bool {
        !self.min_x.is_finite()
    }

    pub fn finish(&self) -> Option<ContentBox> {
        if self.is_empty() {
            None
        } else {
            Some(ContentBox::new(self.min_x, self.min_y, self.max_x, self.max_y))
        }
    }
}

/// A crop rectangle in page space (bottom-left origin), relative to the
/// visible box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl CropRegion {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
    }

    /// Absolute `[llx lly urx ury]` for a box whose lower-left corner is at
    /// `(origin_x, origin_y)` in user space.
    pub fn to_pdf_rect(&self, geometry: &PageGeometry) -> [f64; 4] {
        let llx = geometry.origin_x + self.x;
        let lly = geometry.origin_y + self.y;
        [llx, lly, llx + self.width, lly + self.height]
    }
}

impl fmt::Display for CropRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x={:.2} y={:.2} w={:.2} h={:.2}",
            self.x, self.y, self.width, self.height
        )
    }
}
