//! View-space content box → page-space crop region.

use super::{ContentBox, CropRegion, PageGeometry};

/// Smallest crop edge written to a page, in points.
pub const MIN_CROP_SIZE: f64 = 10.0;

/// `min(hi, max(lo, v))`; unlike `f64::clamp` this never panics when the
/// bounds cross.
fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// Expand `content` by `padding` on every side and clamp it to the page.
///
/// Returns `None` if any input is non-finite or the geometry is unusable.
pub fn pad_and_clamp(
    content: &ContentBox,
    geometry: &PageGeometry,
    padding: f64,
) -> Option<ContentBox> {
    if !content.is_finite() || !padding.is_finite() || !geometry.is_valid() {
        return None;
    }

    let padded = ContentBox::new(
        clamp(content.min_x - padding, 0.0, geometry.width),
        clamp(content.min_y - padding, 0.0, geometry.height),
        clamp(content.max_x + padding, 0.0, geometry.width),
        clamp(content.max_y + padding, 0.0, geometry.height),
    );
    padded.is_finite().then_some(padded)
}

/// Pad, clamp and flip a view-space box into a crop region.
///
/// The result always satisfies `x ≥ 0`, `y ≥ 0`, `x + w ≤ W`, `y + h ≤ H`
/// and `w, h ≥ MIN_CROP_SIZE`. When the floor would push the region past
/// the right or bottom edge, its origin slides back inside the page.
///
/// Returns `None` instead of failing; the caller skips the page.
pub fn to_crop_region(
    content: &ContentBox,
    geometry: &PageGeometry,
    padding: f64,
) -> Option<CropRegion> {
    let padded = pad_and_clamp(content, geometry, padding)?;

    if geometry.width < MIN_CROP_SIZE || geometry.height < MIN_CROP_SIZE {
        return None;
    }

    let width = (padded.max_x - padded.min_x).max(MIN_CROP_SIZE);
    let height = (padded.max_y - padded.min_y).max(MIN_CROP_SIZE);

    let x = padded.min_x.min(geometry.width - width);
    let y = (geometry.height - (padded.min_y + height)).max(0.0);

    let region = CropRegion::new(x, y, width, height);
    if !region.is_finite() || width <= 0.0 || height <= 0.0 {
        return None;
    }
    Some(region)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn letter() -> PageGeometry {
        PageGeometry::new(612.0, 792.0)
    }

    fn assert_inside(region: &CropRegion, g: &PageGeometry) {
        assert!(region.x >= 0.0, "x < 0: {region}");
        assert!(region.y >= 0.0, "y < 0: {region}");
        assert!(region.x + region.width <= g.width + EPS, "right edge: {region}");
        assert!(region.y + region.height <= g.height + EPS, "top edge: {region}");
        assert!(region.width >= MIN_CROP_SIZE && region.height >= MIN_CROP_SIZE);
    }

    #[test]
    fn test_text_block_scenario() {
        let content = ContentBox::new(100.0, 100.0, 500.0, 700.0);
        let region = to_crop_region(&content, &letter(), 18.0).unwrap();
        assert_eq!(region, CropRegion::new(82.0, 74.0, 436.0, 636.0));
    }

    #[test]
    fn test_full_page_maps_to_full_page() {
        let g = letter();
        let region = to_crop_region(&ContentBox::full_page(&g), &g, 12.0).unwrap();
        assert_eq!(region, CropRegion::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_pad_and_clamp_limits() {
        let padded =
            pad_and_clamp(&ContentBox::new(5.0, 5.0, 610.0, 790.0), &letter(), 20.0).unwrap();
        assert_eq!(padded, ContentBox::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn test_single_point_gets_floor() {
        let content = ContentBox::new(300.0, 400.0, 300.0, 400.0);
        let region = to_crop_region(&content, &letter(), 0.0).unwrap();
        assert_eq!(region.width, MIN_CROP_SIZE);
        assert_eq!(region.height, MIN_CROP_SIZE);
        assert_eq!(region.x, 300.0);
        assert_eq!(region.y, 792.0 - 410.0);
    }

    #[test]
    fn test_floor_at_corner_stays_inside() {
        let g = letter();
        let bottom_right = ContentBox::new(612.0, 792.0, 612.0, 792.0);
        let region = to_crop_region(&bottom_right, &g, 0.0).unwrap();
        assert_inside(&region, &g);
        assert_eq!(region, CropRegion::new(602.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_non_finite_inputs_skip() {
        let g = letter();
        let content = ContentBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(to_crop_region(&ContentBox::new(f64::NAN, 0.0, 1.0, 1.0), &g, 0.0).is_none());
        assert!(to_crop_region(&content, &g, f64::INFINITY).is_none());
        assert!(to_crop_region(&content, &PageGeometry::new(f64::NAN, 792.0), 0.0).is_none());
    }

    #[test]
    fn test_page_smaller_than_floor_skips() {
        let tiny = PageGeometry::new(8.0, 8.0);
        assert!(to_crop_region(&ContentBox::full_page(&tiny), &tiny, 0.0).is_none());
    }

    #[test]
    fn test_padding_monotonic() {
        let g = letter();
        let content = ContentBox::new(200.0, 250.0, 260.0, 300.0);
        let mut last = to_crop_region(&content, &g, 0.0).unwrap();
        for step in 1..40 {
            let region = to_crop_region(&content, &g, step as f64 * 5.0).unwrap();
            assert!(region.width >= last.width);
            assert!(region.height >= last.height);
            assert_inside(&region, &g);
            last = region;
        }
    }

    #[test]
    fn test_clamping_invariant_sweep() {
        let g = PageGeometry::new(300.0, 200.0);
        let coords = [-50.0, 0.0, 0.5, 42.0, 150.0, 199.9, 200.0, 299.0, 300.0, 450.0];
        for &x0 in &coords {
            for &y0 in &coords {
                for &x1 in &coords {
                    for &y1 in &coords {
                        if x1 < x0 || y1 < y0 {
                            continue;
                        }
                        let content = ContentBox::new(x0, y0, x1, y1);
                        for pad in [0.0, 3.0, 18.0] {
                            let region = to_crop_region(&content, &g, pad).unwrap();
                            assert_inside(&region, &g);
                        }
                    }
                }
            }
        }
    }
}
