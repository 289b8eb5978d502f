#![allow(dead_code)]

use fieldbox::ir::{BBoxXYXY, Coord, NormalizedBox, Pixel, Polygon};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Relative tolerance for a normalize/denormalize round trip.
pub const EPS_ROUNDTRIP: f64 = 1e-4;

/// Label files keep 6 decimal places.
pub const EPS_LABEL_LINE: f64 = 1e-6;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// `|a - b| <= eps * max(1, |a|, |b|)`.
pub fn approx_rel(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps * 1f64.max(a.abs()).max(b.abs())
}

pub fn arb_image_dims() -> impl Strategy<Value = (u32, u32)> {
    (2u32..=4096, 2u32..=4096)
}

/// A non-degenerate pixel rectangle inside `width x height`.
pub fn arb_bbox_within(width: u32, height: u32) -> BoxedStrategy<BBoxXYXY<Pixel>> {
    (any::<u32>(), any::<u32>(), any::<u32>(), any::<u32>())
        .prop_map(move |(sx, sy, sw, sh)| bbox_from_seed(width, height, sx, sy, sw, sh))
        .boxed()
}

/// An image size plus a rectangle inside it.
pub fn arb_image_with_bbox() -> BoxedStrategy<((u32, u32), BBoxXYXY<Pixel>)> {
    arb_image_dims()
        .prop_flat_map(|(w, h)| (Just((w, h)), arb_bbox_within(w, h)))
        .boxed()
}

/// An image size plus a polygon of 1..=12 points inside it.
pub fn arb_image_with_polygon() -> BoxedStrategy<((u32, u32), Polygon)> {
    arb_image_dims()
        .prop_flat_map(|(w, h)| {
            let point = (0.0..=w as f64, 0.0..=h as f64);
            (
                Just((w, h)),
                proptest::collection::vec(point, 1..=12).prop_map(|pairs| {
                    Polygon::new(pairs.into_iter().map(|(x, y)| Coord::new(x, y)).collect())
                }),
            )
        })
        .boxed()
}

/// A box fully inside the unit square, as `normalize` produces for in-image
/// polygons.
pub fn arb_unit_box() -> BoxedStrategy<NormalizedBox> {
    (0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64, 0.0..=1.0f64)
        .prop_map(|(x0, y0, x1, y1)| {
            let (xmin, xmax) = (x0.min(x1), x0.max(x1));
            let (ymin, ymax) = (y0.min(y1), y0.max(y1));
            NormalizedBox::new(
                (xmin + xmax) / 2.0,
                (ymin + ymax) / 2.0,
                xmax - xmin,
                ymax - ymin,
            )
        })
        .boxed()
}

/// The rectangle's corners as a 4-point polygon, clockwise from top-left.
pub fn rectangle_polygon(bbox: &BBoxXYXY<Pixel>) -> Polygon {
    Polygon::from_pairs(&[
        (bbox.xmin(), bbox.ymin()),
        (bbox.xmax(), bbox.ymin()),
        (bbox.xmax(), bbox.ymax()),
        (bbox.xmin(), bbox.ymax()),
    ])
}

fn bbox_from_seed(width: u32, height: u32, sx: u32, sy: u32, sw: u32, sh: u32) -> BBoxXYXY<Pixel> {
    let xmin = sx % (width - 1);
    let ymin = sy % (height - 1);
    let xmax = xmin + 1 + (sw % (width - xmin));
    let ymax = ymin + 1 + (sh % (height - ymin));

    BBoxXYXY::from_xyxy(
        xmin as f64,
        ymin as f64,
        xmax.min(width) as f64,
        ymax.min(height) as f64,
    )
}
