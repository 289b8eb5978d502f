//! Region outlines as returned by the document-analysis service.

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::Pixel;

/// An ordered outline of a detected region in pixel space.
///
/// Not guaranteed convex or axis-aligned. The pipeline only ever keeps its
/// axis-aligned bounds; see [`crate::codec::normalize`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Polygon {
    points: Vec<Coord<Pixel>>,
}

impl Polygon {
    pub fn new(points: Vec<Coord<Pixel>>) -> Self {
        Self { points }
    }

    /// Builds a polygon from a flat `[x0, y0, x1, y1, ...]` list.
    ///
    /// Returns `None` when the list has an odd number of values.
    pub fn from_flat(values: &[f64]) -> Option<Self> {
        if values.len() % 2 != 0 {
            return None;
        }
        let points = values
            .chunks_exact(2)
            .map(|pair| Coord::new(pair[0], pair[1]))
            .collect();
        Some(Self { points })
    }

    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self {
            points: pairs.iter().map(|&(x, y)| Coord::new(x, y)).collect(),
        }
    }

    pub fn points(&self) -> &[Coord<Pixel>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.points.iter().all(Coord::is_finite)
    }

    /// Axis-aligned bounds, taking min/max over x and y independently.
    pub fn bounds(&self) -> Option<BBoxXYXY<Pixel>> {
        if self.points.is_empty() {
            return None;
        }

        let (min_x, max_x, min_y, max_y) = self.points.iter().fold(
            (
                f64::INFINITY,
                f64::NEG_INFINITY,
                f64::INFINITY,
                f64::NEG_INFINITY,
            ),
            |(min_x, max_x, min_y, max_y), p| {
                (min_x.min(p.x), max_x.max(p.x), min_y.min(p.y), max_y.max(p.y))
            },
        );

        Some(BBoxXYXY::from_xyxy(min_x, min_y, max_x, max_y))
    }

    /// Returns a copy with every point scaled per axis.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Coord::new(p.x * sx, p.y * sy))
                .collect(),
        }
    }
}
