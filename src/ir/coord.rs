//! Typed 2D points.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// A 2D point tagged with its coordinate space.
///
/// `TSpace` is [`Pixel`](super::Pixel) or [`Normalized`](super::Normalized).
#[derive(Clone, Copy, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> Coord<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            _space: PhantomData,
        }
    }

    /// Returns true if both components are finite (not NaN or infinite).
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns the point as an `[x, y]` pair, the layout LabelMe uses.
    #[inline]
    pub fn to_pair(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl<TSpace> std::fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Coord").field(&self.x).field(&self.y).finish()
    }
}

impl<TSpace> Default for Coord<TSpace> {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

// Written by hand so TSpace needs no serde bounds.
impl<TSpace> Serialize for Coord<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_pair().serialize(serializer)
    }
}

/// Accepts either `{"x": .., "y": ..}` or `[x, y]`.
impl<'de, TSpace> Deserialize<'de> for Coord<TSpace> {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum CoordData {
            Object { x: f64, y: f64 },
            Pair([f64; 2]),
        }
        let data = CoordData::deserialize(deserializer)?;
        Ok(match data {
            CoordData::Object { x, y } => Coord::new(x, y),
            CoordData::Pair([x, y]) => Coord::new(x, y),
        })
    }
}
