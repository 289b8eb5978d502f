//! Core types shared by every pipeline stage.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: marker types keep pixel and normalized coordinates
//!    apart at compile time.
//!
//! 2. **Explicit Label Mapping**: the label ↔ class index mapping lives in a
//!    [`LabelRegistry`] that is passed to both directions of the conversion.
//!
//! 3. **Permissive Construction**: boxes may hold "invalid" values (negative
//!    sizes, out-of-range centers); the codec rejects them where it matters.
//!
//! # Example
//!
//! ```
//! use fieldbox::ir::{LabelRegistry, NormalizedBox, Polygon};
//!
//! let registry = LabelRegistry::new(["SellerName", "TotalDue"]).unwrap();
//! let polygon =
//!     Polygon::from_flat(&[10.0, 20.0, 110.0, 20.0, 110.0, 120.0, 10.0, 120.0]).unwrap();
//! let bbox = fieldbox::codec::normalize(&polygon, 200, 200).unwrap();
//!
//! assert_eq!(registry.index_of("SellerName"), Some(0));
//! assert_eq!(bbox, NormalizedBox::new(0.3, 0.35, 0.5, 0.5));
//! ```

mod bbox;
mod coord;
pub mod io_analysis_json;
pub mod io_labelme_json;
pub mod io_yolo;
mod labels;
mod model;
mod polygon;
mod space;

pub use bbox::{BBoxXYXY, NormalizedBox};
pub use coord::Coord;
pub use labels::{AliasMap, LabelRegistry, DEFAULT_RECEIPT_LABELS};
pub use model::{
    AnnotatedImage, BoxAnnotation, ImageDimensions, RectangleRecord, RectangleShape,
    LABELME_VERSION, RECTANGLE_SHAPE_TYPE,
};
pub use polygon::Polygon;
pub use space::{Normalized, Pixel};
