//! Per-image annotation records exchanged between the pipeline stages.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::bbox::NormalizedBox;

/// Version tag written into every LabelMe record.
pub const LABELME_VERSION: &str = "4.5.6";

/// The only shape type this crate emits.
pub const RECTANGLE_SHAPE_TYPE: &str = "rectangle";

/// Pixel dimensions of an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

impl ImageDimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if either side is zero.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One class-tagged box in an [`AnnotatedImage`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxAnnotation {
    pub class_index: usize,
    pub bbox: NormalizedBox,
}

/// All boxes extracted for one image, in detection order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedImage {
    /// Image identifier, usually the file name.
    pub image: String,
    pub dimensions: ImageDimensions,
    pub annotations: Vec<BoxAnnotation>,
}

impl AnnotatedImage {
    pub fn new(image: impl Into<String>, dimensions: ImageDimensions) -> Self {
        Self {
            image: image.into(),
            dimensions,
            annotations: Vec::new(),
        }
    }
}

/// A LabelMe annotation document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectangleRecord {
    pub version: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    pub shapes: Vec<RectangleShape>,
    #[serde(rename = "imagePath")]
    pub image_path: String,
    /// Base64 of the raw image file bytes.
    #[serde(rename = "imageData")]
    pub image_data: Option<String>,
    #[serde(rename = "imageHeight")]
    pub image_height: u32,
    #[serde(rename = "imageWidth")]
    pub image_width: u32,
}

/// One LabelMe shape, always a two-point rectangle here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RectangleShape {
    pub label: String,
    /// `[[x_min, y_min], [x_max, y_max]]` in pixels.
    pub points: Vec<[f64; 2]>,
    pub group_id: Option<u32>,
    pub shape_type: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
}

impl RectangleShape {
    pub fn rectangle(label: impl Into<String>, corners: [[f64; 2]; 2]) -> Self {
        Self {
            label: label.into(),
            points: corners.to_vec(),
            group_id: None,
            shape_type: RECTANGLE_SHAPE_TYPE.to_string(),
            flags: BTreeMap::new(),
        }
    }
}
