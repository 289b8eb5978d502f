//! Reader for saved document-analysis results.
//!
//! The analysis service itself is not called here; its responses are saved
//! as one JSON file per image (`<image stem>.json`) and read back through the
//! [`FieldSource`] trait. Two layouts are accepted:
//!
//! - the service's analyze-result dictionary, where fields live under
//!   `documents[*].fields` and nest through `valueArray` / `valueObject`,
//!   each carrying `boundingRegions[*].polygon`;
//! - a flat `detections: [{"label": .., "polygon": ..}]` list for sources
//!   that already resolved their labels.
//!
//! Polygons may be flat (`[x0, y0, x1, y1, ...]`) or paired
//! (`[{"x": .., "y": ..}, ...]` / `[[x, y], ...]`). Field order in the file is
//! preserved in the output.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::{Coord, ImageDimensions, Pixel, Polygon};
use crate::error::FieldboxError;

const ANALYSIS_EXTENSION: &str = "json";
const PIXEL_UNIT: &str = "pixel";

/// One detected field region.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDetection {
    /// Dotted path from the document root, e.g. `Items.Description`.
    pub path: String,
    /// Last path segment, e.g. `Description`.
    pub key: String,
    pub polygon: Polygon,
    pub page_number: u32,
}

impl FieldDetection {
    /// Names to try, most specific first, when resolving this field's label.
    pub fn label_candidates(&self) -> impl Iterator<Item = &str> {
        let key = (self.key != self.path).then_some(self.key.as_str());
        std::iter::once(self.path.as_str()).chain(key)
    }
}

/// Page geometry reported by the service.
#[derive(Clone, Debug, PartialEq)]
pub struct PageInfo {
    pub page_number: u32,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub unit: Option<String>,
}

/// Parsed analysis result for one image.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnalysisResult {
    pub pages: Vec<PageInfo>,
    pub detections: Vec<FieldDetection>,
}

impl AnalysisResult {
    /// Returns detections with polygons expressed in image pixels.
    ///
    /// Pages measured in pixels pass through unchanged. Pages measured in
    /// another unit (`inch` for scanned documents) are rescaled by
    /// `image size / page size` per axis.
    pub fn to_pixel_space(&self, dimensions: ImageDimensions) -> Vec<FieldDetection> {
        self.detections
            .iter()
            .map(|detection| {
                let Some((sx, sy)) = self.page_scale(detection.page_number, dimensions) else {
                    return detection.clone();
                };
                FieldDetection {
                    polygon: detection.polygon.scaled(sx, sy),
                    ..detection.clone()
                }
            })
            .collect()
    }

    fn page_scale(&self, page_number: u32, dimensions: ImageDimensions) -> Option<(f64, f64)> {
        let page = self.pages.iter().find(|p| p.page_number == page_number)?;
        let unit = page.unit.as_deref()?;
        if unit.eq_ignore_ascii_case(PIXEL_UNIT) {
            return None;
        }
        let (width, height) = (page.width?, page.height?);
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some((
            dimensions.width as f64 / width,
            dimensions.height as f64 / height,
        ))
    }
}

/// Supplies analysis results by image stem.
///
/// This is the seam where the remote service plugs in; the pipeline only
/// depends on this trait.
pub trait FieldSource {
    /// Returns `Ok(None)` when no result exists for the image.
    fn analysis_for(&self, image_stem: &str) -> Result<Option<AnalysisResult>, FieldboxError>;
}

/// A directory of saved `<stem>.json` analysis results.
#[derive(Clone, Debug)]
pub struct SavedAnalysisDir {
    dir: PathBuf,
}

impl SavedAnalysisDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, image_stem: &str) -> PathBuf {
        self.dir.join(format!("{image_stem}.{ANALYSIS_EXTENSION}"))
    }
}

impl FieldSource for SavedAnalysisDir {
    fn analysis_for(&self, image_stem: &str) -> Result<Option<AnalysisResult>, FieldboxError> {
        let path = self.path_for(image_stem);
        if !path.is_file() {
            return Ok(None);
        }
        read_analysis_json(&path).map(Some)
    }
}

/// Reads one saved analysis result.
pub fn read_analysis_json(path: &Path) -> Result<AnalysisResult, FieldboxError> {
    let data = fs::read_to_string(path).map_err(FieldboxError::Io)?;
    parse_analysis(&data, path)
}

/// Parses an analysis result from a string. Useful for testing without file I/O.
pub fn from_analysis_str(json: &str) -> Result<AnalysisResult, FieldboxError> {
    parse_analysis(json, Path::new("<memory>"))
}

#[derive(Debug, Deserialize)]
struct RawResult {
    #[serde(default)]
    pages: Vec<RawPage>,
    #[serde(default)]
    documents: Vec<RawDocument>,
    #[serde(default)]
    detections: Vec<RawDetection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    #[serde(default = "first_page")]
    page_number: u32,
    width: Option<f64>,
    height: Option<f64>,
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(default)]
    bounding_regions: Vec<RawRegion>,
    #[serde(default)]
    value_array: Vec<Value>,
    #[serde(default)]
    value_object: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRegion {
    #[serde(default = "first_page")]
    page_number: u32,
    #[serde(default)]
    polygon: RawPolygon,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetection {
    label: String,
    #[serde(default)]
    polygon: RawPolygon,
    #[serde(default = "first_page")]
    page_number: u32,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPolygon {
    Flat(Vec<f64>),
    Points(Vec<Coord<Pixel>>),
}

impl Default for RawPolygon {
    fn default() -> Self {
        RawPolygon::Flat(Vec::new())
    }
}

fn first_page() -> u32 {
    1
}

fn parse_analysis(json: &str, path: &Path) -> Result<AnalysisResult, FieldboxError> {
    let parse_err = |source| FieldboxError::AnalysisJsonParse {
        path: path.to_path_buf(),
        source,
    };
    let raw: RawResult = serde_json::from_str(json).map_err(parse_err)?;

    let pages = raw
        .pages
        .into_iter()
        .map(|p| PageInfo {
            page_number: p.page_number,
            width: p.width,
            height: p.height,
            unit: p.unit,
        })
        .collect();

    let mut detections = Vec::new();
    for document in raw.documents {
        for (key, value) in document.fields {
            walk_field(&key, &key, value, path, &mut detections)?;
        }
    }

    for detection in raw.detections {
        let polygon = to_polygon(detection.polygon, &detection.label, path)?;
        detections.push(FieldDetection {
            path: detection.label.clone(),
            key: detection.label,
            polygon,
            page_number: detection.page_number,
        });
    }

    debug!(
        "{}: {} field region(s) found",
        path.display(),
        detections.len()
    );

    Ok(AnalysisResult { pages, detections })
}

fn walk_field(
    field_path: &str,
    key: &str,
    value: Value,
    source_path: &Path,
    out: &mut Vec<FieldDetection>,
) -> Result<(), FieldboxError> {
    // Non-object values (nulls, bare strings) carry no geometry.
    if !value.is_object() {
        return Ok(());
    }
    let field: RawField =
        serde_json::from_value(value).map_err(|source| FieldboxError::AnalysisJsonParse {
            path: source_path.to_path_buf(),
            source,
        })?;

    for region in field.bounding_regions {
        out.push(FieldDetection {
            path: field_path.to_string(),
            key: key.to_string(),
            polygon: to_polygon(region.polygon, field_path, source_path)?,
            page_number: region.page_number,
        });
    }

    // Array elements are anonymous and keep their parent's name.
    for element in field.value_array {
        walk_field(field_path, key, element, source_path, out)?;
    }

    for (child_key, child) in field.value_object {
        let child_path = format!("{field_path}.{child_key}");
        walk_field(&child_path, &child_key, child, source_path, out)?;
    }

    Ok(())
}

fn to_polygon(raw: RawPolygon, field: &str, path: &Path) -> Result<Polygon, FieldboxError> {
    match raw {
        RawPolygon::Points(points) => Ok(Polygon::new(points)),
        RawPolygon::Flat(values) => {
            Polygon::from_flat(&values).ok_or_else(|| FieldboxError::AnalysisJsonInvalid {
                path: path.to_path_buf(),
                message: format!(
                    "field '{}' has a flat polygon with an odd number of values ({})",
                    field,
                    values.len()
                ),
            })
        }
    }
}
