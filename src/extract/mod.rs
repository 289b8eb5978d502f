//! Analysis result → class-indexed normalized boxes.
//!
//! Extraction is a pure function of the detections, the image size and the
//! label registry. Persisting the result is left to the caller
//! ([`crate::ir::io_yolo::write_label_file`]).

use log::debug;

use crate::codec;
use crate::error::FieldboxError;
use crate::ir::io_analysis_json::FieldDetection;
use crate::ir::{AliasMap, AnnotatedImage, BoxAnnotation, ImageDimensions, LabelRegistry};
use crate::report::{IssueCode, UnitIssue};

/// Boxes for one image plus the fields that were dropped on the way.
#[derive(Clone, Debug, PartialEq)]
pub struct Extraction {
    pub image: AnnotatedImage,
    pub issues: Vec<UnitIssue>,
}

/// Converts one image's detections into class-indexed boxes.
///
/// Detections are processed in order and the output keeps that order.
/// A detection is dropped, with an issue recorded, when its polygon is empty
/// (`EmptyPolygon`, info) or none of its label candidates resolve to a
/// registry entry (`UnknownLabel`, warning). Unknown labels are never mapped
/// to a sentinel index.
///
/// # Errors
///
/// `InvalidGeometry` if either image dimension is zero or a polygon holds a
/// non-finite coordinate. Either fails the whole image.
pub fn extract_annotations(
    image_name: &str,
    dimensions: ImageDimensions,
    detections: &[FieldDetection],
    registry: &LabelRegistry,
    aliases: &AliasMap,
) -> Result<Extraction, FieldboxError> {
    if dimensions.is_degenerate() {
        return Err(FieldboxError::invalid_geometry(format!(
            "image '{}' has dimensions {}x{}",
            image_name, dimensions.width, dimensions.height
        )));
    }

    let mut image = AnnotatedImage::new(image_name, dimensions);
    let mut issues = Vec::new();

    for detection in detections {
        if detection.polygon.is_empty() {
            issues.push(UnitIssue::info(
                IssueCode::EmptyPolygon,
                format!("field '{}' has no polygon points", detection.path),
            ));
            continue;
        }

        let Some(class_index) = resolve_class_index(detection, registry, aliases) else {
            debug!(
                "{}: field '{}' is not in the label registry; skipping",
                image_name, detection.path
            );
            issues.push(UnitIssue::warning(
                IssueCode::UnknownLabel,
                format!("field '{}' is not a known label", detection.path),
            ));
            continue;
        };

        let bbox = codec::normalize(&detection.polygon, dimensions.width, dimensions.height)?;
        image.annotations.push(BoxAnnotation { class_index, bbox });
    }

    Ok(Extraction { image, issues })
}

/// Resolves a detection to a class index.
///
/// Each label candidate (dotted path, then bare key) is passed through the
/// alias map and looked up in the registry; the first hit wins.
pub fn resolve_class_index(
    detection: &FieldDetection,
    registry: &LabelRegistry,
    aliases: &AliasMap,
) -> Option<usize> {
    detection
        .label_candidates()
        .find_map(|name| registry.index_of(aliases.resolve(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{NormalizedBox, Polygon};

    fn detection(path: &str, pairs: &[(f64, f64)]) -> FieldDetection {
        let key = path.rsplit('.').next().unwrap_or(path).to_string();
        FieldDetection {
            path: path.to_string(),
            key,
            polygon: Polygon::from_pairs(pairs),
            page_number: 1,
        }
    }

    fn square(x: f64, y: f64, side: f64) -> Vec<(f64, f64)> {
        vec![(x, y), (x + side, y), (x + side, y + side), (x, y + side)]
    }

    #[test]
    fn resolves_labels_by_registry_position() {
        let registry = LabelRegistry::new(["A", "B", "C"]).unwrap();
        let detections = vec![detection("B", &square(0.0, 0.0, 10.0))];

        let out = extract_annotations(
            "0.jpg",
            ImageDimensions::new(100, 100),
            &detections,
            &registry,
            &AliasMap::new(),
        )
        .unwrap();

        assert_eq!(out.image.annotations.len(), 1);
        assert_eq!(out.image.annotations[0].class_index, 1);
        assert!(out.issues.is_empty());
    }

    #[test]
    fn reference_example_on_200_square_image() {
        let registry = LabelRegistry::receipt_default();
        let detections = vec![detection(
            "SellerName",
            &[(10.0, 20.0), (110.0, 20.0), (110.0, 120.0), (10.0, 20.0)],
        )];

        let out = extract_annotations(
            "0.jpg",
            ImageDimensions::new(200, 200),
            &detections,
            &registry,
            &AliasMap::new(),
        )
        .unwrap();

        assert_eq!(
            out.image.annotations,
            vec![BoxAnnotation {
                class_index: 0,
                bbox: NormalizedBox::new(0.3, 0.35, 0.5, 0.5),
            }]
        );
    }

    #[test]
    fn unknown_labels_and_empty_polygons_are_skipped_in_order() {
        let registry = LabelRegistry::new(["A", "B"]).unwrap();
        let detections = vec![
            detection("B", &square(0.0, 0.0, 10.0)),
            detection("Tip", &square(10.0, 10.0, 10.0)),
            detection("A", &[]),
            detection("A", &square(50.0, 50.0, 20.0)),
        ];

        let out = extract_annotations(
            "0.jpg",
            ImageDimensions::new(100, 100),
            &detections,
            &registry,
            &AliasMap::new(),
        )
        .unwrap();

        let classes: Vec<usize> = out.image.annotations.iter().map(|a| a.class_index).collect();
        assert_eq!(classes, vec![1, 0]);

        let codes: Vec<IssueCode> = out.issues.iter().map(|i| i.code).collect();
        assert_eq!(codes, vec![IssueCode::UnknownLabel, IssueCode::EmptyPolygon]);
    }

    #[test]
    fn aliases_and_nested_keys_resolve() {
        let registry = LabelRegistry::receipt_default();
        let aliases = AliasMap::from_assignments(&[
            "MerchantName=SellerName",
            "Description=ProductDescription",
        ])
        .unwrap();
        let detections = vec![
            detection("MerchantName", &square(0.0, 0.0, 5.0)),
            detection("Items.Description", &square(0.0, 10.0, 5.0)),
            detection("Items.Quantity", &square(0.0, 20.0, 5.0)),
            detection("Items", &square(0.0, 10.0, 50.0)),
        ];

        let out = extract_annotations(
            "0.jpg",
            ImageDimensions::new(100, 100),
            &detections,
            &registry,
            &aliases,
        )
        .unwrap();

        let classes: Vec<usize> = out.image.annotations.iter().map(|a| a.class_index).collect();
        assert_eq!(classes, vec![0, 3, 4]);
        assert_eq!(out.issues.len(), 1);
        assert_eq!(out.issues[0].code, IssueCode::UnknownLabel);
    }

    #[test]
    fn dotted_path_alias_wins_over_key() {
        let registry = LabelRegistry::new(["Price", "TotalDue"]).unwrap();
        let aliases = AliasMap::from_assignments(&["Items.Price=TotalDue"]).unwrap();

        let out = extract_annotations(
            "0.jpg",
            ImageDimensions::new(10, 10),
            &[detection("Items.Price", &square(1.0, 1.0, 1.0))],
            &registry,
            &aliases,
        )
        .unwrap();
        assert_eq!(out.image.annotations[0].class_index, 1);
    }

    #[test]
    fn zero_dimension_fails_the_image() {
        let registry = LabelRegistry::new(["A"]).unwrap();
        let err = extract_annotations(
            "0.jpg",
            ImageDimensions::new(0, 100),
            &[],
            &registry,
            &AliasMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, FieldboxError::InvalidGeometry { .. }));
    }
}
