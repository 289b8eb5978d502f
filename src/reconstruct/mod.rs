//! YOLO label lines → LabelMe rectangle records.
//!
//! The inverse of [`crate::extract`]: each well-formed label line is
//! denormalized on the image's pixel size and becomes one rectangle shape.
//! Nothing is read from disk here; callers pass the image bytes and the
//! label lines.

use std::collections::BTreeMap;

use base64::{prelude::BASE64_STANDARD, Engine};
use log::warn;

use crate::codec;
use crate::error::FieldboxError;
use crate::ir::io_yolo::parse_label_line;
use crate::ir::{
    ImageDimensions, LabelRegistry, RectangleRecord, RectangleShape, LABELME_VERSION,
};
use crate::report::{IssueCode, UnitIssue};

/// The image a record is built for.
#[derive(Clone, Copy, Debug)]
pub struct ImageSource<'a> {
    /// Stored as `imagePath`; usually the bare file name.
    pub path: &'a str,
    pub bytes: &'a [u8],
    pub dimensions: ImageDimensions,
}

/// A built record plus the lines that were skipped or relabeled.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconstruction {
    pub record: RectangleRecord,
    pub issues: Vec<UnitIssue>,
}

/// Builds a LabelMe record from one label file's lines.
///
/// `registry` must be the registry the label file was written with;
/// otherwise indices silently map to the wrong labels.
///
/// # Errors
///
/// `InvalidGeometry` if the image has a zero dimension or any line has a
/// negative width or height. Either fails the whole file.
pub fn reconstruct_record<S: AsRef<str>>(
    image: &ImageSource<'_>,
    lines: &[S],
    registry: &LabelRegistry,
) -> Result<Reconstruction, FieldboxError> {
    let (shapes, issues) = shapes_from_lines(image.path, lines, image.dimensions, registry)?;

    let record = RectangleRecord {
        version: LABELME_VERSION.to_string(),
        flags: BTreeMap::new(),
        shapes,
        image_path: image.path.to_string(),
        image_data: Some(BASE64_STANDARD.encode(image.bytes)),
        image_height: image.dimensions.height,
        image_width: image.dimensions.width,
    };

    Ok(Reconstruction { record, issues })
}

/// Converts label lines to rectangle shapes, preserving line order.
///
/// Blank lines are ignored. Lines with the wrong token count or unparsable
/// numbers are skipped with a `MalformedAnnotationLine` warning. A class
/// index outside the registry is emitted with its decimal form as the label
/// and an `UnknownClassIndex` warning; that fallback exists for debugging
/// mismatched registries and should not be relied on downstream.
pub fn shapes_from_lines<S: AsRef<str>>(
    unit: &str,
    lines: &[S],
    dimensions: ImageDimensions,
    registry: &LabelRegistry,
) -> Result<(Vec<RectangleShape>, Vec<UnitIssue>), FieldboxError> {
    if dimensions.is_degenerate() {
        return Err(FieldboxError::invalid_geometry(format!(
            "image '{}' has dimensions {}x{}",
            unit, dimensions.width, dimensions.height
        )));
    }

    let mut shapes = Vec::with_capacity(lines.len());
    let mut issues = Vec::new();

    for (line_idx, line) in lines.iter().enumerate() {
        let line_num = line_idx + 1;
        let row = match parse_label_line(line.as_ref()) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(err) => {
                warn!("{unit}: skipping line {line_num}: {err}");
                issues.push(
                    UnitIssue::warning(IssueCode::MalformedAnnotationLine, err.to_string())
                        .at_line(line_num),
                );
                continue;
            }
        };

        let bbox = codec::denormalize(&row.bbox, dimensions.width, dimensions.height).map_err(
            |err| match err {
                FieldboxError::InvalidGeometry { message } => FieldboxError::InvalidGeometry {
                    message: format!("{unit} line {line_num}: {message}"),
                },
                other => other,
            },
        )?;

        let label = match registry.label_for(row.class_index) {
            Some(label) => label.to_string(),
            None => {
                warn!(
                    "{unit}: line {line_num}: class index {} is outside the {}-label registry",
                    row.class_index,
                    registry.len()
                );
                issues.push(
                    UnitIssue::warning(
                        IssueCode::UnknownClassIndex,
                        format!(
                            "class index {} is outside the {}-label registry; kept as the label",
                            row.class_index,
                            registry.len()
                        ),
                    )
                    .at_line(line_num),
                );
                row.class_index.to_string()
            }
        };

        shapes.push(RectangleShape::rectangle(label, bbox.corners()));
    }

    Ok((shapes, issues))
}
