//! Conversion between pixel-space regions and normalized center-form boxes.
//!
//! Both directions are pure arithmetic. [`normalize`] feeds the extraction
//! side (analysis polygons → YOLO rows) and [`denormalize`] feeds the
//! reconstruction side (YOLO rows → LabelMe rectangles).

use crate::error::FieldboxError;
use crate::ir::{BBoxXYXY, NormalizedBox, Pixel, Polygon};

/// Reduces a polygon to its axis-aligned bounding box and normalizes it
/// against the image size.
///
/// **This is lossy.** Any outline (rotated, skewed, concave) collapses to the
/// rectangle spanned by its minimum and maximum x and y; the YOLO detection
/// format only represents axis-aligned boxes, so polygon shape does not
/// survive a round trip. Decoding the result with [`denormalize`] yields the
/// bounding rectangle, never the original outline.
///
/// ```text
/// cx = (min_x + max_x) / 2 / image_width      w = (max_x - min_x) / image_width
/// cy = (min_y + max_y) / 2 / image_height     h = (max_y - min_y) / image_height
/// ```
///
/// All four components are in `[0, 1]` whenever the polygon lies inside
/// `[0, image_width] × [0, image_height]`. Points outside the image are not
/// clamped.
///
/// # Errors
///
/// `InvalidGeometry` if the polygon is empty, a coordinate is not finite, or
/// either image dimension is zero.
pub fn normalize(
    polygon: &Polygon,
    image_width: u32,
    image_height: u32,
) -> Result<NormalizedBox, FieldboxError> {
    check_dimensions(image_width, image_height)?;
    if !polygon.is_finite() {
        return Err(FieldboxError::invalid_geometry(
            "polygon contains a non-finite coordinate",
        ));
    }
    let bounds = polygon
        .bounds()
        .ok_or_else(|| FieldboxError::invalid_geometry("polygon has no points"))?;

    Ok(normalize_bounds(&bounds, image_width, image_height))
}

/// Normalizes an axis-aligned pixel rectangle. Callers must have checked the
/// dimensions.
fn normalize_bounds(
    bounds: &BBoxXYXY<Pixel>,
    image_width: u32,
    image_height: u32,
) -> NormalizedBox {
    let (w, h) = (image_width as f64, image_height as f64);
    NormalizedBox::new(
        (bounds.xmin() + bounds.xmax()) / 2.0 / w,
        (bounds.ymin() + bounds.ymax()) / 2.0 / h,
        bounds.width() / w,
        bounds.height() / h,
    )
}

/// Converts a normalized box back to pixel corners.
///
/// ```text
/// x_min = (cx - w/2) · image_width     x_max = (cx + w/2) · image_width
/// y_min = (cy - h/2) · image_height    y_max = (cy + h/2) · image_height
/// ```
///
/// For a box produced by [`normalize`], this reproduces the polygon's
/// bounding rectangle up to floating-point rounding.
///
/// # Errors
///
/// `InvalidGeometry` if `w` or `h` is negative, any component is not finite,
/// or either image dimension is zero.
pub fn denormalize(
    bbox: &NormalizedBox,
    image_width: u32,
    image_height: u32,
) -> Result<BBoxXYXY<Pixel>, FieldboxError> {
    check_dimensions(image_width, image_height)?;
    if !bbox.is_finite() {
        return Err(FieldboxError::invalid_geometry(format!(
            "box {:?} contains a non-finite component",
            bbox
        )));
    }
    if bbox.w < 0.0 || bbox.h < 0.0 {
        return Err(FieldboxError::invalid_geometry(format!(
            "box has negative size (w={}, h={})",
            bbox.w, bbox.h
        )));
    }

    Ok(bbox
        .to_xyxy()
        .to_pixel(image_width as f64, image_height as f64))
}

fn check_dimensions(image_width: u32, image_height: u32) -> Result<(), FieldboxError> {
    if image_width == 0 || image_height == 0 {
        return Err(FieldboxError::invalid_geometry(format!(
            "image dimensions must be positive, got {}x{}",
            image_width, image_height
        )));
    }
    Ok(())
}
