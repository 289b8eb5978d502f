#![allow(dead_code)]

use std::fs;
use std::path::Path;

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::bmp_bytes;

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

/// Writes `<dir>/<stem>.json` in the flat `detections` layout.
pub fn write_detections(dir: &Path, stem: &str, detections: &[(&str, &[f64])]) {
    let detections: Vec<serde_json::Value> = detections
        .iter()
        .map(|(label, polygon)| serde_json::json!({ "label": label, "polygon": polygon }))
        .collect();
    let doc = serde_json::json!({ "detections": detections });

    fs::create_dir_all(dir).expect("create analysis dir");
    fs::write(
        dir.join(format!("{stem}.json")),
        serde_json::to_string_pretty(&doc).expect("serialize analysis"),
    )
    .expect("write analysis file");
}

/// The worked receipt example: a SellerName field on a 200x200 image.
pub const SELLER_POLYGON: [f64; 8] = [10.0, 20.0, 110.0, 20.0, 110.0, 120.0, 10.0, 20.0];
