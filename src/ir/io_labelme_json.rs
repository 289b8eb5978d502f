//! LabelMe JSON reading and writing.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use super::RectangleRecord;
use crate::error::FieldboxError;

/// Writes a record as pretty-printed JSON.
pub fn write_labelme_json(path: &Path, record: &RectangleRecord) -> Result<(), FieldboxError> {
    let file = File::create(path).map_err(FieldboxError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, record).map_err(|source| {
        FieldboxError::LabelmeJsonWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.flush().map_err(FieldboxError::Io)
}

pub fn read_labelme_json(path: &Path) -> Result<RectangleRecord, FieldboxError> {
    let file = File::open(path).map_err(FieldboxError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| FieldboxError::LabelmeJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{RectangleShape, LABELME_VERSION};
    use std::collections::BTreeMap;

    #[test]
    fn file_round_trip() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("0.json");
        let record = RectangleRecord {
            version: LABELME_VERSION.to_string(),
            flags: BTreeMap::new(),
            shapes: vec![RectangleShape::rectangle("Price", [[1.0, 2.0], [3.0, 4.0]])],
            image_path: "0.jpg".to_string(),
            image_data: None,
            image_height: 8,
            image_width: 8,
        };

        write_labelme_json(&path, &record).expect("write labelme");
        let restored = read_labelme_json(&path).expect("read labelme");
        assert_eq!(restored, record);

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"imageData\": null"));
    }
}
