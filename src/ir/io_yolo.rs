//! YOLO label files and class registry files.
//!
//! A label file holds one box per line:
//!
//! ```text
//! <class_index> <cx> <cy> <w> <h>
//! ```
//!
//! with normalized floats written at 6 decimal places. The class registry is
//! stored either as `data.yaml` (`names:` as a sequence or an index map,
//! plus an optional `fingerprint:`) or as `classes.txt` (one label per line).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use walkdir::WalkDir;

use super::{AnnotatedImage, BoxAnnotation, LabelRegistry, NormalizedBox};
use crate::error::FieldboxError;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tiff", "tif"];
pub const LABEL_EXTENSION: &str = "txt";
pub const DATA_YAML: &str = "data.yaml";

/// How far above a labels directory to look for a recorded `data.yaml`
/// (`labels/train` → dataset root is two levels).
const REGISTRY_SEARCH_DEPTH: usize = 2;

/// Why a label line was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LabelLineError {
    #[error("expected 5 tokens, found {0}")]
    TokenCount(usize),

    #[error("invalid {field} '{raw}'; expected {expected}")]
    InvalidNumber {
        field: &'static str,
        raw: String,
        expected: &'static str,
    },
}

/// Renders one label file. Empty when the image has no boxes.
pub fn render_label_lines(image: &AnnotatedImage) -> String {
    let mut out = String::new();
    for ann in &image.annotations {
        // Writing to a String cannot fail.
        let _ = writeln!(
            out,
            "{} {:.6} {:.6} {:.6} {:.6}",
            ann.class_index, ann.bbox.cx, ann.bbox.cy, ann.bbox.w, ann.bbox.h
        );
    }
    out
}

pub fn write_label_file(path: &Path, image: &AnnotatedImage) -> Result<(), FieldboxError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(FieldboxError::Io)?;
    }
    fs::write(path, render_label_lines(image)).map_err(FieldboxError::Io)
}

pub fn read_label_lines(path: &Path) -> Result<Vec<String>, FieldboxError> {
    let content = fs::read_to_string(path).map_err(FieldboxError::Io)?;
    Ok(content.lines().map(str::to_string).collect())
}

/// Parses one label line.
///
/// Returns `Ok(None)` for blank lines. The class index may be written as an
/// integer or as an integral float (`"3.0"`).
pub fn parse_label_line(line: &str) -> Result<Option<BoxAnnotation>, LabelLineError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let token_count = trimmed.split_whitespace().count();
    if token_count != 5 {
        return Err(LabelLineError::TokenCount(token_count));
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let class_index = parse_class_index(tokens[0])?;
    let cx = parse_f64_token(tokens[1], "x_center")?;
    let cy = parse_f64_token(tokens[2], "y_center")?;
    let w = parse_f64_token(tokens[3], "width")?;
    let h = parse_f64_token(tokens[4], "height")?;

    Ok(Some(BoxAnnotation {
        class_index,
        bbox: NormalizedBox::new(cx, cy, w, h),
    }))
}

/// Fuzz-only entrypoint for single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), LabelLineError> {
    let _ = parse_label_line(input)?;
    Ok(())
}

fn parse_class_index(raw: &str) -> Result<usize, LabelLineError> {
    if let Ok(index) = raw.parse::<usize>() {
        return Ok(index);
    }

    let invalid = || LabelLineError::InvalidNumber {
        field: "class_index",
        raw: raw.to_string(),
        expected: "non-negative integer",
    };
    let value = raw.parse::<f64>().map_err(|_| invalid())?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
        Ok(value as usize)
    } else {
        Err(invalid())
    }
}

fn parse_f64_token(raw: &str, field: &'static str) -> Result<f64, LabelLineError> {
    let invalid = || LabelLineError::InvalidNumber {
        field,
        raw: raw.to_string(),
        expected: "finite floating-point number",
    };
    // `f64::from_str` accepts "nan", "inf" and overflowing literals.
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(invalid()),
    }
}

#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
    #[serde(default)]
    fingerprint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

/// Reads a registry from `data.yaml`/`*.yml` or a `classes.txt`-style file.
///
/// A recorded `fingerprint:` is checked against the labels read.
pub fn read_registry(path: &Path) -> Result<LabelRegistry, FieldboxError> {
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        read_data_yaml(path)
    } else {
        read_classes_txt(path)
    }
}

fn read_data_yaml(path: &Path) -> Result<LabelRegistry, FieldboxError> {
    let data = fs::read_to_string(path).map_err(FieldboxError::Io)?;
    let parsed: DataYaml =
        serde_yaml::from_str(&data).map_err(|source| FieldboxError::ClassYamlParse {
            path: path.to_path_buf(),
            source,
        })?;

    let names = match parsed.names {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => {
            let len = mapping
                .keys()
                .next_back()
                .map_or(0, |max| max.saturating_add(1));
            if len > mapping.len() * 2 + 16 {
                return Err(FieldboxError::ClassYamlInvalid {
                    path: path.to_path_buf(),
                    message: format!(
                        "names index {} is far beyond the {} name(s) given",
                        len - 1,
                        mapping.len()
                    ),
                });
            }
            let mut names = vec![String::new(); len];
            for (index, name) in mapping {
                names[index] = name;
            }
            for (index, name) in names.iter_mut().enumerate() {
                if name.trim().is_empty() {
                    *name = format!("class_{}", index);
                }
            }
            names
        }
    };

    let registry = LabelRegistry::new(names)?;
    if let Some(recorded) = parsed.fingerprint {
        registry.verify_fingerprint(&recorded)?;
    }
    Ok(registry)
}

fn read_classes_txt(path: &Path) -> Result<LabelRegistry, FieldboxError> {
    let data = fs::read_to_string(path).map_err(FieldboxError::Io)?;
    let mut names = Vec::new();

    for (line_idx, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(FieldboxError::ClassesTxtInvalid {
                path: path.to_path_buf(),
                message: format!("line {} is empty", line_idx + 1),
            });
        }
        names.push(trimmed.to_string());
    }

    LabelRegistry::new(names)
}

/// Relative image directories recorded in a dataset `data.yaml`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SplitDirs {
    pub train: String,
    pub val: String,
}

/// Writes `data.yaml` with the registry's names and fingerprint.
pub fn write_data_yaml(
    dir: &Path,
    registry: &LabelRegistry,
    splits: Option<&SplitDirs>,
) -> Result<PathBuf, FieldboxError> {
    let mut yaml = String::new();
    if let Some(splits) = splits {
        yaml.push_str(&format!("train: {}\n", yaml_single_quoted(&splits.train)));
        yaml.push_str(&format!("val: {}\n", yaml_single_quoted(&splits.val)));
        yaml.push_str(&format!("nc: {}\n", registry.len()));
    }
    yaml.push_str("names:\n");
    for (idx, name) in registry.labels().iter().enumerate() {
        yaml.push_str(&format!("  {}: {}\n", idx, yaml_single_quoted(name)));
    }
    yaml.push_str(&format!(
        "fingerprint: {}\n",
        yaml_single_quoted(&registry.fingerprint())
    ));

    fs::create_dir_all(dir).map_err(FieldboxError::Io)?;
    let path = dir.join(DATA_YAML);
    fs::write(&path, yaml).map_err(FieldboxError::Io)?;
    Ok(path)
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

/// Looks for a `data.yaml` in `labels_dir` and its nearest ancestors.
pub fn discover_recorded_registry(
    labels_dir: &Path,
) -> Result<Option<(PathBuf, LabelRegistry)>, FieldboxError> {
    for dir in labels_dir.ancestors().take(REGISTRY_SEARCH_DEPTH + 1) {
        let candidate = dir.join(DATA_YAML);
        if candidate.is_file() {
            let registry = read_registry(&candidate)?;
            return Ok(Some((candidate, registry)));
        }
    }
    Ok(None)
}

/// Lists files directly inside `root` with one of `extensions`, sorted by
/// file name.
pub fn collect_files_with_extensions(
    root: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, FieldboxError> {
    if !root.is_dir() {
        return Err(FieldboxError::LayoutInvalid {
            path: root.to_path_buf(),
            message: "expected a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|source| FieldboxError::LayoutInvalid {
            path: root.to_path_buf(),
            message: format!("failed while traversing directory: {source}"),
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

pub fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

/// File stem as a UTF-8 string, lossily converted.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
