//! Directory-level orchestration for each CLI subcommand.
//!
//! Every operation walks its input directory one unit at a time and records
//! the unit's outcome in a [`BatchReport`]. Problems confined to one unit
//! (unreadable image, invalid geometry, failed write) mark that unit failed
//! and processing continues. Only setup failures (missing input directory,
//! unwritable output root) abort the batch with an error.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::error::FieldboxError;
use crate::extract::extract_annotations;
use crate::ir::io_analysis_json::FieldSource;
use crate::ir::io_labelme_json::write_labelme_json;
use crate::ir::io_yolo::{
    collect_files_with_extensions, discover_recorded_registry, file_stem, read_label_lines,
    write_data_yaml, write_label_file, SplitDirs, IMAGE_EXTENSIONS, LABEL_EXTENSION,
};
use crate::ir::{AliasMap, ImageDimensions, LabelRegistry};
use crate::reconstruct::{reconstruct_record, ImageSource};
use crate::report::{BatchReport, IssueCode, UnitIssue, UnitOutcome, UnitReport};
use crate::split::split_train_val;

const LABELME_EXTENSION: &str = "json";
const RENAME_TEMP_PREFIX: &str = ".fieldbox-rename-";

/// Picks the registry for an operation over `labels_dir`.
///
/// An explicit registry must match any `data.yaml` recorded next to the
/// labels. Without an explicit registry the recorded one is used, then the
/// built-in receipt labels.
pub fn resolve_registry(
    explicit: Option<LabelRegistry>,
    labels_dir: &Path,
) -> Result<LabelRegistry, FieldboxError> {
    let recorded = discover_recorded_registry(labels_dir)?;

    match (explicit, recorded) {
        (Some(explicit), Some((path, recorded))) => {
            recorded.verify_fingerprint(&explicit.fingerprint()).map_err(|err| {
                warn!(
                    "label registry does not match the one recorded in {}",
                    path.display()
                );
                err
            })?;
            Ok(explicit)
        }
        (Some(explicit), None) => Ok(explicit),
        (None, Some((path, recorded))) => {
            debug!("using label registry recorded in {}", path.display());
            Ok(recorded)
        }
        (None, None) => Ok(LabelRegistry::receipt_default()),
    }
}

/// Reads pixel dimensions from encoded image bytes.
pub fn image_dimensions(bytes: &[u8], path: &Path) -> Result<ImageDimensions, FieldboxError> {
    let size =
        imagesize::blob_size(bytes).map_err(|source| FieldboxError::ImageDimensionRead {
            path: path.to_path_buf(),
            source,
        })?;
    to_dimensions(size, path)
}

/// Reads pixel dimensions from an image file's header.
pub fn read_image_dimensions(path: &Path) -> Result<ImageDimensions, FieldboxError> {
    let size = imagesize::size(path).map_err(|source| FieldboxError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;
    to_dimensions(size, path)
}

fn to_dimensions(
    size: imagesize::ImageSize,
    path: &Path,
) -> Result<ImageDimensions, FieldboxError> {
    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| FieldboxError::LayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image width {} does not fit in u32", size.width),
        })?;

    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| FieldboxError::LayoutInvalid {
            path: path.to_path_buf(),
            message: format!("image height {} does not fit in u32", size.height),
        })?;

    Ok(ImageDimensions::new(width, height))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Renames every image in `dir` to `0.<ext>`, `1.<ext>`, ... in file-name
/// order.
///
/// Renaming goes through temporary names first so a file already called
/// `3.jpg` is never overwritten by another image being renamed to `3.jpg`.
pub fn rename_images(dir: &Path, ext: &str) -> Result<BatchReport, FieldboxError> {
    let ext = ext.trim_start_matches('.');
    if ext.is_empty() {
        return Err(FieldboxError::UnsupportedFormat(
            "rename extension must not be empty".to_string(),
        ));
    }

    let files = collect_files_with_extensions(dir, &IMAGE_EXTENSIONS)?;
    info!("renaming {} image(s) in {}", files.len(), dir.display());

    let mut staged: Vec<(String, PathBuf)> = Vec::with_capacity(files.len());
    for (index, path) in files.iter().enumerate() {
        let temp = dir.join(format!("{RENAME_TEMP_PREFIX}{index}"));
        if let Err(err) = fs::rename(path, &temp) {
            for (original, temp) in &staged {
                restore_staged(dir, original, temp);
            }
            return Err(FieldboxError::Io(err));
        }
        staged.push((file_name(path), temp));
    }

    let mut report = BatchReport::new("rename");
    for (index, (original, temp)) in staged.into_iter().enumerate() {
        let target = dir.join(format!("{index}.{ext}"));
        let target_name = file_name(&target);

        let result = if target.exists() {
            Err(format!("{} already exists", target_name))
        } else {
            fs::rename(&temp, &target).map_err(|err| err.to_string())
        };

        match result {
            Ok(()) => {
                debug!("renamed '{}' to '{}'", original, target_name);
                report.push(UnitReport::processed(original, Some(target_name), vec![]));
            }
            Err(message) => {
                warn!("cannot rename '{}' to '{}': {}", original, target_name, message);
                restore_staged(dir, &original, &temp);
                report.push(UnitReport::failed(
                    original,
                    IssueCode::WriteFailed,
                    format!("{message}; kept original name"),
                ));
            }
        }
    }

    Ok(report)
}

/// Moves a staged file back to its original name.
fn restore_staged(dir: &Path, original: &str, temp: &Path) {
    if let Err(err) = fs::rename(temp, dir.join(original)) {
        warn!(
            "failed to restore '{}' from {}: {}",
            original,
            temp.display(),
            err
        );
    }
}

/// Options for [`extract_dir`].
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    pub images_dir: PathBuf,
    pub output_dir: PathBuf,
    pub registry: LabelRegistry,
    pub aliases: AliasMap,
}

/// Writes one label file per image from its saved analysis result.
///
/// Also writes `data.yaml` for the registry into the output directory so
/// later steps can check they use the same labels.
pub fn extract_dir(
    opts: &ExtractOptions,
    source: &dyn FieldSource,
) -> Result<BatchReport, FieldboxError> {
    let images = collect_files_with_extensions(&opts.images_dir, &IMAGE_EXTENSIONS)?;
    fs::create_dir_all(&opts.output_dir).map_err(FieldboxError::Io)?;
    write_data_yaml(&opts.output_dir, &opts.registry, None)?;
    info!(
        "extracting labels for {} image(s) into {}",
        images.len(),
        opts.output_dir.display()
    );

    let mut report = BatchReport::new("extract");
    for image_path in images {
        report.push(extract_one(opts, source, &image_path));
    }

    info!(
        "extract finished: {} written, {} skipped, {} failed",
        report.count(UnitOutcome::Succeeded) + report.count(UnitOutcome::Degraded),
        report.count(UnitOutcome::Skipped),
        report.failed_count()
    );
    Ok(report)
}

fn extract_one(opts: &ExtractOptions, source: &dyn FieldSource, image_path: &Path) -> UnitReport {
    let name = file_name(image_path);
    let stem = file_stem(image_path);

    let dimensions = match read_image_dimensions(image_path) {
        Ok(dimensions) => dimensions,
        Err(err) => {
            warn!("{}: {}", name, err);
            return UnitReport::failed(name, IssueCode::UnreadableImage, err.to_string());
        }
    };

    let analysis = match source.analysis_for(&stem) {
        Ok(Some(analysis)) => analysis,
        Ok(None) => {
            debug!("{}: no analysis result", name);
            return UnitReport::skipped(
                name,
                UnitIssue::info(IssueCode::MissingAnalysis, "no analysis result for image"),
            );
        }
        Err(err) => {
            warn!("{}: {}", name, err);
            return UnitReport::failed(name, IssueCode::AnalysisInvalid, err.to_string());
        }
    };

    let detections = analysis.to_pixel_space(dimensions);
    let extraction = match extract_annotations(
        &name,
        dimensions,
        &detections,
        &opts.registry,
        &opts.aliases,
    ) {
        Ok(extraction) => extraction,
        Err(err) => {
            warn!("{}: {}", name, err);
            return UnitReport::failed(name, IssueCode::InvalidGeometry, err.to_string());
        }
    };

    let label_path = opts
        .output_dir
        .join(format!("{stem}.{LABEL_EXTENSION}"));
    if let Err(err) = write_label_file(&label_path, &extraction.image) {
        warn!("{}: {}", label_path.display(), err);
        return UnitReport::failed(name, IssueCode::WriteFailed, err.to_string());
    }

    debug!(
        "{}: {} box(es) written to {}",
        name,
        extraction.image.annotations.len(),
        label_path.display()
    );
    UnitReport::processed(name, Some(display(&label_path)), extraction.issues)
}

/// Options for [`split_dataset`].
#[derive(Clone, Debug)]
pub struct SplitOptions {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    pub val_fraction: f64,
    pub seed: u64,
    pub registry: LabelRegistry,
}

/// Copies images and their label files into a YOLO train/val layout:
///
/// ```text
/// <output>/images/{train,val}/
/// <output>/labels/{train,val}/
/// <output>/data.yaml
/// ```
///
/// Images without a label file are still copied (as background images).
pub fn split_dataset(opts: &SplitOptions) -> Result<BatchReport, FieldboxError> {
    let images = collect_files_with_extensions(&opts.images_dir, &IMAGE_EXTENSIONS)?;
    let names: Vec<String> = images.iter().map(|p| file_name(p)).collect();
    let split = split_train_val(&names, opts.val_fraction, opts.seed)?;

    let splits = SplitDirs {
        train: "images/train".to_string(),
        val: "images/val".to_string(),
    };
    for dir in ["images/train", "images/val", "labels/train", "labels/val"] {
        fs::create_dir_all(opts.output_dir.join(dir)).map_err(FieldboxError::Io)?;
    }
    write_data_yaml(&opts.output_dir, &opts.registry, Some(&splits))?;

    info!(
        "splitting {} image(s): {} train, {} val",
        names.len(),
        split.train.len(),
        split.val.len()
    );

    let mut report = BatchReport::new("split");
    for (subset, members) in [("train", &split.train), ("val", &split.val)] {
        for name in members {
            report.push(copy_into_split(opts, subset, name));
        }
    }

    Ok(report)
}

fn copy_into_split(opts: &SplitOptions, subset: &str, name: &str) -> UnitReport {
    let image_src = opts.images_dir.join(name);
    let image_dst = opts.output_dir.join("images").join(subset).join(name);
    if let Err(err) = fs::copy(&image_src, &image_dst) {
        warn!("{}: {}", image_src.display(), err);
        return UnitReport::failed(name, IssueCode::WriteFailed, err.to_string());
    }

    let label_name = format!("{}.{}", file_stem(Path::new(name)), LABEL_EXTENSION);
    let label_src = opts.labels_dir.join(&label_name);
    let mut issues = Vec::new();

    if label_src.is_file() {
        let label_dst = opts.output_dir.join("labels").join(subset).join(&label_name);
        if let Err(err) = fs::copy(&label_src, &label_dst) {
            warn!("{}: {}", label_src.display(), err);
            return UnitReport::failed(name, IssueCode::WriteFailed, err.to_string());
        }
    } else {
        issues.push(UnitIssue::info(
            IssueCode::MissingLabelFile,
            format!("no {} found; copied as a background image", label_name),
        ));
    }

    UnitReport::processed(name, Some(subset.to_string()), issues)
}

/// Options for [`convert_to_labelme`].
#[derive(Clone, Debug)]
pub struct LabelmeOptions {
    pub images_dir: PathBuf,
    pub labels_dir: PathBuf,
    pub output_dir: PathBuf,
    pub registry: LabelRegistry,
}

/// Writes one LabelMe JSON (with embedded image bytes) per labeled image.
///
/// Images without a label file are skipped.
pub fn convert_to_labelme(opts: &LabelmeOptions) -> Result<BatchReport, FieldboxError> {
    let images = collect_files_with_extensions(&opts.images_dir, &IMAGE_EXTENSIONS)?;
    fs::create_dir_all(&opts.output_dir).map_err(FieldboxError::Io)?;
    info!(
        "converting {} image(s) to LabelMe JSON in {}",
        images.len(),
        opts.output_dir.display()
    );

    let mut report = BatchReport::new("to-labelme");
    for image_path in images {
        report.push(labelme_one(opts, &image_path));
    }

    Ok(report)
}

fn labelme_one(opts: &LabelmeOptions, image_path: &Path) -> UnitReport {
    let name = file_name(image_path);
    let stem = file_stem(image_path);

    let label_path = opts.labels_dir.join(format!("{stem}.{LABEL_EXTENSION}"));
    if !label_path.is_file() {
        warn!("annotation not found for {}", image_path.display());
        return UnitReport::skipped(
            name,
            UnitIssue::info(
                IssueCode::MissingLabelFile,
                format!("{} does not exist", label_path.display()),
            ),
        );
    }

    let bytes = match fs::read(image_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("could not read image {}: {}", image_path.display(), err);
            return UnitReport::failed(name, IssueCode::UnreadableImage, err.to_string());
        }
    };
    let dimensions = match image_dimensions(&bytes, image_path) {
        Ok(dimensions) => dimensions,
        Err(err) => {
            warn!("{}", err);
            return UnitReport::failed(name, IssueCode::UnreadableImage, err.to_string());
        }
    };
    let lines = match read_label_lines(&label_path) {
        Ok(lines) => lines,
        Err(err) => {
            warn!("{}: {}", label_path.display(), err);
            return UnitReport::failed(name, IssueCode::UnreadableLabelFile, err.to_string());
        }
    };

    let source = ImageSource {
        path: &name,
        bytes: &bytes,
        dimensions,
    };
    let reconstruction = match reconstruct_record(&source, &lines, &opts.registry) {
        Ok(reconstruction) => reconstruction,
        Err(err) => {
            warn!("{}: {}", name, err);
            return UnitReport::failed(name, IssueCode::InvalidGeometry, err.to_string());
        }
    };

    let json_path = opts
        .output_dir
        .join(format!("{stem}.{LABELME_EXTENSION}"));
    if let Err(err) = write_labelme_json(&json_path, &reconstruction.record) {
        warn!("{}: {}", json_path.display(), err);
        return UnitReport::failed(name, IssueCode::WriteFailed, err.to_string());
    }

    debug!("saved {}", json_path.display());
    UnitReport::processed(name, Some(display(&json_path)), reconstruction.issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::io_analysis_json::AnalysisResult;
    use crate::test_support::bmp_bytes;
    use std::collections::HashMap;

    struct InMemorySource(HashMap<String, AnalysisResult>);

    impl FieldSource for InMemorySource {
        fn analysis_for(&self, image_stem: &str) -> Result<Option<AnalysisResult>, FieldboxError> {
            Ok(self.0.get(image_stem).cloned())
        }
    }

    #[test]
    fn image_dimensions_from_bytes() {
        let dims = image_dimensions(&bmp_bytes(20, 10), Path::new("a.bmp")).unwrap();
        assert_eq!(dims, ImageDimensions::new(20, 10));

        let err = image_dimensions(b"not an image", Path::new("b.bmp")).unwrap_err();
        assert!(matches!(err, FieldboxError::ImageDimensionRead { .. }));
    }

    #[test]
    fn resolve_registry_prefers_explicit_but_checks_recorded() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let labels = temp.path().join("labels");
        fs::create_dir_all(&labels).unwrap();

        assert_eq!(
            resolve_registry(None, &labels).unwrap(),
            LabelRegistry::receipt_default()
        );

        let recorded = LabelRegistry::new(["A", "B"]).unwrap();
        write_data_yaml(temp.path(), &recorded, None).unwrap();
        assert_eq!(resolve_registry(None, &labels).unwrap(), recorded);
        assert_eq!(
            resolve_registry(Some(recorded.clone()), &labels).unwrap(),
            recorded
        );

        let swapped = LabelRegistry::new(["B", "A"]).unwrap();
        let err = resolve_registry(Some(swapped), &labels).unwrap_err();
        assert!(matches!(err, FieldboxError::LabelRegistryMismatch { .. }));
    }

    #[test]
    fn rename_never_clobbers_existing_targets() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("1.jpg"), b"first").unwrap();
        fs::write(temp.path().join("b.jpg"), b"second").unwrap();
        fs::write(temp.path().join("notes.txt"), b"keep").unwrap();

        let report = rename_images(temp.path(), ".jpg").unwrap();
        assert_eq!(report.count(UnitOutcome::Succeeded), 2);

        assert_eq!(fs::read(temp.path().join("0.jpg")).unwrap(), b"first");
        assert_eq!(fs::read(temp.path().join("1.jpg")).unwrap(), b"second");
        assert!(temp.path().join("notes.txt").is_file());
        assert!(!temp.path().join("b.jpg").exists());
    }

    #[test]
    fn rename_conflict_keeps_original_name() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("a.jpg"), b"image").unwrap();
        fs::write(temp.path().join("0.webp"), b"other").unwrap();

        let report = rename_images(temp.path(), "webp").unwrap();
        assert_eq!(report.failed_count(), 1);

        assert_eq!(fs::read(temp.path().join("a.jpg")).unwrap(), b"image");
        assert_eq!(fs::read(temp.path().join("0.webp")).unwrap(), b"other");
        let leftovers: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(RENAME_TEMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }

    #[test]
    fn unreadable_label_file_is_reported_distinctly() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        let labels = temp.path().join("labels");
        fs::create_dir_all(&images).unwrap();
        fs::create_dir_all(&labels).unwrap();
        fs::write(images.join("0.bmp"), bmp_bytes(20, 20)).unwrap();
        fs::write(labels.join("0.txt"), [0xff, 0xfe, b'\n']).unwrap();

        let opts = LabelmeOptions {
            images_dir: images,
            labels_dir: labels,
            output_dir: temp.path().join("labelme"),
            registry: LabelRegistry::new(["A"]).unwrap(),
        };
        let report = convert_to_labelme(&opts).unwrap();

        assert_eq!(report.units.len(), 1);
        assert_eq!(report.units[0].outcome, UnitOutcome::Failed);
        assert_eq!(report.units[0].issues[0].code, IssueCode::UnreadableLabelFile);
    }

    #[test]
    fn extract_dir_reports_each_unit() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path().join("images");
        let output = temp.path().join("labels");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("0.bmp"), bmp_bytes(200, 200)).unwrap();
        fs::write(images.join("1.bmp"), bmp_bytes(10, 10)).unwrap();
        fs::write(images.join("2.bmp"), b"garbage").unwrap();

        let analysis = crate::ir::io_analysis_json::from_analysis_str(
            r#"{"detections": [
                {"label": "SellerName", "polygon": [10, 20, 110, 20, 110, 120, 10, 20]},
                {"label": "Tip", "polygon": [0, 0, 1, 1]}
            ]}"#,
        )
        .unwrap();
        let source = InMemorySource(HashMap::from([("0".to_string(), analysis)]));

        let opts = ExtractOptions {
            images_dir: images,
            output_dir: output.clone(),
            registry: LabelRegistry::receipt_default(),
            aliases: AliasMap::new(),
        };
        let report = extract_dir(&opts, &source).unwrap();

        let outcomes: Vec<UnitOutcome> = report.units.iter().map(|u| u.outcome).collect();
        assert_eq!(
            outcomes,
            vec![UnitOutcome::Degraded, UnitOutcome::Skipped, UnitOutcome::Failed]
        );
        assert_eq!(
            fs::read_to_string(output.join("0.txt")).unwrap(),
            "0 0.300000 0.350000 0.500000 0.500000\n"
        );
        assert!(output.join("data.yaml").is_file());
        assert!(!output.join("1.txt").exists());
    }
}
