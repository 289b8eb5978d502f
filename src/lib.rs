//! Fieldbox: document field regions to YOLO boxes and back.
//!
//! Fieldbox turns the polygons a document-analysis service reports for
//! known fields (seller name, total due, ...) into YOLO training labels,
//! splits the result into a train/val dataset, and rebuilds LabelMe
//! rectangle annotations from YOLO labels for review.
//!
//! # Modules
//!
//! - [`ir`]: Geometry types, the label registry, and the file formats
//! - [`codec`]: Polygon → normalized box and normalized box → pixel box
//! - [`extract`]: Analysis result → class-indexed boxes
//! - [`reconstruct`]: YOLO label lines → LabelMe rectangle records
//! - [`split`]: Seeded train/val splitting
//! - [`pipeline`]: Directory-level batch operations
//! - [`report`]: Per-unit outcome reporting
//! - [`error`]: Error types for fieldbox operations

pub mod codec;
pub mod error;
pub mod extract;
pub mod ir;
pub mod pipeline;
pub mod reconstruct;
pub mod report;
pub mod split;

#[cfg(test)]
mod test_support;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use log::info;

pub use error::FieldboxError;

use ir::io_analysis_json::SavedAnalysisDir;
use ir::io_yolo::read_registry;
use ir::{AliasMap, LabelRegistry};
use report::BatchReport;

/// The fieldbox CLI application.
#[derive(Parser)]
#[command(name = "fieldbox")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format for the batch report.
    #[arg(long, value_enum, default_value_t = ReportFormat::Text, global = true)]
    report: ReportFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Rename every image in a directory to 0.<ext>, 1.<ext>, ...
    Rename(RenameArgs),
    /// Write YOLO label files from saved analysis results.
    Extract(ExtractArgs),
    /// Split images and labels into a YOLO train/val dataset.
    Split(SplitArgs),
    /// Rebuild LabelMe rectangle JSON from YOLO label files.
    ToLabelme(ToLabelmeArgs),
}

#[derive(clap::Args)]
struct RenameArgs {
    /// Directory holding the images.
    dir: PathBuf,

    /// Extension for the renamed files.
    #[arg(long, default_value = "jpg")]
    ext: String,
}

/// Where the label registry comes from. Without either flag the registry
/// recorded next to the labels is used, then the built-in receipt labels.
#[derive(clap::Args)]
struct RegistryArgs {
    /// data.yaml or classes.txt holding the label registry.
    #[arg(long, env = "FIELDBOX_CLASSES", conflicts_with = "class")]
    classes: Option<PathBuf>,

    /// A registry label; repeat in class-index order.
    #[arg(long = "class", value_name = "LABEL")]
    class: Vec<String>,
}

impl RegistryArgs {
    fn explicit(&self) -> Result<Option<LabelRegistry>, FieldboxError> {
        if !self.class.is_empty() {
            return LabelRegistry::new(self.class.iter().cloned()).map(Some);
        }
        self.classes.as_deref().map(read_registry).transpose()
    }

    fn resolve(&self, labels_dir: &Path) -> Result<LabelRegistry, FieldboxError> {
        pipeline::resolve_registry(self.explicit()?, labels_dir)
    }
}

#[derive(clap::Args)]
struct ExtractArgs {
    /// Directory holding the images.
    #[arg(long)]
    images: PathBuf,

    /// Directory holding one saved analysis result per image (<stem>.json).
    #[arg(long)]
    analysis: PathBuf,

    /// Directory to write the label files into.
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    registry: RegistryArgs,

    /// Map a field name to a registry label (FIELD=LABEL); repeatable.
    #[arg(long = "alias", value_name = "FIELD=LABEL")]
    alias: Vec<String>,
}

#[derive(clap::Args)]
struct SplitArgs {
    /// Directory holding the images.
    #[arg(long)]
    images: PathBuf,

    /// Directory holding the label files.
    #[arg(long)]
    labels: PathBuf,

    /// Dataset root to create.
    #[arg(long)]
    output: PathBuf,

    /// Fraction of images placed in the validation subset.
    #[arg(long, default_value_t = split::DEFAULT_VAL_FRACTION)]
    val_fraction: f64,

    /// Shuffle seed.
    #[arg(long, env = "FIELDBOX_SEED", default_value_t = split::DEFAULT_SEED)]
    seed: u64,

    #[command(flatten)]
    registry: RegistryArgs,
}

#[derive(clap::Args)]
struct ToLabelmeArgs {
    /// Directory holding the images.
    #[arg(long)]
    images: PathBuf,

    /// Directory holding the label files.
    #[arg(long)]
    labels: PathBuf,

    /// Directory to write the LabelMe JSON files into.
    #[arg(long)]
    output: PathBuf,

    #[command(flatten)]
    registry: RegistryArgs,
}

/// Run the fieldbox CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), FieldboxError> {
    let cli = Cli::parse();

    let report = match cli.command {
        Commands::Rename(args) => pipeline::rename_images(&args.dir, &args.ext)?,
        Commands::Extract(args) => run_extract(args)?,
        Commands::Split(args) => run_split(args)?,
        Commands::ToLabelme(args) => run_to_labelme(args)?,
    };

    emit_report(&report, cli.report)?;

    if report.has_failures() {
        return Err(FieldboxError::BatchFailed {
            operation: report.operation.clone(),
            failed: report.failed_count(),
        });
    }
    Ok(())
}

fn run_extract(args: ExtractArgs) -> Result<BatchReport, FieldboxError> {
    let registry = args.registry.resolve(&args.output)?;
    let aliases = AliasMap::from_assignments(&args.alias)?;
    info!(
        "label registry: {} label(s), {}",
        registry.len(),
        registry.fingerprint()
    );

    let opts = pipeline::ExtractOptions {
        images_dir: args.images,
        output_dir: args.output,
        registry,
        aliases,
    };
    pipeline::extract_dir(&opts, &SavedAnalysisDir::new(args.analysis))
}

fn run_split(args: SplitArgs) -> Result<BatchReport, FieldboxError> {
    split::validate_val_fraction(args.val_fraction)?;
    let registry = args.registry.resolve(&args.labels)?;

    let opts = pipeline::SplitOptions {
        images_dir: args.images,
        labels_dir: args.labels,
        output_dir: args.output,
        val_fraction: args.val_fraction,
        seed: args.seed,
        registry,
    };
    pipeline::split_dataset(&opts)
}

fn run_to_labelme(args: ToLabelmeArgs) -> Result<BatchReport, FieldboxError> {
    let registry = args.registry.resolve(&args.labels)?;

    let opts = pipeline::LabelmeOptions {
        images_dir: args.images,
        labels_dir: args.labels,
        output_dir: args.output,
        registry,
    };
    pipeline::convert_to_labelme(&opts)
}

fn emit_report(report: &BatchReport, format: ReportFormat) -> Result<(), FieldboxError> {
    match format {
        ReportFormat::Text => print!("{}", report),
        ReportFormat::Json => {
            let json =
                serde_json::to_string_pretty(report).map_err(FieldboxError::ReportSerialize)?;
            println!("{}", json);
        }
    }
    Ok(())
}
