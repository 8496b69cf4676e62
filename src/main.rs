use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use meterscan::curation::DatasetCurator;
use meterscan::inference::onnx::{OnnxClassifier, OnnxSegmentation};
use meterscan::inference::{DIGIT_INPUT_SIZE, SEGMENTATION_INPUT_SIZE};
use meterscan::pipeline::{MeterConfig, MeterReader};

#[derive(Parser)]
#[command(name = "meterscan")]
#[command(about = "Read utility meter digits from photographs")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read a meter photograph and print the seven-digit value
    Read {
        /// Path to input image file
        #[arg(value_name = "IMAGE")]
        image_path: PathBuf,

        /// Path to the segmentation model (.onnx)
        #[arg(long, value_name = "PATH")]
        seg_model: PathBuf,

        /// Path to the digit classification model (.onnx)
        #[arg(long, value_name = "PATH")]
        digit_model: PathBuf,

        /// Save intermediate artifacts (mask, ROI, digit crops) to directory
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Foreground probability threshold
        #[arg(long, default_value_t = 0.3)]
        mask_threshold: f32,

        /// Keep background texture inside the ROI instead of zeroing it
        #[arg(long)]
        no_mask_background: bool,

        /// Print the result as JSON in the serving shape
        #[arg(long)]
        json: bool,
    },

    /// Build labeled digit samples from a folder of cropped register images
    Curate {
        /// Directory of input images named `..._value_<a>_<b>.<ext>`
        #[arg(value_name = "DIR")]
        input_dir: PathBuf,

        /// Output directory for digit samples
        #[arg(long, value_name = "DIR")]
        out: PathBuf,

        /// Expected digit count per register
        #[arg(long, default_value_t = 7)]
        digits: usize,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match args.command {
        Command::Read {
            image_path,
            seg_model,
            digit_model,
            debug_out,
            mask_threshold,
            no_mask_background,
            json,
        } => {
            let segmentation = OnnxSegmentation::load(&seg_model, SEGMENTATION_INPUT_SIZE)?;
            let classifier = OnnxClassifier::load(&digit_model, DIGIT_INPUT_SIZE)?;
            let config = MeterConfig {
                mask_threshold,
                mask_background: !no_mask_background,
                ..MeterConfig::default()
            };
            let mut reader = MeterReader::new(Arc::new(segmentation), Arc::new(classifier), config);
            if let Some(dir) = debug_out {
                reader = reader.with_debug_dir(dir);
            }

            let bytes = fs::read(&image_path)?;
            match reader.read_bytes(&bytes) {
                Ok(reading) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&reading)?);
                    } else {
                        println!("Meter value: {}", reading.value);
                        println!(
                            "Confidence: average {:.3}, minimum {:.3}",
                            reading.overall.average, reading.overall.minimum
                        );
                        for (i, confidence) in reading.confidences.iter().enumerate() {
                            println!("  digit {}: {:.3}", i + 1, confidence);
                        }
                    }
                    Ok(())
                }
                Err(e) => {
                    if json {
                        println!("{}", serde_json::json!({ "error": e.code() }));
                        std::process::exit(1);
                    }
                    Err(e.into())
                }
            }
        }
        Command::Curate {
            input_dir,
            out,
            digits,
        } => {
            let curator = DatasetCurator::new(digits);
            let summary = curator.curate_dir(&input_dir, &out)?;
            println!(
                "Curated {} images ({} samples), skipped {}",
                summary.curated, summary.samples, summary.skipped
            );
            Ok(())
        }
    }
}
