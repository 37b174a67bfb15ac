mod analyzer;
mod core;
mod decoder;
mod dedup;
mod filters;
mod shared;
mod utils;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::core::pipeline::{self, PipelineOptions};
use crate::dedup::DedupMetric;
use crate::shared::constants;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract visually distinct slide frames from a video
    Extract {
        /// Video file to read (any container OpenCV can open)
        #[arg(short, long)]
        input: String,
        /// Directory for the numbered slide images
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Summed grayscale difference that counts as a scene change
        /// (resolution-dependent, retune for unusual inputs)
        #[arg(short, long, default_value_t = constants::DEFAULT_CHANGE_THRESHOLD)]
        threshold: u64,
        /// Minimum frames between two captures
        #[arg(short, long, default_value_t = constants::DEFAULT_MIN_FRAME_DISTANCE)]
        min_distance: u64,
        /// Drop candidates that contain a detected face
        #[arg(long, default_value_t = false)]
        filter_faces: bool,
        /// Drop candidates without recognizable text
        #[arg(long, default_value_t = false)]
        require_text: bool,
        #[arg(long, default_value_t = constants::DEFAULT_FACE_CONFIDENCE)]
        face_confidence: f32,
        #[arg(long, default_value_t = constants::DEFAULT_MIN_TEXT_LENGTH)]
        min_text_length: usize,
        /// Caffe prototxt of the face-detection net (required with --filter-faces)
        #[arg(long)]
        face_proto: Option<PathBuf>,
        /// Caffe weights of the face-detection net (required with --filter-faces)
        #[arg(long)]
        face_model: Option<PathBuf>,
        /// Tesseract executable used by --require-text
        #[arg(long, default_value = constants::DEFAULT_TESSERACT_CMD)]
        tesseract_cmd: String,
        #[arg(long, value_enum, default_value_t = DedupMetric::Phash)]
        dedup_metric: DedupMetric,
        /// Similarity above which two slides count as duplicates
        /// (defaults to 0.95 for ssim, 0.90 for histogram)
        #[arg(long)]
        dedup_threshold: Option<f64>,
        /// Print the summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Remove near-duplicate images from an existing folder
    Dedup {
        #[arg(short, long)]
        dir: PathBuf,
        #[arg(short, long, value_enum, default_value_t = DedupMetric::Ssim)]
        metric: DedupMetric,
        #[arg(short, long)]
        threshold: Option<f64>,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    crate::utils::logger::init();

    let cancel = Arc::new(AtomicBool::new(false));
    {
        let cancel = cancel.clone();
        ctrlc::set_handler(move || {
            cancel.store(true, Ordering::Relaxed);
        })?;
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            input,
            output_dir,
            threshold,
            min_distance,
            filter_faces,
            require_text,
            face_confidence,
            min_text_length,
            face_proto,
            face_model,
            tesseract_cmd,
            dedup_metric,
            dedup_threshold,
            json,
        } => {
            let options = PipelineOptions {
                input,
                output_dir,
                change_threshold: threshold,
                min_distance,
                filter_faces,
                require_text,
                face_confidence,
                min_text_length,
                face_proto,
                face_model,
                tesseract_cmd,
                dedup_metric,
                dedup_threshold: dedup_threshold.unwrap_or_else(|| dedup_metric.default_threshold()),
            };

            let summary = pipeline::run(options, &cancel)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary);
            }
        }
        Commands::Dedup {
            dir,
            metric,
            threshold,
            json,
        } => {
            let threshold = threshold.unwrap_or_else(|| metric.default_threshold());
            let report = dedup::deduplicate_dir(&dir, metric, threshold, &cancel)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "Examined {} images, removed {} duplicates.",
                    report.examined, report.removed
                );
            }
        }
    }

    Ok(())
}
