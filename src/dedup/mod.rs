use clap::ValueEnum;
use opencv::{imgcodecs, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::analyzer::metrics;
use crate::shared::constants;
use crate::shared::error::{Result, SlideError};
use crate::utils::file_utils;
use crate::utils::logger;

/// Which similarity measure decides that two slides are duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMetric {
    /// Perceptual-hash equality. Cheap enough to run incrementally during
    /// extraction: a candidate whose hash was already seen is never saved.
    Phash,
    /// Structural similarity over both images resized to 300x300.
    Ssim,
    /// Color-histogram Pearson correlation at full resolution.
    Histogram,
}

impl DedupMetric {
    pub fn default_threshold(self) -> f64 {
        match self {
            // Threshold is ignored for hash equality.
            DedupMetric::Phash => 1.0,
            DedupMetric::Ssim => constants::DEFAULT_SSIM_THRESHOLD,
            DedupMetric::Histogram => constants::DEFAULT_HISTOGRAM_THRESHOLD,
        }
    }

    /// SSIM and histogram comparisons need full images and run as a
    /// post-pass over the output directory; phash runs inline.
    pub fn needs_post_pass(self) -> bool {
        !matches!(self, DedupMetric::Phash)
    }
}

/// Seen-set for incremental phash dedup. Local to one pipeline run.
#[derive(Default)]
pub struct HashRegistry {
    seen: HashSet<u64>,
}

impl HashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the hash was new (the frame should be saved).
    pub fn insert(&mut self, hash: u64) -> bool {
        self.seen.insert(hash)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// A slide that survived the filters and was written to disk.
pub struct SavedSlide {
    pub seq: usize,
    pub path: PathBuf,
    pub phash: Option<u64>,
}

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct DedupReport {
    pub examined: usize,
    pub removed: usize,
}

enum ImageRepr {
    Hash(u64),
    Gray300(Vec<u8>),
    Bgr(Vec<u8>),
}

fn read_image(path: &Path, grayscale: bool) -> Result<Mat> {
    let flag = if grayscale {
        imgcodecs::IMREAD_GRAYSCALE
    } else {
        imgcodecs::IMREAD_COLOR
    };
    let mat = imgcodecs::imread(&path.to_string_lossy(), flag)
        .map_err(|e| SlideError::io(path, format!("imread failed: {}", e)))?;
    if mat.empty() {
        // Not explained by one of our own removals, so this is a real error
        // (corrupted file, or something else deleted it mid-sweep).
        return Err(SlideError::io(path, "unreadable or vanished image"));
    }
    Ok(mat)
}

fn mat_bytes(path: &Path, mat: &Mat) -> Result<Vec<u8>> {
    mat.data_bytes()
        .map(|b| b.to_vec())
        .map_err(|e| SlideError::io(path, format!("image access: {}", e)))
}

fn load_repr(path: &Path, metric: DedupMetric) -> Result<ImageRepr> {
    match metric {
        DedupMetric::Phash => {
            let gray = read_image(path, true)?;
            let data = mat_bytes(path, &gray)?;
            let hash = metrics::phash(&data, gray.cols() as u32, gray.rows() as u32)
                .map_err(|e| SlideError::io(path, format!("phash: {}", e)))?;
            Ok(ImageRepr::Hash(hash))
        }
        DedupMetric::Ssim => {
            let gray = read_image(path, true)?;
            let data = mat_bytes(path, &gray)?;
            let side = constants::SSIM_COMPARE_SIZE;
            let resized =
                metrics::resize_gray(&data, gray.cols() as u32, gray.rows() as u32, side, side)
                    .map_err(|e| SlideError::io(path, format!("resize: {}", e)))?;
            Ok(ImageRepr::Gray300(resized))
        }
        DedupMetric::Histogram => {
            let color = read_image(path, false)?;
            Ok(ImageRepr::Bgr(mat_bytes(path, &color)?))
        }
    }
}

fn pair_score(a: &ImageRepr, b: &ImageRepr) -> f64 {
    match (a, b) {
        (ImageRepr::Hash(x), ImageRepr::Hash(y)) => {
            if x == y {
                1.0
            } else {
                0.0
            }
        }
        (ImageRepr::Gray300(x), ImageRepr::Gray300(y)) => {
            let side = constants::SSIM_COMPARE_SIZE as usize;
            metrics::ssim(x, y, side, side)
        }
        (ImageRepr::Bgr(x), ImageRepr::Bgr(y)) => metrics::histogram_correlation(x, y),
        // load_repr only ever produces one variant per sweep.
        _ => 0.0,
    }
}

fn is_duplicate(metric: DedupMetric, threshold: f64, score: f64) -> bool {
    match metric {
        DedupMetric::Phash => score >= 1.0,
        _ => score > threshold,
    }
}

/// Pairwise duplicate removal over the images of a directory, in sorted
/// (capture) order. Classic O(n^2) sweep: for each image i, every later
/// surviving image j scoring above `threshold` is deleted. The earlier
/// index always survives, so the result depends on insertion order rather
/// than any global clustering. Running the pass again removes nothing.
pub fn deduplicate_dir(
    dir: &Path,
    metric: DedupMetric,
    threshold: f64,
    cancel: &AtomicBool,
) -> Result<DedupReport> {
    let images = file_utils::list_images(dir)?;
    let mut removed: HashSet<PathBuf> = HashSet::new();
    let mut report = DedupReport {
        examined: images.len(),
        removed: 0,
    };

    for i in 0..images.len() {
        if cancel.load(Ordering::Relaxed) {
            logger::info("dedup sweep cancelled");
            break;
        }
        if removed.contains(&images[i]) {
            continue;
        }
        let repr_i = load_repr(&images[i], metric)?;

        for j in (i + 1)..images.len() {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            if removed.contains(&images[j]) {
                continue;
            }
            let repr_j = load_repr(&images[j], metric)?;
            let score = pair_score(&repr_i, &repr_j);
            if is_duplicate(metric, threshold, score) {
                std::fs::remove_file(&images[j])
                    .map_err(|e| SlideError::io(&images[j], format!("remove failed: {}", e)))?;
                logger::info(&format!(
                    "removed duplicate {} (score {:.3} against {})",
                    images[j].display(),
                    score,
                    images[i].display()
                ));
                removed.insert(images[j].clone());
                report.removed += 1;
            }
        }
    }

    Ok(report)
}
