use opencv::{core::Vector, imgcodecs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::analyzer::{metrics, CandidateEvent, SceneChangeDetector};
use crate::decoder::VideoDecoder;
use crate::dedup::{self, DedupMetric, HashRegistry, SavedSlide};
use crate::filters::{ContentFilter, DnnFaceDetector, FaceDetector, FilterVerdict, TesseractOcr, TextRecognizer};
use crate::shared::constants;
use crate::shared::error::{Result, SlideError};
use crate::utils::logger;

/// Everything one extraction run needs. Each option is independently
/// togglable; the defaults mirror the loosest setup (no filters,
/// incremental phash dedup).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub input: String,
    pub output_dir: PathBuf,
    pub change_threshold: u64,
    pub min_distance: u64,
    pub filter_faces: bool,
    pub require_text: bool,
    pub face_confidence: f32,
    pub min_text_length: usize,
    pub face_proto: Option<PathBuf>,
    pub face_model: Option<PathBuf>,
    pub tesseract_cmd: String,
    pub dedup_metric: DedupMetric,
    pub dedup_threshold: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            output_dir: PathBuf::from("slides"),
            change_threshold: constants::DEFAULT_CHANGE_THRESHOLD,
            min_distance: constants::DEFAULT_MIN_FRAME_DISTANCE,
            filter_faces: false,
            require_text: false,
            face_confidence: constants::DEFAULT_FACE_CONFIDENCE,
            min_text_length: constants::DEFAULT_MIN_TEXT_LENGTH,
            face_proto: None,
            face_model: None,
            tesseract_cmd: constants::DEFAULT_TESSERACT_CMD.to_string(),
            dedup_metric: DedupMetric::Phash,
            dedup_threshold: DedupMetric::Phash.default_threshold(),
        }
    }
}

impl PipelineOptions {
    pub fn validate(&self) -> Result<()> {
        if self.input.is_empty() {
            return Err(SlideError::Config("no input video given".to_string()));
        }
        if self.change_threshold == 0 {
            return Err(SlideError::Config(
                "change threshold must be positive".to_string(),
            ));
        }
        if self.min_distance == 0 {
            return Err(SlideError::Config(
                "minimum frame distance must be at least 1".to_string(),
            ));
        }
        if self.dedup_metric.needs_post_pass()
            && !(self.dedup_threshold > 0.0 && self.dedup_threshold <= 1.0)
        {
            return Err(SlideError::Config(format!(
                "dedup threshold {} outside (0, 1]",
                self.dedup_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.face_confidence) {
            return Err(SlideError::Config(format!(
                "face confidence {} outside [0, 1]",
                self.face_confidence
            )));
        }
        if self.filter_faces {
            match (&self.face_proto, &self.face_model) {
                (Some(proto), Some(model)) if proto.exists() && model.exists() => {}
                (Some(proto), Some(model)) => {
                    return Err(SlideError::Config(format!(
                        "face model files not found: {} / {}",
                        proto.display(),
                        model.display()
                    )))
                }
                _ => {
                    return Err(SlideError::Config(
                        "--filter-faces needs --face-proto and --face-model".to_string(),
                    ))
                }
            }
        }
        if self.require_text && self.tesseract_cmd.is_empty() {
            return Err(SlideError::Config("empty tesseract command".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct RunSummary {
    pub frames_examined: u64,
    pub candidates: u64,
    pub dropped_face: u64,
    pub dropped_no_text: u64,
    pub dropped_duplicate_hash: u64,
    pub slides_saved: u64,
    pub duplicates_removed: u64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Frames examined:    {}", self.frames_examined)?;
        writeln!(f, "Candidates:         {}", self.candidates)?;
        if self.dropped_face > 0 || self.dropped_no_text > 0 {
            writeln!(f, "Dropped (face):     {}", self.dropped_face)?;
            writeln!(f, "Dropped (no text):  {}", self.dropped_no_text)?;
        }
        if self.dropped_duplicate_hash > 0 {
            writeln!(f, "Dropped (hash):     {}", self.dropped_duplicate_hash)?;
        }
        writeln!(f, "Slides saved:       {}", self.slides_saved)?;
        write!(f, "Duplicates removed: {}", self.duplicates_removed)
    }
}

pub struct Pipeline {
    options: PipelineOptions,
    filter: ContentFilter,
    registry: HashRegistry,
    saved: Vec<SavedSlide>,
    summary: RunSummary,
}

impl Pipeline {
    /// Build the pipeline with its production engines (OpenCV DNN face
    /// detector, external tesseract).
    pub fn new(options: PipelineOptions) -> Result<Self> {
        options.validate()?;

        let face: Option<Box<dyn FaceDetector>> = if options.filter_faces {
            match (&options.face_proto, &options.face_model) {
                (Some(proto), Some(model)) => {
                    Some(Box::new(DnnFaceDetector::from_caffe(proto, model)?))
                }
                // validate() already rejected this.
                _ => None,
            }
        } else {
            None
        };
        let ocr: Option<Box<dyn TextRecognizer>> = if options.require_text {
            Some(Box::new(TesseractOcr::new(options.tesseract_cmd.clone())))
        } else {
            None
        };

        let filter = ContentFilter::new(face, ocr, options.face_confidence, options.min_text_length);
        Ok(Self::assemble(options, filter))
    }

    /// Same pipeline with caller-supplied filter engines (tests use mocks).
    pub fn with_filter(options: PipelineOptions, filter: ContentFilter) -> Result<Self> {
        options.validate()?;
        Ok(Self::assemble(options, filter))
    }

    fn assemble(options: PipelineOptions, filter: ContentFilter) -> Self {
        Self {
            options,
            filter,
            registry: HashRegistry::new(),
            saved: Vec::new(),
            summary: RunSummary::default(),
        }
    }

    /// decode -> detect -> filter -> persist-if-hash-unseen -> post-pass.
    pub fn run(&mut self, cancel: &AtomicBool) -> Result<RunSummary> {
        if let Ok(json) = serde_json::to_string(&self.options) {
            logger::debug(&format!("pipeline options: {}", json));
        }

        std::fs::create_dir_all(&self.options.output_dir).map_err(|e| {
            SlideError::Config(format!(
                "cannot create output directory {}: {}",
                self.options.output_dir.display(),
                e
            ))
        })?;

        let mut decoder = VideoDecoder::open(&self.options.input)?;
        let mut detector =
            SceneChangeDetector::new(self.options.change_threshold, self.options.min_distance);

        while let Some(frame) = decoder.read_frame()? {
            if cancel.load(Ordering::Relaxed) {
                logger::info("extraction cancelled, already-saved slides are kept");
                break;
            }
            if let Some(candidate) = detector.observe(frame) {
                self.process_candidate(candidate)?;
            }
        }
        self.summary.frames_examined = detector.frames_examined();

        if self.options.dedup_metric.needs_post_pass() {
            let report = dedup::deduplicate_dir(
                &self.options.output_dir,
                self.options.dedup_metric,
                self.options.dedup_threshold,
                cancel,
            )?;
            self.summary.duplicates_removed = report.removed as u64;
        }

        for slide in &self.saved {
            logger::debug(&format!(
                "slide {}: {} (phash {:?})",
                slide.seq,
                slide.path.display(),
                slide.phash
            ));
        }
        logger::info(&format!(
            "run finished: {} slides kept out of {} frames",
            self.summary.slides_saved.saturating_sub(self.summary.duplicates_removed),
            self.summary.frames_examined
        ));
        Ok(self.summary.clone())
    }

    fn process_candidate(&mut self, candidate: CandidateEvent) -> Result<()> {
        self.summary.candidates += 1;

        match self.filter.evaluate(&candidate.frame.color)? {
            FilterVerdict::DropFace(confidence) => {
                logger::debug(&format!(
                    "frame {}: dropped, face at confidence {:.2}",
                    candidate.index, confidence
                ));
                self.summary.dropped_face += 1;
                return Ok(());
            }
            FilterVerdict::DropNoText(len) => {
                logger::debug(&format!(
                    "frame {}: dropped, only {} chars of text",
                    candidate.index, len
                ));
                self.summary.dropped_no_text += 1;
                return Ok(());
            }
            FilterVerdict::Keep => {}
        }

        // Incremental dedup: a frame whose hash was already seen is never
        // written at all.
        let mut hash = None;
        if self.options.dedup_metric == DedupMetric::Phash {
            let h = metrics::phash(
                &candidate.frame.gray,
                candidate.frame.width,
                candidate.frame.height,
            )
            .map_err(|e| SlideError::Source(format!("phash of frame {}: {}", candidate.index, e)))?;
            if !self.registry.insert(h) {
                logger::debug(&format!(
                    "frame {}: dropped, perceptual hash already seen",
                    candidate.index
                ));
                self.summary.dropped_duplicate_hash += 1;
                return Ok(());
            }
            hash = Some(h);
        }

        let seq = self.saved.len();
        let path = self.options.output_dir.join(format!(
            "{}{}.{}",
            constants::SLIDE_FILE_PREFIX,
            seq,
            constants::SLIDE_FILE_EXT
        ));
        let path_str = path.to_string_lossy().to_string();
        let written = imgcodecs::imwrite(&path_str, &candidate.frame.color, &Vector::new())
            .map_err(|e| SlideError::io(&path, format!("imwrite: {}", e)))?;
        if !written {
            return Err(SlideError::io(&path, "image encoder refused the frame"));
        }

        logger::info(&format!("saved {} (frame {})", path_str, candidate.index));
        self.saved.push(SavedSlide {
            seq,
            path,
            phash: hash,
        });
        self.summary.slides_saved += 1;
        Ok(())
    }
}

/// Run a full extraction with production engines.
pub fn run(options: PipelineOptions, cancel: &AtomicBool) -> Result<RunSummary> {
    Pipeline::new(options)?.run(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Frame;
    use crate::filters::{FaceDetector, TextRecognizer};
    use opencv::core::{Mat, Vec3b};
    use opencv::prelude::*;
    use std::fs::create_dir_all;

    struct FixedFace(f32);
    impl FaceDetector for FixedFace {
        fn detect_confidence(&mut self, _frame: &Mat) -> crate::shared::error::Result<f32> {
            Ok(self.0)
        }
    }

    struct FixedText(&'static str);
    impl TextRecognizer for FixedText {
        fn recognize(&mut self, _frame: &Mat) -> crate::shared::error::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn fresh_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        create_dir_all(&dir).unwrap();
        dir
    }

    fn options_for(dir: &PathBuf) -> PipelineOptions {
        PipelineOptions {
            input: "test.mp4".to_string(),
            output_dir: dir.clone(),
            ..PipelineOptions::default()
        }
    }

    fn candidate(index: u64, fill: u8) -> CandidateEvent {
        let width = 40usize;
        let height = 30usize;
        let pixels = vec![Vec3b::from([fill, fill, fill]); width * height];
        let color = Mat::new_rows_cols_with_data::<Vec3b>(height as i32, width as i32, &pixels)
            .unwrap()
            .try_clone()
            .unwrap();
        CandidateEvent {
            index,
            frame: Frame {
                index,
                color,
                gray: vec![fill; width * height],
                width: width as u32,
                height: height as u32,
            },
        }
    }

    fn count_slides(dir: &PathBuf) -> usize {
        crate::utils::file_utils::list_images(dir).unwrap().len()
    }

    #[test]
    fn test_face_candidate_dropped_not_persisted() {
        let dir = fresh_dir("slidegrab_test_pipe_face");
        let filter = ContentFilter::new(Some(Box::new(FixedFace(0.9))), None, 0.6, 6);
        let mut pipe = Pipeline::with_filter(options_for(&dir), filter).unwrap();

        pipe.process_candidate(candidate(31, 100)).unwrap();
        assert_eq!(pipe.summary.dropped_face, 1);
        assert_eq!(pipe.summary.slides_saved, 0);
        assert_eq!(count_slides(&dir), 0);

        // The pipeline keeps going: a later face-free candidate still lands.
        pipe.filter = ContentFilter::new(Some(Box::new(FixedFace(0.1))), None, 0.6, 6);
        pipe.process_candidate(candidate(70, 180)).unwrap();
        assert_eq!(pipe.summary.slides_saved, 1);
        assert_eq!(count_slides(&dir), 1);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_short_ocr_text_dropped() {
        let dir = fresh_dir("slidegrab_test_pipe_text");
        let filter = ContentFilter::new(None, Some(Box::new(FixedText("abc"))), 0.6, 6);
        let mut pipe = Pipeline::with_filter(options_for(&dir), filter).unwrap();

        pipe.process_candidate(candidate(31, 100)).unwrap();
        assert_eq!(pipe.summary.dropped_no_text, 1);
        assert_eq!(count_slides(&dir), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_identical_hash_saved_once() {
        let dir = fresh_dir("slidegrab_test_pipe_hash");
        let filter = ContentFilter::new(None, None, 0.6, 6);
        let mut pipe = Pipeline::with_filter(options_for(&dir), filter).unwrap();

        pipe.process_candidate(candidate(31, 77)).unwrap();
        pipe.process_candidate(candidate(70, 77)).unwrap();
        assert_eq!(pipe.summary.slides_saved, 1);
        assert_eq!(pipe.summary.dropped_duplicate_hash, 1);
        assert_eq!(count_slides(&dir), 1);
        assert!(dir.join("slide_0.jpg").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unopenable_video_is_source_error_with_no_output() {
        let dir = fresh_dir("slidegrab_test_pipe_source_err");
        let mut options = options_for(&dir);
        options.input = dir
            .join("definitely_not_a_video.mp4")
            .to_string_lossy()
            .to_string();

        let cancel = AtomicBool::new(false);
        let err = run(options, &cancel).unwrap_err();
        assert!(matches!(err, SlideError::Source(_)), "got {:?}", err);
        assert_eq!(count_slides(&dir), 0);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_validation_rejects_bad_options() {
        let dir = fresh_dir("slidegrab_test_pipe_validate");

        let mut options = options_for(&dir);
        options.min_distance = 0;
        assert!(matches!(options.validate(), Err(SlideError::Config(_))));

        let mut options = options_for(&dir);
        options.dedup_metric = DedupMetric::Ssim;
        options.dedup_threshold = 1.5;
        assert!(matches!(options.validate(), Err(SlideError::Config(_))));

        let mut options = options_for(&dir);
        options.filter_faces = true;
        assert!(matches!(options.validate(), Err(SlideError::Config(_))));

        assert!(options_for(&dir).validate().is_ok());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
