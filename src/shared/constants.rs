pub const APP_NAME: &str = "slidegrab";

pub const ERROR_LOG_FILE: &str = "error.log";
pub const DEBUG_LOG_FILE: &str = "slidegrab.log";

pub const SLIDE_FILE_PREFIX: &str = "slide_";
pub const SLIDE_FILE_EXT: &str = "jpg";
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

// Scene-change detection. The difference sum runs over the full-resolution
// grayscale grid, so the threshold must be retuned per input resolution.
pub const DEFAULT_CHANGE_THRESHOLD: u64 = 100_000;
pub const DEFAULT_MIN_FRAME_DISTANCE: u64 = 30;

// Deduplication.
pub const DEFAULT_SSIM_THRESHOLD: f64 = 0.95;
pub const DEFAULT_HISTOGRAM_THRESHOLD: f64 = 0.90;
// SSIM requires equal-size inputs; both images are resized to this square.
pub const SSIM_COMPARE_SIZE: u32 = 300;
pub const HISTOGRAM_BINS_PER_CHANNEL: usize = 8;
pub const PHASH_RESIZE: u32 = 32;

// Content filters.
pub const DEFAULT_FACE_CONFIDENCE: f32 = 0.6;
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 6;
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";
