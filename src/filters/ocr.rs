use opencv::{core::Mat, core::Vector, imgcodecs};
use std::path::PathBuf;
use std::process::Command;

use super::TextRecognizer;
use crate::decoder::bgr_to_gray;
use crate::shared::error::{Result, SlideError};

/// OCR by shelling out to the external `tesseract` executable
/// (`tesseract <image> stdout`). The binary path is a configuration input.
///
/// Each call writes the frame as a grayscale PNG into the system temp dir,
/// runs tesseract on it, and removes the scratch file again.
pub struct TesseractOcr {
    cmd: String,
    scratch: PathBuf,
}

impl TesseractOcr {
    pub fn new(cmd: impl Into<String>) -> Self {
        let scratch =
            std::env::temp_dir().join(format!("slidegrab_ocr_{}.png", std::process::id()));
        Self {
            cmd: cmd.into(),
            scratch,
        }
    }

    fn engine_err(msg: impl std::fmt::Display) -> SlideError {
        SlideError::Engine(format!("tesseract: {}", msg))
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&mut self, frame: &Mat) -> Result<String> {
        // Tesseract does better on the luma plane than on raw BGR.
        let gray = bgr_to_gray(frame).map_err(Self::engine_err)?;

        let scratch_str = self.scratch.to_string_lossy().to_string();
        let written = imgcodecs::imwrite(&scratch_str, &gray, &Vector::new())
            .map_err(Self::engine_err)?;
        if !written {
            return Err(Self::engine_err(format!(
                "cannot write scratch image {}",
                scratch_str
            )));
        }

        let output = Command::new(&self.cmd)
            .arg(&scratch_str)
            .arg("stdout")
            .output()
            .map_err(|e| Self::engine_err(format!("failed to run '{}': {}", self.cmd, e)));

        let _ = std::fs::remove_file(&self.scratch);
        let output = output?;

        if !output.status.success() {
            return Err(Self::engine_err(format!(
                "exited with {} ({})",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
