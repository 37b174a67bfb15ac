pub mod face;
pub mod ocr;

use opencv::core::Mat;

pub use face::DnnFaceDetector;
pub use ocr::TesseractOcr;

use crate::shared::error::Result;

/// External face-detection engine. Returns the best detection confidence in
/// [0, 1], or 0.0 when nothing was detected. Errors abort the run; they are
/// never interpreted as "no face".
pub trait FaceDetector {
    fn detect_confidence(&mut self, frame: &Mat) -> Result<f32>;
}

/// External OCR engine. Returns whatever text it could extract (possibly
/// empty). Errors abort the run; they are never interpreted as "no text".
pub trait TextRecognizer {
    fn recognize(&mut self, frame: &Mat) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterVerdict {
    Keep,
    /// A face was detected at this confidence.
    DropFace(f32),
    /// Extracted text was shorter than the minimum (trimmed length given).
    DropNoText(usize),
}

/// Optional candidate filters, composed with short-circuit semantics: a
/// candidate is dropped if it contains a face, then dropped if it does not
/// contain enough recognizable text. Zero, one, or both stages may be active.
pub struct ContentFilter {
    face: Option<Box<dyn FaceDetector>>,
    ocr: Option<Box<dyn TextRecognizer>>,
    face_confidence: f32,
    min_text_length: usize,
}

impl ContentFilter {
    pub fn new(
        face: Option<Box<dyn FaceDetector>>,
        ocr: Option<Box<dyn TextRecognizer>>,
        face_confidence: f32,
        min_text_length: usize,
    ) -> Self {
        Self {
            face,
            ocr,
            face_confidence,
            min_text_length,
        }
    }

    pub fn is_active(&self) -> bool {
        self.face.is_some() || self.ocr.is_some()
    }

    pub fn evaluate(&mut self, frame: &Mat) -> Result<FilterVerdict> {
        if let Some(detector) = self.face.as_mut() {
            let confidence = detector.detect_confidence(frame)?;
            if confidence > self.face_confidence {
                return Ok(FilterVerdict::DropFace(confidence));
            }
        }

        if let Some(engine) = self.ocr.as_mut() {
            let text = engine.recognize(frame)?;
            let len = text.trim().chars().count();
            if len < self.min_text_length {
                return Ok(FilterVerdict::DropNoText(len));
            }
        }

        Ok(FilterVerdict::Keep)
    }
}
