use opencv::{imgproc, prelude::*, videoio};

use super::frame_data::Frame;
use crate::shared::error::{Result, SlideError};

/// BGR -> single-channel grayscale.
pub fn bgr_to_gray(src: &Mat) -> opencv::Result<Mat> {
    let mut gray = Mat::default();
    #[cfg(target_os = "macos")]
    imgproc::cvt_color(
        src,
        &mut gray,
        imgproc::COLOR_BGR2GRAY,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )?;

    #[cfg(not(target_os = "macos"))]
    imgproc::cvt_color(src, &mut gray, imgproc::COLOR_BGR2GRAY, 0)?;

    Ok(gray)
}

/// Sequential pull decoder over `opencv::videoio::VideoCapture`.
///
/// One forward pass only: no seeking, not restartable. Each `read_frame`
/// advances the underlying decoder position.
pub struct VideoDecoder {
    capture: videoio::VideoCapture,
    next_index: u64,
}

impl VideoDecoder {
    pub fn open(path: &str) -> Result<Self> {
        // CAP_ANY lets OpenCV choose the platform backend
        // (AVFoundation / Media Foundation / V4L2-GStreamer).
        let capture = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)
            .map_err(|e| SlideError::Source(format!("{}: {}", path, e)))?;

        let opened = capture
            .is_opened()
            .map_err(|e| SlideError::Source(format!("{}: {}", path, e)))?;
        if !opened {
            return Err(SlideError::Source(format!(
                "failed to open video file: {}",
                path
            )));
        }

        let fps = capture.get(videoio::CAP_PROP_FPS).unwrap_or(0.0);
        let width = capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .unwrap_or(0.0) as u32;
        let height = capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .unwrap_or(0.0) as u32;

        crate::utils::logger::info(&format!(
            "opened video {} ({}x{} @ {:.2} fps)",
            path, width, height, fps
        ));

        Ok(Self {
            capture,
            next_index: 0,
        })
    }

    /// Decode the next frame, or `Ok(None)` at end of stream.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        let mut color = Mat::default();
        let got = self
            .capture
            .read(&mut color)
            .map_err(|e| SlideError::Source(format!("decode error: {}", e)))?;
        if !got || color.empty() {
            return Ok(None);
        }

        let gray_mat = bgr_to_gray(&color)
            .map_err(|e| SlideError::Source(format!("grayscale conversion: {}", e)))?;

        if !gray_mat.is_continuous() {
            return Err(SlideError::Source("frame is not continuous".to_string()));
        }
        let gray = gray_mat
            .data_bytes()
            .map_err(|e| SlideError::Source(format!("frame access: {}", e)))?
            .to_vec();

        let width = color.cols() as u32;
        let height = color.rows() as u32;

        let index = self.next_index;
        self.next_index += 1;

        Ok(Some(Frame {
            index,
            color,
            gray,
            width,
            height,
        }))
    }
}
