use opencv::{core, dnn, prelude::*};
use std::path::Path;

use super::FaceDetector;
use crate::shared::error::{Result, SlideError};

/// Face detection over an OpenCV DNN SSD model (the res10 Caffe face
/// detector). The network files are external collaborators: both paths are
/// configuration inputs, nothing is bundled.
pub struct DnnFaceDetector {
    net: dnn::Net,
}

impl DnnFaceDetector {
    pub fn from_caffe(proto: &Path, model: &Path) -> Result<Self> {
        let proto_str = proto.to_string_lossy();
        let model_str = model.to_string_lossy();
        let net = dnn::read_net_from_caffe(&proto_str, &model_str).map_err(|e| {
            SlideError::Config(format!(
                "cannot load face model ({} / {}): {}",
                proto_str, model_str, e
            ))
        })?;
        Ok(Self { net })
    }

    fn engine_err(e: opencv::Error) -> SlideError {
        SlideError::Engine(format!("face detector: {}", e))
    }
}

impl FaceDetector for DnnFaceDetector {
    fn detect_confidence(&mut self, frame: &Mat) -> Result<f32> {
        // Standard res10 preprocessing: 300x300 input, BGR mean subtraction.
        let blob = dnn::blob_from_image(
            frame,
            1.0,
            core::Size::new(300, 300),
            core::Scalar::new(104.0, 177.0, 123.0, 0.0),
            false,
            false,
            core::CV_32F,
        )
        .map_err(Self::engine_err)?;

        self.net
            .set_input(&blob, "", 1.0, core::Scalar::default())
            .map_err(Self::engine_err)?;
        let out = self.net.forward_single("").map_err(Self::engine_err)?;

        // Output blob is [1, 1, N, 7]; column 2 of each row is the confidence.
        let total = out.total();
        if total == 0 || total % 7 != 0 {
            return Ok(0.0);
        }
        let rows = (total / 7) as i32;
        let detections = out.reshape(1, rows).map_err(Self::engine_err)?;

        let mut best = 0.0f32;
        for i in 0..rows {
            let confidence = *detections
                .at_2d::<f32>(i, 2)
                .map_err(Self::engine_err)?;
            if confidence > best {
                best = confidence;
            }
        }
        Ok(best)
    }
}
