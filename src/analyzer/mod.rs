pub mod metrics;

use crate::decoder::Frame;

/// A frame the detector judged visually distinct from its predecessor.
pub struct CandidateEvent {
    pub index: u64,
    pub frame: Frame,
}

/// Streaming scene-change detector.
///
/// Push one frame at a time with [`observe`]; a `CandidateEvent` comes back
/// when the summed grayscale difference against the previous frame exceeds
/// `threshold` and at least `min_distance` frames have passed since the last
/// emission. The very first frame has no predecessor and is never emitted.
///
/// State is local to one run: the previous grayscale buffer and the index of
/// the last emitted candidate, seeded at `-min_distance` so the first
/// qualifying frame can fire immediately.
///
/// [`observe`]: SceneChangeDetector::observe
pub struct SceneChangeDetector {
    threshold: u64,
    min_distance: u64,
    prev_gray: Option<Vec<u8>>,
    last_emitted: i64,
    frames_examined: u64,
}

impl SceneChangeDetector {
    pub fn new(threshold: u64, min_distance: u64) -> Self {
        Self {
            threshold,
            min_distance,
            prev_gray: None,
            last_emitted: -(min_distance as i64),
            frames_examined: 0,
        }
    }

    pub fn frames_examined(&self) -> u64 {
        self.frames_examined
    }

    pub fn observe(&mut self, frame: Frame) -> Option<CandidateEvent> {
        self.frames_examined += 1;

        let emit = match &self.prev_gray {
            Some(prev) if prev.len() == frame.gray.len() => {
                let diff = metrics::pixel_diff_sum(prev, &frame.gray);
                diff > self.threshold
                    && frame.index as i64 - self.last_emitted > self.min_distance as i64
            }
            _ => false,
        };

        // The previous-frame buffer rolls forward regardless of emission.
        if emit {
            self.last_emitted = frame.index as i64;
            self.prev_gray = Some(frame.gray.clone());
            Some(CandidateEvent {
                index: frame.index,
                frame,
            })
        } else {
            self.prev_gray = Some(frame.gray);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::Mat;

    fn gray_frame(index: u64, fill: u8) -> Frame {
        Frame {
            index,
            color: Mat::default(),
            gray: vec![fill; 64 * 64],
            width: 64,
            height: 64,
        }
    }

    #[test]
    fn test_first_frame_never_emitted() {
        let mut det = SceneChangeDetector::new(0, 0);
        assert!(det.observe(gray_frame(0, 255)).is_none());
        assert_eq!(det.frames_examined(), 1);
    }

    #[test]
    fn test_alternating_sequence_emits_every_other_frame() {
        // Scenario: 10 frames alternating between two images whose difference
        // sum is far above threshold; min distance 1 yields emissions at the
        // odd indices only.
        let mut det = SceneChangeDetector::new(100_000, 1);
        let mut emitted = Vec::new();
        for i in 0..10u64 {
            let fill = if i % 2 == 0 { 0 } else { 200 };
            if let Some(c) = det.observe(gray_frame(i, fill)) {
                emitted.push(c.index);
            }
        }
        assert_eq!(emitted, vec![1, 3, 5, 7, 9]);
        assert_eq!(det.frames_examined(), 10);
    }

    #[test]
    fn test_consecutive_candidates_respect_min_distance() {
        let mut det = SceneChangeDetector::new(1_000, 5);
        let mut emitted = Vec::new();
        for i in 0..60u64 {
            let fill = if i % 2 == 0 { 0 } else { 200 };
            if let Some(c) = det.observe(gray_frame(i, fill)) {
                emitted.push(c.index as i64);
            }
        }
        assert!(!emitted.is_empty());
        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] > 5, "spacing violated: {:?}", pair);
        }
    }

    #[test]
    fn test_static_sequence_emits_nothing() {
        let mut det = SceneChangeDetector::new(100, 1);
        for i in 0..20u64 {
            assert!(det.observe(gray_frame(i, 42)).is_none());
        }
    }

    #[test]
    fn test_below_threshold_change_not_emitted() {
        let mut det = SceneChangeDetector::new(u64::MAX, 0);
        assert!(det.observe(gray_frame(0, 0)).is_none());
        assert!(det.observe(gray_frame(1, 255)).is_none());
    }
}
