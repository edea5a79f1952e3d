// src/pipeline/frame_context.rs
//
// The detections every zone sees for one frame. Built once per frame so all
// counters read the same filtered set under the same frame index.

use crate::types::{FrameTracks, TrackedDetection};

#[derive(Debug, Clone)]
pub struct FrameContext {
    pub frame_index: u64,
    pub detections: Vec<TrackedDetection>,
    /// Detections dropped by the class filter
    pub filtered_out: usize,
}

impl FrameContext {
    /// `fallback_index` is used when the tracker did not number the frame.
    /// An empty `classes` slice keeps every class.
    pub fn new(frame: &FrameTracks, fallback_index: u64, classes: &[i64]) -> Self {
        let frame_index = frame.frame_index.unwrap_or(fallback_index);
        let detections: Vec<TrackedDetection> = frame
            .detections
            .iter()
            .filter(|d| classes.is_empty() || classes.contains(&d.class_id))
            .copied()
            .collect();
        let filtered_out = frame.detections.len() - detections.len();
        Self {
            frame_index,
            detections,
            filtered_out,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn det(id: i64, class_id: i64) -> TrackedDetection {
        TrackedDetection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), id, class_id)
    }

    #[test]
    fn test_class_filter() {
        let frame = FrameTracks {
            frame_index: Some(42),
            detections: vec![det(1, 0), det(2, 2), det(3, 0)],
        };
        let ctx = FrameContext::new(&frame, 0, &[0]);
        assert_eq!(ctx.frame_index, 42);
        assert_eq!(ctx.detections.len(), 2);
        assert_eq!(ctx.filtered_out, 1);

        let all = FrameContext::new(&frame, 0, &[]);
        assert_eq!(all.detections.len(), 3);
        assert_eq!(all.filtered_out, 0);
    }

    #[test]
    fn test_fallback_index() {
        let frame = FrameTracks::default();
        let ctx = FrameContext::new(&frame, 17, &[0]);
        assert_eq!(ctx.frame_index, 17);
        assert!(ctx.is_empty());
    }
}
