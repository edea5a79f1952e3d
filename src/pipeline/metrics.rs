// src/pipeline/metrics.rs
//
// Session counters. Cloning shares the same atomics, so a handle can be
// read from another thread while frames are processed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct CountingMetrics {
    pub total_frames: Arc<AtomicU64>,
    pub empty_frames: Arc<AtomicU64>,
    pub detections: Arc<AtomicU64>,
    pub filtered_detections: Arc<AtomicU64>,
    pub skipped_detections: Arc<AtomicU64>,
    pub entries: Arc<AtomicU64>,
    pub exits: Arc<AtomicU64>,
    pub evictions: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self {
            total_frames: Arc::new(AtomicU64::new(0)),
            empty_frames: Arc::new(AtomicU64::new(0)),
            detections: Arc::new(AtomicU64::new(0)),
            filtered_detections: Arc::new(AtomicU64::new(0)),
            skipped_detections: Arc::new(AtomicU64::new(0)),
            entries: Arc::new(AtomicU64::new(0)),
            exits: Arc::new(AtomicU64::new(0)),
            evictions: Arc::new(AtomicU64::new(0)),
            sink_failures: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn fps(&self) -> f64 {
        let frames = self.total_frames.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            frames as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_frames: self.total_frames.load(Ordering::Relaxed),
            empty_frames: self.empty_frames.load(Ordering::Relaxed),
            detections: self.detections.load(Ordering::Relaxed),
            filtered_detections: self.filtered_detections.load(Ordering::Relaxed),
            skipped_detections: self.skipped_detections.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            exits: self.exits.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            sink_failures: self.sink_failures.load(Ordering::Relaxed),
            fps: self.fps(),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for CountingMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub empty_frames: u64,
    pub detections: u64,
    pub filtered_detections: u64,
    pub skipped_detections: u64,
    pub entries: u64,
    pub exits: u64,
    pub evictions: u64,
    pub sink_failures: u64,
    pub fps: f64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = CountingMetrics::new();
        let handle = metrics.clone();
        metrics.inc(&metrics.entries);
        metrics.add(&metrics.detections, 5);
        let summary = handle.summary();
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.detections, 5);
        assert_eq!(summary.exits, 0);
    }
}
