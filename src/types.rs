// src/types.rs

use serde::{Deserialize, Serialize};

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feed: FeedConfig,
    pub frame: FrameConfig,
    #[serde(default)]
    pub counting: CountingConfig,
    #[serde(default)]
    pub zones: Vec<ZoneConfig>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub camera_id: u32,
    pub feed_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CountingConfig {
    /// Maximum foot positions retained per identity
    pub track_length: usize,
    /// Trailing samples spanned by one crossing test
    pub backtrack_length: usize,
    /// Percent inset applied on each side for the default zone
    pub buffer_size: f32,
    /// Drop identities unseen for this many frames (None = never)
    pub max_idle_frames: Option<u64>,
    /// Tracker class ids to count; empty counts every class
    pub classes_to_count: Vec<i64>,
}

impl Default for CountingConfig {
    fn default() -> Self {
        Self {
            track_length: 30,
            backtrack_length: 10,
            buffer_size: 10.0,
            max_idle_frames: Some(900), // 30s at 30fps
            classes_to_count: vec![0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    /// Polygon in winding order; absent or empty selects the inset rectangle
    #[serde(default)]
    pub points: Option<Vec<[f32; 2]>>,
}

impl ZoneConfig {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Counter {}", self.id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub events_path: Option<String>,
    pub snapshot_path: Option<String>,
    /// Frames between snapshots; 0 writes only at end of input
    pub snapshot_every: u64,
    pub overlay_dir: Option<String>,
    pub overlay_every: u64,
    pub draw_tracks: bool,
    pub event_bus_capacity: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            events_path: None,
            snapshot_path: None,
            snapshot_every: 0,
            overlay_dir: None,
            overlay_every: 30,
            draw_tracks: true,
            event_bus_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn default_fps() -> f64 {
    30.0
}

// ============================================================================
// GEOMETRY & DETECTIONS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f32; 2]> for Point {
    fn from(p: [f32; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

impl From<(f32, f32)> for Point {
    fn from(p: (f32, f32)) -> Self {
        Self { x: p.0, y: p.1 }
    }
}

/// Axis-aligned box in source-frame pixels, `[x1, y1, x2, y2]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Ground contact proxy: horizontal midpoint of the bottom edge.
    pub fn foot_point(&self) -> Point {
        Point::new((self.x1 + self.x2) * 0.5, self.y2)
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Reason this box can't yield a foot point, if any.
    pub fn defect(&self) -> Option<BoxDefect> {
        if ![self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
        {
            Some(BoxDefect::NonFinite)
        } else if self.width() <= 0.0 || self.height() <= 0.0 {
            Some(BoxDefect::Degenerate)
        } else {
            None
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(b: [f32; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoxDefect {
    NonFinite,
    Degenerate,
}

impl BoxDefect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonFinite => "NON_FINITE",
            Self::Degenerate => "DEGENERATE",
        }
    }
}

/// One externally tracked object in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedDetection {
    pub bbox: BoundingBox,
    #[serde(rename = "id")]
    pub identity: i64,
    #[serde(rename = "class", default)]
    pub class_id: i64,
}

impl TrackedDetection {
    pub fn new(bbox: BoundingBox, identity: i64, class_id: i64) -> Self {
        Self {
            bbox,
            identity,
            class_id,
        }
    }
}

/// Tracker output for a single frame.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameTracks {
    /// Caller-supplied frame counter; never incremented by the engine
    #[serde(rename = "frame", default)]
    pub frame_index: Option<u64>,
    #[serde(default)]
    pub detections: Vec<TrackedDetection>,
}
