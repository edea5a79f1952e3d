// src/sinks/overlay.rs
//
// Diagnostic overlays. The counters never read these back.

use crate::counting::ZoneCounter;
use crate::geometry::Segment;
use crate::types::{BoundingBox, Point, TrackedDetection};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

pub type Color = [u8; 3];

pub const REGION_COLOR: Color = [255, 0, 255];
pub const ENTRY_EDGE_COLOR: Color = [0, 200, 0];
pub const EXIT_EDGE_COLOR: Color = [230, 40, 40];
pub const LABEL_COLOR: Color = [36, 255, 12];
pub const BOX_COLOR: Color = [255, 200, 0];
pub const BOX_INSIDE_COLOR: Color = [0, 255, 255];

#[derive(Debug, Clone, PartialEq)]
pub enum OverlayPrimitive {
    Polygon {
        points: Vec<Point>,
        color: Color,
    },
    Edge {
        segment: Segment,
        color: Color,
    },
    Trail {
        identity: i64,
        points: Vec<Point>,
        color: Color,
    },
    Box {
        identity: i64,
        bbox: BoundingBox,
        color: Color,
    },
    Label {
        text: String,
        anchor: Point,
        color: Color,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub frame_index: u64,
    pub primitives: Vec<OverlayPrimitive>,
}

pub trait OverlaySink {
    fn render(&mut self, frame: &OverlayFrame) -> Result<()>;
}

/// Trail colour by how full the history is: violet when short, red once it
/// reaches `track_length`.
pub fn trail_color(len: usize, track_length: usize) -> Color {
    let ratio = if track_length == 0 {
        1.0
    } else {
        (len as f32 / track_length as f32).clamp(0.0, 1.0)
    };
    [(255.0 * ratio) as u8, 0, (255.0 * (1.0 - ratio)) as u8]
}

/// Overlay for one zone: polygon, both edges, its counters, and box + trail
/// for each identity present this frame. Boxes whose foot point lies inside
/// the zone are highlighted. `slot` stacks the counter labels of successive
/// zones.
pub fn zone_overlay(
    counter: &ZoneCounter,
    detections: &[TrackedDetection],
    draw_tracks: bool,
    slot: usize,
) -> Vec<OverlayPrimitive> {
    let zone = counter.zone();
    let mut out = vec![
        OverlayPrimitive::Polygon {
            points: zone.points().to_vec(),
            color: REGION_COLOR,
        },
        OverlayPrimitive::Edge {
            segment: *zone.entry_edge(),
            color: ENTRY_EDGE_COLOR,
        },
        OverlayPrimitive::Edge {
            segment: *zone.exit_edge(),
            color: EXIT_EDGE_COLOR,
        },
    ];

    let y = 50.0 + slot as f32 * 100.0;
    out.push(OverlayPrimitive::Label {
        text: format!("Entry {} Count: {}", counter.zone_id(), counter.entry_count()),
        anchor: Point::new(50.0, y),
        color: LABEL_COLOR,
    });
    out.push(OverlayPrimitive::Label {
        text: format!("Exit {} Count: {}", counter.zone_id(), counter.exit_count()),
        anchor: Point::new(50.0, y + 50.0),
        color: LABEL_COLOR,
    });

    let track_length = counter.config().track_length;
    for det in detections {
        let Some(state) = counter.track(det.identity) else {
            continue;
        };
        let color = if zone.contains(det.bbox.foot_point()) {
            BOX_INSIDE_COLOR
        } else {
            BOX_COLOR
        };
        out.push(OverlayPrimitive::Box {
            identity: det.identity,
            bbox: det.bbox,
            color,
        });
        if draw_tracks && !state.history().is_empty() {
            out.push(OverlayPrimitive::Trail {
                identity: det.identity,
                points: state.history().iter().copied().collect(),
                color: trail_color(state.history().len(), track_length),
            });
        }
    }
    out
}

/// Frame index label in the bottom-right corner.
pub fn frame_label(frame_index: u64, width: u32, height: u32) -> OverlayPrimitive {
    OverlayPrimitive::Label {
        text: format!("Frame: {}", frame_index),
        anchor: Point::new(width as f32 - 300.0, height as f32 - 50.0),
        color: LABEL_COLOR,
    }
}

/// Keeps the most recent overlay frames in memory.
pub struct OverlayRecorder {
    frames: VecDeque<OverlayFrame>,
    capacity: usize,
}

impl OverlayRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn frames(&self) -> impl Iterator<Item = &OverlayFrame> {
        self.frames.iter()
    }
}

impl OverlaySink for OverlayRecorder {
    fn render(&mut self, frame: &OverlayFrame) -> Result<()> {
        if self.frames.len() >= self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame.clone());
        Ok(())
    }
}

/// Rasterizes overlays onto a blank canvas and writes every Nth frame as a
/// PNG. Labels need a font and are only logged.
pub struct CanvasRenderer {
    width: u32,
    height: u32,
    out_dir: PathBuf,
    every: u64,
}

impl CanvasRenderer {
    pub fn new(width: u32, height: u32, out_dir: impl Into<PathBuf>, every: u64) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create overlay dir {}", out_dir.display()))?;
        Ok(Self {
            width,
            height,
            out_dir,
            every: every.max(1),
        })
    }

    pub fn draw(&self, frame: &OverlayFrame) -> RgbImage {
        let mut canvas = RgbImage::new(self.width, self.height);
        for primitive in &frame.primitives {
            match primitive {
                OverlayPrimitive::Polygon { points, color } => {
                    draw_closed_path(&mut canvas, points, *color);
                }
                OverlayPrimitive::Edge { segment, color } => {
                    draw_segment(&mut canvas, segment.start, segment.end, *color);
                }
                OverlayPrimitive::Trail { points, color, .. } => {
                    for pair in points.windows(2) {
                        draw_segment(&mut canvas, pair[0], pair[1], *color);
                    }
                }
                OverlayPrimitive::Box { bbox, color, .. } => {
                    let corners = [
                        Point::new(bbox.x1, bbox.y1),
                        Point::new(bbox.x2, bbox.y1),
                        Point::new(bbox.x2, bbox.y2),
                        Point::new(bbox.x1, bbox.y2),
                    ];
                    draw_closed_path(&mut canvas, &corners, *color);
                }
                OverlayPrimitive::Label { text, .. } => {
                    debug!("frame {} label: {}", frame.frame_index, text);
                }
            }
        }
        canvas
    }
}

impl OverlaySink for CanvasRenderer {
    fn render(&mut self, frame: &OverlayFrame) -> Result<()> {
        if frame.frame_index % self.every != 0 {
            return Ok(());
        }
        let canvas = self.draw(frame);
        let path = self
            .out_dir
            .join(format!("frame_{:06}.png", frame.frame_index));
        canvas
            .save(&path)
            .with_context(|| format!("Failed to write overlay {}", path.display()))?;
        Ok(())
    }
}

fn draw_segment(canvas: &mut RgbImage, a: Point, b: Point, color: Color) {
    draw_line_segment_mut(canvas, (a.x, a.y), (b.x, b.y), Rgb(color));
}

fn draw_closed_path(canvas: &mut RgbImage, points: &[Point], color: Color) {
    if points.len() < 2 {
        return;
    }
    for pair in points.windows(2) {
        draw_segment(canvas, pair[0], pair[1], color);
    }
    draw_segment(canvas, points[points.len() - 1], points[0], color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::CounterConfig;
    use crate::zone::Zone;

    fn counter() -> ZoneCounter {
        let zone = Zone::inset_rect(200.0, 100.0, 10.0).unwrap();
        ZoneCounter::new(
            2,
            "Lobby",
            zone,
            CounterConfig {
                track_length: 4,
                backtrack_length: 2,
                max_idle_frames: None,
            },
        )
    }

    fn det(id: i64, x: f32) -> TrackedDetection {
        TrackedDetection::new(BoundingBox::new(x, 20.0, x + 10.0, 60.0), id, 0)
    }

    #[test]
    fn test_trail_color_gradient() {
        assert_eq!(trail_color(0, 30), [0, 0, 255]);
        assert_eq!(trail_color(30, 30), [255, 0, 0]);
        assert_eq!(trail_color(60, 30), [255, 0, 0]);
    }

    #[test]
    fn test_zone_overlay_contents() {
        let mut c = counter();
        let dets = [det(1, 50.0), det(2, 80.0)];
        c.update(&dets, 0);
        c.update(&dets, 1);

        let prims = zone_overlay(&c, &dets, true, 1);
        let trails = prims
            .iter()
            .filter(|p| matches!(p, OverlayPrimitive::Trail { .. }))
            .count();
        let boxes = prims
            .iter()
            .filter(|p| matches!(p, OverlayPrimitive::Box { .. }))
            .count();
        assert_eq!(trails, 2);
        assert_eq!(boxes, 2);
        assert!(prims.iter().any(|p| matches!(
            p,
            OverlayPrimitive::Label { text, anchor, .. }
                if text == "Entry 2 Count: 0" && anchor.y == 150.0
        )));

        let no_trails = zone_overlay(&c, &dets, false, 0);
        assert!(!no_trails
            .iter()
            .any(|p| matches!(p, OverlayPrimitive::Trail { .. })));
    }

    #[test]
    fn test_boxes_inside_zone_are_highlighted() {
        let mut c = counter();
        // Zone spans (20,10)-(180,90); feet at (55,60) and (195,60)
        let dets = [det(1, 50.0), det(2, 190.0)];
        c.update(&dets, 0);

        let colors: Vec<(i64, Color)> = zone_overlay(&c, &dets, false, 0)
            .into_iter()
            .filter_map(|p| match p {
                OverlayPrimitive::Box {
                    identity, color, ..
                } => Some((identity, color)),
                _ => None,
            })
            .collect();
        assert_eq!(colors, vec![(1, BOX_INSIDE_COLOR), (2, BOX_COLOR)]);
    }

    #[test]
    fn test_recorder_keeps_latest_frames() {
        let mut rec = OverlayRecorder::new(2);
        for i in 0..5 {
            rec.render(&OverlayFrame {
                frame_index: i,
                primitives: vec![frame_label(i, 640, 480)],
            })
            .unwrap();
        }
        let kept: Vec<u64> = rec.frames().map(|f| f.frame_index).collect();
        assert_eq!(kept, vec![3, 4]);
    }

    #[test]
    fn test_canvas_draws_zone_outline() {
        let renderer = CanvasRenderer {
            width: 200,
            height: 100,
            out_dir: PathBuf::from("."),
            every: 1,
        };
        let c = counter();
        let frame = OverlayFrame {
            frame_index: 0,
            primitives: zone_overlay(&c, &[], true, 0),
        };
        let canvas = renderer.draw(&frame);
        assert_eq!(canvas.dimensions(), (200, 100));
        // Top edge of the inset rectangle runs along y = 10
        assert_eq!(canvas.get_pixel(100, 10), &Rgb(EXIT_EDGE_COLOR));
        assert_eq!(canvas.get_pixel(100, 50), &Rgb([0, 0, 0]));
    }
}
