// src/zone.rs
//
// Counting zone: an ordered quadrilateral whose point order fixes which
// edges are used for crossing detection.
//
//   entry edge = points[2] -> points[3]
//   exit edge  = points[1] -> points[0]
//
// Reordering the configured points swaps or reverses the edges, and with
// them the sign convention of the directional test.

use crate::geometry::{self, Segment};
use crate::types::{FrameConfig, Point, ZoneConfig};
use anyhow::{bail, Result};
use tracing::info;

pub const ZONE_POINTS: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    points: [Point; ZONE_POINTS],
    entry_edge: Segment,
    exit_edge: Segment,
}

impl Zone {
    /// Build a zone from exactly four finite points in winding order.
    pub fn from_points(points: &[Point]) -> Result<Self> {
        if points.len() != ZONE_POINTS {
            bail!(
                "zone needs exactly {} points, got {}",
                ZONE_POINTS,
                points.len()
            );
        }
        if let Some(bad) = points.iter().find(|p| !p.is_finite()) {
            bail!("zone point ({}, {}) is not finite", bad.x, bad.y);
        }

        let points = [points[0], points[1], points[2], points[3]];
        let entry_edge = Segment::new(points[2], points[3]);
        let exit_edge = Segment::new(points[1], points[0]);

        if entry_edge.length() == 0.0 || exit_edge.length() == 0.0 {
            bail!("zone entry and exit edges must have non-zero length");
        }

        Ok(Self {
            points,
            entry_edge,
            exit_edge,
        })
    }

    /// Rectangle inset from the full frame by `buffer_pct` percent of the
    /// frame extent on every side.
    pub fn inset_rect(width: f32, height: f32, buffer_pct: f32) -> Result<Self> {
        let (x1, y1, x2, y2) = (0.0_f32, 0.0_f32, width, height);
        let dx = (x2 - x1) * buffer_pct / 100.0;
        let dy = (y2 - y1) * buffer_pct / 100.0;
        let (nx1, ny1, nx2, ny2) = (x1 + dx, y1 + dy, x2 - dx, y2 - dy);

        Self::from_points(&[
            Point::new(nx1, ny1),
            Point::new(nx2, ny1),
            Point::new(nx2, ny2),
            Point::new(nx1, ny2),
        ])
    }

    /// Explicit points when configured, otherwise the inset rectangle.
    /// A partial point list is an error, never a silent fallback.
    pub fn from_config(zone: &ZoneConfig, frame: &FrameConfig, buffer_pct: f32) -> Result<Self> {
        match zone.points.as_deref() {
            Some(pts) if !pts.is_empty() => {
                let points: Vec<Point> = pts.iter().copied().map(Point::from).collect();
                Self::from_points(&points).map_err(|e| {
                    anyhow::anyhow!("zone {} ({}): {}", zone.id, zone.display_name(), e)
                })
            }
            _ => {
                info!(
                    "Zone {} has no points, using {}% inset of {}x{} frame",
                    zone.id, buffer_pct, frame.width, frame.height
                );
                Self::inset_rect(frame.width as f32, frame.height as f32, buffer_pct)
            }
        }
    }

    pub fn points(&self) -> &[Point; ZONE_POINTS] {
        &self.points
    }

    pub fn entry_edge(&self) -> &Segment {
        &self.entry_edge
    }

    pub fn exit_edge(&self) -> &Segment {
        &self.exit_edge
    }

    pub fn contains(&self, point: Point) -> bool {
        geometry::point_in_polygon(point, &self.points)
    }
}
