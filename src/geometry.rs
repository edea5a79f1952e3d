// src/geometry.rs
//
// Orientation-based segment tests used by the zone counters.
//
// The intersection test has no collinear-overlap special
// case: two segments lying on the same line are reported as NOT
// intersecting, and a segment whose endpoint touches the other one counts
// as intersecting. Crossing detection at exact boundary alignment depends
// on this.

use crate::types::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Collinear,
    Clockwise,
    CounterClockwise,
}

/// Directed segment `start -> end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn dx(&self) -> f32 {
        self.end.x - self.start.x
    }

    pub fn dy(&self) -> f32 {
        self.end.y - self.start.y
    }

    pub fn length(&self) -> f32 {
        self.dx().hypot(self.dy())
    }
}

/// Turn direction of `p1 -> p2 -> p3`, from the sign of the cross product
/// of `(p2 - p1)` and `(p3 - p2)`.
///
/// With image coordinates (y pointing down) a positive value is reported as
/// clockwise.
pub fn orientation(p1: Point, p2: Point, p3: Point) -> Orientation {
    let val = (p2.y - p1.y) * (p3.x - p2.x) - (p2.x - p1.x) * (p3.y - p2.y);
    if val == 0.0 {
        Orientation::Collinear
    } else if val > 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::CounterClockwise
    }
}

/// True when each segment's endpoints straddle the other segment's line.
pub fn segments_intersect(a: &Segment, b: &Segment) -> bool {
    let o1 = orientation(a.start, a.end, b.start);
    let o2 = orientation(a.start, a.end, b.end);
    let o3 = orientation(b.start, b.end, a.start);
    let o4 = orientation(b.start, b.end, a.end);

    o1 != o2 && o3 != o4
}

/// z-component of `motion x reference`. The sign tells which side the
/// motion approaches the reference edge from.
pub fn signed_cross(motion: &Segment, reference: &Segment) -> f32 {
    motion.dx() * reference.dy() - motion.dy() * reference.dx()
}

/// Even-odd containment test. Overlays use it to highlight objects inside a
/// zone; counting is driven by edge crossings.
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (polygon[i], polygon[j]);
        if (pi.y > point.y) != (pj.y > point.y) {
            let x_cross = (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x;
            if point.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
