// src/counting/zone_counter.rs
//
// Directional entry/exit counter for one zone.
//
// For every identity whose history spans the trailing window, the motion
// segment `history[len-backtrack-1] -> history[len-1]` is tested against
// both zone edges:
//
//   entry edge hit, not yet entered:
//     cross > 0 && entry_started  -> count ENTRY
//     cross < 0                   -> arm exit_started
//   exit edge hit, not yet exited:
//     cross < 0 && exit_started   -> count EXIT
//     cross > 0                   -> arm entry_started
//
// So an entry only counts after the same identity was seen crossing the
// exit edge from the opposite side first, and vice versa. A graze of a
// single edge never counts.
//
// Both tests run up to twice per frame: a latch armed by one edge in the
// first pass can complete the other edge within the same window. A third
// pass could not change anything, the segment being fixed.

use super::track_state::TrackState;
use crate::geometry::{segments_intersect, signed_cross};
use crate::types::{BoxDefect, TrackedDetection};
use crate::zone::Zone;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone)]
pub struct CounterConfig {
    pub track_length: usize,
    pub backtrack_length: usize,
    /// Identities unseen for longer than this are forgotten. None keeps
    /// every identity for the whole session.
    pub max_idle_frames: Option<u64>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            track_length: 30,
            backtrack_length: 10,
            max_idle_frames: Some(900),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossingKind {
    Entry,
    Exit,
}

impl CrossingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Exit => "exit",
        }
    }
}

/// A counted crossing from a single update.
#[derive(Debug, Clone)]
pub struct Crossing {
    pub identity: i64,
    pub class_id: i64,
    pub kind: CrossingKind,
    pub frame_index: u64,
    pub event_time: DateTime<Utc>,
}

/// A detection that was ignored for this frame.
#[derive(Debug, Clone, Copy)]
pub struct SkippedDetection {
    pub identity: i64,
    pub defect: BoxDefect,
}

/// Result of one `ZoneCounter::update`.
#[derive(Debug, Clone, Default)]
pub struct ZoneUpdate {
    pub frame_index: u64,
    pub crossings: Vec<Crossing>,
    pub skipped: Vec<SkippedDetection>,
    pub evicted: usize,
}

// ============================================================================
// ZONE COUNTER
// ============================================================================

pub struct ZoneCounter {
    zone_id: u32,
    name: String,
    zone: Zone,
    config: CounterConfig,
    tracks: HashMap<i64, TrackState>,
    entry_count: u64,
    exit_count: u64,
}

impl ZoneCounter {
    pub fn new(zone_id: u32, name: impl Into<String>, zone: Zone, config: CounterConfig) -> Self {
        let name = name.into();
        info!(
            "{} initiated: zone={} track_length={} backtrack_length={} max_idle={:?}",
            name, zone_id, config.track_length, config.backtrack_length, config.max_idle_frames
        );
        Self {
            zone_id,
            name,
            zone,
            config,
            tracks: HashMap::new(),
            entry_count: 0,
            exit_count: 0,
        }
    }

    /// Process one frame of tracked detections.
    ///
    /// An empty slice is a no-op. A malformed box skips only that detection.
    pub fn update(&mut self, detections: &[TrackedDetection], frame_index: u64) -> ZoneUpdate {
        let mut result = ZoneUpdate {
            frame_index,
            ..Default::default()
        };
        if detections.is_empty() {
            return result;
        }

        for det in detections {
            if let Some(defect) = det.bbox.defect() {
                warn!(
                    "{}: skipping id={} at frame {}: {} box {:?}",
                    self.name,
                    det.identity,
                    frame_index,
                    defect.as_str(),
                    det.bbox
                );
                result.skipped.push(SkippedDetection {
                    identity: det.identity,
                    defect,
                });
                continue;
            }

            let track_length = self.config.track_length;
            let state = self
                .tracks
                .entry(det.identity)
                .or_insert_with(|| {
                    TrackState::new(det.identity, det.class_id, track_length, frame_index)
                });
            state.record_position(det.bbox.foot_point(), frame_index);

            let kinds = detect_crossings(
                state,
                &self.zone,
                self.config.backtrack_length,
                frame_index,
            );

            for kind in kinds {
                match kind {
                    CrossingKind::Entry => self.entry_count += 1,
                    CrossingKind::Exit => self.exit_count += 1,
                }
                info!(
                    "🚪 {} {}: id={} frame={} (entries={} exits={})",
                    self.name,
                    kind.as_str().to_uppercase(),
                    det.identity,
                    frame_index,
                    self.entry_count,
                    self.exit_count
                );
                result.crossings.push(Crossing {
                    identity: det.identity,
                    class_id: state.class_id(),
                    kind,
                    frame_index,
                    event_time: Utc::now(),
                });
            }
        }

        result.evicted = self.evict_idle(frame_index);
        result
    }

    fn evict_idle(&mut self, frame_index: u64) -> usize {
        let Some(max_idle) = self.config.max_idle_frames else {
            return 0;
        };
        let before = self.tracks.len();
        self.tracks
            .retain(|_, state| state.idle_frames(frame_index) <= max_idle);
        let evicted = before - self.tracks.len();
        if evicted > 0 {
            debug!(
                "{}: evicted {} identities idle > {} frames at frame {}",
                self.name, evicted, max_idle, frame_index
            );
        }
        evicted
    }

    pub fn zone_id(&self) -> u32 {
        self.zone_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn config(&self) -> &CounterConfig {
        &self.config
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn exit_count(&self) -> u64 {
        self.exit_count
    }

    pub fn track(&self, identity: i64) -> Option<&TrackState> {
        self.tracks.get(&identity)
    }

    /// Read access to every live TrackState, ordered by identity.
    pub fn tracks(&self) -> Vec<&TrackState> {
        let mut states: Vec<&TrackState> = self.tracks.values().collect();
        states.sort_by_key(|s| s.identity());
        states
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }
}

/// Run the directional edge tests for one identity, arming latches and
/// returning any newly counted crossings.
fn detect_crossings(
    state: &mut TrackState,
    zone: &Zone,
    backtrack_length: usize,
    frame_index: u64,
) -> Vec<CrossingKind> {
    let mut counted = Vec::new();
    let Some(motion) = state.motion_window(backtrack_length) else {
        return counted;
    };

    let entry_hit = segments_intersect(&motion, zone.entry_edge());
    let exit_hit = segments_intersect(&motion, zone.exit_edge());
    if !entry_hit && !exit_hit {
        return counted;
    }
    let entry_cp = signed_cross(&motion, zone.entry_edge());
    let exit_cp = signed_cross(&motion, zone.exit_edge());

    for _ in 0..backtrack_length.min(2) {
        if entry_hit && !state.entered() {
            if entry_cp > 0.0 && state.entry_started() {
                if state.mark_entered(frame_index) {
                    counted.push(CrossingKind::Entry);
                }
            } else if entry_cp < 0.0 && state.arm_exit() {
                debug!(
                    "id={} armed exit latch on entry edge (cp={:.1})",
                    state.identity(),
                    entry_cp
                );
            }
        }

        if exit_hit && !state.exited() {
            if exit_cp < 0.0 && state.exit_started() {
                if state.mark_exited(frame_index) {
                    counted.push(CrossingKind::Exit);
                }
            } else if exit_cp > 0.0 && state.arm_entry() {
                debug!(
                    "id={} armed entry latch on exit edge (cp={:.1})",
                    state.identity(),
                    exit_cp
                );
            }
        }
    }

    counted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Point};

    /// Unit square: exit edge (100,0)->(0,0), entry edge (100,100)->(0,100).
    fn square_zone() -> Zone {
        Zone::from_points(&[
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ])
        .unwrap()
    }

    fn counter(backtrack_length: usize) -> ZoneCounter {
        ZoneCounter::new(
            1,
            "Test",
            square_zone(),
            CounterConfig {
                track_length: 30,
                backtrack_length,
                max_idle_frames: None,
            },
        )
    }

    /// Detection whose foot point is (x, y).
    fn det_at(id: i64, x: f32, y: f32) -> TrackedDetection {
        TrackedDetection::new(BoundingBox::new(x - 10.0, y - 40.0, x + 10.0, y), id, 0)
    }

    fn feed(c: &mut ZoneCounter, id: i64, ys: &[f32], start_frame: u64) -> Vec<(u64, u64)> {
        ys.iter()
            .enumerate()
            .map(|(i, &y)| {
                c.update(&[det_at(id, 50.0, y)], start_frame + i as u64);
                (c.entry_count(), c.exit_count())
            })
            .collect()
    }

    #[test]
    fn test_downward_traversal_counts_one_entry() {
        let mut c = counter(5);
        let ys: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        let counts = feed(&mut c, 1, &ys, 0);

        let entries: Vec<u64> = counts.iter().map(|c| c.0).collect();
        let exits: Vec<u64> = counts.iter().map(|c| c.1).collect();
        // Window -50->50 at frame 5 arms entry on the exit edge; window
        // 10->110 at frame 8 crosses the entry edge and counts.
        assert_eq!(entries, vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1]);
        assert_eq!(exits, vec![0; 11]);

        let state = c.track(1).unwrap();
        assert!(state.entry_started());
        assert!(state.entered());
        assert!(!state.exited());
        assert_eq!(state.entry_frame(), Some(8));
    }

    #[test]
    fn test_six_frame_window_arms_and_counts_in_same_frame() {
        // backtrack 5: only frame 5 has a full window, -10 -> 110, which
        // crosses the exit edge then the entry edge.
        let mut c = counter(5);
        let ys = [-10.0, 14.0, 38.0, 62.0, 86.0, 110.0];
        let counts = feed(&mut c, 1, &ys, 0);
        assert_eq!(
            counts,
            vec![(0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (1, 0)]
        );
    }

    #[test]
    fn test_single_pass_window_needs_earlier_latch() {
        // With backtrack 1 each frame is tested once, so the latch armed by
        // the exit edge only pays off on a later frame.
        let mut c = counter(1);
        let ys = [-10.0, 110.0, 130.0];
        let counts = feed(&mut c, 1, &ys, 0);
        assert_eq!(counts, vec![(0, 0), (0, 0), (0, 0)]);
        assert!(c.track(1).unwrap().entry_started());

        let mut c = counter(1);
        let ys = [-10.0, 10.0, 110.0];
        let counts = feed(&mut c, 1, &ys, 0);
        assert_eq!(counts, vec![(0, 0), (0, 0), (1, 0)]);
    }

    #[test]
    fn test_upward_traversal_counts_one_exit() {
        let mut c = counter(5);
        let ys: Vec<f32> = (0..11).map(|k| 150.0 - 20.0 * k as f32).collect();
        let counts = feed(&mut c, 7, &ys, 100);
        assert_eq!(counts.last(), Some(&(0, 1)));

        let state = c.track(7).unwrap();
        assert!(state.exit_started());
        assert!(state.exited());
        assert!(!state.entered());
        assert_eq!(state.exit_frame(), Some(108));
    }

    #[test]
    fn test_entry_edge_without_latch_is_not_counted() {
        // Starts inside the zone and leaves through the entry edge: the raw
        // intersection is true but entry_started was never armed.
        let mut c = counter(5);
        let ys: Vec<f32> = (0..12).map(|k| 40.0 + 10.0 * k as f32).collect();
        let counts = feed(&mut c, 3, &ys, 0);
        assert_eq!(counts.last(), Some(&(0, 0)));

        let state = c.track(3).unwrap();
        assert!(!state.entry_started());
        assert!(!state.exit_started(), "positive cross never arms exit");
    }

    #[test]
    fn test_grazing_exit_edge_only_arms_latch() {
        let mut c = counter(5);
        // Dips from above through y=0 and back out, never reaching y=100
        let ys = [-40.0, -30.0, -20.0, -10.0, 0.0, 10.0, 20.0, 10.0, 0.0, -10.0];
        let counts = feed(&mut c, 5, &ys, 0);
        assert_eq!(counts.last(), Some(&(0, 0)));
        assert!(c.track(5).unwrap().entry_started());
    }

    #[test]
    fn test_repeated_traversals_count_once_per_identity() {
        let mut c = counter(5);
        let down: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        let up: Vec<f32> = down.iter().rev().copied().collect();

        let mut frame = 0;
        for _ in 0..3 {
            feed(&mut c, 1, &down, frame);
            frame += down.len() as u64;
            feed(&mut c, 1, &up, frame);
            frame += up.len() as u64;
        }
        assert_eq!(c.entry_count(), 1);
        // Once entered, the entry edge is no longer evaluated, so the
        // return trip never arms the exit latch.
        assert_eq!(c.exit_count(), 0);
        assert!(!c.track(1).unwrap().exit_started());
    }

    #[test]
    fn test_counts_are_per_identity() {
        let mut c = counter(5);
        let ys: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        for (k, &y) in ys.iter().enumerate() {
            let dets = [det_at(1, 30.0, y), det_at(2, 70.0, y)];
            c.update(&dets, k as u64);
        }
        assert_eq!(c.entry_count(), 2);
        assert_eq!(c.track_count(), 2);
    }

    #[test]
    fn test_counters_are_monotonic() {
        let mut c = counter(3);
        let mut last = (0, 0);
        let path = [
            -30.0, -10.0, 10.0, 30.0, 60.0, 90.0, 120.0, 90.0, 60.0, 30.0, 0.0, -30.0, 20.0,
            120.0,
        ];
        for (k, &y) in path.iter().enumerate() {
            c.update(&[det_at(1, 50.0, y), det_at(2, 40.0, 130.0 - y)], k as u64);
            let now = (c.entry_count(), c.exit_count());
            assert!(now.0 >= last.0 && now.1 >= last.1, "counter decreased");
            assert!(now.0 <= 2 && now.1 <= 2, "at most one count per identity");
            last = now;
        }
    }

    #[test]
    fn test_history_bound() {
        let mut c = counter(5);
        for k in 0..50 {
            c.update(&[det_at(1, k as f32, 500.0)], k);
        }
        let history = c.track(1).unwrap().history();
        assert_eq!(history.len(), 30);
        // 50 fed, 30 kept: oldest is the 21st fed point
        assert_eq!(history.front(), Some(&Point::new(20.0, 500.0)));
    }

    #[test]
    fn test_empty_frames_are_idempotent() {
        let mut c = ZoneCounter::new(
            1,
            "Test",
            square_zone(),
            CounterConfig {
                track_length: 30,
                backtrack_length: 5,
                max_idle_frames: Some(2),
            },
        );
        let ys: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        feed(&mut c, 1, &ys, 0);

        let before: Vec<TrackState> = c.tracks().into_iter().cloned().collect();
        let counts = (c.entry_count(), c.exit_count());
        for frame in 11..100 {
            let update = c.update(&[], frame);
            assert!(update.crossings.is_empty());
            assert_eq!(update.evicted, 0);
        }
        let after: Vec<TrackState> = c.tracks().into_iter().cloned().collect();
        assert_eq!(before, after);
        assert_eq!(counts, (c.entry_count(), c.exit_count()));
    }

    #[test]
    fn test_malformed_box_skips_only_that_identity() {
        let mut c = counter(5);
        let ys: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        for (k, &y) in ys.iter().enumerate() {
            let bad = TrackedDetection::new(BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0), 2, 0);
            let flat = TrackedDetection::new(BoundingBox::new(5.0, 5.0, 5.0, 9.0), 3, 0);
            let update = c.update(&[bad, det_at(1, 50.0, y), flat], k as u64);
            assert_eq!(update.skipped.len(), 2);
            assert_eq!(update.skipped[0].identity, 2);
            assert_eq!(update.skipped[0].defect, BoxDefect::NonFinite);
            assert_eq!(update.skipped[1].defect, BoxDefect::Degenerate);
        }
        assert_eq!(c.entry_count(), 1);
        assert!(c.track(2).is_none());
        assert!(c.track(3).is_none());
    }

    #[test]
    fn test_reused_identity_continues_latch_state() {
        // Known limitation: the engine can't tell a reassigned id from the
        // original object, so the second object inherits the first's latches.
        let mut c = counter(5);
        let ys: Vec<f32> = (0..11).map(|k| -50.0 + 20.0 * k as f32).collect();
        feed(&mut c, 1, &ys, 0);
        assert_eq!(c.entry_count(), 1);

        // Gap with other traffic, then "id 1" walks the same path again
        for frame in 11..20 {
            c.update(&[det_at(9, 500.0, 500.0)], frame);
        }
        feed(&mut c, 1, &ys, 20);

        assert_eq!(c.entry_count(), 1, "reused id must not count again");
        let state = c.track(1).unwrap();
        assert!(state.entered());
        assert_eq!(state.entry_frame(), Some(8));
        assert_eq!(state.first_seen_frame(), 0);
    }

    #[test]
    fn test_idle_identities_are_evicted() {
        let mut c = ZoneCounter::new(
            1,
            "Test",
            square_zone(),
            CounterConfig {
                track_length: 30,
                backtrack_length: 5,
                max_idle_frames: Some(10),
            },
        );
        for frame in 0..5 {
            c.update(&[det_at(1, 50.0, -50.0)], frame);
        }
        let update = c.update(&[det_at(2, 50.0, -50.0)], 14);
        assert_eq!(update.evicted, 0, "idle 10 is still within the bound");
        assert!(c.track(1).is_some());

        let update = c.update(&[det_at(2, 50.0, -50.0)], 15);
        assert_eq!(update.evicted, 1);
        assert!(c.track(1).is_none());
        assert!(c.track(2).is_some());
    }

    #[test]
    fn test_crossing_carries_identity_and_class() {
        let mut c = counter(5);
        let ys: Vec<f32> = (0..9).map(|k| -50.0 + 20.0 * k as f32).collect();
        let mut crossings = Vec::new();
        for (k, &y) in ys.iter().enumerate() {
            let mut d = det_at(4, 50.0, y);
            d.class_id = 2;
            crossings.extend(c.update(&[d], 40 + k as u64).crossings);
        }
        assert_eq!(crossings.len(), 1);
        assert_eq!(crossings[0].identity, 4);
        assert_eq!(crossings[0].class_id, 2);
        assert_eq!(crossings[0].kind, CrossingKind::Entry);
        assert_eq!(crossings[0].frame_index, 48);
    }
}
