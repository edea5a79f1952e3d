// src/counting/track_state.rs
//
// Per-identity state inside one zone: a bounded foot-position history plus
// the four crossing latches. Latches only ever go false -> true.

use crate::geometry::Segment;
use crate::types::Point;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackState {
    identity: i64,
    class_id: i64,
    history: VecDeque<Point>,
    track_length: usize,

    entered: bool,
    exited: bool,
    entry_started: bool,
    exit_started: bool,

    first_seen_frame: u64,
    last_seen_frame: u64,
    entry_frame: Option<u64>,
    exit_frame: Option<u64>,
}

impl TrackState {
    pub fn new(identity: i64, class_id: i64, track_length: usize, frame_index: u64) -> Self {
        Self {
            identity,
            class_id,
            history: VecDeque::with_capacity(track_length + 1),
            track_length,
            entered: false,
            exited: false,
            entry_started: false,
            exit_started: false,
            first_seen_frame: frame_index,
            last_seen_frame: frame_index,
            entry_frame: None,
            exit_frame: None,
        }
    }

    /// Append a foot position, dropping the oldest once over `track_length`.
    pub fn record_position(&mut self, foot: Point, frame_index: u64) {
        self.history.push_back(foot);
        while self.history.len() > self.track_length {
            self.history.pop_front();
        }
        self.last_seen_frame = self.last_seen_frame.max(frame_index);
    }

    /// Motion over the trailing window:
    /// `history[len - backtrack - 1] -> history[len - 1]`.
    /// None until the history is long enough to span it.
    pub fn motion_window(&self, backtrack_length: usize) -> Option<Segment> {
        let len = self.history.len();
        if backtrack_length == 0 || len <= backtrack_length {
            return None;
        }
        let start = self.history[len - backtrack_length - 1];
        let end = self.history[len - 1];
        Some(Segment::new(start, end))
    }

    pub(crate) fn mark_entered(&mut self, frame_index: u64) -> bool {
        if self.entered {
            return false;
        }
        self.entered = true;
        self.entry_frame = Some(frame_index);
        true
    }

    pub(crate) fn mark_exited(&mut self, frame_index: u64) -> bool {
        if self.exited {
            return false;
        }
        self.exited = true;
        self.exit_frame = Some(frame_index);
        true
    }

    /// Returns true when the latch was newly armed.
    pub(crate) fn arm_entry(&mut self) -> bool {
        !std::mem::replace(&mut self.entry_started, true)
    }

    pub(crate) fn arm_exit(&mut self) -> bool {
        !std::mem::replace(&mut self.exit_started, true)
    }

    pub fn identity(&self) -> i64 {
        self.identity
    }

    pub fn class_id(&self) -> i64 {
        self.class_id
    }

    pub fn history(&self) -> &VecDeque<Point> {
        &self.history
    }

    pub fn entered(&self) -> bool {
        self.entered
    }

    pub fn exited(&self) -> bool {
        self.exited
    }

    pub fn entry_started(&self) -> bool {
        self.entry_started
    }

    pub fn exit_started(&self) -> bool {
        self.exit_started
    }

    pub fn first_seen_frame(&self) -> u64 {
        self.first_seen_frame
    }

    pub fn last_seen_frame(&self) -> u64 {
        self.last_seen_frame
    }

    pub fn entry_frame(&self) -> Option<u64> {
        self.entry_frame
    }

    pub fn exit_frame(&self) -> Option<u64> {
        self.exit_frame
    }

    /// Seconds between the counted entry and the counted exit, when the
    /// exit came after the entry.
    pub fn dwell_seconds(&self, fps: f64) -> Option<f64> {
        match (self.entry_frame, self.exit_frame) {
            (Some(entry), Some(exit)) if exit >= entry && fps > 0.0 => {
                Some((exit - entry) as f64 / fps)
            }
            _ => None,
        }
    }

    /// Frames since this identity was last observed.
    pub fn idle_frames(&self, frame_index: u64) -> u64 {
        frame_index.saturating_sub(self.last_seen_frame)
    }
}
