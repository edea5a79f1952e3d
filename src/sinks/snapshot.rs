// src/sinks/snapshot.rs
//
// Tabular export of every live TrackState across zones.

use crate::counting::ZoneCounter;
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub zone_id: u32,
    pub zone_name: String,
    pub identity: i64,
    pub class_id: i64,
    pub first_seen_frame: u64,
    pub last_seen_frame: u64,
    pub entry_frame: Option<u64>,
    pub exit_frame: Option<u64>,
    pub dwell_seconds: Option<f64>,
    pub entered: bool,
    pub exited: bool,
    /// Foot positions, oldest first, as `x:y` pairs separated by `;`.
    pub history: String,
}

/// Counts grouped by (entered, exited).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotSummary {
    pub entered_and_exited: usize,
    pub entered_only: usize,
    pub exited_only: usize,
    pub neither: usize,
}

pub fn snapshot_rows(counters: &[ZoneCounter], fps: f64) -> Vec<SnapshotRow> {
    let mut rows = Vec::new();
    for counter in counters {
        for state in counter.tracks() {
            let history = state
                .history()
                .iter()
                .map(|p| format!("{:.1}:{:.1}", p.x, p.y))
                .collect::<Vec<_>>()
                .join(";");
            rows.push(SnapshotRow {
                zone_id: counter.zone_id(),
                zone_name: counter.name().to_string(),
                identity: state.identity(),
                class_id: state.class_id(),
                first_seen_frame: state.first_seen_frame(),
                last_seen_frame: state.last_seen_frame(),
                entry_frame: state.entry_frame(),
                exit_frame: state.exit_frame(),
                dwell_seconds: state.dwell_seconds(fps),
                entered: state.entered(),
                exited: state.exited(),
                history,
            });
        }
    }
    rows
}

pub fn summarize(rows: &[SnapshotRow]) -> SnapshotSummary {
    let mut summary = SnapshotSummary::default();
    for row in rows {
        match (row.entered, row.exited) {
            (true, true) => summary.entered_and_exited += 1,
            (true, false) => summary.entered_only += 1,
            (false, true) => summary.exited_only += 1,
            (false, false) => summary.neither += 1,
        }
    }
    summary
}

pub fn write_snapshot<W: Write>(writer: W, rows: &[SnapshotRow]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Rewrites the snapshot file every `every` frames. `every == 0` only writes
/// on `export`.
pub struct SnapshotExporter {
    path: PathBuf,
    every: u64,
    writes: usize,
}

impl SnapshotExporter {
    pub fn new(path: impl Into<PathBuf>, every: u64) -> Self {
        Self {
            path: path.into(),
            every,
            writes: 0,
        }
    }

    pub fn is_due(&self, frame_index: u64) -> bool {
        self.every > 0 && frame_index > 0 && frame_index % self.every == 0
    }

    pub fn export(&mut self, counters: &[ZoneCounter], fps: f64) -> Result<SnapshotSummary> {
        let rows = snapshot_rows(counters, fps);
        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create snapshot {}", self.path.display()))?;
        write_snapshot(file, &rows)?;
        self.writes += 1;

        let summary = summarize(&rows);
        info!(
            "📋 Snapshot {} ({} rows): entered+exited={} entered={} exited={} neither={}",
            self.path.display(),
            rows.len(),
            summary.entered_and_exited,
            summary.entered_only,
            summary.exited_only,
            summary.neither
        );
        Ok(summary)
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}
