// src/sinks/events.rs
//
// Entry/exit event recorders. Recording is best-effort: the orchestrator
// logs a failed `record` and carries on, counters are never rolled back.

use crate::counting::{Crossing, CrossingKind};
use crate::types::FeedConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub event_id: Uuid,
    pub camera_id: u32,
    pub feed_id: u32,
    pub zone_id: u32,
    pub zone_name: String,
    pub identity: i64,
    pub class_id: i64,
    pub kind: CrossingKind,
    pub event_time: DateTime<Utc>,
    pub frame_index: u64,
}

impl ZoneEvent {
    pub fn from_crossing(feed: &FeedConfig, zone_id: u32, zone_name: &str, crossing: &Crossing) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            camera_id: feed.camera_id,
            feed_id: feed.feed_id,
            zone_id,
            zone_name: zone_name.to_string(),
            identity: crossing.identity,
            class_id: crossing.class_id,
            kind: crossing.kind,
            event_time: crossing.event_time,
            frame_index: crossing.frame_index,
        }
    }
}

pub trait EventSink {
    fn record(&mut self, event: &ZoneEvent) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonlEventLog<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonlEventLog<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonlEventLog<BufWriter<File>> {
    /// Open `path` for appending, creating it if needed.
    pub fn append_to(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open event log {}", path.display()))?;
        info!("Recording events to {}", path.display());
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> EventSink for JsonlEventLog<W> {
    fn record(&mut self, event: &ZoneEvent) -> Result<()> {
        serde_json::to_writer(&mut self.writer, event)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Emits each event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingRecorder;

impl EventSink for TracingRecorder {
    fn record(&mut self, event: &ZoneEvent) -> Result<()> {
        debug!(
            event_id = %event.event_id,
            zone = event.zone_id,
            identity = event.identity,
            kind = event.kind.as_str(),
            frame = event.frame_index,
            "zone event"
        );
        Ok(())
    }
}
