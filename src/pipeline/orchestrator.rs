// src/pipeline/orchestrator.rs
//
// Drives every zone counter for each incoming frame and fans the results
// out to the event, overlay and snapshot sinks. Sink failures are logged
// and counted; they never reach the counters.

use super::event_bus::EventBus;
use super::frame_context::FrameContext;
use super::metrics::CountingMetrics;
use crate::counting::{CounterConfig, CrossingKind, ZoneCounter};
use crate::sinks::{
    frame_label, zone_overlay, CanvasRenderer, EventSink, JsonlEventLog, OverlayFrame,
    OverlaySink, SnapshotExporter, TracingRecorder, ZoneEvent,
};
use crate::types::{Config, FeedConfig, FrameConfig, FrameTracks, ZoneConfig};
use crate::zone::Zone;
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

/// What one frame produced across all zones.
#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame_index: u64,
    pub events: Vec<ZoneEvent>,
    /// Malformed detections skipped this frame
    pub skipped: usize,
    pub filtered_out: usize,
    pub evicted: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZoneTotals {
    pub zone_id: u32,
    pub name: String,
    pub entries: u64,
    pub exits: u64,
    pub live_tracks: usize,
}

pub struct FrameOrchestrator {
    feed: FeedConfig,
    frame: FrameConfig,
    classes_to_count: Vec<i64>,
    draw_tracks: bool,
    counters: Vec<ZoneCounter>,
    event_bus: EventBus,
    event_sinks: Vec<Box<dyn EventSink>>,
    overlay_sinks: Vec<Box<dyn OverlaySink>>,
    snapshot: Option<SnapshotExporter>,
    metrics: CountingMetrics,
    next_index: u64,
}

impl FrameOrchestrator {
    /// Counters for every configured zone, no external sinks. With no zones
    /// configured a single inset-rectangle zone is counted.
    pub fn new(config: &Config) -> Result<Self> {
        let counter_config = CounterConfig {
            track_length: config.counting.track_length,
            backtrack_length: config.counting.backtrack_length,
            max_idle_frames: config.counting.max_idle_frames,
        };

        let default_zone = [ZoneConfig {
            id: 1,
            name: None,
            points: None,
        }];
        let zones: &[ZoneConfig] = if config.zones.is_empty() {
            info!("No zones configured, counting the whole frame");
            &default_zone
        } else {
            &config.zones
        };

        let mut counters = Vec::with_capacity(zones.len());
        for zone_config in zones {
            let zone = Zone::from_config(zone_config, &config.frame, config.counting.buffer_size)?;
            counters.push(ZoneCounter::new(
                zone_config.id,
                zone_config.display_name(),
                zone,
                counter_config.clone(),
            ));
        }

        Ok(Self {
            feed: config.feed.clone(),
            frame: config.frame.clone(),
            classes_to_count: config.counting.classes_to_count.clone(),
            draw_tracks: config.output.draw_tracks,
            counters,
            event_bus: EventBus::new(config.output.event_bus_capacity),
            event_sinks: Vec::new(),
            overlay_sinks: Vec::new(),
            snapshot: None,
            metrics: CountingMetrics::new(),
            next_index: 0,
        })
    }

    /// `new` plus the sinks named in `config.output`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let output = &config.output;
        let mut orchestrator = Self::new(config)?.with_event_sink(Box::new(TracingRecorder));

        if let Some(path) = &output.events_path {
            let log = JsonlEventLog::append_to(Path::new(path))?;
            orchestrator = orchestrator.with_event_sink(Box::new(log));
        }
        if let Some(path) = &output.snapshot_path {
            orchestrator =
                orchestrator.with_snapshot(SnapshotExporter::new(path, output.snapshot_every));
        }
        if let Some(dir) = &output.overlay_dir {
            let renderer = CanvasRenderer::new(
                config.frame.width,
                config.frame.height,
                dir,
                output.overlay_every,
            )?;
            orchestrator = orchestrator.with_overlay_sink(Box::new(renderer));
        }
        Ok(orchestrator)
    }

    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.event_sinks.push(sink);
        self
    }

    pub fn with_overlay_sink(mut self, sink: Box<dyn OverlaySink>) -> Self {
        self.overlay_sinks.push(sink);
        self
    }

    pub fn with_snapshot(mut self, exporter: SnapshotExporter) -> Self {
        self.snapshot = Some(exporter);
        self
    }

    pub fn process_frame(&mut self, frame: &FrameTracks) -> FrameReport {
        let ctx = FrameContext::new(frame, self.next_index, &self.classes_to_count);
        self.next_index = ctx.frame_index.saturating_add(1);

        self.metrics.inc(&self.metrics.total_frames);
        self.metrics
            .add(&self.metrics.detections, frame.detections.len() as u64);
        self.metrics
            .add(&self.metrics.filtered_detections, ctx.filtered_out as u64);
        if ctx.is_empty() {
            self.metrics.inc(&self.metrics.empty_frames);
        }

        let mut report = FrameReport {
            frame_index: ctx.frame_index,
            filtered_out: ctx.filtered_out,
            ..Default::default()
        };

        for counter in &mut self.counters {
            let update = counter.update(&ctx.detections, ctx.frame_index);
            // Every zone sees the same detections, so the skip list is
            // identical across zones.
            report.skipped = report.skipped.max(update.skipped.len());
            report.evicted += update.evicted;
            for crossing in &update.crossings {
                report.events.push(ZoneEvent::from_crossing(
                    &self.feed,
                    counter.zone_id(),
                    counter.name(),
                    crossing,
                ));
            }
        }

        self.metrics
            .add(&self.metrics.skipped_detections, report.skipped as u64);
        self.metrics
            .add(&self.metrics.evictions, report.evicted as u64);

        for event in &report.events {
            match event.kind {
                CrossingKind::Entry => self.metrics.inc(&self.metrics.entries),
                CrossingKind::Exit => self.metrics.inc(&self.metrics.exits),
            }
            self.event_bus.publish(event.clone());
            for sink in &mut self.event_sinks {
                if let Err(e) = sink.record(event) {
                    warn!(
                        "Event sink failed for zone {} id={} frame {}: {:#}",
                        event.zone_id, event.identity, event.frame_index, e
                    );
                    self.metrics.inc(&self.metrics.sink_failures);
                }
            }
        }

        if !self.overlay_sinks.is_empty() {
            self.render_overlays(&ctx);
        }

        if let Some(exporter) = &mut self.snapshot {
            if exporter.is_due(ctx.frame_index) {
                if let Err(e) = exporter.export(&self.counters, self.frame.fps) {
                    warn!("Snapshot at frame {} failed: {:#}", ctx.frame_index, e);
                    self.metrics.inc(&self.metrics.sink_failures);
                }
            }
        }

        debug!(
            "frame {}: {} detections, {} events, {} skipped",
            ctx.frame_index,
            ctx.detections.len(),
            report.events.len(),
            report.skipped
        );
        report
    }

    fn render_overlays(&mut self, ctx: &FrameContext) {
        let mut primitives = Vec::new();
        for (slot, counter) in self.counters.iter().enumerate() {
            primitives.extend(zone_overlay(
                counter,
                &ctx.detections,
                self.draw_tracks,
                slot,
            ));
        }
        primitives.push(frame_label(
            ctx.frame_index,
            self.frame.width,
            self.frame.height,
        ));
        let overlay = OverlayFrame {
            frame_index: ctx.frame_index,
            primitives,
        };

        for sink in &mut self.overlay_sinks {
            if let Err(e) = sink.render(&overlay) {
                warn!("Overlay sink failed at frame {}: {:#}", ctx.frame_index, e);
                self.metrics.inc(&self.metrics.sink_failures);
            }
        }
    }

    /// End of input: flush event sinks and write the final snapshot.
    pub fn finish(&mut self) -> Vec<ZoneTotals> {
        for sink in &mut self.event_sinks {
            if let Err(e) = sink.flush() {
                warn!("Event sink flush failed: {:#}", e);
                self.metrics.inc(&self.metrics.sink_failures);
            }
        }
        if let Some(exporter) = &mut self.snapshot {
            if let Err(e) = exporter.export(&self.counters, self.frame.fps) {
                warn!("Final snapshot failed: {:#}", e);
                self.metrics.inc(&self.metrics.sink_failures);
            }
        }
        self.totals()
    }

    pub fn totals(&self) -> Vec<ZoneTotals> {
        self.counters
            .iter()
            .map(|c| ZoneTotals {
                zone_id: c.zone_id(),
                name: c.name().to_string(),
                entries: c.entry_count(),
                exits: c.exit_count(),
                live_tracks: c.track_count(),
            })
            .collect()
    }

    pub fn counters(&self) -> &[ZoneCounter] {
        &self.counters
    }

    pub fn metrics(&self) -> &CountingMetrics {
        &self.metrics
    }

    pub fn drain_events(&mut self) -> Vec<ZoneEvent> {
        self.event_bus.drain()
    }

    pub fn dropped_events(&self) -> u64 {
        self.event_bus.dropped()
    }
}
