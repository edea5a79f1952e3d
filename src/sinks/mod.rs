// src/sinks/mod.rs

pub mod events;
pub mod overlay;
pub mod snapshot;

pub use events::{EventSink, JsonlEventLog, TracingRecorder, ZoneEvent};
pub use overlay::{
    frame_label, trail_color, zone_overlay, CanvasRenderer, OverlayFrame, OverlayPrimitive,
    OverlayRecorder, OverlaySink,
};
pub use snapshot::{
    snapshot_rows, summarize, write_snapshot, SnapshotExporter, SnapshotRow, SnapshotSummary,
};
