// src/pipeline/mod.rs

pub mod event_bus;
pub mod frame_context;
pub mod metrics;
pub mod orchestrator;

pub use event_bus::EventBus;
pub use frame_context::FrameContext;
pub use metrics::{CountingMetrics, MetricsSummary};
pub use orchestrator::{FrameOrchestrator, FrameReport, ZoneTotals};
