// src/lib.rs

mod config;
pub mod counting;
pub mod geometry;
pub mod pipeline;
pub mod sinks;
pub mod track_source;
pub mod types;
pub mod zone;

pub use counting::{CrossingKind, TrackState, ZoneCounter};
pub use pipeline::FrameOrchestrator;
pub use types::Config;
