// src/counting/mod.rs

mod track_state;
mod zone_counter;

// Re-export public APIs
pub use track_state::TrackState;
pub use zone_counter::{
    CounterConfig, Crossing, CrossingKind, SkippedDetection, ZoneCounter, ZoneUpdate,
};
