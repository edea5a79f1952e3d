// src/pipeline/event_bus.rs
//
// In-process queue of recent zone events. Bounded: once full the oldest
// pending event is dropped.

use crate::sinks::{EventSink, ZoneEvent};
use anyhow::Result;
use std::collections::VecDeque;
use tracing::warn;

pub struct EventBus {
    events: VecDeque<ZoneEvent>,
    max_pending: usize,
    dropped: u64,
}

impl EventBus {
    pub fn new(max_pending: usize) -> Self {
        let max_pending = max_pending.max(1);
        Self {
            events: VecDeque::with_capacity(max_pending),
            max_pending,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: ZoneEvent) {
        if self.events.len() >= self.max_pending {
            warn!(
                "Event bus full ({} events), dropping oldest",
                self.max_pending
            );
            self.events.pop_front();
            self.dropped += 1;
        }
        self.events.push_back(event);
    }

    pub fn drain(&mut self) -> Vec<ZoneEvent> {
        self.events.drain(..).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.events.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl EventSink for EventBus {
    fn record(&mut self, event: &ZoneEvent) -> Result<()> {
        self.publish(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counting::CrossingKind;
    use chrono::Utc;
    use uuid::Uuid;

    fn event(frame_index: u64) -> ZoneEvent {
        ZoneEvent {
            event_id: Uuid::new_v4(),
            camera_id: 0,
            feed_id: 0,
            zone_id: 1,
            zone_name: "Counter 1".to_string(),
            identity: 4,
            class_id: 0,
            kind: CrossingKind::Entry,
            event_time: Utc::now(),
            frame_index,
        }
    }

    #[test]
    fn test_drops_oldest_when_full() {
        let mut bus = EventBus::new(3);
        for i in 0..5 {
            bus.record(&event(i)).unwrap();
        }
        assert_eq!(bus.pending_count(), 3);
        assert_eq!(bus.dropped(), 2);

        let frames: Vec<u64> = bus.drain().iter().map(|e| e.frame_index).collect();
        assert_eq!(frames, vec![2, 3, 4]);
        assert_eq!(bus.pending_count(), 0);
    }
}
