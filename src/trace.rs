//! Trace/diagnostics (C9): a structured event sink a host can attach to a
//! query to observe labeling and enumeration without the engine committing
//! to any particular on-disk trace format (file serialization is a host
//! concern, out of scope here).

use crate::cost::Cost;
use crate::stop_state::StopStateKey;
use crate::supply::StopId;

#[derive(Debug, Clone)]
pub enum TraceEvent {
    LabelPushed { stop_id: StopId, is_trip: bool, label: Cost },
    LabelPopped { stop_id: StopId, is_trip: bool, label: Cost },
    LinkAccepted { stop_id: StopId, key: StopStateKey, cost: Cost, state_changed: bool },
    LinkRejected { stop_id: StopId, key: StopStateKey },
    PathEnumerated(PathSetEntry),
}

/// One sampled itinerary, as reported to a [`TraceSink`] once enumeration
/// finishes with it (a host wanting the full [`crate::path::Path`] holds it
/// directly — this is only the summary a trace cares about).
#[derive(Debug, Clone)]
pub struct PathSetEntry {
    pub path_id: u32,
    pub cost: Cost,
    pub fare: f64,
    pub probability: f64,
    pub capacity_problem: bool,
}

/// A query's diagnostic sink. The default is a no-op; a host that wants a
/// trace supplies an implementation (writing to a log, a channel, an
/// in-memory buffer for a test) without the engine knowing which.
pub trait TraceSink {
    fn record(&mut self, event: TraceEvent);
}

pub struct NullTraceSink;

impl TraceSink for NullTraceSink {
    fn record(&mut self, _event: TraceEvent) {}
}

#[derive(Default)]
pub struct InMemoryTraceSink {
    pub events: Vec<TraceEvent>,
}

impl TraceSink for InMemoryTraceSink {
    fn record(&mut self, event: TraceEvent) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_drops_everything() {
        let mut sink = NullTraceSink;
        sink.record(TraceEvent::LabelPopped { stop_id: 1, is_trip: false, label: 1.0 });
    }

    #[test]
    fn in_memory_sink_retains_events_in_order() {
        let mut sink = InMemoryTraceSink::default();
        sink.record(TraceEvent::LabelPushed { stop_id: 1, is_trip: false, label: 2.0 });
        sink.record(TraceEvent::LabelPopped { stop_id: 1, is_trip: false, label: 2.0 });
        assert_eq!(sink.events.len(), 2);
    }
}
