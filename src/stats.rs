use std::time::Duration;

use crate::{harvester::Recorder, metric::Metric};

/// Statsd-style recording surface.
pub trait StatsSink {
    fn incr(&self, stat: &str, count: u64);
    fn decr(&self, stat: &str, count: u64);
    fn gauge(&self, stat: &str, value: f64);
    /// Recorded as a gauge in microseconds.
    fn timing(&self, stat: &str, elapsed: Duration);
    /// For callers that only have a float; recorded as-is, untagged.
    fn timing_ms(&self, stat: &str, elapsed_ms: f64);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStats;
impl StatsSink for NoopStats {
    fn incr(&self, _stat: &str, _count: u64) {}
    fn decr(&self, _stat: &str, _count: u64) {}
    fn gauge(&self, _stat: &str, _value: f64) {}
    fn timing(&self, _stat: &str, _elapsed: Duration) {}
    fn timing_ms(&self, _stat: &str, _elapsed_ms: f64) {}
}

impl StatsSink for Recorder {
    fn incr(&self, stat: &str, count: u64) {
        self.record(Metric::count(stat, count as f64));
    }
    fn decr(&self, stat: &str, count: u64) {
        self.record(Metric::count(stat, -(count as f64)));
    }
    fn gauge(&self, stat: &str, value: f64) {
        self.record(Metric::gauge(stat, value));
    }
    fn timing(&self, stat: &str, elapsed: Duration) {
        let micros = elapsed.as_micros() as f64;
        self.record(Metric::gauge(stat, micros).with_tag("units", "microseconds"));
    }
    fn timing_ms(&self, stat: &str, elapsed_ms: f64) {
        self.record(Metric::gauge(stat, elapsed_ms));
    }
}
