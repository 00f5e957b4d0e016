use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use serde::Serialize;

use crate::{
    clock::{Clock, SystemClock},
    merge::merge,
    metric::{Metric, MetricIdentity, Tags},
    Time,
};

/// Attributes shared by every metric of one flushed window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Common {
    /// Start of the window.
    pub timestamp: Time,
    #[serde(rename = "interval.ms")]
    pub interval_ms: u64,
    pub attributes: Tags,
}

/// Merges metrics by identity until they are flushed.
///
/// Not synchronized: a single owner records and flushes.
#[derive(Debug)]
pub struct MetricBatch {
    batch: HashMap<MetricIdentity, Metric>,
    interval_start: Time,
    attributes: Tags,
    clock: Arc<dyn Clock>,
}
impl MetricBatch {
    pub fn new(attributes: Tags) -> Self {
        Self::with_clock(attributes, Arc::new(SystemClock))
    }
    pub fn with_clock(attributes: Tags, clock: Arc<dyn Clock>) -> Self {
        Self {
            batch: HashMap::new(),
            interval_start: clock.now(),
            attributes,
            clock,
        }
    }

    pub fn record(&mut self, mut metric: Metric) {
        match self.batch.entry(metric.identity()) {
            Entry::Occupied(mut entry) => merge(&mut entry.get_mut().value, &metric.value),
            Entry::Vacant(entry) => {
                // The window start replaces per-observation timestamps.
                metric.timestamp = None;
                entry.insert(metric);
            }
        }
    }

    /// Takes every merged metric and starts a new window.
    pub fn flush(&mut self) -> (Vec<Metric>, Common) {
        let now = self.clock.now();
        let common = Common {
            timestamp: self.interval_start,
            interval_ms: now.saturating_sub(self.interval_start),
            attributes: self.attributes.clone(),
        };
        self.interval_start = now;
        let items = std::mem::take(&mut self.batch).into_values().collect();
        (items, common)
    }

    pub fn interval_start(&self) -> Time {
        self.interval_start
    }
    pub fn attributes(&self) -> &Tags {
        &self.attributes
    }
    pub fn len(&self) -> usize {
        self.batch.len()
    }
    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}
impl Default for MetricBatch {
    fn default() -> Self {
        Self::new(Tags::new())
    }
}
