use std::collections::BTreeMap;

use serde::Serialize;

use crate::Time;

pub type Tags = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Count,
    Gauge,
    Summary,
}

/// Distribution of observed values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}
impl Summary {
    pub fn from_value(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum MetricValue {
    Count(f64),
    Gauge(f64),
    Summary(Summary),
}
impl MetricValue {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricValue::Count(_) => MetricKind::Count,
            MetricValue::Gauge(_) => MetricKind::Gauge,
            MetricValue::Summary(_) => MetricKind::Summary,
        }
    }
}

/// A single observation of a named series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub name: String,
    #[serde(flatten)]
    pub value: MetricValue,
    #[serde(rename = "attributes", skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: Tags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Time>,
}
impl Metric {
    pub fn new(name: impl Into<String>, value: MetricValue) -> Self {
        Self {
            name: name.into(),
            value,
            tags: Tags::new(),
            timestamp: None,
        }
    }
    pub fn count(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Count(value))
    }
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, MetricValue::Gauge(value))
    }
    pub fn summary(name: impl Into<String>, value: Summary) -> Self {
        Self::new(name, MetricValue::Summary(value))
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
    pub fn with_tags<K, V>(mut self, tags: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.tags
            .extend(tags.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
    pub fn with_timestamp(mut self, timestamp: Time) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn kind(&self) -> MetricKind {
        self.value.kind()
    }
    pub fn identity(&self) -> MetricIdentity {
        MetricIdentity {
            kind: self.kind(),
            name: self.name.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Key under which observations are merged.
///
/// Tags live in an ordered map, so the order in which they were attached does
/// not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricIdentity {
    pub kind: MetricKind,
    pub name: String,
    pub tags: Tags,
}
