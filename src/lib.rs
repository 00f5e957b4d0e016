pub mod batch;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod harvester;
pub mod merge;
pub mod metric;
pub mod policy;
pub mod stats;

pub use batch::{Common, MetricBatch};
pub use client::{DeliveryClient, HttpClient, LogClient, MemoryClient, Response};
pub use config::{HarvesterConfig, HttpClientConfig};
pub use error::HarvestError;
pub use harvester::{Harvester, Recorder};
pub use metric::{Metric, MetricKind, MetricValue, Summary, Tags};
pub use policy::FlushPolicy;
pub use stats::StatsSink;

/// Milliseconds since the UNIX epoch.
pub type Time = u64;
