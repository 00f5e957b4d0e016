use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::{error::HarvestError, metric::Tags};

pub const DEFAULT_HARVEST_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 10;
pub const DEFAULT_ENDPOINT: &str = "https://metric-api.newrelic.com/metric/v1";
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a harvester and its aggregation buffer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HarvesterConfig {
    /// Target length of one window. Accepts humantime strings such as `"5s"`.
    #[serde(
        default = "default_harvest_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub harvest_interval: Duration,

    /// Observations that may wait for the worker before producers block.
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Attached to every flush, e.g. `service.name`.
    #[serde(default)]
    pub attributes: Tags,
}

fn default_harvest_interval() -> Duration {
    DEFAULT_HARVEST_INTERVAL
}

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            harvest_interval: default_harvest_interval(),
            max_queue_size: default_max_queue_size(),
            attributes: Tags::new(),
        }
    }
}

impl HarvesterConfig {
    pub fn validate(&self) -> Result<(), HarvestError> {
        // The worker keeps time in whole milliseconds.
        if self.harvest_interval < Duration::from_millis(1) {
            return Err(HarvestError::InvalidConfig(
                "harvest_interval must be at least 1ms".into(),
            ));
        }
        if self.max_queue_size == 0 {
            return Err(HarvestError::InvalidConfig(
                "max_queue_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, PartialEq, Deserialize)]
pub struct HttpClientConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    pub api_key: String,
    #[serde(
        default = "default_send_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_send_timeout() -> Duration {
    DEFAULT_SEND_TIMEOUT
}

impl HttpClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: api_key.into(),
            timeout: default_send_timeout(),
        }
    }
}

impl core::fmt::Debug for HttpClientConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpClientConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}
