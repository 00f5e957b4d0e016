use std::sync::Arc;

use anyhow::Context;
use parking_lot::Mutex;
use serde::Serialize;

use crate::{batch::Common, config::HttpClientConfig, metric::Metric};

/// Status returned by the ingestion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
}
impl Response {
    pub fn new(status: u16) -> Self {
        Self { status }
    }
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Ships one flushed window.
///
/// `Err` means the batch never got a structured answer (transport,
/// serialization); a rejection is an `Ok` response that is not `ok()`.
pub trait DeliveryClient: Send {
    fn send(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<Response>;
}

#[derive(Serialize)]
struct Payload<'a> {
    common: &'a Common,
    metrics: &'a [Metric],
}

/// Posts batches to the metric API as JSON.
pub struct HttpClient {
    agent: ureq::Agent,
    endpoint: String,
    api_key: String,
    buf: Vec<u8>,
}
impl HttpClient {
    pub fn new(config: HttpClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        Self {
            agent,
            endpoint: config.endpoint,
            api_key: config.api_key,
            buf: vec![],
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn encode(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<()> {
        self.buf.clear();
        let payload = [Payload {
            common,
            metrics: items,
        }];
        serde_json::to_writer(&mut self.buf, &payload).context("encode metric batch")?;
        Ok(())
    }
}
impl DeliveryClient for HttpClient {
    /// Blocking I/O
    fn send(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<Response> {
        self.encode(items, common)?;
        let resp = self
            .agent
            .post(&self.endpoint)
            .set("Api-Key", &self.api_key)
            .set("Content-Type", "application/json")
            .send_bytes(&self.buf);
        match resp {
            Ok(resp) => Ok(Response::new(resp.status())),
            Err(ureq::Error::Status(status, _)) => Ok(Response::new(status)),
            Err(e) => Err(e).context("post metric batch"),
        }
    }
}
impl core::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HttpClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

/// Writes every metric to the `tracing` log instead of the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogClient;
impl DeliveryClient for LogClient {
    fn send(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<Response> {
        for metric in items {
            tracing::info!(
                name = %metric.name,
                value = ?metric.value,
                tags = ?metric.tags,
                timestamp = common.timestamp,
                interval_ms = common.interval_ms,
                "metric"
            );
        }
        Ok(Response::new(200))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Status(u16),
    Fail(String),
}

#[derive(Debug)]
struct MemoryState {
    batches: Vec<(Vec<Metric>, Common)>,
    reply: Reply,
}

/// Keeps every batch it is handed.
///
/// Clones share the same storage, so a test can hand one clone to a
/// harvester and inspect another.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    state: Arc<Mutex<MemoryState>>,
}
impl MemoryClient {
    pub fn new() -> Self {
        Self::replying(Reply::Status(200))
    }
    pub fn replying(reply: Reply) -> Self {
        let state = MemoryState {
            batches: vec![],
            reply,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn set_reply(&self, reply: Reply) {
        self.state.lock().reply = reply;
    }
    pub fn take_batches(&self) -> Vec<(Vec<Metric>, Common)> {
        std::mem::take(&mut self.state.lock().batches)
    }
    pub fn batch_count(&self) -> usize {
        self.state.lock().batches.len()
    }
    /// Number of live clones, this one included.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.state)
    }
}
impl Default for MemoryClient {
    fn default() -> Self {
        Self::new()
    }
}
impl DeliveryClient for MemoryClient {
    fn send(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<Response> {
        let mut state = self.state.lock();
        state.batches.push((items.to_vec(), common.clone()));
        match &state.reply {
            Reply::Status(status) => Ok(Response::new(*status)),
            Reply::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }
}
