use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::{debug, error, info};

use crate::{
    batch::MetricBatch,
    client::DeliveryClient,
    clock::{millis, Clock, SystemClock},
    config::HarvesterConfig,
    error::HarvestError,
    metric::Metric,
    policy::FlushPolicy,
    Time,
};

/// Item travelling from producers to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Record(Metric),
    /// Drain everything queued ahead of it, flush once more, then exit.
    Stop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Message(Message),
    Timeout,
}

/// Consumer side of the intake queue.
pub trait Intake {
    /// Waits at most `timeout` for the next message.
    fn receive(&mut self, timeout: Duration) -> Received;
}
impl Intake for Receiver<Message> {
    fn receive(&mut self, timeout: Duration) -> Received {
        match self.recv_timeout(timeout) {
            Ok(msg) => Received::Message(msg),
            Err(RecvTimeoutError::Timeout) => Received::Timeout,
            // Every producer handle is gone and the queue is empty.
            Err(RecvTimeoutError::Disconnected) => Received::Message(Message::Stop),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Draining,
    Stopped,
}

/// The harvest loop, one iteration at a time.
///
/// Owns the buffer and the client; nothing else touches them.
pub struct Worker<I> {
    intake: I,
    batch: MetricBatch,
    client: Box<dyn DeliveryClient>,
    clock: Arc<dyn Clock>,
    harvest_interval: u64,
    deadline: Time,
    policy: FlushPolicy,
    records_since_flush: usize,
    state: State,
}
impl<I: Intake> Worker<I> {
    pub fn new(
        intake: I,
        batch: MetricBatch,
        client: Box<dyn DeliveryClient>,
        clock: Arc<dyn Clock>,
        harvest_interval: Duration,
        policy: FlushPolicy,
    ) -> Self {
        let harvest_interval = millis(harvest_interval);
        let deadline = clock.now().saturating_add(harvest_interval);
        Self {
            intake,
            batch,
            client,
            clock,
            harvest_interval,
            deadline,
            policy,
            records_since_flush: 0,
            state: State::Running,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }
    pub fn deadline(&self) -> Time {
        self.deadline
    }
    pub fn batch(&self) -> &MetricBatch {
        &self.batch
    }

    /// Runs until a stop is observed, then drops the buffer and the client.
    pub fn run(mut self) {
        info!(harvest_interval_ms = self.harvest_interval, "harvest worker started");
        while self.step() != State::Stopped {}
        info!("harvest worker stopped");
    }

    pub fn step(&mut self) -> State {
        if self.state == State::Stopped {
            return self.state;
        }
        let timeout = self.deadline.saturating_sub(self.clock.now());
        match self.intake.receive(Duration::from_millis(timeout)) {
            Received::Message(Message::Stop) => self.state = State::Draining,
            Received::Message(Message::Record(metric)) => self.record(metric),
            Received::Timeout => {}
        }

        if self.state == State::Draining || self.clock.now() > self.deadline {
            self.harvest();
        }
        if self.state == State::Draining {
            self.state = State::Stopped;
        }
        self.state
    }

    fn record(&mut self, metric: Metric) {
        self.records_since_flush += 1;
        let flush_now = self.policy.should_flush(&metric, self.records_since_flush);
        self.batch.record(metric);
        if flush_now {
            debug!(records = self.records_since_flush, "immediate flush");
            self.harvest();
        }
    }

    fn harvest(&mut self) {
        self.records_since_flush = 0;
        self.deadline = self.clock.now().saturating_add(self.harvest_interval);

        let (items, common) = self.batch.flush();
        if !items.is_empty() {
            match self.client.send(&items, &common) {
                Ok(resp) if resp.ok() => {
                    debug!(items = items.len(), status = resp.status, "sent metric batch");
                }
                Ok(resp) => {
                    error!(
                        items = items.len(),
                        status = resp.status,
                        "metric batch delivery failed"
                    );
                }
                Err(e) => {
                    error!(items = items.len(), error = ?e, "metric batch delivery raised");
                }
            }
        }

        // A send that overran the deadline skips a window instead of flushing
        // back to back, letting a backpressured queue drain.
        let now = self.clock.now();
        if now > self.deadline {
            debug!(overrun_ms = now - self.deadline, "skipping harvest window");
            self.deadline = now.saturating_add(self.harvest_interval);
        }
    }
}

/// Producer handle. Cheap to clone and share across threads.
#[derive(Debug, Clone)]
pub struct Recorder {
    sender: Sender<Message>,
}
impl Recorder {
    /// Blocks while the intake queue is full.
    pub fn record(&self, metric: Metric) {
        if self.sender.send(Message::Record(metric)).is_err() {
            debug!("harvest worker gone; metric dropped");
        }
    }

    /// Asks the worker to drain and exit. Does not wait for it.
    pub fn stop(&self) {
        if self.sender.send(Message::Stop).is_err() {
            debug!("harvest worker already stopped");
        }
    }
}

pub struct HarvesterBuilder {
    config: HarvesterConfig,
    client: Box<dyn DeliveryClient>,
    policy: FlushPolicy,
    clock: Arc<dyn Clock>,
}
impl HarvesterBuilder {
    pub fn config(mut self, config: HarvesterConfig) -> Self {
        self.config = config;
        self
    }
    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Spawns the worker thread.
    pub fn start(self) -> Result<Harvester, HarvestError> {
        self.config.validate()?;
        let (sender, receiver) = crossbeam_channel::bounded(self.config.max_queue_size);
        let batch = MetricBatch::with_clock(self.config.attributes, self.clock.clone());
        let worker = Worker::new(
            receiver,
            batch,
            self.client,
            self.clock,
            self.config.harvest_interval,
            self.policy,
        );
        let handle = thread::Builder::new()
            .name("harvester".into())
            .spawn(move || worker.run())?;
        Ok(Harvester {
            recorder: Recorder { sender },
            handle,
        })
    }
}

/// Batches metrics on a background thread and ships them every interval.
#[derive(Debug)]
pub struct Harvester {
    recorder: Recorder,
    handle: JoinHandle<()>,
}
impl Harvester {
    pub fn builder(client: impl DeliveryClient + 'static) -> HarvesterBuilder {
        HarvesterBuilder {
            config: HarvesterConfig::default(),
            client: Box::new(client),
            policy: FlushPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
    pub fn start(
        config: HarvesterConfig,
        client: impl DeliveryClient + 'static,
    ) -> Result<Self, HarvestError> {
        Self::builder(client).config(config).start()
    }

    pub fn recorder(&self) -> Recorder {
        self.recorder.clone()
    }
    pub fn record(&self, metric: Metric) {
        self.recorder.record(metric);
    }
    pub fn stop(&self) {
        self.recorder.stop();
    }
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker thread to exit.
    pub fn join(self) -> Result<(), HarvestError> {
        self.handle.join().map_err(|_| HarvestError::WorkerPanicked)
    }
    pub fn shutdown(self) -> Result<(), HarvestError> {
        self.stop();
        self.join()
    }
}
