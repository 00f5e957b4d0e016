use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender};
use harvest::{
    client::Reply, Common, DeliveryClient, FlushPolicy, Harvester, HarvesterConfig, MemoryClient,
    Metric, MetricValue, Response,
};

fn config(max_queue_size: usize) -> HarvesterConfig {
    HarvesterConfig {
        harvest_interval: Duration::from_secs(60),
        max_queue_size,
        ..Default::default()
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

/// Holds every send until the test lets it through.
struct GateClient {
    inner: MemoryClient,
    entered: Sender<()>,
    release: Receiver<()>,
}
impl DeliveryClient for GateClient {
    fn send(&mut self, items: &[Metric], common: &Common) -> anyhow::Result<Response> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        self.inner.send(items, common)
    }
}

#[test]
fn stop_flushes_everything_queued() {
    let client = MemoryClient::new();
    let harvester = Harvester::start(config(10), client.clone()).unwrap();
    harvester.record(Metric::gauge("foo", 1000.0));
    harvester.record(Metric::gauge("foo", 1000.0));
    harvester.stop();
    harvester.join().unwrap();

    let batches = client.take_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0.len(), 1);
    assert_eq!(batches[0].0[0].value, MetricValue::Gauge(1000.0));
    // The worker let go of its client on exit.
    assert_eq!(client.handle_count(), 1);
}

#[test]
fn common_attributes_attached() {
    let client = MemoryClient::new();
    let mut cfg = config(10);
    cfg.attributes
        .insert("service.name".to_string(), "Airflow".to_string());
    let harvester = Harvester::start(cfg, client.clone()).unwrap();
    harvester.record(Metric::count("x", 1.0));
    harvester.shutdown().unwrap();

    let batches = client.take_batches();
    assert_eq!(batches[0].1.attributes["service.name"], "Airflow");
}

#[test]
fn concurrent_producers_all_merge() {
    let client = MemoryClient::new();
    let harvester = Harvester::start(config(10), client.clone()).unwrap();
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let recorder = harvester.recorder();
            thread::spawn(move || {
                for _ in 0..100 {
                    recorder.record(Metric::count("hits", 1.0).with_tag("host", "a"));
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }
    harvester.shutdown().unwrap();

    let total: f64 = client
        .take_batches()
        .iter()
        .flat_map(|(items, _)| items)
        .map(|metric| match metric.value {
            MetricValue::Count(value) => value,
            _ => panic!("unexpected kind"),
        })
        .sum();
    assert_eq!(total, 400.0);
}

#[test]
fn full_queue_blocks_producer() {
    let client = MemoryClient::new();
    let (entered_tx, entered_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded();
    let gate = GateClient {
        inner: client.clone(),
        entered: entered_tx,
        release: release_rx,
    };
    let harvester = Harvester::builder(gate)
        .config(config(1))
        .flush_policy(FlushPolicy::name_prefixes(["flush."]))
        .start()
        .unwrap();

    // Park the worker inside a send.
    harvester.record(Metric::count("flush.now", 1.0));
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Fills the only slot.
    harvester.record(Metric::count("queued", 1.0));

    let done = Arc::new(AtomicBool::new(false));
    let producer = {
        let recorder = harvester.recorder();
        let done = done.clone();
        thread::spawn(move || {
            recorder.record(Metric::count("waiting", 1.0));
            done.store(true, Ordering::SeqCst);
        })
    };
    thread::sleep(Duration::from_millis(200));
    assert!(!done.load(Ordering::SeqCst));

    // One release for the parked send, one for the final flush.
    release_tx.send(()).unwrap();
    release_tx.send(()).unwrap();
    producer.join().unwrap();
    assert!(done.load(Ordering::SeqCst));
    harvester.shutdown().unwrap();

    let batches = client.take_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].0.len(), 1);
    assert_eq!(batches[1].0.len(), 2);
}

#[test]
fn predicate_flush_without_stop() {
    let client = MemoryClient::new();
    let harvester = Harvester::builder(client.clone())
        .config(config(10))
        .flush_policy(FlushPolicy::name_prefixes(["ti_successes", "ti_failures"]))
        .start()
        .unwrap();
    harvester.record(Metric::count("test.incr", 1.0));
    harvester.record(Metric::gauge("test.gauge", 12.0));
    harvester.record(Metric::count("ti_successes", 1.0));

    assert!(wait_for(|| client.batch_count() == 1));
    assert_eq!(client.take_batches()[0].0.len(), 3);
    harvester.shutdown().unwrap();
    assert_eq!(client.batch_count(), 0);
}

#[test]
fn threshold_flush_without_stop() {
    let client = MemoryClient::new();
    let harvester = Harvester::builder(client.clone())
        .config(config(10))
        .flush_policy(FlushPolicy::threshold(2))
        .start()
        .unwrap();
    harvester.record(Metric::count("a", 1.0));
    harvester.record(Metric::count("b", 1.0));

    assert!(wait_for(|| client.batch_count() == 1));
    harvester.shutdown().unwrap();
}

#[test]
fn interval_flush() {
    let client = MemoryClient::new();
    let cfg = HarvesterConfig {
        harvest_interval: Duration::from_millis(50),
        ..Default::default()
    };
    let harvester = Harvester::start(cfg, client.clone()).unwrap();
    harvester.record(Metric::count("tick", 1.0));

    assert!(wait_for(|| client.batch_count() == 1));
    let (_, common) = client.take_batches().remove(0);
    assert!(common.interval_ms >= 50);
    harvester.shutdown().unwrap();
}

#[test]
fn failed_delivery_is_not_fatal() {
    let client = MemoryClient::replying(Reply::Fail("connection refused".into()));
    let cfg = HarvesterConfig {
        harvest_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let harvester = Harvester::start(cfg, client.clone()).unwrap();
    harvester.record(Metric::count("x", 1.0));
    assert!(wait_for(|| client.batch_count() == 1));

    client.set_reply(Reply::Status(503));
    harvester.record(Metric::count("y", 1.0));
    assert!(wait_for(|| client.batch_count() == 2));

    // Nothing left over from the failed windows.
    harvester.shutdown().unwrap();
    let batches = client.take_batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].0[0].name, "x");
    assert_eq!(batches[1].0[0].name, "y");
}
