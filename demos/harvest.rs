use std::time::{Duration, Instant};

use harvest::{
    FlushPolicy, Harvester, HarvesterConfig, HttpClient, HttpClientConfig, LogClient, Metric,
    StatsSink,
};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut config = HarvesterConfig {
        harvest_interval: Duration::from_secs(2),
        ..Default::default()
    };
    config
        .attributes
        .insert("service.name".into(), "harvest-demo".into());
    let policy = FlushPolicy::name_prefixes(["job.completed"]);

    let harvester = match std::env::var("NEW_RELIC_INSERT_KEY") {
        Ok(key) => {
            let client = HttpClient::new(HttpClientConfig::new(key));
            println!("- sending to <{}>", client.endpoint());
            Harvester::builder(client)
                .config(config)
                .flush_policy(policy)
                .start()?
        }
        Err(_) => {
            println!("- NEW_RELIC_INSERT_KEY unset; logging metrics instead");
            Harvester::builder(LogClient)
                .config(config)
                .flush_policy(policy)
                .start()?
        }
    };

    let cpu = harvester.recorder();
    let sampler = std::thread::spawn(move || {
        let mut sys = sysinfo::System::new_all();
        for _ in 0..5 {
            std::thread::sleep(Duration::from_secs(1));
            sys.refresh_cpu_usage();
            let usage = sys.global_cpu_usage();
            cpu.record(Metric::gauge("host.cpu", f64::from(usage)).with_tag("units", "percent"));
        }
    });

    let stats = harvester.recorder();
    for job in 0..3 {
        let start = Instant::now();
        for _ in 0..10 {
            stats.incr("job.steps", 1);
            std::thread::sleep(Duration::from_millis(50));
        }
        stats.timing("job.duration", start.elapsed());
        stats.gauge("job.id", f64::from(job));
        stats.incr("job.completed", 1);
    }

    sampler
        .join()
        .map_err(|_| anyhow::anyhow!("cpu sampler panicked"))?;
    harvester.shutdown()?;
    Ok(())
}
