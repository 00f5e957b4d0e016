use thiserror::Error;

/// Failures surfaced while setting up or tearing down a harvester.
///
/// Delivery failures never show up here; the worker logs them and moves on.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Invalid config; err={0}")]
    InvalidConfig(String),
    #[error("Spawn thread; err={0}")]
    SpawnThread(#[from] std::io::Error),
    #[error("Harvest worker panicked")]
    WorkerPanicked,
}
