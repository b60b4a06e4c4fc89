pub mod enrichment;
pub mod prompt_builder;
pub mod scheduler;
pub mod snapshot_store;

pub use enrichment::{AlertEnrichmentPool, EnrichmentSettings};
pub use scheduler::{HealthCheckScheduler, SchedulerSettings};
pub use snapshot_store::SnapshotStore;
