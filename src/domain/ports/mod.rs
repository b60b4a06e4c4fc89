pub mod backend;
pub mod collector;
pub mod store;

pub use backend::{BackendError, EnrichmentBackend};
pub use collector::{CollectionError, HealthCollector};
pub use store::{AlertStore, StoreError};
