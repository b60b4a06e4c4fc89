pub mod alert;
pub mod package;
pub mod snapshot;

pub use alert::{Alert, AlertFilter, AlertRequest};
pub use package::PackageUpdate;
pub use snapshot::{clamp_percent, CpuCounters, DiskStats, HealthSnapshot, MemoryStats};
