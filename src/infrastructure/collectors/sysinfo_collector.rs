use std::path::Path;
use std::sync::Mutex;

use sysinfo::{Disks, System};

use crate::domain::entities::{DiskStats, MemoryStats};
use crate::domain::ports::collector::CollectionError;

const BYTES_PER_MB: f64 = 1_048_576.0;
const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Memory and filesystem usage through the `sysinfo` crate.
///
/// `sysinfo` refreshes need `&mut`, hence the mutexes.
pub struct SysinfoCollector {
    sys: Mutex<System>,
    disks: Mutex<Disks>,
}

impl SysinfoCollector {
    #[must_use]
    pub fn new() -> Self {
        let mut sys = System::new();
        sys.refresh_memory();
        Self {
            sys: Mutex::new(sys),
            disks: Mutex::new(Disks::new_with_refreshed_list()),
        }
    }

    /// # Errors
    ///
    /// Returns `CollectionError::MetricsUnavailable` if the mutex is poisoned
    /// or the kernel reports no memory.
    #[allow(clippy::cast_precision_loss)]
    pub fn memory_stats(&self) -> Result<MemoryStats, CollectionError> {
        let mut sys = self.sys.lock().map_err(|e| {
            CollectionError::MetricsUnavailable(format!("system lock poisoned: {e}"))
        })?;
        sys.refresh_memory();
        let total = sys.total_memory();
        let used = sys.used_memory();
        drop(sys);

        if total == 0 {
            return Err(CollectionError::MetricsUnavailable(
                "total memory reported as zero".to_string(),
            ));
        }
        Ok(MemoryStats {
            used_mb: used as f64 / BYTES_PER_MB,
            total_mb: total as f64 / BYTES_PER_MB,
        })
    }

    /// Usage of the filesystem that holds `path`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::MetricsUnavailable` if the mutex is poisoned
    /// or no mounted filesystem contains `path`.
    #[allow(clippy::cast_precision_loss)]
    pub fn disk_stats(&self, path: &str) -> Result<DiskStats, CollectionError> {
        let mut disks = self
            .disks
            .lock()
            .map_err(|e| CollectionError::MetricsUnavailable(format!("disk lock poisoned: {e}")))?;
        disks.refresh_list();

        let target = Path::new(path);
        let mounts: Vec<&Path> = disks.iter().map(sysinfo::Disk::mount_point).collect();
        let index = best_mount(target, &mounts).ok_or_else(|| {
            CollectionError::MetricsUnavailable(format!("no filesystem mounted for {path}"))
        })?;
        let disk = &disks.list()[index];

        let total = disk.total_space();
        let used = total.saturating_sub(disk.available_space());
        Ok(DiskStats {
            used_gb: used as f64 / BYTES_PER_GB,
            total_gb: total as f64 / BYTES_PER_GB,
        })
    }
}

impl Default for SysinfoCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the longest mount point that is an ancestor of `target`.
fn best_mount(target: &Path, mounts: &[&Path]) -> Option<usize> {
    mounts
        .iter()
        .enumerate()
        .filter(|(_, mount)| target.starts_with(mount))
        .max_by_key(|(_, mount)| mount.components().count())
        .map(|(index, _)| index)
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_stats_are_positive() {
        let collector = SysinfoCollector::new();
        let mem = collector.memory_stats().expect("memory stats");
        assert!(mem.total_mb > 0.0);
        assert!(mem.used_mb <= mem.total_mb);
        assert!((0.0..=100.0).contains(&mem.usage_percent()));
    }

    #[test]
    fn memory_returns_error_on_poisoned_mutex() {
        let collector = SysinfoCollector::new();

        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = collector.sys.lock().expect("not yet poisoned");
            panic!("intentional panic to poison the mutex");
        }));

        assert!(collector.memory_stats().is_err());
    }

    #[test]
    fn best_mount_prefers_deepest_ancestor() {
        let mounts = [Path::new("/"), Path::new("/home"), Path::new("/home/user/data")];
        assert_eq!(best_mount(Path::new("/home/user/file"), &mounts), Some(1));
        assert_eq!(best_mount(Path::new("/home/user/data/x"), &mounts), Some(2));
        assert_eq!(best_mount(Path::new("/var/log"), &mounts), Some(0));
    }

    #[test]
    fn best_mount_does_not_match_partial_component() {
        let mounts = [Path::new("/home")];
        assert_eq!(best_mount(Path::new("/homework"), &mounts), None);
    }

    #[test]
    fn best_mount_with_no_mounts() {
        assert_eq!(best_mount(Path::new("/"), &[]), None);
    }
}
