use std::time::Duration;

use async_trait::async_trait;

use crate::domain::entities::{CpuCounters, DiskStats, MemoryStats, PackageUpdate};
use crate::domain::ports::collector::{CollectionError, HealthCollector};

use super::apt_collector::AptCollector;
use super::procfs::ProcStatReader;
use super::sysinfo_collector::SysinfoCollector;
use super::systemd_collector::SystemdCollector;

/// The host's real collectors behind one [`HealthCollector`].
pub struct SystemHealthCollector {
    cpu: ProcStatReader,
    sysinfo: SysinfoCollector,
    apt: AptCollector,
    systemd: SystemdCollector,
}

impl SystemHealthCollector {
    /// `command_timeout` bounds each `apt` and `systemctl` invocation.
    #[must_use]
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            cpu: ProcStatReader::new(),
            sysinfo: SysinfoCollector::new(),
            apt: AptCollector::new(command_timeout),
            systemd: SystemdCollector::new(command_timeout),
        }
    }
}

#[async_trait]
impl HealthCollector for SystemHealthCollector {
    fn cpu_counters(&self) -> Result<CpuCounters, CollectionError> {
        self.cpu.read()
    }

    fn memory_stats(&self) -> Result<MemoryStats, CollectionError> {
        self.sysinfo.memory_stats()
    }

    fn disk_stats(&self, path: &str) -> Result<DiskStats, CollectionError> {
        self.sysinfo.disk_stats(path)
    }

    async fn pending_updates(&self) -> Result<Vec<PackageUpdate>, CollectionError> {
        self.apt.collect().await
    }

    async fn failed_services(&self) -> Result<Vec<String>, CollectionError> {
        self.systemd.collect().await
    }
}
