pub mod apt_collector;
pub mod command;
pub mod procfs;
pub mod sysinfo_collector;
pub mod system;
pub mod systemd_collector;

pub use system::SystemHealthCollector;
