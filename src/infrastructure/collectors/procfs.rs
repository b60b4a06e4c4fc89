use std::path::PathBuf;

use crate::domain::entities::CpuCounters;
use crate::domain::ports::collector::CollectionError;

/// Reads the aggregate CPU line of `/proc/stat`.
pub struct ProcStatReader {
    path: PathBuf,
}

impl ProcStatReader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_path(PathBuf::from("/proc/stat"))
    }

    #[must_use]
    pub const fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// # Errors
    ///
    /// Returns `CollectionError::MetricsUnavailable` if the file cannot be read
    /// or has no parseable `cpu` line.
    pub fn read(&self) -> Result<CpuCounters, CollectionError> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => {
                CollectionError::PermissionDenied(format!("{}: {e}", self.path.display()))
            }
            _ => CollectionError::MetricsUnavailable(format!("{}: {e}", self.path.display())),
        })?;
        content
            .lines()
            .find(|line| line.starts_with("cpu "))
            .and_then(parse_cpu_line)
            .ok_or_else(|| {
                CollectionError::MetricsUnavailable(format!(
                    "no aggregate cpu line in {}",
                    self.path.display()
                ))
            })
    }
}

impl Default for ProcStatReader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_cpu_line(line: &str) -> Option<CpuCounters> {
    let mut fields = line.split_whitespace();
    if fields.next()? != "cpu" {
        return None;
    }
    let mut next = || fields.next().and_then(|f| f.parse::<u64>().ok());
    let user = next()?;
    let nice = next()?;
    let system = next()?;
    let idle = next()?;
    // iowait is missing on very old kernels
    let iowait = next().unwrap_or(0);
    Some(CpuCounters {
        user,
        nice,
        system,
        idle,
        iowait,
    })
}
