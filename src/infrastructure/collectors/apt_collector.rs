use std::time::Duration;

use crate::domain::entities::PackageUpdate;
use crate::domain::ports::collector::CollectionError;

use super::command;

pub struct AptCollector {
    timeout: Duration,
}

impl AptCollector {
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Lists upgradable packages via `apt list --upgradable`.
    ///
    /// # Errors
    ///
    /// Returns `CollectionError::Timeout` if `apt` does not finish in time,
    /// and `CollectionError::MetricsUnavailable` if it fails to execute or
    /// exits with a non-zero status.
    /// Returns `Ok(Vec::new())` if `apt` is not installed.
    pub async fn collect(&self) -> Result<Vec<PackageUpdate>, CollectionError> {
        let Some(output) = command::run("apt", &["list", "--upgradable"], self.timeout).await?
        else {
            return Ok(Vec::new());
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectionError::MetricsUnavailable(format!(
                "apt exited with {}: {stderr}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_upgradable(&stdout))
    }
}

/// Parses lines like `openssl/jammy-security 3.0.2-0ubuntu1.15 amd64 [upgradable from: ...]`.
fn parse_upgradable(stdout: &str) -> Vec<PackageUpdate> {
    stdout
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (name, rest) = line.split_once('/')?;
            if name.is_empty() || name.contains(' ') {
                return None;
            }
            let mut fields = rest.split_whitespace();
            let suites = fields.next()?;
            let version = fields.next()?;
            Some(PackageUpdate {
                name: name.to_string(),
                version: version.to_string(),
                is_security: suites.contains("security"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Listing... Done
openssl/jammy-updates,jammy-security 3.0.2-0ubuntu1.15 amd64 [upgradable from: 3.0.2-0ubuntu1.14]
vim/jammy-updates 2:8.2.3995-1ubuntu2.16 amd64 [upgradable from: 2:8.2.3995-1ubuntu2.15]
libc6/jammy-security 2.35-0ubuntu3.7 amd64 [upgradable from: 2.35-0ubuntu3.6]

";

    #[test]
    fn parses_packages_and_skips_header() {
        let updates = parse_upgradable(SAMPLE);
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].name, "openssl");
        assert_eq!(updates[0].version, "3.0.2-0ubuntu1.15");
        assert!(updates[0].is_security);
        assert_eq!(updates[1].name, "vim");
        assert!(!updates[1].is_security);
        assert!(updates[2].is_security);
    }

    #[test]
    fn warnings_are_ignored() {
        let out = "WARNING: apt does not have a stable CLI interface.\n\nListing...\n";
        assert!(parse_upgradable(out).is_empty());
    }

    #[test]
    fn empty_output_yields_nothing() {
        assert!(parse_upgradable("").is_empty());
    }
}
