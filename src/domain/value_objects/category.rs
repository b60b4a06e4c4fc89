use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Subsystem an alert is about
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Cpu,
    Memory,
    Disk,
    Apt,
    Cve,
    Service,
    System,
}

impl AlertCategory {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Disk => "disk",
            Self::Apt => "apt",
            Self::Cve => "cve",
            Self::Service => "service",
            Self::System => "system",
        }
    }
}

impl std::fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            "apt" => Ok(Self::Apt),
            "cve" => Ok(Self::Cve),
            "service" => Ok(Self::Service),
            "system" => Ok(Self::System),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}
