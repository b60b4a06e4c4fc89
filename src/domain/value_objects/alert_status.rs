use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a stored alert
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Active,
    Acknowledged,
    Dismissed,
}

impl AlertStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Dismissed => "dismissed",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "acknowledged" | "ack" => Ok(Self::Acknowledged),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("unknown status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_active() {
        assert_eq!(AlertStatus::default(), AlertStatus::Active);
    }

    #[test]
    fn parse_accepts_ack_shorthand() {
        assert_eq!("ack".parse::<AlertStatus>(), Ok(AlertStatus::Acknowledged));
        assert_eq!("Dismissed".parse::<AlertStatus>(), Ok(AlertStatus::Dismissed));
    }
}
