use serde::{Deserialize, Serialize};

/// A package with a newer version available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub name: String,
    pub version: String,
    pub is_security: bool,
}
