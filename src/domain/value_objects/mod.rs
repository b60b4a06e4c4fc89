pub mod alert_status;
pub mod category;
pub mod severity;
pub mod thresholds;

pub use alert_status::AlertStatus;
pub use category::AlertCategory;
pub use severity::Severity;
pub use thresholds::ThresholdSet;
