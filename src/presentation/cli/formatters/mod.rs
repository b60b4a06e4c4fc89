pub mod alert_fmt;
pub mod status_fmt;
