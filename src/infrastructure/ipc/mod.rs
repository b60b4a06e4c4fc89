pub mod client;
pub mod dispatcher;
pub mod protocol;
pub mod rate_limiter;

pub use client::{ClientError, IpcClient};
pub use dispatcher::{Handler, RequestDispatcher};
pub use protocol::{ErrorCode, ProtocolError, Request, Response};
pub use rate_limiter::RateLimiter;
