use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use super::protocol::{Request, Response, MAX_MESSAGE_SIZE};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("cannot connect to {path}: {source} (is the daemon running?)")]
    Connect {
        path: String,
        source: std::io::Error,
    },
    #[error("socket I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("daemon did not answer within {0:?}")]
    Timeout(Duration),
    #[error("invalid response from daemon: {0}")]
    InvalidResponse(String),
}

/// Sends one request per connection to a running daemon.
#[derive(Debug, Clone)]
pub struct IpcClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl IpcClient {
    #[must_use]
    pub const fn new(socket_path: PathBuf, timeout: Duration) -> Self {
        Self {
            socket_path,
            timeout,
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable, too slow, or replies
    /// with something that is not a response.
    pub async fn call(&self, request: &Request) -> Result<Response, ClientError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| ClientError::InvalidResponse(format!("cannot encode request: {e}")))?;
        tokio::time::timeout(self.timeout, self.exchange(&payload))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    /// Sends a raw message as-is. Used to exercise the daemon's input validation.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub async fn call_raw(&self, payload: &[u8]) -> Result<Response, ClientError> {
        tokio::time::timeout(self.timeout, self.exchange(payload))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
    }

    async fn exchange(&self, payload: &[u8]) -> Result<Response, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| ClientError::Connect {
                    path: self.socket_path.display().to_string(),
                    source,
                })?;

        stream.write_all(payload).await?;
        stream.write_all(b"\n").await?;
        stream.shutdown().await?;

        let mut raw = Vec::with_capacity(1024);
        (&mut stream)
            .take(MAX_MESSAGE_SIZE as u64 * 16)
            .read_to_end(&mut raw)
            .await?;

        let text = String::from_utf8_lossy(&raw);
        serde_json::from_str(text.trim()).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }
}
