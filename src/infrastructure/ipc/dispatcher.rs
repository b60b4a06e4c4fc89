use std::collections::HashMap;
use std::future::Future;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use super::protocol::{ErrorCode, ProtocolError, Request, Response, MAX_MESSAGE_SIZE};
use super::rate_limiter::RateLimiter;

/// Serves one method.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Value, ProtocolError>;
}

#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ProtocolError>> + Send + 'static,
{
    async fn handle(&self, request: Request) -> Result<Value, ProtocolError> {
        (self)(request).await
    }
}

/// Everything sessions share with the dispatcher.
struct Shared {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
    limiter: RateLimiter,
    timeout: Duration,
    served: AtomicU64,
}

struct Running {
    shutdown: Arc<Notify>,
    accept: JoinHandle<()>,
}

/// Local request/response server on a Unix domain socket.
///
/// One message per connection: read, rate-limit, parse, route to the
/// registered handler, reply, close.
pub struct RequestDispatcher {
    socket_path: PathBuf,
    shared: Arc<Shared>,
    running: Mutex<Option<Running>>,
}

enum Incoming {
    Empty,
    TooLarge,
    Message(Vec<u8>),
}

impl RequestDispatcher {
    #[must_use]
    pub fn new(socket_path: PathBuf, timeout: Duration, max_requests_per_sec: usize) -> Self {
        Self {
            socket_path,
            shared: Arc::new(Shared {
                handlers: RwLock::new(HashMap::new()),
                limiter: RateLimiter::new(max_requests_per_sec),
                timeout,
                served: AtomicU64::new(0),
            }),
            running: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Registers `handler` for `method`, replacing any previous one.
    pub fn register_handler<H>(&self, method: &str, handler: H)
    where
        H: Handler + 'static,
    {
        let previous = self
            .shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), Arc::new(handler));
        if previous.is_some() {
            debug!(method, "handler replaced");
        }
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.shared
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Requests answered since construction.
    #[must_use]
    pub fn served(&self) -> u64 {
        self.shared.served.load(Ordering::Relaxed)
    }

    /// Binds the socket and spawns the accept loop. A no-op when already running.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if a stale socket cannot be removed, or the socket
    /// cannot be bound or made accessible.
    pub fn start(&self) -> std::io::Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match std::fs::remove_file(&self.socket_path) {
            Ok(()) => debug!(path = %self.socket_path.display(), "removed stale socket"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o666))?;

        let shutdown = Arc::new(Notify::new());
        let accept = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.shared),
            Arc::clone(&shutdown),
        ));
        *running = Some(Running { shutdown, accept });
        drop(running);

        info!(path = %self.socket_path.display(), "request dispatcher listening");
        Ok(())
    }

    /// Stops accepting, waits for in-flight sessions, and removes the socket file.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        running.shutdown.notify_one();
        if let Err(e) = running.accept.await {
            warn!(error = %e, "accept loop ended abnormally");
        }
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, path = %self.socket_path.display(), "failed to remove socket");
            }
        }
        info!("request dispatcher stopped");
    }

    /// Processes one raw message exactly as a socket session would.
    pub async fn handle_message(&self, raw: &[u8]) -> Response {
        self.shared.dispatch(raw).await
    }
}

async fn accept_loop(listener: UnixListener, shared: Arc<Shared>, shutdown: Arc<Notify>) {
    let mut sessions = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.notified() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    sessions.spawn(serve_connection(stream, Arc::clone(&shared)));
                }
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            },
            Some(finished) = sessions.join_next(), if !sessions.is_empty() => {
                if let Err(e) = finished {
                    warn!(error = %e, "session task ended abnormally");
                }
            }
        }
    }

    drop(listener);
    while let Some(finished) = sessions.join_next().await {
        if let Err(e) = finished {
            warn!(error = %e, "session task ended abnormally");
        }
    }
}

async fn serve_connection(mut stream: UnixStream, shared: Arc<Shared>) {
    let response = match tokio::time::timeout(shared.timeout, read_message(&mut stream)).await {
        Err(_) => {
            debug!("client timed out before sending a request");
            return;
        }
        Ok(Err(e)) => {
            debug!(error = %e, "failed to read request");
            return;
        }
        Ok(Ok(Incoming::Empty)) => return,
        Ok(Ok(Incoming::TooLarge)) => shared.reject_oversized(),
        Ok(Ok(Incoming::Message(raw))) => shared.dispatch(&raw).await,
    };

    let mut payload = response.to_json().into_bytes();
    payload.push(b'\n');
    let write = async {
        stream.write_all(&payload).await?;
        stream.shutdown().await
    };
    match tokio::time::timeout(shared.timeout, write).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "failed to write response"),
        Err(_) => debug!("client timed out reading the response"),
    }
}

/// Reads until EOF or the first newline.
///
/// Past the size limit the rest of the message is read and discarded, so the
/// socket is never closed with unread input (the peer would see a reset
/// instead of the error reply).
async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Incoming> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0_u8; 4096];
    let mut oversized = false;
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let newline = chunk[..n].iter().position(|b| *b == b'\n');
        if !oversized {
            buf.extend_from_slice(&chunk[..newline.unwrap_or(n)]);
            if buf.len() > MAX_MESSAGE_SIZE {
                oversized = true;
                buf = Vec::new();
            }
        }
        if newline.is_some() {
            break;
        }
    }
    if oversized {
        return Ok(Incoming::TooLarge);
    }
    if buf.iter().all(u8::is_ascii_whitespace) {
        Ok(Incoming::Empty)
    } else {
        Ok(Incoming::Message(buf))
    }
}

impl Shared {
    /// Counts a received message against the rate window.
    fn admit(&self) -> Result<(), Response> {
        self.served.fetch_add(1, Ordering::Relaxed);
        if self.limiter.allow() {
            Ok(())
        } else {
            Err(Response::err(ErrorCode::RateLimited, "rate limit exceeded"))
        }
    }

    fn reject_oversized(&self) -> Response {
        if let Err(limited) = self.admit() {
            return limited;
        }
        Response::err(
            ErrorCode::InvalidRequest,
            format!("message exceeds {MAX_MESSAGE_SIZE} bytes"),
        )
    }

    async fn dispatch(&self, raw: &[u8]) -> Response {
        if let Err(limited) = self.admit() {
            return limited;
        }

        let Ok(text) = std::str::from_utf8(raw) else {
            return Response::err(ErrorCode::ParseError, "request is not valid UTF-8");
        };
        let request = match Request::parse(text.trim()) {
            Ok(request) => request,
            Err(e) => return e.into(),
        };

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.method)
            .cloned();
        let Some(handler) = handler else {
            return Response::err(
                ErrorCode::MethodNotFound,
                format!("unknown method: {}", request.method),
            );
        };

        let method = request.method.clone();
        debug!(method = %method, "dispatching request");
        match tokio::spawn(async move { handler.handle(request).await }).await {
            Ok(result) => result.into(),
            Err(e) if e.is_panic() => {
                error!(method = %method, "handler panicked");
                Response::err(ErrorCode::InternalError, "internal error")
            }
            Err(_) => Response::err(ErrorCode::InternalError, "handler cancelled"),
        }
    }
}
