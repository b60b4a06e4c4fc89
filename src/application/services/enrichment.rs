use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::prompt_builder::PromptBuilder;
use crate::domain::entities::AlertRequest;
use crate::domain::ports::{AlertStore, BackendError, EnrichmentBackend, StoreError};
use crate::domain::value_objects::Severity;

/// `source` recorded on secondary alerts.
pub const ENRICHMENT_SOURCE: &str = "ai_enrichment";

/// Generation parameters passed to the backend for every task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentSettings {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        Self {
            max_tokens: 150,
            temperature: 0.3,
            timeout: Duration::from_secs(30),
        }
    }
}

struct EnrichmentTask {
    handle: JoinHandle<()>,
    done: Arc<AtomicBool>,
}

/// Sets the task's `done` flag when dropped, whichever way the task body exits.
struct DoneGuard(Arc<AtomicBool>);

impl Drop for DoneGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Everything a task body needs. The store is weak so a task never keeps it alive.
#[derive(Clone)]
struct TaskContext {
    store: Weak<dyn AlertStore>,
    backend: Arc<dyn EnrichmentBackend>,
    liveness: Arc<AtomicBool>,
    settings: EnrichmentSettings,
}

/// Persists alerts and runs the AI enrichment of each one in the background.
///
/// Finished tasks are swept before every spawn, so the tracked list only
/// grows with work that is genuinely in flight. [`shutdown`](Self::shutdown)
/// drains whatever is left.
pub struct AlertEnrichmentPool {
    ctx: TaskContext,
    tasks: Mutex<Vec<EnrichmentTask>>,
    closed: AtomicBool,
}

impl AlertEnrichmentPool {
    #[must_use]
    pub fn new(
        store: &Arc<dyn AlertStore>,
        backend: Arc<dyn EnrichmentBackend>,
        liveness: Arc<AtomicBool>,
        settings: EnrichmentSettings,
    ) -> Self {
        Self {
            ctx: TaskContext {
                store: Arc::downgrade(store),
                backend,
                liveness,
                settings,
            },
            tasks: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.ctx.backend.name()
    }

    /// Stores the alert and, when a backend is configured, schedules its enrichment.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is gone or rejects the alert; nothing is spawned then.
    pub fn submit(&self, request: &AlertRequest) -> Result<String, StoreError> {
        let store = self.ctx.store.upgrade().ok_or(StoreError::Unavailable)?;
        let alert_id = store.create(request)?;
        drop(store);

        if !self.ctx.backend.is_configured() {
            return Ok(alert_id);
        }

        let mut tasks = self.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        if self.closed.load(Ordering::Acquire) {
            debug!(alert_id = %alert_id, "pool closed, enrichment not scheduled");
            return Ok(alert_id);
        }
        tasks.retain(|task| !task.done.load(Ordering::Acquire));

        let done = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(enrich(
            self.ctx.clone(),
            alert_id.clone(),
            request.clone(),
            DoneGuard(Arc::clone(&done)),
        ));
        tasks.push(EnrichmentTask { handle, done });
        debug!(alert_id = %alert_id, in_flight = tasks.len(), "enrichment scheduled");
        drop(tasks);

        Ok(alert_id)
    }

    /// Number of tasks still tracked (finished ones linger until the next sweep).
    #[must_use]
    pub fn pending(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Refuses new work and waits for every tracked task to finish.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return;
        }
        info!(count = tasks.len(), "waiting for enrichment tasks");
        for task in tasks {
            if let Err(e) = task.handle.await {
                warn!(error = %e, "enrichment task ended abnormally");
            }
        }
    }
}

async fn enrich(ctx: TaskContext, parent_id: String, request: AlertRequest, _guard: DoneGuard) {
    if !ctx.liveness.load(Ordering::Acquire) {
        debug!(parent_alert_id = %parent_id, "monitor stopped, enrichment skipped");
        return;
    }

    let outcome = generate(&ctx, &request).await;

    if !ctx.liveness.load(Ordering::Acquire) {
        debug!(parent_alert_id = %parent_id, "monitor stopped, enrichment result dropped");
        return;
    }
    let Some(store) = ctx.store.upgrade() else {
        debug!(parent_alert_id = %parent_id, "alert store gone, enrichment result dropped");
        return;
    };

    let secondary = secondary_alert(&parent_id, &request, outcome);
    match store.create(&secondary) {
        Ok(id) => info!(parent_alert_id = %parent_id, alert_id = %id, "AI analysis stored"),
        Err(e) => warn!(parent_alert_id = %parent_id, error = %e, "failed to store AI analysis"),
    }
}

/// Runs the backend call in its own task so a panic there is contained.
async fn generate(ctx: &TaskContext, request: &AlertRequest) -> Result<String, String> {
    let backend = Arc::clone(&ctx.backend);
    let prompt = PromptBuilder::build(request);
    let EnrichmentSettings {
        max_tokens,
        temperature,
        timeout,
    } = ctx.settings;

    let call = tokio::spawn(async move {
        tokio::time::timeout(timeout, backend.generate(&prompt, max_tokens, temperature)).await
    });

    match call.await {
        Ok(Ok(Ok(text))) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        Ok(Ok(Ok(_))) => Err(BackendError::EmptyResponse.to_string()),
        Ok(Ok(Err(e))) => Err(e.to_string()),
        Ok(Err(_)) => Err(BackendError::Timeout.to_string()),
        Err(e) if e.is_panic() => Err("backend panicked".to_string()),
        Err(_) => Err("backend call cancelled".to_string()),
    }
}

fn secondary_alert(
    parent_id: &str,
    request: &AlertRequest,
    outcome: Result<String, String>,
) -> AlertRequest {
    let mut metadata = BTreeMap::new();
    metadata.insert("parent_alert_id".to_string(), parent_id.to_string());

    let (title, message) = match outcome {
        Ok(text) => {
            metadata.insert("ai_enhanced".to_string(), "true".to_string());
            (format!("AI analysis: {}", request.title), text)
        }
        Err(error) => {
            metadata.insert("ai_enhanced".to_string(), "false".to_string());
            (
                format!("AI analysis unavailable: {}", request.title),
                format!("{}\n\nAnalysis failed: {error}", request.ai_context),
            )
        }
    };

    AlertRequest {
        severity: Severity::Info,
        category: request.category,
        source: ENRICHMENT_SOURCE.to_string(),
        title,
        message,
        ai_context: String::new(),
        metadata,
    }
}
