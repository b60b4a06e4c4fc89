use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::Notify;
use tracing::{info, warn};

use crate::application::config::ConfigManager;
use crate::application::services::{AlertEnrichmentPool, HealthCheckScheduler};
use crate::domain::entities::{AlertFilter, HealthSnapshot};
use crate::domain::ports::{AlertStore, StoreError};
use crate::domain::value_objects::{AlertCategory, AlertStatus, Severity};
use crate::infrastructure::ipc::{ErrorCode, ProtocolError, Request, RequestDispatcher};

/// Result of the `status` method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub name: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Whether the health check scheduler is running.
    pub running: bool,
    pub check_interval_secs: u64,
    pub llm_backend: String,
    /// Enrichment tasks still tracked by the pool.
    pub enrichment_pending: usize,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub health: HealthSnapshot,
}

/// Daemon state the socket methods read and act on.
pub struct DaemonContext {
    pub config: Arc<ConfigManager>,
    pub store: Arc<dyn AlertStore>,
    pub scheduler: Arc<HealthCheckScheduler>,
    pub pool: Arc<AlertEnrichmentPool>,
    /// Notified once when a client asks the daemon to exit.
    pub shutdown: Arc<Notify>,
    pub started_at: Instant,
}

impl DaemonContext {
    fn status(&self) -> Result<Value, ProtocolError> {
        let report = StatusReport {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: self.started_at.elapsed().as_secs(),
            running: self.scheduler.is_running(),
            check_interval_secs: self.scheduler.interval().as_secs(),
            llm_backend: self.pool.backend_name().to_string(),
            enrichment_pending: self.pool.pending(),
            active_alerts: self.store.count_active().map_err(store_error)?,
            critical_alerts: self
                .store
                .count_by_severity(Severity::Critical)
                .map_err(store_error)?,
            health: self.scheduler.snapshot(),
        };
        to_value(&report)
    }

    async fn health(&self, request: &Request) -> Result<Value, ProtocolError> {
        let snapshot = if request.bool_param("refresh")?.unwrap_or(false) {
            self.scheduler.force_check().await
        } else {
            self.scheduler.snapshot()
        };
        to_value(&snapshot)
    }

    fn updates(&self) -> Result<Value, ProtocolError> {
        let updates = self.scheduler.pending_updates();
        let security = updates.iter().filter(|u| u.is_security).count();
        Ok(json!({
            "count": updates.len(),
            "security": security,
            "packages": updates,
        }))
    }

    fn alerts(&self, request: &Request) -> Result<Value, ProtocolError> {
        let filter = AlertFilter {
            severity: parse_param::<Severity>(request, "severity")?,
            category: parse_param::<AlertCategory>(request, "category")?,
            status: parse_param::<AlertStatus>(request, "status")?,
            include_dismissed: request.bool_param("include_dismissed")?.unwrap_or(false),
        };
        let alerts = self.store.list(&filter).map_err(store_error)?;
        Ok(json!({ "count": alerts.len(), "alerts": alerts }))
    }

    fn alert(&self, request: &Request) -> Result<Value, ProtocolError> {
        let id = required_id(request)?;
        let alert = self
            .store
            .get(id)
            .map_err(store_error)?
            .ok_or_else(|| not_found(id))?;
        to_value(&alert)
    }

    fn acknowledge(&self, request: &Request) -> Result<Value, ProtocolError> {
        if request.bool_param("all")?.unwrap_or(false) {
            let count = self.store.acknowledge_all().map_err(store_error)?;
            info!(count, "alerts acknowledged");
            return Ok(json!({ "acknowledged_count": count }));
        }
        let id = required_id(request)?;
        self.ensure_exists(id)?;
        let changed = self.store.acknowledge(id).map_err(store_error)?;
        Ok(json!({ "id": id, "acknowledged": changed }))
    }

    fn dismiss(&self, request: &Request) -> Result<Value, ProtocolError> {
        if request.bool_param("all")?.unwrap_or(false) {
            let count = self.store.dismiss_all().map_err(store_error)?;
            info!(count, "alerts dismissed");
            return Ok(json!({ "dismissed_count": count }));
        }
        let id = required_id(request)?;
        self.ensure_exists(id)?;
        let changed = self.store.dismiss(id).map_err(store_error)?;
        Ok(json!({ "id": id, "dismissed": changed }))
    }

    fn ensure_exists(&self, id: &str) -> Result<(), ProtocolError> {
        match self.store.get(id).map_err(store_error)? {
            Some(_) => Ok(()),
            None => Err(not_found(id)),
        }
    }

    fn config_get(&self) -> Result<Value, ProtocolError> {
        let config = self.config.get();
        Ok(json!({
            "path": self.config.path().display().to_string(),
            "config": to_value(&config)?,
        }))
    }

    fn config_reload(&self) -> Result<Value, ProtocolError> {
        let config = self.config.reload().map_err(|e| {
            warn!("config reload failed: {e:#}");
            ProtocolError::new(ErrorCode::ConfigError, format!("{e:#}"))
        })?;
        let interval = config.check_interval();
        self.scheduler.set_interval(interval);
        self.scheduler.set_thresholds(config.thresholds());
        info!(interval_secs = interval.as_secs(), "configuration reloaded");
        Ok(json!({
            "reloaded": true,
            "check_interval_secs": interval.as_secs(),
        }))
    }

    fn request_shutdown(&self) -> Value {
        info!("shutdown requested over the socket");
        self.shutdown.notify_one();
        json!({ "shutdown": "initiated" })
    }
}

/// Register every daemon method on `dispatcher`.
pub fn register_all(dispatcher: &RequestDispatcher, ctx: &Arc<DaemonContext>) {
    route(dispatcher, ctx, "ping", |_, _| async {
        Ok::<_, ProtocolError>(json!({ "pong": true }))
    });
    route(dispatcher, ctx, "version", |_, _| async {
        Ok::<_, ProtocolError>(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }))
    });
    route(dispatcher, ctx, "status", |ctx, _| async move { ctx.status() });
    route(dispatcher, ctx, "health", |ctx, req| async move {
        ctx.health(&req).await
    });
    route(dispatcher, ctx, "check", |ctx, _| async move {
        ctx.scheduler.trigger_check();
        Ok::<_, ProtocolError>(json!({ "triggered": true }))
    });
    route(dispatcher, ctx, "updates", |ctx, _| async move { ctx.updates() });
    route(dispatcher, ctx, "alerts", |ctx, req| async move { ctx.alerts(&req) });
    route(dispatcher, ctx, "alerts.get", |ctx, req| async move {
        ctx.alert(&req)
    });
    route(dispatcher, ctx, "alerts.acknowledge", |ctx, req| async move {
        ctx.acknowledge(&req)
    });
    route(dispatcher, ctx, "alerts.dismiss", |ctx, req| async move {
        ctx.dismiss(&req)
    });
    route(dispatcher, ctx, "config.get", |ctx, _| async move {
        ctx.config_get()
    });
    route(dispatcher, ctx, "config.reload", |ctx, _| async move {
        ctx.config_reload()
    });
    route(dispatcher, ctx, "shutdown", |ctx, _| async move {
        Ok::<_, ProtocolError>(ctx.request_shutdown())
    });
}

fn route<F, Fut>(dispatcher: &RequestDispatcher, ctx: &Arc<DaemonContext>, method: &str, f: F)
where
    F: Fn(Arc<DaemonContext>, Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ProtocolError>> + Send + 'static,
{
    let ctx = Arc::clone(ctx);
    dispatcher.register_handler(method, move |request: Request| {
        f(Arc::clone(&ctx), request)
    });
}

fn parse_param<T: FromStr<Err = String>>(
    request: &Request,
    key: &str,
) -> Result<Option<T>, ProtocolError> {
    request
        .str_param(key)?
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| ProtocolError::invalid_params(format!("'{key}': {e}")))
        })
        .transpose()
}

fn required_id(request: &Request) -> Result<&str, ProtocolError> {
    match request.str_param("id")? {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(ProtocolError::invalid_params("'id' is required")),
    }
}

fn not_found(id: &str) -> ProtocolError {
    ProtocolError::new(ErrorCode::AlertNotFound, format!("alert not found: {id}"))
}

fn store_error(err: StoreError) -> ProtocolError {
    ProtocolError::internal(err.to_string())
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(value).map_err(|e| ProtocolError::internal(e.to_string()))
}
