//! # Módulo `system`
//! src/handlers/system.rs
//!
//! Endpoints de introspección. Ninguno toca el host, así que se responden
//! directo en el thread de la conexión, sin pasar por el pump.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::info;

use crate::bridge::BridgeMonitor;
use crate::http::{Method, Response, StatusCode};
use crate::metrics::MetricsCollector;
use crate::modules::{ModuleDescriptor, Registry, RegistrySlot};
use crate::router::handler;
use crate::runtime::Shutdown;

pub const MODULE_NAME: &str = "system";

/// Estado compartido por los handlers de `system`
#[derive(Clone)]
pub struct SystemContext {
    pub registry: RegistrySlot,
    pub monitor: Arc<dyn BridgeMonitor>,
    pub metrics: MetricsCollector,
    pub shutdown: Shutdown,
    pub host_name: String,
    pub started_at: Instant,
}

impl SystemContext {
    /// El registry todavía no existe mientras se cargan los módulos
    fn registry(&self) -> Result<&Arc<Registry>, Response> {
        self.registry.get().ok_or_else(|| {
            Response::error(
                StatusCode::ServiceUnavailable,
                "starting",
                "module registry is not published yet",
            )
        })
    }
}

pub fn module(ctx: SystemContext) -> ModuleDescriptor {
    let ctx = Arc::new(ctx);

    ModuleDescriptor::new(MODULE_NAME, "system")
        .route("/health", &[Method::GET], "Liveness and basic status", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| health(&ctx))
        })
        .route("/system/routes", &[Method::GET], "Route table", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| match ctx.registry() {
                Ok(registry) => {
                    let routes = registry.router().route_table();
                    Response::json(
                        StatusCode::Ok,
                        &json!({ "count": routes.len(), "routes": routes }),
                    )
                }
                Err(response) => response,
            })
        })
        .route("/system/modules", &[Method::GET], "Loaded and skipped modules", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| match ctx.registry() {
                Ok(registry) => Response::json(
                    StatusCode::Ok,
                    &json!({
                        "loaded": registry.loaded().count(),
                        "skipped": registry.skipped().count(),
                        "modules": registry.modules(),
                    }),
                ),
                Err(response) => response,
            })
        })
        .route("/system/queue", &[Method::GET], "Task queue and pump statistics", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| {
                Response::json(
                    StatusCode::Ok,
                    &json!({
                        "queue": ctx.monitor.queue_stats(),
                        "pump": ctx.monitor.pump_stats(),
                    }),
                )
            })
        })
        .route("/metrics", &[Method::GET], "Request metrics", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| Response::json(StatusCode::Ok, &ctx.metrics.get_metrics_json()))
        })
        .route("/system/shutdown", &[Method::POST], "Stop the main loop", {
            let ctx = Arc::clone(&ctx);
            handler(move |_, _| {
                info!("shutdown requested over HTTP");
                ctx.shutdown.request();
                Response::json(StatusCode::Accepted, &json!({ "status": "shutting_down" }))
            })
        })
}

fn health(ctx: &SystemContext) -> Response {
    let queue = ctx.monitor.queue_stats();
    let pump = ctx.monitor.pump_stats();
    let modules_loaded = ctx.registry.get().map(|r| r.loaded().count()).unwrap_or(0);

    Response::json(
        StatusCode::Ok,
        &json!({
            "status": if queue.closed { "shutting_down" } else { "ok" },
            "host": ctx.host_name,
            "uptime_seconds": ctx.started_at.elapsed().as_secs(),
            "modules_loaded": modules_loaded,
            "queue_pending": queue.pending,
            "pump_waiting": pump.waiting,
        }),
    )
}
