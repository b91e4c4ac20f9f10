//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega métricas de requests en tiempo real. Las rutas se
//! agrupan por patrón (`/documents/{doc_id}`), no por path concreto, para
//! que la tabla no crezca con cada id.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{json, Value};

/// Máximo de latencias a guardar para calcular percentiles
const MAX_LATENCIES: usize = 10_000;

/// Etiqueta para requests que no resolvieron a ninguna ruta
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

/// Datos internos de métricas
struct MetricsData {
    /// Contador total de requests
    total_requests: u64,

    /// Requests por código de estado
    status_codes: HashMap<u16, u64>,

    /// Latencias registradas (en microsegundos), las más recientes
    latencies: VecDeque<u64>,

    /// Requests por patrón de ruta
    requests_per_route: HashMap<String, u64>,

    /// Conexiones siendo atendidas ahora
    active_connections: u64,
}

impl MetricsCollector {
    /// Crea un nuevo collector de métricas
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                total_requests: 0,
                status_codes: HashMap::new(),
                latencies: VecDeque::with_capacity(MAX_LATENCIES),
                requests_per_route: HashMap::new(),
                active_connections: 0,
            })),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra un request terminado
    pub fn record_request(&self, route: &str, status_code: u16, latency: Duration) {
        let mut data = self.lock();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);

        *data.requests_per_route.entry(route.to_string()).or_insert(0) += 1;
    }

    /// Incrementa el contador de conexiones activas
    pub fn connection_opened(&self) {
        self.lock().active_connections += 1;
    }

    /// Decrementa el contador de conexiones activas
    pub fn connection_closed(&self) {
        let mut data = self.lock();
        data.active_connections = data.active_connections.saturating_sub(1);
    }

    pub fn active_connections(&self) -> u64 {
        self.lock().active_connections
    }

    /// Obtiene las métricas actuales como JSON
    pub fn get_metrics_json(&self) -> Value {
        let data = self.lock();
        let latency = LatencySummary::from_window(&data.latencies);

        let status_codes: serde_json::Map<String, Value> = data
            .status_codes
            .iter()
            .map(|(code, count)| (code.to_string(), json!(count)))
            .collect();

        let mut status_classes = serde_json::Map::new();
        for (code, count) in &data.status_codes {
            let class = format!("{}xx", code / 100);
            let entry = status_classes.entry(class).or_insert(json!(0));
            *entry = json!(entry.as_u64().unwrap_or(0) + count);
        }

        // Top 10 rutas más accedidas
        let mut routes: Vec<_> = data.requests_per_route.iter().collect();
        routes.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        let top_routes: Vec<Value> = routes
            .iter()
            .take(10)
            .map(|(route, count)| json!({ "route": route, "count": count }))
            .collect();

        json!({
            "server": {
                "uptime_seconds": self.start_time.elapsed().as_secs(),
            },
            "requests": {
                "total": data.total_requests,
                "active_connections": data.active_connections,
                "status_codes": status_codes,
                "status_classes": status_classes,
                "top_routes": top_routes,
            },
            "latency_us": {
                "p50": latency.p50,
                "p95": latency.p95,
                "p99": latency.p99,
                "avg": latency.avg,
                "stddev": (latency.stddev * 100.0).round() / 100.0,
                "samples": data.latencies.len(),
            }
        })
    }

    /// Obtiene un snapshot de las métricas
    pub fn get_snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();
        let latency = LatencySummary::from_window(&data.latencies);

        MetricsSnapshot {
            total_requests: data.total_requests,
            active_connections: data.active_connections,
            gateway_timeouts: data.status_codes.get(&504).copied().unwrap_or(0),
            uptime_secs: self.start_time.elapsed().as_secs(),
            latency_p50_us: latency.p50,
            latency_p95_us: latency.p95,
            latency_p99_us: latency.p99,
            latency_avg_us: latency.avg,
        }
    }

    /// Cantidad de requests registrados para un patrón
    pub fn route_count(&self, route: &str) -> u64 {
        self.lock().requests_per_route.get(route).copied().unwrap_or(0)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Resumen de una ventana de latencias
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct LatencySummary {
    p50: u64,
    p95: u64,
    p99: u64,
    avg: u64,
    stddev: f64,
}

impl LatencySummary {
    fn from_window(window: &VecDeque<u64>) -> Self {
        if window.is_empty() {
            return Self::default();
        }

        let mut sorted: Vec<u64> = window.iter().copied().collect();
        sorted.sort_unstable();

        let count = sorted.len() as f64;
        let mean = sorted.iter().sum::<u64>() as f64 / count;
        let variance = sorted
            .iter()
            .map(|&sample| (sample as f64 - mean).powi(2))
            .sum::<f64>()
            / count;

        Self {
            p50: nearest_rank(&sorted, 50),
            p95: nearest_rank(&sorted, 95),
            p99: nearest_rank(&sorted, 99),
            avg: mean.round() as u64,
            stddev: variance.sqrt(),
        }
    }
}

/// Percentil por rango más cercano sobre datos ordenados no vacíos
fn nearest_rank(sorted: &[u64], percentile: usize) -> u64 {
    let rank = (percentile * sorted.len()).div_ceil(100).max(1);
    sorted[rank - 1]
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub active_connections: u64,

    /// Requests que vencieron esperando al main thread (504)
    pub gateway_timeouts: u64,
    pub uptime_secs: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
    pub latency_avg_us: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector() {
        let collector = MetricsCollector::new();

        collector.record_request("/documents", 200, Duration::from_millis(10));
        collector.record_request("/documents", 201, Duration::from_millis(20));
        collector.record_request(UNMATCHED_ROUTE, 404, Duration::from_millis(5));

        let snapshot = collector.get_snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(collector.route_count("/documents"), 2);
    }

    #[test]
    fn test_percentiles() {
        let collector = MetricsCollector::new();
        for i in 1..=100 {
            collector.record_request("/health", 200, Duration::from_micros(i));
        }

        let snapshot = collector.get_snapshot();
        assert!(snapshot.latency_p50_us > 0);
        assert!(snapshot.latency_p95_us > snapshot.latency_p50_us);
        assert!(snapshot.latency_p99_us > snapshot.latency_p95_us);
    }

    #[test]
    fn test_active_connections_no_negative() {
        let collector = MetricsCollector::new();

        collector.connection_opened();
        collector.connection_opened();
        assert_eq!(collector.active_connections(), 2);

        collector.connection_closed();
        collector.connection_closed();
        collector.connection_closed();
        assert_eq!(collector.active_connections(), 0);
    }

    #[test]
    fn test_json_format() {
        let collector = MetricsCollector::new();
        collector.record_request("/documents/{doc_id}", 504, Duration::from_millis(50));
        collector.record_request("/documents/{doc_id}", 200, Duration::from_millis(30));
        collector.record_request("/health", 200, Duration::from_millis(1));

        let json = collector.get_metrics_json();
        assert_eq!(json["requests"]["total"], 3);
        assert_eq!(json["requests"]["status_codes"]["504"], 1);
        assert_eq!(json["requests"]["top_routes"][0]["route"], "/documents/{doc_id}");
        assert_eq!(json["requests"]["top_routes"][0]["count"], 2);
        assert_eq!(json["latency_us"]["samples"], 3);
        assert_eq!(json["requests"]["status_classes"]["2xx"], 2);
        assert_eq!(json["requests"]["status_classes"]["5xx"], 1);
        assert_eq!(collector.get_snapshot().gateway_timeouts, 1);
    }

    #[test]
    fn test_nearest_rank() {
        let sorted: Vec<u64> = (1..=100).collect();
        assert_eq!(nearest_rank(&sorted, 50), 50);
        assert_eq!(nearest_rank(&sorted, 99), 99);
        assert_eq!(nearest_rank(&[7], 95), 7);
    }

    #[test]
    fn test_latency_window_management() {
        let collector = MetricsCollector::new();
        for i in 0..15_000 {
            collector.record_request("/health", 200, Duration::from_micros(i));
        }

        assert_eq!(collector.get_snapshot().total_requests, 15_000);
        assert_eq!(collector.get_metrics_json()["latency_us"]["samples"], MAX_LATENCIES);
    }
}
