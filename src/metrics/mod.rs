//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Recolección y agregación de métricas del front HTTP:
//! - Contadores de requests por status y por patrón de ruta
//! - Latencias (p50, p95, p99)
//! - Conexiones activas
//!
//! Las métricas de la cola y del pump viven en `bridge` (`QueueStats`,
//! `PumpStats`).

pub mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot, UNMATCHED_ROUTE};
