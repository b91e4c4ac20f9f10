//! # Configuración del Puente
//! src/config.rs
//!
//! Configuración del servidor HTTP, del pump y de los timeouts con soporte
//! para argumentos CLI y variables de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./host_bridge --port 8765 \
//!   --tick-interval-ms 20 \
//!   --max-tasks-per-tick 32 \
//!   --default-timeout-ms 10000
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! BRIDGE_PORT=9000 BRIDGE_HOST=0.0.0.0 RUST_LOG=debug ./host_bridge
//! ```

use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::bridge::BridgeSettings;
use crate::error::ConfigError;
use crate::logging;

/// Configuración del puente
#[derive(Debug, Clone, Parser)]
#[command(name = "host_bridge")]
#[command(about = "Puente HTTP concurrente hacia una API de host de un solo hilo")]
#[command(version)]
pub struct Config {
    /// Host/IP en el que escucha
    #[arg(long, default_value = "127.0.0.1", env = "BRIDGE_HOST")]
    pub host: String,

    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8765", env = "BRIDGE_PORT")]
    pub port: u16,

    // === Pump ===

    /// Cada cuánto el main loop llama al pump si no hay trabajo nuevo
    #[arg(long = "tick-interval-ms", default_value = "20", env = "BRIDGE_TICK_INTERVAL_MS")]
    pub tick_interval_ms: u64,

    /// Máximo de tasks ejecutados por tick
    #[arg(long = "max-tasks-per-tick", default_value = "32", env = "BRIDGE_MAX_TASKS_PER_TICK")]
    pub max_tasks_per_tick: usize,

    /// Presupuesto de tiempo por tick; lo que sobra pasa al siguiente
    #[arg(long = "tick-budget-ms", default_value = "12", env = "BRIDGE_TICK_BUDGET_MS")]
    pub tick_budget_ms: u64,

    // === Cola ===

    /// Edad a partir de la cual un task pendiente sube al frente
    #[arg(long = "starvation-age-ms", default_value = "2000", env = "BRIDGE_STARVATION_AGE_MS")]
    pub starvation_age_ms: u64,

    /// Capacidad máxima de la cola (503 al llenarse)
    #[arg(long = "queue-capacity", default_value = "1024", env = "BRIDGE_QUEUE_CAPACITY")]
    pub queue_capacity: usize,

    // === Timeouts ===

    /// Timeout de espera por defecto en milisegundos
    #[arg(long = "default-timeout-ms", default_value = "10000", env = "BRIDGE_DEFAULT_TIMEOUT_MS")]
    pub default_timeout_ms: u64,

    /// Tope para `?timeout_ms=` en milisegundos
    #[arg(long = "max-timeout-ms", default_value = "60000", env = "BRIDGE_MAX_TIMEOUT_MS")]
    pub max_timeout_ms: u64,

    // === HTTP ===

    /// Tamaño máximo del body (413 si se excede)
    #[arg(long = "max-body-bytes", default_value = "1048576", env = "BRIDGE_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Nivel de log si `RUST_LOG` no está definido
    #[arg(long = "log-level", default_value = "info", env = "BRIDGE_LOG_LEVEL")]
    pub log_level: String,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use host_bridge::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "127.0.0.1:8765");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("tick interval", self.tick_interval_ms),
            ("max tasks per tick", self.max_tasks_per_tick as u64),
            ("tick budget", self.tick_budget_ms),
            ("starvation age", self.starvation_age_ms),
            ("queue capacity", self.queue_capacity as u64),
            ("default timeout", self.default_timeout_ms),
            ("max timeout", self.max_timeout_ms),
            ("max body bytes", self.max_body_bytes as u64),
        ];
        if let Some(&(name, _)) = required.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(name));
        }

        if self.default_timeout_ms > self.max_timeout_ms {
            return Err(ConfigError::TimeoutOrder {
                default_ms: self.default_timeout_ms,
                max_ms: self.max_timeout_ms,
            });
        }

        if self.tick_budget_ms > self.tick_interval_ms {
            return Err(ConfigError::BudgetExceedsInterval {
                budget_ms: self.tick_budget_ms,
                interval_ms: self.tick_interval_ms,
            });
        }

        logging::parse_level(&self.log_level)?;

        Ok(())
    }

    /// Parámetros de la cola, el pump y los timeouts
    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            queue_capacity: self.queue_capacity,
            starvation_age: Duration::from_millis(self.starvation_age_ms),
            max_tasks_per_tick: self.max_tasks_per_tick,
            tick_budget: Duration::from_millis(self.tick_budget_ms),
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            max_timeout: Duration::from_millis(self.max_timeout_ms),
        }
    }

    /// Registra la configuración efectiva
    pub fn log_summary(&self) {
        info!(address = %self.address(), max_body_bytes = self.max_body_bytes, "http");
        info!(
            tick_interval_ms = self.tick_interval_ms,
            max_tasks_per_tick = self.max_tasks_per_tick,
            tick_budget_ms = self.tick_budget_ms,
            "pump"
        );
        info!(
            capacity = self.queue_capacity,
            starvation_age_ms = self.starvation_age_ms,
            "queue"
        );
        info!(
            default_ms = self.default_timeout_ms,
            max_ms = self.max_timeout_ms,
            "timeouts"
        );
    }
}

impl Default for Config {
    /// Configuración por defecto
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8765,
            tick_interval_ms: 20,
            max_tasks_per_tick: 32,
            tick_budget_ms: 12,
            starvation_age_ms: 2_000,
            queue_capacity: 1024,
            default_timeout_ms: 10_000,
            max_timeout_ms: 60_000,
            max_body_bytes: 1024 * 1024,
            log_level: "info".to_string(),
        }
    }
}
