//! # Logging
//! src/logging.rs
//!
//! Subscriber de `tracing` para el binario. `RUST_LOG` tiene prioridad
//! sobre `--log-level`.

use tracing_subscriber::EnvFilter;

use crate::error::ConfigError;

/// Niveles aceptados por `--log-level`
pub const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valida un nivel de `--log-level`
pub fn parse_level(level: &str) -> Result<String, ConfigError> {
    let normalized = level.trim().to_ascii_lowercase();
    if LEVELS.contains(&normalized.as_str()) {
        Ok(normalized)
    } else {
        Err(ConfigError::LogLevel(level.to_string()))
    }
}

/// Instala el subscriber global
///
/// Retorna `false` si ya había uno instalado (tests, o una segunda
/// llamada), en cuyo caso no hace nada.
pub fn init(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("INFO").unwrap(), "info");
        assert_eq!(parse_level(" debug ").unwrap(), "debug");
        assert_eq!(
            parse_level("loud"),
            Err(ConfigError::LogLevel("loud".to_string()))
        );
    }

    #[test]
    fn test_init_is_idempotent() {
        init("info");
        assert!(!init("debug"));
    }
}
