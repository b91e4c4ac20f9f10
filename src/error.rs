//! # Taxonomía de errores
//! src/error.rs
//!
//! Todos los errores del puente viven aquí para que el mapeo a respuestas
//! HTTP (`handlers::error_response`) tenga un solo lugar de referencia.
//!
//! | Error               | Cuándo                                   | Efecto                     |
//! |---------------------|------------------------------------------|----------------------------|
//! | `RoutingError`      | resolve() sin ruta o sin método          | 404 / 405                  |
//! | `RegistrationError` | rutas duplicadas o ambiguas al arrancar  | fatal en startup           |
//! | `ModuleLoadError`   | dependencia faltante, módulo malformado  | módulo excluido, se loguea |
//! | `TaskExecutionError`| la operación falló en el main thread     | viaja por el Result Channel|
//! | `BridgeError`       | timeout, cola llena, puente cerrado      | 504 / 503                  |

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::bridge::TaskId;
use crate::http::Method;

/// Errores de resolución de rutas
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Ningún patrón coincide con el path
    #[error("route not found: {path}")]
    NotFound { path: String },

    /// El path existe pero no acepta el método
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        path: String,
        method: Method,
        allowed: Vec<Method>,
    },
}

/// Errores al parsear un patrón de ruta
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern must start with '/': {0}")]
    MissingLeadingSlash(String),

    #[error("invalid placeholder '{segment}' in pattern {pattern}")]
    InvalidPlaceholder { pattern: String, segment: String },

    #[error("placeholder '{name}' appears more than once in pattern {pattern}")]
    DuplicatePlaceholder { pattern: String, name: String },
}

/// Errores de registro de rutas (siempre fatales en startup)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("duplicate route {method} {pattern} (collides with {existing})")]
    Duplicate {
        method: Method,
        pattern: String,
        existing: String,
    },

    #[error("ambiguous routes for {method}: {pattern} and {existing} match the same paths with equal specificity")]
    Ambiguous {
        method: Method,
        pattern: String,
        existing: String,
    },

    #[error("route {pattern} declares no methods")]
    NoMethods { pattern: String },

    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
}

/// Motivo por el que un módulo quedó fuera del registry
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleLoadError {
    #[error("module {module} requires '{dependency}', which is not available")]
    MissingDependency { module: String, dependency: String },

    #[error("module '{module}' is malformed: {reason}")]
    Malformed { module: String, reason: String },
}

/// Error devuelto por una operación ejecutada sobre el host
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("host error: {0}")]
    Host(String),
}

impl OperationError {
    /// Código estable para el body de error
    pub fn code(&self) -> &'static str {
        match self {
            OperationError::InvalidInput(_) => "invalid_input",
            OperationError::NotFound(_) => "not_found",
            OperationError::Conflict(_) => "conflict",
            OperationError::Host(_) => "host_error",
        }
    }
}

/// Por qué falló un task en el pump
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("{0}")]
    Operation(OperationError),

    #[error("operation panicked: {0}")]
    Panicked(String),

    #[error("task was dropped before it could execute")]
    NotExecuted,
}

/// Falla de un task, con el contexto del módulo que lo envió
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task_id} ({module}::{operation}) failed: {reason}")]
pub struct TaskExecutionError {
    pub task_id: TaskId,
    pub module: String,
    pub operation: String,
    pub reason: FailureReason,
}

impl TaskExecutionError {
    pub fn code(&self) -> &'static str {
        match &self.reason {
            FailureReason::Operation(err) => err.code(),
            FailureReason::Panicked(_) => "operation_panicked",
            FailureReason::NotExecuted => "not_executed",
        }
    }
}

/// Errores vistos por quien envía un task
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// El waiter se rindió; el task sigue en cola y puede ejecutarse luego
    #[error("timed out after {waited:?} waiting for task {task_id}")]
    Timeout { task_id: TaskId, waited: Duration },

    #[error(transparent)]
    Execution(#[from] TaskExecutionError),

    #[error("task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("bridge is shut down")]
    Closed,
}

/// Errores de validación de configuración
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("default timeout ({default_ms} ms) exceeds max timeout ({max_ms} ms)")]
    TimeoutOrder { default_ms: u64, max_ms: u64 },

    #[error("tick budget ({budget_ms} ms) must not exceed tick interval ({interval_ms} ms)")]
    BudgetExceedsInterval { budget_ms: u64, interval_ms: u64 },

    #[error("invalid log level: {0}")]
    LogLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_execution_error_codes() {
        let base = TaskExecutionError {
            task_id: TaskId::new(),
            module: "documents".to_string(),
            operation: "create_document".to_string(),
            reason: FailureReason::Operation(OperationError::NotFound("doc-1".to_string())),
        };
        assert_eq!(base.code(), "not_found");

        let panicked = TaskExecutionError {
            reason: FailureReason::Panicked("boom".to_string()),
            ..base.clone()
        };
        assert_eq!(panicked.code(), "operation_panicked");

        let msg = panicked.to_string();
        assert!(msg.contains("documents::create_document"));
        assert!(msg.contains("boom"));
    }

    #[test]
    fn test_module_load_error_serialization() {
        let err = ModuleLoadError::MissingDependency {
            module: "cam".to_string(),
            dependency: "toolpaths".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "missing_dependency");
        assert_eq!(json["dependency"], "toolpaths");
    }
}
