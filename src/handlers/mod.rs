//! # Handlers HTTP
//! src/handlers/mod.rs
//!
//! Módulos incluidos y utilidades compartidas por sus handlers.
//!
//! ## Módulos
//!
//! | Módulo       | Categoría | Dependencias                                            | Main thread |
//! |--------------|-----------|---------------------------------------------------------|-------------|
//! | `system`     | system    | ninguna                                                 | no          |
//! | `documents`  | design    | `document.read`, `document.write`                       | sí          |
//! | `parameters` | design    | `parameter.read`, `parameter.write`, módulo `documents` | sí          |
//!
//! ## Errores
//!
//! `error_response` es el único lugar donde un `BridgeError` se traduce a
//! HTTP. Body: `{"error": {"code", "message", "module", "operation", "task_id"}}`.

pub mod documents;
pub mod parameters;
pub mod system;

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::bridge::{BridgeClient, Priority};
use crate::error::{BridgeError, FailureReason, OperationError};
use crate::http::{Request, Response, StatusCode};

/// Segundos sugeridos en `Retry-After` cuando la cola está llena
const RETRY_AFTER_SECS: u64 = 1;

/// Opciones de envío que el cliente puede ajustar por query string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub priority: Priority,
    pub timeout: Duration,

    /// `?async=true`: encolar sin esperar
    pub detached: bool,
}

/// Lee `?priority=`, `?timeout_ms=` y `?async=`
///
/// El timeout se limita a `max_timeout` del cliente. Valores inválidos
/// producen un 400.
pub fn request_options<H: 'static>(
    request: &Request,
    client: &BridgeClient<H>,
) -> Result<RequestOptions, Response> {
    let priority = match request.query_param("priority") {
        Some(raw) => Priority::parse(raw).ok_or_else(|| {
            bad_request(&format!(
                "invalid priority '{}': expected low, normal, high or an integer",
                raw
            ))
        })?,
        None => Priority::default(),
    };

    let timeout = match request.query_param("timeout_ms") {
        Some(raw) => match raw.parse::<u64>() {
            Ok(ms) if ms > 0 => client.clamp_timeout(Duration::from_millis(ms)),
            _ => {
                return Err(bad_request(&format!(
                    "invalid timeout_ms '{}': expected a positive integer",
                    raw
                )))
            }
        },
        None => client.default_timeout(),
    };

    let detached = match request.query_param("async") {
        None | Some("false") | Some("0") => false,
        Some("") | Some("true") | Some("1") => true,
        Some(other) => {
            return Err(bad_request(&format!(
                "invalid async '{}': expected true or false",
                other
            )))
        }
    };

    Ok(RequestOptions {
        priority,
        timeout,
        detached,
    })
}

/// Deserializa el body JSON o responde 400
pub fn parse_json_body<T: DeserializeOwned>(request: &Request) -> Result<T, Response> {
    if request.body().is_empty() {
        return Err(bad_request("request body is required"));
    }
    request
        .json_body()
        .map_err(|err| bad_request(&format!("invalid JSON body: {}", err)))
}

/// 400 con código `invalid_input`
pub fn bad_request(message: &str) -> Response {
    Response::error(StatusCode::BadRequest, "invalid_input", message)
}

/// Traduce un error del puente a la respuesta HTTP
///
/// `module` y `operation` identifican el envío para los errores que no
/// traen contexto propio (timeout, cola llena, cierre).
pub fn error_response(err: &BridgeError, module: &str, operation: &str) -> Response {
    let mut extra = Map::new();
    extra.insert("module".to_string(), json!(module));
    extra.insert("operation".to_string(), json!(operation));

    match err {
        BridgeError::Timeout { task_id, waited } => {
            extra.insert("task_id".to_string(), json!(task_id));
            extra.insert("waited_ms".to_string(), json!(waited.as_millis() as u64));
            Response::error_with(StatusCode::GatewayTimeout, "timeout", &err.to_string(), extra)
        }
        BridgeError::QueueFull { .. } => {
            Response::error_with(StatusCode::ServiceUnavailable, "queue_full", &err.to_string(), extra)
                .with_header("Retry-After", &RETRY_AFTER_SECS.to_string())
        }
        BridgeError::Closed => Response::error_with(
            StatusCode::ServiceUnavailable,
            "shutting_down",
            &err.to_string(),
            extra,
        ),
        BridgeError::Execution(failure) => {
            extra.insert("module".to_string(), json!(failure.module));
            extra.insert("operation".to_string(), json!(failure.operation));
            extra.insert("task_id".to_string(), json!(failure.task_id));

            let status = match &failure.reason {
                FailureReason::Operation(OperationError::InvalidInput(_)) => StatusCode::BadRequest,
                FailureReason::Operation(OperationError::NotFound(_)) => StatusCode::NotFound,
                FailureReason::Operation(OperationError::Conflict(_)) => StatusCode::Conflict,
                FailureReason::Operation(OperationError::Host(_)) => StatusCode::InternalServerError,
                FailureReason::Panicked(_) => StatusCode::InternalServerError,
                FailureReason::NotExecuted => StatusCode::ServiceUnavailable,
            };
            Response::error_with(status, failure.code(), &failure.reason.to_string(), extra)
        }
    }
}

/// Respuesta de un envío fire-and-forget
pub fn accepted(task_id: crate::bridge::TaskId, operation: &str) -> Response {
    Response::json(
        StatusCode::Accepted,
        &json!({ "task_id": task_id, "operation": operation, "status": "queued" }),
    )
}

/// Convierte el resultado de `submit_and_wait` en respuesta
pub fn respond<T, F>(
    result: Result<T, BridgeError>,
    module: &str,
    operation: &str,
    status: StatusCode,
    body: F,
) -> Response
where
    F: FnOnce(T) -> Value,
{
    match result {
        Ok(value) => Response::json(status, &body(value)),
        Err(err) => error_response(&err, module, operation),
    }
}
