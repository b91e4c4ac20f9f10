//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP de forma programática y convertirlas
//! a bytes para enviar al cliente.
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.0 504 Gateway Timeout\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 98\r\n
//! X-Request-Id: req-01J...\r\n
//! \r\n
//! {"error":{"code":"timeout","message":"..."}}
//! ```
//!
//! ## Ejemplo de uso
//!
//! ```
//! use host_bridge::http::{Response, StatusCode};
//! use serde_json::json;
//!
//! let response = Response::json(StatusCode::Created, &json!({"id": "doc-1"}));
//! assert_eq!(response.header("Content-Type"), Some("application/json"));
//! ```

use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

use super::StatusCode;

/// Representa una respuesta HTTP completa
#[derive(Debug, Clone)]
pub struct Response {
    /// Código de estado HTTP (200, 404, etc.)
    status: StatusCode,

    /// Headers HTTP. HashMap para evitar duplicados
    headers: HashMap<String, String>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,
}

impl Response {
    /// Crea una nueva respuesta sin headers ni body
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Agrega un header (si ya existe, se sobrescribe)
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    /// Establece el cuerpo desde un string y calcula `Content-Length`
    pub fn with_body(self, body: &str) -> Self {
        self.with_body_bytes(body.as_bytes().to_vec())
    }

    /// Establece el cuerpo desde bytes y calcula `Content-Length`
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self.headers
            .insert("Content-Length".to_string(), self.body.len().to_string());
        self
    }

    /// Crea una respuesta JSON con el estado indicado
    ///
    /// Si el valor no se puede serializar se responde 500 con el error.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .with_header("Content-Type", "application/json")
                .with_body_bytes(body),
            Err(err) => Self::error(
                StatusCode::InternalServerError,
                "serialization_error",
                &err.to_string(),
            ),
        }
    }

    /// Crea una respuesta de error
    ///
    /// Formato del JSON: `{"error": {"code": "...", "message": "..."}}`
    ///
    /// # Ejemplo
    /// ```
    /// use host_bridge::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::BadRequest, "invalid_input", "name is required");
    /// assert_eq!(response.status(), StatusCode::BadRequest);
    /// ```
    pub fn error(status: StatusCode, code: &str, message: &str) -> Self {
        Self::error_with(status, code, message, serde_json::Map::new())
    }

    /// Como [`Response::error`], agregando campos extra dentro de `error`
    /// (por ejemplo `module`, `operation` o `task_id`)
    pub fn error_with(
        status: StatusCode,
        code: &str,
        message: &str,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let mut error = serde_json::Map::new();
        error.insert("code".to_string(), json!(code));
        error.insert("message".to_string(), json!(message));
        error.extend(extra);

        let body = json!({ "error": error });
        Self::new(status)
            .with_header("Content-Type", "application/json")
            .with_body(&body.to_string())
    }

    /// Quita el body pero conserva `Content-Length` (respuestas a HEAD)
    pub fn strip_body(&mut self) {
        self.body.clear();
    }

    /// Convierte la respuesta a bytes listos para enviar por el socket
    ///
    /// - Status line: `HTTP/1.0 200 OK\r\n`
    /// - Headers: `Header-Name: Value\r\n`
    /// - Línea vacía: `\r\n`
    /// - Body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(128 + self.body.len());

        result.extend_from_slice(format!("HTTP/1.0 {}\r\n", self.status).as_bytes());

        // Orden estable para que los clientes y los tests vean lo mismo
        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        for name in names {
            let header_line = format!("{}: {}\r\n", name, self.headers[name]);
            result.extend_from_slice(header_line.as_bytes());
        }

        result.extend_from_slice(b"\r\n");
        result.extend_from_slice(&self.body);

        result
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Obtiene una referencia a los headers
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Busca un header sin distinguir mayúsculas en el nombre
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parsea el body como JSON
    pub fn body_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert!(response.headers().is_empty());
        assert!(response.body().is_empty());
    }

    #[test]
    fn test_with_body() {
        let response = Response::new(StatusCode::Ok).with_body("Hello World");

        assert_eq!(response.body(), b"Hello World");
        assert_eq!(response.header("content-length"), Some("11"));
    }

    #[test]
    fn test_json_response() {
        let response = Response::json(StatusCode::Accepted, &json!({"task_id": "task-1"}));

        assert_eq!(response.status(), StatusCode::Accepted);
        assert_eq!(response.header("Content-Type"), Some("application/json"));
        assert_eq!(response.body_json().unwrap()["task_id"], "task-1");
    }

    #[test]
    fn test_error_response_shape() {
        let mut extra = serde_json::Map::new();
        extra.insert("module".to_string(), json!("documents"));
        let response =
            Response::error_with(StatusCode::GatewayTimeout, "timeout", "took \"too\" long", extra);

        let body = response.body_json().unwrap();
        assert_eq!(body["error"]["code"], "timeout");
        assert_eq!(body["error"]["message"], "took \"too\" long");
        assert_eq!(body["error"]["module"], "documents");
    }

    #[test]
    fn test_strip_body_keeps_length() {
        let mut response = Response::new(StatusCode::Ok).with_body("abc");
        response.strip_body();

        assert!(response.body().is_empty());
        assert_eq!(response.header("Content-Length"), Some("3"));
    }

    #[test]
    fn test_to_bytes() {
        let response = Response::new(StatusCode::Ok)
            .with_header("Content-Type", "text/plain")
            .with_body("Test");

        let text = String::from_utf8(response.to_bytes()).unwrap();

        assert!(text.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.ends_with("\r\n\r\nTest"));
    }

    #[test]
    fn test_empty_body_response() {
        let text = String::from_utf8(Response::new(StatusCode::NoContent).to_bytes()).unwrap();
        assert!(text.ends_with("\r\n\r\n"));
    }
}
