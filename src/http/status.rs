//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Códigos de estado que usa el puente. Agrupados por categoría:
//!
//! - **2xx**: Éxito (200, 201, 202 para fire-and-forget, 204)
//! - **4xx**: Error del cliente (400, 404, 405, 409, 413)
//! - **5xx**: Error del servidor (500, 503 cola llena, 504 timeout del waiter)

/// Representa los códigos de estado HTTP que soporta el servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200 OK - La petición fue exitosa
    Ok = 200,

    /// 201 Created - Se creó un recurso en el host
    Created = 201,

    /// 202 Accepted - Task encolado sin esperar resultado
    Accepted = 202,

    /// 204 No Content - Petición exitosa sin contenido en el body
    NoContent = 204,

    /// 400 Bad Request - Parámetros inválidos o malformados
    BadRequest = 400,

    /// 404 Not Found - Ruta o recurso no encontrado
    NotFound = 404,

    /// 405 Method Not Allowed - La ruta existe pero no acepta el método
    MethodNotAllowed = 405,

    /// 409 Conflict - Conflicto con el estado del host
    Conflict = 409,

    /// 413 Payload Too Large - Body mayor a `max_body_bytes`
    PayloadTooLarge = 413,

    /// 500 Internal Server Error - La operación falló en el main thread
    InternalServerError = 500,

    /// 503 Service Unavailable - Cola llena o puente cerrado
    ServiceUnavailable = 503,

    /// 504 Gateway Timeout - El main thread no respondió a tiempo
    GatewayTimeout = 504,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use host_bridge::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Retorna el texto de razón (reason phrase) asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use host_bridge::http::StatusCode;
    /// assert_eq!(StatusCode::GatewayTimeout.reason_phrase(), "Gateway Timeout");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::Accepted => "Accepted",
            StatusCode::NoContent => "No Content",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::Conflict => "Conflict",
            StatusCode::PayloadTooLarge => "Payload Too Large",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
            StatusCode::GatewayTimeout => "Gateway Timeout",
        }
    }

    /// Verifica si el código indica éxito (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// Verifica si el código indica error del cliente (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// Verifica si el código indica error del servidor (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }
}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}
