//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Implementación de HTTP/1.x desde cero, sin librerías de alto nivel:
//!
//! - Parsing de requests (request line, headers, body por `Content-Length`)
//! - Construcción de responses con bodies JSON
//! - Códigos de estado
//! - Decodificación de query parameters y segmentos `%XX`
//!
//! Cada conexión atiende un solo request y se cierra (`Connection: close`),
//! así que no hay keep-alive ni chunked transfer encoding.

pub mod request;
pub mod response;
pub mod status;

// Permite usar `http::Request` en vez de `http::request::Request`
pub use request::{percent_decode, Method, ParseError, Request};
pub use response::Response;
pub use status::StatusCode;
