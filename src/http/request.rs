//! # Parsing de Requests HTTP/1.x
//! src/http/request.rs
//!
//! Parser HTTP/1.0 y HTTP/1.1 escrito a mano, trabajando sobre bytes para
//! que el body (JSON) no pase por conversiones de líneas.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /documents?priority=high HTTP/1.1\r\n
//! Host: localhost:8765\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 17\r\n
//! \r\n
//! {"name":"bracket"}
//! ```
//!
//! ## Componentes
//!
//! 1. **Request Line**: `METHOD /path?query HTTP/1.x`
//! 2. **Headers**: Pares `Name: Value` (nombres sin distinguir mayúsculas)
//! 3. **Empty Line**: `\r\n\r\n` separa headers del body
//! 4. **Body**: Bytes restantes, limitados por `Content-Length`

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Separador entre headers y body
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Method {
    /// GET - Obtener un recurso
    GET,

    /// HEAD - Como GET pero solo retorna headers
    HEAD,

    /// POST - Crear un recurso o disparar una acción
    POST,

    /// PUT - Reemplazar un recurso
    PUT,

    /// PATCH - Modificar parcialmente un recurso
    PATCH,

    /// DELETE - Eliminar un recurso
    DELETE,
}

impl Method {
    /// Convierte el método a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        }
    }
}

impl FromStr for Method {
    type Err = ParseError;

    /// Parsea un método HTTP (sensible a mayúsculas, como exige el RFC)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representa un request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP
    method: Method,

    /// Path de la petición sin query string (ej: "/documents/doc-1")
    path: String,

    /// Query parameters decodificados (ej: {"priority": "high"})
    query_params: HashMap<String, String>,

    /// Headers HTTP, con el nombre en minúsculas
    headers: HashMap<String, String>,

    /// Versión HTTP ("HTTP/1.0" o "HTTP/1.1")
    version: String,

    /// Body del request (puede venir en cualquier método)
    body: Vec<u8>,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request incompleto o truncado
    #[error("Incomplete HTTP request")]
    IncompleteRequest,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Método HTTP no soportado
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión HTTP incorrecta
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),

    /// Header malformado
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Content-Length no numérico
    #[error("Invalid Content-Length: {0}")]
    InvalidContentLength(String),

    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,
}

impl Request {
    /// Parsea un request HTTP desde bytes
    ///
    /// El buffer debe contener la cabecera completa. Todo lo que venga
    /// después de `\r\n\r\n` se toma como body.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use host_bridge::http::{Method, Request};
    ///
    /// let raw = b"DELETE /documents/doc-1?async=true HTTP/1.1\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.method(), Method::DELETE);
    /// assert_eq!(request.path(), "/documents/doc-1");
    /// assert_eq!(request.query_param("async"), Some("true"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::EmptyRequest);
        }

        // Sin terminador aceptamos solo la request line (y quizás headers)
        let (head, body) = match Self::find_head_end(buffer) {
            Some(end) => (&buffer[..end], &buffer[end + HEAD_TERMINATOR.len()..]),
            None => (buffer, &[][..]),
        };

        let head_str = std::str::from_utf8(head).map_err(|_| ParseError::InvalidRequestLine)?;
        let mut lines = head_str.split("\r\n");

        // 1. Request line
        let first = lines.next().ok_or(ParseError::IncompleteRequest)?;
        let (method, path, query_params, version) = Self::parse_request_line(first)?;

        // 2. Headers
        let headers = Self::parse_headers(lines)?;

        Ok(Request {
            method,
            path,
            query_params,
            headers,
            version,
            body: body.to_vec(),
        })
    }

    /// Posición donde empieza `\r\n\r\n`, si ya llegó
    pub fn find_head_end(buffer: &[u8]) -> Option<usize> {
        buffer
            .windows(HEAD_TERMINATOR.len())
            .position(|window| window == HEAD_TERMINATOR)
    }

    /// Lee el `Content-Length` de una cabecera cruda
    ///
    /// Retorna `Ok(0)` cuando el header no está presente.
    pub fn content_length(head: &[u8]) -> Result<usize, ParseError> {
        let head_str = String::from_utf8_lossy(head);
        for line in head_str.split("\r\n").skip(1) {
            if let Some((name, value)) = line.split_once(':') {
                if name.trim().eq_ignore_ascii_case("content-length") {
                    let value = value.trim();
                    return value
                        .parse::<usize>()
                        .map_err(|_| ParseError::InvalidContentLength(value.to_string()));
                }
            }
        }
        Ok(0)
    }

    /// Parsea la request line
    ///
    /// Formato: `GET /path?query HTTP/1.1`
    fn parse_request_line(
        line: &str,
    ) -> Result<(Method, String, HashMap<String, String>, String), ParseError> {
        let parts: Vec<&str> = line.split_whitespace().collect();

        // Debe tener exactamente 3 partes: METHOD PATH VERSION
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = parts[0].parse::<Method>()?;

        if !parts[1].starts_with('/') {
            return Err(ParseError::InvalidRequestLine);
        }
        let (path, query_params) = Self::parse_path_and_query(parts[1]);

        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok((method, path, query_params, version))
    }

    /// Separa el path de la query string
    ///
    /// Ejemplo: "/documents/doc-1/parameters?timeout_ms=500"
    /// Retorna: ("/documents/doc-1/parameters", {"timeout_ms": "500"})
    fn parse_path_and_query(path_with_query: &str) -> (String, HashMap<String, String>) {
        match path_with_query.split_once('?') {
            Some((path, query)) => (path.to_string(), Self::parse_query_string(query)),
            None => (path_with_query.to_string(), HashMap::new()),
        }
    }

    /// Parsea una query string en un HashMap
    fn parse_query_string(query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();

        for param in query.split('&').filter(|p| !p.is_empty()) {
            match param.split_once('=') {
                Some((key, value)) => {
                    // En query strings '+' también significa espacio
                    let value = percent_decode(&value.replace('+', " "));
                    params.insert(percent_decode(key), value);
                }
                // Parámetro sin valor (ej: "?async")
                None => {
                    params.insert(percent_decode(param), String::new());
                }
            }
        }

        params
    }

    /// Parsea los headers HTTP
    ///
    /// Cada header tiene formato: "Name: Value"
    fn parse_headers<'a>(
        lines: impl Iterator<Item = &'a str>,
    ) -> Result<HashMap<String, String>, ParseError> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.trim().is_empty() {
                break;
            }

            match line.split_once(':') {
                Some((name, value)) => {
                    headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
                }
                None => return Err(ParseError::InvalidHeader(line.to_string())),
            }
        }

        Ok(headers)
    }

    // === Métodos públicos para acceder a los campos ===

    /// Obtiene el método HTTP del request
    pub fn method(&self) -> Method {
        self.method
    }

    /// Obtiene el path del request
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Obtiene todos los query parameters
    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Obtiene un query parameter específico
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    /// Obtiene todos los headers (nombres en minúsculas)
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header, sin distinguir mayúsculas en el nombre
    ///
    /// # Ejemplo
    /// ```
    /// use host_bridge::http::Request;
    ///
    /// let raw = b"GET / HTTP/1.1\r\nContent-Type: application/json\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    /// Obtiene la versión HTTP
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Obtiene el body del request
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Obtiene el body del request como String
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }

    /// Deserializa el body como JSON
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Decodifica secuencias `%XX`
///
/// Secuencias inválidas se dejan tal cual. Bytes que no forman UTF-8
/// válido se reemplazan por U+FFFD.
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.0\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/");
        assert!(request.query_params().is_empty());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_with_query_params() {
        let raw = b"GET /system/queue?priority=high&timeout_ms=500 HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/system/queue");
        assert_eq!(request.query_param("priority"), Some("high"));
        assert_eq!(request.query_param("timeout_ms"), Some("500"));
    }

    #[test]
    fn test_flag_query_param() {
        let raw = b"DELETE /documents/doc-1?async HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.query_param("async"), Some(""));
    }

    #[test]
    fn test_headers_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:8765\r\nX-Custom: yes\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("Host"), Some("localhost:8765"));
        assert_eq!(request.header("host"), Some("localhost:8765"));
        assert_eq!(request.header("X-CUSTOM"), Some("yes"));
    }

    #[test]
    fn test_url_decode() {
        let raw = b"GET /search?text=hello%20world&sym=a%2Bb&plus=a+b HTTP/1.0\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.query_param("text"), Some("hello world"));
        assert_eq!(request.query_param("sym"), Some("a+b"));
        assert_eq!(request.query_param("plus"), Some("a b"));
    }

    #[test]
    fn test_percent_decode_invalid_sequence_kept() {
        assert_eq!(percent_decode("100%"), "100%");
        assert_eq!(percent_decode("%zz"), "%zz");
        assert_eq!(percent_decode("caf%C3%A9"), "café");
    }

    #[test]
    fn test_body_for_any_method() {
        let raw = b"PUT /documents/doc-1/parameters/width HTTP/1.1\r\nContent-Length: 14\r\n\r\n{\"value\":12.5}";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.body_string().as_deref(), Some("{\"value\":12.5}"));

        let value: serde_json::Value = request.json_body().unwrap();
        assert_eq!(value["value"], 12.5);
    }

    #[test]
    fn test_body_keeps_crlf() {
        let raw = b"POST /x HTTP/1.1\r\n\r\nline1\r\n\r\nline2";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.body(), b"line1\r\n\r\nline2");
    }

    #[test]
    fn test_content_length() {
        let head = b"POST /x HTTP/1.1\r\ncontent-length: 42\r\n";
        assert_eq!(Request::content_length(head), Ok(42));

        let head = b"GET /x HTTP/1.1\r\nHost: a\r\n";
        assert_eq!(Request::content_length(head), Ok(0));

        let head = b"POST /x HTTP/1.1\r\nContent-Length: many\r\n";
        assert!(matches!(
            Request::content_length(head),
            Err(ParseError::InvalidContentLength(_))
        ));
    }

    #[test]
    fn test_unsupported_method() {
        let raw = b"TRACE / HTTP/1.0\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::UnsupportedMethod(_))));
    }

    #[test]
    fn test_invalid_version() {
        let raw = b"GET / HTTP/2.0\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHttpVersion(_))));
    }

    #[test]
    fn test_empty_request() {
        let result = Request::parse(b"");
        assert!(matches!(result, Err(ParseError::EmptyRequest)));
    }

    #[test]
    fn test_invalid_request_line() {
        let raw = b"GET\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidRequestLine)));
    }

    #[test]
    fn test_invalid_header() {
        let raw = b"GET / HTTP/1.1\r\nno-colon-here\r\n\r\n";
        let result = Request::parse(raw);

        assert!(matches!(result, Err(ParseError::InvalidHeader(_))));
    }
}
