//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Servidor TCP que maneja múltiples conexiones simultáneas usando threads.
//! Cada conexión se procesa en su propio thread: lee el request completo,
//! lo pasa al router y escribe la respuesta. Los handlers que necesitan el
//! host bloquean ese thread hasta que el pump ejecute su operación.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use ulid::Ulid;

use crate::http::{Method, Request, Response, StatusCode};
use crate::metrics::{MetricsCollector, UNMATCHED_ROUTE};
use crate::modules::Registry;
use crate::router::add_common_headers;

/// Tamaño máximo de la request line más headers
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Un cliente que deja de enviar no retiene el thread para siempre
const READ_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 4096;

/// Servidor HTTP concurrente con métricas
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    metrics: MetricsCollector,
    max_body: usize,
}

/// Resultado de leer un request del socket
enum Incoming {
    /// Bytes completos: cabecera más `Content-Length` bytes de body
    Complete(Vec<u8>),

    /// El cliente cerró sin enviar nada
    Empty,

    /// Se rechaza antes de llegar al router
    Rejected(Response),
}

impl Server {
    /// Abre el listener en `address` (`host:port`, puerto 0 = efímero)
    pub fn bind(
        address: &str,
        registry: Arc<Registry>,
        metrics: MetricsCollector,
        max_body: usize,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(address)?;
        Ok(Self {
            listener,
            registry,
            metrics,
            max_body,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Acepta conexiones indefinidamente, un thread por conexión
    pub fn run(self) -> io::Result<()> {
        info!(address = %self.local_addr()?, routes = self.registry.router().len(), "listening");

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let registry = Arc::clone(&self.registry);
                    let metrics = self.metrics.clone();
                    let max_body = self.max_body;

                    let peer = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    debug!(%peer, "connection accepted");

                    metrics.connection_opened();
                    let spawned = thread::Builder::new()
                        .name("http-conn".to_string())
                        .spawn({
                            let metrics = metrics.clone();
                            move || {
                                if let Err(err) = handle_connection(stream, &registry, &metrics, max_body) {
                                    error!(%peer, error = %err, "connection failed");
                                }
                                metrics.connection_closed();
                            }
                        });
                    if let Err(err) = spawned {
                        metrics.connection_closed();
                        error!(error = %err, "could not spawn connection thread");
                    }
                }
                Err(err) => {
                    error!(error = %err, "accept failed");
                }
            }
        }

        Ok(())
    }

    /// Corre el servidor en un thread propio
    pub fn spawn(self) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = self.local_addr()?;
        let handle = thread::Builder::new()
            .name("http-accept".to_string())
            .spawn(move || {
                if let Err(err) = self.run() {
                    error!(error = %err, "server stopped");
                }
            })?;
        Ok((addr, handle))
    }
}

/// Atiende una conexión: un request, una respuesta
fn handle_connection(
    mut stream: TcpStream,
    registry: &Registry,
    metrics: &MetricsCollector,
    max_body: usize,
) -> io::Result<()> {
    let start = Instant::now();
    stream.set_read_timeout(Some(READ_TIMEOUT))?;

    let request_id = format!("req-{}", Ulid::new());
    let worker = format!("{:?}", thread::current().id());

    let (mut response, route, method, path) = match read_request(&mut stream, max_body)? {
        Incoming::Empty => {
            debug!("connection closed without data");
            return Ok(());
        }
        Incoming::Rejected(response) => (response, None, None, String::new()),
        Incoming::Complete(bytes) => match Request::parse(&bytes) {
            Ok(request) => {
                let (response, route) = dispatch(registry, &request);
                (response, route, Some(request.method()), request.path().to_string())
            }
            Err(err) => {
                warn!(error = %err, "unparseable request");
                let response = Response::error(
                    StatusCode::BadRequest,
                    "bad_request",
                    &format!("invalid request: {}", err),
                );
                (response, None, None, String::new())
            }
        },
    };

    add_common_headers(&mut response);
    response.add_header("X-Request-Id", &request_id);
    response.add_header("X-Worker-Thread", &worker);
    if method == Some(Method::HEAD) {
        response.strip_body();
    }

    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    let latency = start.elapsed();
    let status = response.status();
    let route = route.unwrap_or_else(|| UNMATCHED_ROUTE.to_string());
    metrics.record_request(&route, status.as_u16(), latency);

    info!(
        request_id = %request_id,
        method = method.map(|m| m.as_str()).unwrap_or("-"),
        path = %path,
        route = %route,
        status = status.as_u16(),
        latency_ms = latency.as_secs_f64() * 1000.0,
        "request"
    );

    Ok(())
}

/// Pasa el request al router; un handler que hace panic produce un 500
fn dispatch(registry: &Registry, request: &Request) -> (Response, Option<String>) {
    match catch_unwind(AssertUnwindSafe(|| registry.router().route(request))) {
        Ok(routed) => routed,
        Err(_) => {
            error!(path = %request.path(), "handler panicked");
            (
                Response::error(
                    StatusCode::InternalServerError,
                    "handler_panicked",
                    "the request handler panicked",
                ),
                None,
            )
        }
    }
}

/// Lee cabecera y body según `Content-Length`
fn read_request<R: Read>(reader: &mut R, max_body: usize) -> io::Result<Incoming> {
    let mut buffer = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let head_end = loop {
        if let Some(end) = Request::find_head_end(&buffer) {
            break end;
        }
        if buffer.len() > MAX_HEAD_BYTES {
            return Ok(Incoming::Rejected(Response::error(
                StatusCode::PayloadTooLarge,
                "headers_too_large",
                &format!("request head exceeds {} bytes", MAX_HEAD_BYTES),
            )));
        }

        let n = reader.read(&mut chunk)?;
        if n == 0 {
            // EOF: lo que haya llegado se entrega tal cual al parser
            return Ok(if buffer.is_empty() {
                Incoming::Empty
            } else {
                Incoming::Complete(buffer)
            });
        }
        buffer.extend_from_slice(&chunk[..n]);
    };

    let content_length = match Request::content_length(&buffer[..head_end]) {
        Ok(length) => length,
        Err(err) => {
            return Ok(Incoming::Rejected(Response::error(
                StatusCode::BadRequest,
                "bad_request",
                &err.to_string(),
            )))
        }
    };
    if content_length > max_body {
        return Ok(Incoming::Rejected(Response::error(
            StatusCode::PayloadTooLarge,
            "payload_too_large",
            &format!("body of {} bytes exceeds limit of {} bytes", content_length, max_body),
        )));
    }

    let total = head_end + 4 + content_length;
    while buffer.len() < total {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(Incoming::Rejected(Response::error(
                StatusCode::BadRequest,
                "bad_request",
                &format!(
                    "body ended after {} of {} bytes",
                    buffer.len() - head_end - 4,
                    content_length
                ),
            )));
        }
        buffer.extend_from_slice(&chunk[..n]);
    }
    buffer.truncate(total);

    Ok(Incoming::Complete(buffer))
}
