//! # Host Bridge
//! src/lib.rs
//!
//! Puente entre un front-end HTTP concurrente y una API de host que solo
//! puede invocarse desde un único hilo (el "main thread" del host).
//!
//! ## Arquitectura
//!
//! ```text
//! conexión (thread) → Router → handler ──submit_and_wait──▶ TaskQueue
//!                                 ▲                            │
//!                                 │        Result Channel      ▼
//!                                 └──────────────────────── Pump::tick (main thread)
//! ```
//!
//! El crate está dividido en módulos especializados:
//! - `http`: Parsing y construcción de mensajes HTTP/1.x
//! - `server`: Servidor TCP, un thread por conexión
//! - `router`: Patrones de rutas con placeholders y resolución
//! - `modules`: Descriptores de módulos, validación de dependencias y registry
//! - `bridge`: Tasks, cola, result channel y pump del main thread
//! - `runtime`: Loop principal que hace de event loop del host
//! - `host`: Abstracción de la API del host y un host simulado
//! - `handlers`: Módulos incluidos (system, documents, parameters)
//! - `metrics`: Recolección de métricas de requests
//! - `config`, `logging`, `error`: Configuración CLI, subscriber de tracing y tipos de error
//! - `app`: Ensamblado de todo lo anterior
//!
//! ## Ejemplo de uso
//!
//! ```ignore
//! use host_bridge::app;
//! use host_bridge::config::Config;
//! use host_bridge::host::SimulatedHost;
//!
//! let config = Config::default();
//! let mut host = SimulatedHost::new();
//! let app = app::assemble(&config, &host)?;
//! let (addr, _server) = app.spawn_server(&config)?;
//! app.into_main_loop(&config).run(&mut host);
//! ```

pub mod app;
pub mod bridge;
pub mod config;
pub mod error;
pub mod handlers;
pub mod host;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod modules;
pub mod router;
pub mod runtime;
pub mod server;
