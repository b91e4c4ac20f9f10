//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Servidor TCP que:
//! 1. Escucha en un puerto
//! 2. Acepta conexiones entrantes, una por thread
//! 3. Lee y parsea requests HTTP (cabecera y body)
//! 4. Resuelve la ruta y envía la respuesta
//!
//! No toca el host: los handlers que lo necesitan pasan por el puente.

pub mod tcp;

pub use tcp::Server;
