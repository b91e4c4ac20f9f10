//! # API del Host
//! src/host/mod.rs
//!
//! El host es la aplicación cuya API solo puede llamarse desde su main
//! thread. Los handlers nunca la tocan directamente: envían una operación
//! que recibe `&mut H` y que solo el pump ejecuta.

pub mod simulated;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::error::OperationError;

pub use simulated::{Document, SimulatedHost};

/// Lo mínimo que el puente necesita saber de un host
pub trait Host: 'static {
    /// Nombre para logs y `/health`
    fn name(&self) -> &str;

    /// Capabilities que satisfacen dependencias de módulos
    fn capabilities(&self) -> Vec<String>;
}

/// Operaciones sobre documentos que usan los módulos `documents` y
/// `parameters`
pub trait DocumentHost: Host {
    fn list_documents(&self) -> Result<Vec<Document>, HostError>;

    fn create_document(&mut self, name: &str, units: &str) -> Result<Document, HostError>;

    fn document(&self, id: &str) -> Result<Document, HostError>;

    fn close_document(&mut self, id: &str) -> Result<(), HostError>;

    fn parameters(&self, id: &str) -> Result<BTreeMap<String, f64>, HostError>;

    /// Asigna un parámetro y retorna el documento actualizado
    fn set_parameter(&mut self, id: &str, name: &str, value: f64) -> Result<Document, HostError>;
}

/// Errores de la API del host
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    #[error("host API called from a thread other than its main thread")]
    WrongThread,

    #[error("unknown document: {0}")]
    UnknownDocument(String),

    #[error("a document named '{0}' is already open")]
    DuplicateName(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

impl From<HostError> for OperationError {
    fn from(err: HostError) -> Self {
        let message = err.to_string();
        match err {
            HostError::WrongThread => OperationError::Host(message),
            HostError::UnknownDocument(_) => OperationError::NotFound(message),
            HostError::DuplicateName(_) => OperationError::Conflict(message),
            HostError::InvalidValue(_) | HostError::InvalidName(_) => {
                OperationError::InvalidInput(message)
            }
        }
    }
}
