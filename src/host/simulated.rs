//! # Host Simulado
//! src/host/simulated.rs
//!
//! Host de demostración con documentos y parámetros en memoria. Reproduce
//! la restricción del host real: queda atado al thread que lo creó y cada
//! llamada lo verifica. Además no es `Send`, así que no puede salir de
//! ese thread.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::rc::Rc;
use std::thread::{self, ThreadId};

use serde::Serialize;

use super::{DocumentHost, Host, HostError};

const SUPPORTED_UNITS: &[&str] = &["mm", "cm", "m", "in", "ft"];
const MAX_NAME_LEN: usize = 128;

/// Documento abierto en el host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub name: String,
    pub units: String,
    pub parameters: BTreeMap<String, f64>,

    /// Sube con cada modificación
    pub revision: u64,
}

/// Host en memoria, atado a su thread
#[derive(Debug)]
pub struct SimulatedHost {
    owner: ThreadId,
    documents: BTreeMap<String, Document>,
    next_id: u64,
    capabilities: Vec<String>,
    _not_send: PhantomData<Rc<()>>,
}

impl SimulatedHost {
    /// Crea un host con todas las capabilities de documentos
    pub fn new() -> Self {
        Self::with_capabilities(["document.read", "document.write", "parameter.read", "parameter.write"])
    }

    pub fn with_capabilities<I, S>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            owner: thread::current().id(),
            documents: BTreeMap::new(),
            next_id: 1,
            capabilities: capabilities.into_iter().map(Into::into).collect(),
            _not_send: PhantomData,
        }
    }

    fn check_thread(&self) -> Result<(), HostError> {
        if thread::current().id() == self.owner {
            Ok(())
        } else {
            Err(HostError::WrongThread)
        }
    }

    fn document_mut(&mut self, id: &str) -> Result<&mut Document, HostError> {
        self.documents
            .get_mut(id)
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))
    }
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for SimulatedHost {
    fn name(&self) -> &str {
        "simulated"
    }

    fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }
}

impl DocumentHost for SimulatedHost {
    fn list_documents(&self) -> Result<Vec<Document>, HostError> {
        self.check_thread()?;
        Ok(self.documents.values().cloned().collect())
    }

    fn create_document(&mut self, name: &str, units: &str) -> Result<Document, HostError> {
        self.check_thread()?;

        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(HostError::InvalidName(format!(
                "document name must have 1 to {} characters",
                MAX_NAME_LEN
            )));
        }
        if !SUPPORTED_UNITS.contains(&units) {
            return Err(HostError::InvalidValue(format!(
                "unsupported units '{}', expected one of {}",
                units,
                SUPPORTED_UNITS.join(", ")
            )));
        }
        if self.documents.values().any(|doc| doc.name == name) {
            return Err(HostError::DuplicateName(name.to_string()));
        }

        let id = format!("doc-{}", self.next_id);
        self.next_id += 1;

        let document = Document {
            id: id.clone(),
            name: name.to_string(),
            units: units.to_string(),
            parameters: BTreeMap::new(),
            revision: 1,
        };
        self.documents.insert(id, document.clone());
        Ok(document)
    }

    fn document(&self, id: &str) -> Result<Document, HostError> {
        self.check_thread()?;
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))
    }

    fn close_document(&mut self, id: &str) -> Result<(), HostError> {
        self.check_thread()?;
        self.documents
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| HostError::UnknownDocument(id.to_string()))
    }

    fn parameters(&self, id: &str) -> Result<BTreeMap<String, f64>, HostError> {
        self.document(id).map(|doc| doc.parameters)
    }

    fn set_parameter(&mut self, id: &str, name: &str, value: f64) -> Result<Document, HostError> {
        self.check_thread()?;

        let valid_name = name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(HostError::InvalidName(format!(
                "parameter name '{}' must be an identifier",
                name
            )));
        }
        if !value.is_finite() {
            return Err(HostError::InvalidValue(format!(
                "parameter '{}' must be a finite number",
                name
            )));
        }

        let document = self.document_mut(id)?;
        document.parameters.insert(name.to_string(), value);
        document.revision += 1;
        Ok(document.clone())
    }
}
