//! # Módulos
//! src/modules/mod.rs
//!
//! Un módulo es un descriptor puro: nombre, categoría, dependencias y las
//! rutas que aporta. No tiene efectos al construirse; el loader decide si
//! entra al registry.
//!
//! ```text
//! ModuleDescriptor ─┐
//! ModuleDescriptor ─┼─▶ load_modules(&Capabilities) ─▶ Registry { Router, Vec<ModuleInfo> }
//! ModuleDescriptor ─┘
//! ```

pub mod loader;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ModuleLoadError;
use crate::http::Method;
use crate::router::{Handler, RouteInfo};

pub use loader::{load_modules, Registry, RegistrySlot};

/// Ruta declarada por un módulo
#[derive(Clone)]
pub struct RouteSpec {
    pub pattern: String,
    pub methods: Vec<Method>,
    pub handler: Handler,
    pub summary: String,
}

impl std::fmt::Debug for RouteSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteSpec")
            .field("pattern", &self.pattern)
            .field("methods", &self.methods)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

/// Descriptor de un módulo
///
/// # Ejemplo
/// ```
/// use host_bridge::http::{Method, Response, StatusCode};
/// use host_bridge::modules::ModuleDescriptor;
/// use host_bridge::router::handler;
///
/// let module = ModuleDescriptor::new("toolpaths", "cam")
///     .depends_on("document.read")
///     .route("/toolpaths", &[Method::GET], "List toolpaths", handler(|_, _| {
///         Response::json(StatusCode::Ok, &serde_json::json!([]))
///     }));
///
/// assert_eq!(module.name(), "toolpaths");
/// ```
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    name: String,
    category: String,
    dependencies: Vec<String>,
    routes: Vec<RouteSpec>,
}

impl ModuleDescriptor {
    pub fn new(name: &str, category: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            dependencies: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Agrega una dependencia: una capability del host o el nombre de
    /// otro módulo
    pub fn depends_on(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    pub fn route(mut self, pattern: &str, methods: &[Method], summary: &str, handler: Handler) -> Self {
        self.routes.push(RouteSpec {
            pattern: pattern.to_string(),
            methods: methods.to_vec(),
            handler,
            summary: summary.to_string(),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    fn route_infos(&self) -> Vec<RouteInfo> {
        self.routes
            .iter()
            .map(|spec| RouteInfo {
                pattern: spec.pattern.clone(),
                methods: spec.methods.clone(),
                category: self.category.clone(),
                module: Some(self.name.clone()),
                summary: spec.summary.clone(),
            })
            .collect()
    }
}

/// Capabilities que ofrece el host (ej: "document.read")
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities(BTreeSet<String>);

impl Capabilities {
    pub fn new<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(items.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.0.contains(capability)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Estado de un módulo después de la carga
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub category: String,
    pub routes: Vec<RouteInfo>,
    pub loaded: bool,
    pub dependencies: Vec<String>,

    /// Motivo por el que quedó fuera, si no cargó
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ModuleLoadError>,
}
