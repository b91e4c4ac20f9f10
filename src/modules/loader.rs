//! # Loader de Módulos
//! src/modules/loader.rs
//!
//! Construye el `Registry` a partir de los descriptores:
//!
//! 1. Validación estructural (nombre vacío o repetido, sin rutas, patrones
//!    inválidos). Un módulo malformado queda fuera.
//! 2. Dependencias hasta un punto fijo: se satisfacen con una capability
//!    del host o con otro módulo que también carga.
//! 3. Registro de rutas de los módulos que cargaron. Una colisión de
//!    rutas sí es fatal.
//!
//! Un módulo excluido nunca aborta la carga del resto.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, OnceLock};

use tracing::{info, warn};

use super::{Capabilities, ModuleDescriptor, ModuleInfo};
use crate::error::{ModuleLoadError, RegistrationError};
use crate::router::{RoutePattern, Router};

/// Router y tabla de módulos, inmutables después del arranque
#[derive(Debug)]
pub struct Registry {
    router: Router,
    modules: Vec<ModuleInfo>,
}

impl Registry {
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Todos los módulos, cargados o no, en el orden de entrada
    pub fn modules(&self) -> &[ModuleInfo] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleInfo> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn loaded(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter().filter(|m| m.loaded)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ModuleInfo> {
        self.modules.iter().filter(|m| !m.loaded)
    }
}

/// Lugar donde se publica el registry una vez construido
///
/// Los handlers del módulo `system` necesitan leer el registry del que
/// forman parte; reciben el slot al construirse y lo leen en cada request.
#[derive(Debug, Clone, Default)]
pub struct RegistrySlot(Arc<OnceLock<Arc<Registry>>>);

impl RegistrySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publica el registry. Retorna `false` si ya había uno.
    pub fn publish(&self, registry: Arc<Registry>) -> bool {
        self.0.set(registry).is_ok()
    }

    pub fn get(&self) -> Option<&Arc<Registry>> {
        self.0.get()
    }
}

/// Carga los módulos y produce el registry
///
/// # Errores
///
/// Solo colisiones de rutas entre módulos que cargaron. Los módulos
/// malformados o con dependencias faltantes se registran como no cargados.
pub fn load_modules(
    descriptors: Vec<ModuleDescriptor>,
    capabilities: &Capabilities,
) -> Result<Registry, RegistrationError> {
    let mut errors: Vec<Option<ModuleLoadError>> = Vec::with_capacity(descriptors.len());
    let mut seen = HashSet::new();

    // 1. Validación estructural
    for descriptor in &descriptors {
        let error = validate(descriptor, capabilities, &mut seen);
        errors.push(error);
    }

    // 2. Dependencias hasta punto fijo
    loop {
        let alive: BTreeSet<&str> = descriptors
            .iter()
            .zip(&errors)
            .filter(|(_, error)| error.is_none())
            .map(|(descriptor, _)| descriptor.name())
            .collect();

        let mut changed = false;
        for (descriptor, error) in descriptors.iter().zip(errors.iter_mut()) {
            if error.is_some() {
                continue;
            }
            let missing = descriptor
                .dependencies()
                .iter()
                .find(|dep| !capabilities.contains(dep) && !alive.contains(dep.as_str()));
            if let Some(dependency) = missing {
                *error = Some(ModuleLoadError::MissingDependency {
                    module: descriptor.name().to_string(),
                    dependency: dependency.clone(),
                });
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }

    // 3. Registro de rutas
    let mut router = Router::new();
    let mut modules = Vec::with_capacity(descriptors.len());

    for (descriptor, error) in descriptors.iter().zip(errors) {
        match &error {
            None => {
                for spec in descriptor.routes() {
                    router.register_for_module(
                        descriptor.name(),
                        &spec.pattern,
                        &spec.methods,
                        spec.handler.clone(),
                        descriptor.category(),
                        &spec.summary,
                    )?;
                }
                info!(
                    module = descriptor.name(),
                    category = descriptor.category(),
                    routes = descriptor.routes().len(),
                    "module loaded"
                );
            }
            Some(err) => {
                warn!(module = descriptor.name(), reason = %err, "module skipped");
            }
        }

        modules.push(ModuleInfo {
            name: descriptor.name().to_string(),
            category: descriptor.category().to_string(),
            routes: descriptor.route_infos(),
            loaded: error.is_none(),
            dependencies: descriptor.dependencies().to_vec(),
            error,
        });
    }

    Ok(Registry { router, modules })
}

fn validate(
    descriptor: &ModuleDescriptor,
    capabilities: &Capabilities,
    seen: &mut HashSet<String>,
) -> Option<ModuleLoadError> {
    let name = descriptor.name();
    let malformed = |reason: String| {
        Some(ModuleLoadError::Malformed {
            module: name.to_string(),
            reason,
        })
    };

    if name.trim().is_empty() {
        return malformed("module name is empty".to_string());
    }
    if !seen.insert(name.to_string()) {
        return malformed("duplicate module name".to_string());
    }
    // Con una capability del mismo nombre, la dependencia apunta al host
    if !capabilities.contains(name) && descriptor.dependencies().iter().any(|dep| dep == name) {
        return malformed("module depends on itself".to_string());
    }
    if descriptor.routes().is_empty() {
        return malformed("module declares no routes".to_string());
    }

    for spec in descriptor.routes() {
        if let Err(err) = RoutePattern::parse(&spec.pattern) {
            return malformed(err.to_string());
        }
        if spec.methods.is_empty() {
            return malformed(format!("route {} declares no methods", spec.pattern));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Method, Response, StatusCode};
    use crate::router::{handler, Handler};

    fn ok() -> Handler {
        handler(|_, _| Response::new(StatusCode::NoContent))
    }

    fn module(name: &str, path: &str) -> ModuleDescriptor {
        ModuleDescriptor::new(name, "test").route(path, &[Method::GET], "", ok())
    }

    fn caps(items: &[&str]) -> Capabilities {
        Capabilities::new(items.iter().copied())
    }

    #[test]
    fn test_loads_with_capabilities() {
        let registry = load_modules(
            vec![module("docs", "/docs").depends_on("document.read")],
            &caps(&["document.read"]),
        )
        .unwrap();

        let info = registry.module("docs").unwrap();
        assert!(info.loaded);
        assert!(info.error.is_none());
        assert!(registry.router().resolve("/docs", Method::GET).is_ok());
    }

    #[test]
    fn test_missing_dependency_isolated() {
        let registry = load_modules(
            vec![
                module("cam", "/cam").depends_on("toolpaths"),
                module("health", "/health"),
            ],
            &caps(&[]),
        )
        .unwrap();

        let cam = registry.module("cam").unwrap();
        assert!(!cam.loaded);
        assert_eq!(
            cam.error,
            Some(ModuleLoadError::MissingDependency {
                module: "cam".to_string(),
                dependency: "toolpaths".to_string(),
            })
        );
        assert!(registry.module("health").unwrap().loaded);
        assert!(registry.router().resolve("/cam", Method::GET).is_err());
        assert!(registry.router().resolve("/health", Method::GET).is_ok());
    }

    #[test]
    fn test_module_dependency_chain() {
        // c depende de b, b depende de a, a necesita una capability ausente
        let registry = load_modules(
            vec![
                module("c", "/c").depends_on("b"),
                module("b", "/b").depends_on("a"),
                module("a", "/a").depends_on("host.feature"),
                module("d", "/d").depends_on("e"),
                module("e", "/e"),
            ],
            &caps(&[]),
        )
        .unwrap();

        let loaded: Vec<&str> = registry.loaded().map(|m| m.name.as_str()).collect();
        let skipped: Vec<&str> = registry.skipped().map(|m| m.name.as_str()).collect();
        assert_eq!(loaded, vec!["d", "e"]);
        assert_eq!(skipped, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_mutual_dependencies_both_load() {
        let registry = load_modules(
            vec![module("a", "/a").depends_on("b"), module("b", "/b").depends_on("a")],
            &caps(&[]),
        )
        .unwrap();

        let loaded: Vec<&str> = registry.loaded().map(|m| m.name.as_str()).collect();
        assert_eq!(loaded, vec!["a", "b"]);
        assert!(registry.router().resolve("/a", Method::GET).is_ok());
        assert!(registry.router().resolve("/b", Method::GET).is_ok());
    }

    #[test]
    fn test_capability_named_like_module() {
        let registry = load_modules(
            vec![module("sketch", "/sketch").depends_on("sketch")],
            &caps(&["sketch"]),
        )
        .unwrap();
        let info = registry.module("sketch").unwrap();
        assert!(info.loaded);
        assert_eq!(info.error, None);

        // Sin la capability sigue siendo una dependencia de sí mismo
        let registry = load_modules(
            vec![module("sketch", "/sketch").depends_on("sketch")],
            &caps(&[]),
        )
        .unwrap();
        assert!(matches!(
            registry.module("sketch").unwrap().error,
            Some(ModuleLoadError::Malformed { ref reason, .. }) if reason == "module depends on itself"
        ));
    }

    #[test]
    fn test_malformed_modules_skipped() {
        let registry = load_modules(
            vec![
                module("", "/empty"),
                ModuleDescriptor::new("no-routes", "test"),
                module("bad-pattern", "/x/{not valid}"),
                module("self", "/self").depends_on("self"),
                module("dup", "/dup-1"),
                module("dup", "/dup-2"),
            ],
            &caps(&[]),
        )
        .unwrap();

        let modules = registry.modules();
        assert_eq!(modules.len(), 6);
        assert!(modules[..4].iter().all(|m| !m.loaded));
        assert!(modules[..4]
            .iter()
            .all(|m| matches!(m.error, Some(ModuleLoadError::Malformed { .. }))));

        // El primero con el nombre carga, el repetido no
        assert!(modules[4].loaded);
        assert!(!modules[5].loaded);
        assert!(registry.router().resolve("/dup-1", Method::GET).is_ok());
        assert!(registry.router().resolve("/dup-2", Method::GET).is_err());
    }

    #[test]
    fn test_route_collision_is_fatal() {
        let result = load_modules(
            vec![module("a", "/x/{a}"), module("b", "/x/{b}")],
            &caps(&[]),
        );
        assert!(matches!(result, Err(RegistrationError::Duplicate { .. })));
    }

    #[test]
    fn test_skipped_module_routes_do_not_collide() {
        let registry = load_modules(
            vec![
                module("a", "/x/{a}"),
                module("b", "/x/{b}").depends_on("missing"),
            ],
            &caps(&[]),
        )
        .unwrap();
        assert_eq!(registry.router().len(), 1);
    }

    #[test]
    fn test_registry_slot_publishes_once() {
        let slot = RegistrySlot::new();
        assert!(slot.get().is_none());

        let registry = Arc::new(load_modules(vec![module("a", "/a")], &caps(&[])).unwrap());
        assert!(slot.publish(Arc::clone(&registry)));
        assert!(!slot.clone().publish(registry));
        assert_eq!(slot.get().unwrap().modules().len(), 1);
    }

    #[test]
    fn test_module_info_serialization() {
        let registry = load_modules(
            vec![module("cam", "/cam").depends_on("toolpaths")],
            &caps(&[]),
        )
        .unwrap();

        let json = serde_json::to_value(registry.modules()).unwrap();
        assert_eq!(json[0]["loaded"], false);
        assert_eq!(json[0]["error"]["kind"], "missing_dependency");
        assert_eq!(json[0]["routes"][0]["pattern"], "/cam");
    }
}
