//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea (path, método) a un handler.
//!
//! ## Arquitectura
//!
//! ```text
//! Request → Router::resolve → Handler(&Request, &PathParams) → Response
//! ```
//!
//! ## Reglas
//!
//! - Los literales deben coincidir exactamente; los placeholders capturan
//!   el segmento en `PathParams`.
//! - Si varias rutas hacen match gana la que tiene menos placeholders.
//! - El registro rechaza rutas con la misma forma y un método en común, y
//!   rutas que se solapan con la misma cantidad de placeholders.
//! - Path desconocido → 404. Path conocido con otro método → 405 + `Allow`.
//! - `HEAD` usa la ruta `GET` cuando no hay una ruta `HEAD` explícita.

pub mod pattern;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{RegistrationError, RoutingError};
use crate::http::{Method, Request, Response, StatusCode};

pub use pattern::{split_path, PathParams, RoutePattern};

/// Tipo de función handler
///
/// Recibe el request y los parámetros capturados del path. Puede correr
/// en cualquier thread de conexión.
pub type Handler = Arc<dyn Fn(&Request, &PathParams) -> Response + Send + Sync>;

/// Envuelve una closure como `Handler`
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Request, &PathParams) -> Response + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Ruta registrada
pub struct Route {
    pattern: RoutePattern,
    methods: Vec<Method>,
    handler: Handler,
    category: String,
    module: Option<String>,
    summary: String,
}

impl Route {
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn module(&self) -> Option<&str> {
        self.module.as_deref()
    }

    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            pattern: self.pattern.as_str().to_string(),
            methods: self.methods.clone(),
            category: self.category.clone(),
            module: self.module.clone(),
            summary: self.summary.clone(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.as_str())
            .field("methods", &self.methods)
            .field("category", &self.category)
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

/// Descripción serializable de una ruta (para `/system/routes`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub pattern: String,
    pub methods: Vec<Method>,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
}

/// Resultado de resolver un path
#[derive(Debug)]
pub struct Resolved<'a> {
    pub route: &'a Route,
    pub params: PathParams,
}

impl Resolved<'_> {
    pub fn handler(&self) -> &Handler {
        &self.route.handler
    }
}

/// Router que mapea patrones a handlers
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Crea un nuevo router vacío
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Registra una ruta
    ///
    /// # Ejemplo
    /// ```
    /// use host_bridge::http::{Method, Response, StatusCode};
    /// use host_bridge::router::{handler, Router};
    ///
    /// let mut router = Router::new();
    /// router
    ///     .register(
    ///         "/cam/setups/{setup_id}",
    ///         &[Method::GET],
    ///         handler(|_req, params| {
    ///             let id = params.get("setup_id").unwrap_or_default();
    ///             Response::json(StatusCode::Ok, &serde_json::json!({ "setup_id": id }))
    ///         }),
    ///         "cam",
    ///     )
    ///     .unwrap();
    ///
    /// let resolved = router.resolve("/cam/setups/abc123", Method::GET).unwrap();
    /// assert_eq!(resolved.params.get("setup_id"), Some("abc123"));
    /// ```
    pub fn register(
        &mut self,
        pattern: &str,
        methods: &[Method],
        handler: Handler,
        category: &str,
    ) -> Result<(), RegistrationError> {
        self.insert(pattern, methods, handler, category, None, "")
    }

    /// Registra una ruta que pertenece a un módulo
    pub fn register_for_module(
        &mut self,
        module: &str,
        pattern: &str,
        methods: &[Method],
        handler: Handler,
        category: &str,
        summary: &str,
    ) -> Result<(), RegistrationError> {
        self.insert(
            pattern,
            methods,
            handler,
            category,
            Some(module.to_string()),
            summary,
        )
    }

    fn insert(
        &mut self,
        pattern: &str,
        methods: &[Method],
        handler: Handler,
        category: &str,
        module: Option<String>,
        summary: &str,
    ) -> Result<(), RegistrationError> {
        let parsed = RoutePattern::parse(pattern)?;

        let methods: Vec<Method> = methods
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if methods.is_empty() {
            return Err(RegistrationError::NoMethods {
                pattern: pattern.to_string(),
            });
        }

        self.check_collisions(&parsed, &methods)?;

        self.routes.push(Route {
            pattern: parsed,
            methods,
            handler,
            category: category.to_string(),
            module,
            summary: summary.to_string(),
        });
        Ok(())
    }

    fn check_collisions(
        &self,
        candidate: &RoutePattern,
        methods: &[Method],
    ) -> Result<(), RegistrationError> {
        for existing in &self.routes {
            let shared = methods.iter().find(|m| existing.methods.contains(m));
            let Some(&method) = shared else {
                continue;
            };

            if existing.pattern.same_shape(candidate) {
                return Err(RegistrationError::Duplicate {
                    method,
                    pattern: candidate.as_str().to_string(),
                    existing: existing.pattern.as_str().to_string(),
                });
            }
            if existing.pattern.overlaps(candidate)
                && existing.pattern.placeholder_count() == candidate.placeholder_count()
            {
                return Err(RegistrationError::Ambiguous {
                    method,
                    pattern: candidate.as_str().to_string(),
                    existing: existing.pattern.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Resuelve un path (sin query string) y un método
    pub fn resolve(&self, path: &str, method: Method) -> Result<Resolved<'_>, RoutingError> {
        let segments = split_path(path);

        let mut allowed = BTreeSet::new();
        let mut exact: Option<(&Route, PathParams)> = None;
        let mut via_get: Option<(&Route, PathParams)> = None;

        for route in &self.routes {
            let Some(params) = route.pattern.matches(&segments) else {
                continue;
            };
            allowed.extend(route.methods.iter().copied());

            let slot = if route.methods.contains(&method) {
                &mut exact
            } else if method == Method::HEAD && route.methods.contains(&Method::GET) {
                &mut via_get
            } else {
                continue;
            };

            let better = match &*slot {
                Some((current, _)) => {
                    route.pattern.placeholder_count() < current.pattern.placeholder_count()
                }
                None => true,
            };
            if better {
                *slot = Some((route, params));
            }
        }

        if let Some((route, params)) = exact.or(via_get) {
            return Ok(Resolved { route, params });
        }

        if allowed.is_empty() {
            return Err(RoutingError::NotFound {
                path: path.to_string(),
            });
        }
        if allowed.contains(&Method::GET) {
            allowed.insert(Method::HEAD);
        }
        Err(RoutingError::MethodNotAllowed {
            path: path.to_string(),
            method,
            allowed: allowed.into_iter().collect(),
        })
    }

    /// Encuentra y ejecuta el handler apropiado para un request
    ///
    /// Retorna la respuesta y el patrón que hizo match (para métricas).
    pub fn route(&self, request: &Request) -> (Response, Option<String>) {
        let (mut response, pattern) = match self.resolve(request.path(), request.method()) {
            Ok(resolved) => {
                let response = (resolved.handler())(request, &resolved.params);
                (response, Some(resolved.route.pattern.as_str().to_string()))
            }
            Err(err) => (routing_error_response(&err), None),
        };

        add_common_headers(&mut response);
        (response, pattern)
    }

    /// Tabla de rutas, ordenada por patrón
    pub fn route_table(&self) -> Vec<RouteInfo> {
        let mut table: Vec<RouteInfo> = self.routes.iter().map(Route::info).collect();
        table.sort_by(|a, b| a.pattern.cmp(&b.pattern));
        table
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Headers que llevan todas las respuestas
pub fn add_common_headers(response: &mut Response) {
    response.add_header("Server", concat!("HostBridge/", env!("CARGO_PKG_VERSION")));
    response.add_header("Connection", "close");
}

/// Convierte un error de routing en respuesta 404 / 405
pub fn routing_error_response(err: &RoutingError) -> Response {
    match err {
        RoutingError::NotFound { .. } => {
            Response::error(StatusCode::NotFound, "not_found", &err.to_string())
        }
        RoutingError::MethodNotAllowed { allowed, .. } => {
            let allow = allowed
                .iter()
                .map(Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            Response::error(
                StatusCode::MethodNotAllowed,
                "method_not_allowed",
                &err.to_string(),
            )
            .with_header("Allow", &allow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn tag(name: &'static str) -> Handler {
        handler(move |_req, params| {
            Response::json(StatusCode::Ok, &json!({ "handler": name, "params": params }))
        })
    }

    fn request(method: &str, path: &str) -> Request {
        Request::parse(format!("{} {} HTTP/1.1\r\n\r\n", method, path).as_bytes()).unwrap()
    }

    fn cam_router() -> Router {
        let mut router = Router::new();
        router
            .register("/cam/setups/{setup_id}", &[Method::GET, Method::DELETE], tag("by-id"), "cam")
            .unwrap();
        router
            .register("/cam/setups/abc123", &[Method::GET], tag("literal"), "cam")
            .unwrap();
        router
            .register("/cam/setups", &[Method::GET, Method::POST], tag("list"), "cam")
            .unwrap();
        router
    }

    #[test]
    fn test_router_creation() {
        let router = Router::new();
        assert!(router.is_empty());
    }

    #[rstest]
    #[case("/cam/setups/xyz", "/cam/setups/{setup_id}")]
    #[case("/cam/setups/abc123", "/cam/setups/abc123")]
    #[case("/cam/setups", "/cam/setups")]
    #[case("/cam//setups/", "/cam/setups")]
    fn test_fewest_placeholders_wins(#[case] path: &str, #[case] expected: &str) {
        let router = cam_router();
        let resolved = router.resolve(path, Method::GET).unwrap();
        assert_eq!(resolved.route.pattern().as_str(), expected);
    }

    #[test]
    fn test_placeholder_binding() {
        let router = cam_router();
        let resolved = router.resolve("/cam/setups/s-42", Method::DELETE).unwrap();
        assert_eq!(resolved.params.get("setup_id"), Some("s-42"));
    }

    #[test]
    fn test_literal_route_falls_back_by_method() {
        // DELETE /cam/setups/abc123 solo lo acepta la ruta con placeholder
        let router = cam_router();
        let resolved = router.resolve("/cam/setups/abc123", Method::DELETE).unwrap();
        assert_eq!(resolved.route.pattern().as_str(), "/cam/setups/{setup_id}");
        assert_eq!(resolved.params.get("setup_id"), Some("abc123"));
    }

    #[test]
    fn test_not_found() {
        let router = cam_router();
        assert_eq!(
            router.resolve("/cam/tools", Method::GET).unwrap_err(),
            RoutingError::NotFound {
                path: "/cam/tools".to_string()
            }
        );
    }

    #[test]
    fn test_method_not_allowed_lists_methods() {
        let router = cam_router();
        match router.resolve("/cam/setups", Method::DELETE) {
            Err(RoutingError::MethodNotAllowed { allowed, .. }) => {
                assert_eq!(allowed, vec![Method::GET, Method::HEAD, Method::POST]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_head_uses_get_route() {
        let router = cam_router();
        let resolved = router.resolve("/cam/setups", Method::HEAD).unwrap();
        assert_eq!(resolved.route.pattern().as_str(), "/cam/setups");
    }

    #[test]
    fn test_duplicate_shape_rejected() {
        let mut router = Router::new();
        router.register("/x/{a}", &[Method::GET], tag("a"), "t").unwrap();

        let err = router
            .register("/x/{b}", &[Method::GET, Method::POST], tag("b"), "t")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Duplicate { method: Method::GET, .. }));

        // Otro método con la misma forma sí se permite
        router.register("/x/{b}", &[Method::PUT], tag("b"), "t").unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn test_ambiguous_overlap_rejected() {
        let mut router = Router::new();
        router.register("/a/{x}", &[Method::GET], tag("a"), "t").unwrap();

        let err = router.register("/{y}/b", &[Method::GET], tag("b"), "t").unwrap_err();
        assert!(matches!(err, RegistrationError::Ambiguous { .. }));
    }

    #[test]
    fn test_invalid_registrations() {
        let mut router = Router::new();
        assert!(matches!(
            router.register("/x", &[], tag("x"), "t"),
            Err(RegistrationError::NoMethods { .. })
        ));
        assert!(matches!(
            router.register("x/{", &[Method::GET], tag("x"), "t"),
            Err(RegistrationError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_route_adds_headers() {
        let router = cam_router();
        let (response, pattern) = router.route(&request("GET", "/cam/setups/abc123?x=1"));

        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(pattern.as_deref(), Some("/cam/setups/abc123"));
        assert_eq!(response.header("Connection"), Some("close"));
        assert!(response.header("Server").unwrap().starts_with("HostBridge/"));
        assert_eq!(response.body_json().unwrap()["handler"], "literal");
    }

    #[test]
    fn test_route_405_has_allow_header() {
        let router = cam_router();
        let (response, pattern) = router.route(&request("PATCH", "/cam/setups"));

        assert_eq!(response.status(), StatusCode::MethodNotAllowed);
        assert_eq!(pattern, None);
        assert_eq!(response.header("Allow"), Some("GET, HEAD, POST"));
        assert_eq!(response.body_json().unwrap()["error"]["code"], "method_not_allowed");
    }

    #[test]
    fn test_route_404() {
        let router = cam_router();
        let (response, _) = router.route(&request("GET", "/nonexistent"));
        assert_eq!(response.status(), StatusCode::NotFound);
    }

    #[test]
    fn test_route_table_sorted() {
        let table = cam_router().route_table();
        let patterns: Vec<_> = table.iter().map(|r| r.pattern.as_str()).collect();
        assert_eq!(
            patterns,
            vec!["/cam/setups", "/cam/setups/abc123", "/cam/setups/{setup_id}"]
        );
    }
}
