//! Route registration and the write-once route table.

use std::sync::Arc;

use axum::http::Method;
use axum::routing::MethodFilter;
use thiserror::Error;

use crate::routing::handler::RouteHandler;

/// Error surfaced at registration time.
///
/// Registration problems are configuration errors: they abort startup rather
/// than turning into request-time surprises.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The same (method, path) pair was registered twice.
    #[error("duplicate route registration: {method} {path}")]
    Duplicate { method: Method, path: String },

    /// Route paths must be absolute.
    #[error("invalid route path {path:?}: must begin with '/'")]
    InvalidPath { path: String },

    /// The method cannot be routed by the underlying server.
    #[error("unsupported route method: {method}")]
    UnsupportedMethod { method: Method },
}

/// One registered route: immutable after registration.
pub struct Route {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) handler: Arc<dyn RouteHandler>,
}

impl Route {
    /// The route's HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route's path.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// The route table, populated at startup and then consumed by the server.
#[derive(Default)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one or more methods on `path`.
    ///
    /// The handler is shared across the given methods. Registration is
    /// all-or-nothing: if any (method, path) pair is a duplicate, nothing is
    /// registered.
    pub fn register<H>(
        &mut self,
        methods: impl IntoIterator<Item = Method>,
        path: impl Into<String>,
        handler: H,
    ) -> Result<(), RegistryError>
    where
        H: RouteHandler,
    {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(RegistryError::InvalidPath { path });
        }

        let methods: Vec<Method> = methods.into_iter().collect();
        for method in &methods {
            if method_filter(method).is_none() {
                return Err(RegistryError::UnsupportedMethod {
                    method: method.clone(),
                });
            }
            if self
                .routes
                .iter()
                .any(|route| route.method == *method && route.path == path)
            {
                return Err(RegistryError::Duplicate {
                    method: method.clone(),
                    path,
                });
            }
        }

        let handler: Arc<dyn RouteHandler> = Arc::new(handler);
        for method in methods {
            self.routes.push(Route {
                method,
                path: path.clone(),
                handler: Arc::clone(&handler),
            });
        }
        Ok(())
    }

    /// Number of registered (method, path) pairs.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Whether any method is registered on `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.routes.iter().any(|route| route.path == path)
    }

    pub(crate) fn into_routes(self) -> Vec<Route> {
        self.routes
    }
}

/// Map a method to the server's routing filter.
///
/// Registration rejects methods this returns `None` for, so the dispatch
/// table build can rely on a filter existing for every registered route.
pub(crate) fn method_filter(method: &Method) -> Option<MethodFilter> {
    match method.as_str() {
        "GET" => Some(MethodFilter::GET),
        "POST" => Some(MethodFilter::POST),
        "PUT" => Some(MethodFilter::PUT),
        "DELETE" => Some(MethodFilter::DELETE),
        "PATCH" => Some(MethodFilter::PATCH),
        "HEAD" => Some(MethodFilter::HEAD),
        "OPTIONS" => Some(MethodFilter::OPTIONS),
        "TRACE" => Some(MethodFilter::TRACE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler::{HandlerError, RequestContext, ResponseWriter};

    async fn noop(_ctx: RequestContext, _writer: ResponseWriter) -> Result<(), HandlerError> {
        Ok(())
    }

    #[test]
    fn registers_distinct_pairs() {
        let mut registry = RouteRegistry::new();
        registry.register([Method::GET], "/a", noop).unwrap();
        registry.register([Method::POST], "/a", noop).unwrap();
        registry.register([Method::GET], "/b", noop).unwrap();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_pair_is_rejected() {
        let mut registry = RouteRegistry::new();
        registry.register([Method::GET], "/a", noop).unwrap();

        let err = registry.register([Method::GET], "/a", noop).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn multi_method_registration_is_atomic() {
        let mut registry = RouteRegistry::new();
        registry.register([Method::POST], "/auth", noop).unwrap();

        // GET is new but POST collides; nothing may be added.
        let err = registry
            .register([Method::GET, Method::POST], "/auth", noop)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate { .. }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn relative_path_is_rejected() {
        let mut registry = RouteRegistry::new();
        let err = registry.register([Method::GET], "hello", noop).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidPath { .. }));
    }

    #[test]
    fn connect_method_is_rejected() {
        let mut registry = RouteRegistry::new();
        let err = registry
            .register([Method::CONNECT], "/tunnel", noop)
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnsupportedMethod { .. }));
    }
}
