//! Application router.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{ALLOW, HeaderValue};
use http::{Method, StatusCode};
use matchit::Router as MatchitRouter;

use crate::codec;
use crate::error::StatusError;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// The routing table.
///
/// One radix tree per HTTP method plus one for method-agnostic routes —
/// O(path-length) lookup. Build it once at startup and hand it to
/// [`Server::new`](crate::Server::new). Every registration returns `self`
/// so calls chain naturally.
///
/// Misses are answered with the error envelope: `405` (with an `Allow`
/// header) when the path exists under other methods, `404` otherwise.
#[derive(Default)]
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    any: MatchitRouter<BoxedHandler>,
    // Kept so a router can be nested under a prefix.
    entries: Vec<(Option<Method>, String, BoxedHandler)>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `ctx.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if the path is malformed or conflicts with an existing route.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.add(Some(method), path, handler.into_boxed_handler())
    }

    /// Registers a handler for every method on `path`. Method-specific
    /// routes on the same path take precedence.
    pub fn any(self, path: &str, handler: impl Handler) -> Self {
        self.add(None, path, handler.into_boxed_handler())
    }

    /// Registers a handler from a `"[METHOD ]/path"` pattern, e.g.
    /// `"GET /users/{id}"` or `"/users"`.
    ///
    /// # Panics
    ///
    /// Panics on an unknown method or an invalid path.
    pub fn route(self, pattern: &str, handler: impl Handler) -> Self {
        let (method, path) = parse_pattern(pattern);
        self.add(method, path, handler.into_boxed_handler())
    }

    /// Mounts every route of `router` under `prefix`.
    pub fn nest(self, prefix: &str, router: Router) -> Self {
        let prefix = prefix.trim_end_matches('/');
        router.entries.into_iter().fold(self, |acc, (method, path, handler)| {
            acc.add(method, &format!("{prefix}{path}"), handler)
        })
    }

    fn add(mut self, method: Option<Method>, path: &str, handler: BoxedHandler) -> Self {
        let tree = match &method {
            Some(method) => self.routes.entry(method.clone()).or_default(),
            None => &mut self.any,
        };
        tree.insert(path, Arc::clone(&handler))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self.entries.push((method, path.to_owned(), handler));
        self
    }

    pub(crate) fn lookup<'r>(
        &'r self,
        method: &Method,
        path: &str,
    ) -> Option<(&'r BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }

    /// Methods with a route matching `path`, sorted for a stable `Allow` header.
    fn allowed(&self, path: &str) -> Vec<&str> {
        let mut methods: Vec<&str> = self.routes.iter()
            .filter(|(_, tree)| tree.at(path).is_ok())
            .map(|(method, _)| method.as_str())
            .collect();
        methods.sort_unstable();
        methods
    }
}

impl ErasedHandler for Router {
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, mut req: Request) -> BoxFuture<'a> {
        Box::pin(async move {
            if let Some((handler, params)) = self.lookup(req.method(), req.path()) {
                req.set_params(params);
                return handler.call(w, req).await;
            }

            let allowed = self.allowed(req.path());
            if allowed.is_empty() {
                return codec::write_error(w, &StatusError::not_found("not found"));
            }
            if let Ok(value) = HeaderValue::from_str(&allowed.join(", ")) {
                w.headers_mut().insert(ALLOW, value);
            }
            codec::write_error(w, &StatusError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
        })
    }
}

fn parse_pattern(pattern: &str) -> (Option<Method>, &str) {
    match pattern.split_once(' ') {
        Some((method, path)) => {
            let method = Method::from_bytes(method.as_bytes())
                .unwrap_or_else(|e| panic!("invalid route `{pattern}`: {e}"));
            (Some(method), path.trim_start())
        }
        None => (None, pattern),
    }
}
