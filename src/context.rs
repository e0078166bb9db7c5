//! Per-request context handed to typed business functions.

use std::sync::Arc;

use http::{HeaderMap, Method};

use crate::request::Request;
use crate::server::Server;

/// Marker carried in request extensions by the server-injection layer.
#[derive(Clone)]
pub(crate) struct ServerRef(pub(crate) Arc<Server>);

/// The inbound request plus the server that is handling it.
///
/// Built once per request by the binder; the server reference is fixed at
/// construction.
pub struct Context {
    request: Request,
    server: Option<Arc<Server>>,
}

impl Context {
    pub(crate) fn new(mut request: Request) -> Self {
        let server = request.extensions_mut().remove::<ServerRef>().map(|r| r.0);
        Self { request, server }
    }

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> &Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }
    pub fn headers(&self) -> &HeaderMap { self.request.headers() }
    pub fn header(&self, name: &str) -> Option<&str> { self.request.header(name) }
    pub fn param(&self, key: &str) -> Option<&str> { self.request.param(key) }

    /// The server dispatching this request. `None` only when a handler is
    /// driven directly, outside any server.
    pub fn server(&self) -> Option<&Server> {
        self.server.as_deref()
    }

    /// Application state registered with [`Server::with_state`].
    pub fn state<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.server()?.state::<T>()
    }

    pub(crate) fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub(crate) fn server_handle(&self) -> Option<Arc<Server>> {
        self.server.clone()
    }
}
