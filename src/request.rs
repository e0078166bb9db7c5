//! Incoming HTTP request type.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http::request::Parts;
use http::{Extensions, HeaderMap, Method, Uri};
use http_body_util::BodyExt;

use crate::error::Error;

/// Request body. Left unread until someone asks for it.
#[derive(Debug, Default)]
pub enum Body {
    #[default]
    Empty,
    Full(Bytes),
    Incoming(hyper::body::Incoming),
}

impl From<()> for Body {
    fn from(_: ()) -> Self { Self::Empty }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self { Self::Full(b) }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self { Self::Full(v.into()) }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self { Self::Full(Bytes::from_static(s.as_bytes())) }
}

impl From<String> for Body {
    fn from(s: String) -> Self { Self::Full(s.into()) }
}

impl From<hyper::body::Incoming> for Body {
    fn from(b: hyper::body::Incoming) -> Self { Self::Incoming(b) }
}

/// An incoming HTTP request.
#[derive(Debug)]
pub struct Request {
    parts: Parts,
    body: Body,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Wraps an `http::Request`. Useful for driving a server without a socket.
    pub fn new<B: Into<Body>>(req: http::Request<B>) -> Self {
        let (parts, body) = req.into_parts();
        Self { parts, body: body.into(), params: HashMap::new(), remote_addr: None }
    }

    pub(crate) fn from_hyper(
        req: hyper::Request<hyper::body::Incoming>,
        remote_addr: SocketAddr,
    ) -> Self {
        let mut req = Self::new(req);
        req.remote_addr = Some(remote_addr);
        req
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn uri(&self) -> &Uri { &self.parts.uri }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn remote_addr(&self) -> Option<SocketAddr> { self.remote_addr }

    pub fn extensions(&self) -> &Extensions { &self.parts.extensions }
    pub fn extensions_mut(&mut self) -> &mut Extensions { &mut self.parts.extensions }

    /// Header lookup. Names are case-insensitive; non-UTF-8 values are skipped.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The body as it stands. Reading it leaves `Body::Empty` behind.
    pub fn body(&self) -> &Body { &self.body }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    /// Reads the whole body. The body is consumed: a second call yields an
    /// empty buffer.
    pub async fn read_body(&mut self) -> Result<Bytes, Error> {
        match std::mem::take(&mut self.body) {
            Body::Empty => Ok(Bytes::new()),
            Body::Full(bytes) => Ok(bytes),
            Body::Incoming(incoming) => Ok(incoming.collect().await?.to_bytes()),
        }
    }
}
