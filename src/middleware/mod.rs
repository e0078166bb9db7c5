//! Middleware layer.
//!
//! A middleware turns one handler into another: it receives "the next
//! handler" and returns a handler that may act before and after calling it.
//! This is the place for cross-cutting concerns such as request logging or
//! header inspection.
//!
//! # Ordering
//!
//! Middleware registered first runs outermost: it sees the request first and
//! the response last. With `[a, b]` registered in that order:
//!
//! ```text
//! a before → b before → handler → b after → a after
//! ```
//!
//! The server composes the chain exactly once, on its first request.

mod inject;
mod logger;

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::writer::ResponseWriter;

pub(crate) use inject::inject_server;
pub use logger::logger;

/// A handler transformer. Registered on a [`Server`](crate::Server).
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

/// The rest of the chain, as seen from inside a [`from_fn`] middleware.
pub struct Next {
    handler: BoxedHandler,
}

impl Next {
    /// Runs the remaining layers and the routed handler.
    pub async fn run(self, w: &mut dyn ResponseWriter, req: Request) {
        self.handler.call(w, req).await
    }
}

/// Builds a middleware from an async closure.
///
/// ```rust
/// use knot::middleware::{from_fn, Middleware};
///
/// let stamp: Middleware = from_fn(|w, req, next| Box::pin(async move {
///     w.headers_mut().insert("x-served-by", "knot".parse().unwrap());
///     next.run(w, req).await;
/// }));
/// ```
pub fn from_fn<F>(f: F) -> Middleware
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, Request, Next) -> BoxFuture<'a> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    Arc::new(move |next: BoxedHandler| Arc::new(FromFn { f: Arc::clone(&f), next }) as BoxedHandler)
}

struct FromFn<F> {
    f: Arc<F>,
    next: BoxedHandler,
}

impl<F> ErasedHandler for FromFn<F>
where
    F: for<'a> Fn(&'a mut dyn ResponseWriter, Request, Next) -> BoxFuture<'a> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: Request) -> BoxFuture<'a> {
        (self.f)(w, req, Next { handler: Arc::clone(&self.next) })
    }
}
