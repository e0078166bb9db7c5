//! Wire handlers and type erasure.
//!
//! # How handlers are stored
//!
//! The router, every middleware layer and the server all hold handlers of
//! *different* concrete types behind one interface: [`ErasedHandler`]. A wire
//! handler receives the response-writing capability and the request, and
//! produces all of its output as side effects on the writer.
//!
//! ```text
//! async fn hello(req: Request) -> Response { … }   ← plain handler
//! bind(get_users)                                  ← typed business function
//!        ↓ Router::on(Method::GET, "/", …)
//! handler.into_boxed_handler()                     ← Handler impl
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(w, req)  at request time            ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::request::Request;
use crate::response::IntoResponse;
use crate::writer::ResponseWriter;

/// A heap-allocated, type-erased future borrowing the handler and the writer
/// for `'a`.
pub type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// The wire-level handler interface shared by routes, middleware layers and
/// the router itself.
pub trait ErasedHandler: Send + Sync + 'static {
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: Request) -> BoxFuture<'a>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every value a route can be registered with.
///
/// You never implement this yourself. It is satisfied by:
///
/// - any `async fn name(req: Request) -> impl IntoResponse`;
/// - a typed business function bound with [`bind`](crate::bind()).
///
/// The trait is sealed: only this crate's impls can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

pub(crate) mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a plain `async fn(Request) -> impl IntoResponse` to the wire
/// interface.
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse + Send + 'static,
{
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: Request) -> BoxFuture<'a> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_response().write_to(w) })
    }
}
