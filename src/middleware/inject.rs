//! Makes the owning server reachable from every request.

use std::sync::{Arc, Weak};

use crate::context::ServerRef;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::server::Server;
use crate::writer::ResponseWriter;

/// Wraps `next` so each request carries a reference to `server` in its
/// extensions, where [`Context`](crate::Context) picks it up.
///
/// Holds the server weakly: the composed chain lives inside the server.
pub(crate) fn inject_server(server: Weak<Server>, next: BoxedHandler) -> BoxedHandler {
    Arc::new(InjectServer { server, next })
}

struct InjectServer {
    server: Weak<Server>,
    next: BoxedHandler,
}

impl ErasedHandler for InjectServer {
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, mut req: Request) -> BoxFuture<'a> {
        if let Some(server) = self.server.upgrade() {
            req.extensions_mut().insert(ServerRef(server));
        }
        self.next.call(w, req)
    }
}
