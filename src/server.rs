//! HTTP server: owns the routing table and the middleware list, composes
//! them on first use, and runs the accept loop.
//!
//! # Graceful shutdown
//!
//! [`Server::serve`] reacts to SIGTERM or Ctrl-C by:
//! 1. Immediately stopping `listener.accept()` — no new connections are made.
//! 2. Letting every in-flight connection task run to completion.
//! 3. Returning, which lets `main` exit cleanly.

use std::convert::Infallible;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::{Extensions, StatusCode};
use http_body_util::Full;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info};

use crate::error::{Classifier, Error};
use crate::handler::BoxedHandler;
use crate::middleware::{Middleware, inject_server};
use crate::request::Request;
use crate::router::Router;
use crate::writer::{ResponseBuffer, ResponseWriter};

/// The HTTP server.
///
/// Configure it before the first request: middleware, state and
/// classification rules all take `&mut self` or `self`, and a server only
/// dispatches once it is shared behind an `Arc`.
///
/// ```rust,no_run
/// use knot::{middleware, Router, Server};
///
/// # async fn run() -> Result<(), knot::Error> {
/// Server::new(Router::new())
///     .middleware(middleware::logger())
///     .serve("0.0.0.0:9988")
///     .await
/// # }
/// ```
pub struct Server {
    router: Arc<Router>,
    middlewares: Vec<Middleware>,
    chain: OnceLock<BoxedHandler>,
    classifier: Classifier,
    state: Extensions,
}

impl Server {
    pub fn new(router: Router) -> Self {
        Self {
            router: Arc::new(router),
            middlewares: Vec::new(),
            chain: OnceLock::new(),
            classifier: Classifier::default(),
            state: Extensions::new(),
        }
    }

    /// Appends a middleware. The first one added runs outermost.
    ///
    /// # Panics
    ///
    /// Panics if the chain has already been composed.
    pub fn add_middleware(&mut self, middleware: Middleware) {
        assert!(self.chain.get().is_none(), "middleware added after the server started dispatching");
        self.middlewares.push(middleware);
    }

    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.add_middleware(middleware);
        self
    }

    /// Stores application state, one value per type. Business functions
    /// read it with [`Context::state`](crate::Context::state).
    pub fn with_state<T: Clone + Send + Sync + 'static>(mut self, state: T) -> Self {
        self.state.insert(state);
        self
    }

    pub fn state<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.state.get::<T>()
    }

    /// Answers errors of type `E` (anywhere in the source chain) with `404`.
    pub fn classify_absent<E: StdError + 'static>(mut self) -> Self {
        self.classifier = self.classifier.absent::<E>();
        self
    }

    /// Adds a classification rule mapping matching errors to `code`.
    pub fn classify<F>(mut self, code: StatusCode, matches: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.classifier = self.classifier.rule(code, matches);
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Runs one request through the composed chain, writing to `w`.
    pub async fn dispatch(self: &Arc<Self>, w: &mut dyn ResponseWriter, req: Request) {
        debug!(method = %req.method(), path = req.path(), "dispatch");
        self.chain().call(w, req).await
    }

    /// Runs one request and collects its response.
    pub async fn respond(self: &Arc<Self>, req: Request) -> http::Response<Full<Bytes>> {
        let mut buf = ResponseBuffer::new();
        self.dispatch(&mut buf, req).await;
        buf.into_response()
    }

    fn chain(self: &Arc<Self>) -> &BoxedHandler {
        self.chain.get_or_init(|| self.compose())
    }

    /// Folds the middleware list around the router, last-registered
    /// innermost. Server injection always wraps the whole chain.
    fn compose(self: &Arc<Self>) -> BoxedHandler {
        info!(middlewares = self.middlewares.len(), "composing middleware chain");
        let router: BoxedHandler = Arc::clone(&self.router) as BoxedHandler;
        let chain = self.middlewares.iter().rev().fold(router, |next, mw| mw(next));
        inject_server(Arc::downgrade(self), chain)
    }

    /// Binds `addr` and serves until SIGTERM or Ctrl-C, then drains.
    pub async fn serve(self, addr: impl ToSocketAddrs) -> Result<(), Error> {
        let listener = TcpListener::bind(addr).await?;
        self.run(listener, shutdown_signal()).await
    }

    /// Accepts connections on `listener` until `shutdown` resolves, then
    /// waits for in-flight connections to finish.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> Result<(), Error> {
        let server = Arc::new(self);

        info!(addr = %listener.local_addr()?, "knot listening");

        // Every spawned connection task, so shutdown can wait for them.
        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even with connections queued.
                biased;

                () = &mut shutdown => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let server = Arc::clone(&server);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let server = Arc::clone(&server);
                            async move {
                                let req = Request::from_hyper(req, remote_addr);
                                Ok::<_, Infallible>(server.respond(req).await)
                            }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client negotiates.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished tasks so the set doesn't grow without bound.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("knot stopped");
        Ok(())
    }
}

/// Resolves on the first SIGTERM or Ctrl-C. Only Ctrl-C on non-Unix targets.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("listening for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("listening for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
