//! Binding typed business functions to wire handlers.
//!
//! A business function has the shape
//!
//! ```text
//! async fn name(ctx: Context, input: I) -> Result<O, E>
//! ```
//!
//! where `I: DeserializeOwned`, `O: Serialize` and `E` converts into a
//! [`BoxError`]. [`bind`] turns it into something a [`Router`](crate::Router)
//! accepts. Per request the bound handler:
//!
//! 1. builds the [`Context`];
//! 2. runs every permission predicate in registration order; the first
//!    `false` answers `403 permission denied`;
//! 3. decodes the JSON body into `I`, unless `I` is [`Empty`], in which case
//!    the body is never read; a decode failure answers `400`;
//! 4. calls the function exactly once;
//! 5. on `Err`, classifies the error (see [`Classifier`]) and writes the
//!    error envelope;
//! 6. on `Ok`, writes the result framed by its type (see [`Output`]).
//!
//! Exactly one response is written per request.
//!
//! ```rust,no_run
//! use knot::{bind, require_header, Context, Empty, Router, StatusError};
//! use http::Method;
//!
//! async fn list_users(_ctx: Context, _: Empty) -> Result<Vec<String>, StatusError> {
//!     Ok(vec!["john".into()])
//! }
//!
//! let app = Router::new()
//!     .on(Method::GET, "/users", bind(list_users).require(require_header("auth", "root")));
//! ```
//!
//! [`Classifier`]: crate::Classifier

use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::codec::{self, Output};
use crate::context::Context;
use crate::error::{BoxError, Classifier, StatusError};
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler, private};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// Input type for handlers that take no request body.
///
/// Binding a function whose input is `Empty` skips body decoding entirely,
/// even when the client sends a body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Empty;

/// A permission predicate: `false` rejects the request with `403`.
pub type Permission = Arc<dyn Fn(&Context) -> bool + Send + Sync>;

/// Builds a predicate that admits requests whose header `name` equals `value`.
pub fn require_header(
    name: &'static str,
    value: &'static str,
) -> impl Fn(&Context) -> bool + Send + Sync + 'static {
    move |ctx| ctx.header(name) == Some(value)
}

/// A typed business function bound to the wire. Build with [`bind`].
pub struct Bound<F, I, O, E> {
    f: F,
    permissions: Vec<Permission>,
    _types: PhantomData<fn(I) -> (O, E)>,
}

/// Binds a typed business function. See the [module docs](self).
pub fn bind<F, Fut, I, O, E>(f: F) -> Bound<F, I, O, E>
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    Bound { f, permissions: Vec::new(), _types: PhantomData }
}

impl<F, I, O, E> Bound<F, I, O, E> {
    /// Adds a permission predicate. Predicates run in the order added.
    pub fn require<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.permissions.push(Arc::new(predicate));
        self
    }

    fn permitted(&self, ctx: &Context) -> bool {
        self.permissions.iter().all(|p| p(ctx))
    }
}

impl<F, Fut, I, O, E> private::Sealed for Bound<F, I, O, E>
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
}

impl<F, Fut, I, O, E> Handler for Bound<F, I, O, E>
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(self)
    }
}

impl<F, Fut, I, O, E> ErasedHandler for Bound<F, I, O, E>
where
    F: Fn(Context, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: Request) -> BoxFuture<'a> {
        Box::pin(async move {
            let mut ctx = Context::new(req);

            if !self.permitted(&ctx) {
                debug!(path = ctx.path(), "permission denied");
                return codec::write_error(w, &StatusError::permission_denied());
            }

            let input = match decode_input::<I>(&mut ctx).await {
                Ok(input) => input,
                Err(err) => {
                    debug!(path = ctx.path(), "rejecting input: {err}");
                    return codec::write_error(w, &err);
                }
            };

            let server = ctx.server_handle();
            match (self.f)(ctx, input).await {
                Ok(out) => write_output(w, &out),
                Err(err) => {
                    let err = match &server {
                        Some(server) => server.classifier().classify(err.into()),
                        None => Classifier::default().classify(err.into()),
                    };
                    debug!(status = err.code().as_u16(), "handler failed: {err}");
                    codec::write_error(w, &err);
                }
            }
        })
    }
}

/// Reads and decodes the body, or produces `Empty` without touching it.
async fn decode_input<I>(ctx: &mut Context) -> Result<I, StatusError>
where
    I: DeserializeOwned + 'static,
{
    if let Some(empty) = empty_input::<I>() {
        return Ok(empty);
    }
    let body = ctx.request_mut().read_body().await.map_err(|e| {
        StatusError::bad_request(format!("reading input: {e}"))
    })?;
    codec::decode(&body)
}

fn empty_input<I: 'static>() -> Option<I> {
    let empty: Box<dyn Any> = Box::new(Empty);
    empty.downcast::<I>().ok().map(|b| *b)
}

fn write_output<O: Serialize + 'static>(w: &mut dyn ResponseWriter, out: &O) {
    let output = match Output::of(out) {
        Ok(output) => output,
        Err(e) => {
            error!("encoding response: {e}");
            let err = StatusError::new(StatusCode::INTERNAL_SERVER_ERROR, e);
            return codec::write_error(w, &err);
        }
    };
    if let Err(e) = output.write_to(w) {
        error!("writing response: {e}");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use http::Method;
    use serde::Deserialize;

    use super::*;
    use crate::error::NotFound;
    use crate::request::Body;
    use crate::router::Router;
    use crate::server::Server;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        login: String,
    }

    fn server(router: Router) -> Arc<Server> {
        Arc::new(Server::new(router))
    }

    async fn send(server: &Arc<Server>, req: http::Request<&'static str>) -> (StatusCode, String) {
        let res = server.respond(Request::new(req)).await;
        let status = res.status();
        let body = res.into_body();
        let bytes = http_body_util::BodyExt::collect(body).await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get(path: &str) -> http::Request<&'static str> {
        http::Request::get(path).body("").unwrap()
    }

    fn post(path: &str, body: &'static str) -> http::Request<&'static str> {
        http::Request::post(path).body(body).unwrap()
    }

    #[tokio::test]
    async fn plain_error_is_bad_request() {
        async fn fails(_: Context, _: Empty) -> Result<User, String> {
            Err("login is taken".into())
        }
        let server = server(Router::new().on(Method::GET, "/", bind(fails)));
        let (status, body) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "{\"error\":\"login is taken\"}\n");
    }

    #[tokio::test]
    async fn absent_resource_is_not_found() {
        async fn missing(_: Context, _: Empty) -> Result<User, NotFound> {
            Err(NotFound)
        }
        let server = server(Router::new().on(Method::GET, "/", bind(missing)));
        let (status, _) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn explicit_code_wins_over_cause() {
        async fn conflict(_: Context, _: Empty) -> Result<User, StatusError> {
            Err(StatusError::new(StatusCode::CONFLICT, NotFound))
        }
        let server = server(Router::new().on(Method::GET, "/", bind(conflict)));
        let (status, _) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn server_rules_extend_classification() {
        #[derive(Debug, thiserror::Error)]
        #[error("no rows in result set")]
        struct NoRows;

        async fn query(_: Context, _: Empty) -> Result<User, NoRows> {
            Err(NoRows)
        }
        let server = Arc::new(
            Server::new(Router::new().on(Method::GET, "/", bind(query))).classify_absent::<NoRows>(),
        );
        let (status, body) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "{\"error\":\"no rows in result set\"}\n");
    }

    #[tokio::test]
    async fn permission_failure_never_invokes_handler() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        async fn guarded(_: Context, _: Empty) -> Result<&'static str, StatusError> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok("welcome")
        }

        let server = server(Router::new().on(
            Method::GET,
            "/",
            bind(guarded).require(|_| true).require(require_header("auth", "root")),
        ));

        let (status, body) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, "{\"error\":\"permission denied\"}\n");
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        let req = http::Request::get("/").header("auth", "root").body("").unwrap();
        let (status, body) = send(&server, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{\"info\":\"welcome\"}\n");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn predicates_short_circuit_in_order() {
        static SECOND: AtomicUsize = AtomicUsize::new(0);
        async fn ok(_: Context, _: Empty) -> Result<&'static str, StatusError> {
            Ok("ok")
        }
        let server = server(Router::new().on(
            Method::GET,
            "/",
            bind(ok).require(|_| false).require(|_| {
                SECOND.fetch_add(1, Ordering::SeqCst);
                true
            }),
        ));
        let (status, _) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(SECOND.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_input_ignores_body() {
        async fn list(ctx: Context, _: Empty) -> Result<Vec<User>, StatusError> {
            assert!(matches!(ctx.request().body(), Body::Full(b) if b.as_ref() == b"{this is not json"));
            Ok(vec![User { name: "John".into(), login: String::new() }])
        }
        let server = server(Router::new().on(Method::POST, "/", bind(list)));
        let (status, body) = send(&server, post("/", "{this is not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[{\"name\":\"John\",\"login\":\"\"}]\n");
    }

    #[tokio::test]
    async fn malformed_body_never_invokes_handler() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        async fn create(_: Context, user: User) -> Result<User, StatusError> {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(user)
        }
        let server = server(Router::new().on(Method::POST, "/", bind(create)));

        let (status, body) = send(&server, post("/", "{\"name\": 1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.starts_with("{\"error\":\"parsing input: "));
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);

        let (status, body) = send(&server, post("/", "{\"name\":\"New John\",\"login\":\"nj\"}")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{\"name\":\"New John\",\"login\":\"nj\"}\n");
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn raw_bytes_pass_through() {
        async fn raw(_: Context, _: Empty) -> Result<Vec<u8>, StatusError> {
            Ok(b"plain bytes".to_vec())
        }
        let server = server(Router::new().on(Method::GET, "/", bind(raw)));
        let res = server.respond(Request::new(get("/"))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().get("content-type").is_none());
    }

    #[tokio::test]
    async fn encode_failure_is_internal_error() {
        async fn unencodable(_: Context, _: Empty) -> Result<BTreeMap<Vec<u8>, u8>, StatusError> {
            Ok(BTreeMap::from([(vec![1], 1)]))
        }
        let server = server(Router::new().on(Method::GET, "/", bind(unencodable)));
        let (status, body) = send(&server, get("/")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("{\"error\":"));
    }

    #[tokio::test]
    async fn path_params_and_state_reach_the_function() {
        #[derive(Clone)]
        struct Domain(&'static str);

        async fn user(ctx: Context, _: Empty) -> Result<User, StatusError> {
            let domain = ctx.state::<Domain>().ok_or_else(|| StatusError::not_found(NotFound))?;
            Ok(User {
                name: "John Doe".into(),
                login: format!("{}@{}", ctx.param("user").unwrap_or_default(), domain.0),
            })
        }
        let server = Arc::new(
            Server::new(Router::new().on(Method::GET, "/users/{user}", bind(user)))
                .with_state(Domain("example.org")),
        );
        let (status, body) = send(&server, get("/users/jdoe")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "{\"name\":\"John Doe\",\"login\":\"jdoe@example.org\"}\n");
    }

    #[tokio::test]
    async fn bound_handler_works_outside_a_server() {
        async fn missing(ctx: Context, _: Empty) -> Result<User, NotFound> {
            assert!(ctx.server().is_none());
            Err(NotFound)
        }
        let handler = bind(missing).into_boxed_handler();
        let mut buf = crate::writer::ResponseBuffer::new();
        handler.call(&mut buf, Request::new(get("/"))).await;
        assert_eq!(buf.status(), Some(StatusCode::NOT_FOUND));
    }
}
