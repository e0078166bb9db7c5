//! # knot
//!
//! Typed JSON handlers on top of hyper. Nothing more. Nothing less.
//!
//! Write business logic as plain async functions over typed values:
//!
//! ```text
//! async fn name(ctx: Context, input: I) -> Result<O, E>
//! ```
//!
//! and knot does the HTTP around it:
//!
//! - **Binding** — [`bind`] decodes the JSON body into `I` (skipped when `I`
//!   is [`Empty`]), runs permission predicates, calls the function once and
//!   encodes `O`: text becomes `{"info": …}`, bytes go out untouched,
//!   anything else is JSON.
//! - **Errors** — anything the function returns is classified into a status
//!   code (see [`Classifier`]): `400` by default, `404` for absent
//!   resources, or whatever a [`StatusError`] asserts. Clients receive
//!   `{"error": …}`.
//! - **Middleware** — an ordered chain around the router, composed once on
//!   the first request; the first registered runs outermost. A built-in
//!   [`middleware::logger`] records every request.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use knot::{bind, middleware, Context, Empty, NotFound, Router, Server};
//! use http::Method;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct User { name: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), knot::Error> {
//!     let app = Router::new()
//!         .on(Method::GET,  "/users/{id}", bind(get_user))
//!         .on(Method::POST, "/users",      bind(create_user));
//!
//!     Server::new(app)
//!         .middleware(middleware::logger())
//!         .serve("0.0.0.0:3000")
//!         .await
//! }
//!
//! async fn get_user(ctx: Context, _: Empty) -> Result<User, NotFound> {
//!     match ctx.param("id") {
//!         Some("1") => Ok(User { name: "alice".into() }),
//!         _ => Err(NotFound),
//!     }
//! }
//!
//! async fn create_user(_ctx: Context, user: User) -> Result<String, knot::StatusError> {
//!     Ok(format!("created {}", user.name))
//! }
//! ```

mod bind;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod codec;
pub mod middleware;
pub mod writer;

pub use bind::{Bound, Empty, Permission, bind, require_header};
pub use context::Context;
pub use error::{BoxError, Classifier, Error, NotFound, StatusError};
pub use handler::{BoxFuture, BoxedHandler, ErasedHandler, Handler};
pub use request::{Body, Request};
pub use response::{ContentType, IntoResponse, Response, ResponseBuilder};
pub use router::Router;
pub use server::Server;
pub use writer::{ResponseBuffer, ResponseWriter, WrapWriter};
