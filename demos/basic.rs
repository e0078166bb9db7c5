//! Users and groups over typed JSON handlers.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:9988/users
//!   curl -X POST http://localhost:9988/users -d '{"name":"alice","login":"alice"}'
//!   curl http://localhost:9988/api/users/jdoe
//!   curl http://localhost:9988/api/users/nobody          # 404
//!   curl http://localhost:9988/api/groups -H 'auth: root'

use knot::{Context, Empty, NotFound, Router, Server, StatusError, bind, middleware, require_header};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
struct User {
    name: String,
    #[serde(default)]
    login: String,
}

#[derive(Serialize)]
struct Group {
    name: String,
}

/// Shared directory the handlers read from.
#[derive(Clone)]
struct Directory {
    users: Vec<(&'static str, &'static str)>,
}

#[tokio::main]
async fn main() -> Result<(), knot::Error> {
    tracing_subscriber::fmt::init();

    let api = Router::new()
        .route("/users", bind(api_get_users))
        .route("/users/{user}", bind(api_get_user))
        .route("GET /groups", bind(get_groups).require(require_header("auth", "root")));

    let app = Router::new()
        .route("GET /users", bind(get_users))
        .route("POST /users", bind(post_users))
        .route("GET /groups", bind(get_groups))
        .nest("/api", api);

    let directory = Directory { users: vec![("John Doe", "jdoe"), ("Jane Roe", "jroe")] };

    Server::new(app)
        .middleware(middleware::logger())
        .with_state(directory)
        .serve("0.0.0.0:9988")
        .await
}

async fn get_users(_ctx: Context, _: Empty) -> Result<Vec<User>, StatusError> {
    Ok(vec![User { name: "John".into(), login: String::new() }])
}

async fn post_users(_ctx: Context, user: User) -> Result<User, StatusError> {
    if user.name.is_empty() {
        return Err(StatusError::bad_request("name is required"));
    }
    Ok(User { name: format!("New {}", user.name), login: user.login })
}

async fn get_groups(_ctx: Context, _: Empty) -> Result<Vec<Group>, StatusError> {
    Ok(vec![Group { name: "sudoers".into() }])
}

async fn api_get_users(ctx: Context, _: Empty) -> Result<Vec<User>, NotFound> {
    let directory = ctx.state::<Directory>().ok_or(NotFound)?;
    Ok(directory.users.iter()
        .map(|(name, login)| User { name: (*name).into(), login: (*login).into() })
        .collect())
}

async fn api_get_user(ctx: Context, _: Empty) -> Result<User, NotFound> {
    let login = ctx.param("user").ok_or(NotFound)?;
    let directory = ctx.state::<Directory>().ok_or(NotFound)?;
    directory.users.iter()
        .find(|(_, l)| *l == login)
        .map(|(name, login)| User { name: (*name).into(), login: (*login).into() })
        .ok_or(NotFound)
}
