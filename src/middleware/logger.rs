//! Request logging.

use std::sync::Arc;
use std::time::Instant;

use tracing::info;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::middleware::Middleware;
use crate::request::Request;
use crate::writer::{ResponseWriter, WrapWriter};

/// Logs one `info` event per request: method, path, remote address, start
/// time, elapsed time, final status and body size.
///
/// The status is read from a [`WrapWriter`] around the response, since the
/// transport doesn't expose it after the fact. A response with no output is
/// logged as `200`, which is what the transport sends.
pub fn logger() -> Middleware {
    Arc::new(|next: BoxedHandler| Arc::new(Logger { next }) as BoxedHandler)
}

struct Logger {
    next: BoxedHandler,
}

impl ErasedHandler for Logger {
    fn call<'a>(&'a self, w: &'a mut dyn ResponseWriter, req: Request) -> BoxFuture<'a> {
        Box::pin(async move {
            let method = req.method().clone();
            let path = req.path().to_owned();
            let remote = req.remote_addr();
            let started_at = chrono::Local::now();
            let started = Instant::now();

            let mut wrapped = WrapWriter::new(w);
            self.next.call(&mut wrapped, req).await;

            let status = wrapped.status().map_or(200, |s| s.as_u16());
            info!(
                %method,
                %path,
                remote = ?remote,
                at = %started_at.format("%Y-%m-%d %H:%M:%S"),
                elapsed = ?started.elapsed(),
                status,
                bytes = wrapped.bytes_written(),
                "request",
            );
        })
    }
}
