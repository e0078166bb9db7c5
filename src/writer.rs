//! The outbound write capability and its observers.
//!
//! Handlers never build a hyper response themselves. They receive a
//! `&mut dyn ResponseWriter` and produce output as side effects on it:
//!
//! ```text
//! handler ──► WrapWriter (observes status / bytes, optional tee)
//!                 └──► ResponseBuffer (transport side) ──► http::Response ──► hyper
//! ```

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// Write side of one HTTP exchange.
///
/// Mirrors the semantics every HTTP server gives its handlers:
///
/// - headers may be edited until the head is written;
/// - `write_header` only honours its first call;
/// - `write` before `write_header` implicitly sends `200 OK`.
pub trait ResponseWriter: Send {
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Writes a prefix of `buf`, returning how many bytes were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf)? {
                0 => return Err(io::ErrorKind::WriteZero.into()),
                n => buf = &buf[n..],
            }
        }
        Ok(())
    }
}

// ── ResponseBuffer ────────────────────────────────────────────────────────────

/// The transport's writer: collects one response in memory and hands it to
/// hyper once the handler chain returns.
#[derive(Debug, Default)]
pub struct ResponseBuffer {
    headers: HeaderMap,
    head: Option<(StatusCode, HeaderMap)>,
    body: BytesMut,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status sent so far, `None` if nothing has been written yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.head.as_ref().map(|(status, _)| *status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Finishes the exchange. A handler that wrote nothing answers `200`
    /// with an empty body.
    pub fn into_response(self) -> http::Response<Full<Bytes>> {
        let (status, headers) = self.head.unwrap_or((StatusCode::OK, self.headers));
        let mut response = http::Response::new(Full::new(self.body.freeze()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }
}

impl ResponseWriter for ResponseBuffer {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if let Some((sent, _)) = &self.head {
            tracing::debug!(sent = sent.as_u16(), ignored = status.as_u16(), "superfluous write_header");
            return;
        }
        // Later header edits don't reach the wire.
        self.head = Some((status, self.headers.clone()));
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.head.is_none() {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }
}

// ── WrapWriter ────────────────────────────────────────────────────────────────

/// Proxy around another [`ResponseWriter`] that records the status code and
/// the number of body bytes written, and can copy the body to a second sink.
///
/// Write semantics are untouched: everything is forwarded to the wrapped
/// writer first.
pub struct WrapWriter<'a> {
    inner: &'a mut dyn ResponseWriter,
    wrote_header: bool,
    status: Option<StatusCode>,
    bytes: usize,
    tee: Option<Box<dyn io::Write + Send + 'a>>,
}

impl<'a> WrapWriter<'a> {
    pub fn new(inner: &'a mut dyn ResponseWriter) -> Self {
        Self { inner, wrote_header: false, status: None, bytes: 0, tee: None }
    }

    /// Status sent through this wrapper, `None` if none has been sent yet.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// Total body bytes accepted by the wrapped writer.
    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    /// Copies every accepted body byte to `sink` as well.
    ///
    /// Only one sink is active at a time; a second call replaces the first.
    /// Bytes reach the wrapped writer before the sink.
    pub fn tee(&mut self, sink: impl io::Write + Send + 'a) {
        self.tee = Some(Box::new(sink));
    }
}

impl ResponseWriter for WrapWriter<'_> {
    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if !self.wrote_header {
            self.wrote_header = true;
            self.status = Some(status);
            self.inner.write_header(status);
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        // An error from the wrapped writer wins over one from the tee.
        let n = self.inner.write(buf)?;
        self.bytes += n;
        if let Some(tee) = self.tee.as_mut() {
            io::Write::write_all(tee, &buf[..n])?;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts at most `limit` bytes per call, or fails every write.
    struct Stingy {
        limit: usize,
        fail: bool,
        inner: ResponseBuffer,
    }

    impl ResponseWriter for Stingy {
        fn headers_mut(&mut self) -> &mut HeaderMap { self.inner.headers_mut() }
        fn write_header(&mut self, status: StatusCode) { self.inner.write_header(status) }
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            let n = buf.len().min(self.limit);
            self.inner.write(&buf[..n])
        }
    }

    struct FailingSink;

    impl io::Write for FailingSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("sink full"))
        }
        fn flush(&mut self) -> io::Result<()> { Ok(()) }
    }

    #[test]
    fn implicit_ok_on_first_write() {
        let mut buf = ResponseBuffer::new();
        let mut w = WrapWriter::new(&mut buf);
        assert_eq!(w.status(), None);

        w.write_all(b"hello").unwrap();
        assert_eq!(w.status(), Some(StatusCode::OK));
        assert_eq!(w.bytes_written(), 5);
        drop(w);

        let response = buf.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn first_write_header_wins() {
        let mut buf = ResponseBuffer::new();
        let mut w = WrapWriter::new(&mut buf);
        w.write_header(StatusCode::CREATED);
        w.write_header(StatusCode::BAD_REQUEST);
        w.write_all(b"{}").unwrap();
        assert_eq!(w.status(), Some(StatusCode::CREATED));
        drop(w);
        assert_eq!(buf.status(), Some(StatusCode::CREATED));
    }

    #[test]
    fn headers_freeze_once_head_is_written() {
        let mut buf = ResponseBuffer::new();
        buf.headers_mut().insert("x-before", "1".parse().unwrap());
        buf.write_header(StatusCode::ACCEPTED);
        buf.headers_mut().insert("x-after", "1".parse().unwrap());

        let response = buf.into_response();
        assert!(response.headers().contains_key("x-before"));
        assert!(!response.headers().contains_key("x-after"));
    }

    #[test]
    fn tee_sees_only_accepted_prefix() {
        let mut stingy = Stingy { limit: 3, fail: false, inner: ResponseBuffer::new() };
        let mut sink = Vec::new();
        {
            let mut w = WrapWriter::new(&mut stingy);
            w.tee(&mut sink);
            assert_eq!(w.write(b"abcdef").unwrap(), 3);
            assert_eq!(w.bytes_written(), 3);
        }
        assert_eq!(sink, b"abc");
        assert_eq!(stingy.inner.body(), b"abc");
    }

    #[test]
    fn tee_replaced_by_second_call() {
        let mut buf = ResponseBuffer::new();
        let mut first = Vec::new();
        let mut second = Vec::new();
        {
            let mut w = WrapWriter::new(&mut buf);
            w.tee(&mut first);
            w.tee(&mut second);
            w.write_all(b"body").unwrap();
        }
        assert!(first.is_empty());
        assert_eq!(second, b"body");
    }

    #[test]
    fn inner_error_preferred_over_tee_error() {
        let mut stingy = Stingy { limit: 8, fail: true, inner: ResponseBuffer::new() };
        let mut w = WrapWriter::new(&mut stingy);
        w.tee(FailingSink);
        let err = w.write(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(w.bytes_written(), 0);
    }

    #[test]
    fn tee_error_surfaces_after_successful_write() {
        let mut buf = ResponseBuffer::new();
        {
            let mut w = WrapWriter::new(&mut buf);
            w.tee(FailingSink);
            let err = w.write(b"data").unwrap_err();
            assert_eq!(err.to_string(), "sink full");
            assert_eq!(w.bytes_written(), 4);
        }
        assert_eq!(buf.body(), b"data");
    }
}
