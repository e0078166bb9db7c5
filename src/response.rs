//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Plain handlers build a [`Response`] and return it; the framework writes it
//! through the request's [`ResponseWriter`]. Typed business functions never
//! see this module: the binder encodes their results itself.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};

use crate::codec;
use crate::error::StatusError;
use crate::writer::ResponseWriter;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }

    fn header_value(self) -> HeaderValue {
        HeaderValue::from_static(self.as_str())
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// ```rust
/// use knot::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header("location", "/users/42")
///     .bytes(ContentType::Json, br#"{"id":42}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self::builder().bytes(ContentType::Json, body)
    }

    /// `200 OK` — `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::builder().bytes(ContentType::Text, body)
    }

    /// Response with no body.
    pub fn status(status: StatusCode) -> Self {
        Self { status, headers: HeaderMap::new(), body: Bytes::new() }
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { status: StatusCode::OK, headers: HeaderMap::new() }
    }

    pub fn status_code(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Sends the response through `w`: headers, then status, then body.
    pub fn write_to(self, w: &mut dyn ResponseWriter) {
        w.headers_mut().extend(self.headers);
        w.write_header(self.status);
        if !self.body.is_empty() {
            if let Err(e) = w.write_all(&self.body) {
                tracing::warn!("writing response body: {e}");
            }
        }
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to `200 OK`.
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HeaderMap,
}

impl ResponseBuilder {
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds a header. Invalid names or values are dropped with a warning.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                self.headers.append(name, value);
            }
            _ => tracing::warn!(name, "dropping invalid response header"),
        }
        self
    }

    /// Terminate with a typed body.
    pub fn bytes(mut self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.headers.insert(CONTENT_TYPE, content_type.header_value());
        Response { status: self.status, headers: self.headers, body: body.into() }
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response { status: self.status, headers: self.headers, body: Bytes::new() }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a status directly from a handler: `return StatusCode::NOT_FOUND`
impl IntoResponse for StatusCode {
    fn into_response(self) -> Response { Response::status(self) }
}

/// Renders the `{"error": …}` envelope with the error's status.
impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        Response::builder()
            .status(self.code())
            .bytes(ContentType::Json, codec::envelope_error(&self.to_string()))
    }
}

impl<T: IntoResponse, E: IntoResponse> IntoResponse for Result<T, E> {
    fn into_response(self) -> Response {
        match self {
            Ok(t) => t.into_response(),
            Err(e) => e.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::ResponseBuffer;

    #[test]
    fn builder_sets_status_and_headers() {
        let mut buf = ResponseBuffer::new();
        Response::builder()
            .status(StatusCode::CREATED)
            .header("location", "/users/99")
            .header("bad header", "x")
            .bytes(ContentType::Json, r#"{"id":"99"}"#)
            .write_to(&mut buf);

        let response = buf.into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()["location"], "/users/99");
        assert_eq!(response.headers()["content-type"], "application/json");
        assert_eq!(response.headers().len(), 2);
    }

    #[test]
    fn status_error_renders_envelope() {
        let response = StatusError::not_found("no such user").into_response();
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(response.body(), b"{\"error\":\"no such user\"}\n");
    }
}
