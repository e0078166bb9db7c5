//! JSON codec adapter.
//!
//! Request bodies decode with `serde_json`. Results are framed by their
//! runtime type, decided late in [`Output::of`]:
//!
//! | result type                  | on the wire                         |
//! |------------------------------|-------------------------------------|
//! | `String`, `&'static str`     | `{"info": "<text>"}`, 200           |
//! | `Vec<u8>`, `Bytes`           | the bytes, untouched                |
//! | anything else                | its JSON encoding, 200              |
//!
//! Errors always go out as `{"error": "<message>"}` with the error's status.

use std::any::Any;
use std::io;

use bytes::Bytes;
use http::StatusCode;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StatusError;
use crate::writer::ResponseWriter;

/// A request body that isn't valid JSON for the expected input type.
#[derive(Debug, thiserror::Error)]
#[error("parsing input: {0}")]
pub struct DecodeError(#[from] serde_json::Error);

/// Decodes a JSON request body. Failures are `400 Bad Request`.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, StatusError> {
    serde_json::from_slice(body).map_err(|e| StatusError::bad_request(DecodeError(e)))
}

// ── Output framing ────────────────────────────────────────────────────────────

/// How a successful result is put on the wire.
#[derive(Debug, PartialEq, Eq)]
pub enum Output<'a> {
    /// Textual result, sent as an info envelope.
    Info(&'a str),
    /// Raw bytes, sent verbatim with no content-type of our own.
    Raw(&'a [u8]),
    /// Encoded JSON document.
    Json(Vec<u8>),
}

impl<'a> Output<'a> {
    /// Picks the framing for `value` by its runtime type, encoding to JSON
    /// when it is neither text nor bytes.
    pub fn of<O: Serialize + 'static>(value: &'a O) -> Result<Self, serde_json::Error> {
        let any: &'a dyn Any = value;
        if let Some(s) = any.downcast_ref::<String>() {
            return Ok(Self::Info(s.as_str()));
        }
        if let Some(s) = any.downcast_ref::<&'static str>() {
            return Ok(Self::Info(s));
        }
        if let Some(b) = any.downcast_ref::<Vec<u8>>() {
            return Ok(Self::Raw(b.as_slice()));
        }
        if let Some(b) = any.downcast_ref::<Bytes>() {
            return Ok(Self::Raw(&b[..]));
        }
        let mut json = serde_json::to_vec(value)?;
        json.push(b'\n');
        Ok(Self::Json(json))
    }

    pub fn write_to(self, w: &mut dyn ResponseWriter) -> io::Result<()> {
        match self {
            Self::Info(msg) => write_json(w, StatusCode::OK, &envelope_info(msg)),
            Self::Raw(bytes) => w.write_all(bytes),
            Self::Json(body) => write_json(w, StatusCode::OK, &body),
        }
    }
}

// ── Envelopes ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum Envelope<'a> {
    Error(&'a str),
    Info(&'a str),
}

impl Envelope<'_> {
    fn to_vec(&self) -> Vec<u8> {
        // A single string field always serializes.
        let mut out = serde_json::to_vec(self).unwrap_or_default();
        out.push(b'\n');
        out
    }
}

pub(crate) fn envelope_error(msg: &str) -> Vec<u8> {
    Envelope::Error(msg).to_vec()
}

pub(crate) fn envelope_info(msg: &str) -> Vec<u8> {
    Envelope::Info(msg).to_vec()
}

/// Writes `err` as an error envelope with its status code.
pub fn write_error(w: &mut dyn ResponseWriter, err: &StatusError) {
    let body = envelope_error(&err.to_string());
    if let Err(e) = write_json(w, err.code(), &body) {
        tracing::warn!(status = err.code().as_u16(), "writing error response: {e}");
    }
}

fn write_json(w: &mut dyn ResponseWriter, status: StatusCode, body: &[u8]) -> io::Result<()> {
    w.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    w.write_header(status);
    w.write_all(body)
}
