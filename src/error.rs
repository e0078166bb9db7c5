//! Error types.
//!
//! Two families live here:
//!
//! - [`StatusError`] — an application error tagged with the HTTP status it
//!   should be answered with. Business functions return plain errors; the
//!   binder turns them into `StatusError`s through a [`Classifier`].
//! - [`Error`] — infrastructure failures: binding a port, accepting a
//!   connection, reading a request body off the wire.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use http::StatusCode;

/// A boxed, thread-safe error. Anything a business function returns must
/// convert into this (`String`, `&str`, and every `std::error::Error` do).
pub type BoxError = Box<dyn StdError + Send + Sync>;

// ── StatusError ───────────────────────────────────────────────────────────────

/// An error carrying the HTTP status it maps to and its underlying cause.
///
/// The code is always within `100..=599`.
#[derive(Debug, thiserror::Error)]
#[error("{cause}")]
pub struct StatusError {
    code: StatusCode,
    #[source]
    cause: BoxError,
}

impl StatusError {
    /// Builds a `StatusError` with an explicit code, bypassing classification.
    ///
    /// Codes outside `100..=599` are answered as `500`.
    pub fn new(code: StatusCode, cause: impl Into<BoxError>) -> Self {
        let code = if code.as_u16() > 599 {
            tracing::warn!(code = code.as_u16(), "status code out of range, using 500");
            StatusCode::INTERNAL_SERVER_ERROR
        } else {
            code
        };
        Self { code, cause: cause.into() }
    }

    /// Same as [`StatusError::new`], taking a raw integer code.
    pub fn with_code(code: u16, cause: impl Into<BoxError>) -> Self {
        match StatusCode::from_u16(code) {
            Ok(code) => Self::new(code, cause),
            Err(_) => Self::new(StatusCode::INTERNAL_SERVER_ERROR, cause),
        }
    }

    pub fn bad_request(cause: impl Into<BoxError>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, cause)
    }

    pub fn not_found(cause: impl Into<BoxError>) -> Self {
        Self::new(StatusCode::NOT_FOUND, cause)
    }

    /// The fixed error answered when a permission predicate rejects a request.
    pub fn permission_denied() -> Self {
        Self::new(StatusCode::FORBIDDEN, "permission denied")
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn cause(&self) -> &(dyn StdError + Send + Sync + 'static) {
        &*self.cause
    }

    pub fn into_cause(self) -> BoxError {
        self.cause
    }
}

// ── NotFound sentinel ─────────────────────────────────────────────────────────

/// Sentinel for "the requested resource does not exist".
///
/// Return it (or anything whose source chain contains it) from a business
/// function and the default [`Classifier`] answers `404`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("not found")]
pub struct NotFound;

// ── Classifier ────────────────────────────────────────────────────────────────

type Predicate = Arc<dyn Fn(&(dyn StdError + 'static)) -> bool + Send + Sync>;

#[derive(Clone)]
struct Rule {
    code: StatusCode,
    matches: Predicate,
}

/// Maps plain errors to status codes.
///
/// Rules, in order:
/// 1. a [`StatusError`] passes through unchanged (a `StatusError` found
///    deeper in the source chain lends its code to the outer error);
/// 2. the first rule whose predicate matches any error in the source chain
///    assigns its code;
/// 3. everything else is `400 Bad Request`.
///
/// An explicit override given to [`Classifier::classify_with`] beats all of
/// the above.
///
/// The default set has two "absent resource" rules, both answering `404`:
/// the crate's [`NotFound`] sentinel and [`std::io::ErrorKind::NotFound`].
#[derive(Clone)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    /// A classifier with no rules: everything that isn't a `StatusError` is 400.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule. Earlier rules win.
    pub fn rule<F>(mut self, code: StatusCode, matches: F) -> Self
    where
        F: Fn(&(dyn StdError + 'static)) -> bool + Send + Sync + 'static,
    {
        self.rules.push(Rule { code, matches: Arc::new(matches) });
        self
    }

    /// Appends a rule mapping errors of type `E` to `404`.
    pub fn absent<E: StdError + 'static>(self) -> Self {
        self.rule(StatusCode::NOT_FOUND, |e| e.is::<E>())
    }

    pub fn classify(&self, err: BoxError) -> StatusError {
        self.classify_with(err, None)
    }

    pub fn classify_with(&self, err: BoxError, code: Option<StatusCode>) -> StatusError {
        let err = match err.downcast::<StatusError>() {
            Ok(status) => {
                return match code {
                    Some(code) => StatusError::new(code, status.into_cause()),
                    None => *status,
                };
            }
            Err(err) => err,
        };

        if let Some(code) = code {
            return StatusError::new(code, err);
        }

        let resolved = chain(&*err)
            .find_map(|e| e.downcast_ref::<StatusError>().map(StatusError::code))
            .or_else(|| {
                self.rules.iter()
                    .find(|rule| chain(&*err).any(|e| (rule.matches)(e)))
                    .map(|rule| rule.code)
            })
            .unwrap_or(StatusCode::BAD_REQUEST);

        StatusError::new(resolved, err)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::empty()
            .absent::<NotFound>()
            .rule(StatusCode::NOT_FOUND, |e| {
                e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
            })
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("rules", &self.rules.iter().map(|r| r.code).collect::<Vec<_>>())
            .finish()
    }
}

/// Walks an error and its `source()` chain, outermost first.
fn chain<'a>(err: &'a (dyn StdError + 'static)) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}

// ── Infrastructure errors ─────────────────────────────────────────────────────

/// The error type returned by the server's fallible operations.
///
/// Application-level failures are [`StatusError`]s written to the client;
/// this type surfaces failures of the plumbing underneath.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("body: {0}")]
    Body(#[from] hyper::Error),
}
