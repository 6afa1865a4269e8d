//! Error kinds and the `ElastoError`/`ElastoResult` types
//!
//! Every fallible entry point in this crate returns [`ElastoResult`]. Backend
//! HTTP status codes are preserved on the error (see [`ElastoError::http_status`])
//! so callers and logs retain the original wire detail even though the kind
//! itself is backend-independent.

use std::fmt;

/// Backend-independent classification of a failure.
///
/// This is the set named in the component spec: each HTTP status returned by
/// a backend maps to exactly one of these kinds (see [`kind_from_status`]),
/// and every other failure source (argument validation, local I/O, decode
/// errors) produces one directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ElastoErrorKind {
    InvalidArgument,
    NotFound,
    Exists,
    PermissionDenied,
    Conflict,
    NotSupported,
    Timeout,
    Io,
    OutOfMemory,
    DataTooLarge,
    ShortRead,
    CorruptResponse,
    AuthFailed,
    TransientRetry,
    /// Internal-only signal: an S3 301 response asking the pipeline to
    /// retry against `redir_endpoint`. Never returned to a caller; the
    /// pipeline (`conn::txrx`) intercepts it.
    Redirect,
}

impl fmt::Display for ElastoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InvalidArgument => "invalid argument",
            Self::NotFound => "not found",
            Self::Exists => "already exists",
            Self::PermissionDenied => "permission denied",
            Self::Conflict => "conflict",
            Self::NotSupported => "not supported",
            Self::Timeout => "timeout",
            Self::Io => "i/o error",
            Self::OutOfMemory => "out of memory",
            Self::DataTooLarge => "data too large",
            Self::ShortRead => "short read",
            Self::CorruptResponse => "corrupt response",
            Self::AuthFailed => "authentication failed",
            Self::TransientRetry => "transient error, retry",
            Self::Redirect => "redirect",
        };
        f.write_str(s)
    }
}

/// A typed, loggable failure.
///
/// Carries the backend-independent [`ElastoErrorKind`] plus optional wire
/// context: the raw HTTP status (if the failure came from a response), a
/// human message (often the server's `<Message>` body), the Azure
/// `x-ms-request-id` if one was present, and a source error for `Display`/
/// `source()` chaining.
#[derive(Debug)]
pub struct ElastoError {
    kind: ElastoErrorKind,
    message: Option<String>,
    http_status: Option<u16>,
    request_id: Option<String>,
    redir_endpoint: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ElastoError {
    #[must_use]
    pub fn new(kind: ElastoErrorKind) -> Self {
        Self {
            kind,
            message: None,
            http_status: None,
            request_id: None,
            redir_endpoint: None,
            source: None,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ElastoErrorKind {
        self.kind
    }

    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.http_status
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    #[must_use]
    pub fn redir_endpoint(&self) -> Option<&str> {
        self.redir_endpoint.as_deref()
    }

    pub fn set_message(&mut self, msg: impl Into<String>) -> &mut Self {
        self.message = Some(msg.into());
        self
    }

    pub fn set_http_status(&mut self, status: u16) -> &mut Self {
        self.http_status = Some(status);
        self
    }

    pub fn set_request_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn set_redir_endpoint(&mut self, host: impl Into<String>) -> &mut Self {
        self.redir_endpoint = Some(host.into());
        self
    }

    pub fn set_source(&mut self, err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>) -> &mut Self {
        self.source = Some(err.into());
        self
    }

    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.set_message(msg);
        self
    }
}

impl fmt::Display for ElastoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(status) = self.http_status {
            write!(f, " (http {status})")?;
        }
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ElastoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

pub type ElastoResult<T> = Result<T, ElastoError>;

/// Maps an HTTP status returned by a backend to an [`ElastoErrorKind`].
///
/// `auth_code` carries an Azure response error code (e.g. `AuthenticationFailed`)
/// extracted from the error body, if any, since 403s are ambiguous between
/// `PermissionDenied` and `AuthFailed` without it.
#[must_use]
pub fn kind_from_status(status: u16, auth_code: Option<&str>) -> ElastoErrorKind {
    if status == 401 {
        return ElastoErrorKind::AuthFailed;
    }
    if status == 403 {
        return match auth_code {
            Some("AuthenticationFailed") => ElastoErrorKind::AuthFailed,
            _ => ElastoErrorKind::PermissionDenied,
        };
    }
    match status {
        301 => ElastoErrorKind::Redirect,
        404 => ElastoErrorKind::NotFound,
        409 => ElastoErrorKind::Conflict,
        412 | 416 => ElastoErrorKind::InvalidArgument,
        408 => ElastoErrorKind::Timeout,
        413 => ElastoErrorKind::DataTooLarge,
        500..=599 => ElastoErrorKind::TransientRetry,
        _ => ElastoErrorKind::Io,
    }
}

/// Constructs an [`ElastoError`] with a formatted message, mirroring the
/// ergonomics of a one-line `anyhow::bail!` without pulling `anyhow` into
/// library code.
#[macro_export]
macro_rules! elasto_error {
    ($kind:expr) => {
        $crate::error::ElastoError::new($kind)
    };
    ($kind:expr, $($arg:tt)+) => {
        $crate::error::ElastoError::new($kind).with_message(format!($($arg)+))
    };
}

#[macro_export]
macro_rules! invalid_arg {
    ($($arg:tt)+) => {
        $crate::elasto_error!($crate::error::ElastoErrorKind::InvalidArgument, $($arg)+)
    };
}
