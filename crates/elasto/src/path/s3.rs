//! S3 path model (spec.md §3)
//!
//! Ported from the original `s3_path_parse` semantics: a leading slash is
//! required, runs of slashes collapse, a bucket-only path with trailing
//! slashes is still `Bkt`, and anything past the object name is rejected.

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};

pub const DEFAULT_HOST: &str = "s3.amazonaws.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum S3Path {
    Root,
    Bucket { bucket: String },
    Object { bucket: String, object: String },
}

/// A parsed S3 path plus host/addressing context (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub path: S3Path,
    pub host: String,
    pub port: u16,
    /// `true` selects virtual-host addressing (`bkt.s3.amazonaws.com`);
    /// `false` selects path-style (`host/bkt/...`), used whenever a custom
    /// host is supplied.
    pub bkt_as_host_prefix: bool,
}

impl S3Path {
    /// Parses `path` against an optional custom host. Mirrors the
    /// original: a `None` host defaults to [`DEFAULT_HOST`] with
    /// virtual-host addressing; a custom host always uses path-style.
    pub fn parse(custom_host: Option<&str>, port: Option<u16>, path: &str, insecure_http: bool) -> ElastoResult<S3Location> {
        if !path.starts_with('/') {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "S3 path must start with '/': {path}"));
        }
        let (host, bkt_as_host_prefix) = match custom_host {
            Some(h) => (h.to_owned(), false),
            None => (DEFAULT_HOST.to_owned(), true),
        };
        let port = port.unwrap_or(if insecure_http { 80 } else { 443 });

        let rest = path.trim_start_matches('/');
        if rest.is_empty() {
            return Ok(S3Location { path: S3Path::Root, host, port, bkt_as_host_prefix });
        }

        let mut it = rest.splitn(2, '/');
        let bucket = it.next().unwrap_or_default().to_owned();
        let remainder = it.next().unwrap_or("");
        let remainder = remainder.trim_start_matches('/');
        if remainder.is_empty() {
            return Ok(S3Location { path: S3Path::Bucket { bucket }, host, port, bkt_as_host_prefix });
        }

        if remainder.contains('/') {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "S3 object path has trailing garbage: {path}"));
        }

        Ok(S3Location { path: S3Path::Object { bucket, object: remainder.to_owned() }, host, port, bkt_as_host_prefix })
    }

    #[must_use]
    pub fn format(&self) -> String {
        match self {
            Self::Root => "/".to_owned(),
            Self::Bucket { bucket } => format!("/{bucket}"),
            Self::Object { bucket, object } => format!("/{bucket}/{object}"),
        }
    }
}

impl S3Location {
    /// Returns `(request_host, url_path)` honouring `bkt_as_host_prefix`.
    #[must_use]
    pub fn addressing(&self) -> (String, String) {
        match (&self.path, self.bkt_as_host_prefix) {
            (S3Path::Root, _) => (self.host.clone(), "/".to_owned()),
            (S3Path::Bucket { bucket }, true) => (format!("{bucket}.{}", self.host), "/".to_owned()),
            (S3Path::Bucket { bucket }, false) => (self.host.clone(), format!("/{bucket}")),
            (S3Path::Object { bucket, object }, true) => (format!("{bucket}.{}", self.host), format!("/{object}")),
            (S3Path::Object { bucket, object }, false) => (self.host.clone(), format!("/{bucket}/{object}")),
        }
    }
}
