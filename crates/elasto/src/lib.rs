//! Elasto cloud storage client
//!
//! `elasto` is a client library for Azure Blob, Azure File, Azure
//! Management, S3-compatible object storage, and plain HTTP(S) downloads,
//! speaking each service's native REST protocol directly rather than
//! wrapping a vendor SDK.
//!
//! # Architecture
//!
//! A [`conn::Connection`] owns the transport and signing key for one
//! endpoint; backend modules under [`backend`] build [`op::Op`] requests
//! and decode their [`op::RawResponse`] into typed results. [`fh`] layers
//! a uniform open/read/write/close handle on top of the Azure Blob backend
//! for callers that want a filesystem-shaped API; other backends are driven
//! directly through their `backend` module and a [`conn::Connection`].

mod error;

pub mod auth;
pub mod backend;
pub mod config;
pub mod conn;
pub mod fh;
pub mod header;
pub mod op;
pub mod path;
pub mod sign;
pub mod xml;

pub use self::error::{ElastoError, ElastoErrorKind, ElastoResult, kind_from_status};
pub use self::header::HeaderList;
pub use self::op::{DataStream, Op, Opcode, RawResponse, SignMode};
