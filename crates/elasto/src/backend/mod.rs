//! Per-service request builders and response processors (spec.md §4.5)
//!
//! Each module owns one wire protocol: it turns backend-specific arguments
//! into an [`crate::op::Op`] a [`crate::conn::Connection`] can sign and
//! send, and turns the resulting [`crate::op::RawResponse`] back into a
//! typed result. None of them touch the network directly.

pub mod azure_blob;
pub mod azure_file;
pub mod azure_mgmt;
pub mod s3;
pub mod web;
