//! Runtime configuration (spec.md §4.6/§4.7/§4.8/§5's numeric knobs)
//!
//! The component spec names several constants inline (multipart thresholds,
//! the page-range listing window, account-creation poll interval/timeout,
//! redirect/retry limits). [`ElastoConfig`] lifts them into one struct with
//! documented defaults, following `s3s`'s `S3Config`/`S3ConfigProvider`
//! split: a plain, `serde`-derived data struct behind a provider trait so
//! callers can swap in their own source (env, file, hardcoded) without the
//! rest of the crate caring how it got there.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Tunable knobs read by the connection pipeline, the multipart uploader,
/// and the page-blob range allocator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElastoConfig {
    /// Above this size a block-blob `put_blob` is split into parts
    /// (spec.md §4.6). 2 MiB, matching the HTTP and HTTPS thresholds the
    /// original gives as equal.
    pub http_part_threshold: u64,
    /// Hard per-part ceiling for the multipart uploader (spec.md §4.6).
    pub block_max_size: u64,
    /// Per-blob cap on uncommitted blocks (spec.md §4.6).
    pub block_max_count: u32,
    /// Per-blob cap on uncommitted bytes (spec.md §4.6).
    pub blob_max_uncommitted_bytes: u64,
    /// Window size for paged `list_page_ranges` queries (spec.md §4.7).
    pub page_range_window: u64,
    /// Per-request inactivity timeout (spec.md §5).
    pub connect_timeout_secs: u64,
    /// Maximum S3 redirect hops followed before surfacing an error
    /// (spec.md §4.1 step 5; the spec allows exactly one).
    pub redirect_max_hops: u32,
    /// Transport-close retries before surfacing the error (spec.md §4.1
    /// step 6; the spec allows exactly one).
    pub retry_max_attempts: u32,
    /// Polling interval while waiting for `create_account` to complete
    /// (spec.md §4.8).
    pub account_poll_interval_secs: u64,
    /// Total time budget for the same poll loop before a timeout error
    /// (spec.md §4.8).
    pub account_poll_timeout_secs: u64,
    /// Region passed to account/bucket creation when the caller's
    /// open-token bag has no `CREATE_AT_LOCATION` (spec.md §6).
    pub default_location: String,
}

impl Default for ElastoConfig {
    fn default() -> Self {
        Self {
            http_part_threshold: 2 * 1024 * 1024,
            block_max_size: 4 * 1024 * 1024,
            block_max_count: 100_000,
            blob_max_uncommitted_bytes: 400 * 1024 * 1024 * 1024,
            page_range_window: 1024 * 1024 * 1024,
            connect_timeout_secs: 30,
            redirect_max_hops: 1,
            retry_max_attempts: 1,
            account_poll_interval_secs: 2,
            account_poll_timeout_secs: 20,
            default_location: "West Europe".to_owned(),
        }
    }
}

/// Returns a snapshot of the current configuration.
///
/// Mirrors `S3ConfigProvider`: a trait rather than a bare `Arc<ElastoConfig>`
/// field so callers that do need hot-reload can implement one without
/// elasto depending on an atomic-swap crate for a feature this spec doesn't
/// require.
pub trait ElastoConfigProvider: Send + Sync + 'static {
    fn snapshot(&self) -> Arc<ElastoConfig>;
}

/// Immutable configuration fixed at construction time — the only provider
/// this crate ships, matching `StaticConfigProvider`.
pub struct StaticConfigProvider {
    config: Arc<ElastoConfig>,
}

impl StaticConfigProvider {
    #[must_use]
    pub fn new(config: Arc<ElastoConfig>) -> Self {
        Self { config }
    }
}

impl Default for StaticConfigProvider {
    fn default() -> Self {
        Self::new(Arc::new(ElastoConfig::default()))
    }
}

impl ElastoConfigProvider for StaticConfigProvider {
    fn snapshot(&self) -> Arc<ElastoConfig> {
        Arc::clone(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let c = ElastoConfig::default();
        assert_eq!(c.http_part_threshold, 2 * 1024 * 1024);
        assert_eq!(c.block_max_count, 100_000);
        assert_eq!(c.redirect_max_hops, 1);
    }

    #[test]
    fn static_provider_returns_same_config() {
        let provider = StaticConfigProvider::default();
        let a = provider.snapshot();
        let b = provider.snapshot();
        assert_eq!(a.default_location, b.default_location);
    }

    #[test]
    fn struct_update_overrides_single_field() {
        let c = ElastoConfig { block_max_size: 1024 * 1024, ..ElastoConfig::default() };
        assert_eq!(c.block_max_size, 1024 * 1024);
        assert_eq!(c.http_part_threshold, ElastoConfig::default().http_part_threshold);
    }
}
