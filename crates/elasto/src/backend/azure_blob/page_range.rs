//! Page-blob range windowing (spec.md §4.7)
//!
//! `list_page_ranges` is queried in fixed-size windows rather than across a
//! blob's full length in one request; [`windows`] computes those window
//! boundaries. Per-write sector alignment is checked directly in
//! [`crate::backend::azure_blob::put_page`]/`clear_page`.

use crate::config::ElastoConfig;

pub const SECTOR_SIZE: u64 = 512;

/// Splits `[0, blob_len)` into `config.page_range_window`-sized, inclusive-end
/// windows for repeated `list_page_ranges` calls.
#[must_use]
pub fn windows(blob_len: u64, config: &ElastoConfig) -> Vec<(u64, u64)> {
    if blob_len == 0 {
        return Vec::new();
    }
    let window = config.page_range_window.max(SECTOR_SIZE);
    let mut out = Vec::new();
    let mut start = 0;
    while start < blob_len {
        let end = (start + window).min(blob_len) - 1;
        out.push((start, end));
        start += window;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_splits_blob_length_into_fixed_chunks() {
        let config = ElastoConfig { page_range_window: 1024, ..ElastoConfig::default() };
        let w = windows(3000, &config);
        assert_eq!(w, vec![(0, 1023), (1024, 2047), (2048, 2999)]);
    }

    #[test]
    fn windows_empty_blob_has_no_windows() {
        let config = ElastoConfig::default();
        assert!(windows(0, &config).is_empty());
    }

    #[test]
    fn windows_exact_multiple_has_no_short_final_window() {
        let config = ElastoConfig { page_range_window: 1024, ..ElastoConfig::default() };
        let w = windows(2048, &config);
        assert_eq!(w, vec![(0, 1023), (1024, 2047)]);
    }
}
