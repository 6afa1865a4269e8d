//! Ordered, case-insensitive header list
//!
//! Builders append headers as they assemble a request; signers and response
//! processors look them up case-insensitively. Unlike `http::HeaderMap` this
//! preserves exact insertion order (needed for e.g. entity-header
//! canonicalisation in [`crate::sign`]) while still supporting multi-value
//! lookups.

use std::borrow::Cow;

/// Ordered sequence of `(name, value)` pairs.
///
/// Names are stored lower-cased; lookups lower-case the query name so
/// callers may use either case. Multiple values for one name preserve
/// insertion order (spec.md §3's "Header list" invariant).
#[derive(Debug, Default, Clone)]
pub struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn push(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> &mut Self {
        let name = name.into().to_ascii_lowercase();
        self.entries.push((name, value.into()));
        self
    }

    /// Replaces all existing values for `name` with a single value.
    pub fn set(&mut self, name: impl Into<Cow<'static, str>>, value: impl Into<String>) -> &mut Self {
        let name = name.into().to_ascii_lowercase();
        self.entries.retain(|(n, _)| n != &name);
        self.entries.push((name, value.into()));
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let name = name.to_ascii_lowercase();
        self.entries.iter().filter(move |(n, _)| *n == name).map(|(_, v)| v.as_str())
    }

    /// Joins multiple values for `name` with `,`, trimming leading/trailing
    /// whitespace from each value (LWS trimming, per the shared-key
    /// canonicalisation rule in spec.md §4.2).
    #[must_use]
    pub fn get_joined(&self, name: &str) -> Option<String> {
        let mut values = self.get_all(name).map(str::trim).peekable();
        values.peek()?;
        Some(values.collect::<Vec<_>>().join(","))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names present, de-duplicated, in first-seen order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for (n, _) in &self.entries {
            if !seen.contains(&n.as_str()) {
                seen.push(n.as_str());
            }
        }
        seen
    }
}
