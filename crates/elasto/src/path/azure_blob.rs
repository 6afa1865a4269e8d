//! Azure Blob path model (spec.md §3)

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};

/// `{ROOT | ACC(acc) | CTNR(acc,ctnr) | BLOB(acc,ctnr,blob)}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AzureBlobPath {
    Root,
    Account { account: String },
    Container { account: String, container: String },
    Blob { account: String, container: String, blob: String },
}

impl AzureBlobPath {
    /// Parses `/acc/ctnr/blob`, collapsing runs of `/` and stripping a
    /// trailing `/`. A fourth path segment is rejected (spec.md §3: "trailing
    /// segments beyond blob are rejected") — unlike S3 and AFS, ABB/APB blob
    /// names here are taken as a single path segment, matching the original
    /// implementation's `azure_path_parse`.
    pub fn parse(path: &str) -> ElastoResult<Self> {
        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        match segments.len() {
            0 => Ok(Self::Root),
            1 => Ok(Self::Account { account: segments[0].to_owned() }),
            2 => Ok(Self::Container { account: segments[0].to_owned(), container: segments[1].to_owned() }),
            3 => Ok(Self::Blob {
                account: segments[0].to_owned(),
                container: segments[1].to_owned(),
                blob: segments[2].to_owned(),
            }),
            _ => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "trailing garbage after blob name: {path}")),
        }
    }

    #[must_use]
    pub fn account(&self) -> Option<&str> {
        match self {
            Self::Root => None,
            Self::Account { account } | Self::Container { account, .. } | Self::Blob { account, .. } => Some(account),
        }
    }

    #[must_use]
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Container { container, .. } | Self::Blob { container, .. } => Some(container),
            _ => None,
        }
    }

    #[must_use]
    pub fn blob(&self) -> Option<&str> {
        match self {
            Self::Blob { blob, .. } => Some(blob),
            _ => None,
        }
    }

    /// Renders back to `/acc/ctnr/blob` form.
    #[must_use]
    pub fn format(&self) -> String {
        match self {
            Self::Root => String::new(),
            Self::Account { account } => format!("/{account}"),
            Self::Container { account, container } => format!("/{account}/{container}"),
            Self::Blob { account, container, blob } => format!("/{account}/{container}/{blob}"),
        }
    }

    /// Path relative to the account host, for URL construction
    /// (`https://acc.blob.core.windows.net<path>`).
    #[must_use]
    pub fn url_path(&self) -> String {
        match self {
            Self::Root | Self::Account { .. } => String::new(),
            Self::Container { container, .. } => format!("/{container}"),
            Self::Blob { container, blob, .. } => format!("/{container}/{blob}"),
        }
    }

    #[must_use]
    pub fn account_host(&self) -> Option<String> {
        self.account().map(|a| format!("{a}.blob.core.windows.net"))
    }

    pub fn require_blob(&self) -> ElastoResult<(&str, &str, &str)> {
        match self {
            Self::Blob { account, container, blob } => Ok((account, container, blob)),
            _ => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "path does not name a blob")),
        }
    }

    pub fn require_container(&self) -> ElastoResult<(&str, &str)> {
        match self {
            Self::Container { account, container } => Ok((account, container)),
            _ => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "path does not name a container")),
        }
    }
}
