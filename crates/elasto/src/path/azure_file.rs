//! Azure File Service path model (spec.md §3)

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};

/// `{acc, share, parent_dir, fs_ent}`; `parent_dir` is optional, `fs_ent`
/// names either a file or a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureFilePath {
    pub account: String,
    pub share: String,
    pub parent_dir: Option<String>,
    pub fs_ent: Option<String>,
}

impl AzureFilePath {
    /// Parses `/acc/share/dir/.../ent`, collapsing slash runs. The last
    /// segment is `fs_ent`; everything between `share` and `fs_ent` is
    /// `parent_dir`, joined back with `/`.
    pub fn parse(path: &str) -> ElastoResult<Self> {
        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 2 {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "AFS path requires at least /acc/share"));
        }
        let account = segments[0].to_owned();
        let share = segments[1].to_owned();
        let rest = &segments[2..];
        if rest.is_empty() {
            return Ok(Self { account, share, parent_dir: None, fs_ent: None });
        }
        let fs_ent = Some(rest[rest.len() - 1].to_owned());
        let parent_dir = if rest.len() > 1 { Some(rest[..rest.len() - 1].join("/")) } else { None };
        Ok(Self { account, share, parent_dir, fs_ent })
    }

    #[must_use]
    pub fn format(&self) -> String {
        let mut s = format!("/{}/{}", self.account, self.share);
        if let Some(ref dir) = self.parent_dir {
            s.push('/');
            s.push_str(dir);
        }
        if let Some(ref ent) = self.fs_ent {
            s.push('/');
            s.push_str(ent);
        }
        s
    }

    #[must_use]
    pub fn account_host(&self) -> String {
        format!("{}.file.core.windows.net", self.account)
    }

    /// URL path under the share for directory/file REST calls.
    #[must_use]
    pub fn url_path(&self) -> String {
        let mut s = format!("/{}", self.share);
        if let Some(ref dir) = self.parent_dir {
            s.push('/');
            s.push_str(dir);
        }
        if let Some(ref ent) = self.fs_ent {
            s.push('/');
            s.push_str(ent);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_share_only() {
        let p = AzureFilePath::parse("/acc/share").unwrap();
        assert_eq!(p.parent_dir, None);
        assert_eq!(p.fs_ent, None);
    }

    #[test]
    fn parse_nested_dir_and_file() {
        let p = AzureFilePath::parse("/acc/share/truth/is/f").unwrap();
        assert_eq!(p.parent_dir.as_deref(), Some("truth/is"));
        assert_eq!(p.fs_ent.as_deref(), Some("f"));
    }

    #[test]
    fn parse_top_level_entry_has_no_parent() {
        let p = AzureFilePath::parse("/acc/share/truth").unwrap();
        assert_eq!(p.parent_dir, None);
        assert_eq!(p.fs_ent.as_deref(), Some("truth"));
    }

    #[test]
    fn format_round_trips() {
        let p = AzureFilePath::parse("/acc/share/truth/is/f").unwrap();
        assert_eq!(p.format(), "/acc/share/truth/is/f");
    }

    #[test]
    fn requires_share() {
        assert!(AzureFilePath::parse("/acc").is_err());
    }
}
