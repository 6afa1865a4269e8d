//! Web fetch path model (spec.md §3)

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebPath {
    pub host: String,
    pub dl_path: String,
    pub insecure_http: bool,
}

impl WebPath {
    /// Parses an absolute `http(s)://host/path?query` URL. No explicit
    /// port is supported (spec.md §3); only HTTP/HTTPS schemes.
    pub fn parse(raw: &str) -> ElastoResult<Self> {
        let url = Url::parse(raw).map_err(|e| elasto_error!(ElastoErrorKind::InvalidArgument, "malformed web url: {e}"))?;

        let insecure_http = match url.scheme() {
            "https" => false,
            "http" => true,
            other => return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "web url must be http or https: {other}")),
        };

        let host = url.host_str().ok_or_else(|| elasto_error!(ElastoErrorKind::InvalidArgument, "missing host in web url"))?;
        if host.is_empty() {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "missing host in web url"));
        }

        if url.port().is_some() {
            return Err(elasto_error!(ElastoErrorKind::NotSupported, "port specification not supported in web url"));
        }

        let mut dl_path = url.path().to_owned();
        if dl_path.is_empty() {
            dl_path = "/".to_owned();
        }
        if let Some(q) = url.query() {
            dl_path.push('?');
            dl_path.push_str(q);
        }

        Ok(Self { host: host.to_owned(), dl_path, insecure_http })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_https_with_path_and_query() {
        let p = WebPath::parse("https://example.com/a/b?x=1").unwrap();
        assert_eq!(p.host, "example.com");
        assert_eq!(p.dl_path, "/a/b?x=1");
        assert!(!p.insecure_http);
    }

    #[test]
    fn empty_path_defaults_to_slash() {
        let p = WebPath::parse("http://example.com").unwrap();
        assert_eq!(p.dl_path, "/");
        assert!(p.insecure_http);
    }

    #[test]
    fn rejects_non_http_scheme() {
        assert!(WebPath::parse("ftp://example.com").is_err());
    }

    #[test]
    fn rejects_explicit_port() {
        assert!(WebPath::parse("https://example.com:8443/a").is_err());
    }
}
