//! Plain HTTP(S) download backend (spec.md §4.5's "Web" row)
//!
//! No signing, no `x-ms-*`/`x-amz-*` headers — just a GET or HEAD against
//! whatever host [`crate::path::WebPath`] parsed out.

use http::Method;

use crate::op::{Op, Opcode};
use crate::path::WebPath;

fn web_op(opcode: Opcode, method: Method, path: &WebPath) -> Op {
    let mut op = Op::new(opcode, method, path.host.clone(), path.dl_path.clone());
    op.requires_https = !path.insecure_http;
    op
}

pub fn dl_get(path: &WebPath, range: Option<(u64, u64)>) -> Op {
    let mut op = web_op(Opcode::WebDlGet, Method::GET, path);
    if let Some((start, end)) = range {
        op.headers.set("range", format!("bytes={start}-{end}"));
    }
    op
}

pub fn dl_head(path: &WebPath) -> Op {
    web_op(Opcode::WebDlHead, Method::HEAD, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dl_get_targets_parsed_host_and_path() {
        let path = WebPath::parse("https://example.com/a/b?x=1").unwrap();
        let op = dl_get(&path, None);
        assert_eq!(op.url_host, "example.com");
        assert_eq!(op.url_path, "/a/b?x=1");
        assert!(op.requires_https);
        assert_eq!(op.sign_mode(), crate::op::SignMode::None);
    }

    #[test]
    fn dl_get_sets_range_header() {
        let path = WebPath::parse("http://example.com/a").unwrap();
        let op = dl_get(&path, Some((0, 99)));
        assert_eq!(op.headers.get("range"), Some("bytes=0-99"));
        assert!(!op.requires_https);
    }

    #[test]
    fn dl_head_uses_head_method() {
        let path = WebPath::parse("https://example.com/a").unwrap();
        let op = dl_head(&path);
        assert_eq!(op.method, Method::HEAD);
    }
}
