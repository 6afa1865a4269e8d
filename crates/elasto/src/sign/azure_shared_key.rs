//! Azure shared-key signing (full and lite variants), spec.md §4.2
//!
//! Both variants build a canonical string and HMAC-SHA256 it with the
//! storage account key, differing only in which headers/query parameters
//! are folded into the canonicalised resource.

use crate::error::ElastoResult;
use crate::op::Op;

/// Headers folded into the canonical string for the *full* variant, in
/// this exact order, before `x-ms-*` canonicalisation.
const ENTITY_HEADERS_FULL: &[&str] = &[
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// The *lite* variant keeps only these two entity headers (spec.md §4.2).
const ENTITY_HEADERS_LITE: &[&str] = &["content-md5", "content-type"];

fn canonicalize_ms_headers(op: &Op) -> String {
    let mut names: Vec<&str> = op.headers.names().into_iter().filter(|n| n.starts_with("x-ms-")).collect();
    names.sort_unstable();
    let mut out = String::new();
    for name in names {
        let joined = op.headers.get_joined(name).unwrap_or_default();
        out.push_str(name);
        out.push(':');
        out.push_str(&joined);
        out.push('\n');
    }
    out
}

/// `/account/path` plus sorted query parameters, each as `\nname:value`
/// (multi-value joined by commas, name lower-cased). Used by the full
/// variant; the lite variant calls [`canonicalize_resource_lite`] instead.
fn canonicalize_resource_full(account: &str, op: &Op) -> String {
    let mut out = format!("/{account}{}", op.url_path);

    let mut params: Vec<(String, String)> = Vec::new();
    for (k, v) in &op.url_query {
        let k = k.to_ascii_lowercase();
        if let Some(existing) = params.iter_mut().find(|(ek, _)| *ek == k) {
            existing.1.push(',');
            existing.1.push_str(v);
        } else {
            params.push((k, v.clone()));
        }
    }
    params.sort_by(|a, b| a.0.cmp(&b.0));

    for (k, v) in params {
        out.push('\n');
        out.push_str(&k);
        out.push(':');
        out.push_str(&v);
    }
    out
}

/// Lite variant keeps only the first query parameter (e.g. `?comp=...`),
/// if present (spec.md §4.2).
fn canonicalize_resource_lite(account: &str, op: &Op) -> String {
    let mut out = format!("/{account}{}", op.url_path);
    if let Some((k, v)) = op.url_query.first() {
        out.push('?');
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

fn build_canonical(op: &Op, account: &str, entity_headers: &[&str], resource: String) -> String {
    let mut s = String::new();
    s.push_str(op.method.as_str());
    s.push('\n');
    for name in entity_headers {
        s.push_str(op.headers.get(name).unwrap_or(""));
        s.push('\n');
    }
    s.push_str(&canonicalize_ms_headers(op));
    s.push_str(&resource);
    let _ = account; // account folded into `resource` already
    s
}

/// Signs `op` with the full shared-key scheme, adding
/// `Authorization: SharedKey account:signature`.
pub fn sign(op: &mut Op, account: &str, key: &[u8]) -> ElastoResult<()> {
    let resource = canonicalize_resource_full(account, op);
    let canonical = build_canonical(op, account, ENTITY_HEADERS_FULL, resource);
    let sig = super::hmac_sha256_b64(key, canonical.as_bytes())?;
    op.headers.set("Authorization", format!("SharedKey {account}:{sig}"));
    Ok(())
}

/// Signs `op` with the legacy lite scheme used by the management API.
pub fn sign_lite(op: &mut Op, account: &str, key: &[u8]) -> ElastoResult<()> {
    let resource = canonicalize_resource_lite(account, op);
    let canonical = build_canonical(op, account, ENTITY_HEADERS_LITE, resource);
    let sig = super::hmac_sha256_b64(key, canonical.as_bytes())?;
    op.headers.set("Authorization", format!("SharedKeyLite {account}:{sig}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Opcode;
    use http::Method;

    fn sample_op() -> Op {
        let mut op = Op::new(Opcode::BlobGetBlob, Method::GET, "acc.blob.core.windows.net", "/ctnr/blob");
        op.headers.set("x-ms-version", "2021-08-06");
        op.headers.set("x-ms-date", "Tue, 01 Jan 2030 00:00:00 GMT");
        op
    }

    #[test]
    fn full_signature_is_deterministic() {
        let mut op1 = sample_op();
        let mut op2 = sample_op();
        sign(&mut op1, "acc", b"a2V5").unwrap();
        sign(&mut op2, "acc", b"a2V5").unwrap();
        assert_eq!(op1.headers.get("authorization"), op2.headers.get("authorization"));
        assert!(op1.headers.get("authorization").unwrap().starts_with("SharedKey acc:"));
    }

    #[test]
    fn lite_signature_differs_from_full() {
        let mut op1 = sample_op();
        let mut op2 = sample_op();
        sign(&mut op1, "acc", b"a2V5").unwrap();
        sign_lite(&mut op2, "acc", b"a2V5").unwrap();
        assert_ne!(op1.headers.get("authorization"), op2.headers.get("authorization"));
        assert!(op2.headers.get("authorization").unwrap().starts_with("SharedKeyLite acc:"));
    }

    #[test]
    fn query_params_sorted_and_joined_for_full() {
        let mut op = sample_op();
        op.push_query("comp", "list");
        op.push_query("a", "1");
        let resource = canonicalize_resource_full("acc", &op);
        assert_eq!(resource, "/acc/ctnr/blob\na:1\ncomp:list");
    }

    #[test]
    fn lite_keeps_only_first_query_param() {
        let mut op = sample_op();
        op.push_query("comp", "list");
        op.push_query("a", "1");
        let resource = canonicalize_resource_lite("acc", &op);
        assert_eq!(resource, "/acc/ctnr/blob?comp=list");
    }
}
