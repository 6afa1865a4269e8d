//! S3 signature V2 (spec.md §4.2)

use crate::error::ElastoResult;
use crate::op::Op;

/// Sub-resource query parameters folded into the canonical resource, in
/// sorted order, exactly this fixed set (spec.md §4.2).
const SUB_RESOURCES: &[&str] = &[
    "acl",
    "lifecycle",
    "location",
    "logging",
    "notification",
    "partNumber",
    "policy",
    "requestPayment",
    "torrent",
    "uploadId",
    "uploads",
    "versionId",
    "versioning",
    "versions",
    "website",
];

fn canonicalize_amz_headers(op: &Op) -> String {
    let mut names: Vec<&str> = op.headers.names().into_iter().filter(|n| n.starts_with("x-amz-")).collect();
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

fn canonicalize_resource(bucket: Option<&str>, op: &Op) -> String {
    let mut out = String::new();
    if let Some(b) = bucket {
        out.push('/');
        out.push_str(b);
    }
    out.push_str(&op.url_path);

    let mut present: Vec<&(String, String)> =
        op.url_query.iter().filter(|(k, _)| SUB_RESOURCES.contains(&k.as_str())).collect();
    present.sort_by(|a, b| a.0.cmp(&b.0));

    for (i, (k, v)) in present.iter().enumerate() {
        out.push(if i == 0 { '?' } else { '&' });
        out.push_str(k);
        if !v.is_empty() {
            out.push('=');
            out.push_str(v);
        }
    }
    out
}

/// Signs `op` against `bucket` (`None` for bucketless/service-level ops),
/// adding `Authorization: AWS id:signature`.
pub fn sign(op: &mut Op, access_key: &str, secret: &[u8], bucket: Option<&str>) -> ElastoResult<()> {
    let content_md5 = op.headers.get("content-md5").unwrap_or("").to_owned();
    let content_type = op.headers.get("content-type").unwrap_or("").to_owned();
    let date = op.headers.get("date").unwrap_or("").to_owned();

    let mut canonical = String::new();
    canonical.push_str(op.method.as_str());
    canonical.push('\n');
    canonical.push_str(&content_md5);
    canonical.push('\n');
    canonical.push_str(&content_type);
    canonical.push('\n');
    canonical.push_str(&date);
    canonical.push('\n');
    canonical.push_str(&canonicalize_amz_headers(op));
    canonical.push_str(&canonicalize_resource(bucket, op));

    let sig = super::hmac_sha1_b64(secret, canonical.as_bytes())?;
    op.headers.set("Authorization", format!("AWS {access_key}:{sig}"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::op::Opcode;
    use http::Method;

    #[test]
    fn bucket_and_object_in_resource() {
        let op = Op::new(Opcode::S3ObjGet, Method::GET, "s3.amazonaws.com", "/key");
        let resource = canonicalize_resource(Some("bucket"), &op);
        assert_eq!(resource, "/bucket/key");
    }

    #[test]
    fn only_fixed_subresources_included() {
        let mut op = Op::new(Opcode::S3BktList, Method::GET, "s3.amazonaws.com", "");
        op.push_query("prefix", "x"); // not a sub-resource, excluded
        op.push_query("location", "");
        let resource = canonicalize_resource(Some("bucket"), &op);
        assert_eq!(resource, "/bucket?location");
    }

    #[test]
    fn sign_produces_aws_header() {
        let mut op = Op::new(Opcode::S3ObjGet, Method::GET, "s3.amazonaws.com", "/key");
        op.headers.set("date", "Tue, 01 Jan 2030 00:00:00 GMT");
        sign(&mut op, "AKID", b"secret", Some("bucket")).unwrap();
        assert!(op.headers.get("authorization").unwrap().starts_with("AWS AKID:"));
    }
}
