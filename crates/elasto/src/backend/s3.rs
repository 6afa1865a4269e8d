//! S3-compatible object storage request builders and response processors
//! (spec.md §4.5's "S3" row)

use std::cell::RefCell;
use std::rc::Rc;

use http::Method;

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::{DataStream, Op, Opcode, RawResponse};
use crate::path::s3::{S3Location, S3Path};
use crate::sign::content_md5_b64;
use crate::xml::XmlDoc;

fn bucket_name(path: &S3Path) -> Option<&str> {
    match path {
        S3Path::Bucket { bucket } | S3Path::Object { bucket, .. } => Some(bucket),
        S3Path::Root => None,
    }
}

/// Resolves `location` to `(request_host, url_path)`, folding a non-default
/// port into the host since [`crate::conn::Connection`] builds its request
/// URL from host and path alone (spec.md §4.1).
fn target(location: &S3Location, insecure_http: bool) -> (String, String) {
    let (mut host, path) = location.addressing();
    let default_port = if insecure_http { 80 } else { 443 };
    if location.port != default_port {
        host = format!("{host}:{}", location.port);
    }
    (host, path)
}

fn s3_op(opcode: Opcode, method: Method, location: &S3Location, insecure_http: bool) -> Op {
    let (host, path) = target(location, insecure_http);
    let mut op = Op::new(opcode, method, host, path);
    op.requires_https = !insecure_http;
    if let Some(bucket) = bucket_name(&location.path) {
        op.set_sign_bucket(bucket);
    }
    op
}

/// Lists all buckets owned by the signing account (`GET Service`).
pub fn svc_list(location: &S3Location, insecure_http: bool) -> Op {
    s3_op(Opcode::S3SvcList, Method::GET, location, insecure_http)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    pub name: String,
}

pub fn process_svc_list(resp: &RawResponse) -> ElastoResult<Vec<BucketSummary>> {
    let names = Rc::new(RefCell::new(Vec::new()));
    let names_in_cb = Rc::clone(&names);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/ListAllMyBucketsResult/Buckets/Bucket", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        names_in_cb.borrow_mut().push(name);
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let names = Rc::try_unwrap(names).expect("finder closure dropped with doc").into_inner();
    Ok(names.into_iter().map(|n| BucketSummary { name: n.get().unwrap_or_default() }).collect())
}

/// Creates `location`'s bucket. `region` becomes a `<CreateBucketConfiguration>`
/// body, required by S3 for any region other than US Standard.
pub fn bkt_create(location: &S3Location, insecure_http: bool, region: Option<&str>) -> Op {
    let mut op = s3_op(Opcode::S3BktCreate, Method::PUT, location, insecure_http);
    if let Some(region) = region {
        let body = format!(
            "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\"><LocationConstraint>{region}</LocationConstraint></CreateBucketConfiguration>"
        );
        op.request_body = DataStream::from_buf(body.into_bytes());
    }
    op
}

pub fn bkt_delete(location: &S3Location, insecure_http: bool) -> Op {
    s3_op(Opcode::S3BktDelete, Method::DELETE, location, insecure_http)
}

pub fn bkt_list(location: &S3Location, insecure_http: bool, prefix: Option<&str>) -> Op {
    let mut op = s3_op(Opcode::S3BktList, Method::GET, location, insecure_http);
    if let Some(p) = prefix {
        op.push_query("prefix", p);
    }
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

pub fn process_bkt_list(resp: &RawResponse) -> ElastoResult<Vec<ObjectSummary>> {
    let rows = Rc::new(RefCell::new(Vec::new()));
    let rows_in_cb = Rc::clone(&rows);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/ListBucketResult/Contents", false, move |reg, _path| {
        let key = reg.want_str("./Key", true)?;
        let size = reg.want_u64("./Size", true)?;
        rows_in_cb.borrow_mut().push((key, size));
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let rows = Rc::try_unwrap(rows).expect("finder closure dropped with doc").into_inner();
    Ok(rows.into_iter().map(|(k, s)| ObjectSummary { key: k.get().unwrap_or_default(), size: s.get().unwrap_or(0) }).collect())
}

pub fn bkt_location_get(location: &S3Location, insecure_http: bool) -> Op {
    let mut op = s3_op(Opcode::S3BktLocationGet, Method::GET, location, insecure_http);
    op.push_query("location", "");
    op
}

pub fn process_bkt_location(resp: &RawResponse) -> ElastoResult<String> {
    let mut doc = XmlDoc::new();
    let region = doc.want_str("/LocationConstraint", false)?;
    doc.parse(&resp.body)?;
    Ok(region.get().unwrap_or_default())
}

pub fn obj_put(location: &S3Location, insecure_http: bool, body: Vec<u8>) -> Op {
    let mut op = s3_op(Opcode::S3ObjPut, Method::PUT, location, insecure_http);
    op.headers.set("content-md5", content_md5_b64(&body));
    op.request_body = DataStream::from_buf(body);
    op
}

pub fn obj_get(location: &S3Location, insecure_http: bool, range: Option<(u64, u64)>) -> Op {
    let mut op = s3_op(Opcode::S3ObjGet, Method::GET, location, insecure_http);
    if let Some((start, end)) = range {
        op.headers.set("range", format!("bytes={start}-{end}"));
    }
    op
}

pub fn obj_head(location: &S3Location, insecure_http: bool) -> Op {
    s3_op(Opcode::S3ObjHead, Method::HEAD, location, insecure_http)
}

pub fn obj_delete(location: &S3Location, insecure_http: bool) -> Op {
    s3_op(Opcode::S3ObjDelete, Method::DELETE, location, insecure_http)
}

pub fn obj_copy(location: &S3Location, insecure_http: bool, source_bucket: &str, source_key: &str) -> Op {
    let mut op = s3_op(Opcode::S3ObjCopy, Method::PUT, location, insecure_http);
    op.headers.set("x-amz-copy-source", format!("/{source_bucket}/{source_key}"));
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectProps {
    pub content_length: u64,
}

pub fn process_object_props(resp: &RawResponse) -> ElastoResult<ObjectProps> {
    let content_length = resp
        .headers
        .get("content-length")
        .ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "object response missing content-length"))?
        .parse()
        .map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "malformed content-length header"))?;
    Ok(ObjectProps { content_length })
}

pub fn mp_start(location: &S3Location, insecure_http: bool) -> Op {
    let mut op = s3_op(Opcode::S3MpStart, Method::POST, location, insecure_http);
    op.push_query("uploads", "");
    op
}

pub fn process_mp_start(resp: &RawResponse) -> ElastoResult<String> {
    let mut doc = XmlDoc::new();
    let upload_id = doc.want_str("/InitiateMultipartUploadResult/UploadId", true)?;
    doc.parse(&resp.body)?;
    upload_id.get().ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "missing UploadId"))
}

pub fn part_put(location: &S3Location, insecure_http: bool, upload_id: &str, part_number: u32, body: Vec<u8>) -> Op {
    let mut op = s3_op(Opcode::S3PartPut, Method::PUT, location, insecure_http);
    op.push_query("partNumber", part_number.to_string());
    op.push_query("uploadId", upload_id.to_owned());
    op.headers.set("content-md5", content_md5_b64(&body));
    op.request_body = DataStream::from_buf(body);
    op
}

/// The part number/ETag pair `mp_done`'s body lists, read off each
/// `part_put` response's `ETag` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

pub fn process_part_put(resp: &RawResponse, part_number: u32) -> ElastoResult<CompletedPart> {
    let etag = resp
        .headers
        .get("etag")
        .ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "part upload response missing ETag"))?
        .to_owned();
    Ok(CompletedPart { part_number, etag })
}

pub fn mp_done(location: &S3Location, insecure_http: bool, upload_id: &str, parts: &[CompletedPart]) -> Op {
    let mut op = s3_op(Opcode::S3MpDone, Method::POST, location, insecure_http);
    op.push_query("uploadId", upload_id.to_owned());

    let mut body = String::from("<CompleteMultipartUpload>");
    for part in parts {
        body.push_str(&format!("<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>", part.part_number, part.etag));
    }
    body.push_str("</CompleteMultipartUpload>");
    op.headers.set("content-type", "application/xml");
    op.request_body = DataStream::from_buf(body.into_bytes());
    op
}

pub fn mp_abort(location: &S3Location, insecure_http: bool, upload_id: &str) -> Op {
    let mut op = s3_op(Opcode::S3MpAbort, Method::DELETE, location, insecure_http);
    op.push_query("uploadId", upload_id.to_owned());
    op
}
