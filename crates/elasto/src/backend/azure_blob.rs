//! Azure Block/Page Blob (ABB/APB) request builders and response processors
//! (spec.md §4.5's "Azure Blob" row), plus the multipart block-blob uploader
//! (§4.6) and the page-blob range allocator (§4.7).

pub mod multipart;
pub mod page_range;

use std::cell::RefCell;
use std::rc::Rc;

use http::Method;

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::{AZURE_API_VERSION, DataStream, Op, Opcode, RawResponse};
use crate::path::AzureBlobPath;
use crate::sign::content_md5_b64;
use crate::xml::XmlDoc;

fn blob_op(opcode: Opcode, method: Method, account: &str, url_path: impl Into<String>) -> Op {
    let mut op = Op::new(opcode, method, format!("{account}.blob.core.windows.net"), url_path);
    op.headers.set("x-ms-version", AZURE_API_VERSION);
    op
}

pub fn list_containers(account: &str) -> Op {
    let mut op = blob_op(Opcode::BlobListContainers, Method::GET, account, "/");
    op.push_query("comp", "list");
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub name: String,
}

pub fn process_list_containers(resp: &RawResponse) -> ElastoResult<Vec<ContainerSummary>> {
    let names = Rc::new(RefCell::new(Vec::new()));
    let names_in_cb = Rc::clone(&names);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/EnumerationResults/Containers/Container", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        names_in_cb.borrow_mut().push(name);
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let names = Rc::try_unwrap(names).expect("finder closure dropped with doc").into_inner();
    Ok(names.into_iter().map(|n| ContainerSummary { name: n.get().unwrap_or_default() }).collect())
}

pub fn create_container(account: &str, container: &str) -> Op {
    let mut op = blob_op(Opcode::BlobCreateContainer, Method::PUT, account, format!("/{container}"));
    op.push_query("restype", "container");
    op
}

pub fn delete_container(account: &str, container: &str) -> Op {
    let mut op = blob_op(Opcode::BlobDeleteContainer, Method::DELETE, account, format!("/{container}"));
    op.push_query("restype", "container");
    op
}

pub fn get_container_props(account: &str, container: &str) -> Op {
    let mut op = blob_op(Opcode::BlobGetContainerProps, Method::GET, account, format!("/{container}"));
    op.push_query("restype", "container");
    op
}

pub fn list_blobs(account: &str, container: &str, prefix: Option<&str>) -> Op {
    let mut op = blob_op(Opcode::BlobListBlobs, Method::GET, account, format!("/{container}"));
    op.push_query("restype", "container");
    op.push_query("comp", "list");
    if let Some(p) = prefix {
        op.push_query("prefix", p);
    }
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobSummary {
    pub name: String,
    pub content_length: u64,
}

pub fn process_list_blobs(resp: &RawResponse) -> ElastoResult<Vec<BlobSummary>> {
    let blobs = Rc::new(RefCell::new(Vec::new()));
    let blobs_in_cb = Rc::clone(&blobs);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/EnumerationResults/Blobs/Blob", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        let len = reg.want_u64("./Properties/Content-Length", false)?;
        blobs_in_cb.borrow_mut().push((name, len));
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let blobs = Rc::try_unwrap(blobs).expect("finder closure dropped with doc").into_inner();
    Ok(blobs.into_iter().map(|(n, l)| BlobSummary { name: n.get().unwrap_or_default(), content_length: l.get().unwrap_or(0) }).collect())
}

/// `put_blob`: block blobs carry `body` directly; page blobs declare their
/// logical size up front via `x-ms-blob-content-length` and start empty
/// (spec.md §4.5, §4.7).
pub fn put_blob_block(account: &str, container: &str, blob: &str, body: Vec<u8>) -> Op {
    let mut op = blob_op(Opcode::BlobPutBlob, Method::PUT, account, AzureBlobPath::Blob {
        account: account.to_owned(),
        container: container.to_owned(),
        blob: blob.to_owned(),
    }
    .url_path());
    op.headers.set("x-ms-blob-type", "BlockBlob");
    op.headers.set("content-md5", content_md5_b64(&body));
    op.request_body = DataStream::from_buf(body);
    op
}

pub fn put_blob_page(account: &str, container: &str, blob: &str, size: u64) -> ElastoResult<Op> {
    if size % 512 != 0 {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "page blob size {size} is not sector-aligned"));
    }
    let mut op = blob_op(Opcode::BlobPutBlob, Method::PUT, account, AzureBlobPath::Blob {
        account: account.to_owned(),
        container: container.to_owned(),
        blob: blob.to_owned(),
    }
    .url_path());
    op.headers.set("x-ms-blob-type", "PageBlob");
    op.headers.set("x-ms-blob-content-length", size.to_string());
    Ok(op)
}

pub fn get_blob(account: &str, container: &str, blob: &str, range: Option<(u64, u64)>) -> Op {
    let mut op = blob_op(Opcode::BlobGetBlob, Method::GET, account, format!("/{container}/{blob}"));
    if let Some((start, end)) = range {
        op.headers.set("range", format!("bytes={start}-{end}"));
    }
    op
}

pub fn head_blob(account: &str, container: &str, blob: &str) -> Op {
    blob_op(Opcode::BlobHeadBlob, Method::HEAD, account, format!("/{container}/{blob}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlobProps {
    pub content_length: u64,
}

/// Reads `Content-Length` off a `head_blob`/`get_blob` response (spec.md
/// §3's stat `SIZE` field).
pub fn process_blob_props(resp: &RawResponse) -> ElastoResult<BlobProps> {
    let content_length = resp
        .headers
        .get("content-length")
        .ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "blob response missing content-length"))?
        .parse()
        .map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "malformed content-length header"))?;
    Ok(BlobProps { content_length })
}

/// `set_blob_props(content_length=N)`: the page-blob truncate primitive
/// (spec.md §4.7). Block blobs don't support resizing this way; callers
/// only issue this against page blobs.
pub fn set_blob_props_length(account: &str, container: &str, blob: &str, content_length: u64) -> ElastoResult<Op> {
    if content_length % 512 != 0 {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "page blob length {content_length} is not sector-aligned"));
    }
    let mut op = blob_op(Opcode::BlobSetProps, Method::PUT, account, format!("/{container}/{blob}"));
    op.push_query("comp", "properties");
    op.headers.set("x-ms-blob-content-length", content_length.to_string());
    Ok(op)
}

fn validate_page_alignment(off: u64, len: u64) -> ElastoResult<()> {
    if off % 512 != 0 || len % 512 != 0 {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "page write offset {off} / length {len} must be 512-aligned"));
    }
    Ok(())
}

pub fn put_page(account: &str, container: &str, blob: &str, off: u64, body: Vec<u8>) -> ElastoResult<Op> {
    validate_page_alignment(off, body.len() as u64)?;
    let mut op = blob_op(Opcode::BlobPutPage, Method::PUT, account, format!("/{container}/{blob}"));
    op.push_query("comp", "page");
    let mut buf = itoa::Buffer::new();
    let end = off + body.len() as u64 - 1;
    op.headers.set("x-ms-range", format!("bytes={}-{}", buf.format(off), end));
    op.headers.set("x-ms-page-write", "update");
    op.headers.set("content-md5", content_md5_b64(&body));
    op.request_body = DataStream::from_buf(body);
    Ok(op)
}

pub fn clear_page(account: &str, container: &str, blob: &str, off: u64, len: u64) -> ElastoResult<Op> {
    validate_page_alignment(off, len)?;
    let mut op = blob_op(Opcode::BlobClearPage, Method::PUT, account, format!("/{container}/{blob}"));
    op.push_query("comp", "page");
    op.headers.set("x-ms-range", format!("bytes={off}-{}", off + len - 1));
    op.headers.set("x-ms-page-write", "clear");
    Ok(op)
}

/// One windowed `list_page_ranges` request (spec.md §4.7: "1 GiB windows").
/// [`page_range::list_ranges`] drives repeated calls to this across a
/// blob's full length.
pub fn list_page_ranges(account: &str, container: &str, blob: &str, window_start: u64, window_end: u64) -> Op {
    let mut op = blob_op(Opcode::BlobListPageRanges, Method::GET, account, format!("/{container}/{blob}"));
    op.push_query("comp", "pagelist");
    op.headers.set("range", format!("bytes={window_start}-{window_end}"));
    op
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub start: u64,
    pub end: u64,
}

pub fn process_page_ranges(resp: &RawResponse) -> ElastoResult<Vec<PageRange>> {
    let ranges = Rc::new(RefCell::new(Vec::new()));
    let ranges_in_cb = Rc::clone(&ranges);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/PageList/PageRange", false, move |reg, _path| {
        let start = reg.want_u64("./Start", true)?;
        let end = reg.want_u64("./End", true)?;
        ranges_in_cb.borrow_mut().push((start, end));
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let ranges = Rc::try_unwrap(ranges).expect("finder closure dropped with doc").into_inner();
    ranges
        .into_iter()
        .map(|(s, e)| {
            let start = s.get().ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "page range missing Start"))?;
            let end = e.get().ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "page range missing End"))?;
            if start > end || start % 512 != 0 || (end + 1) % 512 != 0 {
                return Err(elasto_error!(ElastoErrorKind::CorruptResponse, "malformed page range {start}-{end}"));
            }
            Ok(PageRange { start, end })
        })
        .collect()
}

pub fn copy_blob(account: &str, container: &str, blob: &str, source_url: &str) -> Op {
    let mut op = blob_op(Opcode::BlobCopyBlob, Method::PUT, account, format!("/{container}/{blob}"));
    op.headers.set("x-ms-copy-source", source_url.to_owned());
    op
}

/// Block ids are caller-supplied, base64-encoded, ≤ 64 bytes decoded
/// (spec.md §4.5); [`multipart`] generates the zero-padded `block%06d`
/// scheme used by the uploader.
pub fn put_block(account: &str, container: &str, blob: &str, block_id_b64: &str, body: Vec<u8>) -> ElastoResult<Op> {
    let decoded_len = base64_simd::STANDARD
        .decode_to_vec(block_id_b64.as_bytes())
        .map_err(|e| elasto_error!(ElastoErrorKind::InvalidArgument, "block id is not valid base64: {e}"))?
        .len();
    if decoded_len > 64 {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "block id decodes to {decoded_len} bytes, max 64"));
    }
    let mut op = blob_op(Opcode::BlobPutBlock, Method::PUT, account, format!("/{container}/{blob}"));
    op.push_query("comp", "block");
    op.push_query("blockid", block_id_b64);
    op.headers.set("content-md5", content_md5_b64(&body));
    op.request_body = DataStream::from_buf(body);
    Ok(op)
}

/// Commits a block list, all blocks marked `Latest` (spec.md §4.6 step 4).
/// All block ids in one commit must decode to equal length.
pub fn put_block_list(account: &str, container: &str, blob: &str, block_ids_b64: &[String]) -> ElastoResult<Op> {
    let mut decoded_lens = block_ids_b64.iter().map(|id| {
        base64_simd::STANDARD
            .decode_to_vec(id.as_bytes())
            .map(|v| v.len())
            .map_err(|e| elasto_error!(ElastoErrorKind::InvalidArgument, "block id is not valid base64: {e}"))
    });
    let first_len = decoded_lens.next().transpose()?;
    for len in decoded_lens {
        if Some(len?) != first_len {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "block ids in one commit must have equal decoded length"));
        }
    }

    let mut body = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>");
    for id in block_ids_b64 {
        body.push_str("<Latest>");
        body.push_str(id);
        body.push_str("</Latest>");
    }
    body.push_str("</BlockList>");

    let mut op = blob_op(Opcode::BlobPutBlockList, Method::PUT, account, format!("/{container}/{blob}"));
    op.push_query("comp", "blocklist");
    op.headers.set("content-type", "application/xml");
    op.request_body = DataStream::from_buf(body.into_bytes());
    Ok(op)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockListType {
    Committed,
    Uncommitted,
    All,
}

impl BlockListType {
    fn as_query(self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Uncommitted => "uncommitted",
            Self::All => "all",
        }
    }
}

pub fn get_block_list(account: &str, container: &str, blob: &str, kind: BlockListType) -> Op {
    let mut op = blob_op(Opcode::BlobGetBlockList, Method::GET, account, format!("/{container}/{blob}"));
    op.push_query("comp", "blocklist");
    op.push_query("blocklisttype", kind.as_query());
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub id: String,
    pub size: u64,
    pub committed: bool,
}

pub fn process_block_list(resp: &RawResponse) -> ElastoResult<Vec<BlockInfo>> {
    let blocks = Rc::new(RefCell::new(Vec::new()));
    let mut doc = XmlDoc::new();
    let committed_blocks = Rc::clone(&blocks);
    doc.want_path_cb("/BlockList/CommittedBlocks/Block", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        let size = reg.want_u64("./Size", true)?;
        committed_blocks.borrow_mut().push((name, size, true));
        Ok(())
    })?;
    let uncommitted_blocks = Rc::clone(&blocks);
    doc.want_path_cb("/BlockList/UncommittedBlocks/Block", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        let size = reg.want_u64("./Size", true)?;
        uncommitted_blocks.borrow_mut().push((name, size, false));
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let blocks = Rc::try_unwrap(blocks).expect("finder closures dropped with doc").into_inner();
    Ok(blocks
        .into_iter()
        .map(|(n, s, committed)| BlockInfo { id: n.get().unwrap_or_default(), size: s.get().unwrap_or(0), committed })
        .collect())
}

pub fn delete_blob(account: &str, container: &str, blob: &str) -> Op {
    blob_op(Opcode::BlobDeleteBlob, Method::DELETE, account, format!("/{container}/{blob}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseAction {
    Acquire,
    Release,
    Break,
    Renew,
}

impl LeaseAction {
    fn as_header(self) -> &'static str {
        match self {
            Self::Acquire => "acquire",
            Self::Release => "release",
            Self::Break => "break",
            Self::Renew => "renew",
        }
    }
}

/// One lease builder shared by blob- and container-scoped ops (spec.md
/// §4.5 lists both); `url_path` is the only difference between the two.
fn lease_op(opcode: Opcode, account: &str, url_path: String, action: LeaseAction, lease_id: Option<&str>, duration_secs: Option<i32>) -> Op {
    let mut op = blob_op(opcode, Method::PUT, account, url_path);
    op.push_query("comp", "lease");
    op.headers.set("x-ms-lease-action", action.as_header());
    if let Some(id) = lease_id {
        op.headers.set("x-ms-lease-id", id.to_owned());
    }
    if let Some(secs) = duration_secs {
        op.headers.set("x-ms-lease-duration", secs.to_string());
    }
    op
}

pub fn blob_lease(account: &str, container: &str, blob: &str, action: LeaseAction, lease_id: Option<&str>, duration_secs: Option<i32>) -> Op {
    let opcode = match action {
        LeaseAction::Acquire => Opcode::BlobLeaseAcquire,
        LeaseAction::Release => Opcode::BlobLeaseRelease,
        LeaseAction::Break => Opcode::BlobLeaseBreak,
        LeaseAction::Renew => Opcode::BlobLeaseRenew,
    };
    lease_op(opcode, account, format!("/{container}/{blob}"), action, lease_id, duration_secs)
}

pub fn container_lease(account: &str, container: &str, action: LeaseAction, lease_id: Option<&str>, duration_secs: Option<i32>) -> Op {
    let opcode = match action {
        LeaseAction::Acquire => Opcode::ContainerLeaseAcquire,
        LeaseAction::Release => Opcode::ContainerLeaseRelease,
        LeaseAction::Break => Opcode::ContainerLeaseBreak,
        LeaseAction::Renew => Opcode::ContainerLeaseRenew,
    };
    let mut op = lease_op(opcode, account, format!("/{container}"), action, lease_id, duration_secs);
    op.push_query("restype", "container");
    op
}

/// Reads back the lease id Azure assigns on `acquire` (spec.md §4.8's
/// lease sub-state machine).
pub fn process_lease_id(resp: &RawResponse) -> Option<String> {
    resp.headers.get("x-ms-lease-id").map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_blob_block_sets_type_and_md5() {
        let op = put_blob_block("acc", "c", "b", b"hello".to_vec());
        assert_eq!(op.headers.get("x-ms-blob-type"), Some("BlockBlob"));
        assert!(op.headers.get("content-md5").is_some());
    }

    #[test]
    fn put_blob_page_rejects_unaligned_size() {
        assert!(put_blob_page("acc", "c", "b", 1023).is_err());
        assert!(put_blob_page("acc", "c", "b", 1024).is_ok());
    }

    #[test]
    fn put_page_rejects_unaligned_offset_or_length() {
        assert!(put_page("acc", "c", "b", 1, vec![0u8; 512]).is_err());
        assert!(put_page("acc", "c", "b", 0, vec![0u8; 511]).is_err());
        assert!(put_page("acc", "c", "b", 512, vec![0u8; 512]).is_ok());
    }

    #[test]
    fn put_block_list_rejects_mismatched_id_lengths() {
        let short = base64_simd::STANDARD.encode_to_string("a");
        let long = base64_simd::STANDARD.encode_to_string("aa");
        assert!(put_block_list("acc", "c", "b", &[short, long]).is_err());
    }

    #[test]
    fn put_block_list_accepts_equal_length_ids() {
        let a = base64_simd::STANDARD.encode_to_string("000001");
        let b = base64_simd::STANDARD.encode_to_string("000002");
        assert!(put_block_list("acc", "c", "b", &[a, b]).is_ok());
    }

    #[test]
    fn put_block_rejects_oversized_id() {
        let too_long = base64_simd::STANDARD.encode_to_string(vec![0u8; 65]);
        assert!(put_block("acc", "c", "b", &too_long, vec![1]).is_err());
    }

    #[test]
    fn process_page_ranges_validates_alignment() {
        let body = b"<PageList><PageRange><Start>0</Start><End>511</End></PageRange>\
<PageRange><Start>1024</Start><End>2047</End></PageRange></PageList>";
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body: body.to_vec(), request_id: None };
        let ranges = process_page_ranges(&resp).unwrap();
        assert_eq!(ranges, vec![PageRange { start: 0, end: 511 }, PageRange { start: 1024, end: 2047 }]);
    }

    #[test]
    fn set_blob_props_length_rejects_unaligned() {
        assert!(set_blob_props_length("acc", "c", "b", 1).is_err());
    }

    #[test]
    fn lease_op_carries_action_and_id() {
        let op = blob_lease("acc", "c", "b", LeaseAction::Acquire, None, Some(-1));
        assert_eq!(op.headers.get("x-ms-lease-action"), Some("acquire"));
        assert_eq!(op.headers.get("x-ms-lease-duration"), Some("-1"));
    }

    #[test]
    fn process_lease_id_reads_header() {
        let mut headers = crate::header::HeaderList::new();
        headers.set("x-ms-lease-id", "abc-123");
        let resp = RawResponse { status: 201, headers, body: Vec::new(), request_id: None };
        assert_eq!(process_lease_id(&resp).as_deref(), Some("abc-123"));
    }
}
