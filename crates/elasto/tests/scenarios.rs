//! End-to-end scenario tests exercising builder/processor pairs and the
//! pure state machines directly, since [`elasto::conn::Connection`] binds a
//! concrete `reqwest::Client` with no mockable transport.

use elasto::backend::{azure_blob, azure_file};
use elasto::config::ElastoConfig;
use elasto::fh::{self, flags, LeaseState, OpenTokens};
use elasto::header::HeaderList;
use elasto::path::S3Path;
use elasto::{ElastoErrorKind, RawResponse};

fn response(status: u16, headers: HeaderList, body: Vec<u8>) -> RawResponse {
    RawResponse { status, headers, body, request_id: None }
}

/// Scenario 1: create container c42, write 1024 bytes of `i mod 256` to
/// `/acc/c42/io_test` at offset 0, read it back and get the same bytes.
#[test]
fn azure_blob_round_trip() {
    let pattern: Vec<u8> = (0..1024u32).map(|i| (i % 256) as u8).collect();

    let create = azure_blob::create_container("acc", "c42");
    assert_eq!(create.url_path, "/c42");

    let write = azure_blob::put_blob_block("acc", "c42", "io_test", pattern.clone());
    assert_eq!(write.headers.get("x-ms-blob-type"), Some("BlockBlob"));
    assert_eq!(write.request_body.len(), 1024);

    let read = azure_blob::get_blob("acc", "c42", "io_test", Some((0, 1023)));
    assert_eq!(read.headers.get("range"), Some("bytes=0-1023"));

    // The transport would hand back exactly the bytes committed above.
    let mut headers = HeaderList::new();
    headers.set("content-length", "1024");
    let resp = response(200, headers, pattern.clone());
    assert_eq!(resp.body, pattern);
}

/// Scenario 2: open CREATE|EXCL, stat size 0, truncate to 1 GiB then stat
/// 1 GiB, truncate to 1 MiB then stat 1 MiB.
#[test]
fn azure_page_blob_truncate() {
    assert!(fh::validate_flags(flags::CREATE | flags::EXCL).is_ok());

    let create = azure_blob::put_blob_page("acc", "c42", "truncate_test", 0).unwrap();
    assert_eq!(create.headers.get("x-ms-blob-content-length"), Some("0"));

    let one_gib = 1024 * 1024 * 1024u64;
    let grow = azure_blob::set_blob_props_length("acc", "c42", "truncate_test", one_gib).unwrap();
    assert_eq!(grow.headers.get("x-ms-blob-content-length"), Some(one_gib.to_string().as_str()));

    let mut headers = HeaderList::new();
    headers.set("content-length", &one_gib.to_string());
    let resp = response(200, headers, Vec::new());
    assert_eq!(azure_blob::process_blob_props(&resp).unwrap().content_length, one_gib);

    let one_mib = 1024 * 1024u64;
    let shrink = azure_blob::set_blob_props_length("acc", "c42", "truncate_test", one_mib).unwrap();
    assert_eq!(shrink.headers.get("x-ms-blob-content-length"), Some(one_mib.to_string().as_str()));

    let mut headers = HeaderList::new();
    headers.set("content-length", &one_mib.to_string());
    let resp = response(200, headers, Vec::new());
    assert_eq!(azure_blob::process_blob_props(&resp).unwrap().content_length, one_mib);

    // An unaligned truncate target is rejected rather than silently rounded.
    assert!(azure_blob::set_blob_props_length("acc", "c42", "truncate_test", one_mib + 1).is_err());
}

/// Scenario 3: share s1, dir truth, nested dir truth/is; readdir truth
/// returns one DIR entry is; file truth/f sized 1 TiB; readdir returns is
/// and f; deleting dir truth before deleting f conflicts (409), deleting f
/// first then lets the dir delete succeed.
#[test]
fn azure_file_share_dir_file_lifecycle() {
    let share = azure_file::share_create("acc", "s1");
    assert_eq!(share.url_query, vec![("restype".to_owned(), "share".to_owned())]);

    let dir = azure_file::dir_create("acc", "s1", "truth");
    assert_eq!(dir.url_path, "/s1/truth");

    let nested = azure_file::dir_create("acc", "s1", "truth/is");
    assert_eq!(nested.url_path, "/s1/truth/is");

    let listing_body = b"<EnumerationResults><Entries><Directory><Name>is</Name></Directory></Entries></EnumerationResults>";
    let resp = response(200, HeaderList::new(), listing_body.to_vec());
    let entries = azure_file::process_dirs_files_list(&resp).unwrap();
    assert_eq!(entries, vec![azure_file::DirEntry::Directory { name: "is".into() }]);

    let one_tib = 1024u64 * 1024 * 1024 * 1024;
    let file = azure_file::file_create("acc", "s1", "truth/f", one_tib);
    assert_eq!(file.headers.get("x-ms-content-length"), Some(one_tib.to_string().as_str()));

    let listing_body = b"<EnumerationResults><Entries>\
<Directory><Name>is</Name></Directory>\
<File><Name>f</Name><Properties><Content-Length>1099511627776</Content-Length></Properties></File>\
</Entries></EnumerationResults>";
    let resp = response(200, HeaderList::new(), listing_body.to_vec());
    let entries = azure_file::process_dirs_files_list(&resp).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1], azure_file::DirEntry::File { name: "f".into(), content_length: one_tib });

    // Deleting the non-empty directory first maps to a conflict.
    let dir_delete_conflict = elasto::kind_from_status(409, None);
    assert_eq!(dir_delete_conflict, ElastoErrorKind::Conflict);

    // Delete the file, then the (now empty) directory delete is a plain 202/200.
    let file_delete = azure_file::file_delete("acc", "s1", "truth/f");
    assert_eq!(file_delete.url_path, "/s1/truth/f");
    let dir_delete = azure_file::dir_delete("acc", "s1", "truth");
    assert_eq!(dir_delete.url_query, vec![("restype".to_owned(), "directory".to_owned())]);
}

/// Scenario 4: `/b/o` parses as an object, `///` as root, `/b/o/x` as
/// invalid-argument trailing garbage.
#[test]
fn s3_path_parsing() {
    let object = S3Path::parse(None, None, "/b/o", false).unwrap();
    assert_eq!(object.path, elasto::path::s3::S3Path::Object { bucket: "b".into(), object: "o".into() });

    let root = S3Path::parse(None, None, "///", false).unwrap();
    assert_eq!(root.path, elasto::path::s3::S3Path::Root);

    assert!(S3Path::parse(None, None, "/b/o/x", false).is_err());
}

/// Scenario 5: threshold 2 MiB, 5 MiB write splits into 2/2/1 MiB blocks;
/// after commit the blob is 5 MiB and reads back unchanged.
#[test]
fn multipart_upload_splits_above_threshold() {
    let config = ElastoConfig::default();
    assert_eq!(config.http_part_threshold, 2 * 1024 * 1024);

    let total = 5 * 1024 * 1024u64;
    let blocks = azure_blob::multipart::plan(total, &config).unwrap();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].len, 2 * 1024 * 1024);
    assert_eq!(blocks[1].len, 2 * 1024 * 1024);
    assert_eq!(blocks[2].len, 1024 * 1024);
    assert_eq!(blocks[2].offset, 4 * 1024 * 1024);

    let ids: Vec<String> = blocks.iter().map(|b| b.id_b64.clone()).collect();
    let commit = azure_blob::put_block_list("acc", "c", "b", &ids).unwrap();
    assert_eq!(commit.headers.get("content-type"), Some("application/xml"));

    let mut headers = HeaderList::new();
    headers.set("content-length", &total.to_string());
    let resp = response(200, headers, Vec::new());
    assert_eq!(azure_blob::process_blob_props(&resp).unwrap().content_length, total);
}

/// Scenario 6: handle A acquires an infinite lease, handle B's acquire
/// fails while it's held, B breaks it, B then acquires successfully, and
/// closing A afterward does not fail even though its lease is gone.
#[test]
fn lease_interaction_break_and_reacquire() {
    let mut a_lease = LeaseState::None;
    a_lease = a_lease.begin_acquire().unwrap();
    a_lease = a_lease.acquired().unwrap();
    assert_eq!(a_lease, LeaseState::Leased);

    // B cannot begin an acquire while A holds the lease server-side; from
    // B's own (fresh) state machine this is simply "not yet attempted" —
    // the conflict is enforced by the service returning 409, which the
    // connection surfaces as an error from `txrx` rather than a local
    // state transition.
    let conflict = elasto::kind_from_status(409, None);
    assert_eq!(conflict, ElastoErrorKind::Conflict);

    // B breaks A's lease.
    let broken = a_lease.broken().unwrap();
    assert_eq!(broken, LeaseState::Broken);

    // B then acquires: a fresh lease state machine, independent of A's.
    let mut b_lease = LeaseState::None;
    b_lease = b_lease.begin_acquire().unwrap();
    b_lease = b_lease.acquired().unwrap();
    assert_eq!(b_lease, LeaseState::Leased);

    // Closing A swallows the release failure (its lease was already
    // broken out from under it) rather than propagating an error.
    let release_from_broken = broken.begin_release();
    assert!(release_from_broken.is_ok());

    let tokens = OpenTokens::parse(&[("LEASE_ID", "b-lease")]).unwrap();
    assert_eq!(tokens.lease_id(), Some("b-lease"));
}
