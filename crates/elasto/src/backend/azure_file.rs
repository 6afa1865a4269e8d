//! Azure File Service (AFS) request builders and response processors
//! (spec.md §4.5's "Azure File" row)

use std::cell::RefCell;
use std::rc::Rc;

use http::Method;

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::{AZURE_API_VERSION, DataStream, Op, Opcode, RawResponse};
use crate::xml::XmlDoc;

fn file_op(opcode: Opcode, method: Method, account: &str, url_path: impl Into<String>) -> Op {
    let mut op = Op::new(opcode, method, format!("{account}.file.core.windows.net"), url_path);
    op.headers.set("x-ms-version", AZURE_API_VERSION);
    op
}

pub fn share_create(account: &str, share: &str) -> Op {
    let mut op = file_op(Opcode::FileShareCreate, Method::PUT, account, format!("/{share}"));
    op.push_query("restype", "share");
    op
}

pub fn share_delete(account: &str, share: &str) -> Op {
    let mut op = file_op(Opcode::FileShareDelete, Method::DELETE, account, format!("/{share}"));
    op.push_query("restype", "share");
    op
}

pub fn share_prop_get(account: &str, share: &str) -> Op {
    let mut op = file_op(Opcode::FileSharePropGet, Method::GET, account, format!("/{share}"));
    op.push_query("restype", "share");
    op
}

pub fn share_list(account: &str) -> Op {
    let mut op = file_op(Opcode::FileShareList, Method::GET, account, "/");
    op.push_query("comp", "list");
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareSummary {
    pub name: String,
}

pub fn process_share_list(resp: &RawResponse) -> ElastoResult<Vec<ShareSummary>> {
    let names = Rc::new(RefCell::new(Vec::new()));
    let names_in_cb = Rc::clone(&names);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/EnumerationResults/Shares/Share", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        names_in_cb.borrow_mut().push(name);
        Ok(())
    })?;
    doc.parse(&resp.body)?;
    let names = Rc::try_unwrap(names).expect("finder closure dropped with doc").into_inner();
    Ok(names.into_iter().map(|n| ShareSummary { name: n.get().unwrap_or_default() }).collect())
}

pub fn dir_create(account: &str, share: &str, dir: &str) -> Op {
    let mut op = file_op(Opcode::FileDirCreate, Method::PUT, account, format!("/{share}/{dir}"));
    op.push_query("restype", "directory");
    op
}

pub fn dir_delete(account: &str, share: &str, dir: &str) -> Op {
    let mut op = file_op(Opcode::FileDirDelete, Method::DELETE, account, format!("/{share}/{dir}"));
    op.push_query("restype", "directory");
    op
}

pub fn dir_prop_get(account: &str, share: &str, dir: &str) -> Op {
    let mut op = file_op(Opcode::FileDirPropGet, Method::GET, account, format!("/{share}/{dir}"));
    op.push_query("restype", "directory");
    op
}

pub fn dirs_files_list(account: &str, share: &str, dir: &str) -> Op {
    let mut op = file_op(Opcode::FileDirsFilesList, Method::GET, account, format!("/{share}/{dir}"));
    op.push_query("restype", "directory");
    op.push_query("comp", "list");
    op
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirEntry {
    Directory { name: String },
    File { name: String, content_length: u64 },
}

pub fn process_dirs_files_list(resp: &RawResponse) -> ElastoResult<Vec<DirEntry>> {
    let entries = Rc::new(RefCell::new(Vec::new()));
    let mut doc = XmlDoc::new();

    let dir_entries = Rc::clone(&entries);
    doc.want_path_cb("/EnumerationResults/Entries/Directory", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        dir_entries.borrow_mut().push(DirEntry::Directory { name: name.get().unwrap_or_default() });
        Ok(())
    })?;
    let file_entries = Rc::clone(&entries);
    doc.want_path_cb("/EnumerationResults/Entries/File", false, move |reg, _path| {
        let name = reg.want_str("./Name", true)?;
        let len = reg.want_u64("./Properties/Content-Length", false)?;
        file_entries.borrow_mut().push(DirEntry::File { name: name.get().unwrap_or_default(), content_length: len.get().unwrap_or(0) });
        Ok(())
    })?;

    doc.parse(&resp.body)?;
    Ok(Rc::try_unwrap(entries).expect("finder closures dropped with doc").into_inner())
}

pub fn file_create(account: &str, share: &str, path: &str, content_length: u64) -> Op {
    let mut op = file_op(Opcode::FileCreate, Method::PUT, account, format!("/{share}/{path}"));
    op.headers.set("x-ms-type", "file");
    op.headers.set("x-ms-content-length", content_length.to_string());
    op
}

pub fn file_delete(account: &str, share: &str, path: &str) -> Op {
    file_op(Opcode::FileDelete, Method::DELETE, account, format!("/{share}/{path}"))
}

pub fn file_prop_get(account: &str, share: &str, path: &str) -> Op {
    file_op(Opcode::FilePropGet, Method::HEAD, account, format!("/{share}/{path}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileProps {
    pub content_length: u64,
}

pub fn process_file_props(resp: &RawResponse) -> ElastoResult<FileProps> {
    let content_length = resp
        .headers
        .get("content-length")
        .ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "file response missing content-length"))?
        .parse()
        .map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "malformed content-length header"))?;
    Ok(FileProps { content_length })
}

pub fn file_prop_set(account: &str, share: &str, path: &str, content_length: u64) -> Op {
    let mut op = file_op(Opcode::FilePropSet, Method::PUT, account, format!("/{share}/{path}"));
    op.push_query("comp", "properties");
    op.headers.set("x-ms-content-length", content_length.to_string());
    op
}

/// Writes `body` at `off` within the file (spec.md §4.5); unlike page-blob
/// writes, AFS ranges are not sector-aligned.
pub fn file_put(account: &str, share: &str, path: &str, off: u64, body: Vec<u8>) -> Op {
    let mut op = file_op(Opcode::FilePut, Method::PUT, account, format!("/{share}/{path}"));
    op.push_query("comp", "range");
    op.headers.set("x-ms-write", "update");
    op.headers.set("x-ms-range", format!("bytes={off}-{}", off + body.len() as u64 - 1));
    op.request_body = DataStream::from_buf(body);
    op
}

pub fn file_get(account: &str, share: &str, path: &str, range: Option<(u64, u64)>) -> Op {
    let mut op = file_op(Opcode::FileGet, Method::GET, account, format!("/{share}/{path}"));
    if let Some((start, end)) = range {
        op.headers.set("range", format!("bytes={start}-{end}"));
    }
    op
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_create_sets_restype() {
        let op = share_create("acc", "s");
        assert_eq!(op.url_query, vec![("restype".to_owned(), "share".to_owned())]);
        assert_eq!(op.url_host, "acc.file.core.windows.net");
    }

    #[test]
    fn process_share_list_parses_names() {
        let body = b"<EnumerationResults><Shares><Share><Name>a</Name></Share><Share><Name>b</Name></Share></Shares></EnumerationResults>";
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body: body.to_vec(), request_id: None };
        let shares = process_share_list(&resp).unwrap();
        assert_eq!(shares, vec![ShareSummary { name: "a".into() }, ShareSummary { name: "b".into() }]);
    }

    #[test]
    fn process_dirs_files_list_distinguishes_kinds() {
        let body = b"<EnumerationResults><Entries>\
<Directory><Name>sub</Name></Directory>\
<File><Name>f</Name><Properties><Content-Length>42</Content-Length></Properties></File>\
</Entries></EnumerationResults>";
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body: body.to_vec(), request_id: None };
        let entries = process_dirs_files_list(&resp).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], DirEntry::Directory { name: "sub".into() });
        assert_eq!(entries[1], DirEntry::File { name: "f".into(), content_length: 42 });
    }

    #[test]
    fn file_create_sets_type_and_length() {
        let op = file_create("acc", "s", "d/f", 100);
        assert_eq!(op.headers.get("x-ms-type"), Some("file"));
        assert_eq!(op.headers.get("x-ms-content-length"), Some("100"));
    }

    #[test]
    fn file_put_computes_inclusive_range() {
        let op = file_put("acc", "s", "f", 10, vec![0u8; 5]);
        assert_eq!(op.headers.get("x-ms-range"), Some("bytes=10-14"));
    }

    #[test]
    fn process_file_props_reads_content_length() {
        let mut headers = crate::header::HeaderList::new();
        headers.set("content-length", "99");
        let resp = RawResponse { status: 200, headers, body: Vec::new(), request_id: None };
        assert_eq!(process_file_props(&resp).unwrap(), FileProps { content_length: 99 });
    }
}
