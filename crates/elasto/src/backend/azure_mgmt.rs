//! Azure Service Management request builders and response processors
//! (spec.md §4.5's "Azure management" row)
//!
//! All six verbs hit `management.core.windows.net`, signed with the legacy
//! shared-key-lite scheme ([`crate::op::SignMode::AzureSharedKeyLite`], see
//! [`crate::op::Opcode::sign_mode`]). Account creation is asynchronous: the
//! caller polls [`status_get`] against the `x-ms-request-id` handed back by
//! [`process_create_account`] (spec.md §4.8).

use std::cell::RefCell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use http::Method;

use crate::config::ElastoConfig;
use crate::conn::Connection;
use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::{AZURE_API_VERSION, DataStream, Op, Opcode, RawResponse};
use crate::xml::XmlDoc;

pub const MGMT_HOST: &str = "management.core.windows.net";

fn new_mgmt_op(opcode: Opcode, method: Method, path: impl Into<String>) -> Op {
    let mut op = Op::new(opcode, method, MGMT_HOST, path);
    op.headers.set("x-ms-version", AZURE_API_VERSION);
    op
}

/// One storage account summary, as returned by [`list_accounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub service_name: String,
    pub url: String,
    pub description: Option<String>,
    pub affinity_group: Option<String>,
    pub location: Option<String>,
}

pub fn list_accounts(sub_id: &str) -> Op {
    new_mgmt_op(Opcode::MgmtAccListAccounts, Method::GET, format!("/{sub_id}/services/storageservices"))
}

/// Parses the `<StorageServices>` listing body (spec.md §4.5).
pub fn process_list_accounts(resp: &RawResponse) -> ElastoResult<Vec<AccountSummary>> {
    let rows = Rc::new(RefCell::new(Vec::new()));
    let rows_in_cb = Rc::clone(&rows);
    let mut doc = XmlDoc::new();
    doc.want_path_cb("/StorageServices/StorageService", false, move |reg, _path| {
        let name = reg.want_str("./ServiceName", true)?;
        let url = reg.want_str("./Url", true)?;
        let desc = reg.want_str("./StorageServiceProperties/Description", false)?;
        let affin = reg.want_str("./StorageServiceProperties/AffinityGroup", false)?;
        let loc = reg.want_str("./StorageServiceProperties/Location", false)?;
        rows_in_cb.borrow_mut().push((name, url, desc, affin, loc));
        Ok(())
    })?;
    doc.parse(&resp.body)?;

    let accounts = Rc::try_unwrap(rows).expect("finder closure dropped with doc").into_inner();
    Ok(accounts
        .into_iter()
        .map(|(name, url, desc, affin, loc)| AccountSummary {
            service_name: name.get().unwrap_or_default(),
            url: url.get().unwrap_or_default(),
            description: desc.get(),
            affinity_group: affin.get(),
            location: loc.get(),
        })
        .collect())
}

pub fn get_account_props(sub_id: &str, service_name: &str) -> Op {
    new_mgmt_op(Opcode::MgmtAccGetProps, Method::GET, format!("/{sub_id}/services/storageservices/{service_name}"))
}

pub fn process_get_account_props(resp: &RawResponse) -> ElastoResult<AccountSummary> {
    let mut doc = XmlDoc::new();
    let name = doc.want_str("/StorageService/ServiceName", true)?;
    let url = doc.want_str("/StorageService/Url", true)?;
    let desc = doc.want_str("/StorageService/StorageServiceProperties/Description", false)?;
    let affin = doc.want_str("/StorageService/StorageServiceProperties/AffinityGroup", false)?;
    let loc = doc.want_str("/StorageService/StorageServiceProperties/Location", false)?;
    doc.parse(&resp.body)?;
    Ok(AccountSummary {
        service_name: name.get().unwrap_or_default(),
        url: url.get().unwrap_or_default(),
        description: desc.get(),
        affinity_group: affin.get(),
        location: loc.get(),
    })
}

/// Builds the `<CreateStorageServiceInput>` body and POSTs it. `location`
/// comes from the caller's `CREATE_AT_LOCATION` open token, or
/// [`crate::config::ElastoConfig::default_location`] if absent (spec.md §6).
pub fn create_account(sub_id: &str, service_name: &str, label_base64: &str, location: &str) -> Op {
    let body = format!(
        "<CreateStorageServiceInput xmlns=\"http://schemas.microsoft.com/windowsazure\">\
<ServiceName>{service_name}</ServiceName><Label>{label_base64}</Label>\
<Location>{location}</Location></CreateStorageServiceInput>"
    );
    let mut op = new_mgmt_op(Opcode::MgmtAccCreate, Method::POST, format!("/{sub_id}/services/storageservices"));
    op.headers.set("content-type", "application/xml");
    op.headers.set("content-md5", crate::sign::content_md5_b64(body.as_bytes()));
    op.request_body = DataStream::from_buf(body.into_bytes());
    op
}

/// Creation is async (202 Accepted); the `x-ms-request-id` header is the
/// token [`status_get`] polls.
pub fn process_create_account(resp: &RawResponse) -> ElastoResult<String> {
    if resp.status != 202 {
        return Err(elasto_error!(ElastoErrorKind::CorruptResponse, "expected 202 Accepted from create_account, got {}", resp.status));
    }
    resp.request_id.clone().ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "create_account response missing request id"))
}

pub fn delete_account(sub_id: &str, service_name: &str) -> Op {
    new_mgmt_op(Opcode::MgmtAccDelete, Method::DELETE, format!("/{sub_id}/services/storageservices/{service_name}"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed,
}

pub fn status_get(sub_id: &str, request_id: &str) -> Op {
    new_mgmt_op(Opcode::MgmtStatusGet, Method::GET, format!("/{sub_id}/operations/{request_id}"))
}

/// Parses `<Operation><Status>…</Status></Operation>` (spec.md §4.8's poll
/// target). An unrecognised status string is a corrupt response, not a
/// silently-ignored default.
pub fn process_status_get(resp: &RawResponse) -> ElastoResult<OperationStatus> {
    let mut doc = XmlDoc::new();
    let status = doc.want_str("/Operation/Status", true)?;
    doc.parse(&resp.body)?;
    match status.get().as_deref() {
        Some("InProgress") => Ok(OperationStatus::InProgress),
        Some("Succeeded") => Ok(OperationStatus::Succeeded),
        Some("Failed") => Ok(OperationStatus::Failed),
        other => Err(elasto_error!(ElastoErrorKind::CorruptResponse, "unrecognised operation status: {other:?}")),
    }
}

/// Polls `status_get` at `config.account_poll_interval_secs` until the
/// operation leaves `InProgress` or `config.account_poll_timeout_secs`
/// elapses (spec.md §4.8). A `Failed` status is surfaced as an error, not
/// folded into the timeout case.
pub async fn poll_until_complete(conn: &mut Connection, sub_id: &str, request_id: &str, config: &ElastoConfig) -> ElastoResult<()> {
    let deadline = Instant::now() + Duration::from_secs(config.account_poll_timeout_secs);
    loop {
        let resp = conn.txrx(status_get(sub_id, request_id)).await?;
        match process_status_get(&resp)? {
            OperationStatus::Succeeded => return Ok(()),
            OperationStatus::Failed => {
                return Err(elasto_error!(ElastoErrorKind::TransientRetry, "account operation {request_id} failed"));
            }
            OperationStatus::InProgress => {}
        }
        if Instant::now() >= deadline {
            return Err(elasto_error!(ElastoErrorKind::Timeout, "account operation {request_id} did not complete in time"));
        }
        tokio::time::sleep(Duration::from_secs(config.account_poll_interval_secs)).await;
    }
}

pub fn get_account_keys(sub_id: &str, service_name: &str) -> Op {
    new_mgmt_op(Opcode::MgmtAccGetKeys, Method::GET, format!("/{sub_id}/services/storageservices/{service_name}/keys"))
}

#[derive(Debug, Clone)]
pub struct AccountKeys {
    pub primary: String,
    pub secondary: String,
}

pub fn process_get_account_keys(resp: &RawResponse) -> ElastoResult<AccountKeys> {
    let mut doc = XmlDoc::new();
    let primary = doc.want_str("/StorageService/StorageServiceKeys/Primary", true)?;
    let secondary = doc.want_str("/StorageService/StorageServiceKeys/Secondary", true)?;
    doc.parse(&resp.body)?;
    Ok(AccountKeys { primary: primary.get().unwrap_or_default(), secondary: secondary.get().unwrap_or_default() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_accounts_targets_mgmt_host() {
        let op = list_accounts("sub1");
        assert_eq!(op.url_host, MGMT_HOST);
        assert_eq!(op.url_path, "/sub1/services/storageservices");
        assert_eq!(op.opcode.sign_mode(), crate::op::SignMode::AzureSharedKeyLite);
    }

    #[test]
    fn process_list_accounts_parses_multiple_entries() {
        let xml = b"<StorageServices>\
<StorageService><ServiceName>a</ServiceName><Url>https://a/</Url>\
<StorageServiceProperties><Location>West US</Location></StorageServiceProperties></StorageService>\
<StorageService><ServiceName>b</ServiceName><Url>https://b/</Url>\
<StorageServiceProperties></StorageServiceProperties></StorageService>\
</StorageServices>";
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body: xml.to_vec(), request_id: None };
        let accounts = process_list_accounts(&resp).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].service_name, "a");
        assert_eq!(accounts[0].location.as_deref(), Some("West US"));
        assert_eq!(accounts[1].service_name, "b");
        assert_eq!(accounts[1].location, None);
    }

    #[test]
    fn create_account_sets_xml_body() {
        let op = create_account("sub1", "svc", "bGFiZWw=", "West Europe");
        assert_eq!(op.method, Method::POST);
        assert!(op.request_body.len() > 0);
        assert!(op.headers.get("content-md5").is_some());
    }

    #[test]
    fn process_create_account_requires_202() {
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body: Vec::new(), request_id: Some("r1".into()) };
        assert!(process_create_account(&resp).is_err());
        let resp = RawResponse { status: 202, headers: crate::header::HeaderList::new(), body: Vec::new(), request_id: Some("r1".into()) };
        assert_eq!(process_create_account(&resp).unwrap(), "r1");
    }

    #[test]
    fn process_status_get_maps_known_states() {
        let body = b"<Operation><Status>Succeeded</Status></Operation>".to_vec();
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body, request_id: None };
        assert_eq!(process_status_get(&resp).unwrap(), OperationStatus::Succeeded);
    }

    #[test]
    fn process_account_keys_reads_both() {
        let body = b"<StorageService><StorageServiceKeys><Primary>p</Primary><Secondary>s</Secondary></StorageServiceKeys></StorageService>"
            .to_vec();
        let resp = RawResponse { status: 200, headers: crate::header::HeaderList::new(), body, request_id: None };
        let keys = process_get_account_keys(&resp).unwrap();
        assert_eq!(keys.primary, "p");
        assert_eq!(keys.secondary, "s");
    }
}
