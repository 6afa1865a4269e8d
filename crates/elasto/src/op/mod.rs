//! The operation envelope
//!
//! [`Op`] is the central unit described in spec.md §3: everything a
//! [`crate::conn::Connection`] needs to sign, send, and receive one
//! request/response cycle, independent of which backend built it. A builder
//! (one per backend verb, under `crate::backend`) constructs an `Op`;
//! `Connection::txrx` owns it for the duration of one transmit-receive
//! cycle (spec.md §4.1) and hands back a [`RawResponse`] for the builder's
//! own response processor to decode into a typed result.

pub mod stream;

pub use stream::DataStream;

use http::Method;

use crate::header::HeaderList;

/// Identifies which signature scheme a connection must apply before
/// sending this op (spec.md §4.2). `None` is used by the web backend,
/// which has no authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMode {
    None,
    AzureSharedKeyFull,
    AzureSharedKeyLite,
    S3V2,
}

/// One opcode per backend verb (spec.md §4.5's table), kept as a flat enum
/// rather than per-backend sub-enums so logging and the connection pipeline
/// can treat all ops uniformly. Resolves the duplicate-header open question
/// in spec.md §9 by carrying the full superset (account lifecycle + blob +
/// file + S3 + blocks) in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Opcode {
    // Azure management
    MgmtAccListAccounts,
    MgmtAccGetProps,
    MgmtAccCreate,
    MgmtAccDelete,
    MgmtStatusGet,
    MgmtAccGetKeys,
    // Azure blob (ABB/APB)
    BlobListContainers,
    BlobCreateContainer,
    BlobDeleteContainer,
    BlobGetContainerProps,
    BlobListBlobs,
    BlobPutBlob,
    BlobGetBlob,
    BlobHeadBlob,
    BlobSetProps,
    BlobPutPage,
    BlobClearPage,
    BlobListPageRanges,
    BlobCopyBlob,
    BlobPutBlock,
    BlobPutBlockList,
    BlobGetBlockList,
    BlobDeleteBlob,
    BlobLeaseAcquire,
    BlobLeaseRelease,
    BlobLeaseBreak,
    BlobLeaseRenew,
    ContainerLeaseAcquire,
    ContainerLeaseRelease,
    ContainerLeaseBreak,
    ContainerLeaseRenew,
    // Azure file (AFS)
    FileShareCreate,
    FileShareDelete,
    FileSharePropGet,
    FileShareList,
    FileDirCreate,
    FileDirDelete,
    FileDirPropGet,
    FileDirsFilesList,
    FileCreate,
    FileDelete,
    FilePropGet,
    FilePropSet,
    FilePut,
    FileGet,
    // S3
    S3SvcList,
    S3BktCreate,
    S3BktDelete,
    S3BktList,
    S3BktLocationGet,
    S3ObjPut,
    S3ObjGet,
    S3ObjHead,
    S3ObjDelete,
    S3ObjCopy,
    S3MpStart,
    S3MpDone,
    S3MpAbort,
    S3PartPut,
    // Web
    WebDlGet,
    WebDlHead,
}

impl Opcode {
    /// The [`SignMode`] a connection must use to sign this op.
    #[must_use]
    pub fn sign_mode(self) -> SignMode {
        use Opcode::{S3BktCreate, S3BktDelete, S3BktList, S3BktLocationGet, S3MpAbort, S3MpDone, S3MpStart};
        use Opcode::{S3ObjCopy, S3ObjDelete, S3ObjGet, S3ObjHead, S3ObjPut, S3PartPut, S3SvcList};
        use Opcode::{MgmtAccCreate, MgmtAccDelete, MgmtAccGetKeys, MgmtAccGetProps, MgmtAccListAccounts, MgmtStatusGet};
        use Opcode::WebDlGet;
        use Opcode::WebDlHead;
        match self {
            MgmtAccListAccounts | MgmtAccGetProps | MgmtAccCreate | MgmtAccDelete | MgmtStatusGet | MgmtAccGetKeys => {
                SignMode::AzureSharedKeyLite
            }
            S3SvcList | S3BktCreate | S3BktDelete | S3BktList | S3BktLocationGet | S3ObjPut | S3ObjGet | S3ObjHead
            | S3ObjDelete | S3ObjCopy | S3MpStart | S3MpDone | S3MpAbort | S3PartPut => SignMode::S3V2,
            WebDlGet | WebDlHead => SignMode::None,
            _ => SignMode::AzureSharedKeyFull,
        }
    }

    /// Azure ops, all of which must carry `x-ms-version`/`x-ms-date` (spec.md §6).
    #[must_use]
    pub fn is_azure(self) -> bool {
        !matches!(self.sign_mode(), SignMode::S3V2 | SignMode::None)
    }
}

/// Fixed `x-ms-version` sent on every Azure request (spec.md §4.5).
pub const AZURE_API_VERSION: &str = "2021-08-06";

/// The request half of the envelope.
#[derive(Debug)]
pub struct Op {
    pub opcode: Opcode,
    pub method: Method,
    pub url_host: String,
    pub url_path: String,
    pub url_query: Vec<(String, String)>,
    pub headers: HeaderList,
    pub request_body: DataStream,
    pub requires_https: bool,
    /// Bucket name folded into the S3 V2 canonical resource (spec.md §4.2).
    /// Needed separately from `url_path`/`url_host` because virtual-host
    /// addressing moves the bucket into the host, not the path.
    pub sign_bucket: Option<String>,
}

impl Op {
    #[must_use]
    pub fn new(opcode: Opcode, method: Method, url_host: impl Into<String>, url_path: impl Into<String>) -> Self {
        Self {
            opcode,
            method,
            url_host: url_host.into(),
            url_path: url_path.into(),
            url_query: Vec::new(),
            headers: HeaderList::new(),
            request_body: DataStream::None,
            requires_https: true,
            sign_bucket: None,
        }
    }

    pub fn push_query(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.url_query.push((key.into(), value.into()));
        self
    }

    pub fn set_sign_bucket(&mut self, bucket: impl Into<String>) -> &mut Self {
        self.sign_bucket = Some(bucket.into());
        self
    }

    #[must_use]
    pub fn sign_mode(&self) -> SignMode {
        self.opcode.sign_mode()
    }
}

/// The response half: raw bytes, handed to a backend-specific decoder.
///
/// Populated by `Connection::txrx` after spec.md §4.1 step 4; the
/// `x-ms-request-id` header (mandatory on Azure per spec.md §4.1) is
/// surfaced separately since every Azure processor needs it for error
/// reporting.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderList,
    pub body: Vec<u8>,
    pub request_id: Option<String>,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
