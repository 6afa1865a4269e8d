//! Uniform open/read/write/close handle over backend operations (spec.md §4.8)
//!
//! [`BlobHandle`] is the vtable's concrete Azure Blob implementation: the
//! backend with the richest operation set (page-blob truncate, leasing),
//! and the one the end-to-end scenarios exercise directly. The
//! backend-agnostic pieces — open flags, the open-token bag, the lease and
//! handle state machines, and [`Stat`] — are factored out so an AFS or S3
//! handle could share them without duplicating the state logic.

use std::collections::HashMap;

use crate::backend::azure_blob::{self, LeaseAction};
use crate::config::ElastoConfig;
use crate::conn::Connection;
use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::DataStream;

/// Open flag bits (spec.md §6).
pub mod flags {
    pub const CREATE: u32 = 0x1;
    pub const EXCL: u32 = 0x2;
    pub const DIRECTORY: u32 = 0x4;
    pub const KNOWN: u32 = CREATE | EXCL | DIRECTORY;
}

/// Rejects unrecognised bits (spec.md §6: "unknown bits → invalid argument").
pub fn validate_flags(requested: u32) -> ElastoResult<()> {
    let unknown = requested & !flags::KNOWN;
    if unknown != 0 {
        return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "unknown open flag bits: {unknown:#x}"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum OpenTokenKey {
    CreateAtLocation,
    LeaseId,
}

impl OpenTokenKey {
    fn parse(key: &str) -> ElastoResult<Self> {
        match key {
            "CREATE_AT_LOCATION" => Ok(Self::CreateAtLocation),
            "LEASE_ID" => Ok(Self::LeaseId),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "unrecognised open token key: {other}")),
        }
    }
}

/// Open-time option bag (spec.md §6). Unknown keys are rejected at
/// construction, not silently ignored.
#[derive(Debug, Clone, Default)]
pub struct OpenTokens {
    values: HashMap<OpenTokenKey, String>,
}

impl OpenTokens {
    pub fn parse(raw: &[(&str, &str)]) -> ElastoResult<Self> {
        let mut values = HashMap::new();
        for (key, value) in raw {
            values.insert(OpenTokenKey::parse(key)?, (*value).to_owned());
        }
        Ok(Self { values })
    }

    #[must_use]
    pub fn create_at_location(&self) -> Option<&str> {
        self.values.get(&OpenTokenKey::CreateAtLocation).map(String::as_str)
    }

    #[must_use]
    pub fn lease_id(&self) -> Option<&str> {
        self.values.get(&OpenTokenKey::LeaseId).map(String::as_str)
    }
}

/// A handle's lifecycle (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Fresh,
    Open,
    Closed,
}

/// A handle's lease sub-state (spec.md §4.8). `Broken` is reached only from
/// `Leased`, as a side-transition rather than through `Releasing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseState {
    None,
    Leasing,
    Leased,
    Releasing,
    Broken,
}

impl LeaseState {
    pub fn begin_acquire(self) -> ElastoResult<Self> {
        match self {
            Self::None => Ok(Self::Leasing),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot acquire a lease from state {other:?}")),
        }
    }

    pub fn acquired(self) -> ElastoResult<Self> {
        match self {
            Self::Leasing => Ok(Self::Leased),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot complete acquire from state {other:?}")),
        }
    }

    pub fn begin_release(self) -> ElastoResult<Self> {
        match self {
            Self::Leased | Self::Broken => Ok(Self::Releasing),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot release a lease from state {other:?}")),
        }
    }

    pub fn released(self) -> ElastoResult<Self> {
        match self {
            Self::Releasing => Ok(Self::None),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot complete release from state {other:?}")),
        }
    }

    pub fn broken(self) -> ElastoResult<Self> {
        match self {
            Self::Leased => Ok(Self::Broken),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot break a lease from state {other:?}")),
        }
    }

    pub fn renewed(self) -> ElastoResult<Self> {
        match self {
            Self::Leased => Ok(Self::Leased),
            other => Err(elasto_error!(ElastoErrorKind::InvalidArgument, "cannot renew a lease from state {other:?}")),
        }
    }
}

/// Stat field validity bits (spec.md §6).
pub mod stat_mask {
    pub const TYPE: u32 = 0x1;
    pub const SIZE: u32 = 0x2;
    pub const BSIZE: u32 = 0x4;
    pub const LEASE: u32 = 0x8;
    pub const CONTENT_TYPE: u32 = 0x10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntType {
    File,
    Dir,
}

#[derive(Debug, Clone, Default)]
pub struct Stat {
    pub valid: u32,
    pub ent_type: Option<EntType>,
    pub size: u64,
    pub blksize: u64,
    pub lease_state: Option<LeaseState>,
    pub content_type: Option<String>,
}

impl Default for LeaseState {
    fn default() -> Self {
        Self::None
    }
}

/// A handle onto one Azure blob, dispatching through the [`azure_blob`]
/// builders (spec.md §4.8's vtable, specialised to this backend).
pub struct BlobHandle {
    state: HandleState,
    lease: LeaseState,
    lease_id: Option<String>,
    account: String,
    container: String,
    blob: String,
    is_page_blob: bool,
}

impl BlobHandle {
    /// Opens `account/container/blob`. With `CREATE`, a missing blob is
    /// created empty (page blobs at size 0); with `CREATE|EXCL`, an
    /// existing blob is an error.
    pub async fn open(
        conn: &mut Connection,
        account: &str,
        container: &str,
        blob: &str,
        open_flags: u32,
        tokens: &OpenTokens,
        is_page_blob: bool,
    ) -> ElastoResult<Self> {
        validate_flags(open_flags)?;
        if open_flags & flags::DIRECTORY != 0 {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "DIRECTORY flag is not valid when opening a blob"));
        }

        let exists = match conn.txrx(azure_blob::head_blob(account, container, blob)).await {
            Ok(_) => true,
            Err(e) if e.kind() == ElastoErrorKind::NotFound => false,
            Err(e) => return Err(e),
        };

        if exists && open_flags & flags::CREATE != 0 && open_flags & flags::EXCL != 0 {
            return Err(elasto_error!(ElastoErrorKind::Exists, "{account}/{container}/{blob} already exists"));
        }
        if !exists {
            if open_flags & flags::CREATE == 0 {
                return Err(elasto_error!(ElastoErrorKind::NotFound, "{account}/{container}/{blob} does not exist"));
            }
            let _ = tokens.create_at_location();
            let op = if is_page_blob {
                azure_blob::put_blob_page(account, container, blob, 0)?
            } else {
                azure_blob::put_blob_block(account, container, blob, Vec::new())
            };
            conn.txrx(op).await?;
        }

        let lease_id = tokens.lease_id().map(str::to_owned);
        let lease = if lease_id.is_some() { LeaseState::Leased } else { LeaseState::None };
        Ok(Self {
            state: HandleState::Open,
            lease,
            lease_id,
            account: account.to_owned(),
            container: container.to_owned(),
            blob: blob.to_owned(),
            is_page_blob,
        })
    }

    fn require_open(&self) -> ElastoResult<()> {
        if self.state != HandleState::Open {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "handle is not open"));
        }
        Ok(())
    }

    pub async fn read(&self, conn: &mut Connection, off: u64, len: u64) -> ElastoResult<Vec<u8>> {
        self.require_open()?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let op = azure_blob::get_blob(&self.account, &self.container, &self.blob, Some((off, off + len - 1)));
        let resp = conn.txrx(op).await?;
        Ok(resp.body)
    }

    /// Block blobs only support a whole-blob write at offset 0, which may
    /// go through the multipart uploader if the write is large enough
    /// (spec.md §4.6); page blobs write directly into an already-truncated
    /// range.
    pub async fn write(&self, conn: &mut Connection, off: u64, buf: Vec<u8>, config: &ElastoConfig) -> ElastoResult<()> {
        self.require_open()?;
        if self.is_page_blob {
            let op = azure_blob::put_page(&self.account, &self.container, &self.blob, off, buf)?;
            conn.txrx(op).await?;
            Ok(())
        } else {
            if off != 0 {
                return Err(elasto_error!(ElastoErrorKind::NotSupported, "block blobs only support whole-blob writes at offset 0"));
            }
            let stream = DataStream::from_buf(buf);
            azure_blob::multipart::upload(conn, &self.account, &self.container, &self.blob, &stream, config).await
        }
    }

    pub async fn truncate(&self, conn: &mut Connection, new_len: u64) -> ElastoResult<()> {
        self.require_open()?;
        if !self.is_page_blob {
            return Err(elasto_error!(ElastoErrorKind::NotSupported, "truncate is only supported on page blobs"));
        }
        let op = azure_blob::set_blob_props_length(&self.account, &self.container, &self.blob, new_len)?;
        conn.txrx(op).await?;
        Ok(())
    }

    pub async fn stat(&self, conn: &mut Connection) -> ElastoResult<Stat> {
        self.require_open()?;
        let resp = conn.txrx(azure_blob::head_blob(&self.account, &self.container, &self.blob)).await?;
        let props = azure_blob::process_blob_props(&resp)?;
        Ok(Stat {
            valid: stat_mask::TYPE | stat_mask::SIZE | stat_mask::BSIZE | stat_mask::LEASE,
            ent_type: Some(EntType::File),
            size: props.content_length,
            blksize: if self.is_page_blob { 512 } else { 4096 },
            lease_state: Some(self.lease),
            content_type: None,
        })
    }

    pub async fn lease_acquire(&mut self, conn: &mut Connection, duration_secs: Option<i32>) -> ElastoResult<()> {
        self.lease = self.lease.begin_acquire()?;
        let op = azure_blob::blob_lease(
            &self.account,
            &self.container,
            &self.blob,
            LeaseAction::Acquire,
            None,
            Some(duration_secs.unwrap_or(-1)),
        );
        let resp = conn.txrx(op).await?;
        self.lease_id = azure_blob::process_lease_id(&resp);
        self.lease = self.lease.acquired()?;
        Ok(())
    }

    pub async fn lease_release(&mut self, conn: &mut Connection) -> ElastoResult<()> {
        self.lease = self.lease.begin_release()?;
        let op =
            azure_blob::blob_lease(&self.account, &self.container, &self.blob, LeaseAction::Release, self.lease_id.as_deref(), None);
        conn.txrx(op).await?;
        self.lease = self.lease.released()?;
        self.lease_id = None;
        Ok(())
    }

    pub async fn lease_break(&mut self, conn: &mut Connection) -> ElastoResult<()> {
        let op = azure_blob::blob_lease(&self.account, &self.container, &self.blob, LeaseAction::Break, self.lease_id.as_deref(), None);
        conn.txrx(op).await?;
        self.lease = self.lease.broken()?;
        Ok(())
    }

    pub async fn lease_renew(&mut self, conn: &mut Connection) -> ElastoResult<()> {
        let op = azure_blob::blob_lease(&self.account, &self.container, &self.blob, LeaseAction::Renew, self.lease_id.as_deref(), None);
        conn.txrx(op).await?;
        self.lease = self.lease.renewed()?;
        Ok(())
    }

    /// Closing attempts to release a held lease but never fails on account
    /// of that release failing (spec.md §4.8) — a lease broken by another
    /// handle is exactly this case.
    pub async fn close(mut self, conn: &mut Connection) -> ElastoResult<()> {
        if self.lease == LeaseState::Leased {
            let _ = self.lease_release(conn).await;
        }
        self.state = HandleState::Closed;
        Ok(())
    }

    #[must_use]
    pub fn state(&self) -> HandleState {
        self.state
    }

    #[must_use]
    pub fn lease_state(&self) -> LeaseState {
        self.lease
    }
}
