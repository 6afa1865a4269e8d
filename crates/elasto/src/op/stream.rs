//! Request/response data streams
//!
//! A [`DataStream`] is the sum type from spec.md §3: an in-memory buffer, an
//! open file descriptor region, or a pair of caller callbacks. All three let
//! the connection (`crate::conn`) move bytes without knowing which backing
//! store they come from.

use std::fmt;
use std::sync::Arc;

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};

/// Producer callback: given a stream offset and a requested length, returns
/// up to that many bytes starting at that offset.
///
/// `stream_off` is guaranteed non-decreasing across calls on one stream
/// (spec.md §3's monotonicity invariant); a violation is a programming
/// error in the caller, not a runtime condition the transport detects.
pub type OutCb = Arc<dyn Fn(u64, usize) -> ElastoResult<Vec<u8>> + Send + Sync>;

/// Consumer callback: delivers `buf` (the bytes received at `stream_off`,
/// `got` of them) to the caller.
pub type InCb = Arc<dyn Fn(u64, usize, &[u8]) -> ElastoResult<()> + Send + Sync>;

#[derive(Clone)]
pub enum DataStream {
    None,
    Iov { buf: Arc<Vec<u8>>, len: u64, off: u64 },
    File { path: Arc<std::path::PathBuf>, len: u64, off: u64 },
    Cb { len: u64, out_cb: Option<OutCb>, in_cb: Option<InCb> },
}

impl fmt::Debug for DataStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "DataStream::None"),
            Self::Iov { len, off, .. } => write!(f, "DataStream::Iov {{ len: {len}, off: {off} }}"),
            Self::File { path, len, off } => {
                write!(f, "DataStream::File {{ path: {path:?}, len: {len}, off: {off} }}")
            }
            Self::Cb { len, .. } => write!(f, "DataStream::Cb {{ len: {len} }}"),
        }
    }
}

impl DataStream {
    #[must_use]
    pub fn from_buf(buf: Vec<u8>) -> Self {
        let len = buf.len() as u64;
        Self::Iov { buf: Arc::new(buf), len, off: 0 }
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        match self {
            Self::None => 0,
            Self::Iov { len, .. } | Self::File { len, .. } | Self::Cb { len, .. } => *len,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validates the `off <= len` invariant (spec.md §3).
    pub fn validate(&self) -> ElastoResult<()> {
        let (off, len) = match self {
            Self::None | Self::Cb { .. } => return Ok(()),
            Self::Iov { off, len, .. } | Self::File { off, len, .. } => (*off, *len),
        };
        if off > len {
            return Err(elasto_error!(
                ElastoErrorKind::InvalidArgument,
                "data stream offset {off} exceeds length {len}"
            ));
        }
        Ok(())
    }

    /// Reads up to `want` bytes starting at `stream_off` from an in-memory
    /// or callback-backed source. `File` variants are read by the transport
    /// via async file I/O and are not supported here.
    pub fn read_at(&self, stream_off: u64, want: usize) -> ElastoResult<Vec<u8>> {
        match self {
            Self::None => Ok(Vec::new()),
            Self::Iov { buf, off, len } => {
                let start = (*off + stream_off) as usize;
                let end_abs = (*off + *len) as usize;
                let end = (start + want).min(end_abs).min(buf.len());
                if start >= end {
                    return Ok(Vec::new());
                }
                Ok(buf[start..end].to_vec())
            }
            Self::File { .. } => Err(elasto_error!(
                ElastoErrorKind::NotSupported,
                "File data streams are read by the transport, not DataStream::read_at"
            )),
            Self::Cb { out_cb: Some(cb), .. } => cb(stream_off, want),
            Self::Cb { out_cb: None, .. } => {
                Err(elasto_error!(ElastoErrorKind::InvalidArgument, "stream has no producer callback"))
            }
        }
    }

    /// Delivers `buf` (received at `stream_off`) to an in-memory sink or
    /// consumer callback.
    pub fn write_at(&mut self, stream_off: u64, buf: &[u8]) -> ElastoResult<()> {
        match self {
            Self::None => Ok(()),
            Self::Iov { buf: dst, off, .. } => {
                let dst = Arc::get_mut(dst).ok_or_else(|| {
                    elasto_error!(ElastoErrorKind::InvalidArgument, "iov sink is shared, cannot write")
                })?;
                let start = (*off + stream_off) as usize;
                let end = start + buf.len();
                if end > dst.len() {
                    dst.resize(end, 0);
                }
                dst[start..end].copy_from_slice(buf);
                Ok(())
            }
            Self::File { .. } => Err(elasto_error!(
                ElastoErrorKind::NotSupported,
                "File data streams are written by the transport, not DataStream::write_at"
            )),
            Self::Cb { in_cb: Some(cb), .. } => cb(stream_off, buf.len(), buf),
            Self::Cb { in_cb: None, .. } => {
                Err(elasto_error!(ElastoErrorKind::InvalidArgument, "stream has no consumer callback"))
            }
        }
    }

    /// Returns a sub-window `[start, start+len)` of this stream without
    /// copying the backing buffer — used by the multipart uploader
    /// (`crate::backend::azure_blob::multipart`) to hand each part a
    /// byte-range view of the caller's write.
    #[must_use]
    pub fn sub_range(&self, start: u64, len: u64) -> Self {
        match self {
            Self::None => Self::None,
            Self::Iov { buf, off, .. } => Self::Iov { buf: Arc::clone(buf), off: off + start, len },
            Self::File { path, off, .. } => Self::File { path: Arc::clone(path), off: off + start, len },
            Self::Cb { out_cb, in_cb, .. } => {
                let out_cb = out_cb.clone();
                let in_cb = in_cb.clone();
                let base = start;
                let out_cb = out_cb.map(|cb| -> OutCb { Arc::new(move |o, n| cb(o + base, n)) });
                let in_cb = in_cb.map(|cb| -> InCb { Arc::new(move |o, got, buf| cb(o + base, got, buf)) });
                Self::Cb { len, out_cb, in_cb }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iov_round_trip() {
        let mut s = DataStream::Iov { buf: Arc::new(vec![0u8; 16]), len: 16, off: 0 };
        s.write_at(4, &[1, 2, 3]).unwrap();
        assert_eq!(s.read_at(4, 3).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn validate_rejects_off_past_len() {
        let s = DataStream::Iov { buf: Arc::new(vec![]), len: 4, off: 5 };
        assert!(s.validate().is_err());
    }

    #[test]
    fn sub_range_offsets_reads() {
        let buf = Arc::new((0u8..16).collect::<Vec<_>>());
        let s = DataStream::Iov { buf, len: 16, off: 0 };
        let sub = s.sub_range(4, 4);
        assert_eq!(sub.read_at(0, 4).unwrap(), vec![4, 5, 6, 7]);
    }
}
