//! Block-blob multipart uploader (spec.md §4.6)
//!
//! Writes at or under `config.http_part_threshold` go straight through
//! [`azure_blob::put_blob_block`]. Larger writes are split into
//! `config.block_max_size`-sized parts, each uploaded with
//! [`azure_blob::put_block`], then committed in one
//! [`azure_blob::put_block_list`] call.

use crate::backend::azure_blob;
use crate::config::ElastoConfig;
use crate::conn::Connection;
use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult};
use crate::op::DataStream;

/// One part of a planned upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedBlock {
    pub id_b64: String,
    pub offset: u64,
    pub len: u64,
}

/// Splits `total_len` bytes into `config.block_max_size`-sized parts and
/// assigns each a sequential, fixed-width block id. Errors if the split
/// would need more than `block_max_count` blocks or push total pending
/// bytes past `blob_max_uncommitted_bytes` — both service-enforced limits.
pub fn plan(total_len: u64, config: &ElastoConfig) -> ElastoResult<Vec<PlannedBlock>> {
    if total_len > config.blob_max_uncommitted_bytes {
        return Err(elasto_error!(
            ElastoErrorKind::InvalidArgument,
            "upload of {total_len} bytes exceeds the {} byte uncommitted-block budget",
            config.blob_max_uncommitted_bytes
        ));
    }

    let block_size = config.block_max_size.max(1);
    let mut blocks = Vec::new();
    let mut offset = 0;
    let mut index = 0u32;
    while offset < total_len {
        let len = block_size.min(total_len - offset);
        blocks.push(PlannedBlock { id_b64: block_id(index), offset, len });
        offset += len;
        index += 1;
    }

    if blocks.len() as u32 > config.block_max_count {
        return Err(elasto_error!(
            ElastoErrorKind::InvalidArgument,
            "upload needs {} blocks, exceeding the {} block limit",
            blocks.len(),
            config.block_max_count
        ));
    }
    Ok(blocks)
}

/// A fixed-width decimal counter, base64-encoded. Block ids only need to be
/// distinct and equal length within one commit; the decimal encoding just
/// keeps `get_block_list` output sorted in upload order.
fn block_id(index: u32) -> String {
    base64_simd::STANDARD.encode_to_string(format!("block{index:06}"))
}

/// Uploads `body` to `account/container/blob`, choosing the single-request
/// or block-list path based on its length against `config`.
pub async fn upload(
    conn: &mut Connection,
    account: &str,
    container: &str,
    blob: &str,
    body: &DataStream,
    config: &ElastoConfig,
) -> ElastoResult<()> {
    let total_len = body.len();
    if total_len <= config.http_part_threshold {
        let buf = body.read_at(0, total_len as usize)?;
        let op = azure_blob::put_blob_block(account, container, blob, buf);
        conn.txrx(op).await?;
        return Ok(());
    }

    let blocks = plan(total_len, config)?;
    for block in &blocks {
        let part = body.read_at(block.offset, block.len as usize)?;
        let op = azure_blob::put_block(account, container, blob, &block.id_b64, part)?;
        conn.txrx(op).await?;
    }

    let ids: Vec<String> = blocks.iter().map(|b| b.id_b64.clone()).collect();
    let op = azure_blob::put_block_list(account, container, blob, &ids)?;
    conn.txrx(op).await?;
    Ok(())
}
