//! Data-block records.
//!
//! Variable format: [alive u8][key_len][value_len][key][value]
//! Fixed format:    [alive u8][key_len][key][value(value_len)]
//! Length fields are n_bytes_key / n_bytes_value bytes wide, little-endian.
//! A block is appended alive (1) and flipped dead (0) when superseded,
//! deleted, or tombstoned in-batch; dead blocks are reclaimed by prune.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::errors::StoreError;
use crate::header::{StoreHeader, ValueLayout};

pub const ALIVE: u8 = 1;
pub const DEAD: u8 = 0;

/// Largest value representable in a little-endian field `width` bytes wide.
#[inline]
fn max_for_width(width: u8) -> u64 {
    if width >= 8 {
        u64::MAX
    } else {
        (1u64 << (8 * width as u32)) - 1
    }
}

/// Parsed view of one block; offsets are absolute within the file image.
#[derive(Debug, Clone, Copy)]
pub struct BlockRef {
    pub off: usize,
    pub alive: bool,
    pub key_off: usize,
    pub key_len: usize,
    pub value_off: usize,
    pub value_len: usize,
    pub total_len: usize,
}

impl BlockRef {
    #[inline]
    pub fn end(&self) -> usize {
        self.off + self.total_len
    }
}

/// Build an alive block record for already-encoded key/value bytes.
pub fn encode_block(hdr: &StoreHeader, key: &[u8], value: &[u8]) -> Result<Vec<u8>> {
    if key.len() as u64 > max_for_width(hdr.n_bytes_key) {
        return Err(StoreError::Capacity(format!(
            "key length {} exceeds {}-byte length field",
            key.len(),
            hdr.n_bytes_key
        ))
        .into());
    }

    let nbk = hdr.n_bytes_key as usize;
    let mut out = match hdr.values {
        ValueLayout::Variable { n_bytes_value } => {
            if value.len() as u64 > max_for_width(n_bytes_value) {
                return Err(StoreError::Capacity(format!(
                    "value length {} exceeds {}-byte length field",
                    value.len(),
                    n_bytes_value
                ))
                .into());
            }
            let nbv = n_bytes_value as usize;
            let mut out = Vec::with_capacity(1 + nbk + nbv + key.len() + value.len());
            out.push(ALIVE);
            let mut len_field = [0u8; 8];
            LittleEndian::write_uint(&mut len_field[..nbk], key.len() as u64, nbk);
            out.extend_from_slice(&len_field[..nbk]);
            LittleEndian::write_uint(&mut len_field[..nbv], value.len() as u64, nbv);
            out.extend_from_slice(&len_field[..nbv]);
            out
        }
        ValueLayout::Fixed { value_len } => {
            if value.len() != value_len as usize {
                return Err(StoreError::Serialization(format!(
                    "fixed-format value must be exactly {} bytes, got {}",
                    value_len,
                    value.len()
                ))
                .into());
            }
            let mut out = Vec::with_capacity(1 + nbk + key.len() + value.len());
            out.push(ALIVE);
            let mut len_field = [0u8; 8];
            LittleEndian::write_uint(&mut len_field[..nbk], key.len() as u64, nbk);
            out.extend_from_slice(&len_field[..nbk]);
            out
        }
    };
    out.extend_from_slice(key);
    out.extend_from_slice(value);
    Ok(out)
}

/// Parse the block starting at `off` in the file image.
/// Length fields are read; payloads are not touched (dead blocks are skipped
/// by arithmetic alone).
pub fn read_block_at(image: &[u8], off: usize, hdr: &StoreHeader) -> Result<BlockRef> {
    let nbk = hdr.n_bytes_key as usize;

    let need_hdr = match hdr.values {
        ValueLayout::Variable { n_bytes_value } => 1 + nbk + n_bytes_value as usize,
        ValueLayout::Fixed { .. } => 1 + nbk,
    };
    if off + need_hdr > image.len() {
        return Err(StoreError::Format(format!(
            "truncated data block at offset {}",
            off
        ))
        .into());
    }

    let alive = image[off] == ALIVE;
    let key_len = LittleEndian::read_uint(&image[off + 1..off + 1 + nbk], nbk) as usize;

    let (value_len, key_off) = match hdr.values {
        ValueLayout::Variable { n_bytes_value } => {
            let nbv = n_bytes_value as usize;
            let vl = LittleEndian::read_uint(&image[off + 1 + nbk..off + 1 + nbk + nbv], nbv);
            (vl as usize, off + 1 + nbk + nbv)
        }
        ValueLayout::Fixed { value_len } => (value_len as usize, off + 1 + nbk),
    };

    let value_off = key_off + key_len;
    let end = value_off + value_len;
    if end > image.len() {
        return Err(StoreError::Format(format!(
            "data block at offset {} runs past EOF ({} > {})",
            off,
            end,
            image.len()
        ))
        .into());
    }

    Ok(BlockRef {
        off,
        alive,
        key_off,
        key_len,
        value_off,
        value_len,
        total_len: end - off,
    })
}
