//! Store header (de)serialization — both format variants.
//!
//! The header is the first 200 bytes of the store file (little-endian),
//! zero-padded after the last field; see consts.rs for the exact offsets.
//! `data_pos` is deliberately NOT part of the header: it is recovered from
//! the last bucket-table slot at open (the table invariant
//! `offset[n_buckets] == data_pos` makes the copy redundant).

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::codec::CodecKind;
use crate::consts::{
    FORMAT_VERSION, HEADER_SIZE, MAGIC_FIXED, MAGIC_VARIABLE, MAX_N_BYTES_FILE, MAX_N_BYTES_KEY,
    MIN_N_BYTES_FILE, MIN_N_BYTES_KEY, N_BYTES_INDEX, OFF_KEY_CODEC, OFF_MAGIC, OFF_N_BUCKETS,
    OFF_N_BYTES_FILE, OFF_N_BYTES_INDEX, OFF_N_BYTES_KEY, OFF_N_DELETES_FIXED,
    OFF_N_DELETES_VARIABLE, OFF_VALUE_CODEC, OFF_VALUE_FIELD, OFF_VERSION,
};
use crate::errors::StoreError;
use crate::layout::index_entry_size;

/// Value layout: variable-length values carry a per-block length field of
/// `n_bytes_value` bytes; fixed-length values share one `value_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueLayout {
    Variable { n_bytes_value: u8 },
    Fixed { value_len: u32 },
}

#[derive(Debug, Clone)]
pub struct StoreHeader {
    pub version: u16,
    pub n_buckets: u32,
    pub n_bytes_file: u8,
    pub n_bytes_key: u8,
    pub key_codec: CodecKind,
    pub value_codec: CodecKind,
    pub values: ValueLayout,
    pub n_deletes: u32,
}

impl StoreHeader {
    #[inline]
    pub fn is_fixed(&self) -> bool {
        matches!(self.values, ValueLayout::Fixed { .. })
    }

    /// Entry size of the data-index region for this header.
    #[inline]
    pub fn entry_size(&self) -> u64 {
        index_entry_size(self.n_bytes_file)
    }

    /// Variant-specific offset of the n_deletes counter.
    #[inline]
    pub fn n_deletes_offset(&self) -> usize {
        match self.values {
            ValueLayout::Variable { .. } => OFF_N_DELETES_VARIABLE,
            ValueLayout::Fixed { .. } => OFF_N_DELETES_FIXED,
        }
    }

    /// Check configured field widths (create-time and open-time).
    pub fn validate_widths(n_bytes_file: u8, n_bytes_key: u8) -> Result<()> {
        if !(MIN_N_BYTES_FILE..=MAX_N_BYTES_FILE).contains(&n_bytes_file) {
            return Err(StoreError::Format(format!(
                "n_bytes_file must be in [{}..={}], got {}",
                MIN_N_BYTES_FILE, MAX_N_BYTES_FILE, n_bytes_file
            ))
            .into());
        }
        if !(MIN_N_BYTES_KEY..=MAX_N_BYTES_KEY).contains(&n_bytes_key) {
            return Err(StoreError::Format(format!(
                "n_bytes_key must be in [{}..={}], got {}",
                MIN_N_BYTES_KEY, MAX_N_BYTES_KEY, n_bytes_key
            ))
            .into());
        }
        Ok(())
    }

    /// Serialize into the 200-byte header region (zero-padding included).
    pub fn write_to(&self, buf: &mut [u8]) -> Result<()> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(StoreError::Format(format!(
                "header buffer too small: {} < {}",
                buf.len(),
                HEADER_SIZE
            ))
            .into());
        }
        Self::validate_widths(self.n_bytes_file, self.n_bytes_key)?;

        let hdr = &mut buf[..HEADER_SIZE as usize];
        hdr.fill(0);

        let magic = match self.values {
            ValueLayout::Variable { .. } => MAGIC_VARIABLE,
            ValueLayout::Fixed { .. } => MAGIC_FIXED,
        };
        hdr[OFF_MAGIC..OFF_MAGIC + 16].copy_from_slice(magic);
        LittleEndian::write_u16(&mut hdr[OFF_VERSION..OFF_VERSION + 2], self.version);
        LittleEndian::write_u32(&mut hdr[OFF_N_BUCKETS..OFF_N_BUCKETS + 4], self.n_buckets);
        LittleEndian::write_u32(
            &mut hdr[OFF_N_BYTES_INDEX..OFF_N_BYTES_INDEX + 4],
            N_BYTES_INDEX,
        );
        hdr[OFF_N_BYTES_FILE] = self.n_bytes_file;
        hdr[OFF_N_BYTES_KEY] = self.n_bytes_key;
        LittleEndian::write_u16(
            &mut hdr[OFF_KEY_CODEC..OFF_KEY_CODEC + 2],
            self.key_codec.to_u16(),
        );
        LittleEndian::write_u16(
            &mut hdr[OFF_VALUE_CODEC..OFF_VALUE_CODEC + 2],
            self.value_codec.to_u16(),
        );
        match self.values {
            ValueLayout::Variable { n_bytes_value } => {
                hdr[OFF_VALUE_FIELD] = n_bytes_value;
            }
            ValueLayout::Fixed { value_len } => {
                LittleEndian::write_u32(&mut hdr[OFF_VALUE_FIELD..OFF_VALUE_FIELD + 4], value_len);
            }
        }
        let ndo = self.n_deletes_offset();
        LittleEndian::write_u32(&mut hdr[ndo..ndo + 4], self.n_deletes);
        Ok(())
    }

    /// Parse and validate the 200-byte header region.
    pub fn read_from(buf: &[u8]) -> Result<StoreHeader> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(StoreError::Format(format!(
                "truncated header: {} bytes, need {}",
                buf.len(),
                HEADER_SIZE
            ))
            .into());
        }
        let magic = &buf[OFF_MAGIC..OFF_MAGIC + 16];
        let fixed = if magic == MAGIC_VARIABLE {
            false
        } else if magic == MAGIC_FIXED {
            true
        } else {
            return Err(StoreError::Format("bad magic tag".to_string()).into());
        };

        let version = LittleEndian::read_u16(&buf[OFF_VERSION..OFF_VERSION + 2]);
        if version != FORMAT_VERSION {
            return Err(StoreError::Format(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            ))
            .into());
        }

        let n_buckets = LittleEndian::read_u32(&buf[OFF_N_BUCKETS..OFF_N_BUCKETS + 4]);
        if n_buckets == 0 {
            return Err(StoreError::Format("n_buckets must be > 0".to_string()).into());
        }
        let n_bytes_index = LittleEndian::read_u32(&buf[OFF_N_BYTES_INDEX..OFF_N_BYTES_INDEX + 4]);
        if n_bytes_index != N_BYTES_INDEX {
            return Err(StoreError::Format(format!(
                "n_bytes_index must be {}, got {}",
                N_BYTES_INDEX, n_bytes_index
            ))
            .into());
        }
        let n_bytes_file = buf[OFF_N_BYTES_FILE];
        let n_bytes_key = buf[OFF_N_BYTES_KEY];
        Self::validate_widths(n_bytes_file, n_bytes_key)?;

        let key_codec_id = LittleEndian::read_u16(&buf[OFF_KEY_CODEC..OFF_KEY_CODEC + 2]);
        let key_codec = CodecKind::from_u16(key_codec_id).ok_or_else(|| {
            StoreError::Format(format!("unexpected key codec id {}", key_codec_id))
        })?;
        let value_codec_id = LittleEndian::read_u16(&buf[OFF_VALUE_CODEC..OFF_VALUE_CODEC + 2]);
        let value_codec = CodecKind::from_u16(value_codec_id).ok_or_else(|| {
            StoreError::Format(format!("unexpected value codec id {}", value_codec_id))
        })?;

        let values = if fixed {
            ValueLayout::Fixed {
                value_len: LittleEndian::read_u32(&buf[OFF_VALUE_FIELD..OFF_VALUE_FIELD + 4]),
            }
        } else {
            ValueLayout::Variable {
                n_bytes_value: buf[OFF_VALUE_FIELD],
            }
        };
        let ndo = if fixed {
            OFF_N_DELETES_FIXED
        } else {
            OFF_N_DELETES_VARIABLE
        };
        let n_deletes = LittleEndian::read_u32(&buf[ndo..ndo + 4]);

        Ok(StoreHeader {
            version,
            n_buckets,
            n_bytes_file,
            n_bytes_key,
            key_codec,
            value_codec,
            values,
            n_deletes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_variable() {
        let h0 = StoreHeader {
            version: FORMAT_VERSION,
            n_buckets: 10_007,
            n_bytes_file: 4,
            n_bytes_key: 2,
            key_codec: CodecKind::Bytes,
            value_codec: CodecKind::Json,
            values: ValueLayout::Variable { n_bytes_value: 4 },
            n_deletes: 17,
        };
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        h0.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..16], MAGIC_VARIABLE);

        let h1 = StoreHeader::read_from(&buf).unwrap();
        assert_eq!(h1.n_buckets, 10_007);
        assert_eq!(h1.n_bytes_file, 4);
        assert_eq!(h1.n_bytes_key, 2);
        assert_eq!(h1.key_codec, CodecKind::Bytes);
        assert_eq!(h1.value_codec, CodecKind::Json);
        assert_eq!(h1.values, ValueLayout::Variable { n_bytes_value: 4 });
        assert_eq!(h1.n_deletes, 17);
        assert_eq!(h1.n_deletes_offset(), OFF_N_DELETES_VARIABLE);
    }

    #[test]
    fn header_roundtrip_fixed() {
        let h0 = StoreHeader {
            version: FORMAT_VERSION,
            n_buckets: 128,
            n_bytes_file: 6,
            n_bytes_key: 1,
            key_codec: CodecKind::Utf8,
            value_codec: CodecKind::Bytes,
            values: ValueLayout::Fixed { value_len: 32 },
            n_deletes: 0,
        };
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        h0.write_to(&mut buf).unwrap();
        assert_eq!(&buf[..16], MAGIC_FIXED);

        let h1 = StoreHeader::read_from(&buf).unwrap();
        assert_eq!(h1.values, ValueLayout::Fixed { value_len: 32 });
        assert_eq!(h1.n_deletes_offset(), OFF_N_DELETES_FIXED);
    }

    #[test]
    fn read_rejects_bad_magic_and_version() {
        let h = StoreHeader {
            version: FORMAT_VERSION,
            n_buckets: 4,
            n_bytes_file: 4,
            n_bytes_key: 2,
            key_codec: CodecKind::Bytes,
            value_codec: CodecKind::Bytes,
            values: ValueLayout::Variable { n_bytes_value: 4 },
            n_deletes: 0,
        };
        let mut buf = vec![0u8; HEADER_SIZE as usize];
        h.write_to(&mut buf).unwrap();

        let mut bad_magic = buf.clone();
        bad_magic[0] ^= 0xFF;
        assert!(StoreHeader::read_from(&bad_magic).is_err());

        let mut bad_version = buf.clone();
        LittleEndian::write_u16(&mut bad_version[OFF_VERSION..OFF_VERSION + 2], 99);
        assert!(StoreHeader::read_from(&bad_version).is_err());

        assert!(StoreHeader::read_from(&buf[..100]).is_err());
    }
}
