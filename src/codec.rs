//! Pluggable key/value codecs.
//!
//! A codec is a byte-to-byte capability pair {encode, decode} resolved once at
//! store-open time, never per operation. Built-in codecs are identified by a
//! small closed enumeration stored in the header; a user-supplied codec uses
//! the reserved `Custom` id and must be passed to `Store::open_with` again on
//! every open.

use anyhow::Result;
use std::fmt;

use crate::errors::StoreError;

/// Type of codec used for keys or values.
/// Stored as u16 in the header for forward/backward compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecKind {
    /// Identity: bytes pass through untouched.
    Bytes = 0,
    /// UTF-8 strings: decode validates the payload.
    Utf8 = 1,
    /// JSON documents (serde_json): both directions validate.
    Json = 2,
    /// User-supplied implementation; not resolvable from the header alone.
    Custom = 255,
}

impl CodecKind {
    /// Compact u16 code for on-disk storage.
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Parse from the on-disk u16 code. Unknown codes return None.
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0 => Some(CodecKind::Bytes),
            1 => Some(CodecKind::Utf8),
            2 => Some(CodecKind::Json),
            255 => Some(CodecKind::Custom),
            _ => None,
        }
    }
}

impl fmt::Display for CodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecKind::Bytes => write!(f, "bytes"),
            CodecKind::Utf8 => write!(f, "utf8"),
            CodecKind::Json => write!(f, "json"),
            CodecKind::Custom => write!(f, "custom"),
        }
    }
}

/// Capability interface: encode(value) -> bytes / decode(bytes) -> value.
///
/// Implementations must be pure per call; failures must surface as
/// `StoreError::Serialization` so callers can match the kind.
pub trait Codec: Send + Sync {
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>>;
}

// -------- built-in codecs --------

/// Identity codec.
pub struct BytesCodec;

impl Codec for BytesCodec {
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
        Ok(value.to_vec())
    }
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

/// UTF-8 codec: both directions reject invalid byte sequences.
pub struct Utf8Codec;

impl Utf8Codec {
    fn check(bytes: &[u8]) -> Result<()> {
        std::str::from_utf8(bytes)
            .map_err(|e| StoreError::Serialization(format!("invalid utf-8: {e}")))?;
        Ok(())
    }
}

impl Codec for Utf8Codec {
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
        Self::check(value)?;
        Ok(value.to_vec())
    }
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Self::check(bytes)?;
        Ok(bytes.to_vec())
    }
}

/// JSON codec: payload must parse as a JSON document.
pub struct JsonCodec;

impl JsonCodec {
    fn check(bytes: &[u8]) -> Result<()> {
        serde_json::from_slice::<serde_json::Value>(bytes)
            .map_err(|e| StoreError::Serialization(format!("invalid json: {e}")))?;
        Ok(())
    }
}

impl Codec for JsonCodec {
    fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
        Self::check(value)?;
        Ok(value.to_vec())
    }
    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Self::check(bytes)?;
        Ok(bytes.to_vec())
    }
}

/// Resolve a built-in codec by kind. `Custom` has no built-in resolution.
pub fn resolve_builtin(kind: CodecKind) -> Option<Box<dyn Codec>> {
    match kind {
        CodecKind::Bytes => Some(Box::new(BytesCodec)),
        CodecKind::Utf8 => Some(Box::new(Utf8Codec)),
        CodecKind::Json => Some(Box::new(JsonCodec)),
        CodecKind::Custom => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::is_serialization;

    #[test]
    fn kind_roundtrip() {
        for k in [
            CodecKind::Bytes,
            CodecKind::Utf8,
            CodecKind::Json,
            CodecKind::Custom,
        ] {
            assert_eq!(CodecKind::from_u16(k.to_u16()), Some(k));
        }
        assert_eq!(CodecKind::from_u16(7), None);
    }

    #[test]
    fn utf8_codec_rejects_invalid() {
        let c = Utf8Codec;
        assert_eq!(c.encode("abc".as_bytes()).unwrap(), b"abc");
        let err = c.encode(&[0xFF, 0xFE]).unwrap_err();
        assert!(is_serialization(&err));
    }

    #[test]
    fn json_codec_checks_both_directions() {
        let c = JsonCodec;
        assert!(c.encode(br#"{"a": 1}"#).is_ok());
        assert!(c.decode(b"[1, 2, 3]").is_ok());
        let err = c.decode(b"{not json").unwrap_err();
        assert!(is_serialization(&err));
    }
}
