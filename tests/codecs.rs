use anyhow::Result;
use std::path::PathBuf;

use booklet::errors::{is_format, is_serialization};
use booklet::{Codec, CodecKind, Store, StoreOptions};

/// Utf8/Json codec'и валидируют полезную нагрузку.
#[test]
fn builtin_codecs_validate_payload() -> Result<()> {
    let path = unique_path("codec-utf8");
    let mut store = StoreOptions::new(8)
        .key_codec(CodecKind::Utf8)
        .value_codec(CodecKind::Json)
        .create(&path)?;

    store.set("ключ".as_bytes(), br#"{"n": 1}"#)?;
    store.commit()?;
    assert_eq!(store.get("ключ".as_bytes())?, br#"{"n": 1}"#);

    let err = store.set(&[0xFF, 0xFE], b"{}").unwrap_err();
    assert!(is_serialization(&err), "invalid utf-8 key: {err:#}");
    let err = store.set(b"k", b"{not-json").unwrap_err();
    assert!(is_serialization(&err), "invalid json value: {err:#}");

    // codec id хранится в заголовке и восстанавливается при open
    store.close()?;
    let store = Store::open(&path)?;
    assert_eq!(store.get("ключ".as_bytes())?, br#"{"n": 1}"#);
    Ok(())
}

/// Пользовательский codec: XOR-маска. create_with/open_with, а обычный
/// open на таком файле — FormatError (unexpected codec id).
#[test]
fn custom_codec_requires_open_with() -> Result<()> {
    struct XorCodec(u8);
    impl Codec for XorCodec {
        fn encode(&self, value: &[u8]) -> Result<Vec<u8>> {
            Ok(value.iter().map(|b| b ^ self.0).collect())
        }
        fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
            Ok(bytes.iter().map(|b| b ^ self.0).collect())
        }
    }

    let path = unique_path("codec-custom");
    {
        let mut store = StoreOptions::new(8).create_with(
            &path,
            Box::new(XorCodec(0x5A)),
            Box::new(XorCodec(0xA5)),
        )?;
        store.set(b"secret", b"payload")?;
        store.commit()?;
        assert_eq!(store.get(b"secret")?, b"payload");
        store.close()?;
    }

    // без codec'ов файл не открывается
    let err = Store::open(&path).unwrap_err();
    assert!(is_format(&err), "custom codec id must be Format: {err:#}");

    // с той же парой — открывается и читает
    let store = Store::open_with(
        &path,
        Box::new(XorCodec(0x5A)),
        Box::new(XorCodec(0xA5)),
    )?;
    assert_eq!(store.get(b"secret")?, b"payload");

    // итерация декодирует той же парой
    let items: Vec<(Vec<u8>, Vec<u8>)> = store.items().collect::<Result<_>>()?;
    assert_eq!(items, vec![(b"secret".to_vec(), b"payload".to_vec())]);
    Ok(())
}

fn unique_path(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("blt-{}-{}-{}.db", prefix, pid, t))
}
