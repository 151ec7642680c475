use anyhow::Result;
use std::path::PathBuf;

use booklet::errors::is_not_found;
use booklet::{Store, StoreOptions};

/// Перезапись: после commit ровно одна живая запись на ключ,
/// старый блок становится мёртвым (n_deletes растёт).
#[test]
fn overwrite_keeps_single_live_entry() -> Result<()> {
    let path = unique_path("overwrite");
    let mut store = StoreOptions::new(16).create(&path)?;

    store.set(b"k", b"v1")?;
    store.commit()?;
    assert_eq!(store.get(b"k")?, b"v1");
    assert_eq!(store.n_keys(), 1);
    assert_eq!(store.n_deletes(), 0);

    store.set(b"k", b"v2")?;
    store.commit()?;
    assert_eq!(store.get(b"k")?, b"v2");
    assert_eq!(store.n_keys(), 1, "overwrite must not add index entries");
    assert_eq!(store.n_deletes(), 1, "v1 block must be tombstoned");

    // items видит только живую версию
    let items: Vec<(Vec<u8>, Vec<u8>)> = store.items().collect::<Result<_>>()?;
    assert_eq!(items, vec![(b"k".to_vec(), b"v2".to_vec())]);
    Ok(())
}

/// Дубликаты одного ключа в одном батче: побеждает последняя запись,
/// блоки остальных tombstone'ятся ещё при commit.
#[test]
fn duplicate_writes_in_one_batch_last_wins() -> Result<()> {
    let path = unique_path("dup-batch");
    let mut store = StoreOptions::new(16).create(&path)?;

    store.set(b"k", b"v1")?;
    store.set(b"k", b"v2")?;
    store.set(b"k", b"v3")?;
    store.commit()?;

    assert_eq!(store.get(b"k")?, b"v3");
    assert_eq!(store.n_keys(), 1);
    assert_eq!(store.n_deletes(), 2, "two superseded blocks");
    Ok(())
}

/// set без commit невидим даже собственным чтениям (контракт батчинга).
#[test]
fn uncommitted_writes_are_invisible() -> Result<()> {
    let path = unique_path("uncommitted");
    let mut store = StoreOptions::new(16).create(&path)?;

    store.set(b"k", b"v")?;
    assert!(!store.contains(b"k")?, "pending write must not be visible");
    assert!(is_not_found(&store.get(b"k").unwrap_err()));
    assert_eq!(store.items().count(), 0);

    store.commit()?;
    assert!(store.contains(b"k")?);
    Ok(())
}

/// delete отменяет pending-записи того же ключа: последующий commit
/// не воскрешает ключ.
#[test]
fn delete_cancels_pending_writes() -> Result<()> {
    let path = unique_path("del-pending");
    let mut store = StoreOptions::new(16).create(&path)?;

    store.set(b"k", b"v")?;
    store.delete(b"k")?;
    store.commit()?;

    assert!(!store.contains(b"k")?);
    assert_eq!(store.n_keys(), 0);
    assert_eq!(store.items().count(), 0, "commit must not resurrect the key");
    Ok(())
}

#[test]
fn delete_missing_key_is_not_found() -> Result<()> {
    let path = unique_path("del-missing");
    let mut store = StoreOptions::new(16).create(&path)?;

    assert!(is_not_found(&store.delete(b"nope").unwrap_err()));

    // и после настоящего delete — повторный тоже NotFound
    store.set(b"k", b"v")?;
    store.commit()?;
    store.delete(b"k")?;
    assert!(is_not_found(&store.delete(b"k").unwrap_err()));
    Ok(())
}

/// delete + повторная вставка того же ключа: в спане остаётся stale
/// tombstone, но выигрывает живая запись.
#[test]
fn reinsert_after_delete_roundtrips() -> Result<()> {
    let path = unique_path("reinsert");
    let mut store = StoreOptions::new(4).create(&path)?;

    store.set(b"k", b"v1")?;
    store.commit()?;
    store.delete(b"k")?;
    store.commit()?;
    assert!(!store.contains(b"k")?);

    store.set(b"k", b"v2")?;
    store.commit()?;
    assert_eq!(store.get(b"k")?, b"v2");
    assert_eq!(store.n_keys(), 1);

    // reopen — stale tombstone в спане не мешает и после переоткрытия
    store.close()?;
    let store = Store::open(&path)?;
    assert_eq!(store.get(b"k")?, b"v2");
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
