use anyhow::Result;
use std::path::PathBuf;

use booklet::errors::is_not_found;
use booklet::{Store, StoreOptions};

#[test]
fn smoke_create_set_get_del_prune() -> Result<()> {
    let path = unique_path("smoke");

    // 1) create: 4 бакета, всё по умолчанию
    let mut store = StoreOptions::new(4).create(&path)?;

    // 2) set + commit
    store.set(b"a", b"1")?;
    store.set(b"b", b"2")?;
    store.commit()?;

    assert_eq!(store.get(b"a")?, b"1");
    assert_eq!(store.get(b"b")?, b"2");
    assert!(!store.contains(b"c")?);
    let err = store.get(b"c").unwrap_err();
    assert!(is_not_found(&err), "missing key must be NotFound");

    // 3) delete + commit
    store.delete(b"a")?;
    store.commit()?;
    assert!(!store.contains(b"a")?);
    assert!(is_not_found(&store.get(b"a").unwrap_err()));

    let items: Vec<(Vec<u8>, Vec<u8>)> = store.items().collect::<Result<_>>()?;
    assert_eq!(items, vec![(b"b".to_vec(), b"2".to_vec())]);

    // 4) prune возвращает байты бывшего блока "a", семантика не меняется
    let reclaimed = store.prune()?;
    assert!(reclaimed > 0, "prune must reclaim the dead block of \"a\"");
    assert_eq!(store.n_deletes(), 0);

    let items: Vec<(Vec<u8>, Vec<u8>)> = store.items().collect::<Result<_>>()?;
    assert_eq!(items, vec![(b"b".to_vec(), b"2".to_vec())]);
    assert_eq!(store.get(b"b")?, b"2");

    store.close()?;

    // 5) reopen: состояние на месте
    let store = Store::open(&path)?;
    assert_eq!(store.get(b"b")?, b"2");
    assert!(!store.contains(b"a")?);
    assert_eq!(store.n_buckets(), 4);

    Ok(())
}

#[test]
fn smoke_stats_snapshot() -> Result<()> {
    let path = unique_path("smoke-stats");
    let mut store = StoreOptions::new(8).create(&path)?;
    store.set(b"k1", b"v1")?;
    store.set(b"k2", b"v2")?;

    // pending ещё не в индексе
    let st = store.stats();
    assert_eq!(st.n_keys, 0);
    assert_eq!(st.pending_writes, 2);
    assert_eq!(st.format, "variable");

    store.commit()?;
    let st = store.stats();
    assert_eq!(st.n_keys, 2);
    assert_eq!(st.pending_writes, 0);
    assert_eq!(st.n_buckets, 8);
    assert!(st.file_len >= st.data_pos);

    // сериализуемость статуса
    let json = serde_json::to_string(&st)?;
    assert!(json.contains("\"n_keys\":2"));
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
