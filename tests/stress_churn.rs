use anyhow::Result;
use oorandom::Rand64;
use std::collections::HashMap;
use std::path::PathBuf;

use booklet::errors::is_not_found;
use booklet::{Store, StoreOptions};

fn unique_path(prefix: &str) -> PathBuf {
    let pid = std::process::id();
    let t = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("blt-{}-{}-{}.db", prefix, pid, t))
}

/// Рандомизированный чёрн против эталонной HashMap-модели:
/// set/overwrite/delete вперемешку с commit/prune/reindex.
#[test]
fn stress_churn_against_model() -> Result<()> {
    let path = unique_path("stress-churn");
    let mut store = StoreOptions::new(4).create(&path)?;

    // Модель «истинного» состояния (после очередного commit)
    let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    // Детерминированный генератор
    let mut rng = Rand64::new(0xB00C_1E70_0D5E_ED01);

    let key_space = 300u64;
    let ladder = [31u32, 127, 521, 2053];
    let mut ladder_i = 0usize;

    for step in 0..4_000u64 {
        let r = rng.rand_u64() % 100;
        let key = format!("key-{:04}", rng.rand_u64() % key_space).into_bytes();

        match r {
            0..=54 => {
                // set / overwrite
                let vlen = (rng.rand_u64() % 96) as usize;
                let val = vec![(step & 0xFF) as u8; vlen];
                store.set(&key, &val)?;
                model.insert(key, val);
            }
            55..=74 => {
                // delete: успех ровно тогда, когда ключ есть в модели
                match model.remove(&key) {
                    Some(_) => store.delete(&key)?,
                    None => {
                        let err = store.delete(&key).unwrap_err();
                        assert!(is_not_found(&err), "step {}: {err:#}", step);
                    }
                }
            }
            75..=89 => store.commit()?,
            90..=95 => {
                let _ = store.prune()?;
            }
            _ => {
                store.reindex(ladder[ladder_i % ladder.len()])?;
                ladder_i += 1;
            }
        }
    }

    // Финальная сверка
    store.commit()?;
    let items: Vec<(Vec<u8>, Vec<u8>)> = store.items().collect::<Result<_>>()?;
    assert_eq!(items.len(), model.len(), "item count vs model");
    let got: HashMap<Vec<u8>, Vec<u8>> = items.into_iter().collect();
    assert_eq!(got, model, "items multiset vs model");

    for i in 0..key_space {
        let key = format!("key-{:04}", i).into_bytes();
        match model.get(&key) {
            Some(expected) => assert_eq!(&store.get(&key)?, expected),
            None => assert!(!store.contains(&key)?),
        }
    }

    // prune + reindex не меняют семантику
    let len_before = store.file_len();
    let reclaimed = store.prune()?;
    assert_eq!(store.file_len(), len_before - reclaimed);
    store.reindex(10_007)?;
    assert_eq!(store.n_keys(), model.len() as u64);
    for (k, v) in &model {
        assert_eq!(&store.get(k)?, v);
    }

    // и переживают reopen
    store.close()?;
    let store = Store::open(&path)?;
    for (k, v) in &model {
        assert_eq!(&store.get(k)?, v);
    }
    Ok(())
}
