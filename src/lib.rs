//! booklet — embedded single-file persistent key-value store.
//!
//! A disk-backed hash table: bucketed on-disk index over 13-byte BLAKE2s key
//! fingerprints, deferred write buffering with explicit commit, in-place
//! compaction (prune) and live bucket-count growth (reindex). Single writer
//! per file, enforced by an exclusive advisory lock for the whole session.
//!
//! ```no_run
//! use booklet::{Store, StoreOptions};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut store = StoreOptions::new(10_007).create("data.blt".as_ref())?;
//! store.set(b"alpha", b"1")?;
//! store.commit()?;
//! assert_eq!(store.get(b"alpha")?, b"1");
//! store.close()?;
//! # Ok(())
//! # }
//! ```

// Базовые модули формата
pub mod consts;
pub mod errors;
pub mod hash;
pub mod layout;

// Примитивы поверх файла
pub mod block;
pub mod codec;
pub mod header;
pub mod index;
pub mod lock;
pub mod mapped;

// Высокоуровневый движок
pub mod store; // src/store/{mod,core,open,write,commit,scan,reindex,prune,stats}.rs

// Удобные реэкспорты
pub use codec::{Codec, CodecKind};
pub use consts::next_bucket_count;
pub use errors::StoreError;
pub use header::ValueLayout;
pub use store::{Items, Keys, Stats, Store, StoreOptions, Values};
