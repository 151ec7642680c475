//! store/stats — serializable status snapshot (counters + region bounds).

use serde::Serialize;

use crate::header::ValueLayout;

use super::core::Store;

/// Point-in-time store status; `Serialize` for JSON status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub format: &'static str,
    pub n_buckets: u32,
    pub n_keys: u64,
    pub n_deletes: u32,
    pub data_pos: u64,
    pub file_len: u64,
    pub pending_writes: usize,
}

impl Store {
    pub fn stats(&self) -> Stats {
        Stats {
            format: match self.header.values {
                ValueLayout::Variable { .. } => "variable",
                ValueLayout::Fixed { .. } => "fixed",
            },
            n_buckets: self.header.n_buckets,
            n_keys: self.n_keys(),
            n_deletes: self.header.n_deletes,
            data_pos: self.data_pos,
            file_len: self.file.len(),
            pending_writes: self.wbuf.pending.len(),
        }
    }
}
