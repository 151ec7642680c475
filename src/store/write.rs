//! store/write — WriteBuffer и операции set/delete.
//!
//! set() только стейджит: блок пишется в буфер (или сразу в файл, если не
//! помещается), пара (fingerprint, rel_pos) попадает в pending-список и до
//! commit() в персистентный индекс не устанавливается. Дубликаты одного
//! ключа в рамках сессии все остаются pending — разрешаются при commit.
//!
//! delete() действует сразу: tombstone записи в индексе (rel_pos = 0),
//! alive = 0 у блока, n_deletes += 1; pending-записи того же ключа
//! отменяются, их блоки помечаются мёртвыми там, где лежат (в буфере или в
//! уже слитом хвосте файла).

use anyhow::Result;

use crate::block::{encode_block, DEAD};
use crate::consts::FINGERPRINT_LEN;
use crate::errors::StoreError;
use crate::hash::{fingerprint, index_bucket, Fingerprint};
use crate::index;
use crate::layout::max_rel_pos;

use super::core::Store;

#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingEntry {
    pub fp: Fingerprint,
    pub rel_pos: u64,
}

/// In-memory staging для свежих блоков данных (ничего не знает о бакетах).
pub(crate) struct WriteBuffer {
    pub(crate) buf: Vec<u8>,
    pub(crate) cap: usize,
    pub(crate) pending: Vec<PendingEntry>,
}

impl WriteBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap.min(1 << 20)),
            cap,
            pending: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn remaining(&self) -> usize {
        self.cap.saturating_sub(self.buf.len())
    }

    pub(crate) fn reset(&mut self) {
        self.buf.clear();
        self.pending.clear();
    }
}

/// Ошибки пользовательских codec'ов приводим к Serialization,
/// сохраняя уже типизированные StoreError как есть.
pub(crate) fn as_serialization(err: anyhow::Error) -> anyhow::Error {
    if err
        .chain()
        .any(|c| c.downcast_ref::<StoreError>().is_some())
    {
        err
    } else {
        StoreError::Serialization(format!("{err:#}")).into()
    }
}

impl Store {
    /// Записать пару ключ/значение (staged до commit()).
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let key_bytes = self.key_codec.encode(key).map_err(as_serialization)?;
        let value_bytes = self.value_codec.encode(value).map_err(as_serialization)?;
        let record = encode_block(&self.header, &key_bytes, &value_bytes)?;

        // rel_pos считается от логического конца: файл + заполнение буфера
        let logical_end = self.file.len() + self.wbuf.buf.len() as u64;
        let rel = logical_end - self.data_pos + 1;
        if rel > max_rel_pos(self.header.n_bytes_file) {
            return Err(StoreError::Capacity(format!(
                "rel_pos {} exceeds {}-byte file-position field",
                rel, self.header.n_bytes_file
            ))
            .into());
        }

        if record.len() > self.wbuf.remaining() {
            self.flush_buffer()?;
        }
        if record.len() > self.wbuf.cap {
            // слишком крупный блок — мимо буфера, сразу в файл
            let old = self.file.grow(record.len() as u64)?;
            self.file.write_at(old, &record)?;
        } else {
            self.wbuf.buf.extend_from_slice(&record);
        }

        self.wbuf.pending.push(PendingEntry {
            fp: fingerprint(&key_bytes),
            rel_pos: rel,
        });
        Ok(())
    }

    /// Удалить ключ. NotFound, если его нет ни в pending, ни в индексе.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let key_bytes = self.key_codec.encode(key).map_err(as_serialization)?;
        let fp = fingerprint(&key_bytes);

        // 1) отменить pending-записи этого ключа
        let mut dead = 0u32;
        let staged: Vec<u64> = self
            .wbuf
            .pending
            .iter()
            .filter(|p| p.fp == fp)
            .map(|p| p.rel_pos)
            .collect();
        for rel in &staged {
            let abs = self.data_pos + rel - 1;
            self.mark_block_dead(abs)?;
            dead += 1;
        }
        self.wbuf.pending.retain(|p| p.fp != fp);

        // 2) tombstone живой записи в персистентном индексе
        let bucket = index_bucket(&fp, self.header.n_buckets);
        let found = {
            let image = self.file.as_slice();
            let span = index::bucket_span(image, bucket)?;
            index::find_live_entry(image, span, &fp, self.header.n_bytes_file).map(|off| {
                (
                    off,
                    index::entry_rel_pos(image, off, self.header.n_bytes_file),
                )
            })
        };
        if let Some((entry_off, old_rel)) = found {
            let nbf = self.header.n_bytes_file;
            self.file.write_at(
                entry_off + FINGERPRINT_LEN as u64,
                &index::rel_pos_field(0, nbf)[..nbf as usize],
            )?;
            let abs = self.data_pos + old_rel - 1;
            self.mark_block_dead(abs)?;
            dead += 1;
        }

        if dead == 0 {
            return Err(StoreError::NotFound.into());
        }
        self.bump_n_deletes(dead)
    }

    /// Слить буфер в конец файла (индекс не трогается).
    pub(crate) fn flush_buffer(&mut self) -> Result<()> {
        if self.wbuf.buf.is_empty() {
            return Ok(());
        }
        let len = self.wbuf.buf.len() as u64;
        let old = self.file.grow(len)?;
        // буфер нельзя держать заимствованным через self — забираем его
        let staged = std::mem::take(&mut self.wbuf.buf);
        self.file.write_at(old, &staged)?;
        self.wbuf.buf = staged;
        self.wbuf.buf.clear();
        Ok(())
    }

    /// alive = 0 у блока по абсолютной позиции; блок может лежать как в
    /// файле, так и в ещё не слитом буфере.
    pub(crate) fn mark_block_dead(&mut self, abs: u64) -> Result<()> {
        if abs < self.file.len() {
            return self.file.write_at(abs, &[DEAD]);
        }
        let idx = (abs - self.file.len()) as usize;
        if idx >= self.wbuf.buf.len() {
            return Err(StoreError::Format(format!(
                "staged block offset {} out of buffer bounds",
                abs
            ))
            .into());
        }
        self.wbuf.buf[idx] = DEAD;
        Ok(())
    }
}
