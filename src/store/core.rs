//! store/core — структура Store, счётчики, clear()/close() и Drop.
//!
//! Дисциплина конкурентности: все мутации берут &mut self, чтение — &self;
//! правила заимствования Rust дают внутрипроцессную сериализацию мутаций,
//! которую спецификация движка требует от единственного writer'а. Между
//! процессами — эксклюзивный advisory-lock (fs2) на файл стора, удерживаемый
//! всю сессию.

use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;

use crate::codec::Codec;
use crate::consts::{HEADER_SIZE, NO_BLOCK};
use crate::header::StoreHeader;
use crate::index;
use crate::layout::{self, index_entry_size};
use crate::lock::LockGuard;
use crate::mapped::MappedFile;

use super::write::WriteBuffer;

pub struct Store {
    pub path: PathBuf,
    pub(crate) file: MappedFile,
    pub(crate) header: StoreHeader,
    /// Начало data-региона; дублируется последним слотом bucket-таблицы.
    pub(crate) data_pos: u64,
    /// Длина файла на момент последнего commit — горизонт для сканов:
    /// слитые, но не закоммиченные байты лежат за ним и никому не видны.
    pub(crate) committed_len: u64,
    pub(crate) wbuf: WriteBuffer,
    pub(crate) key_codec: Box<dyn Codec>,
    pub(crate) value_codec: Box<dyn Codec>,
    pub(crate) _lock: LockGuard,
    pub(crate) closed: bool,
}

impl Store {
    // -------- геттеры --------

    #[inline]
    pub fn n_buckets(&self) -> u32 {
        self.header.n_buckets
    }

    #[inline]
    pub fn n_deletes(&self) -> u32 {
        self.header.n_deletes
    }

    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.data_pos
    }

    #[inline]
    pub fn file_len(&self) -> u64 {
        self.file.len()
    }

    /// Число живых записей в персистентном индексе (O(index), pending не
    /// считается). Используется внешним триггером reindex по load factor.
    pub fn n_keys(&self) -> u64 {
        let image = self.file.as_slice();
        let esz = self.header.entry_size();
        let start = layout::index_start(self.header.n_buckets);
        let mut live = 0u64;
        let mut off = start;
        while off + esz <= self.data_pos {
            if index::entry_rel_pos(image, off, self.header.n_bytes_file) != NO_BLOCK {
                live += 1;
            }
            off += esz;
        }
        live
    }

    // -------- внутренние помощники --------

    /// Переписать 200-байтовый заголовок из self.header.
    pub(crate) fn write_header(&mut self) -> Result<()> {
        let mut buf = [0u8; HEADER_SIZE as usize];
        self.header.write_to(&mut buf)?;
        self.file
            .write_at(0, &buf)
            .context("write store header")
    }

    /// n_deletes += by, с записью заголовка.
    pub(crate) fn bump_n_deletes(&mut self, by: u32) -> Result<()> {
        if by == 0 {
            return Ok(());
        }
        self.header.n_deletes = self.header.n_deletes.saturating_add(by);
        self.write_header()
    }

    // -------- lifecycle --------

    /// Отбросить все ключи: усечь файл до заголовка + пустой bucket-таблицы,
    /// сбросить data_pos и n_deletes. Файл остаётся на месте.
    pub fn clear(&mut self) -> Result<()> {
        self.wbuf.reset();

        let dp = layout::initial_data_pos(self.header.n_buckets);
        self.file.truncate(dp)?;
        self.header.n_deletes = 0;
        self.write_header()?;

        let offsets = vec![dp as u32; self.header.n_buckets as usize + 1];
        let table = index::encode_bucket_table(&offsets);
        self.file.write_at(layout::bucket_table_start(), &table)?;

        self.data_pos = dp;
        self.committed_len = dp;
        self.file.flush()
    }

    /// Закрыть стор: финальный commit, msync, снятие lock (Drop).
    pub fn close(mut self) -> Result<()> {
        self.commit()?;
        self.file.flush()?;
        self.closed = true;
        Ok(())
    }

    #[inline]
    pub(crate) fn entry_size(&self) -> u64 {
        index_entry_size(self.header.n_bytes_file)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.path)
            .field("n_buckets", &self.header.n_buckets)
            .field("data_pos", &self.data_pos)
            .field("file_len", &self.file.len())
            .field("pending_writes", &self.wbuf.pending.len())
            .finish()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Best-effort финализация: ошибки в Drop игнорируем.
        let _ = self.commit();
        let _ = self.file.flush();
    }
}
