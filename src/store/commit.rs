//! store/commit — слияние pending-пар в персистентный bucket-индекс.
//!
//! Порядок (см. также write.rs):
//! 1) слить остаток WriteBuffer;
//! 2) pending в обратном порядке записи: для повторных отпечатков побеждает
//!    последняя запись, блоки остальных сразу помечаются мёртвыми;
//! 3) победители с живой записью в индексе — перезапись rel_pos на месте
//!    (+ tombstone старого блока); остальные — структурные вставки;
//! 4) вставки: один bulk-сдвиг data-региона на суммарный прирост, затем
//!    на каждую вставку узкий сдвиг хвоста индекса на одну запись.
//!    Bucket-offset'ы правятся в in-memory массиве и пишутся одним куском.
//!
//! Политика: один крупный memmove на батч + по узкому на каждый новый ключ —
//! число больших сдвигов ограничено числом новых ключей, не числом бакетов.

use anyhow::Result;
use log::debug;
use std::collections::HashSet;

use crate::consts::FINGERPRINT_LEN;
use crate::errors::StoreError;
use crate::hash::{index_bucket, Fingerprint};
use crate::index;
use crate::layout::bucket_table_start;
use crate::mapped::MappedFile;

use super::core::Store;
use super::write::PendingEntry;

impl Store {
    /// Зафиксировать все staged-записи в индексе.
    pub fn commit(&mut self) -> Result<()> {
        self.flush_buffer()?;
        if self.wbuf.pending.is_empty() {
            self.file.flush()?;
            self.committed_len = self.file.len();
            return Ok(());
        }

        let pending = std::mem::take(&mut self.wbuf.pending);
        let nbf = self.header.n_bytes_file;
        let esz = self.entry_size();
        let mut dead = 0u32;

        // -------- шаг 2: дубликаты (последняя запись побеждает) --------
        let mut seen: HashSet<Fingerprint> = HashSet::with_capacity(pending.len());
        let mut winners: Vec<PendingEntry> = Vec::with_capacity(pending.len());
        for p in pending.iter().rev() {
            if seen.insert(p.fp) {
                winners.push(*p);
            } else {
                let abs = self.data_pos + p.rel_pos - 1;
                self.mark_block_dead(abs)?;
                dead += 1;
            }
        }

        // -------- шаг 3: on-place перезапись либо очередь на вставку --------
        let mut inserts: Vec<(u32, PendingEntry)> = Vec::new();
        for w in winners {
            let bucket = index_bucket(&w.fp, self.header.n_buckets);
            let found = {
                let image = self.file.as_slice();
                let span = index::bucket_span(image, bucket)?;
                index::find_live_entry(image, span, &w.fp, nbf)
                    .map(|off| (off, index::entry_rel_pos(image, off, nbf)))
            };
            match found {
                Some((entry_off, old_rel)) => {
                    self.file.write_at(
                        entry_off + FINGERPRINT_LEN as u64,
                        &index::rel_pos_field(w.rel_pos, nbf)[..nbf as usize],
                    )?;
                    let abs = self.data_pos + old_rel - 1;
                    self.mark_block_dead(abs)?;
                    dead += 1;
                }
                None => inserts.push((bucket, w)),
            }
        }

        // -------- шаг 4: структурные вставки --------
        if !inserts.is_empty() {
            let extra = inserts.len() as u64 * esz;
            let new_data_pos = self.data_pos + extra;
            if new_data_pos > u32::MAX as u64 {
                return Err(StoreError::Capacity(format!(
                    "index region end {} exceeds 4-byte bucket offsets",
                    new_data_pos
                ))
                .into());
            }

            // один bulk-сдвиг всего data-региона на суммарный прирост
            let old_eof = self.file.grow(extra)?;
            self.file
                .move_within(self.data_pos, old_eof - self.data_pos, new_data_pos)?;

            let mut offsets =
                index::read_bucket_table(self.file.as_slice(), self.header.n_buckets)?;
            let mut frontier = self.data_pos;
            for (bucket, w) in &inserts {
                shift_insert(
                    &mut self.file,
                    &mut offsets,
                    &mut frontier,
                    *bucket,
                    &w.fp,
                    w.rel_pos,
                    nbf,
                )?;
            }
            debug_assert_eq!(frontier, new_data_pos);

            self.file
                .write_at(bucket_table_start(), &index::encode_bucket_table(&offsets))?;
            self.data_pos = new_data_pos;
            debug!(
                "commit: {} structural inserts, data_pos -> {}",
                inserts.len(),
                new_data_pos
            );
        }

        self.bump_n_deletes(dead)?;
        self.file.flush()?;
        self.committed_len = self.file.len();
        Ok(())
    }
}

/// Вставка одной записи в data-index со сдвигом хвоста региона на одну
/// ширину записи. `offsets` — in-memory bucket-таблица (правится на месте),
/// `frontier` — текущий конец заполненной части региона; свободный зазор
/// лежит в [frontier, frontier + оставшиеся вставки * esz).
/// Используется и при commit, и при reindex.
pub(crate) fn shift_insert(
    file: &mut MappedFile,
    offsets: &mut [u32],
    frontier: &mut u64,
    bucket: u32,
    fp: &Fingerprint,
    rel_pos: u64,
    n_bytes_file: u8,
) -> Result<()> {
    let esz = FINGERPRINT_LEN as u64 + n_bytes_file as u64;
    let at = offsets[bucket as usize + 1] as u64; // конец спана бакета

    // раздвинуть [at, frontier) на одну запись
    file.move_within(at, *frontier - at, at + esz)?;

    let mut entry = [0u8; 19]; // 13 + максимум 6
    entry[..FINGERPRINT_LEN].copy_from_slice(fp);
    entry[FINGERPRINT_LEN..FINGERPRINT_LEN + n_bytes_file as usize]
        .copy_from_slice(&index::rel_pos_field(rel_pos, n_bytes_file)[..n_bytes_file as usize]);
    file.write_at(at, &entry[..esz as usize])?;

    for o in offsets[bucket as usize + 1..].iter_mut() {
        *o += esz as u32;
    }
    *frontier += esz;
    Ok(())
}
