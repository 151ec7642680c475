//! store/reindex — перестройка bucket-таблицы и data-index под новое число
//! бакетов.
//!
//! План (байты двигаются bulk-сдвигами, данные блоков не переписываются):
//! 1) посчитать размеры свежей таблицы и индекса под live-записи;
//! 2) нарастить файл и увести старый data-index (и данные) из-под региона
//!    новой таблицы: [hdr][new_table][new_index][old_index copy][data];
//! 3) пройти копию старого индекса, живые записи вставить в новый регион
//!    той же одиночной shift-вставкой, что и commit (таблица — in-memory);
//! 4) придвинуть данные вплотную к новому региону, усечь файл на размер
//!    копии старого индекса.
//! Отображение «ключ -> data-блок» не меняется: меняются только бакеты и
//! позиции записей индекса. Триггер — внешний (load factor, см. лестницу
//! next_bucket_count).

use anyhow::Result;
use log::info;

use crate::consts::FINGERPRINT_LEN;
use crate::errors::StoreError;
use crate::hash::index_bucket;
use crate::index;
use crate::layout::{bucket_table_start, index_start};

use super::commit::shift_insert;
use super::core::Store;

impl Store {
    /// Перестроить индекс под new_n_buckets. Pending-записи складываются
    /// внутренним commit до начала перестройки.
    pub fn reindex(&mut self, new_n_buckets: u32) -> Result<()> {
        if new_n_buckets == 0 {
            return Err(StoreError::Format("n_buckets must be > 0".to_string()).into());
        }
        self.commit()?;

        let nbf = self.header.n_bytes_file;
        let esz = self.entry_size();
        let old_index_start = index_start(self.header.n_buckets);
        let old_data_pos = self.data_pos;
        let s_old = old_data_pos - old_index_start;
        let data_len = self.file.len() - old_data_pos;

        // живые записи старого индекса
        let live = self.n_keys();
        let s_new = live * esz;
        let new_index_start = index_start(new_n_buckets);
        let scratch_pos = new_index_start + s_new; // будущий data_pos
        if scratch_pos > u32::MAX as u64 {
            return Err(StoreError::Capacity(format!(
                "new data_pos {} exceeds 4-byte bucket offsets",
                scratch_pos
            ))
            .into());
        }

        // -------- шаг 2: освободить место и увести старый индекс --------
        let needed = scratch_pos + s_old + data_len;
        if needed > self.file.len() {
            self.file.grow(needed - self.file.len())?;
        }
        if scratch_pos + s_old >= old_data_pos {
            // данные вперёд, затем копия старого индекса в зазор перед ними
            self.file
                .move_within(old_data_pos, data_len, scratch_pos + s_old)?;
            self.file.move_within(old_index_start, s_old, scratch_pos)?;
        } else {
            // сжатие: сперва копия индекса (ложится ниже данных), потом данные
            self.file.move_within(old_index_start, s_old, scratch_pos)?;
            self.file
                .move_within(old_data_pos, data_len, scratch_pos + s_old)?;
        }

        // -------- шаг 3: пустая таблица + пере-вставка живых записей --------
        let mut offsets = vec![new_index_start as u32; new_n_buckets as usize + 1];
        let mut frontier = new_index_start;
        let n_entries = s_old / esz;
        for i in 0..n_entries {
            let entry_off = scratch_pos + i * esz;
            let (fp, rel) = {
                let image = self.file.as_slice();
                let mut fp = [0u8; FINGERPRINT_LEN];
                fp.copy_from_slice(
                    &image[entry_off as usize..entry_off as usize + FINGERPRINT_LEN],
                );
                (fp, index::entry_rel_pos(image, entry_off, nbf))
            };
            if rel == 0 {
                continue; // tombstone старого индекса не переносится
            }
            let bucket = index_bucket(&fp, new_n_buckets);
            shift_insert(
                &mut self.file,
                &mut offsets,
                &mut frontier,
                bucket,
                &fp,
                rel,
                nbf,
            )?;
        }
        debug_assert_eq!(frontier, scratch_pos);

        // -------- шаг 4: данные на место, усечение, заголовок --------
        self.file
            .move_within(scratch_pos + s_old, data_len, scratch_pos)?;
        self.file.truncate(scratch_pos + data_len)?;

        let old_n = self.header.n_buckets;
        self.header.n_buckets = new_n_buckets;
        self.write_header()?;
        self.file
            .write_at(bucket_table_start(), &index::encode_bucket_table(&offsets))?;
        self.data_pos = scratch_pos;
        self.committed_len = self.file.len();
        self.file.flush()?;

        info!(
            "reindex: {} -> {} buckets, {} live entries, data_pos {}",
            old_n, new_n_buckets, live, scratch_pos
        );
        Ok(())
    }
}
