//! store/prune — однопроходная компактация data-региона.
//!
//! Идём от data_pos к концу файла. Мёртвый блок убирается одним memmove
//! хвоста назад (курсор стоит: приехавшие байты разбираются с той же
//! позиции). У живого блока после сдвигов поправляется rel_pos его записи
//! в индексе: ключ пере-хэшируется, запись находится выровненным поиском и
//! rel_pos уменьшается на накопленный removed_n_bytes. Bucket-таблица не
//! меняется — двигаются только позиции data-региона. В конце файл усекается
//! на суммарно убранные байты, n_deletes сбрасывается в 0.

use anyhow::Result;
use log::info;

use crate::block::read_block_at;
use crate::consts::FINGERPRINT_LEN;
use crate::errors::StoreError;
use crate::hash::{fingerprint, index_bucket};
use crate::index;

use super::core::Store;

impl Store {
    /// Физически убрать мёртвые блоки. Возвращает число освобождённых байт.
    pub fn prune(&mut self) -> Result<u64> {
        self.commit()?;

        let nbf = self.header.n_bytes_file;
        let mut cursor = self.data_pos;
        let mut end = self.file.len();
        let mut removed = 0u64;

        while cursor < end {
            let (alive, total, key_off, key_len) = {
                let image = self.file.as_slice();
                let b = read_block_at(image, cursor as usize, &self.header)?;
                (b.alive, b.total_len as u64, b.key_off, b.key_len)
            };

            if !alive {
                // убрать блок: хвост назад, курсор не двигается
                self.file
                    .move_within(cursor + total, end - (cursor + total), cursor)?;
                end -= total;
                removed += total;
                continue;
            }

            if removed > 0 {
                // живой блок уехал назад на removed — поправить его запись
                let (entry_off, old_rel) = {
                    let image = self.file.as_slice();
                    let fp = fingerprint(&image[key_off..key_off + key_len]);
                    let bucket = index_bucket(&fp, self.header.n_buckets);
                    let span = index::bucket_span(image, bucket)?;
                    let entry_off =
                        index::find_live_entry(image, span, &fp, nbf).ok_or_else(|| {
                            StoreError::Format(format!(
                                "live block at {} has no live index entry",
                                cursor
                            ))
                        })?;
                    (entry_off, index::entry_rel_pos(image, entry_off, nbf))
                };
                debug_assert_eq!(old_rel, cursor + removed - self.data_pos + 1);
                self.file.write_at(
                    entry_off + FINGERPRINT_LEN as u64,
                    &index::rel_pos_field(old_rel - removed, nbf)[..nbf as usize],
                )?;
            }
            cursor += total;
        }

        self.file.truncate(end)?;
        self.header.n_deletes = 0;
        self.write_header()?;
        self.committed_len = end;
        self.file.flush()?;

        info!("prune: reclaimed {} bytes, file len {}", removed, end);
        Ok(removed)
    }
}
