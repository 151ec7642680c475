//! store/scan — точечные чтения (get/contains) и ленивые итераторы.
//!
//! get: отпечаток -> бакет -> выровненный поиск в спане -> блок по
//! data_pos + rel_pos - 1 -> декодирование значения. Отпечатку доверяем:
//! байты ключа на совпадение не проверяются (13 байт BLAKE2s).
//!
//! Итераторы последовательно идут по data-региону от data_pos до горизонта
//! последнего commit; мёртвые блоки перешагиваются по длине, без чтения
//! payload. Порядок — порядок блоков в файле, не ключей.

use anyhow::Result;

use crate::block::{read_block_at, BlockRef};
use crate::errors::StoreError;
use crate::hash::{fingerprint, index_bucket};
use crate::index;

use super::core::Store;
use super::write::as_serialization;

impl Store {
    /// Значение по ключу. NotFound, если ключ отсутствует или затомбстонен.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let key_bytes = self.key_codec.encode(key).map_err(as_serialization)?;
        let fp = fingerprint(&key_bytes);
        let bucket = index_bucket(&fp, self.header.n_buckets);

        let image = self.file.as_slice();
        let span = index::bucket_span(image, bucket)?;
        let entry_off = index::find_live_entry(image, span, &fp, self.header.n_bytes_file)
            .ok_or(StoreError::NotFound)?;
        let rel = index::entry_rel_pos(image, entry_off, self.header.n_bytes_file);
        let abs = index::resolve_block(rel, self.data_pos).ok_or(StoreError::NotFound)?;

        let block = read_block_at(image, abs as usize, &self.header)?;
        let value = &image[block.value_off..block.value_off + block.value_len];
        self.value_codec.decode(value).map_err(as_serialization)
    }

    /// Есть ли живая запись для ключа.
    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        let key_bytes = self.key_codec.encode(key).map_err(as_serialization)?;
        let fp = fingerprint(&key_bytes);
        let bucket = index_bucket(&fp, self.header.n_buckets);

        let image = self.file.as_slice();
        let span = index::bucket_span(image, bucket)?;
        Ok(index::find_live_entry(image, span, &fp, self.header.n_bytes_file).is_some())
    }

    /// Ленивый обход пар (ключ, значение) закоммиченного состояния.
    pub fn items(&self) -> Items<'_> {
        Items {
            cursor: self.blocks(),
        }
    }

    /// Ленивый обход ключей.
    pub fn keys(&self) -> Keys<'_> {
        Keys {
            cursor: self.blocks(),
        }
    }

    /// Ленивый обход значений.
    pub fn values(&self) -> Values<'_> {
        Values {
            cursor: self.blocks(),
        }
    }

    fn blocks(&self) -> BlockCursor<'_> {
        BlockCursor {
            store: self,
            pos: self.data_pos,
            end: self.committed_len,
        }
    }
}

/// Курсор по живым блокам data-региона; останавливается на горизонте
/// последнего commit (staged-хвост не виден).
struct BlockCursor<'a> {
    store: &'a Store,
    pos: u64,
    end: u64,
}

impl<'a> BlockCursor<'a> {
    fn next_alive(&mut self) -> Option<Result<BlockRef>> {
        while self.pos < self.end {
            let image = self.store.file.as_slice();
            match read_block_at(image, self.pos as usize, &self.store.header) {
                Err(e) => {
                    self.pos = self.end; // дальше идти нельзя
                    return Some(Err(e));
                }
                Ok(block) => {
                    self.pos += block.total_len as u64;
                    if block.alive {
                        return Some(Ok(block));
                    }
                    // мёртвый блок перешагнули по длине
                }
            }
        }
        None
    }

    fn decode_key(&self, block: &BlockRef) -> Result<Vec<u8>> {
        let image = self.store.file.as_slice();
        self.store
            .key_codec
            .decode(&image[block.key_off..block.key_off + block.key_len])
            .map_err(as_serialization)
    }

    fn decode_value(&self, block: &BlockRef) -> Result<Vec<u8>> {
        let image = self.store.file.as_slice();
        self.store
            .value_codec
            .decode(&image[block.value_off..block.value_off + block.value_len])
            .map_err(as_serialization)
    }
}

pub struct Items<'a> {
    cursor: BlockCursor<'a>,
}

impl<'a> Iterator for Items<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = match self.cursor.next_alive()? {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        let key = match self.cursor.decode_key(&block) {
            Ok(k) => k,
            Err(e) => return Some(Err(e)),
        };
        let value = match self.cursor.decode_value(&block) {
            Ok(v) => v,
            Err(e) => return Some(Err(e)),
        };
        Some(Ok((key, value)))
    }
}

pub struct Keys<'a> {
    cursor: BlockCursor<'a>,
}

impl<'a> Iterator for Keys<'a> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = match self.cursor.next_alive()? {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        Some(self.cursor.decode_key(&block))
    }
}

pub struct Values<'a> {
    cursor: BlockCursor<'a>,
}

impl<'a> Iterator for Values<'a> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let block = match self.cursor.next_alive()? {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        Some(self.cursor.decode_value(&block))
    }
}
