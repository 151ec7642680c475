//! Чистая позиционная арифметика поверх параметров заголовка.
//!
//! Здесь нет I/O: только вычисление границ регионов файла
//! [header 200][bucket-таблица][data-index][data], чтобы все смещения
//! считались в одном месте и тестировались отдельно.

use crate::consts::{FINGERPRINT_LEN, HEADER_SIZE};

/// Начало bucket-таблицы (сразу за заголовком).
#[inline]
pub fn bucket_table_start() -> u64 {
    HEADER_SIZE
}

/// Длина bucket-таблицы: n_buckets + 1 слотов по 4 байта.
/// Последний слот хранит data_pos (конец data-index региона).
#[inline]
pub fn bucket_table_len(n_buckets: u32) -> u64 {
    (n_buckets as u64 + 1) * 4
}

/// Конец bucket-таблицы == начало data-index региона.
#[inline]
pub fn index_start(n_buckets: u32) -> u64 {
    bucket_table_start() + bucket_table_len(n_buckets)
}

/// Файловое смещение слота bucket-таблицы для бакета b (0..=n_buckets).
#[inline]
pub fn bucket_slot_offset(bucket: u32) -> u64 {
    bucket_table_start() + bucket as u64 * 4
}

/// Размер одной записи data-index: 13-байтовый отпечаток + rel_pos.
#[inline]
pub fn index_entry_size(n_bytes_file: u8) -> u64 {
    FINGERPRINT_LEN as u64 + n_bytes_file as u64
}

/// data_pos свежесозданного стора: data-index пуст, данные начинаются
/// сразу за таблицей.
#[inline]
pub fn initial_data_pos(n_buckets: u32) -> u64 {
    index_start(n_buckets)
}

/// Максимальный представимый rel_pos при ширине поля n_bytes_file (1..=6).
#[inline]
pub fn max_rel_pos(n_bytes_file: u8) -> u64 {
    (1u64 << (8 * n_bytes_file as u32)) - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_are_contiguous() {
        let n = 4u32;
        assert_eq!(bucket_table_start(), 200);
        assert_eq!(bucket_table_len(n), 20);
        assert_eq!(index_start(n), 220);
        assert_eq!(initial_data_pos(n), 220);
        assert_eq!(bucket_slot_offset(0), 200);
        assert_eq!(bucket_slot_offset(4), 216);
    }

    #[test]
    fn entry_size_tracks_rel_pos_width() {
        assert_eq!(index_entry_size(1), 14);
        assert_eq!(index_entry_size(4), 17);
        assert_eq!(index_entry_size(6), 19);
    }

    #[test]
    fn max_rel_pos_by_width() {
        assert_eq!(max_rel_pos(1), 255);
        assert_eq!(max_rel_pos(2), 65_535);
        assert_eq!(max_rel_pos(6), (1u64 << 48) - 1);
    }
}
