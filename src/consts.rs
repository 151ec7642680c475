//! Общие константы формата (заголовок, bucket-таблица, data-index, лестница роста).
//!
//! Файл стора (LE):
//! [magic16][version u16]
//! [n_buckets u32][n_bytes_index u32=4][n_bytes_file u8][n_bytes_key u8]
//! [key_codec_id u16][value_codec_id u16]
//! variable: [n_bytes_value u8][n_deletes u32 @33]
//! fixed:    [value_len u32]  [n_deletes u32 @36]
//! zero-padding до 200, далее bucket-таблица и data-index (см. layout.rs).

// -------- Header --------

/// 16-байтовые magic-теги вариантов формата.
pub const MAGIC_VARIABLE: &[u8; 16] = b"BOOKLETVARIABLE1";
pub const MAGIC_FIXED: &[u8; 16] = b"BOOKLETFIXEDVAL1";

pub const FORMAT_VERSION: u16 = 1;

/// Фиксированный размер заголовка; bucket-таблица начинается сразу за ним.
pub const HEADER_SIZE: u64 = 200;

// Смещения полей заголовка (общая часть).
pub const OFF_MAGIC: usize = 0;
pub const OFF_VERSION: usize = 16;
pub const OFF_N_BUCKETS: usize = 18;
pub const OFF_N_BYTES_INDEX: usize = 22;
pub const OFF_N_BYTES_FILE: usize = 26;
pub const OFF_N_BYTES_KEY: usize = 27;
pub const OFF_KEY_CODEC: usize = 28;
pub const OFF_VALUE_CODEC: usize = 30;
// Вариантная часть: у variable — n_bytes_value (u8), у fixed — value_len (u32).
pub const OFF_VALUE_FIELD: usize = 32;
// n_deletes лежит сразу за вариантной частью (33 variable / 36 fixed).
pub const OFF_N_DELETES_VARIABLE: usize = 33;
pub const OFF_N_DELETES_FIXED: usize = 36;

// -------- Index --------

/// Ширина отпечатка ключа (BLAKE2s, усечённый выход).
pub const FINGERPRINT_LEN: usize = 13;

/// Ширина одного слота bucket-таблицы. Формат фиксирует её в 4 байта,
/// но значение всё равно хранится в заголовке и проверяется при open().
pub const N_BYTES_INDEX: u32 = 4;

/// rel_pos == 0 — sentinel «нет живой записи» (tombstone/placeholder).
pub const NO_BLOCK: u64 = 0;

// -------- Limits --------

/// Допустимая ширина поля rel_pos (байт). 6 байт адресуют до 256 ТиБ.
pub const MIN_N_BYTES_FILE: u8 = 1;
pub const MAX_N_BYTES_FILE: u8 = 6;

pub const MIN_N_BYTES_KEY: u8 = 1;
pub const MAX_N_BYTES_KEY: u8 = 8;

// -------- Reindex ladder --------

/// Лестница кандидатов числа бакетов для reindex (простые числа).
/// За последней ступенью роста нет.
pub const BUCKET_LADDER: [u32; 5] = [10_007, 100_003, 1_000_003, 10_000_019, 100_000_007];

/// Следующая ступень лестницы, строго больше текущего значения.
pub fn next_bucket_count(current: u32) -> Option<u32> {
    BUCKET_LADDER.iter().copied().find(|&n| n > current)
}

// -------- Write buffer --------

/// Ёмкость WriteBuffer по умолчанию (байт).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 4 * 1024 * 1024;
