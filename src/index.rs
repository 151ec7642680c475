//! data-index: спаны бакетов и поиск отпечатков.
//!
//! Регион data-index — это последовательность записей
//! (fingerprint[13], rel_pos[n_bytes_file]), сгруппированных по бакетам
//! согласно bucket-таблице. Поиск — байтовый (pattern search) по спану
//! бакета: отпечаток может встретиться и как подстрока чужой записи,
//! поэтому совпадение принимается только при (pos - span_start) %
//! entry_size == 0; иначе поиск продолжается за ложным совпадением.
//! Выровненные, но затомбстоненные записи (rel_pos == 0) тоже
//! пропускаются: на один ключ может остаться несколько записей, живая —
//! максимум одна.

use anyhow::Result;
use byteorder::{ByteOrder, LittleEndian};

use crate::consts::{FINGERPRINT_LEN, NO_BLOCK};
use crate::errors::StoreError;
use crate::hash::Fingerprint;
use crate::layout::{bucket_slot_offset, index_entry_size};

/// Прочитать слот bucket-таблицы (0..=n_buckets).
#[inline]
pub fn read_bucket_offset(image: &[u8], bucket: u32) -> Result<u64> {
    let off = bucket_slot_offset(bucket) as usize;
    if off + 4 > image.len() {
        return Err(StoreError::Format(format!(
            "bucket table slot {} out of bounds",
            bucket
        ))
        .into());
    }
    Ok(LittleEndian::read_u32(&image[off..off + 4]) as u64)
}

/// Границы спана бакета в data-index регионе: [start, end).
pub fn bucket_span(image: &[u8], bucket: u32) -> Result<(u64, u64)> {
    let start = read_bucket_offset(image, bucket)?;
    let end = read_bucket_offset(image, bucket + 1)?;
    if start > end || end as usize > image.len() {
        return Err(StoreError::Format(format!(
            "corrupt bucket span {}: [{}, {}) (file len {})",
            bucket,
            start,
            end,
            image.len()
        ))
        .into());
    }
    Ok((start, end))
}

/// rel_pos записи по её абсолютному смещению.
#[inline]
pub fn entry_rel_pos(image: &[u8], entry_off: u64, n_bytes_file: u8) -> u64 {
    let at = entry_off as usize + FINGERPRINT_LEN;
    LittleEndian::read_uint(&image[at..at + n_bytes_file as usize], n_bytes_file as usize)
}

/// Сериализованное поле rel_pos шириной n_bytes_file.
#[inline]
pub fn rel_pos_field(rel_pos: u64, n_bytes_file: u8) -> [u8; 8] {
    let mut out = [0u8; 8];
    LittleEndian::write_uint(&mut out[..n_bytes_file as usize], rel_pos, n_bytes_file as usize);
    out
}

/// Смещение data-блока для rel_pos; None для sentinel (tombstone).
#[inline]
pub fn resolve_block(rel_pos: u64, data_pos: u64) -> Option<u64> {
    if rel_pos == NO_BLOCK {
        None
    } else {
        Some(data_pos + rel_pos - 1)
    }
}

/// Прочитать всю bucket-таблицу (n_buckets + 1 слотов) в память.
/// Commit/reindex мутируют эту копию и записывают её обратно один раз.
pub fn read_bucket_table(image: &[u8], n_buckets: u32) -> Result<Vec<u32>> {
    let start = bucket_slot_offset(0) as usize;
    let len = (n_buckets as usize + 1) * 4;
    if start + len > image.len() {
        return Err(StoreError::Format("truncated bucket table".to_string()).into());
    }
    let mut out = Vec::with_capacity(n_buckets as usize + 1);
    for i in 0..=n_buckets as usize {
        out.push(LittleEndian::read_u32(&image[start + i * 4..start + i * 4 + 4]));
    }
    Ok(out)
}

/// Сериализовать bucket-таблицу для записи одним куском.
pub fn encode_bucket_table(offsets: &[u32]) -> Vec<u8> {
    let mut out = vec![0u8; offsets.len() * 4];
    for (i, o) in offsets.iter().enumerate() {
        LittleEndian::write_u32(&mut out[i * 4..i * 4 + 4], *o);
    }
    out
}

#[inline]
fn find_pattern(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Найти живую запись с данным отпечатком внутри спана.
/// Возвращает абсолютное смещение записи или None.
pub fn find_live_entry(
    image: &[u8],
    span: (u64, u64),
    fp: &Fingerprint,
    n_bytes_file: u8,
) -> Option<u64> {
    let (start, end) = span;
    let span_bytes = &image[start as usize..end as usize];
    let esz = index_entry_size(n_bytes_file) as usize;
    let nbf = n_bytes_file as usize;

    let mut from = 0usize;
    while let Some(pos) = find_pattern(&span_bytes[from..], fp) {
        let at = from + pos;
        if at % esz == 0 && at + esz <= span_bytes.len() {
            // выровненная запись: живая — результат, мёртвая — ищем дальше
            let rel = LittleEndian::read_uint(
                &span_bytes[at + FINGERPRINT_LEN..at + FINGERPRINT_LEN + nbf],
                nbf,
            );
            if rel != NO_BLOCK {
                return Some(start + at as u64);
            }
            from = at + esz;
        } else {
            // ложное совпадение внутри чужой записи
            from = at + 1;
        }
        if from >= span_bytes.len() {
            break;
        }
    }
    None
}
