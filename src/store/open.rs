//! store/open — создание и открытие стора.
//!
//! create: заголовок + пустая bucket-таблица, эксклюзивный lock, mmap.
//! open: проверка magic/version/ширин/codec id (FormatError при любом
//! несоответствии), восстановление data_pos из последнего слота таблицы,
//! lock, mmap. Codec'и резолвятся один раз здесь, не на каждую операцию.

use anyhow::Result;
use std::path::Path;

use crate::codec::{resolve_builtin, Codec, CodecKind};
use crate::consts::{DEFAULT_WRITE_BUFFER_SIZE, FORMAT_VERSION, HEADER_SIZE};
use crate::errors::StoreError;
use crate::header::{StoreHeader, ValueLayout};
use crate::index;
use crate::layout;
use crate::lock;
use crate::mapped::MappedFile;

use super::core::Store;
use super::write::WriteBuffer;

/// Параметры создания стора (builder).
///
/// Значения по умолчанию: variable-формат с 4-байтовым полем длины значения,
/// rel_pos шириной 4 байта, длина ключа — 2 байта, codec'и Bytes,
/// WriteBuffer 4 МиБ.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    n_buckets: u32,
    n_bytes_file: u8,
    n_bytes_key: u8,
    values: ValueLayout,
    key_codec: CodecKind,
    value_codec: CodecKind,
    write_buffer_size: usize,
}

impl StoreOptions {
    pub fn new(n_buckets: u32) -> Self {
        Self {
            n_buckets,
            n_bytes_file: 4,
            n_bytes_key: 2,
            values: ValueLayout::Variable { n_bytes_value: 4 },
            key_codec: CodecKind::Bytes,
            value_codec: CodecKind::Bytes,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
        }
    }

    /// Ширина поля rel_pos в записях индекса (1..=6).
    pub fn n_bytes_file(mut self, n: u8) -> Self {
        self.n_bytes_file = n;
        self
    }

    /// Ширина поля длины ключа в data-блоках (1..=8).
    pub fn n_bytes_key(mut self, n: u8) -> Self {
        self.n_bytes_key = n;
        self
    }

    /// Variable-формат: per-блочное поле длины значения шириной n байт.
    pub fn variable_values(mut self, n_bytes_value: u8) -> Self {
        self.values = ValueLayout::Variable { n_bytes_value };
        self
    }

    /// Fixed-формат: все значения ровно value_len байт.
    pub fn fixed_values(mut self, value_len: u32) -> Self {
        self.values = ValueLayout::Fixed { value_len };
        self
    }

    pub fn key_codec(mut self, kind: CodecKind) -> Self {
        self.key_codec = kind;
        self
    }

    pub fn value_codec(mut self, kind: CodecKind) -> Self {
        self.value_codec = kind;
        self
    }

    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Создать стор со встроенными codec'ами.
    pub fn create(&self, path: &Path) -> Result<Store> {
        let kc = resolve_builtin(self.key_codec).ok_or_else(|| {
            StoreError::Format("custom key codec requires create_with".to_string())
        })?;
        let vc = resolve_builtin(self.value_codec).ok_or_else(|| {
            StoreError::Format("custom value codec requires create_with".to_string())
        })?;
        self.create_inner(path, kc, vc, self.key_codec, self.value_codec)
    }

    /// Создать стор с пользовательской парой codec'ов (id = Custom в
    /// заголовке; при каждом open её придётся передавать снова).
    pub fn create_with(
        &self,
        path: &Path,
        key_codec: Box<dyn Codec>,
        value_codec: Box<dyn Codec>,
    ) -> Result<Store> {
        self.create_inner(path, key_codec, value_codec, CodecKind::Custom, CodecKind::Custom)
    }

    fn create_inner(
        &self,
        path: &Path,
        key_codec: Box<dyn Codec>,
        value_codec: Box<dyn Codec>,
        key_kind: CodecKind,
        value_kind: CodecKind,
    ) -> Result<Store> {
        if self.n_buckets == 0 {
            return Err(StoreError::Format("n_buckets must be > 0".to_string()).into());
        }
        StoreHeader::validate_widths(self.n_bytes_file, self.n_bytes_key)?;

        let header = StoreHeader {
            version: FORMAT_VERSION,
            n_buckets: self.n_buckets,
            n_bytes_file: self.n_bytes_file,
            n_bytes_key: self.n_bytes_key,
            key_codec: key_kind,
            value_codec: value_kind,
            values: self.values,
            n_deletes: 0,
        };

        let dp = layout::initial_data_pos(self.n_buckets);
        let mut file = MappedFile::create_new(path, dp)?;

        let mut hdr_buf = [0u8; HEADER_SIZE as usize];
        header.write_to(&mut hdr_buf)?;
        file.write_at(0, &hdr_buf)?;

        let offsets = vec![dp as u32; self.n_buckets as usize + 1];
        file.write_at(
            layout::bucket_table_start(),
            &index::encode_bucket_table(&offsets),
        )?;
        file.flush()?;

        let guard = lock::try_acquire_exclusive(path)?;
        Ok(Store {
            path: path.to_path_buf(),
            file,
            header,
            data_pos: dp,
            committed_len: dp,
            wbuf: WriteBuffer::new(self.write_buffer_size),
            key_codec,
            value_codec,
            _lock: guard,
            closed: false,
        })
    }
}

impl Store {
    /// Открыть существующий стор; codec'и резолвятся из заголовка.
    /// Файл с Custom codec id так не открыть — нужен open_with.
    pub fn open(path: &Path) -> Result<Store> {
        Self::open_inner(path, None)
    }

    /// Открыть стор с пользовательской парой codec'ов.
    pub fn open_with(
        path: &Path,
        key_codec: Box<dyn Codec>,
        value_codec: Box<dyn Codec>,
    ) -> Result<Store> {
        Self::open_inner(path, Some((key_codec, value_codec)))
    }

    fn open_inner(
        path: &Path,
        codecs: Option<(Box<dyn Codec>, Box<dyn Codec>)>,
    ) -> Result<Store> {
        let guard = lock::try_acquire_exclusive(path)?;
        let file = MappedFile::open_rw(path)?;

        if file.len() < HEADER_SIZE {
            return Err(StoreError::Format(format!(
                "{}: file shorter than header ({} < {})",
                path.display(),
                file.len(),
                HEADER_SIZE
            ))
            .into());
        }
        let header = StoreHeader::read_from(file.as_slice())?;

        let table_end = layout::index_start(header.n_buckets);
        if file.len() < table_end {
            return Err(StoreError::Format(format!(
                "{}: file shorter than bucket table ({} < {})",
                path.display(),
                file.len(),
                table_end
            ))
            .into());
        }

        // data_pos восстанавливается из последнего слота таблицы
        let data_pos = index::read_bucket_offset(file.as_slice(), header.n_buckets)?;
        if data_pos < table_end || data_pos > file.len() {
            return Err(StoreError::Format(format!(
                "{}: corrupt data_pos {} (table end {}, file len {})",
                path.display(),
                data_pos,
                table_end,
                file.len()
            ))
            .into());
        }

        let (key_codec, value_codec) = match codecs {
            Some(pair) => pair,
            None => {
                let kc = resolve_builtin(header.key_codec).ok_or_else(|| {
                    StoreError::Format(
                        "store was created with a custom key codec; use open_with".to_string(),
                    )
                })?;
                let vc = resolve_builtin(header.value_codec).ok_or_else(|| {
                    StoreError::Format(
                        "store was created with a custom value codec; use open_with".to_string(),
                    )
                })?;
                (kc, vc)
            }
        };

        let committed_len = file.len();
        Ok(Store {
            path: path.to_path_buf(),
            file,
            header,
            data_pos,
            committed_len,
            wbuf: WriteBuffer::new(DEFAULT_WRITE_BUFFER_SIZE),
            key_codec,
            value_codec,
            _lock: guard,
            closed: false,
        })
    }
}
