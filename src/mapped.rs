//! mapped — единственная точка доступа к байтам файла стора.
//!
//! MappedFile держит файл и его MmapMut-вид целиком; все чтения, записи и
//! сдвиги диапазонов (bulk-move при commit/reindex/prune) идут через него,
//! так что позиционная арифметика и границы проверяются в одном месте.
//!
//! Правила:
//! - grow/truncate меняют длину через set_len и пересоздают отображение;
//! - move_within — это memmove (copy_within), перекрытие диапазонов допустимо;
//! - flush — msync отображения + best-effort sync_all файла.

use anyhow::{anyhow, Context, Result};
use memmap2::MmapMut;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::errors::StoreError;

pub struct MappedFile {
    file: File,
    map: MmapMut,
    len: u64,
    path: PathBuf,
}

impl MappedFile {
    /// Создать новый файл длиной `initial_len` и отобразить его.
    /// Ошибка, если файл уже существует.
    pub fn create_new(path: &Path, initial_len: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("create store file {}", path.display()))?;
        file.set_len(initial_len)
            .with_context(|| format!("set initial len {} for {}", initial_len, path.display()))?;
        let map = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("mmap {}", path.display()))?;
        Ok(Self {
            file,
            map,
            len: initial_len,
            path: path.to_path_buf(),
        })
    }

    /// Открыть существующий файл на чтение/запись и отобразить его.
    pub fn open_rw(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .with_context(|| format!("open store file {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?
            .len();
        if len == 0 {
            return Err(StoreError::Format(format!("{} is empty", path.display())).into());
        }
        let map = unsafe { MmapMut::map_mut(&file) }
            .with_context(|| format!("mmap {}", path.display()))?;
        Ok(Self {
            file,
            map,
            len,
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Весь файл как срез (полный «образ» для чтения).
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.map[..]
    }

    fn remap(&mut self) -> Result<()> {
        self.map = unsafe { MmapMut::map_mut(&self.file) }
            .with_context(|| format!("remap {}", self.path.display()))?;
        Ok(())
    }

    /// Увеличить файл на `extra` байт. Возвращает прежнюю длину.
    pub fn grow(&mut self, extra: u64) -> Result<u64> {
        let old = self.len;
        if extra == 0 {
            return Ok(old);
        }
        let new_len = old
            .checked_add(extra)
            .ok_or_else(|| anyhow!("file length overflow: {} + {}", old, extra))?;
        self.file
            .set_len(new_len)
            .with_context(|| format!("grow {} to {}", self.path.display(), new_len))?;
        self.len = new_len;
        self.remap()?;
        Ok(old)
    }

    /// Усечь файл до `new_len` байт.
    pub fn truncate(&mut self, new_len: u64) -> Result<()> {
        if new_len > self.len {
            return Err(anyhow!(
                "truncate beyond EOF: {} > {}",
                new_len,
                self.len
            ));
        }
        if new_len == self.len {
            return Ok(());
        }
        self.file
            .set_len(new_len)
            .with_context(|| format!("truncate {} to {}", self.path.display(), new_len))?;
        self.len = new_len;
        self.remap()
    }

    #[inline]
    fn check_range(&self, off: u64, len: u64) -> Result<(usize, usize)> {
        let end = off
            .checked_add(len)
            .ok_or_else(|| anyhow!("range overflow: {} + {}", off, len))?;
        if end > self.len {
            return Err(anyhow!(
                "range [{}, {}) out of bounds (file len {})",
                off,
                end,
                self.len
            ));
        }
        Ok((off as usize, end as usize))
    }

    /// Неизменяемый срез [off, off+len).
    pub fn slice(&self, off: u64, len: u64) -> Result<&[u8]> {
        let (a, b) = self.check_range(off, len)?;
        Ok(&self.map[a..b])
    }

    /// Изменяемый срез [off, off+len).
    pub fn slice_mut(&mut self, off: u64, len: u64) -> Result<&mut [u8]> {
        let (a, b) = self.check_range(off, len)?;
        Ok(&mut self.map[a..b])
    }

    /// Записать bytes по смещению off.
    pub fn write_at(&mut self, off: u64, bytes: &[u8]) -> Result<()> {
        let dst = self.slice_mut(off, bytes.len() as u64)?;
        dst.copy_from_slice(bytes);
        Ok(())
    }

    /// Сдвинуть len байт с src на dst (memmove; диапазоны могут перекрываться).
    pub fn move_within(&mut self, src: u64, len: u64, dst: u64) -> Result<()> {
        if len == 0 || src == dst {
            return Ok(());
        }
        let (s, _) = self.check_range(src, len)?;
        let (d, _) = self.check_range(dst, len)?;
        self.map.copy_within(s..s + len as usize, d);
        Ok(())
    }

    /// msync отображения; sync_all файла — best-effort.
    pub fn flush(&self) -> Result<()> {
        self.map
            .flush()
            .with_context(|| format!("flush mmap {}", self.path.display()))?;
        let _ = self.file.sync_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn unique_path(prefix: &str) -> PathBuf {
        let pid = std::process::id();
        let t = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("blt-{}-{}-{}.db", prefix, pid, t))
    }

    #[test]
    fn grow_write_move_truncate() -> Result<()> {
        let path = unique_path("mapped");
        let mut mf = MappedFile::create_new(&path, 16)?;
        assert_eq!(mf.len(), 16);

        mf.write_at(0, b"abcdefgh")?;
        mf.grow(8)?;
        assert_eq!(mf.len(), 24);
        assert_eq!(mf.slice(0, 8)?, b"abcdefgh");

        // перекрывающийся сдвиг вперёд
        mf.move_within(0, 8, 4)?;
        assert_eq!(mf.slice(4, 8)?, b"abcdefgh");

        // и назад
        mf.move_within(4, 8, 0)?;
        assert_eq!(mf.slice(0, 8)?, b"abcdefgh");

        mf.truncate(8)?;
        assert_eq!(mf.len(), 8);
        assert!(mf.slice(0, 9).is_err());

        let _ = std::fs::remove_file(&path);
        Ok(())
    }

    #[test]
    fn reopen_preserves_contents() -> Result<()> {
        let path = unique_path("reopen");
        {
            let mut mf = MappedFile::create_new(&path, 8)?;
            mf.write_at(0, b"booklet!")?;
            mf.flush()?;
        }
        let mf = MappedFile::open_rw(&path)?;
        assert_eq!(mf.slice(0, 8)?, b"booklet!");
        let _ = std::fs::remove_file(&path);
        Ok(())
    }
}
