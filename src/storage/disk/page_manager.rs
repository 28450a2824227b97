use crate::storage::error::{StorageError, StorageResult};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Owns the backing file of a single-page store. The page always sits at
/// offset 0.
pub struct PageManager {
    file: File,
    path: PathBuf,
    page_size: usize,
}

impl PageManager {
    /// Open or create the file. A file shorter than one page is overwritten
    /// with a zeroed page, which is an empty store.
    pub fn open(path: &Path, page_size: usize) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut pm = Self {
            file,
            path: path.to_path_buf(),
            page_size,
        };

        let file_size = pm.file_len()?;
        if file_size < page_size as u64 {
            info!(
                "Initializing {:?}: {} bytes is shorter than one {}-byte page",
                path, file_size, page_size
            );
            pm.write_page(&vec![0u8; page_size])?;
        } else {
            debug!("Opened {:?} ({} bytes)", path, file_size);
        }

        Ok(pm)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_page(&mut self, buf: &mut [u8]) -> StorageResult<()> {
        self.check_len(buf.len())?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(buf)?;

        Ok(())
    }

    /// Write the page at offset 0 and force it to stable storage.
    pub fn write_page(&mut self, data: &[u8]) -> StorageResult<()> {
        self.check_len(data.len())?;

        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(data)?;
        self.file.sync_all()?;

        Ok(())
    }

    pub fn file_len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Release the file handle. Data is already durable after `write_page`;
    /// the final sync surfaces any error the OS is still holding.
    pub fn close(self) -> StorageResult<()> {
        self.file.sync_all()?;
        debug!("Closed {:?}", self.path);
        Ok(())
    }

    /// Swap in a read-only handle so every following write fails.
    #[cfg(test)]
    pub(crate) fn reopen_read_only(&mut self) -> StorageResult<()> {
        self.file = File::open(&self.path)?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn reopen_read_write(&mut self) -> StorageResult<()> {
        self.file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        Ok(())
    }

    fn check_len(&self, len: usize) -> StorageResult<()> {
        if len != self.page_size {
            return Err(StorageError::InvalidArgument {
                what: "page buffer",
                expected: self.page_size,
                actual: len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    const PAGE: usize = 4096;

    #[test]
    fn test_create_initializes_page() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");

        let mut pm = PageManager::open(&file_path, PAGE)?;
        assert_eq!(pm.file_len()?, PAGE as u64);

        let mut buf = vec![0xffu8; PAGE];
        pm.read_page(&mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_short_file_is_reset() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");
        std::fs::write(&file_path, [7u8; 100])?;

        let mut pm = PageManager::open(&file_path, PAGE)?;
        assert_eq!(pm.file_len()?, PAGE as u64);

        let mut buf = vec![0u8; PAGE];
        pm.read_page(&mut buf)?;
        assert!(buf.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_write_and_read_page() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");
        let mut pm = PageManager::open(&file_path, PAGE)?;

        let mut write_buf = vec![0u8; PAGE];
        write_buf[0] = 42;
        write_buf[PAGE - 1] = 24;
        pm.write_page(&write_buf)?;

        let mut read_buf = vec![0u8; PAGE];
        pm.read_page(&mut read_buf)?;
        assert_eq!(read_buf, write_buf);

        Ok(())
    }

    #[test]
    fn test_persistence() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");

        {
            let mut pm = PageManager::open(&file_path, PAGE)?;
            pm.write_page(&vec![99u8; PAGE])?;
            pm.close()?;
        }

        {
            let mut pm = PageManager::open(&file_path, PAGE)?;
            let mut buf = vec![0u8; PAGE];
            pm.read_page(&mut buf)?;
            assert!(buf.iter().all(|&b| b == 99));
        }

        Ok(())
    }

    #[test]
    fn test_longer_file_is_kept() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");
        std::fs::write(&file_path, vec![5u8; PAGE * 2])?;

        let mut pm = PageManager::open(&file_path, PAGE)?;
        pm.write_page(&vec![1u8; PAGE])?;
        assert_eq!(pm.file_len()?, (PAGE * 2) as u64);

        Ok(())
    }

    #[test]
    fn test_invalid_buffer_size() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");
        let mut pm = PageManager::open(&file_path, PAGE)?;

        let mut small_buf = vec![0u8; 100];
        assert!(pm.read_page(&mut small_buf).is_err());
        assert!(pm.write_page(&small_buf).is_err());

        Ok(())
    }

    #[test]
    fn test_write_on_read_only_handle_fails() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("meta.db");
        let mut pm = PageManager::open(&file_path, PAGE)?;
        pm.write_page(&vec![3u8; PAGE])?;

        pm.reopen_read_only()?;
        let result = pm.write_page(&vec![4u8; PAGE]);
        assert!(matches!(result, Err(StorageError::Io(_))));

        let mut buf = vec![0u8; PAGE];
        pm.read_page(&mut buf)?;
        assert!(buf.iter().all(|&b| b == 3));

        pm.reopen_read_write()?;
        pm.write_page(&vec![4u8; PAGE])?;
        pm.read_page(&mut buf)?;
        assert!(buf.iter().all(|&b| b == 4));

        Ok(())
    }

    #[test]
    fn test_open_in_missing_directory() -> Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("missing").join("meta.db");

        let result = PageManager::open(&file_path, PAGE);
        assert!(matches!(result, Err(StorageError::Io(_))));

        Ok(())
    }
}
