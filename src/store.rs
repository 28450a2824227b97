//! Disk-backed metadata store holding a single page of fixed-size key/value
//! pairs.
//!
//! The page is fully cached in memory. Reads never touch the disk. Every
//! write re-encodes the whole page, writes it at offset 0 and syncs it before
//! the in-memory state changes, so memory always matches the last durable
//! page. One lock serializes every operation.

use crate::storage::{
    decode_page, encode_page, FreeSpace, PageLayout, PageManager, StorageError, StorageResult,
};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::iter;
use std::path::{Path, PathBuf};

pub struct MetadataStore {
    layout: PageLayout,
    path: PathBuf,
    // None once closed.
    state: Mutex<Option<StoreState>>,
}

struct StoreState {
    page_manager: PageManager,
    entries: HashMap<Vec<u8>, Vec<u8>>,
    free_space: FreeSpace,
    // Set when a durable write failed; the file may hold a torn page.
    poisoned: bool,
}

impl StoreState {
    fn usable(state: &mut Option<StoreState>) -> StorageResult<&mut StoreState> {
        match state {
            None => Err(StorageError::Closed),
            Some(s) if s.poisoned => Err(StorageError::Poisoned),
            Some(s) => Ok(s),
        }
    }

    fn persist(&mut self, page: &[u8]) -> StorageResult<()> {
        if let Err(e) = self.page_manager.write_page(page) {
            warn!(
                "Write to {:?} failed, refusing further operations: {}",
                self.page_manager.path(),
                e
            );
            self.poisoned = true;
            return Err(e);
        }
        Ok(())
    }

    fn encode_current(&self, layout: &PageLayout) -> StorageResult<Vec<u8>> {
        encode_page(
            layout,
            self.entries.len(),
            self.entries
                .iter()
                .map(|(k, v)| (k.as_slice(), v.as_slice())),
        )
    }
}

impl MetadataStore {
    /// Open the store at `path` with the default 4096/8/8 layout, creating
    /// the file if needed and recovering whatever page it holds.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::open_with_layout(path, PageLayout::default())
    }

    pub fn open_with_layout<P: AsRef<Path>>(path: P, layout: PageLayout) -> StorageResult<Self> {
        let path = path.as_ref();

        let mut page_manager = PageManager::open(path, layout.page_size())?;
        let mut buf = vec![0u8; layout.page_size()];
        page_manager.read_page(&mut buf)?;

        let entries = decode_page(&layout, &buf)?;
        let free_space = FreeSpace::for_entries(&layout, entries.len())?;
        info!(
            "Opened metadata store {:?}: {} entries, {} bytes free",
            path,
            entries.len(),
            free_space.remaining()
        );

        Ok(Self {
            layout,
            path: path.to_path_buf(),
            state: Mutex::new(Some(StoreState {
                page_manager,
                entries,
                free_space,
                poisoned: false,
            })),
        })
    }

    pub fn layout(&self) -> PageLayout {
        self.layout
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up `key`. A key of the wrong length is simply not found.
    pub fn get(&self, key: &[u8]) -> StorageResult<Option<Vec<u8>>> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;
        Ok(state.entries.get(key).cloned())
    }

    pub fn contains_key(&self, key: &[u8]) -> StorageResult<bool> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;
        Ok(state.entries.contains_key(key))
    }

    /// Insert or update `key`. Fails without touching memory or disk when
    /// the sizes are wrong or a new key does not fit.
    pub fn set(&self, key: &[u8], value: &[u8]) -> StorageResult<()> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;

        if key.len() != self.layout.key_size() {
            return Err(StorageError::InvalidArgument {
                what: "key",
                expected: self.layout.key_size(),
                actual: key.len(),
            });
        }
        if value.len() != self.layout.value_size() {
            return Err(StorageError::InvalidArgument {
                what: "value",
                expected: self.layout.value_size(),
                actual: value.len(),
            });
        }

        let is_new_key = !state.entries.contains_key(key);
        let required = state.free_space.required_for(is_new_key);
        state.free_space.check(required)?;

        let count = state.entries.len() + usize::from(is_new_key);
        let page = encode_page(
            &self.layout,
            count,
            state
                .entries
                .iter()
                .filter(|(k, _)| k.as_slice() != key)
                .map(|(k, v)| (k.as_slice(), v.as_slice()))
                .chain(iter::once((key, value))),
        )?;
        state.persist(&page)?;

        state.entries.insert(key.to_vec(), value.to_vec());
        state.free_space.reserve(required)?;
        debug!(
            "set {} key, {} entries, {} bytes free",
            if is_new_key { "new" } else { "existing" },
            state.entries.len(),
            state.free_space.remaining()
        );

        Ok(())
    }

    /// Remove `key`. Removing an absent key is a no-op.
    pub fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;

        if !state.entries.contains_key(key) {
            return Ok(());
        }

        let page = encode_page(
            &self.layout,
            state.entries.len() - 1,
            state
                .entries
                .iter()
                .filter(|(k, _)| k.as_slice() != key)
                .map(|(k, v)| (k.as_slice(), v.as_slice())),
        )?;
        state.persist(&page)?;

        state.entries.remove(key);
        state.free_space.release_entry();
        debug!(
            "delete, {} entries, {} bytes free",
            state.entries.len(),
            state.free_space.remaining()
        );

        Ok(())
    }

    pub fn free_size(&self) -> StorageResult<usize> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;
        Ok(state.free_space.remaining())
    }

    pub fn len(&self) -> StorageResult<usize> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;
        Ok(state.entries.len())
    }

    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Snapshot of every stored pair, in no particular order.
    pub fn entries(&self) -> StorageResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut guard = self.state.lock();
        let state = StoreState::usable(&mut guard)?;
        Ok(state
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().is_none()
    }

    /// Write the page one last time and release the file. The store is closed
    /// afterwards even if the final write fails.
    pub fn close(&self) -> StorageResult<()> {
        let mut guard = self.state.lock();
        let mut state = guard.take().ok_or(StorageError::Closed)?;

        let page = state.encode_current(&self.layout)?;
        state.page_manager.write_page(&page)?;
        state.page_manager.close()?;
        info!(
            "Closed metadata store {:?} with {} entries",
            self.path,
            state.entries.len()
        );

        Ok(())
    }
}
