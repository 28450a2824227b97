//! Free space accounting for the single page.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::page::PageLayout;

/// Bytes of page capacity not yet used by entries.
///
/// Always equals `page_size - 8 - count * entry_size` for the entry count the
/// owner is tracking. It is adjusted incrementally, one entry at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace {
    remaining: usize,
    entry_size: usize,
}

impl FreeSpace {
    /// Free space of a page holding `count` entries.
    pub fn for_entries(layout: &PageLayout, count: usize) -> StorageResult<Self> {
        let used = count
            .checked_mul(layout.entry_size())
            .filter(|&n| n <= layout.usable_size())
            .ok_or_else(|| StorageError::CorruptedPage {
                reason: format!(
                    "{} entries do not fit in a {}-byte page",
                    count,
                    layout.page_size()
                ),
            })?;

        Ok(Self {
            remaining: layout.usable_size() - used,
            entry_size: layout.entry_size(),
        })
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Space a write needs: nothing for an update, one entry for a new key.
    pub fn required_for(&self, is_new_key: bool) -> usize {
        if is_new_key {
            self.entry_size
        } else {
            0
        }
    }

    pub fn check(&self, required: usize) -> StorageResult<()> {
        if required > self.remaining {
            return Err(StorageError::OutOfSpace {
                required,
                available: self.remaining,
            });
        }
        Ok(())
    }

    pub fn reserve(&mut self, required: usize) -> StorageResult<()> {
        self.check(required)?;
        self.remaining -= required;
        Ok(())
    }

    /// Give back the space of one removed entry.
    pub fn release_entry(&mut self) {
        self.remaining += self.entry_size;
    }
}
