//! Page layout and codec.
//!
//! A page is `count` (big-endian `u64`) followed by `count` densely packed
//! key/value pairs. The rest of the page is zero padding. Entry order on disk
//! carries no meaning.

use crate::storage::error::{StorageError, StorageResult};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

pub const PAGE_SIZE: usize = 4096;
pub const FIXED_KEY_SIZE: usize = 8;
pub const FIXED_VAL_SIZE: usize = 8;

/// Width of the entry count at offset 0.
pub const COUNT_SIZE: usize = 8;

/// Geometry of the single page. Writer and reader must agree on it.
///
/// Only built through `new` or `Default`, so every layout holds the header
/// plus at least one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLayout {
    page_size: usize,
    key_size: usize,
    value_size: usize,
}

impl Default for PageLayout {
    fn default() -> Self {
        PageLayout {
            page_size: PAGE_SIZE,
            key_size: FIXED_KEY_SIZE,
            value_size: FIXED_VAL_SIZE,
        }
    }
}

impl PageLayout {
    pub fn new(page_size: usize, key_size: usize, value_size: usize) -> StorageResult<Self> {
        if key_size == 0 || value_size == 0 {
            return Err(StorageError::InvalidLayout {
                reason: format!(
                    "key and value sizes must be non-zero (key {}, value {})",
                    key_size, value_size
                ),
            });
        }

        let entry_size =
            key_size
                .checked_add(value_size)
                .ok_or_else(|| StorageError::InvalidLayout {
                    reason: format!(
                        "entry size overflows (key {}, value {})",
                        key_size, value_size
                    ),
                })?;

        if page_size
            .checked_sub(COUNT_SIZE)
            .map_or(true, |usable| usable < entry_size)
        {
            return Err(StorageError::InvalidLayout {
                reason: format!(
                    "page size {} cannot hold the {}-byte header and one {}-byte entry",
                    page_size, COUNT_SIZE, entry_size
                ),
            });
        }

        Ok(Self {
            page_size,
            key_size,
            value_size,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    pub fn entry_size(&self) -> usize {
        self.key_size + self.value_size
    }

    /// Bytes available for entries in an empty page.
    pub fn usable_size(&self) -> usize {
        self.page_size - COUNT_SIZE
    }

    /// Maximum number of entries a page can hold.
    pub fn capacity(&self) -> usize {
        self.usable_size() / self.entry_size()
    }

    /// Bytes used by the header plus `count` entries, or `None` on overflow.
    fn used_size(&self, count: usize) -> Option<usize> {
        count
            .checked_mul(self.entry_size())
            .and_then(|n| n.checked_add(COUNT_SIZE))
    }
}

/// Serialize `entries` into a zero-filled buffer of exactly `page_size` bytes.
pub fn encode_page<'a, I>(layout: &PageLayout, count: usize, entries: I) -> StorageResult<Vec<u8>>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let required = layout.used_size(count).unwrap_or(usize::MAX);
    if required > layout.page_size {
        return Err(StorageError::OutOfSpace {
            required,
            available: layout.page_size,
        });
    }

    let mut buf = vec![0u8; layout.page_size];
    BigEndian::write_u64(&mut buf[..COUNT_SIZE], count as u64);

    let mut offset = COUNT_SIZE;
    let mut written = 0;
    for (key, value) in entries {
        if written == count {
            return Err(StorageError::InvalidArgument {
                what: "entry count",
                expected: count,
                actual: count + 1,
            });
        }
        if key.len() != layout.key_size {
            return Err(StorageError::InvalidArgument {
                what: "key",
                expected: layout.key_size,
                actual: key.len(),
            });
        }
        if value.len() != layout.value_size {
            return Err(StorageError::InvalidArgument {
                what: "value",
                expected: layout.value_size,
                actual: value.len(),
            });
        }

        buf[offset..offset + layout.key_size].copy_from_slice(key);
        offset += layout.key_size;
        buf[offset..offset + layout.value_size].copy_from_slice(value);
        offset += layout.value_size;
        written += 1;
    }

    if written != count {
        return Err(StorageError::InvalidArgument {
            what: "entry count",
            expected: count,
            actual: written,
        });
    }

    Ok(buf)
}

/// Rebuild the key/value map from a page buffer.
pub fn decode_page(layout: &PageLayout, data: &[u8]) -> StorageResult<HashMap<Vec<u8>, Vec<u8>>> {
    if data.len() != layout.page_size {
        return Err(StorageError::CorruptedPage {
            reason: format!(
                "page buffer is {} bytes, expected {}",
                data.len(),
                layout.page_size
            ),
        });
    }

    let raw_count = BigEndian::read_u64(&data[..COUNT_SIZE]);
    let count = usize::try_from(raw_count)
        .ok()
        .filter(|&n| n <= layout.capacity())
        .ok_or_else(|| StorageError::CorruptedPage {
            reason: format!(
                "entry count {} exceeds page capacity {}",
                raw_count,
                layout.capacity()
            ),
        })?;

    let mut entries = HashMap::with_capacity(count);
    let mut offset = COUNT_SIZE;
    for _ in 0..count {
        let key = data[offset..offset + layout.key_size].to_vec();
        offset += layout.key_size;
        let value = data[offset..offset + layout.value_size].to_vec();
        offset += layout.value_size;

        if entries.insert(key, value).is_some() {
            return Err(StorageError::CorruptedPage {
                reason: format!("duplicate key at offset {}", offset - layout.entry_size()),
            });
        }
    }

    Ok(entries)
}
