//! Storage layer implementation for pagestore.
//!
//! The whole dataset lives in a single fixed-size page. Key components:
//!
//! - **PageLayout**: page size and the fixed key/value widths
//! - **Page codec**: `<count><key1><value1>...<keyN><valueN>` with a
//!   big-endian `u64` count, zero padded to the page size
//! - **FreeSpace**: running count of bytes left for new entries
//! - **PageManager**: reads the page and writes it back durably

pub mod disk;
pub mod error;
pub mod free_space;
pub mod page;

pub use disk::PageManager;
pub use error::{StorageError, StorageResult};
pub use free_space::FreeSpace;
pub use page::{
    decode_page, encode_page, PageLayout, COUNT_SIZE, FIXED_KEY_SIZE, FIXED_VAL_SIZE, PAGE_SIZE,
};
