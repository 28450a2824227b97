pub mod storage;
pub mod store;

pub use storage::{PageLayout, StorageError, StorageResult};
pub use store::MetadataStore;
