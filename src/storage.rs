pub mod adapter;
pub mod disk;
pub mod engine;
pub mod memory;
pub mod record;

pub use adapter::StatusStoreAdapter;
pub use disk::OnDiskStatusStore;
pub use engine::{StatusStore, StatusStoreError};
pub use memory::InMemoryStatusStore;
pub use record::{PersistedRecord, RECORD_FORMAT_VERSION, RecordError, StatusRecord};
