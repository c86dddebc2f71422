mod memory;
mod object_store;

pub use memory::MemoryObjectStore;
pub use object_store::{ObjectStore, StoreRecord};
