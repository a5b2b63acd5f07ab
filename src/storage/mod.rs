//! Storage layer for autotask - persistence plugins for resumable runs.
//!
//! The engine only depends on the `PersistencePlugin` trait. Two plugins ship
//! with the crate: a JSON file per task stream, and an in-memory store.

mod file;
mod memory;
mod traits;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;
pub use traits::{PersistencePlugin, StoredState};
