//! Store abstraction: the primitive surface consumed from the backing store.
//!
//! The trait contract lives in [`traits`]; [`memory`] provides the in-memory
//! reference backend. Remote backends implement [`KeyValueStore`] outside
//! this crate.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{Batch, BatchOp, KeyValueStore, StoreError};
