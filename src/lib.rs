//! # kvorm - object mapping over key-value stores
//!
//! kvorm gives application code a model-object interface — create, fetch by
//! id, update fields, delete, enumerate, tag-based lookup — on top of a store
//! that only offers primitive operations (string get/set, sets, sorted sets,
//! and an all-or-nothing batch).
//!
//! ## Core Concepts
//!
//! - **Entity**: one persisted object — id, field bag, optional expiration,
//!   optional tags
//! - **Manager**: the per-entity-type engine keeping fields, membership,
//!   tag indexes, and expiration mutually consistent
//! - **System**: a named backing store connection; every operation routes to
//!   exactly one system
//! - **ResultSet**: a lazy, memoizing view over a collection of ids
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kvorm::{Entity, Fields, ModelConfig, MemoryStore, SystemRegistry, TaggedManager};
//!
//! let registry = Arc::new(SystemRegistry::new(Arc::new(MemoryStore::new())));
//! let books = TaggedManager::new(ModelConfig::new("book"), registry);
//!
//! let mut book = Entity::new(Fields::new());
//! book.set("title", "Dive into Python");
//! book.tags.insert("compsci".to_string());
//! book.tags.insert("python".to_string());
//! books.save(&mut book, None)?;
//!
//! for hit in books.find(&["compsci", "python"], None)?.iter() {
//!     println!("{:?}", hit?.get("title"));
//! }
//! ```
//!
//! ## Consistency model
//!
//! Every state-changing operation on one entity is a single store batch;
//! that batch is the only consistency mechanism. There is no optimistic
//! locking or versioning: concurrent saves of the same id race at
//! last-write-wins granularity, and concurrent save+delete can interleave.
//! Callers needing strict per-entity serialization must add external
//! locking. Expiration is lazy: a passed deadline makes the entity invisible
//! immediately, while physical cleanup happens on the probabilistic sweep.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod entity;
pub mod error;
pub mod key;
pub mod manager;
pub mod results;
pub mod store;
pub mod system;
pub mod tagged;
pub mod value;

// Re-export primary types at crate root for convenience
pub use codec::{Codec, CodecError, JsonCodec};
pub use entity::{Entity, Expiry};
pub use error::{KvormError, KvormResult};
pub use key::KeyBuilder;
pub use manager::{Manager, ModelConfig, DEFAULT_ID_LENGTH, DEFAULT_NAMESPACE};
pub use results::{EntityLoader, ResultSet};
pub use store::{Batch, BatchOp, KeyValueStore, MemoryStore, StoreError};
pub use system::{SystemRegistry, DEFAULT_SYSTEM};
pub use tagged::{DerivedTagManager, TagPolicy, TaggedManager};
pub use value::{Fields, Value};
