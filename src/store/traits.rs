//! Abstract store trait and batch primitives.
//!
//! [`KeyValueStore`] is the primitive surface the engine consumes: string
//! get/set, sets, sorted sets, glob key listing, and an all-or-nothing batch.
//! By using a trait, the in-memory backend can stand in for a remote store
//! in tests and embedded use.

use std::collections::BTreeSet;

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Generic backend failure (poisoned lock, protocol error, ...).
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The connection to the backing store failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backend refused to apply a batch. Nothing from the batch is
    /// visible.
    #[error("Batch rejected: {0}")]
    BatchRejected(String),
}

/// One queued mutation inside a [`Batch`].
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOp {
    /// `SET key value`
    Set {
        key: String,
        value: Vec<u8>,
    },
    /// `DEL key...`
    Delete {
        keys: Vec<String>,
    },
    /// `SADD key member...`
    SetAdd {
        key: String,
        members: Vec<String>,
    },
    /// `SREM key member...`
    SetRemove {
        key: String,
        members: Vec<String>,
    },
    /// `ZADD key score member`
    SortedSetAdd {
        key: String,
        member: String,
        score: f64,
    },
    /// `ZREM key member`
    SortedSetRemove {
        key: String,
        member: String,
    },
}

/// A queue of mutations applied as one indivisible unit.
///
/// This is the engine's only consistency mechanism: every state-changing
/// operation against one entity is expressed as a single batch, so readers
/// never observe an entity half-written or half-deleted.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<BatchOp>,
}

impl Batch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Queue `SET key value`.
    pub fn set(&mut self, key: String, value: Vec<u8>) {
        self.ops.push(BatchOp::Set { key, value });
    }

    /// Queue `DEL keys...`.
    pub fn delete(&mut self, keys: Vec<String>) {
        if !keys.is_empty() {
            self.ops.push(BatchOp::Delete { keys });
        }
    }

    /// Queue `SADD key members...`.
    pub fn set_add(&mut self, key: String, members: Vec<String>) {
        if !members.is_empty() {
            self.ops.push(BatchOp::SetAdd { key, members });
        }
    }

    /// Queue `SREM key members...`.
    pub fn set_remove(&mut self, key: String, members: Vec<String>) {
        if !members.is_empty() {
            self.ops.push(BatchOp::SetRemove { key, members });
        }
    }

    /// Queue `ZADD key score member`.
    pub fn sorted_set_add(&mut self, key: String, member: String, score: f64) {
        self.ops.push(BatchOp::SortedSetAdd { key, member, score });
    }

    /// Queue `ZREM key member`.
    pub fn sorted_set_remove(&mut self, key: String, member: String) {
        self.ops.push(BatchOp::SortedSetRemove { key, member });
    }

    /// Submit the queued operations to the store as one unit.
    ///
    /// An empty batch is a no-op and never reaches the store.
    ///
    /// # Errors
    ///
    /// Propagates the store's failure; per the [`KeyValueStore::apply_batch`]
    /// contract, a failed batch leaves no partial effect behind.
    pub fn execute(self, store: &dyn KeyValueStore) -> Result<(), StoreError> {
        if self.ops.is_empty() {
            return Ok(());
        }
        store.apply_batch(&self.ops)
    }
}

/// The primitive operations the engine needs from a backing store.
///
/// # Atomicity
///
/// Each method is a single store command and must be atomic on its own.
/// `apply_batch` must apply every queued op or none of them, with no partial
/// state visible to concurrent readers. A backend that cannot honor this
/// weakens every consistency claim the entity engine makes — do not silently
/// substitute best-effort batching.
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    /// `GET key` — `Ok(None)` for an absent key.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// `SET key value`
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// `DEL key...` — absent keys are ignored.
    fn delete(&self, keys: &[String]) -> Result<(), StoreError>;

    /// `EXISTS key` — true for any key type (string, set, sorted set).
    fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// `KEYS pattern` — glob matching, `*` is the only wildcard.
    fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// `SADD key member...` — returns how many members were newly added.
    fn set_add(&self, key: &str, members: &[String]) -> Result<u64, StoreError>;

    /// `SREM key member...`
    fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError>;

    /// `SMEMBERS key` — empty set for an absent key.
    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError>;

    /// `SINTER key...` — members present in every listed set.
    fn set_intersect(&self, keys: &[String]) -> Result<BTreeSet<String>, StoreError>;

    /// `ZADD key score member` — upserts the member's score.
    fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError>;

    /// `ZREM key member`
    fn sorted_set_remove(&self, key: &str, member: &str) -> Result<(), StoreError>;

    /// `ZREMRANGEBYSCORE key min max` — drops every member with
    /// `min <= score <= max`.
    fn sorted_set_remove_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<(), StoreError>;

    /// `ZRANGEBYSCORE key min max` — members with `min <= score <= max`,
    /// ordered by score.
    fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError>;

    /// Apply a queued batch as one all-or-nothing unit.
    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), StoreError>;
}
