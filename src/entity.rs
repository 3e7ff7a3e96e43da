//! Entities: the persisted model objects.
//!
//! An entity is an id, an ordered field bag, an optional expiration instant,
//! and (for tag-capable managers) a set of tags plus a shadow copy of the
//! tags as of the last successful save. The shadow copy exists purely so the
//! next save can compute the inverted-index delta.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::value::{Fields, Value};

/// An expiration deadline, absolute or relative to "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expire at an absolute instant.
    At(DateTime<Utc>),
    /// Expire after a duration from the moment it is applied.
    In(Duration),
}

impl Expiry {
    /// Expire after the given number of seconds.
    #[must_use]
    pub fn seconds(secs: i64) -> Self {
        Self::In(Duration::seconds(secs))
    }

    /// Resolve to an absolute instant, relative deadlines against `now`.
    #[must_use]
    pub fn resolve(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::At(at) => at,
            Self::In(delta) => now + delta,
        }
    }
}

/// One persisted object: id, fields, optional expiration, optional tags.
///
/// An entity with no id has never been persisted; the id is assigned on the
/// first save (explicitly via [`Entity::with_id`] or auto-reserved) and never
/// changes afterwards.
///
/// # Examples
///
/// ```
/// use kvorm::{Entity, Fields, Value};
///
/// let mut user = Entity::with_id("1234", Fields::new());
/// user.set("name", "John Doe");
/// user.set("age", 30);
///
/// assert_eq!(user.id(), Some("1234"));
/// assert_eq!(user.get("age"), Some(&Value::Int(30)));
///
/// user.unset("age");
/// assert_eq!(user.get("age"), None);
/// ```
#[derive(Debug, Clone)]
pub struct Entity {
    id: Option<String>,

    /// Named field values, encoded as one opaque blob on save.
    pub fields: Fields,

    expire: Option<DateTime<Utc>>,

    /// Tags currently attached. Only tag-aware managers persist these.
    pub tags: BTreeSet<String>,

    /// Tags as of the last successful save; the next save diffs against
    /// this to prune the inverted index.
    pub(crate) saved_tags: BTreeSet<String>,
}

impl Entity {
    /// Creates an unpersisted entity; an id is reserved on first save.
    #[must_use]
    pub fn new(fields: Fields) -> Self {
        Self {
            id: None,
            fields,
            expire: None,
            tags: BTreeSet::new(),
            saved_tags: BTreeSet::new(),
        }
    }

    /// Creates an entity with a caller-assigned id.
    #[must_use]
    pub fn with_id(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::new(fields)
        }
    }

    /// The id, or `None` if the entity was never persisted.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Binds a reserved id. Ids are immutable once set.
    pub(crate) fn assign_id(&mut self, id: String) {
        debug_assert!(self.id.is_none(), "entity id must never change");
        self.id = Some(id);
    }

    /// Sets a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Removes a field, returning its previous value if any.
    pub fn unset(&mut self, name: &str) -> Option<Value> {
        self.fields.remove(name)
    }

    /// Looks up a field value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The absolute expiration instant, if one is set.
    #[must_use]
    pub const fn expire(&self) -> Option<DateTime<Utc>> {
        self.expire
    }

    /// Sets the expiration deadline. Once the instant passes, the entity is
    /// logically absent to all readers even before a sweep reclaims it.
    pub fn set_expire(&mut self, expiry: Expiry) {
        self.expire = Some(expiry.resolve(Utc::now()));
    }

    /// Removes the expiration deadline.
    pub fn clear_expire(&mut self) {
        self.expire = None;
    }

    /// Restores the expiration read back from storage.
    pub(crate) fn restore_expire(&mut self, expire: Option<DateTime<Utc>>) {
        self.expire = expire;
    }

    /// Time to live, or `None` when the entity never expires.
    ///
    /// A deadline in the past yields zero, not a negative duration. Test for
    /// `is_none()`, not emptiness — `None` and zero mean different things
    /// here.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        let expire = self.expire?;
        let remaining = expire - Utc::now();
        Some(remaining.max(Duration::zero()))
    }
}

/// Entities are equal when their ids are equal, fields notwithstanding.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}
