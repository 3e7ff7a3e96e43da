//! Lazily-materializing result sets.
//!
//! Enumeration and tag lookup return a [`ResultSet`]: an ordered view over a
//! collection of ids that resolves each id to an entity on demand. Ids that
//! resolve to nothing — reaped or expired between enumeration and access —
//! are silently skipped. Materialization is one-shot and memoized; iterating
//! again afterwards replays the cached list instead of re-querying the store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entity::Entity;
use crate::error::KvormResult;

/// Resolves an id to an entity. Implemented by every manager flavor so a
/// result set can defer lookups to whichever manager produced it.
pub trait EntityLoader: Send + Sync {
    /// Fetch one entity; `Ok(None)` when it is absent or expired.
    fn load_entity(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>>;
}

/// An ordered, cacheable view over a collection of entity ids.
pub struct ResultSet<'m> {
    loader: &'m dyn EntityLoader,
    system: Option<String>,
    ids: Vec<String>,
    cache: RwLock<Option<Vec<Entity>>>,
}

impl<'m> ResultSet<'m> {
    pub(crate) fn new(
        loader: &'m dyn EntityLoader,
        system: Option<String>,
        ids: Vec<String>,
    ) -> Self {
        Self {
            loader,
            system,
            ids,
            cache: RwLock::new(None),
        }
    }

    /// The raw ids this view was built from, unresolved.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    // The cache only ever holds `None` or a fully materialized snapshot, so
    // a guard poisoned by a panicking thread still holds usable data.
    fn cache_read(&self) -> RwLockReadGuard<'_, Option<Vec<Entity>>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn cache_write(&self) -> RwLockWriteGuard<'_, Option<Vec<Entity>>> {
        match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn resolve_all(&self) -> KvormResult<Vec<Entity>> {
        let mut out = Vec::with_capacity(self.ids.len());
        for id in &self.ids {
            if let Some(entity) = self.loader.load_entity(id, self.system.as_deref())? {
                out.push(entity);
            }
        }
        Ok(out)
    }

    /// Materializes the entities, memoized: the store is queried at most
    /// once, repeated calls return the cached list.
    ///
    /// # Errors
    ///
    /// Lookup failures propagate; a failed materialization leaves the cache
    /// unfilled so a later call can retry.
    pub fn entities(&self) -> KvormResult<Vec<Entity>> {
        if let Some(entities) = self.cache_read().as_ref() {
            return Ok(entities.clone());
        }

        let entities = self.resolve_all()?;

        // Two threads may have resolved concurrently; first writer wins so
        // every later reader sees one consistent snapshot.
        Ok(self.cache_write().get_or_insert(entities).clone())
    }

    /// Number of resolvable entities. Materializes (and memoizes) first.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResultSet::entities`].
    pub fn len(&self) -> KvormResult<usize> {
        Ok(self.entities()?.len())
    }

    /// True when no id resolves to a live entity.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ResultSet::entities`].
    pub fn is_empty(&self) -> KvormResult<bool> {
        Ok(self.entities()?.is_empty())
    }

    /// Iterates the view. Before materialization each id is resolved on
    /// demand; after [`ResultSet::entities`] has run, the cached list is
    /// replayed with no further store traffic.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        let cached = self.cache_read().as_ref().cloned();
        match cached {
            Some(entities) => Iter {
                inner: IterInner::Cached(entities.into_iter()),
            },
            None => Iter {
                inner: IterInner::Lazy { set: self, next: 0 },
            },
        }
    }
}

impl std::fmt::Debug for ResultSet<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("system", &self.system)
            .field("ids", &self.ids)
            .finish_non_exhaustive()
    }
}

enum IterInner<'a> {
    Cached(std::vec::IntoIter<Entity>),
    Lazy { set: &'a ResultSet<'a>, next: usize },
}

/// Iterator over a [`ResultSet`]. Yields `Err` once per failed lookup and
/// keeps going, mirroring how the lazy path touches the store one id at a
/// time.
pub struct Iter<'a> {
    inner: IterInner<'a>,
}

impl Iterator for Iter<'_> {
    type Item = KvormResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            IterInner::Cached(entities) => entities.next().map(Ok),
            IterInner::Lazy { set, next } => loop {
                let id = set.ids.get(*next)?;
                *next += 1;
                match set.loader.load_entity(id, set.system.as_deref()) {
                    Ok(Some(entity)) => return Some(Ok(entity)),
                    Ok(None) => {} // reaped between enumeration and access
                    Err(err) => return Some(Err(err)),
                }
            },
        }
    }
}
