//! Tag index engine and attribute-derived tagging.
//!
//! [`TaggedManager`] layers two indexes on top of the base persistence
//! engine: an inverted index (`tags:{tag}` → set of ids) and a forward index
//! (`object:{id}:tags` → set of tags). Both are reconciled incrementally on
//! every save by diffing against the entity's tag set as of its last save.
//! [`DerivedTagManager`] adds a policy that derives the tag set from the
//! entity's own fields.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::codec::Codec;
use crate::entity::Entity;
use crate::error::KvormResult;
use crate::manager::{Manager, ModelConfig};
use crate::results::{EntityLoader, ResultSet};
use crate::store::Batch;
use crate::system::SystemRegistry;
use crate::value::Fields;

/// Persistence engine with tag-based secondary indexing.
#[derive(Debug)]
pub struct TaggedManager {
    base: Manager,
}

impl TaggedManager {
    /// Creates a tag-aware manager with the JSON codec.
    #[must_use]
    pub fn new(config: ModelConfig, registry: Arc<SystemRegistry>) -> Self {
        Self {
            base: Manager::new(config, registry),
        }
    }

    /// Creates a tag-aware manager with a caller-supplied codec.
    #[must_use]
    pub fn with_codec(
        config: ModelConfig,
        registry: Arc<SystemRegistry>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        Self {
            base: Manager::with_codec(config, registry, codec),
        }
    }

    /// The underlying plain manager (sweep, cleanup, reservation).
    #[must_use]
    pub fn base(&self) -> &Manager {
        &self.base
    }

    /// Saves the entity, then reconciles both tag indexes in a second batch.
    ///
    /// The index delta is computed against the tag set remembered from this
    /// instance's last save (or from storage, for an instance returned by
    /// [`TaggedManager::get`]). A *fresh* `Entity::with_id` for an id that
    /// already carries tags has an empty shadow set, so stale inverted
    /// entries from the previous tag set would survive — load the entity
    /// first when updating tags. An entity with no current tags skips the
    /// tag batch entirely.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Manager::save`].
    pub fn save(&self, entity: &mut Entity, system: Option<&str>) -> KvormResult<()> {
        let store = self.base.resolve(system)?;
        let id = self.base.save_in(entity, store.as_ref())?;

        if entity.tags.is_empty() {
            return Ok(());
        }

        let keys = self.base.keys();
        let mut batch = Batch::new();
        batch.set_add(
            keys.object_tags(&id),
            entity.tags.iter().cloned().collect(),
        );
        for tag in &entity.tags {
            batch.set_add(keys.tag(tag), vec![id.clone()]);
        }
        for removed in entity.saved_tags.difference(&entity.tags) {
            batch.set_remove(keys.tag(removed), vec![id.clone()]);
            // Forward index mirrors the current tag set, so dropped tags
            // are pruned there as well.
            batch.set_remove(keys.object_tags(&id), vec![removed.clone()]);
        }
        batch.execute(store.as_ref())?;

        entity.saved_tags = entity.tags.clone();
        Ok(())
    }

    /// Fetches an entity and populates its tags from the forward index.
    ///
    /// The shadow tag set is initialized from the same read, so the next
    /// save diffs against what storage actually holds.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Manager::get`].
    pub fn get(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        let store = self.base.resolve(system)?;
        let Some(mut entity) = self.base.get_in(id, store.as_ref())? else {
            return Ok(None);
        };
        let tags = store.set_members(&self.base.keys().object_tags(id))?;
        entity.tags = tags.clone();
        entity.saved_tags = tags;
        Ok(Some(entity))
    }

    /// Deletes the entity and removes its id from every tag's inverted set,
    /// in one batch.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Manager::delete_by_id`].
    pub fn delete_by_id(&self, id: &str, system: Option<&str>) -> KvormResult<()> {
        let store = self.base.resolve(system)?;
        let keys = self.base.keys();

        let tags = store.set_members(&keys.object_tags(id))?;
        let mut batch = Batch::new();
        for tag in &tags {
            batch.set_remove(keys.tag(tag), vec![id.to_string()]);
        }
        self.base.queue_delete(id, store.as_ref(), &mut batch)?;
        batch.execute(store.as_ref())?;
        Ok(())
    }

    /// Deletes an entity. A never-persisted entity (no id) is a no-op.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::delete_by_id`].
    pub fn delete(&self, entity: &Entity, system: Option<&str>) -> KvormResult<()> {
        match entity.id() {
            Some(id) => self.delete_by_id(id, system),
            None => Ok(()),
        }
    }

    /// Ids carrying *all* of the given tags (intersection semantics).
    /// Zero tags yields the empty set.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn find_ids<S: AsRef<str>>(
        &self,
        tags: &[S],
        system: Option<&str>,
    ) -> KvormResult<BTreeSet<String>> {
        if tags.is_empty() {
            return Ok(BTreeSet::new());
        }
        let store = self.base.resolve(system)?;
        let keys: Vec<String> = tags
            .iter()
            .map(|tag| self.base.keys().tag(tag.as_ref()))
            .collect();
        Ok(store.set_intersect(&keys)?)
    }

    /// Entities carrying *all* of the given tags, as a lazy [`ResultSet`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::find_ids`].
    pub fn find<S: AsRef<str>>(
        &self,
        tags: &[S],
        system: Option<&str>,
    ) -> KvormResult<ResultSet<'_>> {
        let ids = self.find_ids(tags, system)?;
        Ok(ResultSet::new(
            self,
            system.map(str::to_string),
            ids.into_iter().collect(),
        ))
    }

    /// All entities of this type, tags populated.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn all(&self, system: Option<&str>) -> KvormResult<ResultSet<'_>> {
        let store = self.base.resolve(system)?;
        let ids = self.base.all_ids(store.as_ref())?;
        Ok(ResultSet::new(self, system.map(str::to_string), ids))
    }
}

impl EntityLoader for TaggedManager {
    fn load_entity(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        self.get(id, system)
    }
}

/// Derives tags from scalar fields: each field `(name, value)` not in the
/// exclusion set becomes the tag `"name:value"`.
///
/// The exclusion set is configured once per entity type. Keep large or
/// high-cardinality fields (free text, secrets, unique identifiers) out of
/// the index to bound its fan-out.
///
/// # Examples
///
/// ```
/// use kvorm::{Fields, TagPolicy, Value};
///
/// let mut fields = Fields::new();
/// fields.insert("name".to_string(), Value::from("John Doe"));
/// fields.insert("age".to_string(), Value::from(30));
///
/// let policy = TagPolicy::new(["name"]);
/// let tags = policy.tags_for(&fields);
/// assert!(tags.contains("age:30"));
/// assert!(!tags.iter().any(|t| t.starts_with("name:")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TagPolicy {
    exclude: BTreeSet<String>,
}

impl TagPolicy {
    /// Policy excluding the given field names from tag derivation.
    #[must_use]
    pub fn new<I, S>(exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    /// The full derived tag set for a field mapping. Deterministic; order
    /// is irrelevant because tags form a set.
    #[must_use]
    pub fn tags_for(&self, fields: &Fields) -> BTreeSet<String> {
        fields
            .iter()
            .filter(|(name, _)| !self.exclude.contains(*name))
            .map(|(name, value)| format!("{name}:{value}"))
            .collect()
    }
}

/// Tag-aware manager whose tag set is derived from entity fields.
///
/// The derived set is recomputed from the current fields on every save, so
/// any `set`/`unset` since the last save is reflected in the index without
/// mutation hooks on the entity.
#[derive(Debug)]
pub struct DerivedTagManager {
    inner: TaggedManager,
    policy: TagPolicy,
}

impl DerivedTagManager {
    /// Creates a derived-tag manager with the JSON codec.
    #[must_use]
    pub fn new(config: ModelConfig, registry: Arc<SystemRegistry>, policy: TagPolicy) -> Self {
        Self {
            inner: TaggedManager::new(config, registry),
            policy,
        }
    }

    /// The derivation policy.
    #[must_use]
    pub fn policy(&self) -> &TagPolicy {
        &self.policy
    }

    /// The underlying tag-aware manager.
    #[must_use]
    pub fn tagged(&self) -> &TaggedManager {
        &self.inner
    }

    /// Constructs an unpersisted entity with its tags seeded from the given
    /// fields.
    #[must_use]
    pub fn entity(&self, fields: Fields) -> Entity {
        let mut entity = Entity::new(fields);
        entity.tags = self.policy.tags_for(&entity.fields);
        entity
    }

    /// Recomputes the derived tag set from the current fields, then saves.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::save`].
    pub fn save(&self, entity: &mut Entity, system: Option<&str>) -> KvormResult<()> {
        entity.tags = self.policy.tags_for(&entity.fields);
        self.inner.save(entity, system)
    }

    /// Fetches an entity with its tags.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::get`].
    pub fn get(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        self.inner.get(id, system)
    }

    /// Deletes an entity and its index entries.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::delete`].
    pub fn delete(&self, entity: &Entity, system: Option<&str>) -> KvormResult<()> {
        self.inner.delete(entity, system)
    }

    /// Entities whose derived tags match *all* of the given attributes.
    ///
    /// Attributes in the exclusion set derive no tags, so a query on only
    /// excluded attributes matches nothing.
    ///
    /// # Errors
    ///
    /// Same conditions as [`TaggedManager::find`].
    pub fn find_by_attrs(&self, attrs: &Fields, system: Option<&str>) -> KvormResult<ResultSet<'_>> {
        let tags: Vec<String> = self.policy.tags_for(attrs).into_iter().collect();
        let ids = self.inner.find_ids(&tags, system)?;
        Ok(ResultSet::new(
            self,
            system.map(str::to_string),
            ids.into_iter().collect(),
        ))
    }
}

impl EntityLoader for DerivedTagManager {
    fn load_entity(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        self.get(id, system)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::system::DEFAULT_SYSTEM;
    use crate::value::Value;

    fn registry() -> Arc<SystemRegistry> {
        Arc::new(SystemRegistry::new(Arc::new(MemoryStore::new())))
    }

    fn books(registry: &Arc<SystemRegistry>) -> TaggedManager {
        TaggedManager::new(ModelConfig::new("book").sweep_rate(0.0), registry.clone())
    }

    fn dive_into_python() -> Entity {
        let mut fields = Fields::new();
        fields.insert("title".to_string(), Value::from("Dive into Python"));
        let mut book = Entity::with_id("1234", fields);
        book.tags.insert("compsci".to_string());
        book.tags.insert("python".to_string());
        book
    }

    #[test]
    fn test_save_indexes_every_tag() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(store.set_members("kvorm:book:tags:compsci").unwrap().contains("1234"));
        assert!(store.set_members("kvorm:book:tags:python").unwrap().contains("1234"));
        assert_eq!(
            store.set_members("kvorm:book:object:1234:tags").unwrap().len(),
            2
        );
    }

    #[test]
    fn test_get_restores_tags_and_shadow() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();

        let loaded = mgr.get("1234", None).unwrap().unwrap();
        assert_eq!(loaded.tags, book.tags);
        assert_eq!(loaded.saved_tags, book.tags);
    }

    #[test]
    fn test_find_uses_intersection_semantics() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();

        assert_eq!(mgr.find_ids(&["compsci"], None).unwrap().len(), 1);
        assert_eq!(mgr.find_ids(&["compsci", "python"], None).unwrap().len(), 1);
        assert!(mgr.find_ids(&["python", "java"], None).unwrap().is_empty());
        assert!(mgr.find_ids::<&str>(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_resave_with_same_tags_is_idempotent() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();
        mgr.save(&mut book, None).unwrap();

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert_eq!(store.set_members("kvorm:book:tags:compsci").unwrap().len(), 1);
        assert_eq!(store.set_members("kvorm:book:tags:python").unwrap().len(), 1);
    }

    #[test]
    fn test_dropping_a_tag_prunes_both_indexes() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();

        book.tags.remove("python");
        mgr.save(&mut book, None).unwrap();

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(store.set_members("kvorm:book:tags:python").unwrap().is_empty());
        assert!(store.set_members("kvorm:book:tags:compsci").unwrap().contains("1234"));
        let forward = store.set_members("kvorm:book:object:1234:tags").unwrap();
        assert_eq!(forward.into_iter().collect::<Vec<_>>(), vec!["compsci".to_string()]);
    }

    #[test]
    fn test_loaded_instance_diffs_against_stored_tags() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();

        // Fresh load, then drop a tag: the shadow came from storage, so the
        // inverted index is still pruned correctly.
        let mut loaded = mgr.get("1234", None).unwrap().unwrap();
        loaded.tags.remove("compsci");
        mgr.save(&mut loaded, None).unwrap();

        assert!(mgr.find_ids(&["compsci"], None).unwrap().is_empty());
        assert!(mgr.find_ids(&["python"], None).unwrap().contains("1234"));
    }

    #[test]
    fn test_delete_clears_inverted_index() {
        let registry = registry();
        let mgr = books(&registry);

        let mut book = dive_into_python();
        mgr.save(&mut book, None).unwrap();
        mgr.delete(&book, None).unwrap();

        assert!(mgr.get("1234", None).unwrap().is_none());
        assert!(mgr.find_ids(&["compsci"], None).unwrap().is_empty());
        assert!(mgr.find_ids(&["python"], None).unwrap().is_empty());

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(!store.exists("kvorm:book:object:1234").unwrap());
        assert!(!store.exists("kvorm:book:object:1234:tags").unwrap());
    }

    #[test]
    fn test_tag_policy_derivation() {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from("John Doe"));
        fields.insert("age".to_string(), Value::from(30));
        fields.insert("active".to_string(), Value::from(true));

        let policy = TagPolicy::new(["name"]);
        let tags = policy.tags_for(&fields);
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("age:30"));
        assert!(tags.contains("active:true"));
    }

    #[test]
    fn test_derived_manager_recomputes_on_save() {
        let registry = registry();
        let mgr = DerivedTagManager::new(
            ModelConfig::new("tagged_user").sweep_rate(0.0),
            registry.clone(),
            TagPolicy::new(["name"]),
        );

        let mut fields = Fields::new();
        fields.insert("name".to_string(), Value::from("John Doe"));
        fields.insert("age".to_string(), Value::from(30));
        let mut user = mgr.entity(fields);
        assert!(user.tags.contains("age:30"));

        mgr.save(&mut user, None).unwrap();
        let id = user.id().unwrap().to_string();

        // Mutate fields; the save must retag.
        user.set("age", 31);
        mgr.save(&mut user, None).unwrap();

        let mut by_age = Fields::new();
        by_age.insert("age".to_string(), Value::from(31));
        assert_eq!(mgr.find_by_attrs(&by_age, None).unwrap().ids(), &[id.clone()]);

        let mut by_old_age = Fields::new();
        by_old_age.insert("age".to_string(), Value::from(30));
        assert!(mgr.find_by_attrs(&by_old_age, None).unwrap().is_empty().unwrap());

        // Excluded attributes derive no tags, so they match nothing.
        let mut by_name = Fields::new();
        by_name.insert("name".to_string(), Value::from("John Doe"));
        assert!(mgr.find_by_attrs(&by_name, None).unwrap().is_empty().unwrap());
    }
}
