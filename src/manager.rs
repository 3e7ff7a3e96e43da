//! Entity persistence engine.
//!
//! A [`Manager`] implements load/save/delete of a single entity type's
//! primitive fields plus its expiration timestamp, lazy expiration sweeping,
//! random-id reservation with collision retry, and full enumeration. It is
//! plain composition: a configuration value, a system registry, a codec, and
//! a key builder — no registration magic at type-declaration time.
//!
//! # Concurrency
//!
//! The engine holds no threads and implements no locking of its own. Every
//! state-changing call is one store batch, which is the only consistency
//! mechanism: concurrent saves of the same id race at last-write-wins
//! granularity, and a concurrent save and delete can interleave. Callers
//! needing strict per-entity serialization must add their own external
//! locking.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::codec::{Codec, JsonCodec};
use crate::entity::Entity;
use crate::error::{KvormError, KvormResult};
use crate::key::KeyBuilder;
use crate::results::{EntityLoader, ResultSet};
use crate::store::{Batch, KeyValueStore};
use crate::system::{SystemRegistry, DEFAULT_SYSTEM};
use crate::value::Fields;

/// Id length used when none is configured.
pub const DEFAULT_ID_LENGTH: usize = 16;

/// Key namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "kvorm";

const DEFAULT_SWEEP_RATE: f64 = 0.01;
const DEFAULT_MAX_ID_ATTEMPTS: u32 = 10;

const ID_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Per-entity-type configuration.
///
/// # Examples
///
/// ```
/// use kvorm::ModelConfig;
///
/// let config = ModelConfig::new("user")
///     .id_length(8)
///     .system("stats")
///     .sweep_rate(0.0);
/// assert_eq!(config.type_name(), "user");
/// ```
#[derive(Debug, Clone)]
pub struct ModelConfig {
    type_name: String,
    namespace: String,
    id_length: usize,
    system: String,
    sweep_rate: f64,
    seed: Option<u64>,
    max_id_attempts: u32,
}

impl ModelConfig {
    /// Configuration for an entity type with the given name. The name is the
    /// key-namespace segment all of this type's keys share.
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            id_length: DEFAULT_ID_LENGTH,
            system: DEFAULT_SYSTEM.to_string(),
            sweep_rate: DEFAULT_SWEEP_RATE,
            seed: None,
            max_id_attempts: DEFAULT_MAX_ID_ATTEMPTS,
        }
    }

    /// Key namespace prefix. Empty means no prefix segment.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Length of auto-reserved ids.
    #[must_use]
    pub fn id_length(mut self, id_length: usize) -> Self {
        self.id_length = id_length;
        self
    }

    /// Default system operations route to when none is passed per call.
    #[must_use]
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = system.into();
        self
    }

    /// Probability that a `get` first runs an expiration sweep. Zero
    /// disables the trigger, one makes every read sweep.
    #[must_use]
    pub fn sweep_rate(mut self, rate: f64) -> Self {
        self.sweep_rate = rate;
        self
    }

    /// Seeds the manager's RNG (id generation and sweep sampling) for
    /// deterministic tests.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Consecutive id collisions tolerated before reservation fails.
    #[must_use]
    pub const fn max_id_attempts(mut self, attempts: u32) -> Self {
        self.max_id_attempts = attempts;
        self
    }

    /// The entity-type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

/// Store expiration timestamps as fractional seconds since the epoch.
pub(crate) fn datetime_to_timestamp(dt: DateTime<Utc>) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let secs = dt.timestamp() as f64;
    secs + f64::from(dt.timestamp_subsec_micros()) / 1e6
}

pub(crate) fn timestamp_to_datetime(ts: f64) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_truncation)]
    let secs = ts.floor() as i64;
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let nanos = ((ts - secs as f64) * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999))
}

/// Persistence engine for one entity type.
pub struct Manager {
    config: ModelConfig,
    registry: Arc<SystemRegistry>,
    codec: Arc<dyn Codec>,
    keys: KeyBuilder,
    rng: Mutex<StdRng>,
}

impl Manager {
    /// Creates a manager with the JSON codec.
    #[must_use]
    pub fn new(config: ModelConfig, registry: Arc<SystemRegistry>) -> Self {
        Self::with_codec(config, registry, Arc::new(JsonCodec))
    }

    /// Creates a manager with a caller-supplied codec.
    #[must_use]
    pub fn with_codec(
        config: ModelConfig,
        registry: Arc<SystemRegistry>,
        codec: Arc<dyn Codec>,
    ) -> Self {
        let keys = KeyBuilder::new(config.namespace.clone(), config.type_name.clone());
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            registry,
            codec,
            keys,
            rng: Mutex::new(rng),
        }
    }

    /// This manager's configuration.
    #[must_use]
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub(crate) fn keys(&self) -> &KeyBuilder {
        &self.keys
    }

    pub(crate) fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Resolve the target store: per-call override, else the configured
    /// default system.
    pub(crate) fn resolve(&self, system: Option<&str>) -> KvormResult<Arc<dyn KeyValueStore>> {
        self.registry.resolve(system.unwrap_or(&self.config.system))
    }

    fn random_id(&self) -> String {
        // A poisoned RNG guard only means another thread panicked mid-draw;
        // the generator state is still usable.
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        (0..self.config.id_length)
            .map(|_| char::from(ID_ALPHABET[rng.gen_range(0..ID_ALPHABET.len())]))
            .collect()
    }

    fn should_sweep(&self) -> bool {
        let rate = self.config.sweep_rate;
        if rate <= 0.0 {
            return false;
        }
        if rate >= 1.0 {
            return true;
        }
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        rng.gen_bool(rate)
    }

    /// Reserves a fresh random id against the membership set.
    ///
    /// The collision check is the atomic `set_add` itself (a candidate that
    /// was already a member reports zero additions), so concurrent
    /// reservations from multiple callers are safe without a read-then-write.
    /// The winning `set_add` also creates the membership entry, so no
    /// separate existence write is needed on save.
    ///
    /// # Errors
    ///
    /// [`KvormError::IdReservationExhausted`] after the configured number of
    /// consecutive collisions.
    pub fn reserve_id(&self, store: &dyn KeyValueStore) -> KvormResult<String> {
        let all_key = self.keys.all();
        for attempt in 0..self.config.max_id_attempts {
            let candidate = self.random_id();
            if store.set_add(&all_key, std::slice::from_ref(&candidate))? != 0 {
                return Ok(candidate);
            }
            trace!(
                model = %self.config.type_name,
                attempt,
                "id reservation collision"
            );
        }
        Err(KvormError::IdReservationExhausted {
            type_name: self.config.type_name.clone(),
            attempts: self.config.max_id_attempts,
        })
    }

    /// Persists the entity's fields and expiration in one batch, reserving
    /// an id first if it has none. On return the entity's id is permanently
    /// set. An entity whose deadline was cleared has its stored expiration
    /// removed by the same batch.
    ///
    /// # Errors
    ///
    /// Id reservation exhaustion, unknown system, codec, and store failures
    /// all propagate.
    pub fn save(&self, entity: &mut Entity, system: Option<&str>) -> KvormResult<()> {
        let store = self.resolve(system)?;
        self.save_in(entity, store.as_ref()).map(|_| ())
    }

    /// Body of [`Manager::save`] against an already-resolved store. Returns
    /// the entity's id so tag-aware wrappers can index it.
    pub(crate) fn save_in(
        &self,
        entity: &mut Entity,
        store: &dyn KeyValueStore,
    ) -> KvormResult<String> {
        let id = match entity.id() {
            Some(id) => id.to_string(),
            None => {
                let id = self.reserve_id(store)?;
                entity.assign_id(id.clone());
                id
            }
        };

        let body = self.codec.encode(&entity.fields)?;

        let mut batch = Batch::new();
        batch.set_add(self.keys.all(), vec![id.clone()]);
        batch.set(self.keys.object(&id), body);
        if let Some(expire) = entity.expire() {
            let ts = datetime_to_timestamp(expire);
            batch.set(self.keys.object_expire(&id), ts.to_string().into_bytes());
            batch.sorted_set_add(self.keys.expire_index(), id.clone(), ts);
        } else {
            // A cleared deadline must not survive in storage, or the entity
            // would still vanish at the old instant.
            batch.delete(vec![self.keys.object_expire(&id)]);
            batch.sorted_set_remove(self.keys.expire_index(), id.clone());
        }
        batch.execute(store)?;
        Ok(id)
    }

    /// Fetches an entity by id.
    ///
    /// With the configured sweep probability, an expiration sweep runs first
    /// as a maintenance side effect. A missing object key and a stored
    /// expiration in the past both read as `Ok(None)`; the expired record is
    /// left in place for the sweep to reclaim.
    ///
    /// # Errors
    ///
    /// [`KvormError::CorruptRecord`] when stored bytes fail to decode —
    /// distinct from not-found.
    pub fn get(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        let store = self.resolve(system)?;
        self.get_in(id, store.as_ref())
    }

    pub(crate) fn get_in(
        &self,
        id: &str,
        store: &dyn KeyValueStore,
    ) -> KvormResult<Option<Entity>> {
        if self.should_sweep() {
            self.sweep_in(store)?;
        }

        let Some(body) = store.get(&self.keys.object(id))? else {
            return Ok(None);
        };

        let expire = match store.get(&self.keys.object_expire(id))? {
            Some(raw) => {
                let key = self.keys.object_expire(id);
                let text =
                    std::str::from_utf8(&raw).map_err(|e| KvormError::CorruptRecord {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                let ts: f64 = text.parse().map_err(|e: std::num::ParseFloatError| {
                    KvormError::CorruptRecord {
                        key: key.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Some(timestamp_to_datetime(ts).ok_or_else(|| KvormError::CorruptRecord {
                    key,
                    reason: format!("timestamp {ts} out of range"),
                })?)
            }
            None => None,
        };

        if let Some(expire) = expire {
            if expire < Utc::now() {
                // Logically absent; physical cleanup is the sweep's job.
                return Ok(None);
            }
        }

        let fields = self
            .codec
            .decode(&body)
            .map_err(|e| KvormError::CorruptRecord {
                key: self.keys.object(id),
                reason: e.to_string(),
            })?;

        let mut entity = Entity::with_id(id, fields);
        entity.restore_expire(expire);
        Ok(Some(entity))
    }

    /// Deletes an entity. A never-persisted entity (no id) is a no-op.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn delete(&self, entity: &Entity, system: Option<&str>) -> KvormResult<()> {
        match entity.id() {
            Some(id) => self.delete_by_id(id, system),
            None => Ok(()),
        }
    }

    /// Deletes by id: membership entry, expiration-index entry, object key,
    /// and every subordinate key — one batch.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn delete_by_id(&self, id: &str, system: Option<&str>) -> KvormResult<()> {
        let store = self.resolve(system)?;
        let mut batch = Batch::new();
        self.queue_delete(id, store.as_ref(), &mut batch)?;
        batch.execute(store.as_ref())?;
        Ok(())
    }

    /// Queues the full per-entity delete into an existing batch, so callers
    /// (tag engine, sweep) can compose it with their own ops atomically.
    pub(crate) fn queue_delete(
        &self,
        id: &str,
        store: &dyn KeyValueStore,
        batch: &mut Batch,
    ) -> KvormResult<()> {
        batch.set_remove(self.keys.all(), vec![id.to_string()]);
        batch.sorted_set_remove(self.keys.expire_index(), id.to_string());

        let mut doomed = vec![self.keys.object(id)];
        doomed.extend(store.keys_matching(&self.keys.object_subkeys(id))?);
        batch.delete(doomed);
        Ok(())
    }

    /// Physically removes every entity whose expiration has passed,
    /// pre-epoch deadlines included.
    ///
    /// All removals for one invocation go into a single batch, so a sweep
    /// cannot be observed half-applied. Returns how many entities were
    /// reaped.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn sweep(&self, system: Option<&str>) -> KvormResult<usize> {
        let store = self.resolve(system)?;
        self.sweep_in(store.as_ref())
    }

    pub(crate) fn sweep_in(&self, store: &dyn KeyValueStore) -> KvormResult<usize> {
        let now = datetime_to_timestamp(Utc::now());
        let doomed = store.sorted_set_range_by_score(&self.keys.expire_index(), f64::MIN, now)?;
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut batch = Batch::new();
        for id in &doomed {
            self.queue_delete(id, store, &mut batch)?;
        }
        batch.execute(store)?;

        debug!(
            model = %self.config.type_name,
            reaped = doomed.len(),
            "expiration sweep"
        );
        Ok(doomed.len())
    }

    /// Enumerates all live ids of this type.
    pub(crate) fn all_ids(&self, store: &dyn KeyValueStore) -> KvormResult<Vec<String>> {
        Ok(store.set_members(&self.keys.all())?.into_iter().collect())
    }

    /// All entities of this type as a lazily-resolving [`ResultSet`].
    /// Ids that expire or vanish between enumeration and access are skipped.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn all(&self, system: Option<&str>) -> KvormResult<ResultSet<'_>> {
        let store = self.resolve(system)?;
        let ids = self.all_ids(store.as_ref())?;
        Ok(ResultSet::new(self, system.map(str::to_string), ids))
    }

    /// Creates, saves, and returns a fresh entity in one call.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Manager::save`].
    pub fn create(&self, fields: Fields, system: Option<&str>) -> KvormResult<Entity> {
        let mut entity = Entity::new(fields);
        self.save(&mut entity, system)?;
        Ok(entity)
    }

    /// Deletes every key of this entity type. Test and teardown utility.
    ///
    /// # Errors
    ///
    /// Unknown system and store failures propagate.
    pub fn full_cleanup(&self, system: Option<&str>) -> KvormResult<()> {
        let store = self.resolve(system)?;
        let keys = store.keys_matching(&self.keys.wildcard())?;
        if !keys.is_empty() {
            store.delete(&keys)?;
        }
        Ok(())
    }
}

impl EntityLoader for Manager {
    fn load_entity(&self, id: &str, system: Option<&str>) -> KvormResult<Option<Entity>> {
        self.get(id, system)
    }
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::value::Value;
    use chrono::Duration;

    fn registry() -> Arc<SystemRegistry> {
        Arc::new(SystemRegistry::new(Arc::new(MemoryStore::new())))
    }

    fn manager(registry: &Arc<SystemRegistry>) -> Manager {
        // Sweeps are triggered explicitly in these tests.
        Manager::new(
            ModelConfig::new("user").sweep_rate(0.0).seed(7),
            registry.clone(),
        )
    }

    fn john() -> Fields {
        let mut f = Fields::new();
        f.insert("name".to_string(), Value::from("John Doe"));
        f.insert("age".to_string(), Value::from(30));
        f
    }

    #[test]
    fn test_timestamp_round_trip() {
        let now = Utc::now();
        let back = timestamp_to_datetime(datetime_to_timestamp(now)).unwrap();
        // micros survive, sub-micro precision does not
        assert!((back - now).num_microseconds().unwrap().abs() <= 1);
    }

    #[test]
    fn test_save_assigns_id_and_round_trips() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut user = Entity::new(john());
        assert!(user.id().is_none());
        mgr.save(&mut user, None).unwrap();

        let id = user.id().unwrap().to_string();
        assert_eq!(id.len(), DEFAULT_ID_LENGTH);

        let loaded = mgr.get(&id, None).unwrap().unwrap();
        assert_eq!(loaded.fields, user.fields);
        assert!(loaded.expire().is_none());
    }

    #[test]
    fn test_get_missing_is_none_not_error() {
        let registry = registry();
        let mgr = manager(&registry);
        assert_eq!(mgr.get("nope", None).unwrap(), None);
    }

    #[test]
    fn test_unknown_system_propagates() {
        let registry = registry();
        let mgr = manager(&registry);
        let err = mgr.get("1", Some("db9")).unwrap_err();
        assert!(err.is_unknown_system());
    }

    #[test]
    fn test_corrupt_record_is_distinct_from_not_found() {
        let registry = registry();
        let mgr = manager(&registry);
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        store
            .set("kvorm:user:object:bad", b"\x00garbage".to_vec())
            .unwrap();
        store
            .set_add("kvorm:user:__all__", &["bad".to_string()])
            .unwrap();

        let err = mgr.get("bad", None).unwrap_err();
        assert!(err.is_corrupt_record());
    }

    #[test]
    fn test_reserve_id_succeeds_when_one_slot_remains() {
        let registry = registry();
        let mgr = Manager::new(
            ModelConfig::new("user")
                .id_length(1)
                .max_id_attempts(1000)
                .sweep_rate(0.0),
            registry.clone(),
        );
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();

        // Occupy every single-character id except "Q".
        let taken: Vec<String> = ID_ALPHABET
            .iter()
            .map(|b| char::from(*b).to_string())
            .filter(|c| c != "Q")
            .collect();
        store.set_add("kvorm:user:__all__", &taken).unwrap();

        let id = mgr.reserve_id(store.as_ref()).unwrap();
        assert_eq!(id, "Q");
    }

    #[test]
    fn test_reserve_id_exhausts_when_space_is_full() {
        let registry = registry();
        let mgr = Manager::new(
            ModelConfig::new("user").id_length(1).max_id_attempts(10),
            registry.clone(),
        );
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();

        let taken: Vec<String> = ID_ALPHABET.iter().map(|b| char::from(*b).to_string()).collect();
        store.set_add("kvorm:user:__all__", &taken).unwrap();

        let err = mgr.reserve_id(store.as_ref()).unwrap_err();
        assert!(err.is_id_reservation_exhausted());
    }

    #[test]
    fn test_expired_entity_reads_as_absent_before_sweep() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut user = Entity::with_id("1234", john());
        user.set_expire(crate::entity::Expiry::At(Utc::now() - Duration::seconds(1)));
        mgr.save(&mut user, None).unwrap();

        // No sweep ran (rate 0), the bytes are still there, yet the read
        // reports absent.
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(store.exists("kvorm:user:object:1234").unwrap());
        assert_eq!(mgr.get("1234", None).unwrap(), None);
    }

    #[test]
    fn test_sweep_reclaims_expired_storage() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut expired = Entity::with_id("old", john());
        expired.set_expire(crate::entity::Expiry::At(Utc::now() - Duration::seconds(1)));
        mgr.save(&mut expired, None).unwrap();

        let mut live = Entity::with_id("new", john());
        live.set_expire(crate::entity::Expiry::In(Duration::hours(1)));
        mgr.save(&mut live, None).unwrap();

        assert_eq!(mgr.sweep(None).unwrap(), 1);

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(!store.exists("kvorm:user:object:old").unwrap());
        assert!(!store.exists("kvorm:user:object:old:expire").unwrap());
        assert!(!store.set_members("kvorm:user:__all__").unwrap().contains("old"));
        assert!(store.exists("kvorm:user:object:new").unwrap());

        // Nothing left to reap.
        assert_eq!(mgr.sweep(None).unwrap(), 0);
    }

    #[test]
    fn test_clearing_the_expiration_persists_on_resave() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut user = Entity::with_id("1234", john());
        user.set_expire(crate::entity::Expiry::At(Utc::now() - Duration::seconds(1)));
        mgr.save(&mut user, None).unwrap();
        assert_eq!(mgr.get("1234", None).unwrap(), None);

        user.clear_expire();
        mgr.save(&mut user, None).unwrap();

        // Visible again, no deadline left anywhere, nothing to reap.
        let loaded = mgr.get("1234", None).unwrap().unwrap();
        assert!(loaded.expire().is_none());

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(!store.exists("kvorm:user:object:1234:expire").unwrap());
        assert!(store
            .sorted_set_range_by_score("kvorm:user:__expire__", f64::MIN, f64::MAX)
            .unwrap()
            .is_empty());
        assert_eq!(mgr.sweep(None).unwrap(), 0);
    }

    #[test]
    fn test_sweep_reaps_pre_epoch_deadlines() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut relic = Entity::with_id("relic", john());
        let ancient = DateTime::from_timestamp(-1_000_000_000, 0).unwrap(); // 1938
        relic.set_expire(crate::entity::Expiry::At(ancient));
        mgr.save(&mut relic, None).unwrap();

        assert_eq!(mgr.sweep(None).unwrap(), 1);
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(!store.exists("kvorm:user:object:relic").unwrap());
    }

    #[test]
    fn test_get_with_full_sweep_rate_triggers_maintenance() {
        let registry = registry();
        let mgr = Manager::new(
            ModelConfig::new("user").sweep_rate(1.0),
            registry.clone(),
        );

        let mut expired = Entity::with_id("old", john());
        expired.set_expire(crate::entity::Expiry::At(Utc::now() - Duration::seconds(1)));
        mgr.save(&mut expired, None).unwrap();

        // The lookup misses, and as a side effect reclaims the storage.
        assert_eq!(mgr.get("someone-else", None).unwrap(), None);
        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(!store.exists("kvorm:user:object:old").unwrap());
    }

    #[test]
    fn test_delete_removes_membership_and_subkeys() {
        let registry = registry();
        let mgr = manager(&registry);

        let mut user = Entity::with_id("1234", john());
        user.set_expire(crate::entity::Expiry::In(Duration::hours(1)));
        mgr.save(&mut user, None).unwrap();

        mgr.delete(&user, None).unwrap();

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert_eq!(mgr.get("1234", None).unwrap(), None);
        assert!(!store.exists("kvorm:user:object:1234").unwrap());
        assert!(!store.exists("kvorm:user:object:1234:expire").unwrap());
        assert!(store.set_members("kvorm:user:__all__").unwrap().is_empty());
        assert!(store
            .sorted_set_range_by_score("kvorm:user:__expire__", 0.0, f64::MAX)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_unsaved_entity_is_noop() {
        let registry = registry();
        let mgr = manager(&registry);
        let ghost = Entity::new(john());
        mgr.delete(&ghost, None).unwrap();
    }

    #[test]
    fn test_create_and_enumerate() {
        let registry = registry();
        let mgr = manager(&registry);

        let a = mgr.create(john(), None).unwrap();
        let b = mgr.create(john(), None).unwrap();
        assert_ne!(a.id(), b.id());

        let all = mgr.all(None).unwrap();
        assert_eq!(all.len().unwrap(), 2);
    }

    #[test]
    fn test_full_cleanup_erases_the_type() {
        let registry = registry();
        let mgr = manager(&registry);

        mgr.create(john(), None).unwrap();
        mgr.full_cleanup(None).unwrap();

        let store = registry.resolve(DEFAULT_SYSTEM).unwrap();
        assert!(store.keys_matching("kvorm:user:*").unwrap().is_empty());
    }
}
