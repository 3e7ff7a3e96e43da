//! In-memory store backend.
//!
//! Thread-safe reference implementation of [`KeyValueStore`], intended for
//! tests and embedded use. Batches run under a single write guard, so a
//! reader never observes a partially applied batch.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;

use regex::Regex;

use crate::store::traits::{BatchOp, KeyValueStore, StoreError};

fn lock_err(context: &'static str) -> StoreError {
    StoreError::Backend(format!("poisoned lock: {context}"))
}

/// Translate a glob pattern (`*` wildcard only) to an anchored regex.
fn glob_regex(pattern: &str) -> Result<Regex, StoreError> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    let mut first = true;
    for literal in pattern.split('*') {
        if !first {
            re.push_str(".*");
        }
        re.push_str(&regex::escape(literal));
        first = false;
    }
    re.push('$');
    Regex::new(&re).map_err(|e| StoreError::Backend(format!("bad key pattern {pattern:?}: {e}")))
}

#[derive(Debug, Default)]
struct State {
    strings: HashMap<String, Vec<u8>>,
    sets: HashMap<String, BTreeSet<String>>,
    // member -> score; the range query sorts on demand
    zsets: HashMap<String, BTreeMap<String, f64>>,
}

impl State {
    fn remove_key(&mut self, key: &str) {
        self.strings.remove(key);
        self.sets.remove(key);
        self.zsets.remove(key);
    }

    fn apply(&mut self, op: &BatchOp) {
        match op {
            BatchOp::Set { key, value } => {
                self.strings.insert(key.clone(), value.clone());
            }
            BatchOp::Delete { keys } => {
                for key in keys {
                    self.remove_key(key);
                }
            }
            BatchOp::SetAdd { key, members } => {
                let set = self.sets.entry(key.clone()).or_default();
                for member in members {
                    set.insert(member.clone());
                }
            }
            BatchOp::SetRemove { key, members } => {
                if let Some(set) = self.sets.get_mut(key) {
                    for member in members {
                        set.remove(member);
                    }
                    if set.is_empty() {
                        self.sets.remove(key);
                    }
                }
            }
            BatchOp::SortedSetAdd { key, member, score } => {
                self.zsets
                    .entry(key.clone())
                    .or_default()
                    .insert(member.clone(), *score);
            }
            BatchOp::SortedSetRemove { key, member } => {
                if let Some(zset) = self.zsets.get_mut(key) {
                    zset.remove(member);
                    if zset.is_empty() {
                        self.zsets.remove(key);
                    }
                }
            }
        }
    }
}

/// Thread-safe in-memory [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("get"))?;
        Ok(state.strings.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("set"))?;
        state.strings.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, keys: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("delete"))?;
        for key in keys {
            state.remove_key(key);
        }
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("exists"))?;
        Ok(state.strings.contains_key(key)
            || state.sets.contains_key(key)
            || state.zsets.contains_key(key))
    }

    fn keys_matching(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let re = glob_regex(pattern)?;
        let state = self.state.read().map_err(|_| lock_err("keys_matching"))?;
        let mut out: Vec<String> = state
            .strings
            .keys()
            .chain(state.sets.keys())
            .chain(state.zsets.keys())
            .filter(|k| re.is_match(k))
            .cloned()
            .collect();
        out.sort_unstable();
        out.dedup();
        Ok(out)
    }

    fn set_add(&self, key: &str, members: &[String]) -> Result<u64, StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("set_add"))?;
        let set = state.sets.entry(key.to_string()).or_default();
        let mut added = 0u64;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("set_remove"))?;
        state.apply(&BatchOp::SetRemove {
            key: key.to_string(),
            members: members.to_vec(),
        });
        Ok(())
    }

    fn set_members(&self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("set_members"))?;
        Ok(state.sets.get(key).cloned().unwrap_or_default())
    }

    fn set_intersect(&self, keys: &[String]) -> Result<BTreeSet<String>, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("set_intersect"))?;
        let mut iter = keys.iter();
        let Some(first) = iter.next() else {
            return Ok(BTreeSet::new());
        };
        let mut acc = state.sets.get(first).cloned().unwrap_or_default();
        for key in iter {
            match state.sets.get(key) {
                Some(set) => acc.retain(|m| set.contains(m)),
                None => return Ok(BTreeSet::new()),
            }
            if acc.is_empty() {
                break;
            }
        }
        Ok(acc)
    }

    fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| lock_err("sorted_set_add"))?;
        state
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    fn sorted_set_remove(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("sorted_set_remove"))?;
        state.apply(&BatchOp::SortedSetRemove {
            key: key.to_string(),
            member: member.to_string(),
        });
        Ok(())
    }

    fn sorted_set_remove_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("sorted_set_remove_by_score"))?;
        if let Some(zset) = state.zsets.get_mut(key) {
            zset.retain(|_, score| *score < min || *score > max);
            if zset.is_empty() {
                state.zsets.remove(key);
            }
        }
        Ok(())
    }

    fn sorted_set_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("sorted_set_range_by_score"))?;
        let Some(zset) = state.zsets.get(key) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<(&String, f64)> = zset
            .iter()
            .filter(|(_, score)| **score >= min && **score <= max)
            .map(|(member, score)| (member, *score))
            .collect();
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits.into_iter().map(|(member, _)| member.clone()).collect())
    }

    fn apply_batch(&self, ops: &[BatchOp]) -> Result<(), StoreError> {
        // One write guard for the whole batch: readers see all ops or none.
        let mut state = self.state.write().map_err(|_| lock_err("apply_batch"))?;
        for op in ops {
            state.apply(op);
        }
        Ok(())
    }
}
