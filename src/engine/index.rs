// index.rs: external key <-> dense internal index arena.
//
// Dense indices [0, n) are what the linear solve walks. Removal shifts every
// index above the removed slot down by one and rewrites the internal
// adjacency, O(n + L). Tens of species make that irrelevant.

use super::SpeciesKey;
use crate::core::error::{ModelError, ModelResult};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug)]
pub struct SpeciesIndex<K> {
    extern_to_intern: HashMap<K, usize>,
    intern_to_extern: Vec<K>,
    /// Keyed by external id, survives renumbering.
    extern_adjacency: HashMap<K, HashSet<K>>,
    /// Keyed by dense index, rewritten on every removal.
    adjacency: Vec<HashSet<usize>>,
}

impl<K: SpeciesKey> Default for SpeciesIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: SpeciesKey> SpeciesIndex<K> {
    pub fn new() -> Self {
        SpeciesIndex {
            extern_to_intern: HashMap::new(),
            intern_to_extern: Vec::new(),
            extern_adjacency: HashMap::new(),
            adjacency: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.intern_to_extern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intern_to_extern.is_empty()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.extern_to_intern.contains_key(key)
    }

    pub fn index_of(&self, key: &K) -> Option<usize> {
        self.extern_to_intern.get(key).copied()
    }

    pub fn key_at(&self, idx: usize) -> Option<&K> {
        self.intern_to_extern.get(idx)
    }

    /// Keys in dense index order.
    pub fn keys(&self) -> &[K] {
        &self.intern_to_extern
    }

    /// Appends `key` at the next dense index and returns it.
    pub fn insert(&mut self, key: K) -> ModelResult<usize> {
        if self.extern_to_intern.contains_key(&key) {
            return Err(ModelError::duplicate_species(&key));
        }
        let idx = self.intern_to_extern.len();
        self.extern_to_intern.insert(key.clone(), idx);
        self.extern_adjacency.insert(key.clone(), HashSet::new());
        self.intern_to_extern.push(key);
        self.adjacency.push(HashSet::new());
        Ok(idx)
    }

    /// Removes `key` along with every interaction touching it and re-packs
    /// the indices above it. Returns the slot it used to occupy.
    pub fn remove(&mut self, key: &K) -> ModelResult<usize> {
        let removed = self
            .extern_to_intern
            .remove(key)
            .ok_or_else(|| ModelError::unknown_species(key))?;

        self.extern_adjacency.remove(key);
        for consumers in self.extern_adjacency.values_mut() {
            consumers.remove(key);
        }

        self.intern_to_extern.remove(removed);
        for (idx, k) in self.intern_to_extern.iter().enumerate().skip(removed) {
            if let Some(slot) = self.extern_to_intern.get_mut(k) {
                *slot = idx;
            }
        }

        self.adjacency.remove(removed);
        for consumers in self.adjacency.iter_mut() {
            *consumers = consumers
                .iter()
                .filter(|&&j| j != removed)
                .map(|&j| if j > removed { j - 1 } else { j })
                .collect();
        }
        Ok(removed)
    }

    pub fn add_interaction(&mut self, resource: &K, consumer: &K) -> ModelResult<()> {
        let (res, con) = self.live_pair(resource, consumer)?;
        let consumers = self
            .extern_adjacency
            .get_mut(resource)
            .ok_or_else(|| ModelError::unknown_species(resource))?;
        if !consumers.insert(consumer.clone()) {
            return Err(ModelError::duplicate_interaction(resource, consumer));
        }
        self.adjacency[res].insert(con);
        Ok(())
    }

    pub fn remove_interaction(&mut self, resource: &K, consumer: &K) -> ModelResult<()> {
        let (res, con) = self.live_pair(resource, consumer)?;
        let consumers = self
            .extern_adjacency
            .get_mut(resource)
            .ok_or_else(|| ModelError::unknown_species(resource))?;
        if !consumers.remove(consumer) {
            return Err(ModelError::unknown_interaction(resource, consumer));
        }
        self.adjacency[res].remove(&con);
        Ok(())
    }

    pub fn has_interaction(&self, resource: &K, consumer: &K) -> bool {
        self.extern_adjacency
            .get(resource)
            .is_some_and(|consumers| consumers.contains(consumer))
    }

    /// Consumers of `resource` from the engine's own interaction set.
    pub fn consumers_of(&self, resource: &K) -> Vec<K> {
        self.extern_adjacency
            .get(resource)
            .map(|consumers| consumers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Resources eaten by `consumer`, i.e. the reverse adjacency.
    pub fn resources_of(&self, consumer: &K) -> Vec<K> {
        self.extern_adjacency
            .iter()
            .filter(|(_, consumers)| consumers.contains(consumer))
            .map(|(res, _)| res.clone())
            .collect()
    }

    /// Dense-index consumers of the species at `idx`.
    pub fn internal_consumers(&self, idx: usize) -> Option<&HashSet<usize>> {
        self.adjacency.get(idx)
    }

    fn live_pair(&self, resource: &K, consumer: &K) -> ModelResult<(usize, usize)> {
        let res = self
            .index_of(resource)
            .ok_or_else(|| ModelError::unknown_species(resource))?;
        let con = self
            .index_of(consumer)
            .ok_or_else(|| ModelError::unknown_species(consumer))?;
        Ok((res, con))
    }
}
