//! Keyed collection of deployed descriptors, partitioned by stream.
//!
//! The stream name only partitions the map; within a stream entries are kept
//! in rank order (module type, then label), the same order
//! [`DescriptorKey::rank_cmp`] defines.

use std::collections::{BTreeMap, HashSet};

use flowbind_types::{validate_sibling_indices, DescriptorKey, ModuleDescriptor, ModuleType};

use crate::error::RegistryError;

type RankKey = (ModuleType, String);

fn rank_key(key: &DescriptorKey) -> RankKey {
    (key.module_type(), key.label().to_string())
}

/// Stages added, removed, or changed between two registry snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDiff {
    pub added: Vec<DescriptorKey>,
    pub removed: Vec<DescriptorKey>,
    pub changed: Vec<DescriptorKey>,
}

impl RegistryDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorRegistry {
    streams: BTreeMap<String, BTreeMap<RankKey, ModuleDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `descriptor` under its own key, returning the entry it replaced.
    pub fn insert(&mut self, descriptor: ModuleDescriptor) -> Option<ModuleDescriptor> {
        let key = DescriptorKey::for_descriptor(&descriptor);
        self.streams
            .entry(key.stream().to_string())
            .or_default()
            .insert(rank_key(&key), descriptor)
    }

    /// Replace every entry of `group` with `descriptors`. An empty list
    /// removes the stream.
    ///
    /// Nothing is changed when validation fails.
    ///
    /// # Errors
    ///
    /// Fails if the sibling indices are duplicated or not contiguous, if a
    /// descriptor belongs to a different group, or if two descriptors share a key.
    pub fn insert_pipeline(
        &mut self,
        group: &str,
        descriptors: Vec<ModuleDescriptor>,
    ) -> Result<(), RegistryError> {
        validate_sibling_indices(group, &descriptors)?;

        let mut entries = BTreeMap::new();
        for descriptor in descriptors {
            if descriptor.group() != group {
                return Err(RegistryError::GroupMismatch {
                    expected: group.to_string(),
                    found: descriptor.group().to_string(),
                    label: descriptor.module_label().to_string(),
                });
            }
            let key = DescriptorKey::for_descriptor(&descriptor);
            if entries.insert(rank_key(&key), descriptor).is_some() {
                return Err(RegistryError::DuplicateKey(key));
            }
        }

        tracing::debug!(group, modules = entries.len(), "Registered pipeline descriptors");
        if entries.is_empty() {
            self.streams.remove(group);
        } else {
            self.streams.insert(group.to_string(), entries);
        }
        Ok(())
    }

    pub fn get(&self, key: &DescriptorKey) -> Option<&ModuleDescriptor> {
        self.streams.get(key.stream())?.get(&rank_key(key))
    }

    pub fn contains_key(&self, key: &DescriptorKey) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &DescriptorKey) -> Option<ModuleDescriptor> {
        let entries = self.streams.get_mut(key.stream())?;
        let removed = entries.remove(&rank_key(key));
        if entries.is_empty() {
            self.streams.remove(key.stream());
        }
        removed
    }

    /// Drop every entry of `stream`, returning them in rank order.
    pub fn remove_stream(&mut self, stream: &str) -> Vec<ModuleDescriptor> {
        self.streams
            .remove(stream)
            .map(|entries| entries.into_values().collect())
            .unwrap_or_default()
    }

    /// Entries of `stream` in rank order.
    pub fn stream<'s>(
        &'s self,
        stream: &str,
    ) -> impl Iterator<Item = (DescriptorKey, &'s ModuleDescriptor)> + 's {
        self.streams
            .get(stream)
            .into_iter()
            .flat_map(|entries| entries.values())
            .map(|d| (DescriptorKey::for_descriptor(d), d))
    }

    /// Every entry, grouped by stream then in rank order.
    pub fn iter(&self) -> impl Iterator<Item = (DescriptorKey, &ModuleDescriptor)> {
        self.streams
            .values()
            .flat_map(BTreeMap::values)
            .map(|d| (DescriptorKey::for_descriptor(d), d))
    }

    pub fn keys(&self) -> impl Iterator<Item = DescriptorKey> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn streams(&self) -> impl Iterator<Item = &str> {
        self.streams.keys().map(String::as_str)
    }

    /// Every key sorted by rank alone, so streams interleave.
    pub fn ranked_keys(&self) -> Vec<DescriptorKey> {
        let mut keys: Vec<DescriptorKey> = self.keys().collect();
        keys.sort_by(DescriptorKey::rank_cmp);
        keys
    }

    pub fn len(&self) -> usize {
        self.streams.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// What changed going from `previous` to `self`.
    pub fn diff(&self, previous: &Self) -> RegistryDiff {
        let current: HashSet<DescriptorKey> = self.keys().collect();

        let mut diff = RegistryDiff::default();
        for (key, descriptor) in self.iter() {
            match previous.get(&key) {
                None => diff.added.push(key),
                Some(old) if old != descriptor => diff.changed.push(key),
                Some(_) => {}
            }
        }
        diff.removed = previous
            .keys()
            .filter(|k| !current.contains(k))
            .collect();
        diff
    }
}
