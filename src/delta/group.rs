// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Active header sets and the cache of per-group compression state.
//!
//! A [`HeaderGroup`] holds the dictionary indices currently toggled on for
//! one group id; between messages it is the steady state both peers agree
//! on. A [`GroupCache`] maps group ids to their dictionary and active set,
//! creating state lazily and discarding the least recently used group once
//! the cache is full.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::delta::storage::Storage;
use crate::error::{DecodeError, DeltaError};
use crate::headers::{HeaderSet, Value};

/// Groups kept per cache before the least recently used one is dropped.
const MAX_GROUPS: usize = 0xff;

/// The set of dictionary indices toggled on, in activation order.
#[derive(Default)]
pub(crate) struct HeaderGroup {
    indices: Vec<usize>,
}

impl HeaderGroup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Flips membership of `index`.
    pub(crate) fn toggle(&mut self, index: usize) {
        match self.indices.iter().position(|&i| i == index) {
            Some(pos) => {
                self.indices.remove(pos);
            }
            None => self.indices.push(index),
        }
    }

    pub(crate) fn has_entry(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub(crate) fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Drops indices whose entries were evicted from the dictionary.
    pub(crate) fn remove_evicted(&mut self, evicted: &[usize]) {
        if !evicted.is_empty() {
            self.indices.retain(|i| !evicted.contains(i));
        }
    }

    /// Follows a reindex of the dictionary.
    pub(crate) fn apply_remap(&mut self, remap: &HashMap<usize, usize>) {
        if remap.is_empty() {
            return;
        }
        for index in self.indices.iter_mut() {
            if let Some(new) = remap.get(index) {
                *index = *new;
            }
        }
    }

    /// Emits every active pair into `sink`, in activation order, skipping
    /// pairs suppressed for the current message.
    pub(crate) fn materialize(
        &self,
        storage: &Storage,
        suppressed: &HashSet<(String, Value)>,
        sink: &mut HeaderSet,
    ) -> Result<(), DeltaError> {
        for &index in &self.indices {
            let (name, value) = match storage.entry_pair(index) {
                Some((name, Some(value))) => (name, value),
                _ => return Err(DecodeError::DanglingIndex(index).into()),
            };
            if suppressed.contains(&(name.clone(), value.clone())) {
                continue;
            }
            sink.append(name, value);
        }
        Ok(())
    }
}

pub(crate) struct Group {
    pub(crate) storage: Storage,
    pub(crate) active: HeaderGroup,
}

/// Per-group compression state, bounded LRU.
pub(crate) struct GroupCache {
    groups: HashMap<u8, Group>,
    /// Front = least recently used.
    recency: VecDeque<u8>,
}

impl GroupCache {
    pub(crate) fn new() -> Self {
        Self {
            groups: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Returns the state of `id`, creating it with a fresh dictionary on
    /// first use. Accessing a group marks it most recently used.
    pub(crate) fn group_mut(&mut self, id: u8) -> &mut Group {
        if let Some(pos) = self.recency.iter().position(|&g| g == id) {
            self.recency.remove(pos);
        } else if self.groups.len() >= MAX_GROUPS {
            if let Some(oldest) = self.recency.pop_front() {
                self.groups.remove(&oldest);
            }
        }
        self.recency.push_back(id);
        self.groups.entry(id).or_insert_with(|| Group {
            storage: Storage::new(),
            active: HeaderGroup::new(),
        })
    }

    #[cfg(test)]
    fn holds(&self, id: u8) -> bool {
        self.groups.contains_key(&id)
    }
}

#[cfg(test)]
mod ut_group {
    use std::collections::{HashMap, HashSet};

    use super::{GroupCache, HeaderGroup};
    use crate::delta::storage::{Storage, TableUpdate};
    use crate::headers::{HeaderSet, Value};

    /// UT test cases for toggle semantics.
    ///
    /// # Brief
    /// 1. Toggles indices on and off.
    /// 2. Checks that toggling twice restores the previous state.
    #[test]
    fn ut_header_group_toggle() {
        let mut group = HeaderGroup::new();
        group.toggle(3);
        group.toggle(7);
        assert!(group.has_entry(3));
        assert_eq!(group.indices(), [3, 7]);

        group.toggle(3);
        assert!(!group.has_entry(3));
        assert_eq!(group.indices(), [7]);
        group.toggle(3);
        group.toggle(3);
        assert_eq!(group.indices(), [7]);
    }

    /// UT test cases for eviction and remap follow-up.
    ///
    /// # Brief
    /// 1. Removes evicted indices and rewrites remapped ones.
    #[test]
    fn ut_header_group_follow_storage() {
        let mut group = HeaderGroup::new();
        group.toggle(114);
        group.toggle(115);
        group.toggle(116);
        group.remove_evicted(&[115]);
        assert_eq!(group.indices(), [114, 116]);

        let remap = HashMap::from([(116, 115), (114, 116)]);
        group.apply_remap(&remap);
        assert_eq!(group.indices(), [116, 115]);
    }

    /// UT test cases for materializing the active set.
    ///
    /// # Brief
    /// 1. Emits active pairs in activation order, minus suppressed pairs.
    /// 2. Checks that a dangling active index is an error.
    #[test]
    fn ut_header_group_materialize() {
        let mut storage = Storage::new();
        let mut update = TableUpdate::default();
        let a = storage
            .store("a".to_string(), Value::number(1), &mut update)
            .unwrap();
        let b = storage
            .store("b".to_string(), Value::number(2), &mut update)
            .unwrap();

        let mut group = HeaderGroup::new();
        group.toggle(b);
        group.toggle(a);

        let mut sink = HeaderSet::new();
        let suppressed = HashSet::from([("b".to_string(), Value::number(2))]);
        group.materialize(&storage, &suppressed, &mut sink).unwrap();
        assert_eq!(sink.len(), 1);
        assert!(sink.contains("a", &Value::number(1)));

        group.toggle(250);
        let mut sink = HeaderSet::new();
        assert!(group
            .materialize(&storage, &HashSet::new(), &mut sink)
            .is_err());
    }

    /// UT test cases for group cache LRU eviction.
    ///
    /// # Brief
    /// 1. Fills the cache to capacity and touches the oldest group.
    /// 2. Checks that the next insertion drops the least recently used
    ///    group, not the oldest-created one.
    #[test]
    fn ut_group_cache_lru() {
        let mut cache = GroupCache::new();
        for id in 0..=254u8 {
            cache.group_mut(id);
        }
        assert!(cache.holds(0));

        // Refresh group 0, then insert one more.
        cache.group_mut(0);
        cache.group_mut(255);
        assert!(cache.holds(0));
        assert!(cache.holds(255));
        assert!(!cache.holds(1));
    }
}
