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

//! The per-group dictionary: a fixed static segment plus a bounded dynamic
//! segment sharing one single-byte index space.
//!
//! Indices 0..[`Storage::offset`] name the preloaded static entries,
//! [`Storage::offset`]..=255 name dynamic entries inserted by Clone and
//! Literal operations. Dynamic entries are evicted oldest-first when either
//! the item cap or the byte cap is exceeded, and compacted back to the low
//! end of their index range by [`Storage::reindex`] so the space never runs
//! out. Both peers run the same insertions, evictions and reindexes, so the
//! index spaces stay identical without any synchronization on the wire.

use std::collections::HashMap;

use crate::delta::value::charge_size;
use crate::error::{DecodeError, DeltaError, EncodeError};
use crate::headers::Value;
use crate::util::uvarint::uvarint_size;

/// Highest usable index; indices are serialized as uvarints but must fit
/// the single-byte index space.
pub(crate) const MAX_INDEX: usize = 0xff;

/// Default byte cap of the dynamic segment.
const DEFAULT_MAX_BYTES: usize = 4096;

enum StaticValue {
    /// A name registered without a default value. Matches by name only.
    None,
    Text(&'static str),
    Number(u64),
}

impl StaticValue {
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (StaticValue::Text(text), Value::Text(items)) => {
                items.len() == 1 && items[0] == *text
            }
            (StaticValue::Number(num), Value::Number(other)) => num == other,
            _ => false,
        }
    }

    fn to_value(&self) -> Option<Value> {
        match self {
            StaticValue::None => None,
            StaticValue::Text(text) => Some(Value::text(*text)),
            StaticValue::Number(num) => Some(Value::Number(*num)),
        }
    }
}

macro_rules! static_entries {
    ($(($name: literal, $value: expr) $(,)?)*) => {
        &[ $(($name, $value),)* ]
    }
}

#[rustfmt::skip]
static STATIC_ENTRIES: &[(&str, StaticValue)] = static_entries!(
    ("date", StaticValue::None),
    (":scheme", StaticValue::Text("https")),
    (":scheme", StaticValue::Text("http")),
    (":scheme", StaticValue::Text("ftp")),
    (":method", StaticValue::Text("get")),
    (":method", StaticValue::Text("post")),
    (":method", StaticValue::Text("put")),
    (":method", StaticValue::Text("delete")),
    (":method", StaticValue::Text("options")),
    (":method", StaticValue::Text("patch")),
    (":method", StaticValue::Text("connect")),
    (":path", StaticValue::Text("/")),
    (":host", StaticValue::None),
    ("cookie", StaticValue::None),
    (":status", StaticValue::Number(100)),
    (":status", StaticValue::Number(101)),
    (":status", StaticValue::Number(102)),
    (":status", StaticValue::Number(200)),
    (":status", StaticValue::Number(201)),
    (":status", StaticValue::Number(202)),
    (":status", StaticValue::Number(203)),
    (":status", StaticValue::Number(204)),
    (":status", StaticValue::Number(205)),
    (":status", StaticValue::Number(206)),
    (":status", StaticValue::Number(207)),
    (":status", StaticValue::Number(208)),
    (":status", StaticValue::Number(300)),
    (":status", StaticValue::Number(301)),
    (":status", StaticValue::Number(302)),
    (":status", StaticValue::Number(303)),
    (":status", StaticValue::Number(304)),
    (":status", StaticValue::Number(305)),
    (":status", StaticValue::Number(307)),
    (":status", StaticValue::Number(308)),
    (":status", StaticValue::Number(400)),
    (":status", StaticValue::Number(401)),
    (":status", StaticValue::Number(402)),
    (":status", StaticValue::Number(403)),
    (":status", StaticValue::Number(404)),
    (":status", StaticValue::Number(405)),
    (":status", StaticValue::Number(406)),
    (":status", StaticValue::Number(407)),
    (":status", StaticValue::Number(408)),
    (":status", StaticValue::Number(409)),
    (":status", StaticValue::Number(410)),
    (":status", StaticValue::Number(411)),
    (":status", StaticValue::Number(412)),
    (":status", StaticValue::Number(413)),
    (":status", StaticValue::Number(414)),
    (":status", StaticValue::Number(415)),
    (":status", StaticValue::Number(416)),
    (":status", StaticValue::Number(417)),
    (":status", StaticValue::Number(500)),
    (":status", StaticValue::Number(501)),
    (":status", StaticValue::Number(502)),
    (":status", StaticValue::Number(503)),
    (":status", StaticValue::Number(504)),
    (":status", StaticValue::Number(505)),
    (":status-text", StaticValue::Text("OK")),
    (":version", StaticValue::Text("1.1")),
    ("accept", StaticValue::None),
    ("accept-charset", StaticValue::None),
    ("accept-encoding", StaticValue::None),
    ("accept-language", StaticValue::None),
    ("accept-ranges", StaticValue::None),
    ("allow", StaticValue::None),
    ("authorization", StaticValue::None),
    ("cache-control", StaticValue::None),
    ("content-base", StaticValue::None),
    ("content-encoding", StaticValue::None),
    ("content-length", StaticValue::None),
    ("content-location", StaticValue::None),
    ("content-md5", StaticValue::None),
    ("content-range", StaticValue::None),
    ("content-type", StaticValue::None),
    ("etag", StaticValue::None),
    ("expect", StaticValue::None),
    ("expires", StaticValue::None),
    ("from", StaticValue::None),
    ("if-match", StaticValue::None),
    ("if-modified-since", StaticValue::None),
    ("if-none-match", StaticValue::None),
    ("if-range", StaticValue::None),
    ("if-unmodified-since", StaticValue::None),
    ("last-modified", StaticValue::None),
    ("location", StaticValue::None),
    ("max-forwards", StaticValue::None),
    ("origin", StaticValue::None),
    ("pragma", StaticValue::None),
    ("proxy-authenticate", StaticValue::None),
    ("proxy-authorization", StaticValue::None),
    ("range", StaticValue::None),
    ("referer", StaticValue::None),
    ("retry-after", StaticValue::None),
    ("server", StaticValue::None),
    ("set-cookie", StaticValue::None),
    ("status", StaticValue::None),
    ("te", StaticValue::None),
    ("trailer", StaticValue::None),
    ("transfer-encoding", StaticValue::None),
    ("upgrade", StaticValue::None),
    ("user-agent", StaticValue::None),
    ("vary", StaticValue::None),
    ("via", StaticValue::None),
    ("warning", StaticValue::None),
    ("www-authenticate", StaticValue::None),
    ("access-control-allow-origin", StaticValue::None),
    ("content-disposition", StaticValue::None),
    ("get-dictionary", StaticValue::None),
    ("p3p", StaticValue::None),
    ("x-content-type-options", StaticValue::None),
    ("x-frame-options", StaticValue::None),
    ("x-powered-by", StaticValue::None),
    ("x-xss-protection", StaticValue::None),
);

/// Reference-counted interning of names and text items, so strings shared
/// by several dynamic entries are only charged once.
#[derive(Default)]
struct StringPool {
    counts: HashMap<String, usize>,
}

impl StringPool {
    /// Adds one reference. Returns `true` if the string was not pooled yet.
    fn acquire(&mut self, text: &str) -> bool {
        match self.counts.get_mut(text) {
            Some(count) => {
                *count += 1;
                false
            }
            None => {
                self.counts.insert(text.to_string(), 1);
                true
            }
        }
    }

    /// Drops one reference, removing the string at zero.
    fn release(&mut self, text: &str) {
        if let Some(count) = self.counts.get_mut(text) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(text);
            }
        }
    }

    #[cfg(test)]
    fn holds(&self, text: &str) -> bool {
        self.counts.contains_key(text)
    }
}

struct DynEntry {
    index: usize,
    name: String,
    value: Value,
    /// Bytes charged against the byte cap when this entry was stored.
    charge: usize,
    uses: u64,
    touched: bool,
}

/// Indices evicted or moved by a [`Storage::store`] call; the caller must
/// forward both to the active set before using the returned index.
#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct TableUpdate {
    pub(crate) evicted: Vec<usize>,
    pub(crate) remap: HashMap<usize, usize>,
}

pub(crate) struct Storage {
    /// Front = oldest, next to evict. Kept in ascending index order between
    /// reindexes.
    dynamic: Vec<DynEntry>,
    pool: StringPool,
    next_index: usize,
    curr_bytes: usize,
    max_bytes: usize,
    max_items: usize,
    /// Operation count feeding reindex weights.
    ops: u64,
}

impl Storage {
    pub(crate) fn new() -> Self {
        Self::with_limits(MAX_INDEX + 1 - Self::offset(), DEFAULT_MAX_BYTES)
    }

    pub(crate) fn with_limits(max_items: usize, max_bytes: usize) -> Self {
        Self {
            dynamic: Vec::new(),
            pool: StringPool::default(),
            next_index: Self::offset(),
            curr_bytes: 0,
            max_bytes,
            max_items: max_items.min(MAX_INDEX + 1 - Self::offset()),
            ops: 0,
        }
    }

    /// First dynamic index; also the static segment length.
    pub(crate) fn offset() -> usize {
        STATIC_ENTRIES.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.dynamic.len()
    }

    pub(crate) fn byte_size(&self) -> usize {
        self.curr_bytes
    }

    pub(crate) fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Returns the name and optional value behind `index`, or `None` for
    /// an unoccupied index.
    pub(crate) fn entry_pair(&self, index: usize) -> Option<(String, Option<Value>)> {
        if index < Self::offset() {
            let (name, value) = &STATIC_ENTRIES[index];
            return Some((name.to_string(), value.to_value()));
        }
        self.dynamic
            .iter()
            .find(|e| e.index == index)
            .map(|e| (e.name.clone(), Some(e.value.clone())))
    }

    /// Finds an entry matching both name and value, scanning dynamic
    /// entries newest-to-oldest before the static segment.
    pub(crate) fn find_exact(&self, name: &str, value: &Value) -> Option<usize> {
        for entry in self.dynamic.iter().rev() {
            if entry.name == name && entry.value == *value {
                return Some(entry.index);
            }
        }
        STATIC_ENTRIES
            .iter()
            .position(|(n, v)| *n == name && v.matches(value))
    }

    /// Finds an entry with a matching name, scanning dynamic entries
    /// newest-to-oldest before the static segment.
    pub(crate) fn find_by_name(&self, name: &str) -> Option<usize> {
        for entry in self.dynamic.iter().rev() {
            if entry.name == name {
                return Some(entry.index);
            }
        }
        STATIC_ENTRIES.iter().position(|(n, _)| *n == name)
    }

    /// Stores a dynamic entry, evicting from the oldest end until both
    /// caps hold. Evicted and remapped indices are reported through
    /// `update`.
    pub(crate) fn store(
        &mut self,
        name: String,
        value: Value,
        update: &mut TableUpdate,
    ) -> Result<usize, DeltaError> {
        // Worst case, as if nothing were pooled; the pool can only shrink
        // the real charge.
        let worst = name.len() + charge_size(&value);
        if worst > self.max_bytes {
            return Err(EncodeError::ValueTooLarge(worst).into());
        }
        while self.dynamic.len() >= self.max_items
            || self.curr_bytes + worst > self.max_bytes
        {
            self.evict(update);
        }

        let mut charge = 0;
        if self.pool.acquire(&name) {
            charge += name.len();
        }
        charge += self.charge_value(&value);

        if self.next_index > MAX_INDEX {
            // The index space wrapped inside one message; compact early.
            let remap = self.reindex();
            merge_remap(update, remap);
        }
        let index = self.next_index;
        self.next_index += 1;
        self.curr_bytes += charge;
        self.ops += 1;
        self.dynamic.push(DynEntry {
            index,
            name,
            value,
            charge,
            uses: 1,
            touched: true,
        });
        Ok(index)
    }

    fn charge_value(&mut self, value: &Value) -> usize {
        match value {
            Value::Text(items) => {
                let mut charge = 1;
                for item in items {
                    charge += uvarint_size(item.len() as u64);
                    if self.pool.acquire(item) {
                        charge += item.len();
                    }
                }
                charge
            }
            other => charge_size(other),
        }
    }

    fn evict(&mut self, update: &mut TableUpdate) {
        // The caps guarantee at least one entry is present here.
        let entry = self.dynamic.remove(0);
        self.pool.release(&entry.name);
        if let Value::Text(items) = &entry.value {
            for item in items {
                self.pool.release(item);
            }
        }
        self.curr_bytes -= entry.charge;
        update.evicted.push(entry.index);
    }

    /// Marks `index` as used since the last reindex. Returns `false` for
    /// static or unoccupied indices, which are never reindexed.
    pub(crate) fn touch(&mut self, index: usize) -> bool {
        if index < Self::offset() {
            return false;
        }
        match self.dynamic.iter_mut().find(|e| e.index == index) {
            Some(entry) => {
                if !entry.touched {
                    entry.touched = true;
                    entry.uses += 1;
                    self.ops += 1;
                }
                true
            }
            None => false,
        }
    }

    /// Re-assigns compact indices ordered by retention weight: entries
    /// touched since the last reindex sort behind untouched ones, which
    /// sort by their lifetime use frequency. The front of the resulting
    /// order is the next to evict.
    ///
    /// Returns the old-to-new mapping of every index that moved.
    pub(crate) fn reindex(&mut self) -> HashMap<usize, usize> {
        let ops = self.ops.max(1) as f64;
        self.dynamic.sort_by(|a, b| {
            let wa = if a.touched { 1.0 } else { a.uses as f64 / ops };
            let wb = if b.touched { 1.0 } else { b.uses as f64 / ops };
            wa.total_cmp(&wb)
        });
        let mut remap = HashMap::new();
        for (pos, entry) in self.dynamic.iter_mut().enumerate() {
            let index = Self::offset() + pos;
            if entry.index != index {
                remap.insert(entry.index, index);
            }
            entry.index = index;
            entry.touched = false;
        }
        self.next_index = Self::offset() + self.dynamic.len();
        remap
    }

    #[cfg(test)]
    fn pooled(&self, text: &str) -> bool {
        self.pool.holds(text)
    }
}

pub(crate) fn merge_remap(update: &mut TableUpdate, remap: HashMap<usize, usize>) {
    if update.remap.is_empty() {
        update.remap = remap;
    } else {
        // Chain earlier moves through the newer mapping.
        for target in update.remap.values_mut() {
            if let Some(next) = remap.get(target) {
                *target = *next;
            }
        }
        for (old, new) in remap {
            update.remap.entry(old).or_insert(new);
        }
    }
}

/// Resolves `index` to an emittable pair, failing for unoccupied indices
/// and for name-only static entries.
pub(crate) fn resolve_pair(storage: &Storage, index: usize) -> Result<(String, Value), DeltaError> {
    match storage.entry_pair(index) {
        Some((name, Some(value))) => Ok((name, value)),
        _ => Err(DecodeError::DanglingIndex(index).into()),
    }
}
