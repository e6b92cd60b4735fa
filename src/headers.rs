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

//! Header collections exchanged with the codec.
//!
//! The module provides [`HeaderSet`], an ordered multi-value collection of
//! name/value pairs, and [`Value`], the typed header value the wire format
//! distinguishes: text (one or more string items), unsigned number,
//! timestamp and opaque bytes.
//!
//! [`HeaderSet`]: HeaderSet
//! [`Value`]: Value
//!
//! # Examples
//!
//! ```
//! use delta_headers::headers::{HeaderSet, Value};
//!
//! let mut headers = HeaderSet::new();
//! headers.append(":method", Value::text("get"));
//! headers.append("content-length", Value::number(3495));
//!
//! assert!(headers.contains(":method", &Value::text("get")));
//! assert_eq!(headers.len(), 2);
//! ```

use core::slice;

/// A typed header value.
///
/// The wire format tags every value with one of four types, so values keep
/// their type through a compression round trip instead of flattening to
/// strings.
///
/// # Examples
///
/// ```
/// use delta_headers::headers::Value;
///
/// let accept = Value::text("text/html");
/// let cookie = Value::texts(vec!["a=1".to_string(), "b=2".to_string()]);
/// let length = Value::number(1024);
/// ```
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Value {
    /// One or more text items. The wire format carries up to 256 items per
    /// value.
    Text(Vec<String>),

    /// An unsigned integer.
    Number(u64),

    /// Seconds since the Unix epoch.
    Date(u64),

    /// Opaque bytes.
    Binary(Vec<u8>),
}

impl Value {
    /// Creates a text value holding a single item.
    pub fn text<T: Into<String>>(item: T) -> Self {
        Value::Text(vec![item.into()])
    }

    /// Creates a text value holding several items.
    pub fn texts(items: Vec<String>) -> Self {
        Value::Text(items)
    }

    /// Creates a number value.
    pub fn number(num: u64) -> Self {
        Value::Number(num)
    }

    /// Creates a date value from seconds since the Unix epoch.
    pub fn date(secs: u64) -> Self {
        Value::Date(secs)
    }

    /// Creates a binary value.
    pub fn binary(bytes: Vec<u8>) -> Self {
        Value::Binary(bytes)
    }
}

/// An ordered multi-value collection of header name/value pairs.
///
/// Appending keeps insertion order and allows the same name to appear any
/// number of times. The codec consumes a `HeaderSet` when serializing and
/// fills one when deserializing.
///
/// # Examples
///
/// ```
/// use delta_headers::headers::{HeaderSet, Value};
///
/// let mut headers = HeaderSet::new();
/// headers.append("cookie", Value::text("a=1"));
/// headers.append("cookie", Value::text("b=2"));
///
/// assert_eq!(headers.values("cookie").count(), 2);
/// ```
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HeaderSet {
    entries: Vec<(String, Value)>,
}

impl HeaderSet {
    /// Creates an empty `HeaderSet`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a name/value pair, keeping any pairs already present under
    /// the same name.
    pub fn append<N: Into<String>>(&mut self, name: N, value: Value) {
        self.entries.push((name.into(), value));
    }

    /// Returns `true` if the exact name/value pair is present.
    pub fn contains(&self, name: &str, value: &Value) -> bool {
        self.entries.iter().any(|(n, v)| n == name && v == value)
    }

    /// Returns an iterator over the values stored under `name`, in
    /// insertion order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns an iterator over all pairs in insertion order.
    pub fn iter(&self) -> slice::Iter<'_, (String, Value)> {
        self.entries.iter()
    }

    /// Returns the number of pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the collection holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a HeaderSet {
    type Item = &'a (String, Value);
    type IntoIter = slice::Iter<'a, (String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
