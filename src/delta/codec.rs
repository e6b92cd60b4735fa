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

//! The differential header codec.
//!
//! [`DeltaCodec`] turns a [`HeaderSet`] into the operations that transform
//! the previous message's steady state into the current one, and applies
//! such operations coming back from a peer. Encoder-side and decoder-side
//! state are independent caches of per-group dictionaries, so one codec
//! serves one endpoint of a connection.
//!
//! Both peers mutate their dictionaries by executing the same stateful
//! operations at the same pipeline points, including the retention-driven
//! reindex after every message, so indices always mean the same entry on
//! both sides without carrying synchronization on the wire.

use std::collections::HashSet;

use crate::delta::group::{Group, GroupCache};
use crate::delta::operation::OpSet;
use crate::delta::storage::{resolve_pair, TableUpdate, MAX_INDEX};
use crate::delta::value::charge_size;
use crate::error::{DecodeError, DeltaError, EncodeError};
use crate::headers::{HeaderSet, Value};
use crate::huffman::{Huffman, HuffmanTable};
use crate::util::cursor::ByteReader;

/// Names whose values change on almost every message; storing them would
/// only churn the dictionary, so they are always sent ephemerally.
const DEFAULT_EPHEMERAL: [&str; 7] = [
    "referer",
    ":path",
    "authorization",
    "www-authenticate",
    "proxy-authenticate",
    "date",
    "last-modified",
];

/// A stateful differential codec for header blocks.
///
/// # Examples
///
/// ```
/// use delta_headers::delta::DeltaCodec;
/// use delta_headers::headers::{HeaderSet, Value};
///
/// let mut client = DeltaCodec::new(1);
/// let mut server = DeltaCodec::new(1);
///
/// let mut headers = HeaderSet::new();
/// headers.append(":method", Value::text("get"));
/// headers.append(":host", Value::text("example.com"));
///
/// let mut block = Vec::new();
/// client.serialize(&mut block, &headers).unwrap();
///
/// let mut received = HeaderSet::new();
/// server.deserialize(&block, &mut received).unwrap();
/// assert!(received.contains(":host", &Value::text("example.com")));
/// ```
pub struct DeltaCodec {
    group_id: u8,
    /// State behind our own serialized messages.
    local: GroupCache,
    /// State behind the peer's messages.
    remote: GroupCache,
    huffman: Huffman,
    use_huffman: bool,
    ephemeral: HashSet<String>,
}

impl DeltaCodec {
    /// Creates a codec serializing under `group_id`, with Huffman coding
    /// disabled and the response table for decoding Huffman-coded input.
    pub fn new(group_id: u8) -> Self {
        Self::build(group_id, HuffmanTable::Response, false)
    }

    /// Creates a codec that Huffman-codes text values with the given
    /// table. The peer must be configured with the same table.
    pub fn with_huffman(group_id: u8, table: HuffmanTable) -> Self {
        Self::build(group_id, table, true)
    }

    fn build(group_id: u8, table: HuffmanTable, use_huffman: bool) -> Self {
        Self {
            group_id,
            local: GroupCache::new(),
            remote: GroupCache::new(),
            huffman: Huffman::new(table),
            use_huffman,
            ephemeral: DEFAULT_EPHEMERAL.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replaces the set of names that are always sent ephemerally.
    pub fn set_ephemeral_names<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ephemeral = names.into_iter().map(Into::into).collect();
    }

    /// Serializes `headers` as a delta against the group's steady state,
    /// appending the block to `dst`.
    ///
    /// On an [`EncodeError`] nothing is appended and no state changes, so
    /// the codec stays usable.
    ///
    /// The steady state is a set of pairs, so identical duplicate pairs in
    /// `headers` collapse to one on the receiving side; distinct values
    /// under one name are preserved.
    ///
    /// [`EncodeError`]: crate::error::EncodeError
    pub fn serialize(&mut self, dst: &mut Vec<u8>, headers: &HeaderSet) -> Result<(), DeltaError> {
        let huffman = self.use_huffman.then_some(&self.huffman);
        let group = self.local.group_mut(self.group_id);

        // All wire and capacity limits are checked before the dictionary
        // is touched.
        for (name, value) in headers {
            check_encodable(group, name, value, self.ephemeral.contains(name.as_str()))?;
        }

        let mut ops = OpSet::new();
        for &index in group.active.indices() {
            let (name, value) = resolve_pair(&group.storage, index)?;
            if !headers.contains(&name, &value) {
                ops.stoggl.push(index);
            }
        }
        for (name, value) in headers {
            let exact = group.storage.find_exact(name, value);
            if exact.map_or(false, |index| group.active.has_entry(index)) {
                continue;
            }
            if self.ephemeral.contains(name.as_str()) {
                match group.storage.find_by_name(name) {
                    Some(index) => push_unique(&mut ops.eclone, (index, value.clone())),
                    None => push_unique(&mut ops.ekvsto, (name.clone(), value.clone())),
                }
                continue;
            }
            match exact {
                Some(index) => push_unique(&mut ops.stoggl, index),
                None => match group.storage.find_by_name(name) {
                    Some(index) => push_unique(&mut ops.sclone, (index, value.clone())),
                    None => push_unique(&mut ops.skvsto, (name.clone(), value.clone())),
                },
            }
        }

        apply_ops(group, &ops)?;
        adjust(group);
        ops.compact_toggles();
        dst.push(self.group_id);
        ops.serialize_to(dst, huffman)
    }

    /// Parses one header block and emits the resulting header set,
    /// including the group's unchanged steady state, into `sink`.
    ///
    /// Any [`DecodeError`] is fatal for the group the block addressed.
    ///
    /// [`DecodeError`]: crate::error::DecodeError
    pub fn deserialize(&mut self, src: &[u8], sink: &mut HeaderSet) -> Result<(), DeltaError> {
        let mut reader = ByteReader::new(src);
        let group_id = reader.next_byte()?;
        let ops = OpSet::parse_from(&mut reader, &self.huffman)?;
        let group = self.remote.group_mut(group_id);

        apply_ops(group, &ops)?;

        // Ephemeral toggles flip a pair for this message only: an active
        // pair is suppressed, an inactive one is emitted without becoming
        // part of the steady state.
        let mut suppressed = HashSet::new();
        let mut flips = ops.etoggl.clone();
        for &(start, end) in &ops.etrang {
            check_range(start, end)?;
            flips.extend(start..=end);
        }
        for index in flips {
            let (name, value) = resolve_pair(&group.storage, index)?;
            if group.active.has_entry(index) {
                suppressed.insert((name, value));
            } else {
                sink.append(name, value);
            }
        }
        for (index, value) in &ops.eclone {
            let (name, _) = group
                .storage
                .entry_pair(*index)
                .ok_or(DecodeError::DanglingIndex(*index))?;
            sink.append(name, value.clone());
        }

        adjust(group);
        group.active.materialize(&group.storage, &suppressed, sink)?;
        for (name, value) in &ops.ekvsto {
            sink.append(name.clone(), value.clone());
        }
        Ok(())
    }
}

fn push_unique<T: PartialEq>(queue: &mut Vec<T>, item: T) {
    if !queue.contains(&item) {
        queue.push(item);
    }
}

/// Rejects headers the wire format or the dictionary caps cannot take,
/// before any state mutation.
fn check_encodable(
    group: &Group,
    name: &str,
    value: &Value,
    ephemeral: bool,
) -> Result<(), DeltaError> {
    if name.len() > 0xff {
        return Err(EncodeError::NameTooLong(name.len()).into());
    }
    if let Value::Text(items) = value {
        if items.is_empty() {
            return Err(EncodeError::EmptyTextValue.into());
        }
        if items.len() > crate::delta::value::MAX_TEXT_ITEMS {
            return Err(EncodeError::TooManyTextItems(items.len()).into());
        }
    }
    // Ephemeral pairs never enter the dictionary, so only stored pairs
    // are held to the byte cap.
    if !ephemeral {
        let worst = name.len() + charge_size(value);
        if worst > group.storage.max_bytes() {
            return Err(EncodeError::ValueTooLarge(worst).into());
        }
    }
    Ok(())
}

fn check_range(start: usize, end: usize) -> Result<(), DeltaError> {
    if start > end || end > MAX_INDEX {
        return Err(DecodeError::DanglingIndex(end).into());
    }
    Ok(())
}

fn toggle_checked(group: &mut Group, index: usize) -> Result<(), DeltaError> {
    if group.storage.entry_pair(index).is_none() {
        return Err(DecodeError::DanglingIndex(index).into());
    }
    group.active.toggle(index);
    Ok(())
}

/// Executes the stateful operations of one message, in wire order, exactly
/// as the peer will.
fn apply_ops(group: &mut Group, ops: &OpSet) -> Result<(), DeltaError> {
    for &index in &ops.stoggl {
        toggle_checked(group, index)?;
    }
    for &(start, end) in &ops.strang {
        check_range(start, end)?;
        for index in start..=end {
            toggle_checked(group, index)?;
        }
    }
    for (index, value) in &ops.sclone {
        let (name, _) = group
            .storage
            .entry_pair(*index)
            .ok_or(DecodeError::DanglingIndex(*index))?;
        insert_active(group, name, value.clone())?;
    }
    for (name, value) in &ops.skvsto {
        insert_active(group, name.clone(), value.clone())?;
    }
    Ok(())
}

/// Stores a pair and toggles its fresh index on, keeping the active set in
/// step with any eviction or early reindex the store caused.
fn insert_active(group: &mut Group, name: String, value: Value) -> Result<(), DeltaError> {
    let mut update = TableUpdate::default();
    let index = group.storage.store(name, value, &mut update)?;
    group.active.remove_evicted(&update.evicted);
    group.active.apply_remap(&update.remap);
    group.active.toggle(index);
    Ok(())
}

/// End-of-message bookkeeping: marks every active dynamic entry as used,
/// then reindexes the dictionary and follows the moves. Runs on both sides
/// of the connection for every message.
fn adjust(group: &mut Group) {
    let indices: Vec<usize> = group.active.indices().to_vec();
    for index in indices {
        group.storage.touch(index);
    }
    let remap = group.storage.reindex();
    group.active.apply_remap(&remap);
}

#[cfg(test)]
mod ut_codec {
    use super::DeltaCodec;
    use crate::delta::operation::OpSet;
    use crate::error::DecodeError;
    use crate::headers::{HeaderSet, Value};
    use crate::huffman::{Huffman, HuffmanTable};
    use crate::util::cursor::ByteReader;
    use crate::util::test_util::from_hex;

    fn headers(pairs: &[(&str, Value)]) -> HeaderSet {
        let mut set = HeaderSet::new();
        for (name, value) in pairs {
            set.append(*name, value.clone());
        }
        set
    }

    fn sorted_pairs(set: &HeaderSet) -> Vec<(String, Value)> {
        let mut pairs: Vec<_> = set.iter().cloned().collect();
        pairs.sort_by(|a, b| format!("{a:?}").cmp(&format!("{b:?}")));
        pairs
    }

    fn exchange(encoder: &mut DeltaCodec, decoder: &mut DeltaCodec, set: &HeaderSet) -> HeaderSet {
        let mut block = Vec::new();
        encoder.serialize(&mut block, set).unwrap();
        let mut sink = HeaderSet::new();
        decoder.deserialize(&block, &mut sink).unwrap();
        sink
    }

    fn parse_ops(block: &[u8]) -> OpSet {
        let huffman = Huffman::new(HuffmanTable::Response);
        let mut reader = ByteReader::new(&block[1..]);
        OpSet::parse_from(&mut reader, &huffman).unwrap()
    }

    /// UT test cases for multi-message round trips.
    ///
    /// # Brief
    /// 1. Sends three messages through an encoder/decoder pair.
    /// 2. Checks each decoded set matches the input as a multiset.
    #[test]
    fn ut_codec_round_trip() {
        let mut encoder = DeltaCodec::new(1);
        let mut decoder = DeltaCodec::new(1);

        let first = headers(&[
            (":method", Value::text("get")),
            (":path", Value::text("/index.html")),
            (":host", Value::text("example.com")),
            ("user-agent", Value::text("test-agent/1.0")),
        ]);
        let second = headers(&[
            (":method", Value::text("get")),
            (":path", Value::text("/style.css")),
            (":host", Value::text("example.com")),
            ("user-agent", Value::text("test-agent/1.0")),
        ]);
        let third = headers(&[
            (":method", Value::text("post")),
            (":path", Value::text("/submit")),
            (":host", Value::text("example.com")),
            ("content-length", Value::number(42)),
        ]);
        for set in [&first, &second, &third] {
            let sink = exchange(&mut encoder, &mut decoder, set);
            assert_eq!(sorted_pairs(&sink), sorted_pairs(set));
        }
    }

    /// UT test cases for repeated pairs in one message.
    ///
    /// # Brief
    /// 1. Sends a set holding the same pair twice plus two distinct values
    ///    under one name.
    /// 2. Checks identical pairs collapse to one while distinct values
    ///    under a shared name both survive.
    #[test]
    fn ut_codec_duplicate_pairs() {
        let mut encoder = DeltaCodec::new(2);
        let mut decoder = DeltaCodec::new(2);

        let mut set = HeaderSet::new();
        set.append("x-twice", Value::text("same"));
        set.append("x-twice", Value::text("same"));
        set.append("set-cookie", Value::text("a=1"));
        set.append("set-cookie", Value::text("b=2"));

        let sink = exchange(&mut encoder, &mut decoder, &set);
        let emitted: Vec<_> = sink
            .iter()
            .filter(|(name, _)| name == "x-twice")
            .collect();
        assert_eq!(emitted.len(), 1);
        assert!(sink.contains("set-cookie", &Value::text("a=1")));
        assert!(sink.contains("set-cookie", &Value::text("b=2")));
    }

    /// UT test cases for differential encoding of repeated messages.
    ///
    /// # Brief
    /// 1. Sends the same headers twice with no ephemeral names set.
    /// 2. Checks the second block is the bare group id and still decodes
    ///    to the full set.
    #[test]
    fn ut_codec_steady_state() {
        let mut encoder = DeltaCodec::new(9);
        let mut decoder = DeltaCodec::new(9);
        encoder.set_ephemeral_names(Vec::<String>::new());

        let set = headers(&[
            (":method", Value::text("get")),
            ("x-custom", Value::text("abc")),
        ]);
        let sink = exchange(&mut encoder, &mut decoder, &set);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set));

        let mut block = Vec::new();
        encoder.serialize(&mut block, &set).unwrap();
        assert_eq!(block, [9]);

        let mut sink = HeaderSet::new();
        decoder.deserialize(&block, &mut sink).unwrap();
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set));
    }

    /// UT test cases for minimal diffs.
    ///
    /// # Brief
    /// 1. Changes one header between two messages.
    /// 2. Checks the second block carries one toggle and one clone plus
    ///    the recurring ephemeral clone, and no literal.
    #[test]
    fn ut_codec_minimal_diff() {
        let mut encoder = DeltaCodec::new(1);
        let mut decoder = DeltaCodec::new(1);

        let first = headers(&[
            (":method", Value::text("get")),
            (":path", Value::text("/")),
            ("foo", Value::text("123")),
        ]);
        exchange(&mut encoder, &mut decoder, &first);

        let second = headers(&[
            (":method", Value::text("get")),
            (":path", Value::text("/")),
            ("foo", Value::text("124")),
        ]);
        let mut block = Vec::new();
        encoder.serialize(&mut block, &second).unwrap();
        let ops = parse_ops(&block);
        assert_eq!(ops.stoggl.len(), 1);
        assert_eq!(ops.sclone.len(), 1);
        assert!(ops.skvsto.is_empty());
        // ":path" is ephemeral by default and recurs every message.
        assert_eq!(ops.eclone.len(), 1);

        let mut sink = HeaderSet::new();
        decoder.deserialize(&block, &mut sink).unwrap();
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&second));
    }

    /// UT test cases for ephemeral isolation.
    ///
    /// # Brief
    /// 1. Sends a default-ephemeral header and checks no dictionary entry
    ///    is created on either side.
    /// 2. Checks the pair does not recur in the next message.
    #[test]
    fn ut_codec_ephemeral_isolation() {
        let mut encoder = DeltaCodec::new(1);
        let mut decoder = DeltaCodec::new(1);

        let set = headers(&[("authorization", Value::text("Bearer xyz"))]);
        let sink = exchange(&mut encoder, &mut decoder, &set);
        assert!(sink.contains("authorization", &Value::text("Bearer xyz")));
        assert_eq!(encoder.local.group_mut(1).storage.len(), 0);
        assert_eq!(decoder.remote.group_mut(1).storage.len(), 0);

        let sink = exchange(&mut encoder, &mut decoder, &headers(&[]));
        assert!(sink.is_empty());
    }

    /// UT test cases for Huffman-coded exchanges.
    ///
    /// # Brief
    /// 1. Runs a round trip with Huffman coding on matching tables,
    ///    including non-Latin text.
    #[test]
    fn ut_codec_huffman_round_trip() {
        let mut encoder = DeltaCodec::with_huffman(1, HuffmanTable::Request);
        let mut decoder = DeltaCodec::with_huffman(1, HuffmanTable::Request);

        let set = headers(&[
            (":path", Value::text("/search?q=caf\u{e9}")),
            ("x-note", Value::text("\u{4e2d}\u{6587}")),
        ]);
        let sink = exchange(&mut encoder, &mut decoder, &set);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set));
    }

    /// UT test cases for typed values surviving a round trip.
    ///
    /// # Brief
    /// 1. Sends number, date, binary and multi-item text values.
    /// 2. Checks types are preserved, not flattened to text.
    #[test]
    fn ut_codec_typed_values() {
        let mut encoder = DeltaCodec::new(1);
        let mut decoder = DeltaCodec::new(1);

        let set = headers(&[
            (":status", Value::number(404)),
            ("x-expires", Value::date(1_382_386_401)),
            ("x-blob", Value::binary(vec![0, 1, 2, 0xff])),
            (
                "cookie",
                Value::texts(vec!["a=1".to_string(), "b=2".to_string()]),
            ),
        ]);
        let sink = exchange(&mut encoder, &mut decoder, &set);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set));
    }

    /// UT test cases for decode failures.
    ///
    /// # Brief
    /// 1. Feeds an empty block, a dangling toggle and an unknown opcode.
    /// 2. Checks each fails with the right fatal error.
    #[test]
    fn ut_codec_decode_errors() {
        let mut codec = DeltaCodec::new(1);
        let mut sink = HeaderSet::new();

        let err = codec.deserialize(&[], &mut sink).unwrap_err();
        assert_eq!(err.decode_error(), Some(&DecodeError::UnexpectedEof));
        assert!(err.is_fatal());

        // Toggle of dynamic index 200 with an empty dictionary.
        let block = from_hex("010000c801").unwrap();
        let err = codec.deserialize(&block, &mut sink).unwrap_err();
        assert_eq!(err.decode_error(), Some(&DecodeError::DanglingIndex(200)));

        let block = from_hex("010f00").unwrap();
        let err = codec.deserialize(&block, &mut sink).unwrap_err();
        assert_eq!(err.decode_error(), Some(&DecodeError::InvalidOpcode(0x0f)));
    }

    /// UT test cases for encode failures leaving state untouched.
    ///
    /// # Brief
    /// 1. Tries to encode an unstorable header and checks the error.
    /// 2. Checks a following well-formed message still round-trips.
    #[test]
    fn ut_codec_encode_recoverable() {
        let mut encoder = DeltaCodec::new(1);
        let mut decoder = DeltaCodec::new(1);

        let huge = headers(&[("x-big", Value::binary(vec![0u8; 8192]))]);
        let mut block = Vec::new();
        let err = encoder.serialize(&mut block, &huge).unwrap_err();
        assert!(err.encode_error().is_some());
        assert!(!err.is_fatal());
        assert!(block.is_empty());

        let empty_text = headers(&[("x-bad", Value::Text(Vec::new()))]);
        assert!(encoder.serialize(&mut block, &empty_text).is_err());

        let set = headers(&[(":method", Value::text("get"))]);
        let sink = exchange(&mut encoder, &mut decoder, &set);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set));
    }

    /// UT test cases for independent group contexts.
    ///
    /// # Brief
    /// 1. Interleaves two decoders' worth of groups through one decoder.
    /// 2. Checks state stored under one group id is invisible to another.
    #[test]
    fn ut_codec_group_isolation() {
        let mut encoder_a = DeltaCodec::new(1);
        let mut encoder_b = DeltaCodec::new(2);
        let mut decoder = DeltaCodec::new(0);

        let set_a = headers(&[("x-group", Value::text("a"))]);
        let set_b = headers(&[("x-group", Value::text("b"))]);
        let sink = exchange(&mut encoder_a, &mut decoder, &set_a);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set_a));
        let sink = exchange(&mut encoder_b, &mut decoder, &set_b);
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set_b));

        // Steady state of group 1 is unaffected by group 2 traffic.
        let mut block = Vec::new();
        encoder_a.serialize(&mut block, &set_a).unwrap();
        assert_eq!(block, [1]);
        let mut sink = HeaderSet::new();
        decoder.deserialize(&block, &mut sink).unwrap();
        assert_eq!(sorted_pairs(&sink), sorted_pairs(&set_a));
    }

    /// UT test cases for ephemeral toggles on the wire.
    ///
    /// # Brief
    /// 1. Activates a static entry, then sends a hand-built ephemeral
    ///    toggle for it and checks the pair is suppressed once.
    #[test]
    fn ut_codec_ephemeral_toggle_suppression() {
        let mut decoder = DeltaCodec::new(0);
        let mut sink = HeaderSet::new();

        // Static index 4 is (":method", "get"); toggle it on.
        decoder.deserialize(&[7, 0x00, 0x00, 0x04], &mut sink).unwrap();
        assert!(sink.contains(":method", &Value::text("get")));

        // An ephemeral toggle of an active entry suppresses it for one
        // message.
        let mut sink = HeaderSet::new();
        decoder.deserialize(&[7, 0x01, 0x00, 0x04], &mut sink).unwrap();
        assert!(sink.is_empty());

        // It returns with the steady state afterwards.
        let mut sink = HeaderSet::new();
        decoder.deserialize(&[7], &mut sink).unwrap();
        assert!(sink.contains(":method", &Value::text("get")));

        // An ephemeral toggle of an inactive entry emits it once.
        let mut sink = HeaderSet::new();
        decoder.deserialize(&[7, 0x01, 0x00, 0x0b], &mut sink).unwrap();
        assert!(sink.contains(":path", &Value::text("/")));
        let mut sink = HeaderSet::new();
        decoder.deserialize(&[7], &mut sink).unwrap();
        assert!(!sink.contains(":path", &Value::text("/")));
    }
}
