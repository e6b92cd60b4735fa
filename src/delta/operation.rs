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

//! The operation protocol carried in a serialized header block.
//!
//! After the leading group-id byte, a block is a sequence of op groups:
//!
//! ```text
//! +----------+-----------+----------------------+
//! |  opcode  | count - 1 |  `count` operands    |
//! +----------+-----------+----------------------+
//! ```
//!
//! Four operations exist, each in a stateful (`s`) and an ephemeral (`e`)
//! flavor: Toggle flips one active index, ToggleRange flips a contiguous
//! index range, Clone stores the value of an existing entry's name under a
//! new index, and Literal stores a fresh name/value pair. Ephemeral flavors
//! affect only the message that carries them and never touch the
//! dictionary. A group holds at most 256 operations; longer runs repeat
//! the opcode.

use crate::error::{DecodeError, DeltaError, EncodeError};
use crate::headers::Value;
use crate::huffman::Huffman;
use crate::util::cursor::ByteReader;
use crate::util::uvarint::{read_uvarint, write_uvarint};

use crate::delta::value::{read_value, write_value};

pub(crate) const STOGGL: u8 = 0x0;
pub(crate) const ETOGGL: u8 = 0x1;
pub(crate) const STRANG: u8 = 0x2;
pub(crate) const ETRANG: u8 = 0x3;
pub(crate) const SKVSTO: u8 = 0x4;
pub(crate) const EKVSTO: u8 = 0x5;
pub(crate) const SCLONE: u8 = 0x6;
pub(crate) const ECLONE: u8 = 0x7;

/// Operations per op group.
const MAX_GROUP_OPS: usize = 256;

/// Longest wire-legal header name.
const MAX_NAME_LEN: usize = 0xff;

/// Queued toggles needed before runs are folded into ranges.
const COMPACTION_THRESHOLD: usize = 7;

/// The operations of one message, grouped by kind.
///
/// Within a kind, order on the wire is queue order; across kinds the
/// serialization order below is fixed so both peers apply dictionary
/// mutations identically.
#[derive(Debug, Default)]
pub(crate) struct OpSet {
    pub(crate) stoggl: Vec<usize>,
    pub(crate) etoggl: Vec<usize>,
    pub(crate) strang: Vec<(usize, usize)>,
    pub(crate) etrang: Vec<(usize, usize)>,
    pub(crate) eclone: Vec<(usize, Value)>,
    pub(crate) ekvsto: Vec<(String, Value)>,
    pub(crate) sclone: Vec<(usize, Value)>,
    pub(crate) skvsto: Vec<(String, Value)>,
}

impl OpSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Folds queued toggles into ranges once at least
    /// [`COMPACTION_THRESHOLD`] of them are pending: every run of two or
    /// more consecutive indices becomes one range op.
    pub(crate) fn compact_toggles(&mut self) {
        if self.stoggl.len() < COMPACTION_THRESHOLD {
            return;
        }
        self.stoggl.sort_unstable();
        let mut singles = Vec::new();
        let mut run = 0;
        for pos in 0..self.stoggl.len() {
            run += 1;
            let last = pos + 1 == self.stoggl.len();
            if !last && self.stoggl[pos + 1] == self.stoggl[pos] + 1 {
                continue;
            }
            if run >= 2 {
                self.strang
                    .push((self.stoggl[pos + 1 - run], self.stoggl[pos]));
            } else {
                singles.push(self.stoggl[pos]);
            }
            run = 0;
        }
        self.stoggl = singles;
    }

    /// Serializes every op group in the fixed cross-kind order.
    pub(crate) fn serialize_to(
        &self,
        dst: &mut Vec<u8>,
        huffman: Option<&Huffman>,
    ) -> Result<(), DeltaError> {
        write_group(dst, STOGGL, &self.stoggl, |&index, dst| {
            write_uvarint(index as u64, dst);
            Ok(())
        })?;
        write_group(dst, ETOGGL, &self.etoggl, |&index, dst| {
            write_uvarint(index as u64, dst);
            Ok(())
        })?;
        write_group(dst, STRANG, &self.strang, |&(start, end), dst| {
            write_uvarint(start as u64, dst);
            write_uvarint(end as u64, dst);
            Ok(())
        })?;
        write_group(dst, ETRANG, &self.etrang, |&(start, end), dst| {
            write_uvarint(start as u64, dst);
            write_uvarint(end as u64, dst);
            Ok(())
        })?;
        write_group(dst, ECLONE, &self.eclone, |(index, value), dst| {
            write_uvarint(*index as u64, dst);
            write_value(value, huffman, dst)
        })?;
        write_group(dst, EKVSTO, &self.ekvsto, |(name, value), dst| {
            write_name(name, dst)?;
            write_value(value, huffman, dst)
        })?;
        write_group(dst, SCLONE, &self.sclone, |(index, value), dst| {
            write_uvarint(*index as u64, dst);
            write_value(value, huffman, dst)
        })?;
        write_group(dst, SKVSTO, &self.skvsto, |(name, value), dst| {
            write_name(name, dst)?;
            write_value(value, huffman, dst)
        })
    }

    /// Parses op groups until `reader` is exhausted.
    pub(crate) fn parse_from(
        reader: &mut ByteReader<'_>,
        huffman: &Huffman,
    ) -> Result<Self, DeltaError> {
        let mut ops = OpSet::new();
        while !reader.is_empty() {
            let opcode = reader.next_byte()?;
            let count = reader.next_byte()? as usize + 1;
            for _ in 0..count {
                match opcode {
                    STOGGL => ops.stoggl.push(read_index(reader)?),
                    ETOGGL => ops.etoggl.push(read_index(reader)?),
                    STRANG => ops.strang.push(read_range(reader)?),
                    ETRANG => ops.etrang.push(read_range(reader)?),
                    ECLONE => ops.eclone.push(read_clone(reader, huffman)?),
                    EKVSTO => ops.ekvsto.push(read_literal(reader, huffman)?),
                    SCLONE => ops.sclone.push(read_clone(reader, huffman)?),
                    SKVSTO => ops.skvsto.push(read_literal(reader, huffman)?),
                    other => return Err(DecodeError::InvalidOpcode(other).into()),
                }
            }
        }
        Ok(ops)
    }
}

fn write_group<T>(
    dst: &mut Vec<u8>,
    opcode: u8,
    items: &[T],
    mut write: impl FnMut(&T, &mut Vec<u8>) -> Result<(), DeltaError>,
) -> Result<(), DeltaError> {
    for chunk in items.chunks(MAX_GROUP_OPS) {
        dst.push(opcode);
        dst.push((chunk.len() - 1) as u8);
        for item in chunk {
            write(item, dst)?;
        }
    }
    Ok(())
}

fn write_name(name: &str, dst: &mut Vec<u8>) -> Result<(), DeltaError> {
    if name.len() > MAX_NAME_LEN {
        return Err(EncodeError::NameTooLong(name.len()).into());
    }
    dst.push(name.len() as u8);
    dst.extend_from_slice(name.as_bytes());
    Ok(())
}

fn read_index(reader: &mut ByteReader<'_>) -> Result<usize, DeltaError> {
    Ok(read_uvarint(reader)? as usize)
}

fn read_range(reader: &mut ByteReader<'_>) -> Result<(usize, usize), DeltaError> {
    let start = read_index(reader)?;
    let end = read_index(reader)?;
    Ok((start, end))
}

fn read_clone(
    reader: &mut ByteReader<'_>,
    huffman: &Huffman,
) -> Result<(usize, Value), DeltaError> {
    let index = read_index(reader)?;
    let value = read_value(reader, huffman)?;
    Ok((index, value))
}

fn read_literal(
    reader: &mut ByteReader<'_>,
    huffman: &Huffman,
) -> Result<(String, Value), DeltaError> {
    let len = reader.next_byte()? as usize;
    let bytes = reader.read_slice(len)?;
    let name = String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8)?;
    let value = read_value(reader, huffman)?;
    Ok((name, value))
}
