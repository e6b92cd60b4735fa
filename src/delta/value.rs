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

//! Wire format of typed header values.
//!
//! Every value starts with a flags byte:
//!
//! ```text
//!   0 1 2 3 4 5 6 7
//! +---+---+---+---+---+---+---+---+
//! | Type  | U | H |   Reserved    |
//! +---+---+---+---+---+---+---+---+
//! ```
//!
//! `Type` selects text (00), number (01), date (10) or binary (11). `U`
//! marks text items as UTF-8 rather than single-byte codepoints, `H` marks
//! them as Huffman-coded. The payload follows:
//!
//! - Text: `[item count - 1]` then per item a uvarint byte length and the
//!   item bytes (1..=256 items).
//! - Number and date: one uvarint (dates are seconds since the Unix epoch).
//! - Binary: a uvarint byte length and the raw bytes.

use crate::error::{DecodeError, DeltaError, EncodeError};
use crate::headers::Value;
use crate::huffman::Huffman;
use crate::util::cursor::ByteReader;
use crate::util::uvarint::{read_uvarint, write_uvarint};

pub(crate) const TYPE_MASK: u8 = 0xc0;
pub(crate) const TYPE_TEXT: u8 = 0x00;
pub(crate) const TYPE_NUMBER: u8 = 0x40;
pub(crate) const TYPE_DATE: u8 = 0x80;
pub(crate) const TYPE_BINARY: u8 = 0xc0;
pub(crate) const FLAG_UTF8: u8 = 0x20;
pub(crate) const FLAG_HUFFMAN: u8 = 0x10;

pub(crate) const MAX_TEXT_ITEMS: usize = 256;

/// Writes the flags byte and payload of `value` to `dst`.
///
/// Text items are Huffman-coded when `huffman` is given and are always
/// written as UTF-8 otherwise.
pub(crate) fn write_value(
    value: &Value,
    huffman: Option<&Huffman>,
    dst: &mut Vec<u8>,
) -> Result<(), DeltaError> {
    match value {
        Value::Text(items) => {
            if items.is_empty() {
                return Err(EncodeError::EmptyTextValue.into());
            }
            if items.len() > MAX_TEXT_ITEMS {
                return Err(EncodeError::TooManyTextItems(items.len()).into());
            }
            let mut flags = TYPE_TEXT | FLAG_UTF8;
            if huffman.is_some() {
                flags |= FLAG_HUFFMAN;
            }
            dst.push(flags);
            dst.push((items.len() - 1) as u8);
            for item in items {
                match huffman {
                    Some(huffman) => {
                        let coded = huffman.encode_to_bytes(item);
                        write_uvarint(coded.len() as u64, dst);
                        dst.extend_from_slice(&coded);
                    }
                    None => {
                        write_uvarint(item.len() as u64, dst);
                        dst.extend_from_slice(item.as_bytes());
                    }
                }
            }
        }
        Value::Number(num) => {
            dst.push(TYPE_NUMBER);
            write_uvarint(*num, dst);
        }
        Value::Date(secs) => {
            dst.push(TYPE_DATE);
            write_uvarint(*secs, dst);
        }
        Value::Binary(bytes) => {
            dst.push(TYPE_BINARY);
            write_uvarint(bytes.len() as u64, dst);
            dst.extend_from_slice(bytes);
        }
    }
    Ok(())
}

/// Reads a flags byte and payload from `reader`.
pub(crate) fn read_value(
    reader: &mut ByteReader<'_>,
    huffman: &Huffman,
) -> Result<Value, DeltaError> {
    let flags = reader.next_byte()?;
    if flags & 0x0f != 0 {
        return Err(DecodeError::InvalidValueFlags(flags).into());
    }
    let type_bits = flags & TYPE_MASK;
    // The text flags mean nothing on the other types.
    if type_bits != TYPE_TEXT && flags & (FLAG_UTF8 | FLAG_HUFFMAN) != 0 {
        return Err(DecodeError::InvalidValueFlags(flags).into());
    }
    match type_bits {
        TYPE_TEXT => {
            let count = reader.next_byte()? as usize + 1;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                let len = read_uvarint(reader)? as usize;
                let bytes = reader.read_slice(len)?;
                items.push(read_text_item(flags, bytes, huffman)?);
            }
            Ok(Value::Text(items))
        }
        TYPE_NUMBER => Ok(Value::Number(read_uvarint(reader)?)),
        TYPE_DATE => Ok(Value::Date(read_uvarint(reader)?)),
        _ => {
            let len = read_uvarint(reader)? as usize;
            let bytes = reader.read_slice(len)?;
            Ok(Value::Binary(bytes.to_vec()))
        }
    }
}

fn read_text_item(flags: u8, bytes: &[u8], huffman: &Huffman) -> Result<String, DeltaError> {
    if flags & FLAG_HUFFMAN != 0 {
        return Ok(huffman.decode(bytes)?);
    }
    if flags & FLAG_UTF8 != 0 {
        return String::from_utf8(bytes.to_vec())
            .map_err(|_| DecodeError::InvalidUtf8.into());
    }
    // Single-byte codepoints, one char per byte.
    Ok(bytes.iter().map(|&b| b as char).collect())
}

/// Returns the dictionary charge of `value`: the byte size of its
/// uncompressed payload.
pub(crate) fn charge_size(value: &Value) -> usize {
    use crate::util::uvarint::uvarint_size;
    match value {
        Value::Text(items) => 1 + items
            .iter()
            .map(|item| uvarint_size(item.len() as u64) + item.len())
            .sum::<usize>(),
        Value::Number(num) | Value::Date(num) => uvarint_size(*num),
        Value::Binary(bytes) => uvarint_size(bytes.len() as u64) + bytes.len(),
    }
}

#[cfg(test)]
mod ut_value {
    use super::{read_value, write_value, FLAG_HUFFMAN, FLAG_UTF8, TYPE_NUMBER, TYPE_TEXT};
    use crate::error::DecodeError;
    use crate::headers::Value;
    use crate::huffman::{Huffman, HuffmanTable};
    use crate::util::cursor::ByteReader;

    fn round_trip(value: &Value, use_huffman: bool) {
        let huffman = Huffman::new(HuffmanTable::Request);
        let mut bytes = Vec::new();
        write_value(value, use_huffman.then_some(&huffman), &mut bytes).unwrap();
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_value(&mut reader, &huffman).unwrap(), *value);
        assert!(reader.is_empty());
    }

    /// UT test cases for value round trips of all four types.
    ///
    /// # Brief
    /// 1. Writes each value type and reads it back, with and without
    ///    Huffman coding for text.
    #[test]
    fn ut_value_round_trip() {
        for use_huffman in [false, true] {
            round_trip(&Value::text("text/html"), use_huffman);
            round_trip(&Value::text(""), use_huffman);
            round_trip(
                &Value::texts(vec!["a=1".to_string(), "b=2".to_string(), String::new()]),
                use_huffman,
            );
            round_trip(&Value::text("\u{4e2d}\u{6587}"), use_huffman);
        }
        round_trip(&Value::number(0), false);
        round_trip(&Value::number(u64::MAX), false);
        round_trip(&Value::date(1_382_386_401), false);
        round_trip(&Value::binary(vec![0x00, 0xff, 0x80]), false);
        round_trip(&Value::binary(Vec::new()), false);
    }

    /// UT test cases for text value limits.
    ///
    /// # Brief
    /// 1. Checks that empty item lists and oversized item lists are
    ///    rejected before writing.
    #[test]
    fn ut_value_text_limits() {
        let mut bytes = Vec::new();
        let err = write_value(&Value::Text(Vec::new()), None, &mut bytes).unwrap_err();
        assert!(err.encode_error().is_some());
        assert!(bytes.is_empty());

        let items = vec![String::new(); 257];
        let err = write_value(&Value::Text(items), None, &mut bytes).unwrap_err();
        assert!(err.encode_error().is_some());
        assert!(bytes.is_empty());
    }

    /// UT test cases for malformed value bytes.
    ///
    /// # Brief
    /// 1. Checks reserved flag bits, invalid UTF-8 and truncation.
    #[test]
    fn ut_value_read_invalid() {
        let huffman = Huffman::new(HuffmanTable::Request);

        let bytes = [TYPE_TEXT | 0x01];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            read_value(&mut reader, &huffman)
                .unwrap_err()
                .decode_error(),
            Some(&DecodeError::InvalidValueFlags(0x01))
        );

        // One item of length 1 whose byte is not valid UTF-8.
        let bytes = [TYPE_TEXT | FLAG_UTF8, 0x00, 0x01, 0xff];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            read_value(&mut reader, &huffman)
                .unwrap_err()
                .decode_error(),
            Some(&DecodeError::InvalidUtf8)
        );

        // Same byte without the UTF-8 flag decodes as a single-byte char.
        let bytes = [TYPE_TEXT, 0x00, 0x01, 0xff];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            read_value(&mut reader, &huffman).unwrap(),
            Value::text("\u{ff}")
        );

        let bytes = [TYPE_NUMBER];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(
            read_value(&mut reader, &huffman)
                .unwrap_err()
                .decode_error(),
            Some(&DecodeError::UnexpectedEof)
        );

        let bytes = [super::TYPE_BINARY | FLAG_HUFFMAN, 0x00];
        let mut reader = ByteReader::new(&bytes);
        assert!(read_value(&mut reader, &huffman).is_err());
    }

    /// UT test cases for text flags on non-text types.
    ///
    /// # Brief
    /// 1. Checks the UTF-8 and Huffman bits are rejected on number, date
    ///    and binary values alike.
    #[test]
    fn ut_value_text_flags_rejected_off_text() {
        let huffman = Huffman::new(HuffmanTable::Request);
        for flags in [
            TYPE_NUMBER | FLAG_UTF8,
            TYPE_NUMBER | FLAG_HUFFMAN,
            super::TYPE_DATE | FLAG_UTF8,
            super::TYPE_DATE | FLAG_HUFFMAN,
            super::TYPE_BINARY | FLAG_UTF8,
        ] {
            let bytes = [flags, 0x00];
            let mut reader = ByteReader::new(&bytes);
            assert_eq!(
                read_value(&mut reader, &huffman)
                    .unwrap_err()
                    .decode_error(),
                Some(&DecodeError::InvalidValueFlags(flags))
            );
        }
    }
}
