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

//! Unsigned variable-length integers.
//!
//! Each byte carries 7 payload bits, least-significant group first, with the
//! high bit set on every byte except the last. A `u64` needs at most 10
//! bytes; an 11th continuation byte is rejected as [`IntegerOverflow`].
//!
//! [`IntegerOverflow`]: crate::error::DecodeError::IntegerOverflow

use crate::error::DecodeError;
use crate::util::cursor::ByteReader;

const MAX_BYTES: usize = 10;

pub(crate) fn write_uvarint(mut num: u64, dst: &mut Vec<u8>) {
    loop {
        let rest = num >> 7;
        let mut byte = (num & 0x7f) as u8;
        if rest != 0 {
            byte |= 0x80;
        }
        dst.push(byte);
        if rest == 0 {
            return;
        }
        num = rest;
    }
}

pub(crate) fn read_uvarint(reader: &mut ByteReader<'_>) -> Result<u64, DecodeError> {
    let mut num = 0u64;
    for count in 0..MAX_BYTES {
        let byte = reader.next_byte()?;
        let payload = u64::from(byte & 0x7f);
        // The tenth byte has one payload bit left in a u64.
        if count == MAX_BYTES - 1 && payload > 1 {
            return Err(DecodeError::IntegerOverflow);
        }
        num |= payload << (7 * count);
        if byte & 0x80 == 0 {
            return Ok(num);
        }
    }
    Err(DecodeError::IntegerOverflow)
}

/// Returns the number of bytes `num` occupies on the wire.
pub(crate) fn uvarint_size(num: u64) -> usize {
    let mut size = 1;
    let mut rest = num >> 7;
    while rest != 0 {
        size += 1;
        rest >>= 7;
    }
    size
}

#[cfg(test)]
mod ut_uvarint {
    use super::{read_uvarint, uvarint_size, write_uvarint};
    use crate::error::DecodeError;
    use crate::util::cursor::ByteReader;

    /// UT test cases for uvarint round trips.
    ///
    /// # Brief
    /// 1. Encodes boundary values and decodes them back.
    /// 2. Checks the wire size of each encoding.
    #[test]
    fn ut_uvarint_round_trip() {
        for num in [
            0u64,
            1,
            0x7f,
            0x80,
            0x3fff,
            0x4000,
            300,
            u32::MAX as u64,
            u64::MAX,
        ] {
            let mut bytes = Vec::new();
            write_uvarint(num, &mut bytes);
            assert_eq!(bytes.len(), uvarint_size(num));
            let mut reader = ByteReader::new(&bytes);
            assert_eq!(read_uvarint(&mut reader), Ok(num));
            assert!(reader.is_empty());
        }
    }

    /// UT test cases for uvarint wire bytes.
    ///
    /// # Brief
    /// 1. Checks the exact byte sequences of a few known encodings.
    #[test]
    fn ut_uvarint_wire_format() {
        let mut bytes = Vec::new();
        write_uvarint(0, &mut bytes);
        assert_eq!(bytes, [0x00]);

        bytes.clear();
        write_uvarint(0x7f, &mut bytes);
        assert_eq!(bytes, [0x7f]);

        bytes.clear();
        write_uvarint(300, &mut bytes);
        assert_eq!(bytes, [0xac, 0x02]);

        bytes.clear();
        write_uvarint(u64::MAX, &mut bytes);
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[9], 0x01);
    }

    /// UT test cases for uvarint overflow rejection.
    ///
    /// # Brief
    /// 1. Feeds 10 continuation bytes and checks for `IntegerOverflow`.
    /// 2. Feeds a 10-byte encoding whose final payload exceeds a u64 and
    ///    checks it is rejected rather than wrapped.
    /// 3. Feeds a truncated encoding and checks for `UnexpectedEof`.
    #[test]
    fn ut_uvarint_overflow() {
        let bytes = [0xffu8; 11];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_uvarint(&mut reader), Err(DecodeError::IntegerOverflow));

        // Nine continuation bytes leave one payload bit for the tenth.
        let mut bytes = [0x80u8; 10];
        bytes[9] = 0x02;
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_uvarint(&mut reader), Err(DecodeError::IntegerOverflow));

        bytes[9] = 0x01;
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_uvarint(&mut reader), Ok(1u64 << 63));

        let bytes = [0x80u8, 0x80];
        let mut reader = ByteReader::new(&bytes);
        assert_eq!(read_uvarint(&mut reader), Err(DecodeError::UnexpectedEof));
    }
}
