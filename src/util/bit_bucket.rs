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

//! An append-only bit buffer for Huffman coding.
//!
//! Bits are stored most-significant first within each byte and read back in
//! the same order. The buffer tracks its write and read positions at bit
//! granularity, so variable-width fields can be packed without padding
//! between them.

use crate::error::DecodeError;

pub(crate) struct BitBucket {
    buf: Vec<u8>,
    write_pos: usize,
    read_pos: usize,
}

impl BitBucket {
    pub(crate) fn new() -> Self {
        Self {
            buf: Vec::new(),
            write_pos: 0,
            read_pos: 0,
        }
    }

    /// Creates a read-only view positioned at the first bit of `bytes`.
    pub(crate) fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            buf: bytes.to_vec(),
            write_pos: bytes.len() * 8,
            read_pos: 0,
        }
    }

    pub(crate) fn store_bit(&mut self, on: bool) {
        if self.write_pos == self.buf.len() * 8 {
            self.buf.push(0);
        }
        if on {
            self.buf[self.write_pos / 8] |= 0x80 >> (self.write_pos % 8);
        }
        self.write_pos += 1;
    }

    /// Appends the low `width` bits of `value`, most-significant first.
    ///
    /// `width` must be in `1..=64`.
    pub(crate) fn store_bits(&mut self, value: u64, width: usize) {
        debug_assert!((1..=64).contains(&width));
        for shift in (0..width).rev() {
            self.store_bit((value >> shift) & 1 == 1);
        }
    }

    pub(crate) fn get_bit(&mut self) -> Result<bool, DecodeError> {
        if self.read_pos >= self.write_pos {
            return Err(DecodeError::UnexpectedEof);
        }
        let on = self.buf[self.read_pos / 8] & (0x80 >> (self.read_pos % 8)) != 0;
        self.read_pos += 1;
        Ok(on)
    }

    /// Reads `width` bits, most-significant first. `width` must be in
    /// `1..=64`.
    pub(crate) fn get_bits(&mut self, width: usize) -> Result<u64, DecodeError> {
        debug_assert!((1..=64).contains(&width));
        let mut value = 0u64;
        for _ in 0..width {
            value = (value << 1) | u64::from(self.get_bit()?);
        }
        Ok(value)
    }

    /// Fills the final partial byte with 1-bits so the buffer ends on a
    /// byte boundary.
    pub(crate) fn pad_ones(&mut self) {
        while self.write_pos % 8 != 0 {
            self.store_bit(true);
        }
    }

    /// Appends every written byte to `dst`, including a trailing partial
    /// byte if padding was skipped.
    pub(crate) fn flush_to(&self, dst: &mut Vec<u8>) {
        let used = (self.write_pos + 7) / 8;
        dst.extend_from_slice(&self.buf[..used]);
    }
}
