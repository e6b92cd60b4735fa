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

//! Static Huffman coding for header text.
//!
//! Two fixed tables exist, one tuned for request header text and one for
//! response header text. Both share the alphabet described in `consts`:
//! codepoints 0..=255 are coded directly, larger codepoints are coded as an
//! escape symbol followed by a raw bit field, and a dedicated EOF symbol
//! terminates every string so trailing pad bits are never misread.
//!
//! Codes are canonical: symbols are ranked by expected frequency, lengths
//! are taken from a shared ladder, and code values are assigned in rank
//! order starting from zero, shifting left whenever the length grows.

mod consts;

use consts::{
    EOF, ESC_11, ESC_16, ESC_21, ESC_26, ESC_31, LENGTH_LADDER, REQUEST_RANK_HEAD,
    RESPONSE_RANK_HEAD, SYMBOLS,
};

use crate::error::DecodeError;
use crate::util::bit_bucket::BitBucket;

/// Selects which fixed Huffman table a codec uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum HuffmanTable {
    /// The table tuned for request header text.
    Request,

    /// The table tuned for response header text.
    Response,
}

const NO_SYMBOL: u16 = u16::MAX;

struct Node {
    // Child arena indices, 0 meaning absent (the root is never a child).
    next: [usize; 2],
    symbol: u16,
}

pub(crate) struct Huffman {
    // Indexed by symbol.
    codes: Vec<(u32, u8)>,
    nodes: Vec<Node>,
}

impl Huffman {
    pub(crate) fn new(table: HuffmanTable) -> Self {
        let head = match table {
            HuffmanTable::Request => REQUEST_RANK_HEAD,
            HuffmanTable::Response => RESPONSE_RANK_HEAD,
        };
        let mut ranks = Vec::with_capacity(SYMBOLS);
        let mut seen = [false; SYMBOLS];
        for &symbol in head {
            seen[symbol as usize] = true;
            ranks.push(symbol);
        }
        for symbol in 0..SYMBOLS as u16 {
            if !seen[symbol as usize] {
                ranks.push(symbol);
            }
        }

        let mut codes = vec![(0u32, 0u8); SYMBOLS];
        let mut nodes = vec![Node {
            next: [0, 0],
            symbol: NO_SYMBOL,
        }];
        let mut code = 0u32;
        let mut prev_len = 0u8;
        let mut rank = ranks.into_iter();
        for &(count, len) in LENGTH_LADDER {
            code <<= len - prev_len;
            prev_len = len;
            for _ in 0..count {
                let symbol = match rank.next() {
                    Some(symbol) => symbol,
                    None => break,
                };
                codes[symbol as usize] = (code, len);
                Self::insert(&mut nodes, code, len, symbol);
                code += 1;
            }
        }
        Self { codes, nodes }
    }

    fn insert(nodes: &mut Vec<Node>, code: u32, len: u8, symbol: u16) {
        let mut node = 0;
        for shift in (0..len).rev() {
            let bit = ((code >> shift) & 1) as usize;
            if nodes[node].next[bit] == 0 {
                nodes.push(Node {
                    next: [0, 0],
                    symbol: NO_SYMBOL,
                });
                let child = nodes.len() - 1;
                nodes[node].next[bit] = child;
            }
            node = nodes[node].next[bit];
        }
        nodes[node].symbol = symbol;
    }

    fn store_symbol(&self, symbol: u16, dst: &mut BitBucket) {
        let (code, len) = self.codes[symbol as usize];
        dst.store_bits(u64::from(code), len as usize);
    }

    /// Encodes `text` into `dst`, appending the EOF code and padding the
    /// final byte with 1-bits.
    pub(crate) fn encode(&self, text: &str, dst: &mut BitBucket) {
        for ch in text.chars() {
            let cp = ch as u32;
            if cp < 256 {
                self.store_symbol(cp as u16, dst);
                continue;
            }
            let (escape, width) = match cp {
                0..=0x7ff => (ESC_11, 11),
                0x800..=0xffff => (ESC_16, 16),
                0x1_0000..=0x1f_ffff => (ESC_21, 21),
                0x20_0000..=0x3ff_ffff => (ESC_26, 26),
                _ => (ESC_31, 31),
            };
            self.store_symbol(escape, dst);
            dst.store_bits(u64::from(cp), width);
        }
        self.store_symbol(EOF, dst);
        dst.pad_ones();
    }

    /// Encodes `text` as a standalone byte string.
    pub(crate) fn encode_to_bytes(&self, text: &str) -> Vec<u8> {
        let mut bits = BitBucket::new();
        self.encode(text, &mut bits);
        let mut bytes = Vec::new();
        bits.flush_to(&mut bytes);
        bytes
    }

    /// Decodes a byte string produced by [`Huffman::encode`].
    ///
    /// Stops at the EOF symbol; pad bits after it are never examined.
    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<String, DecodeError> {
        let mut bits = BitBucket::from_bytes(bytes);
        let mut text = String::new();
        loop {
            let symbol = self.next_symbol(&mut bits)?;
            let raw = match symbol {
                EOF => return Ok(text),
                ESC_11 => bits.get_bits(11),
                ESC_16 => bits.get_bits(16),
                ESC_21 => bits.get_bits(21),
                ESC_26 => bits.get_bits(26),
                ESC_31 => bits.get_bits(31),
                literal => {
                    text.push(literal as u8 as char);
                    continue;
                }
            };
            let cp = raw.map_err(|_| DecodeError::InvalidHuffmanCode)?;
            match u32::try_from(cp).ok().and_then(char::from_u32) {
                Some(ch) => text.push(ch),
                None => return Err(DecodeError::InvalidHuffmanCode),
            }
        }
    }

    fn next_symbol(&self, bits: &mut BitBucket) -> Result<u16, DecodeError> {
        let mut node = 0;
        loop {
            let bit = bits
                .get_bit()
                .map_err(|_| DecodeError::InvalidHuffmanCode)?;
            node = self.nodes[node].next[usize::from(bit)];
            if node == 0 {
                return Err(DecodeError::InvalidHuffmanCode);
            }
            let symbol = self.nodes[node].symbol;
            if symbol != NO_SYMBOL {
                return Ok(symbol);
            }
        }
    }
}
