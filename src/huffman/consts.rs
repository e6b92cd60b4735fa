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

//! Symbol space and frequency rankings for the two Huffman tables.
//!
//! The alphabet has 262 symbols: 0..=255 stand for themselves as Unicode
//! codepoints, [`EOF`] terminates a string, and [`ESC_11`]..[`ESC_31`]
//! prefix a raw MSB-first codepoint field of 11, 16, 21, 26 or 31 bits for
//! codepoints above 255.
//!
//! Code lengths come from one shared ladder ([`LENGTH_LADDER`]); the two
//! tables differ only in how symbols are ranked. Each ranking lists its 60
//! most frequent symbols explicitly (filling the 4..=8 bit tiers); all
//! remaining symbols follow in ascending symbol order and land in the
//! longer tiers.

/// Number of symbols in the Huffman alphabet.
pub(super) const SYMBOLS: usize = 262;

/// End-of-string marker.
pub(super) const EOF: u16 = 256;

/// Escapes for codepoints above 255, by raw field width.
pub(super) const ESC_11: u16 = 257;
pub(super) const ESC_16: u16 = 258;
pub(super) const ESC_21: u16 = 259;
pub(super) const ESC_26: u16 = 260;
pub(super) const ESC_31: u16 = 261;

/// `(count, bits)` pairs assigning code lengths to symbols in rank order.
///
/// Counts sum to [`SYMBOLS`]. The canonical code built over this ladder
/// stays within each length tier: with 4 codes of 4 bits the 5-bit tier
/// starts at code 8, the 6-bit tier at 32, and so on; the final 18-bit
/// tier ends below 2^18, so the prefix property holds.
pub(super) const LENGTH_LADDER: &[(usize, u8)] = &[
    (4, 4),
    (8, 5),
    (16, 6),
    (16, 7),
    (16, 8),
    (16, 9),
    (16, 10),
    (16, 11),
    (32, 13),
    (122, 18),
];

/// Most frequent symbols of request header text, most frequent first.
pub(super) const REQUEST_RANK_HEAD: &[u16] = &[
    // 4 bits
    b'e' as u16,
    b't' as u16,
    b'a' as u16,
    b'/' as u16,
    // 5 bits
    b'o' as u16,
    b'i' as u16,
    b'n' as u16,
    b's' as u16,
    b'r' as u16,
    b'c' as u16,
    b'.' as u16,
    b'-' as u16,
    // 6 bits
    b'p' as u16,
    b'l' as u16,
    b'm' as u16,
    b'd' as u16,
    b'h' as u16,
    b'u' as u16,
    b'g' as u16,
    b'w' as u16,
    b'x' as u16,
    b'0' as u16,
    b'1' as u16,
    b'2' as u16,
    b'=' as u16,
    b'&' as u16,
    b'%' as u16,
    b'b' as u16,
    // 7 bits
    EOF,
    b'f' as u16,
    b'v' as u16,
    b'k' as u16,
    b'y' as u16,
    b'3' as u16,
    b'4' as u16,
    b'5' as u16,
    b'6' as u16,
    b'7' as u16,
    b'8' as u16,
    b'9' as u16,
    b'_' as u16,
    b'~' as u16,
    b'?' as u16,
    b':' as u16,
    // 8 bits
    b'j' as u16,
    b'q' as u16,
    b'z' as u16,
    b'A' as u16,
    b'C' as u16,
    b'D' as u16,
    b'E' as u16,
    b'F' as u16,
    b'G' as u16,
    b'I' as u16,
    b'L' as u16,
    b'M' as u16,
    b'N' as u16,
    b'O' as u16,
    b'P' as u16,
    b'S' as u16,
];

/// Most frequent symbols of response header text, most frequent first.
pub(super) const RESPONSE_RANK_HEAD: &[u16] = &[
    // 4 bits
    b' ' as u16,
    b'0' as u16,
    b'1' as u16,
    b'2' as u16,
    // 5 bits
    b'3' as u16,
    b'4' as u16,
    b'5' as u16,
    b'e' as u16,
    b't' as u16,
    b'a' as u16,
    b'o' as u16,
    b'c' as u16,
    // 6 bits
    b'n' as u16,
    b's' as u16,
    b'r' as u16,
    b'i' as u16,
    b'd' as u16,
    b'l' as u16,
    b'u' as u16,
    b'm' as u16,
    b'6' as u16,
    b'7' as u16,
    b'8' as u16,
    b'9' as u16,
    b':' as u16,
    b',' as u16,
    b'-' as u16,
    b'G' as u16,
    // 7 bits
    EOF,
    b'M' as u16,
    b'T' as u16,
    b'h' as u16,
    b'p' as u16,
    b'g' as u16,
    b'x' as u16,
    b'/' as u16,
    b'.' as u16,
    b'=' as u16,
    b';' as u16,
    b'"' as u16,
    b'S' as u16,
    b'W' as u16,
    b'F' as u16,
    b'b' as u16,
    // 8 bits
    b'v' as u16,
    b'w' as u16,
    b'y' as u16,
    b'k' as u16,
    b'f' as u16,
    b'A' as u16,
    b'B' as u16,
    b'C' as u16,
    b'D' as u16,
    b'E' as u16,
    b'O' as u16,
    b'J' as u16,
    b'N' as u16,
    b'q' as u16,
    b'j' as u16,
    b'z' as u16,
];
