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

//! Errors that may occur in this crate.
//!
//! This module provides a unified encapsulation of delta compression errors.
//!
//! [`DeltaError`] wraps the two error tiers of the codec: [`DecodeError`]
//! for malformed or state-inconsistent input (fatal for the shared context)
//! and [`EncodeError`] for caller input the wire format cannot represent
//! (recoverable, the context is left untouched).
//!
//! [`DeltaError`]: DeltaError
//! [`DecodeError`]: DecodeError
//! [`EncodeError`]: EncodeError

use core::fmt::{Debug, Display, Formatter};
use std::error::Error;

/// Errors that may occur when using this crate.
#[derive(Debug, Eq, PartialEq)]
pub struct DeltaError {
    kind: ErrorKind,
}

impl DeltaError {
    /// Returns the [`DecodeError`] held by this error, if any.
    pub fn decode_error(&self) -> Option<&DecodeError> {
        match self.kind {
            ErrorKind::Decode(ref e) => Some(e),
            _ => None,
        }
    }

    /// Returns the [`EncodeError`] held by this error, if any.
    pub fn encode_error(&self) -> Option<&EncodeError> {
        match self.kind {
            ErrorKind::Encode(ref e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if this error poisons the shared compression state.
    ///
    /// After a fatal error the peers can no longer agree on dictionary
    /// contents, so the codec that produced it must be discarded.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, ErrorKind::Decode(_))
    }
}

impl From<ErrorKind> for DeltaError {
    fn from(kind: ErrorKind) -> Self {
        DeltaError { kind }
    }
}

impl From<DecodeError> for DeltaError {
    fn from(err: DecodeError) -> Self {
        ErrorKind::Decode(err).into()
    }
}

impl From<EncodeError> for DeltaError {
    fn from(err: EncodeError) -> Self {
        ErrorKind::Encode(err).into()
    }
}

impl Display for DeltaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl Error for DeltaError {}

#[derive(Debug, Eq, PartialEq)]
pub(crate) enum ErrorKind {
    /// Errors raised while parsing or applying a serialized header block.
    Decode(DecodeError),

    /// Errors raised while serializing a header block.
    Encode(EncodeError),
}

/// Errors raised while parsing or applying a serialized header block.
///
/// These are fatal: the decoder's dictionary may have diverged from the
/// encoder's, so the affected group context cannot be reused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The input ended before a complete field was read.
    UnexpectedEof,

    /// An opcode byte outside the defined operation set.
    InvalidOpcode(u8),

    /// An operation referenced an index with no entry behind it.
    DanglingIndex(usize),

    /// A Huffman-coded string was truncated or used an unassigned code.
    InvalidHuffmanCode,

    /// A text value declared as UTF-8 did not decode as UTF-8.
    InvalidUtf8,

    /// A variable-length integer exceeded its 10-byte maximum.
    IntegerOverflow,

    /// A value flags byte with an undefined bit combination.
    InvalidValueFlags(u8),
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl Error for DecodeError {}

/// Errors raised while serializing a header block.
///
/// These are recoverable: the offending header is rejected before any
/// dictionary mutation, so the codec remains usable.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// A header name longer than the wire format's 255-byte limit.
    NameTooLong(usize),

    /// A value too large to ever fit in the dynamic dictionary.
    ValueTooLarge(usize),

    /// A text value holding no items.
    EmptyTextValue,

    /// A text value holding more than 256 items.
    TooManyTextItems(usize),
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        Debug::fmt(self, f)
    }
}

impl Error for EncodeError {}
