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

#![allow(dead_code)]

//! `delta_headers` implements stateful, dictionary-based differential
//! compression for HTTP-style header blocks. Instead of re-sending a whole
//! header set per message, an endpoint sends only the operations that turn
//! the previous set into the current one, against a dictionary both peers
//! mutate in lockstep.
//!
//! # Components
//! - [`DeltaCodec`]: the serializer/deserializer pair of one endpoint.
//! - [`HeaderSet`] and [`Value`]: the caller-facing header collection.
//! - [`HuffmanTable`]: the optional static Huffman coding of text values.

pub mod delta;
pub mod error;
pub mod headers;

mod huffman;

pub(crate) mod util;

pub use delta::DeltaCodec;
pub use headers::{HeaderSet, Value};
pub use huffman::HuffmanTable;
