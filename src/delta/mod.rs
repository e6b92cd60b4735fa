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

//! Differential header block compression.
//!
//! A header block on the wire is one group-id byte followed by operation
//! groups. Operations toggle dictionary entries in and out of the group's
//! steady state, clone the name of an existing entry under a new value, or
//! store fresh name/value pairs; each comes in a stateful flavor that
//! updates the shared dictionary and an ephemeral flavor scoped to one
//! message.
//!
//! State lives per group id on both sides of a connection and both peers
//! replay the same stateful operations, evictions and reindexes, so the
//! dictionaries never need to be exchanged.

mod codec;
mod group;
mod operation;
mod storage;
mod value;

pub use codec::DeltaCodec;
