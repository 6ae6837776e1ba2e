// Copyright 2025 eraflo
//
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

//! # Ember Lanes
//!
//! Hot-path crate of the ember render back end. It turns the sorted surface
//! list handed over by front-end culling into as few GPU draw calls as
//! possible: surface batching, the pass drivers that walk the list, the
//! shadow map scheduler and the debug primitive buffer.

#![warn(missing_docs)]

pub mod render_lane;

pub use render_lane::{BackEnd, BackEndContext, Batch, FlushKind};
