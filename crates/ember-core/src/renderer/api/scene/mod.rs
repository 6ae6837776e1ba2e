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

//! The frame data model: what front-end culling hands over to the back end.
//!
//! Everything in here is read-only to the back end. Shared records are held
//! through [`Arc`](std::sync::Arc) and compared by pointer when the back end
//! needs identity (same object, same material).

pub mod draw_surf;
pub mod light;
pub mod material;
pub mod mesh;
pub mod object;
pub mod view;

pub use self::draw_surf::*;
pub use self::light::*;
pub use self::material::*;
pub use self::mesh::*;
pub use self::object::*;
pub use self::view::*;
