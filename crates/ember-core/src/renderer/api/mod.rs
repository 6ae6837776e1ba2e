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

//! Backend-agnostic rendering API.
//!
//! Organized into several logical sub-modules:
//!
//! - **[`core`]**: Frame constants, runtime settings and render counters.
//! - **[`buffer`]** and **[`buffer_cache`]**: GPU buffer handles, frame-scoped
//!   buffer regions and the per-frame allocation ring.
//! - **[`state`]**: Render state bits and fixed-function descriptors.
//! - **[`shader`]**: Shader programs, their variants and constant values.
//! - **[`texture`]**: Texture and render target handles.
//! - **[`scene`]**: The per-frame visible data produced by front-end culling.

pub mod buffer;
pub mod buffer_cache;
pub mod core;
pub mod scene;
pub mod shader;
pub mod state;
pub mod texture;

pub use self::buffer::*;
pub use self::buffer_cache::*;
pub use self::core::*;
pub use self::scene::*;
pub use self::shader::*;
pub use self::state::*;
pub use self::texture::*;
