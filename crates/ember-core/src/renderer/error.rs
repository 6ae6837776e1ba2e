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

//! Defines the error types for GPU resource management.
//!
//! Only resource creation can fail. Drawing is infallible from the back end's
//! point of view: exhaustion is handled by flushing, degeneracy by skipping.

use crate::renderer::api::buffer::{BufferId, BufferKind};
use std::fmt;

/// An error related to the creation or use of a GPU resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// The device could not create a buffer.
    BufferCreation {
        /// The kind of buffer that was requested.
        kind: BufferKind,
        /// A descriptive label for the buffer.
        label: String,
        /// Backend-provided reason.
        reason: String,
    },
    /// The device ran out of memory while servicing a request.
    OutOfMemory,
    /// The handle used to reference a resource is invalid.
    InvalidHandle(BufferId),
    /// A per-frame buffer ring has no room left for this frame.
    RingExhausted {
        /// The label of the exhausted ring.
        label: &'static str,
        /// Bytes requested.
        requested: u32,
        /// Bytes still free in the current slot.
        available: u32,
    },
    /// An error originating from the specific graphics backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::BufferCreation {
                kind,
                label,
                reason,
            } => {
                write!(f, "Failed to create {kind:?} buffer '{label}': {reason}")
            }
            ResourceError::OutOfMemory => write!(f, "Device out of memory."),
            ResourceError::InvalidHandle(id) => write!(f, "Invalid buffer handle: {id:?}"),
            ResourceError::RingExhausted {
                label,
                requested,
                available,
            } => {
                write!(
                    f,
                    "Buffer ring '{label}' exhausted: requested {requested} bytes, {available} available"
                )
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = ResourceError::RingExhausted {
            label: "Dynamic Vertex",
            requested: 64,
            available: 16,
        };
        assert_eq!(
            err.to_string(),
            "Buffer ring 'Dynamic Vertex' exhausted: requested 64 bytes, 16 available"
        );
        assert_eq!(
            ResourceError::InvalidHandle(BufferId(7)).to_string(),
            "Invalid buffer handle: BufferId(7)"
        );
    }
}
