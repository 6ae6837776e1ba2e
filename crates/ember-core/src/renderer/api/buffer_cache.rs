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

//! Per-frame ring of dynamic GPU buffers.
//!
//! The [`BufferCacheRing`] pre-allocates one buffer per frame in flight and
//! hands out sub-ranges of the current one as [`BufferCache`]s tagged with the
//! frame they were written in. A range handed out in frame `N` is only valid
//! while frame `N` is the back end's current frame.
//!
//! ```text
//! Frame N:     [Slot 0: GPU reads]
//! Frame N+1:   [Slot 1: CPU writes] <- alloc() bumps the cursor
//! Frame N+2:   [Slot 2: CPU writes]
//! Frame N+3:   [Slot 0: CPU writes] <- cycle back, GPU finished reading
//! ```

use super::buffer::{BufferCache, BufferId, BufferKind, BufferUsage};
use super::core::MAX_FRAMES_IN_FLIGHT;
use crate::renderer::error::ResourceError;
use crate::renderer::traits::RenderDevice;
use std::borrow::Cow;

/// A ring of dynamic buffers, one per frame in flight, sub-allocated linearly.
#[derive(Debug)]
pub struct BufferCacheRing {
    kind: BufferKind,
    slots: Vec<BufferId>,
    slot_size: u32,
    current_index: usize,
    cursor: u32,
    frame: u32,
    warned: bool,
    label: &'static str,
}

impl BufferCacheRing {
    /// Creates a ring with [`MAX_FRAMES_IN_FLIGHT`] buffers of `slot_size` bytes.
    ///
    /// # Errors
    ///
    /// Returns a [`ResourceError`] if a buffer cannot be created. Buffers
    /// created before the failure are released.
    pub fn new(
        device: &mut dyn RenderDevice,
        kind: BufferKind,
        slot_size: u32,
        label: &'static str,
    ) -> Result<Self, ResourceError> {
        let mut slots = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);

        for i in 0..MAX_FRAMES_IN_FLIGHT {
            let buffer_label = match i {
                0 => Cow::Borrowed(label),
                _ => Cow::Owned(format!("{label} [slot {i}]")),
            };

            match device.create_buffer(kind, BufferUsage::Dynamic, slot_size, &buffer_label) {
                Ok(id) => slots.push(id),
                Err(e) => {
                    for id in slots {
                        if let Err(err) = device.destroy_buffer(id) {
                            log::warn!("BufferCacheRing({label}): failed to release {id:?}: {err}");
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            kind,
            slots,
            slot_size,
            current_index: 0,
            cursor: 0,
            frame: 0,
            warned: false,
            label,
        })
    }

    /// Moves to the next slot and tags further allocations with `frame`.
    ///
    /// Call once at the beginning of each frame, before any allocation.
    pub fn advance(&mut self, frame: u32) {
        self.current_index = (self.current_index + 1) % self.slots.len();
        self.cursor = 0;
        self.frame = frame;
        self.warned = false;
    }

    /// Reserves `size` bytes aligned to `alignment` in the current slot.
    ///
    /// Returns `None` when the slot is full. The caller is expected to skip
    /// the geometry it wanted to upload.
    pub fn alloc(&mut self, size: u32, alignment: u32) -> Option<BufferCache> {
        let offset = align_up(self.cursor, alignment);
        let end = offset.checked_add(size)?;
        if end > self.slot_size {
            if !self.warned {
                log::warn!(
                    "BufferCacheRing({}) exhausted at frame {}: requested {} bytes, {} available",
                    self.label,
                    self.frame,
                    size,
                    self.remaining()
                );
                self.warned = true;
            }
            return None;
        }
        self.cursor = end;
        Some(BufferCache::new_dynamic(
            self.slots[self.current_index],
            offset,
            size,
            self.frame,
        ))
    }

    /// Reserves room for `data` and uploads it.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::RingExhausted`] when the slot is full, or the
    /// device error if the upload fails.
    pub fn write(
        &mut self,
        device: &mut dyn RenderDevice,
        data: &[u8],
        alignment: u32,
    ) -> Result<BufferCache, ResourceError> {
        let size = data.len() as u32;
        let available = self.remaining();
        let cache = self.alloc(size, alignment).ok_or(ResourceError::RingExhausted {
            label: self.label,
            requested: size,
            available,
        })?;
        device.write_buffer(cache.buffer, cache.offset, data)?;
        Ok(cache)
    }

    /// Releases every buffer of the ring.
    pub fn destroy(self, device: &mut dyn RenderDevice) {
        for id in self.slots {
            if let Err(e) = device.destroy_buffer(id) {
                log::warn!("BufferCacheRing({}): failed to destroy {id:?}: {e}", self.label);
            }
        }
    }

    /// The kind of buffers in the ring.
    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// The buffer written during the current frame.
    pub fn current_buffer(&self) -> BufferId {
        self.slots[self.current_index]
    }

    /// The frame allocations are currently tagged with.
    pub fn current_frame(&self) -> u32 {
        self.frame
    }

    /// Bytes allocated from the current slot, padding included.
    pub fn used(&self) -> u32 {
        self.cursor
    }

    /// Bytes still free in the current slot.
    pub fn remaining(&self) -> u32 {
        self.slot_size - self.cursor
    }
}

#[inline]
fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        value
    } else {
        value.div_ceil(alignment) * alignment
    }
}
