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

//! Variant selection: specialises a base shader for the batch being drawn.

use super::BatchDraw;
use crate::render_lane::context::BackEndContext;
use ember_core::renderer::api::{Shader, SkinningMethod, SubMesh};
use std::sync::Arc;

/// The variant families a render routine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Variants {
    pub perforated: bool,
    pub skinning: bool,
    pub instancing: bool,
}

impl Variants {
    pub const ALL: Self = Self {
        perforated: true,
        skinning: true,
        instancing: true,
    };

    pub const SKIN_INSTANCING: Self = Self {
        perforated: false,
        skinning: true,
        instancing: true,
    };

    pub const PERFORATED_SKIN: Self = Self {
        perforated: true,
        skinning: true,
        instancing: false,
    };
}

/// The GPU skinning tier used to draw `sub_mesh`, `None` when skinning runs
/// on the CPU or the mesh is not skinned.
pub(crate) fn gpu_skinning_tier(ctx: &BackEndContext, sub_mesh: &SubMesh) -> Option<u8> {
    if ctx.settings.skinning_method == SkinningMethod::Cpu {
        None
    } else {
        sub_mesh.gpu_skinning_tier
    }
}

/// Walks the variant links of `base`: perforated, then skinned, then
/// instanced. A missing link keeps the shader selected so far.
pub(super) fn select(
    base: &Arc<Shader>,
    draw: &BatchDraw<'_>,
    ctx: &BackEndContext,
    allowed: Variants,
) -> Arc<Shader> {
    let mut shader = base.clone();

    if allowed.perforated && draw.material.pass().is_alpha_cutoff() {
        shader = shader.perforated_version().cloned().unwrap_or(shader);
    }

    if allowed.skinning {
        if let Some(tier) = gpu_skinning_tier(ctx, draw.sub_mesh) {
            shader = shader.gpu_skinning_version(tier).cloned().unwrap_or(shader);
        }
    }

    if allowed.instancing && draw.batch.num_instances > 0 {
        shader = shader.gpu_instancing_version().cloned().unwrap_or(shader);
    }

    shader
}
