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

//! The demo scene: a floor, a few crates, an instanced brick row and three
//! lights, uploaded once and turned into a [`RenderFrame`] every frame.

use anyhow::{Context, Result};
use ember_core::math::{Aabb, Frustum, Mat3, Mat4, Vec3, Vec4};
use ember_core::renderer::api::{
    BufferCache, BufferCacheRing, BufferId, BufferKind, BufferUsage, BuiltinConstant, DrawSurf,
    DrawSurfFlags, LightFlags, LightKind, Material, MaterialKind, MaterialPass, MaterialSort,
    MeshKind, ObjectFlags, RenderFrame, RenderTarget, RenderTargetId, Shader, ShaderFlags,
    ShaderId, SubMesh, TextureId, ViewDefinition, ViewFlags, VisibleLight, VisibleObject,
    TRI_INDEX_SIZE,
};
use ember_core::renderer::{Rect, RenderDevice};
use ember_lanes::render_lane::{BuiltinShaders, BuiltinTextures, RenderTargets};
use std::sync::Arc;

pub const SCREEN: Rect = Rect::new(0, 0, 1280, 720);

/// Position, normal and texture coordinate.
const VERTEX_SIZE: u32 = 32;
const BRICK_COUNT: u32 = 16;
const RING_SIZE: u32 = 64 * 1024;

type Vertex = [f32; 8];

fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    const FACES: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::new(-1.0, 0.0, 0.0), Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::new(0.0, -1.0, 0.0), Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::new(0.0, 0.0, -1.0), Vec3::Y, Vec3::X),
    ];

    let mut verts = Vec::with_capacity(24);
    let mut indexes = Vec::with_capacity(36);
    for (normal, s, t) in FACES {
        let base = verts.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let p = normal * 0.5 + s * (u - 0.5) + t * (v - 0.5);
            verts.push([p.x, p.y, p.z, normal.x, normal.y, normal.z, u, v]);
        }
        indexes.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (verts, indexes)
}

fn quad_geometry(half_size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let verts = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]
        .map(|(x, y): (f32, f32)| {
            [x * half_size, y * half_size, 0.0, 0.0, 0.0, 1.0, (x + 1.0) * 0.5, (y + 1.0) * 0.5]
        })
        .to_vec();
    (verts, vec![0, 1, 2, 0, 2, 3])
}

/// Static geometry packed into one vertex and one index buffer.
#[derive(Debug)]
struct GeometryBuffers {
    vertex_buffer: BufferId,
    index_buffer: BufferId,
}

impl GeometryBuffers {
    fn upload(
        device: &mut dyn RenderDevice,
        meshes: &[(Vec<Vertex>, Vec<u32>)],
    ) -> Result<(Self, Vec<Arc<SubMesh>>)> {
        let vertex_bytes: u32 = meshes.iter().map(|(v, _)| v.len() as u32 * VERTEX_SIZE).sum();
        let index_bytes: u32 = meshes.iter().map(|(_, i)| i.len() as u32 * TRI_INDEX_SIZE).sum();
        let vertex_buffer =
            device.create_buffer(BufferKind::Vertex, BufferUsage::Static, vertex_bytes, "scene_vertices")?;
        let index_buffer =
            device.create_buffer(BufferKind::Index, BufferUsage::Static, index_bytes, "scene_indexes")?;

        let mut sub_meshes = Vec::with_capacity(meshes.len());
        let (mut vertex_offset, mut index_offset) = (0, 0);
        for (ref_id, (verts, indexes)) in meshes.iter().enumerate() {
            let vertex_size = verts.len() as u32 * VERTEX_SIZE;
            let index_size = indexes.len() as u32 * TRI_INDEX_SIZE;
            device.write_buffer(vertex_buffer, vertex_offset, bytemuck::cast_slice(verts))?;
            device.write_buffer(index_buffer, index_offset, bytemuck::cast_slice(indexes))?;

            let positions: Vec<Vec3> = verts.iter().map(|v| Vec3::new(v[0], v[1], v[2])).collect();
            sub_meshes.push(Arc::new(SubMesh {
                kind: MeshKind::Static,
                ref_id: ref_id as u32,
                vertex_cache: BufferCache::new_static(vertex_buffer, vertex_offset, vertex_size),
                index_cache: BufferCache::new_static(index_buffer, index_offset, index_size),
                num_verts: verts.len() as u32,
                num_indexes: indexes.len() as u32,
                gpu_skinning_tier: None,
                aabb: Aabb::from_points(&positions),
            }));

            vertex_offset += vertex_size;
            index_offset += index_size;
        }

        Ok((Self { vertex_buffer, index_buffer }, sub_meshes))
    }

    fn destroy(&self, device: &mut dyn RenderDevice) -> Result<()> {
        device.destroy_buffer(self.vertex_buffer)?;
        device.destroy_buffer(self.index_buffer)?;
        Ok(())
    }
}

/// Shaders with sequential ids, the way a loader would hand them out.
#[derive(Debug, Default)]
struct ShaderLibrary {
    next_id: usize,
}

impl ShaderLibrary {
    fn load(&mut self, name: &str, flags: ShaderFlags) -> Arc<Shader> {
        self.next_id += 1;
        Arc::new(
            Shader::new(ShaderId(self.next_id), name)
                .with_flags(flags)
                .with_constants([
                    BuiltinConstant::ModelViewProjectionMatrix,
                    BuiltinConstant::LocalToWorldMatrix,
                    BuiltinConstant::ConstantColor,
                    BuiltinConstant::LightVec,
                    BuiltinConstant::LightColor,
                    BuiltinConstant::InstanceDataBuffer,
                    BuiltinConstant::InstanceIndexes,
                ]),
        )
    }
}

pub fn render_targets() -> RenderTargets {
    let target = |id, width, height| RenderTarget {
        id: RenderTargetId(id),
        depth_texture: TextureId(100 + id),
        width,
        height,
    };
    RenderTargets {
        shadow_map: target(1, 2048, 2048),
        vscm: target(2, 3072, 2048),
        selection: target(3, SCREEN.w as u32, SCREEN.h as u32),
        velocity: target(4, SCREEN.w as u32, SCREEN.h as u32),
    }
}

pub fn occlusion_target() -> RenderTarget {
    RenderTarget {
        id: RenderTargetId(5),
        depth_texture: TextureId(105),
        width: 320,
        height: 180,
    }
}

pub fn builtin_textures() -> BuiltinTextures {
    BuiltinTextures {
        white: TextureId(1),
        fog: TextureId(2),
        fog_enter: TextureId(3),
        prefiltered_dfg: TextureId(4),
        cubic_normal_cube: TextureId(5),
        indirection_cube: TextureId(6),
        screen_depth: TextureId(7),
    }
}

/// A camera at `origin` looking at `target`.
pub fn camera(origin: Vec3, target: Vec3) -> ViewDefinition {
    let axis = Mat3::from_forward_up((target - origin).normalize(), Vec3::Z);
    let frustum = Frustum::from_fov(origin, axis, 90.0, 60.0, 0.1, 300.0);
    let mut view = ViewDefinition::perspective(frustum, 90.0, 60.0, SCREEN);
    view.flags = ViewFlags::SHADOWS | ViewFlags::TEXTURED_MODE | ViewFlags::DEBUG_PRIMS;
    view
}

fn world_aabb(object: &VisibleObject) -> Aabb {
    Aabb::from_points(&object.world_obb.corners())
}

/// Everything the demo draws.
#[derive(Debug)]
pub struct Scene {
    geometry: GeometryBuffers,
    instance_ring: BufferCacheRing,
    marker_vertices: BufferCacheRing,
    marker_indexes: BufferCacheRing,
    shaders: BuiltinShaders,
    surfs: Vec<DrawSurf>,
    lights: Vec<VisibleLight>,
    hud: Vec<DrawSurf>,
    marker: Arc<VisibleObject>,
    marker_material: Arc<Material>,
    bricks: Vec<Arc<VisibleObject>>,
}

impl Scene {
    /// Uploads the geometry and builds objects, surfaces and lights.
    pub fn build(device: &mut dyn RenderDevice) -> Result<Self> {
        let mut library = ShaderLibrary::default();
        let shaders = BuiltinShaders::with_loader(|name| library.load(name, ShaderFlags::empty()));
        let standard = library.load("standard", ShaderFlags::LIT_SURFACE | ShaderFlags::SHADOWING);

        let lit = |name: &str| {
            Arc::new(Material::new(
                name,
                MaterialKind::Surface,
                MaterialSort::Opaque,
                MaterialPass {
                    shader: Some(standard.clone()),
                    ..MaterialPass::default()
                },
            ))
        };
        let floor_material = lit("floor");
        let crate_material = lit("crate");
        let brick_material = lit("brick");
        let unlit = |name: &str| {
            Arc::new(Material::new(
                name,
                MaterialKind::Surface,
                MaterialSort::Opaque,
                MaterialPass {
                    shader: Some(shaders.unlit.clone()),
                    ..MaterialPass::default()
                },
            ))
        };
        let marker_material = unlit("marker");
        let hud_material = unlit("hud");

        let (geometry, meshes) =
            GeometryBuffers::upload(device, &[quad_geometry(20.0), cube_geometry(), quad_geometry(0.1)])?;
        let (floor_mesh, cube_mesh, hud_mesh) = (&meshes[0], &meshes[1], &meshes[2]);

        let mut next_index = BRICK_COUNT;
        let mut place = |position: Vec3, mesh: &SubMesh, flags: ObjectFlags| {
            let mut object = VisibleObject::new(next_index, Mat4::from_translation(position), mesh.aabb);
            object.flags |= flags;
            next_index += 1;
            Arc::new(object)
        };

        let floor = place(Vec3::ZERO, floor_mesh, ObjectFlags::empty());
        let crates = [Vec3::new(4.0, -3.0, 0.5), Vec3::new(6.0, 2.0, 0.5), Vec3::new(9.0, -1.0, 0.5)]
            .map(|position| place(position, cube_mesh, ObjectFlags::OCCLUDER));
        let marker = place(Vec3::new(2.0, 0.0, 2.0), cube_mesh, ObjectFlags::empty());
        let hud_object = place(Vec3::ZERO, hud_mesh, ObjectFlags::SKIP_SELECTION);

        // Instance rows 0..BRICK_COUNT belong to the row of bricks.
        let bricks: Vec<_> = (0..BRICK_COUNT)
            .map(|i| {
                let position = Vec3::new(-8.0 + i as f32 * 1.1, 6.0, 0.5);
                let world = Mat4::from_translation(position);
                let mut brick = VisibleObject::new(i, world, cube_mesh.aabb);
                brick.instance_index = i;
                Arc::new(brick)
            })
            .collect();

        // Surfaces sorted by material, then geometry, so runs merge.
        let mut surfs = Vec::new();
        surfs.push(
            DrawSurf::new(floor_mesh.clone(), floor_material, floor)
                .with_flags(DrawSurfFlags::AMBIENT_VISIBLE | DrawSurfFlags::SHADOW_VISIBLE),
        );
        for object in &crates {
            surfs.push(
                DrawSurf::new(cube_mesh.clone(), crate_material.clone(), object.clone())
                    .with_flags(DrawSurfFlags::AMBIENT_VISIBLE | DrawSurfFlags::SHADOW_VISIBLE),
            );
        }
        for brick in &bricks {
            surfs.push(DrawSurf::new(cube_mesh.clone(), brick_material.clone(), brick.clone()).with_flags(
                DrawSurfFlags::AMBIENT_VISIBLE
                    | DrawSurfFlags::SHADOW_VISIBLE
                    | DrawSurfFlags::USE_INSTANCING,
            ));
        }

        let lights = Self::lights(&surfs, library.load("light", ShaderFlags::empty()));
        let hud = vec![DrawSurf::new(hud_mesh.clone(), hud_material, hud_object)];

        let instance_ring = BufferCacheRing::new(device, BufferKind::Uniform, RING_SIZE, "instance_rows")?;
        let marker_vertices = BufferCacheRing::new(device, BufferKind::Vertex, RING_SIZE, "marker_vertices")?;
        let marker_indexes = BufferCacheRing::new(device, BufferKind::Index, RING_SIZE, "marker_indexes")?;

        log::info!(
            "Scene built: {} surfaces, {} bricks, {} lights",
            surfs.len(),
            bricks.len(),
            lights.len()
        );

        Ok(Self {
            geometry,
            instance_ring,
            marker_vertices,
            marker_indexes,
            shaders,
            surfs,
            lights,
            hud,
            marker,
            marker_material,
            bricks,
        })
    }

    fn lights(surfs: &[DrawSurf], light_shader: Arc<Shader>) -> Vec<VisibleLight> {
        let light_material = Arc::new(Material::new(
            "light",
            MaterialKind::Light,
            MaterialSort::Opaque,
            MaterialPass {
                shader: Some(light_shader),
                ..MaterialPass::default()
            },
        ));
        let all: Vec<u32> = (0..surfs.len() as u32).collect();
        let bounds = surfs
            .iter()
            .map(|surf| world_aabb(&surf.object))
            .fold(Aabb::INVALID, |acc, aabb| acc.merge(&aabb));

        let sun_axis = Mat3::from_forward_up(Vec3::new(0.3, 0.2, -1.0).normalize(), Vec3::X);
        let mut sun = VisibleLight::new(
            0,
            LightKind::Directional,
            bounds.center() - sun_axis.forward() * 60.0,
            sun_axis,
            Vec3::new(120.0, 40.0, 40.0),
            light_material.clone(),
        );
        sun.flags |= LightFlags::PRIMARY_LIGHT;
        sun.color = Vec3::new(1.0, 0.95, 0.8);

        let spot_origin = Vec3::new(-4.0, -6.0, 8.0);
        let spot = VisibleLight::new(
            1,
            LightKind::Spot,
            spot_origin,
            Mat3::from_forward_up((Vec3::new(5.0, 0.0, 0.0) - spot_origin).normalize(), Vec3::Z),
            Vec3::splat(25.0),
            light_material.clone(),
        );

        let point = VisibleLight::new(
            2,
            LightKind::Point,
            Vec3::new(5.0, 0.0, 3.0),
            Mat3::IDENTITY,
            Vec3::splat(10.0),
            light_material,
        );

        [sun, spot, point]
            .into_iter()
            .map(|mut light| {
                light.lit_surfs = all.clone();
                light.shadow_caster_surfs = all.clone();
                light.lit_aabb = bounds;
                light.shadow_caster_aabb = bounds;
                light.scissor_rect = SCREEN;
                light
            })
            .collect()
    }

    /// The fallback shaders the back end is initialized with.
    pub fn shaders(&self) -> &BuiltinShaders {
        &self.shaders
    }

    /// 2D surfaces drawn over the view.
    pub fn hud(&self) -> &[DrawSurf] {
        &self.hud
    }

    /// Uploads this frame's instance rows and the spinning marker, and
    /// returns the frame to draw.
    pub fn frame(
        &mut self,
        device: &mut dyn RenderDevice,
        frame: u32,
        time: f32,
        view: &ViewDefinition,
        row_size: u32,
    ) -> Result<RenderFrame> {
        for ring in [&mut self.instance_ring, &mut self.marker_vertices, &mut self.marker_indexes] {
            ring.advance(frame);
        }

        let mut rows = vec![0u8; (BRICK_COUNT * row_size) as usize];
        for (brick, row) in self.bricks.iter().zip(rows.chunks_exact_mut(row_size as usize)) {
            let world: Vec<f32> = (0..3).flat_map(|r| brick.world.get_row(r).to_array()).collect();
            let bytes: &[u8] = bytemuck::cast_slice(&world);
            row[..bytes.len()].copy_from_slice(bytes);
        }
        let instance_cache = self
            .instance_ring
            .write(device, &rows, row_size)
            .context("uploading instance rows")?;

        // The marker is re-tessellated every frame, so it lives in the rings.
        let (mut verts, indexes) = cube_geometry();
        let (sin, cos) = time.sin_cos();
        for v in &mut verts {
            let (x, y) = (v[0], v[1]);
            v[0] = x * cos - y * sin;
            v[1] = x * sin + y * cos;
        }
        let vertex_cache = self
            .marker_vertices
            .write(device, bytemuck::cast_slice(&verts), VERTEX_SIZE)
            .context("uploading marker vertices")?;
        let index_cache = self
            .marker_indexes
            .write(device, bytemuck::cast_slice(&indexes), TRI_INDEX_SIZE)
            .context("uploading marker indexes")?;
        let marker_mesh = Arc::new(SubMesh {
            kind: MeshKind::Dynamic,
            ref_id: u32::MAX,
            vertex_cache,
            index_cache,
            num_verts: verts.len() as u32,
            num_indexes: indexes.len() as u32,
            gpu_skinning_tier: None,
            aabb: Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(0.75)),
        });

        let mut render_frame = RenderFrame::new(view.clone());
        render_frame.draw_surfs = self.surfs.clone();
        render_frame.draw_surfs.push(DrawSurf::new(
            marker_mesh,
            self.marker_material.clone(),
            self.marker.clone(),
        ));
        render_frame.lights = self.lights.iter().cloned().map(Arc::new).collect();
        render_frame.instance_cache = Some(instance_cache);
        Ok(render_frame)
    }

    /// Releases every buffer of the scene.
    pub fn destroy(self, device: &mut dyn RenderDevice) -> Result<()> {
        self.geometry.destroy(device)?;
        self.instance_ring.destroy(device);
        self.marker_vertices.destroy(device);
        self.marker_indexes.destroy(device);
        Ok(())
    }
}

/// The three colored lines of an axis gizmo at `origin`.
pub fn axis_lines(origin: Vec3, length: f32) -> [(Vec3, Vec3, Vec4); 3] {
    [
        (origin, origin + Vec3::X * length, Vec4::new(1.0, 0.0, 0.0, 1.0)),
        (origin, origin + Vec3::Y * length, Vec4::new(0.0, 1.0, 0.0, 1.0)),
        (origin, origin + Vec3::Z * length, Vec4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}
