use std::mem;
use std::num::NonZeroU64;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::renderer::lod::{patch_lod, LodSettings, PatchLod};
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
use crate::renderer::plan::{DrawItem, FramePlan, MAX_PASSES_PER_FRAME};
use crate::renderer::shader;
use crate::renderer::shadow::ShadowMap;
use crate::renderer::target::SAMPLED_DEPTH_FORMAT;
use crate::renderer::texture::{ImageData, Texture};
use crate::renderer::uniforms::{self, TerrainUniform};
use crate::scene::DirectionalLight;

/// Source texels covered by one patch along each axis.
pub const PATCH_TILE_SIZE: u32 = 64;

const SHADOW_DEPTH_BIAS: i32 = 2;
const SHADOW_SLOPE_BIAS: f32 = 2.0;

/// Knobs that only touch uniforms; changing them needs no re-upload.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainParams {
    pub height_scale: f32,
    pub height_offset: f32,
    pub horizontal_scale: f32,
    pub ambient_strength: f32,
    pub lod: LodSettings,
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            height_scale: 12.0,
            height_offset: 0.0,
            horizontal_scale: 100.0,
            ambient_strength: 0.3,
            lod: LodSettings::default(),
        }
    }
}

/// Height and diffuse images describing one terrain surface.
#[derive(Clone, Debug)]
pub struct SurfaceData {
    pub name: String,
    pub height: ImageData,
    pub diffuse: ImageData,
}

/// Square grid of quads over the unit square `[-0.5, 0.5]²`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchGrid {
    per_side: u32,
}

impl PatchGrid {
    pub fn for_source_width(width: u32) -> Self {
        Self {
            per_side: (width / PATCH_TILE_SIZE).max(1),
        }
    }

    pub fn per_side(&self) -> u32 {
        self.per_side
    }

    pub fn patch_count(&self) -> u32 {
        self.per_side * self.per_side
    }

    /// Corners of patch `index` in `c00, c10, c11, c01` order, as unit-space
    /// `(x, z)` positions.
    pub fn corners(&self, index: u32) -> [Vec2; 4] {
        let n = self.per_side as f32;
        let (i, j) = ((index % self.per_side) as f32, (index / self.per_side) as f32);
        let at = |di: f32, dj: f32| Vec2::new((i + di) / n - 0.5, (j + dj) / n - 0.5);
        [at(0.0, 0.0), at(1.0, 0.0), at(1.0, 1.0), at(0.0, 1.0)]
    }

    /// Storage-buffer layout: per corner `(x, z, u, v)`.
    pub fn control_points(&self) -> Vec<[f32; 4]> {
        (0..self.patch_count())
            .flat_map(|index| self.corners(index))
            .map(|c| [c.x, c.y, c.x + 0.5, c.y + 0.5])
            .collect()
    }

    pub fn world_corners(&self, index: u32, params: &TerrainParams) -> [Vec3; 4] {
        self.corners(index)
            .map(|c| Vec3::new(c.x * params.horizontal_scale, params.height_offset, c.y * params.horizontal_scale))
    }

    pub fn lods_for(&self, eye: Vec3, params: &TerrainParams) -> Vec<PatchLod> {
        let settings = params.lod.sanitized();
        (0..self.patch_count())
            .map(|index| patch_lod(self.world_corners(index, params), eye, &settings))
            .collect()
    }
}

/// GPU buffers and textures that depend on the loaded surface.
struct SurfaceResources {
    name: String,
    grid: PatchGrid,
    _height: Texture,
    _diffuse: Texture,
    _control_points: wgpu::Buffer,
    lod_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

pub struct Terrain {
    pub params: TerrainParams,
    layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    shadow_bind_group: wgpu::BindGroup,
    shadow_generation: u64,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    surface: SurfaceResources,
    /// LOD records written this frame, `MAX_PASSES_PER_FRAME` blocks of
    /// `patch_count` entries.
    frame_lods: Vec<PatchLod>,
    pipelines: PipelineSet,
    shadow_pipeline: wgpu::RenderPipeline,
}

impl Terrain {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass_layout: &wgpu::BindGroupLayout,
        pipeline_keys: &[PipelineKey],
        shadow: &ShadowMap,
        surface: &SurfaceData,
        params: TerrainParams,
    ) -> Result<Self, RenderError> {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TerrainLayout"),
            entries: &[
                uniforms::uniform_layout_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    mem::size_of::<TerrainUniform>(),
                    false,
                ),
                storage_entry(1, mem::size_of::<[f32; 4]>()),
                storage_entry(2, mem::size_of::<PatchLod>()),
                texture_entry(3, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
                texture_entry(4, wgpu::ShaderStages::FRAGMENT),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let shadow_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("TerrainShadowLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let uniform_buffer =
            uniforms::uniform_buffer(device, "TerrainUniformBuffer", mem::size_of::<TerrainUniform>() as u64);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("TerrainSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let module = shader::scene_module(device, "TerrainShader", include_str!("../shader/terrain.wgsl"))?;

        let scene_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("TerrainPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout, &shadow_layout],
            push_constant_ranges: &[],
        });
        let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("TerrainShadowPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout],
            push_constant_ranges: &[],
        });

        let pipelines = shader::validated(device, "TerrainPipelines", || {
            PipelineSet::build("terrain", pipeline_keys, |key| {
                let mut builder = PipelineBuilder::new(device, &scene_layout, &module)
                    .with_label("TerrainPipeline")
                    .with_no_culling()
                    .with_polygon_mode(key.polygon_mode());
                if let Some(color) = key.color {
                    builder = builder.with_color_target(color, None);
                }
                if let Some(depth) = key.depth {
                    builder = builder.with_depth_stencil(depth, true, wgpu::CompareFunction::Less);
                }
                builder.build()
            })
        })?;

        let shadow_pipeline = shader::validated(device, "TerrainShadowPipeline", || {
            PipelineBuilder::new(device, &depth_layout, &module)
                .with_label("TerrainShadowPipeline")
                .with_vertex_entry("vs_shadow")
                .depth_only()
                .with_no_culling()
                .with_depth_stencil_biased(SAMPLED_DEPTH_FORMAT, SHADOW_DEPTH_BIAS, SHADOW_SLOPE_BIAS)
                .build()
        })?;

        let shadow_bind_group = create_shadow_bind_group(device, &shadow_layout, shadow);
        let resources = SurfaceResources::new(device, queue, &layout, &uniform_buffer, &sampler, surface)?;

        log::info!(
            "Terrain initialized: {} ({}x{} patches)",
            resources.name,
            resources.grid.per_side(),
            resources.grid.per_side()
        );

        Ok(Self {
            params,
            layout,
            shadow_layout,
            shadow_bind_group,
            shadow_generation: shadow.generation(),
            uniform_buffer,
            sampler,
            surface: resources,
            frame_lods: Vec::new(),
            pipelines,
            shadow_pipeline,
        })
    }

    /// Index of the first LOD record of `pass_index` in the storage buffer.
    pub fn lod_base(&self, pass_index: usize) -> u32 {
        pass_index as u32 * self.surface.grid.patch_count()
    }

    /// Replaces height and diffuse maps. The old buffers and textures are
    /// dropped with the previous surface resources.
    pub fn reset_surface(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface: &SurfaceData,
    ) -> Result<(), RenderError> {
        let resources = SurfaceResources::new(device, queue, &self.layout, &self.uniform_buffer, &self.sampler, surface)?;
        log::info!(
            "Terrain surface reset: {} -> {} ({}x{} patches)",
            self.surface.name,
            resources.name,
            resources.grid.per_side(),
            resources.grid.per_side()
        );
        self.surface = resources;
        self.frame_lods.clear();
        Ok(())
    }

    pub fn sync_shadow(&mut self, device: &wgpu::Device, shadow: &ShadowMap) {
        if shadow.generation() != self.shadow_generation {
            self.shadow_bind_group = create_shadow_bind_group(device, &self.shadow_layout, shadow);
            self.shadow_generation = shadow.generation();
        }
    }

    /// Uploads uniforms and the LOD records of every pass that draws the
    /// terrain this frame.
    pub fn prepare(&mut self, queue: &wgpu::Queue, plan: &FramePlan, light: &DirectionalLight) {
        let (light_direction, light_color) = uniforms::light_vectors(light.direction(), light.color);
        let uniform = TerrainUniform {
            shape: [
                self.params.height_scale,
                self.params.height_offset,
                self.params.horizontal_scale,
                self.params.ambient_strength,
            ],
            light_direction,
            light_color,
            grid: [self.surface.grid.per_side(), 0, 0, 0],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let patch_count = self.surface.grid.patch_count() as usize;
        self.frame_lods.clear();
        self.frame_lods
            .resize(patch_count * MAX_PASSES_PER_FRAME, PatchLod::uniform(1));
        for (index, pass) in plan.passes().iter().enumerate() {
            if !pass.draws.contains(&DrawItem::Terrain) {
                continue;
            }
            let lods = self.surface.grid.lods_for(pass.context.lod_eye, &self.params);
            self.frame_lods[index * patch_count..(index + 1) * patch_count].copy_from_slice(&lods);
        }
        queue.write_buffer(&self.surface.lod_buffer, 0, bytemuck::cast_slice(&self.frame_lods));
    }

    pub fn render(&self, rpass: &mut wgpu::RenderPass<'_>, ctx: &DrawContext<'_>) {
        if ctx.view.flags.depth_only {
            rpass.set_pipeline(&self.shadow_pipeline);
        } else {
            let Some(pipeline) = self.pipelines.get(&ctx.key) else {
                return;
            };
            rpass.set_pipeline(pipeline);
            rpass.set_bind_group(2, &self.shadow_bind_group, &[]);
        }
        rpass.set_bind_group(0, ctx.pass_bind_group, &[ctx.pass_offset]);
        rpass.set_bind_group(1, &self.surface.bind_group, &[]);

        let patch_count = self.surface.grid.patch_count() as usize;
        let base = ctx.pass_index * patch_count;
        let Some(lods) = self.frame_lods.get(base..base + patch_count) else {
            log::warn!("Terrain LOD for pass {} was not prepared", ctx.pass_index);
            return;
        };
        for (patch, lod) in lods.iter().enumerate() {
            let patch = patch as u32;
            rpass.draw(0..lod.vertex_count(), patch..patch + 1);
        }
    }
}

impl SurfaceResources {
    fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
        surface: &SurfaceData,
    ) -> Result<Self, RenderError> {
        use wgpu::util::DeviceExt;

        if surface.height.width != surface.height.height {
            log::warn!(
                "Heightmap {} is {}x{}; the terrain grid assumes a square map",
                surface.name,
                surface.height.width,
                surface.height.height
            );
        }

        // Texture uploads run outside an error scope.
        let max_dimension = device.limits().max_texture_dimension_2d;
        let height_label = format!("{} height", surface.name);
        let diffuse_label = format!("{} diffuse", surface.name);
        surface.height.check_dimensions(max_dimension, &height_label)?;
        surface.diffuse.check_dimensions(max_dimension, &diffuse_label)?;

        let grid = PatchGrid::for_source_width(surface.height.width);
        let height = Texture::from_image_data(
            device,
            queue,
            &surface.height,
            &height_label,
            wgpu::AddressMode::ClampToEdge,
        );
        let diffuse = Texture::from_image_data(
            device,
            queue,
            &surface.diffuse,
            &diffuse_label,
            wgpu::AddressMode::ClampToEdge,
        );

        let control_points = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("TerrainControlPoints"),
            contents: bytemuck::cast_slice(&grid.control_points()),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let lod_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("TerrainLodBuffer"),
            size: (mem::size_of::<PatchLod>() * grid.patch_count() as usize * MAX_PASSES_PER_FRAME) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = shader::validated(device, "TerrainBindGroup", || {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("TerrainBindGroup"),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: control_points.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: lod_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: wgpu::BindingResource::TextureView(&height.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: wgpu::BindingResource::TextureView(&diffuse.view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
        })?;

        Ok(Self {
            name: surface.name.clone(),
            grid,
            _height: height,
            _diffuse: diffuse,
            _control_points: control_points,
            lod_buffer,
            bind_group,
        })
    }
}

fn storage_entry(binding: u32, element_size: usize) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only: true },
            has_dynamic_offset: false,
            min_binding_size: NonZeroU64::new(element_size as u64),
        },
        count: None,
    }
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn create_shadow_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    shadow: &ShadowMap,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("TerrainShadowBindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(shadow.view()),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(shadow.sampler()),
            },
        ],
    })
}
