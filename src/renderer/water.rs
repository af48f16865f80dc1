use std::mem;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::renderer::binding::TargetSlot;
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
use crate::renderer::shader;
use crate::renderer::target::{OffscreenTarget, TargetKind};
use crate::renderer::texture::{ImageData, Texture};
use crate::renderer::uniforms::{self, WaterUniform};
use crate::scene::DirectionalLight;

/// Fraction of the terrain extent the water quad covers, keeping its edge
/// inside the terrain border.
pub const SIZE_FACTOR: f32 = 0.98;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterParams {
    pub water_level: f32,
    pub tiling: f32,
    pub wave_speed: f32,
    pub wave_strength: f32,
    pub shine_damper: f32,
    pub reflectivity: f32,
    pub use_dudv: bool,
    pub use_normal_map: bool,
    pub use_specular: bool,
}

impl Default for WaterParams {
    fn default() -> Self {
        Self {
            water_level: 0.3,
            tiling: 10.0,
            wave_speed: 0.05,
            wave_strength: 0.02,
            shine_damper: 20.0,
            reflectivity: 0.6,
            use_dudv: true,
            use_normal_map: true,
            use_specular: true,
        }
    }
}

/// Phase of the DUDV scroll, wrapped to `[0, 1)`.
pub fn move_factor(elapsed_seconds: f32, wave_speed: f32) -> f32 {
    (elapsed_seconds * wave_speed).rem_euclid(1.0)
}

pub fn half_extent(horizontal_scale: f32) -> f32 {
    horizontal_scale * SIZE_FACTOR * 0.5
}

/// Images sampled by the water surface.
#[derive(Clone, Debug)]
pub struct WaterMaps {
    pub dudv: ImageData,
    pub normal: ImageData,
}

pub struct Water {
    pub params: WaterParams,
    reflection: OffscreenTarget,
    refraction: OffscreenTarget,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    dudv: Texture,
    normal: Texture,
    screen_sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    bound_generations: (u64, u64),
    pipelines: PipelineSet,
    enabled: bool,
}

impl Water {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass_layout: &wgpu::BindGroupLayout,
        pipeline_keys: &[PipelineKey],
        target_size: u32,
        maps: &WaterMaps,
        params: WaterParams,
    ) -> Result<Self, RenderError> {
        let reflection = OffscreenTarget::create(
            device,
            TargetSlot::WaterReflection,
            target_size,
            target_size,
            TargetKind::Color,
        )?;
        let refraction = OffscreenTarget::create(
            device,
            TargetSlot::WaterRefraction,
            target_size,
            target_size,
            TargetKind::ColorAndDepth,
        )?;

        let texture_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let sampler_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        };

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("WaterLayout"),
            entries: &[
                uniforms::uniform_layout_entry(
                    0,
                    wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    mem::size_of::<WaterUniform>(),
                    false,
                ),
                texture_entry(1),
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                sampler_entry(5),
                sampler_entry(6),
            ],
        });

        let uniform_buffer =
            uniforms::uniform_buffer(device, "WaterUniformBuffer", mem::size_of::<WaterUniform>() as u64);

        let dudv = Texture::from_image_data(device, queue, &maps.dudv, "WaterDudv", wgpu::AddressMode::Repeat);
        let normal = Texture::from_image_data(device, queue, &maps.normal, "WaterNormal", wgpu::AddressMode::Repeat);

        let screen_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("WaterScreenSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let module = shader::scene_module(device, "WaterShader", include_str!("../shader/water.wgsl"))?;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("WaterPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout],
            push_constant_ranges: &[],
        });

        let pipelines = shader::validated(device, "WaterPipelines", || {
            PipelineSet::build("water", pipeline_keys, |key| {
                let mut builder = PipelineBuilder::new(device, &pipeline_layout, &module)
                    .with_label("WaterPipeline")
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

        let bind_group = create_bind_group(
            device,
            &layout,
            &uniform_buffer,
            &reflection,
            &refraction,
            (&dudv, &normal),
            &screen_sampler,
        )?;
        let bound_generations = (reflection.generation(), refraction.generation());

        log::info!("Water initialized ({}x{} reflection/refraction)", target_size, target_size);

        Ok(Self {
            params,
            reflection,
            refraction,
            layout,
            uniform_buffer,
            dudv,
            normal,
            screen_sampler,
            bind_group,
            bound_generations,
            pipelines,
            enabled: false,
        })
    }

    pub fn reflection(&self) -> &OffscreenTarget {
        &self.reflection
    }

    pub fn refraction(&self) -> &OffscreenTarget {
        &self.refraction
    }

    /// Rebuilds the bind group if a target was reallocated since the last
    /// frame.
    pub fn sync_bindings(&mut self, device: &wgpu::Device) -> Result<(), RenderError> {
        let current = (self.reflection.generation(), self.refraction.generation());
        if current == self.bound_generations {
            return Ok(());
        }
        self.bind_group = create_bind_group(
            device,
            &self.layout,
            &self.uniform_buffer,
            &self.reflection,
            &self.refraction,
            (&self.dudv, &self.normal),
            &self.screen_sampler,
        )?;
        self.bound_generations = current;
        Ok(())
    }

    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        enabled: bool,
        elapsed_seconds: f32,
        horizontal_scale: f32,
        light: &DirectionalLight,
    ) {
        self.enabled = enabled;
        if !enabled {
            return;
        }
        let (light_direction, light_color) = uniforms::light_vectors(light.direction(), light.color);
        let p = &self.params;
        let uniform = WaterUniform {
            surface: [
                p.water_level,
                half_extent(horizontal_scale),
                p.tiling,
                move_factor(elapsed_seconds, p.wave_speed),
            ],
            shading: [p.wave_strength, p.shine_damper, p.reflectivity, 0.0],
            flags: [p.use_dudv as u32, p.use_normal_map as u32, p.use_specular as u32, 0],
            light_direction,
            light_color,
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Draws the water quad; does nothing while water rendering is off.
    pub fn render(&self, rpass: &mut wgpu::RenderPass<'_>, ctx: &DrawContext<'_>) {
        if !self.enabled {
            return;
        }
        let Some(pipeline) = self.pipelines.get(&ctx.key) else {
            return;
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, ctx.pass_bind_group, &[ctx.pass_offset]);
        rpass.set_bind_group(1, &self.bind_group, &[]);
        rpass.draw(0..6, 0..1);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    reflection: &OffscreenTarget,
    refraction: &OffscreenTarget,
    (dudv, normal): (&Texture, &Texture),
    screen_sampler: &wgpu::Sampler,
) -> Result<wgpu::BindGroup, RenderError> {
    fn color_view(target: &OffscreenTarget) -> Result<&wgpu::TextureView, RenderError> {
        target.color_view().ok_or_else(|| RenderError::InvalidTexture {
            label: target.slot().label().to_string(),
            reason: "water targets need a color attachment".into(),
        })
    }
    let reflection_view = color_view(reflection)?;
    let refraction_view = color_view(refraction)?;

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("WaterBindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(reflection_view),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(refraction_view),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: wgpu::BindingResource::TextureView(&dudv.view),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: wgpu::BindingResource::TextureView(&normal.view),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: wgpu::BindingResource::Sampler(screen_sampler),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: wgpu::BindingResource::Sampler(&dudv.sampler),
            },
        ],
    }))
}
