use std::mem;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::renderer::binding::TargetSlot;
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
use crate::renderer::shader;
use crate::renderer::target::{OffscreenTarget, TargetKind};
use crate::renderer::uniforms::{self, FxaaUniform};

const LUMA_WEIGHTS: Vec3 = Vec3::new(0.299, 0.587, 0.114);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxaaSettings {
    /// Longest blur, in pixels, along the detected edge.
    pub span_max: f32,
    pub reduce_mul: f32,
    pub reduce_min: f32,
}

impl Default for FxaaSettings {
    fn default() -> Self {
        Self {
            span_max: 8.0,
            reduce_mul: 1.0 / 8.0,
            reduce_min: 1.0 / 128.0,
        }
    }
}

impl FxaaSettings {
    fn uniform(&self, width: u32, height: u32) -> FxaaUniform {
        FxaaUniform {
            params: [
                1.0 / width.max(1) as f32,
                1.0 / height.max(1) as f32,
                self.span_max,
                self.reduce_mul,
            ],
            extra: [self.reduce_min, 0.0, 0.0, 0.0],
        }
    }
}

pub fn luma(rgb: Vec3) -> f32 {
    rgb.dot(LUMA_WEIGHTS)
}

/// Blur direction in pixels from the lumas of the four diagonal
/// neighbours, ordered NW, NE, SW, SE. Points along the edge.
pub fn edge_direction(corners: [f32; 4], settings: &FxaaSettings) -> Vec2 {
    let [nw, ne, sw, se] = corners;
    let dir = Vec2::new(-((nw + ne) - (sw + se)), (nw + sw) - (ne + se));
    let reduce = ((nw + ne + sw + se) * 0.25 * settings.reduce_mul).max(settings.reduce_min);
    let rcp_min = 1.0 / (dir.x.abs().min(dir.y.abs()) + reduce);
    (dir * rcp_min).clamp(Vec2::splat(-settings.span_max), Vec2::splat(settings.span_max))
}

pub struct Fxaa {
    pub settings: FxaaSettings,
    target: OffscreenTarget,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    bound_generation: u64,
    pipelines: PipelineSet,
}

impl Fxaa {
    pub fn new(
        device: &wgpu::Device,
        pass_layout: &wgpu::BindGroupLayout,
        pipeline_keys: &[PipelineKey],
        width: u32,
        height: u32,
        settings: FxaaSettings,
    ) -> Result<Self, RenderError> {
        let target = OffscreenTarget::create(device, TargetSlot::AaScene, width, height, TargetKind::Color)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FxaaLayout"),
            entries: &[
                uniforms::uniform_layout_entry(0, wgpu::ShaderStages::FRAGMENT, mem::size_of::<FxaaUniform>(), false),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let uniform_buffer =
            uniforms::uniform_buffer(device, "FxaaUniformBuffer", mem::size_of::<FxaaUniform>() as u64);
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("FxaaSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = create_bind_group(device, &layout, &uniform_buffer, &sampler, &target)?;
        let bound_generation = target.generation();

        let module = shader::scene_module(device, "FxaaShader", include_str!("../shader/fxaa.wgsl"))?;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("FxaaPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout],
            push_constant_ranges: &[],
        });
        let pipelines = shader::validated(device, "FxaaPipelines", || {
            PipelineSet::build("fxaa", pipeline_keys, |key| {
                let mut builder = PipelineBuilder::new(device, &pipeline_layout, &module)
                    .with_label("FxaaPipeline")
                    .with_no_culling();
                if let Some(color) = key.color {
                    builder = builder.with_color_target(color, None);
                }
                builder.build()
            })
        })?;

        log::info!("FXAA initialized ({}x{})", width, height);

        Ok(Self {
            settings,
            target,
            layout,
            uniform_buffer,
            sampler,
            bind_group,
            bound_generation,
            pipelines,
        })
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    pub fn check_resize(&self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), RenderError> {
        self.target.check_resize(device, width, height)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), RenderError> {
        self.target.resize(device, width, height)
    }

    pub fn sync_bindings(&mut self, device: &wgpu::Device) -> Result<(), RenderError> {
        if self.target.generation() == self.bound_generation {
            return Ok(());
        }
        self.bind_group = create_bind_group(device, &self.layout, &self.uniform_buffer, &self.sampler, &self.target)?;
        self.bound_generation = self.target.generation();
        Ok(())
    }

    pub fn prepare(&self, queue: &wgpu::Queue) {
        let (width, height) = self.target.size();
        queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.settings.uniform(width, height)),
        );
    }

    pub fn render(&self, rpass: &mut wgpu::RenderPass<'_>, ctx: &DrawContext<'_>) {
        let Some(pipeline) = self.pipelines.get(&ctx.key) else {
            return;
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, ctx.pass_bind_group, &[ctx.pass_offset]);
        rpass.set_bind_group(1, &self.bind_group, &[]);
        rpass.draw(0..3, 0..1);
    }
}

fn create_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniform_buffer: &wgpu::Buffer,
    sampler: &wgpu::Sampler,
    target: &OffscreenTarget,
) -> Result<wgpu::BindGroup, RenderError> {
    let color = target.color_view().ok_or_else(|| RenderError::InvalidTexture {
        label: target.slot().label().to_string(),
        reason: "anti-aliasing needs a color attachment".into(),
    })?;

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("FxaaBindGroup"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(color),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_region_has_no_blur() {
        let dir = edge_direction([0.5; 4], &FxaaSettings::default());
        assert_eq!(dir, Vec2::ZERO);
    }

    #[test]
    fn horizontal_edge_blurs_horizontally_within_span() {
        let settings = FxaaSettings::default();
        let dir = edge_direction([1.0, 1.0, 0.0, 0.0], &settings);
        assert_eq!(dir.y, 0.0);
        assert!(dir.x.abs() > 0.0);
        assert!(dir.x.abs() <= settings.span_max);
    }

    #[test]
    fn luma_weights_green_most() {
        assert!(luma(Vec3::Y) > luma(Vec3::X));
        assert!(luma(Vec3::X) > luma(Vec3::Z));
        assert!((luma(Vec3::ONE) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn uniform_carries_inverse_size() {
        let uniform = FxaaSettings::default().uniform(800, 400);
        assert_eq!(uniform.params[0], 1.0 / 800.0);
        assert_eq!(uniform.params[1], 1.0 / 400.0);
        assert_eq!(uniform.extra[0], 1.0 / 128.0);
    }
}
