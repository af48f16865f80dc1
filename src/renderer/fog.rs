//! Full-screen distance and height fog.
//!
//! The scene is first rendered into [`TargetSlot::FogScene`]; the composite
//! pass then reads its color and depth, rebuilds each pixel's world position
//! from the inverse view-projection and blends toward the fog color.
//! [`fog_factor`] and [`reconstruct_world`] mirror the shader math.

use std::mem;

use glam::{Mat4, Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::renderer::binding::TargetSlot;
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
use crate::renderer::shader;
use crate::renderer::target::{OffscreenTarget, TargetKind};
use crate::renderer::uniforms::{self, FogUniform};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogParams {
    pub density: f32,
    pub color: [f32; 3],
    /// Layered fog thins out above this height.
    pub fog_height: f32,
    pub height_falloff: f32,
    pub layered: bool,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            density: 0.007,
            color: [0.5, 0.6, 0.7],
            fog_height: 5.0,
            height_falloff: 0.15,
            layered: false,
        }
    }
}

impl FogParams {
    fn uniform(&self) -> FogUniform {
        FogUniform {
            color: [self.color[0], self.color[1], self.color[2], self.density],
            layer: [
                self.fog_height,
                self.height_falloff,
                if self.layered { 1.0 } else { 0.0 },
                0.0,
            ],
        }
    }
}

/// Inverse of the projection applied to a pixel: `uv` in `[0, 1]` with
/// `v` growing downward, `depth` in `[0, 1]`.
pub fn reconstruct_world(inv_view_proj: Mat4, uv: Vec2, depth: f32) -> Vec3 {
    let ndc = glam::Vec4::new(uv.x * 2.0 - 1.0, 1.0 - uv.y * 2.0, depth, 1.0);
    let world = inv_view_proj * ndc;
    world.truncate() / world.w
}

/// Exponential-squared fog, scaled by a height term when layered.
pub fn fog_factor(distance: f32, height: f32, params: &FogParams) -> f32 {
    let scaled = distance * params.density;
    let mut amount = 1.0 - (-scaled * scaled).exp();
    if params.layered {
        amount *= (-(height - params.fog_height).max(0.0) * params.height_falloff).exp();
    }
    amount.clamp(0.0, 1.0)
}

pub struct Fog {
    pub params: FogParams,
    target: OffscreenTarget,
    layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    bound_generation: u64,
    pipelines: PipelineSet,
}

impl Fog {
    pub fn new(
        device: &wgpu::Device,
        pass_layout: &wgpu::BindGroupLayout,
        pipeline_keys: &[PipelineKey],
        width: u32,
        height: u32,
        params: FogParams,
    ) -> Result<Self, RenderError> {
        let target = OffscreenTarget::create(device, TargetSlot::FogScene, width, height, TargetKind::ColorAndDepth)?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("FogLayout"),
            entries: &[
                uniforms::uniform_layout_entry(0, wgpu::ShaderStages::FRAGMENT, mem::size_of::<FogUniform>(), false),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
            ],
        });

        let uniform_buffer = uniforms::uniform_buffer(device, "FogUniformBuffer", mem::size_of::<FogUniform>() as u64);
        let bind_group = create_bind_group(device, &layout, &uniform_buffer, &target)?;
        let bound_generation = target.generation();

        let module = shader::scene_module(device, "FogShader", include_str!("../shader/fog.wgsl"))?;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("FogPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout],
            push_constant_ranges: &[],
        });
        let pipelines = shader::validated(device, "FogPipelines", || {
            PipelineSet::build("fog", pipeline_keys, |key| {
                let mut builder = PipelineBuilder::new(device, &pipeline_layout, &module)
                    .with_label("FogPipeline")
                    .with_no_culling();
                if let Some(color) = key.color {
                    builder = builder.with_color_target(color, None);
                }
                builder.build()
            })
        })?;

        log::info!("Fog initialized (density {})", params.density);

        Ok(Self {
            params,
            target,
            layout,
            uniform_buffer,
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
        self.bind_group = create_bind_group(device, &self.layout, &self.uniform_buffer, &self.target)?;
        self.bound_generation = self.target.generation();
        Ok(())
    }

    pub fn prepare(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.params.uniform()));
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
    target: &OffscreenTarget,
) -> Result<wgpu::BindGroup, RenderError> {
    let missing = |what: &str| RenderError::InvalidTexture {
        label: target.slot().label().to_string(),
        reason: format!("fog scene needs a sampleable {what} attachment"),
    };
    let color = target.color_view().ok_or_else(|| missing("color"))?;
    let depth = target.sampled_depth_view().ok_or_else(|| missing("depth"))?;

    Ok(device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("FogBindGroup"),
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
                resource: wgpu::BindingResource::TextureView(depth),
            },
        ],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fog_grows_with_distance() {
        let params = FogParams::default();
        assert_eq!(fog_factor(0.0, 0.0, &params), 0.0);
        let mut previous = 0.0;
        for distance in [10.0, 50.0, 100.0, 200.0, 500.0] {
            let amount = fog_factor(distance, 0.0, &params);
            assert!(amount > previous);
            previous = amount;
        }
        assert!(fog_factor(1000.0, 0.0, &params) > 0.99);
    }

    #[test]
    fn layered_fog_thins_above_fog_height() {
        let params = FogParams {
            layered: true,
            ..FogParams::default()
        };
        let below = fog_factor(100.0, params.fog_height - 1.0, &params);
        let above = fog_factor(100.0, params.fog_height + 20.0, &params);
        assert!(above < below);
        assert_eq!(below, fog_factor(100.0, 0.0, &FogParams::default()));
    }

    #[test]
    fn uniform_packs_density_and_flag() {
        let uniform = FogParams {
            layered: true,
            ..FogParams::default()
        }
        .uniform();
        assert_eq!(uniform.color[3], 0.007);
        assert_eq!(uniform.layer[2], 1.0);
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn bindings_follow_the_resized_target() {
        let (device, _queue, _) =
            pollster::block_on(crate::renderer::context::headless_device()).expect("device");
        let uniforms = crate::renderer::uniforms::PassUniforms::new(&device);
        let mut fog = Fog::new(&device, uniforms.layout(), &[], 64, 64, FogParams::default()).expect("fog");
        assert_eq!(fog.bound_generation, 0);

        fog.sync_bindings(&device).expect("unchanged target");
        assert_eq!(fog.bound_generation, 0);

        fog.check_resize(&device, 320, 200).expect("valid size");
        fog.resize(&device, 320, 200).expect("resize");
        assert_eq!(fog.target().size(), (320, 200));
        assert_eq!(fog.target().generation(), 1);
        assert_eq!(fog.bound_generation, 0);

        fog.sync_bindings(&device).expect("rebuild");
        assert_eq!(fog.bound_generation, 1);
    }
}
