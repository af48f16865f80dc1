use std::mem;
use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::renderer::pass::{PassContext, ViewState};
use crate::renderer::plan::MAX_PASSES_PER_FRAME;

/// Per-pass transforms, bound at group 0 with a dynamic offset.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PassUniform {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    pub inv_view_proj: [[f32; 4]; 4],
    pub light_space: [[f32; 4]; 4],
    pub clip_plane: [f32; 4],
    pub camera_position: [f32; 4],
    /// x: first LOD record for this pass, y: shadows, z: lighting,
    /// w: show ground.
    pub params: [u32; 4],
}

impl PassUniform {
    pub fn new(ctx: &PassContext, lod_base: u32) -> Self {
        let view_proj = ctx.view_projection();
        Self {
            view: ctx.view_matrix().to_cols_array_2d(),
            proj: ctx.projection_matrix().to_cols_array_2d(),
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            light_space: ctx.light_space_matrix().to_cols_array_2d(),
            clip_plane: ctx.clip_plane_vector().to_array(),
            camera_position: ctx.camera_position().extend(1.0).to_array(),
            params: [
                lod_base,
                ctx.flags.use_shadow as u32,
                ctx.flags.use_lighting as u32,
                ctx.flags.show_ground as u32,
            ],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct TerrainUniform {
    /// height scale, height offset, horizontal scale, ambient strength
    pub shape: [f32; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
    /// x: patches per side
    pub grid: [u32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct WaterUniform {
    /// water level, half extent, tiling, move factor
    pub surface: [f32; 4],
    /// wave strength, shine damper, reflectivity, unused
    pub shading: [f32; 4],
    /// dudv, normal map, specular, unused
    pub flags: [u32; 4],
    pub light_direction: [f32; 4],
    pub light_color: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FogUniform {
    /// rgb color, density
    pub color: [f32; 4],
    /// fog height, height falloff, layered flag, unused
    pub layer: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct FxaaUniform {
    /// 1/width, 1/height, span max, reduce mul
    pub params: [f32; 4],
    /// reduce min, unused
    pub extra: [f32; 4],
}

pub fn light_vectors(direction: Vec3, color: Vec3) -> ([f32; 4], [f32; 4]) {
    (direction.extend(0.0).to_array(), color.extend(1.0).to_array())
}

pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

pub fn uniform_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub fn uniform_layout_entry(
    binding: u32,
    visibility: wgpu::ShaderStages,
    size: usize,
    dynamic: bool,
) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic,
            min_binding_size: NonZeroU64::new(size as u64),
        },
        count: None,
    }
}

/// One [`PassUniform`] slot per planned pass, addressed by dynamic offset.
///
/// Writes for every pass land before the encoder is submitted, so each
/// pass needs its own slot instead of overwriting a shared uniform.
pub struct PassUniforms {
    buffer: wgpu::Buffer,
    layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    stride: u64,
}

impl PassUniforms {
    pub fn new(device: &wgpu::Device) -> Self {
        let element_size = mem::size_of::<PassUniform>() as u64;
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = aligned_stride(element_size, alignment);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("PassUniformLayout"),
            entries: &[uniform_layout_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                mem::size_of::<PassUniform>(),
                true,
            )],
        });

        let buffer = uniform_buffer(device, "PassUniformBuffer", stride * MAX_PASSES_PER_FRAME as u64);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("PassUniformBindGroup"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(element_size),
                }),
            }],
        });

        log::info!(
            "Pass uniforms: {} slots of {} bytes (stride {})",
            MAX_PASSES_PER_FRAME,
            element_size,
            stride
        );

        Self {
            buffer,
            layout,
            bind_group,
            stride,
        }
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn write(&self, queue: &wgpu::Queue, index: usize, uniform: &PassUniform) {
        assert!(index < MAX_PASSES_PER_FRAME, "pass index {index} out of range");
        queue.write_buffer(&self.buffer, self.offset(index) as u64, bytemuck::bytes_of(uniform));
    }

    pub fn offset(&self, index: usize) -> u32 {
        (self.stride * index as u64) as u32
    }
}
