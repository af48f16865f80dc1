use crate::error::RenderError;
use crate::renderer::binding::TargetSlot;
use crate::renderer::target::{OffscreenTarget, TargetKind};

/// Depth-only target the light renders the terrain into, sampled with a
/// comparison sampler by the terrain shader.
pub struct ShadowMap {
    target: OffscreenTarget,
    sampler: wgpu::Sampler,
}

impl ShadowMap {
    pub fn new(device: &wgpu::Device, size: u32) -> Result<Self, RenderError> {
        let target = OffscreenTarget::create(device, TargetSlot::ShadowMap, size, size, TargetKind::Depth)?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("ShadowSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        Ok(Self { target, sampler })
    }

    pub fn target(&self) -> &OffscreenTarget {
        &self.target
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Always present: depth-only targets keep their depth sampleable.
    pub fn view(&self) -> &wgpu::TextureView {
        self.target.depth_attachment_view()
    }

    pub fn generation(&self) -> u64 {
        self.target.generation()
    }
}
