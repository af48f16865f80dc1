use crate::error::RenderError;
use crate::renderer::binding::TargetSlot;

pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;
pub const SAMPLED_DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Attachment layout of an offscreen target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// Sampleable color plus a depth-stencil buffer that is only rendered to.
    Color,
    /// Sampleable depth, no color.
    Depth,
    /// Sampleable color plus a sampleable depth texture.
    ColorAndDepth,
}

impl TargetKind {
    pub fn color_format(self) -> Option<wgpu::TextureFormat> {
        match self {
            TargetKind::Color | TargetKind::ColorAndDepth => Some(COLOR_FORMAT),
            TargetKind::Depth => None,
        }
    }

    pub fn depth_format(self) -> wgpu::TextureFormat {
        match self {
            TargetKind::Color => DEPTH_STENCIL_FORMAT,
            TargetKind::Depth | TargetKind::ColorAndDepth => SAMPLED_DEPTH_FORMAT,
        }
    }

    pub fn depth_is_sampleable(self) -> bool {
        !matches!(self, TargetKind::Color)
    }

    fn depth_usage(self) -> wgpu::TextureUsages {
        if self.depth_is_sampleable() {
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING
        } else {
            wgpu::TextureUsages::RENDER_ATTACHMENT
        }
    }
}

/// Size and layout of a target, independent of GPU storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub slot: TargetSlot,
    pub width: u32,
    pub height: u32,
    pub kind: TargetKind,
}

impl TargetDescriptor {
    pub fn new(slot: TargetSlot, width: u32, height: u32, kind: TargetKind) -> Result<Self, RenderError> {
        let descriptor = Self {
            slot,
            width,
            height,
            kind,
        };
        descriptor.validate(u32::MAX)?;
        Ok(descriptor)
    }

    pub fn validate(&self, max_dimension: u32) -> Result<(), RenderError> {
        let invalid = self.width == 0
            || self.height == 0
            || self.width > max_dimension
            || self.height > max_dimension;
        if invalid {
            return Err(RenderError::InvalidTargetSize {
                label: self.slot.label().to_string(),
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn resized(&self, width: u32, height: u32) -> Result<Self, RenderError> {
        Self::new(self.slot, width, height, self.kind)
    }

    /// Same as [`TargetDescriptor::resized`] but also bounded by a device limit.
    pub fn resized_within(&self, width: u32, height: u32, max_dimension: u32) -> Result<Self, RenderError> {
        let descriptor = self.resized(width, height)?;
        descriptor.validate(max_dimension)?;
        Ok(descriptor)
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

struct Attachment {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl Attachment {
    fn new(
        device: &wgpu::Device,
        label: &str,
        extent: wgpu::Extent3d,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            ..Default::default()
        });
        Self {
            _texture: texture,
            view,
        }
    }
}

/// GPU render target owned by one subsystem.
///
/// `resize` swaps the storage but keeps the slot, so the frame plan keeps
/// addressing the same target. Consumers holding bind groups over the old
/// views compare [`OffscreenTarget::generation`] to know when to rebuild.
pub struct OffscreenTarget {
    descriptor: TargetDescriptor,
    color: Option<Attachment>,
    depth: Attachment,
    generation: u64,
}

impl OffscreenTarget {
    pub fn create(
        device: &wgpu::Device,
        slot: TargetSlot,
        width: u32,
        height: u32,
        kind: TargetKind,
    ) -> Result<Self, RenderError> {
        let descriptor = TargetDescriptor::new(slot, width, height, kind)?;
        descriptor.validate(device.limits().max_texture_dimension_2d)?;
        let (color, depth) = Self::allocate(device, &descriptor);
        log::info!(
            "Created {} target {}x{} ({:?})",
            slot.label(),
            width,
            height,
            kind
        );
        Ok(Self {
            descriptor,
            color,
            depth,
            generation: 0,
        })
    }

    fn allocate(device: &wgpu::Device, descriptor: &TargetDescriptor) -> (Option<Attachment>, Attachment) {
        let label = descriptor.slot.label();
        let extent = descriptor.extent();
        let color = descriptor.kind.color_format().map(|format| {
            Attachment::new(
                device,
                &format!("{label}Color"),
                extent,
                format,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
        });
        let depth = Attachment::new(
            device,
            &format!("{label}Depth"),
            extent,
            descriptor.kind.depth_format(),
            descriptor.kind.depth_usage(),
        );
        (color, depth)
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) == self.size() {
            return Ok(());
        }
        let descriptor = self
            .descriptor
            .resized_within(width, height, device.limits().max_texture_dimension_2d)?;
        let (color, depth) = Self::allocate(device, &descriptor);
        self.descriptor = descriptor;
        self.color = color;
        self.depth = depth;
        self.generation += 1;
        Ok(())
    }

    /// Fails exactly when [`OffscreenTarget::resize`] would, without touching
    /// the current storage.
    pub fn check_resize(&self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), RenderError> {
        if (width, height) == self.size() {
            return Ok(());
        }
        self.descriptor
            .resized_within(width, height, device.limits().max_texture_dimension_2d)
            .map(|_| ())
    }

    pub fn slot(&self) -> TargetSlot {
        self.descriptor.slot
    }

    pub fn kind(&self) -> TargetKind {
        self.descriptor.kind
    }

    pub fn size(&self) -> (u32, u32) {
        (self.descriptor.width, self.descriptor.height)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn color_format(&self) -> Option<wgpu::TextureFormat> {
        self.descriptor.kind.color_format()
    }

    pub fn depth_format(&self) -> wgpu::TextureFormat {
        self.descriptor.kind.depth_format()
    }

    pub fn color_view(&self) -> Option<&wgpu::TextureView> {
        self.color.as_ref().map(|attachment| &attachment.view)
    }

    /// Depth view for sampling; `None` for kinds whose depth is render-only.
    pub fn sampled_depth_view(&self) -> Option<&wgpu::TextureView> {
        self.descriptor
            .kind
            .depth_is_sampleable()
            .then_some(&self.depth.view)
    }

    pub fn depth_attachment_view(&self) -> &wgpu::TextureView {
        &self.depth.view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_targets_are_rejected() {
        for (w, h) in [(0, 10), (10, 0), (0, 0)] {
            let result = TargetDescriptor::new(TargetSlot::FogScene, w, h, TargetKind::ColorAndDepth);
            assert!(matches!(
                result,
                Err(RenderError::InvalidTargetSize { .. })
            ));
        }
    }

    #[test]
    fn resize_reports_new_size_and_keeps_identity() {
        let desc = TargetDescriptor::new(TargetSlot::AaScene, 800, 600, TargetKind::Color)
            .expect("valid descriptor");
        let resized = desc.resized(1920, 1080).expect("valid resize");
        assert_eq!((resized.width, resized.height), (1920, 1080));
        assert_eq!(resized.slot, desc.slot);
        assert_eq!(resized.kind, desc.kind);
        assert!(desc.resized(0, 1080).is_err());
    }

    #[test]
    fn validate_respects_device_limit() {
        let desc = TargetDescriptor::new(TargetSlot::ShadowMap, 8192, 8192, TargetKind::Depth)
            .expect("valid descriptor");
        assert!(desc.validate(4096).is_err());
        assert!(desc.validate(8192).is_ok());
    }

    #[test]
    fn bounded_resize_applies_the_device_limit() {
        let desc = TargetDescriptor::new(TargetSlot::FogScene, 800, 600, TargetKind::ColorAndDepth)
            .expect("valid descriptor");
        let resized = desc.resized_within(2048, 1024, 2048).expect("within limit");
        assert_eq!((resized.width, resized.height), (2048, 1024));
        assert!(matches!(
            desc.resized_within(2049, 1024, 2048),
            Err(RenderError::InvalidTargetSize { width: 2049, .. })
        ));
        assert!(desc.resized_within(0, 1024, 2048).is_err());
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn resizing_a_target_swaps_storage_and_bumps_generation() {
        let (device, _queue, _) =
            pollster::block_on(crate::renderer::context::headless_device()).expect("device");
        let mut target =
            OffscreenTarget::create(&device, TargetSlot::FogScene, 64, 32, TargetKind::ColorAndDepth)
                .expect("target");
        assert_eq!(target.generation(), 0);

        target.resize(&device, 128, 96).expect("resize");
        assert_eq!(target.size(), (128, 96));
        assert_eq!(target.slot(), TargetSlot::FogScene);
        assert_eq!(target.kind(), TargetKind::ColorAndDepth);
        assert_eq!(target.generation(), 1);
        assert!(target.color_view().is_some());
        assert!(target.sampled_depth_view().is_some());

        // Same size keeps the storage.
        target.resize(&device, 128, 96).expect("same size");
        assert_eq!(target.generation(), 1);

        let too_large = device.limits().max_texture_dimension_2d + 1;
        assert!(target.check_resize(&device, too_large, 96).is_err());
        assert!(target.resize(&device, too_large, 96).is_err());
        assert_eq!(target.size(), (128, 96));
        assert_eq!(target.generation(), 1);
        assert!(target.check_resize(&device, 256, 256).is_ok());
    }

    #[test]
    fn kinds_pick_expected_attachments() {
        assert_eq!(TargetKind::Depth.color_format(), None);
        assert_eq!(TargetKind::Color.depth_format(), DEPTH_STENCIL_FORMAT);
        assert!(!TargetKind::Color.depth_is_sampleable());
        assert!(TargetKind::ColorAndDepth.depth_is_sampleable());
        assert_eq!(TargetKind::ColorAndDepth.depth_format(), SAMPLED_DEPTH_FORMAT);
    }
}
