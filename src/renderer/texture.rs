use std::path::Path;

use crate::error::RenderError;
use crate::renderer::pipeline_builder::PipelineBuilder;

/// Decoded RGBA8 pixels, independent of any GPU.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>, label: &str) -> Result<Self, RenderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || pixels.len() != expected {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!(
                    "{}x{} needs {} bytes, got {}",
                    width,
                    height,
                    expected,
                    pixels.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Grayscale, palette and 16-bit sources are all expanded to RGBA8.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RenderError> {
        let path = path.as_ref();
        log::info!("Loading texture: {:?}", path);
        let img = image::open(path).map_err(|source| RenderError::TextureLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_image(img))
    }

    pub fn from_image(img: image::DynamicImage) -> Self {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self {
            width,
            height,
            pixels: rgba.into_raw(),
        }
    }

    /// Rejects images the device cannot hold in a single 2D texture.
    pub fn check_dimensions(&self, max_dimension: u32, label: &str) -> Result<(), RenderError> {
        if self.width > max_dimension || self.height > max_dimension {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: format!(
                    "{}x{} exceeds the device limit of {}",
                    self.width, self.height, max_dimension
                ),
            });
        }
        Ok(())
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4) as usize;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }
}

#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    /// Number of mip levels down to 1x1.
    fn calculate_mip_levels(width: u32, height: u32) -> u32 {
        let max_dimension = width.max(height).max(1);
        u32::BITS - max_dimension.leading_zeros()
    }

    /// Uploads RGBA8 data and fills the mip chain on the GPU.
    pub fn from_image_data(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        data: &ImageData,
        label: &str,
        address_mode: wgpu::AddressMode,
    ) -> Self {
        let format = wgpu::TextureFormat::Rgba8Unorm;
        let mip_level_count = Self::calculate_mip_levels(data.width, data.height);
        let size = wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        write_layer(queue, &texture, data, 0);
        Self::generate_mipmaps(device, queue, &texture, mip_level_count, format);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
        }
    }

    /// Six faces in +X, -X, +Y, -Y, +Z, -Z order. All faces must be square
    /// and share one size.
    pub fn cubemap(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[ImageData; 6],
        label: &str,
    ) -> Result<Self, RenderError> {
        let edge = faces[0].width;
        if faces.iter().any(|face| face.width != edge || face.height != edge) {
            return Err(RenderError::InvalidTexture {
                label: label.to_string(),
                reason: "cubemap faces must be square and equally sized".into(),
            });
        }

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: edge,
                height: edge,
                depth_or_array_layers: 6,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (layer, face) in faces.iter().enumerate() {
            write_layer(queue, &texture, face, layer as u32);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(label),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            array_layer_count: Some(6),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }

    /// Fills levels `1..mip_level_count` by blitting each level from the one above.
    fn generate_mipmaps(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        mip_level_count: u32,
        format: wgpu::TextureFormat,
    ) {
        if mip_level_count <= 1 {
            return;
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("MipBlitShader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader/blit.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("MipBlitLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("MipBlitPipelineLayout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = PipelineBuilder::new(device, &pipeline_layout, &shader)
            .with_label("MipBlitPipeline")
            .with_no_culling()
            .with_color_target(format, None)
            .build();

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("MipBlitSampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("MipChainEncoder"),
        });

        let mip_view = |mip: u32, usage: wgpu::TextureUsages| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Mip View"),
                format: Some(format),
                dimension: Some(wgpu::TextureViewDimension::D2),
                aspect: wgpu::TextureAspect::All,
                base_mip_level: mip,
                mip_level_count: Some(1),
                base_array_layer: 0,
                array_layer_count: Some(1),
                usage: Some(usage),
            })
        };

        for target_mip in 1..mip_level_count {
            let src_view = mip_view(target_mip - 1, wgpu::TextureUsages::TEXTURE_BINDING);
            let dst_view = mip_view(target_mip, wgpu::TextureUsages::RENDER_ATTACHMENT);

            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("MipBlitBindGroup"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(&src_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
            });

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("MipBlitPass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &dst_view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rpass.set_pipeline(&pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.draw(0..3, 0..1);
        }

        queue.submit(Some(encoder.finish()));
    }
}

fn write_layer(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &ImageData, layer: u32) {
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
            aspect: wgpu::TextureAspect::All,
        },
        &data.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * data.width),
            rows_per_image: Some(data.height),
        },
        wgpu::Extent3d {
            width: data.width,
            height: data.height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mip_level_calculation() {
        assert_eq!(Texture::calculate_mip_levels(1, 1), 1);
        assert_eq!(Texture::calculate_mip_levels(2, 2), 2);
        assert_eq!(Texture::calculate_mip_levels(4, 4), 3);
        assert_eq!(Texture::calculate_mip_levels(1024, 512), 11);
        // Non power-of-two sizes round down per level
        assert_eq!(Texture::calculate_mip_levels(1025, 1025), 11);
    }

    #[test]
    fn grayscale_images_expand_to_rgba() {
        let gray = image::GrayImage::from_fn(3, 2, |x, y| image::Luma([(x * 10 + y) as u8]));
        let data = ImageData::from_image(image::DynamicImage::ImageLuma8(gray));
        assert_eq!((data.width, data.height), (3, 2));
        assert_eq!(data.pixels.len(), 3 * 2 * 4);
        assert_eq!(data.pixel(2, 1), [21, 21, 21, 255]);
    }

    #[test]
    fn image_data_rejects_mismatched_buffers() {
        assert!(ImageData::new(2, 2, vec![0; 16], "ok").is_ok());
        assert!(matches!(
            ImageData::new(2, 2, vec![0; 15], "short"),
            Err(RenderError::InvalidTexture { .. })
        ));
        assert!(ImageData::new(0, 2, Vec::new(), "empty").is_err());
    }

    #[test]
    fn oversized_images_are_rejected_before_upload() {
        let data = ImageData::new(4, 2, vec![0; 32], "wide").expect("valid image");
        assert!(data.check_dimensions(4, "wide").is_ok());
        match data.check_dimensions(3, "wide") {
            Err(RenderError::InvalidTexture { label, reason }) => {
                assert_eq!(label, "wide");
                assert!(reason.contains("4x2"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ImageData::load("does/not/exist.png").expect_err("missing file");
        match err {
            RenderError::TextureLoad { path, .. } => {
                assert!(path.ends_with("exist.png"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
