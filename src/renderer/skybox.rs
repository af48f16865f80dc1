use crate::error::RenderError;
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
use crate::renderer::shader;
use crate::renderer::texture::{ImageData, Texture};

/// Vertices of the cube generated in `skybox.wgsl`.
pub const CUBE_VERTEX_COUNT: u32 = 36;

/// Cube-mapped background drawn at the far plane.
pub struct Skybox {
    _cubemap: Texture,
    bind_group: wgpu::BindGroup,
    pipelines: PipelineSet,
}

impl Skybox {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        pass_layout: &wgpu::BindGroupLayout,
        pipeline_keys: &[PipelineKey],
        faces: &[ImageData; 6],
    ) -> Result<Self, RenderError> {
        let cubemap = Texture::cubemap(device, queue, faces, "SkyboxCubemap")?;

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("SkyboxLayout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("SkyboxBindGroup"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&cubemap.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&cubemap.sampler),
                },
            ],
        });

        let module = shader::scene_module(device, "SkyboxShader", include_str!("../shader/skybox.wgsl"))?;
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("SkyboxPipelineLayout"),
            bind_group_layouts: &[pass_layout, &layout],
            push_constant_ranges: &[],
        });

        // Drawn last at depth 1.0: passes only where nothing else was drawn.
        let pipelines = shader::validated(device, "SkyboxPipelines", || {
            PipelineSet::build("skybox", pipeline_keys, |key| {
                let mut builder = PipelineBuilder::new(device, &pipeline_layout, &module)
                    .with_label("SkyboxPipeline")
                    .with_no_culling()
                    .with_polygon_mode(key.polygon_mode());
                if let Some(color) = key.color {
                    builder = builder.with_color_target(color, None);
                }
                if let Some(depth) = key.depth {
                    builder = builder.with_depth_stencil(depth, false, wgpu::CompareFunction::LessEqual);
                }
                builder.build()
            })
        })?;

        log::info!("Skybox initialized ({}px faces)", faces[0].width);

        Ok(Self {
            _cubemap: cubemap,
            bind_group,
            pipelines,
        })
    }

    pub fn render(&self, rpass: &mut wgpu::RenderPass<'_>, ctx: &DrawContext<'_>) {
        let Some(pipeline) = self.pipelines.get(&ctx.key) else {
            return;
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, ctx.pass_bind_group, &[ctx.pass_offset]);
        rpass.set_bind_group(1, &self.bind_group, &[]);
        rpass.draw(0..CUBE_VERTEX_COUNT, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::procedural;

    #[test]
    fn shader_generates_the_whole_cube() {
        let source = include_str!("../shader/skybox.wgsl");
        assert!(source.contains(&format!("array<u32, {CUBE_VERTEX_COUNT}>")));
        assert!(source.contains("clip.xyww"));
    }

    #[test]
    #[ignore = "requires a GPU adapter"]
    fn mismatched_faces_are_rejected() {
        let (device, queue, _) =
            pollster::block_on(crate::renderer::context::headless_device()).expect("device");
        let mut faces = procedural::sky_faces(16);
        faces[3] = ImageData::new(8, 8, vec![0; 8 * 8 * 4], "small").expect("valid image");
        let uniforms = crate::renderer::uniforms::PassUniforms::new(&device);
        let result = Skybox::new(&device, &queue, uniforms.layout(), &[], &faces);
        assert!(matches!(result, Err(RenderError::InvalidTexture { .. })));
    }
}
