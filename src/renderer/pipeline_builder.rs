// src/renderer/pipeline_builder.rs

use std::collections::HashMap;

/// Fluent wrapper over `RenderPipelineDescriptor` with the defaults the
/// terrain renderer uses: `vs_main`/`fs_main`, triangle lists, back-face
/// culling and no multisampling.
pub struct PipelineBuilder<'a> {
    device: &'a wgpu::Device,
    label: Option<&'a str>,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    vertex_entry: &'a str,
    fragment_entry: Option<&'a str>,
    color_targets: Vec<Option<wgpu::ColorTargetState>>,
    depth_stencil: Option<wgpu::DepthStencilState>,
    primitive: wgpu::PrimitiveState,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        layout: &'a wgpu::PipelineLayout,
        shader: &'a wgpu::ShaderModule,
    ) -> Self {
        Self {
            device,
            label: None,
            layout,
            shader,
            vertex_entry: "vs_main",
            fragment_entry: Some("fs_main"),
            color_targets: Vec::new(),
            depth_stencil: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: Some(wgpu::Face::Back),
                front_face: wgpu::FrontFace::Ccw,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
        }
    }

    pub fn with_label(mut self, label: &'a str) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_vertex_entry(mut self, entry: &'a str) -> Self {
        self.vertex_entry = entry;
        self
    }

    /// Drops the fragment stage; used for shadow map rendering.
    pub fn depth_only(mut self) -> Self {
        self.fragment_entry = None;
        self
    }

    pub fn with_color_target(mut self, format: wgpu::TextureFormat, blend: Option<wgpu::BlendState>) -> Self {
        self.color_targets.push(Some(wgpu::ColorTargetState {
            format,
            blend,
            write_mask: wgpu::ColorWrites::ALL,
        }));
        self
    }

    pub fn with_depth_stencil(
        mut self,
        format: wgpu::TextureFormat,
        depth_write: bool,
        depth_compare: wgpu::CompareFunction,
    ) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: depth_write,
            depth_compare,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        });
        self
    }

    /// Depth state with slope-scaled bias against shadow acne.
    pub fn with_depth_stencil_biased(
        mut self,
        format: wgpu::TextureFormat,
        constant_bias: i32,
        slope_bias: f32,
    ) -> Self {
        self.depth_stencil = Some(wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState {
                constant: constant_bias,
                slope_scale: slope_bias,
                clamp: 0.0,
            },
        });
        self
    }

    pub fn with_no_culling(mut self) -> Self {
        self.primitive.cull_mode = None;
        self
    }

    pub fn with_polygon_mode(mut self, mode: wgpu::PolygonMode) -> Self {
        self.primitive.polygon_mode = mode;
        self
    }

    pub fn build(self) -> wgpu::RenderPipeline {
        self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: self.label,
            layout: Some(self.layout),
            vertex: wgpu::VertexState {
                module: self.shader,
                entry_point: Some(self.vertex_entry),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: self.fragment_entry.map(|entry| wgpu::FragmentState {
                module: self.shader,
                entry_point: Some(entry),
                targets: &self.color_targets,
                compilation_options: Default::default(),
            }),
            primitive: self.primitive,
            depth_stencil: self.depth_stencil,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }
}

/// Attachment formats and fill mode a pipeline was built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub color: Option<wgpu::TextureFormat>,
    pub depth: Option<wgpu::TextureFormat>,
    pub wireframe: bool,
}

impl PipelineKey {
    pub fn polygon_mode(&self) -> wgpu::PolygonMode {
        if self.wireframe {
            wgpu::PolygonMode::Line
        } else {
            wgpu::PolygonMode::Fill
        }
    }
}

/// Pipelines of one subsystem, one per attachment configuration it can be
/// drawn into. Built up front so drawing only needs `&self`.
pub struct PipelineSet {
    label: &'static str,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineSet {
    pub fn build(
        label: &'static str,
        keys: &[PipelineKey],
        mut create: impl FnMut(&PipelineKey) -> wgpu::RenderPipeline,
    ) -> Self {
        let mut pipelines = HashMap::with_capacity(keys.len());
        for key in keys {
            pipelines.entry(*key).or_insert_with(|| create(key));
        }
        log::info!("Built {} {} pipeline variants", pipelines.len(), label);
        Self { label, pipelines }
    }

    /// Missing variants are logged and the draw is skipped by the caller.
    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        let pipeline = self.pipelines.get(key);
        if pipeline.is_none() {
            log::warn!("No {} pipeline for {:?}", self.label, key);
        }
        pipeline
    }
}

/// Every attachment configuration the frame plan can target, with and
/// without line rasterization.
pub fn scene_pipeline_keys(surface_format: wgpu::TextureFormat, supports_wireframe: bool) -> Vec<PipelineKey> {
    use crate::renderer::depth::SCREEN_DEPTH_FORMAT;
    use crate::renderer::target::TargetKind;

    let formats = [
        (Some(surface_format), Some(SCREEN_DEPTH_FORMAT)),
        (TargetKind::Color.color_format(), Some(TargetKind::Color.depth_format())),
        (
            TargetKind::ColorAndDepth.color_format(),
            Some(TargetKind::ColorAndDepth.depth_format()),
        ),
    ];
    let modes: &[bool] = if supports_wireframe { &[false, true] } else { &[false] };

    formats
        .iter()
        .flat_map(|&(color, depth)| {
            modes.iter().map(move |&wireframe| PipelineKey {
                color,
                depth,
                wireframe,
            })
        })
        .collect()
}

/// Attachment configurations for full-screen passes: no depth.
pub fn fullscreen_pipeline_keys(surface_format: wgpu::TextureFormat) -> Vec<PipelineKey> {
    use crate::renderer::target::COLOR_FORMAT;

    let mut keys = vec![PipelineKey {
        color: Some(surface_format),
        depth: None,
        wireframe: false,
    }];
    if surface_format != COLOR_FORMAT {
        keys.push(PipelineKey {
            color: Some(COLOR_FORMAT),
            depth: None,
            wireframe: false,
        });
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_keys_cover_every_target_kind() {
        let keys = scene_pipeline_keys(wgpu::TextureFormat::Bgra8Unorm, true);
        assert_eq!(keys.len(), 6);
        assert!(keys.iter().any(|k| k.color == Some(wgpu::TextureFormat::Bgra8Unorm)));
        assert!(keys
            .iter()
            .any(|k| k.depth == Some(wgpu::TextureFormat::Depth24PlusStencil8)));
        assert!(keys.iter().any(|k| k.wireframe));

        let fill_only = scene_pipeline_keys(wgpu::TextureFormat::Bgra8Unorm, false);
        assert!(fill_only.iter().all(|k| !k.wireframe));
    }

    #[test]
    fn fullscreen_keys_skip_duplicate_formats() {
        assert_eq!(fullscreen_pipeline_keys(wgpu::TextureFormat::Rgba8Unorm).len(), 1);
        assert_eq!(fullscreen_pipeline_keys(wgpu::TextureFormat::Bgra8Unorm).len(), 2);
    }

    #[test]
    fn wireframe_key_selects_line_mode() {
        let key = PipelineKey {
            color: None,
            depth: None,
            wireframe: true,
        };
        assert_eq!(key.polygon_mode(), wgpu::PolygonMode::Line);
    }
}
