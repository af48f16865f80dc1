// renderer/renderer.rs
use std::sync::Arc;

use winit::{dpi::PhysicalSize, window::Window};

use crate::assets::SceneAssets;
use crate::error::RenderError;
use crate::renderer::binding::{TargetBinder, TargetSlot};
use crate::renderer::context::GpuContext;
use crate::renderer::fog::Fog;
use crate::renderer::fxaa::Fxaa;
use crate::renderer::pass::DrawContext;
use crate::renderer::pipeline_builder::{fullscreen_pipeline_keys, scene_pipeline_keys, PipelineKey};
use crate::renderer::plan::{DrawItem, FramePlan, PlannedPass};
use crate::renderer::shadow::ShadowMap;
use crate::renderer::skybox::Skybox;
use crate::renderer::terrain::{SurfaceData, Terrain};
use crate::renderer::uniforms::{PassUniform, PassUniforms};
use crate::renderer::water::Water;
use crate::scene::DirectionalLight;
use crate::settings::SceneSettings;

/// Attachments of the target a pass renders into.
struct PassTarget<'a> {
    color: Option<(&'a wgpu::TextureView, wgpu::TextureFormat)>,
    depth: (&'a wgpu::TextureView, wgpu::TextureFormat),
}

/// Owns the GPU context and every subsystem, and executes a [`FramePlan`].
pub struct Renderer {
    context: GpuContext,
    pass_uniforms: PassUniforms,
    shadow: ShadowMap,
    terrain: Terrain,
    water: Water,
    skybox: Skybox,
    fog: Fog,
    fxaa: Fxaa,
    binder: TargetBinder,
}

impl Renderer {
    pub async fn new(
        window: Arc<Window>,
        settings: &SceneSettings,
        assets: &SceneAssets,
    ) -> Result<Self, RenderError> {
        let context = GpuContext::new(window, settings).await?;
        let device = &context.device;
        let queue = &context.queue;
        let (width, height) = (context.config.width, context.config.height);

        let scene_keys = scene_pipeline_keys(context.config.format, context.supports_wireframe);
        let fullscreen_keys = fullscreen_pipeline_keys(context.config.format);

        let pass_uniforms = PassUniforms::new(device);
        let shadow = ShadowMap::new(device, settings.shadow_map_size)?;
        let terrain = Terrain::new(
            device,
            queue,
            pass_uniforms.layout(),
            &scene_keys,
            &shadow,
            &assets.surface,
            settings.terrain,
        )?;
        let water = Water::new(
            device,
            queue,
            pass_uniforms.layout(),
            &scene_keys,
            settings.water_target_size,
            &assets.water_maps,
            settings.water,
        )?;
        let skybox = Skybox::new(device, queue, pass_uniforms.layout(), &scene_keys, &assets.sky_faces)?;
        let fog = Fog::new(device, pass_uniforms.layout(), &fullscreen_keys, width, height, settings.fog)?;
        let fxaa = Fxaa::new(device, pass_uniforms.layout(), &fullscreen_keys, width, height, settings.fxaa)?;

        log::info!("Renderer ready ({}x{}, {:?})", width, height, context.config.format);

        Ok(Self {
            context,
            pass_uniforms,
            shadow,
            terrain,
            water,
            skybox,
            fog,
            fxaa,
            binder: TargetBinder::new(),
        })
    }

    pub fn aspect(&self) -> f32 {
        self.context.aspect()
    }

    pub fn supports_wireframe(&self) -> bool {
        self.context.supports_wireframe
    }

    pub fn water_mut(&mut self) -> &mut Water {
        &mut self.water
    }

    pub fn set_terrain_surface(&mut self, surface: &SurfaceData) -> Result<(), RenderError> {
        self.terrain
            .reset_surface(&self.context.device, &self.context.queue, surface)
    }

    /// Resizes the surface, the screen depth buffer and the screen-sized
    /// targets. Zero sizes are ignored and return `Ok(false)`. A size any
    /// target rejects leaves everything at the previous size.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<bool, RenderError> {
        if width == 0 || height == 0 {
            return Ok(false);
        }
        self.fog.check_resize(&self.context.device, width, height)?;
        self.fxaa.check_resize(&self.context.device, width, height)?;
        if !self.context.resize(PhysicalSize::new(width, height)) {
            return Ok(false);
        }
        self.fog.resize(&self.context.device, width, height)?;
        self.fxaa.resize(&self.context.device, width, height)?;
        log::info!("Resized to {}x{}", width, height);
        Ok(true)
    }

    /// Records and submits every pass of `plan`. Lost or outdated surfaces
    /// are reconfigured and the frame is skipped.
    pub fn render(
        &mut self,
        plan: &FramePlan,
        light: &DirectionalLight,
        elapsed_seconds: f32,
    ) -> Result<(), RenderError> {
        self.binder.begin_frame();

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("Surface {err}; reconfiguring and skipping the frame");
                self.context.reconfigure();
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Timed out acquiring the next frame");
                return Ok(());
            }
            Err(err) => return Err(RenderError::Surface(err.to_string())),
        };
        let screen_view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.prepare(plan, light, elapsed_seconds)?;

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("FrameEncoder"),
            });

        for (index, pass) in plan.passes().iter().enumerate() {
            self.binder.bind(pass.target, pass.bind_mode());
            self.record_pass(&mut encoder, &screen_view, index, pass);
            self.binder.unbind();
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    fn prepare(
        &mut self,
        plan: &FramePlan,
        light: &DirectionalLight,
        elapsed_seconds: f32,
    ) -> Result<(), RenderError> {
        let device = &self.context.device;
        let queue = &self.context.queue;

        for (index, pass) in plan.passes().iter().enumerate() {
            let uniform = PassUniform::new(&pass.context, self.terrain.lod_base(index));
            self.pass_uniforms.write(queue, index, &uniform);
        }

        let water_enabled = plan
            .passes()
            .iter()
            .any(|pass| pass.draws.contains(&DrawItem::Water));

        self.terrain.sync_shadow(device, &self.shadow);
        self.terrain.prepare(queue, plan, light);
        self.water.sync_bindings(device)?;
        self.water.prepare(
            queue,
            water_enabled,
            elapsed_seconds,
            self.terrain.params.horizontal_scale,
            light,
        );
        self.fog.sync_bindings(device)?;
        self.fog.prepare(queue);
        self.fxaa.sync_bindings(device)?;
        self.fxaa.prepare(queue);
        Ok(())
    }

    fn target_for<'a>(&'a self, slot: TargetSlot, screen_view: &'a wgpu::TextureView) -> PassTarget<'a> {
        let offscreen = match slot {
            TargetSlot::Screen => {
                return PassTarget {
                    color: Some((screen_view, self.context.config.format)),
                    depth: (&self.context.depth.view, self.context.depth.format),
                };
            }
            TargetSlot::ShadowMap => self.shadow.target(),
            TargetSlot::WaterReflection => self.water.reflection(),
            TargetSlot::WaterRefraction => self.water.refraction(),
            TargetSlot::FogScene => self.fog.target(),
            TargetSlot::AaScene => self.fxaa.target(),
        };
        PassTarget {
            color: offscreen.color_view().zip(offscreen.color_format()),
            depth: (offscreen.depth_attachment_view(), offscreen.depth_format()),
        }
    }

    fn record_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        screen_view: &wgpu::TextureView,
        index: usize,
        pass: &PlannedPass,
    ) {
        let target = self.target_for(pass.target, screen_view);
        let uses_depth = pass.uses_depth();
        let (depth_view, depth_format) = target.depth;

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = target
            .color
            .map(|(view, _)| wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: pass.clear.color.map_or(wgpu::LoadOp::Load, |[r, g, b, a]| {
                        wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        })
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })
            .into_iter()
            .map(Some)
            .collect();

        let depth_stencil_attachment = uses_depth.then(|| wgpu::RenderPassDepthStencilAttachment {
            view: depth_view,
            depth_ops: Some(wgpu::Operations {
                load: pass.clear.depth.map_or(wgpu::LoadOp::Load, wgpu::LoadOp::Clear),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: depth_format.has_stencil_aspect().then_some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(0),
                store: wgpu::StoreOp::Discard,
            }),
        });

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(pass.phase.label()),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let flags = pass.context.flags;
        let ctx = DrawContext {
            pass_index: index,
            pass_offset: self.pass_uniforms.offset(index),
            pass_bind_group: self.pass_uniforms.bind_group(),
            key: PipelineKey {
                color: target.color.map(|(_, format)| format),
                depth: uses_depth.then_some(depth_format),
                wireframe: uses_depth && flags.wireframe && self.context.supports_wireframe,
            },
            view: &pass.context,
        };

        for draw in &pass.draws {
            match draw {
                DrawItem::Terrain => self.terrain.render(&mut rpass, &ctx),
                DrawItem::Water => self.water.render(&mut rpass, &ctx),
                DrawItem::Skybox => self.skybox.render(&mut rpass, &ctx),
                DrawItem::FogComposite => self.fog.render(&mut rpass, &ctx),
                DrawItem::Fxaa => self.fxaa.render(&mut rpass, &ctx),
            }
        }
    }
}
