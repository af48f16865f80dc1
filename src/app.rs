// app.rs
use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::*,
    event_loop::ActiveEventLoop,
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use crate::pipeline::FramePipeline;
use crate::scene::InputState;
use crate::settings::SceneSettings;
use crate::time::FrameClock;

pub struct App {
    settings: SceneSettings,
    pipeline: Option<FramePipeline>,
    window: Option<Arc<Window>>,
    input: InputState,
    cursor: (f32, f32),
    clock: FrameClock,
}

impl App {
    pub fn new(settings: SceneSettings) -> Self {
        Self {
            settings,
            pipeline: None,
            window: None,
            input: InputState::new(),
            cursor: (0.0, 0.0),
            clock: FrameClock::new(),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let resolution = &self.settings.resolution;
        let attributes = Window::default_attributes()
            .with_title("wgpu terrain")
            .with_inner_size(PhysicalSize::new(resolution.width, resolution.height));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        match pollster::block_on(FramePipeline::create(window.clone(), self.settings.clone())) {
            Ok(pipeline) => {
                self.pipeline = Some(pipeline);
                self.clock = FrameClock::new();
                window.request_redraw();
                self.window = Some(window);
            }
            Err(err) => {
                log::error!("Failed to initialize renderer: {}", err);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != id {
            return;
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                pipeline.on_resize(size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                pipeline.on_resize(size.width, size.height);
            }
            WindowEvent::Focused(false) => {
                self.input.clear();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                self.input.set_key(code, event.state);
                if event.state == ElementState::Pressed && !event.repeat && pipeline.on_key_pressed(code) {
                    event_loop.exit();
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as f32, position.y as f32);
                pipeline.on_mouse_move(self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                pipeline.on_mouse_button(button, state, self.cursor.0, self.cursor.1);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 20.0,
                };
                pipeline.on_mouse_scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.clock.tick();
                pipeline.process_input(&self.input, dt);
                pipeline.update(dt);
                if let Err(err) = pipeline.render() {
                    log::error!("Render failed: {}", err);
                    event_loop.exit();
                    return;
                }
                window.request_redraw();
            }
            _ => {}
        }
    }
}
