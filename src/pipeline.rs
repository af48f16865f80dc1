//! Frame orchestration: input and scene state on one side, the
//! [`Renderer`] executing a freshly built [`FramePlan`] on the other.

use std::sync::Arc;

use glam::Vec3;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;
use winit::window::Window;

use crate::assets::{self, SceneAssets};
use crate::error::RenderError;
use crate::renderer::{FrameInputs, FramePlan, Renderer};
use crate::scene::{Camera, DirectionalLight, FeatureToggles, InputState, MouseLook, Shortcut};
use crate::settings::SceneSettings;

/// What the caller has to do after a shortcut was applied to the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShortcutOutcome {
    Handled,
    LoadSurface(usize),
    Quit,
}

/// Everything a frame plan is built from. Holds no GPU resources.
#[derive(Clone, Debug)]
pub struct SceneState {
    pub camera: Camera,
    pub light: DirectionalLight,
    pub toggles: FeatureToggles,
    pub water_level: f32,
    pub water_normal_map: bool,
    pub elapsed_seconds: f32,
    /// Point the shadow frustum is centred on: the terrain's base plane
    /// under the world origin.
    pub shadow_center: Vec3,
    mouse: MouseLook,
    surface_index: usize,
    surface_count: usize,
}

impl SceneState {
    pub fn new(settings: &SceneSettings) -> Self {
        let mut light = DirectionalLight::new(settings.light.azimuth, settings.light.elevation);
        light.color = Vec3::from_array(settings.light.color);
        Self {
            camera: Camera::default(),
            light,
            toggles: settings.toggles.to_toggles(),
            water_level: settings.water.water_level,
            water_normal_map: settings.water.use_normal_map,
            elapsed_seconds: 0.0,
            shadow_center: Vec3::new(0.0, settings.terrain.height_offset, 0.0),
            mouse: MouseLook::default(),
            surface_index: 0,
            surface_count: settings.surfaces.len().max(1),
        }
    }

    pub fn surface_index(&self) -> usize {
        self.surface_index
    }

    pub fn process_input(&mut self, input: &InputState, delta_time: f32) {
        for movement in input.movements() {
            self.camera.process_keyboard(movement, delta_time);
        }
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState, x: f32, y: f32) {
        self.mouse.on_button(button, state, x, y);
    }

    pub fn on_mouse_move(&mut self, x: f32, y: f32) {
        if let Some(offset) = self.mouse.on_move(x, y) {
            self.camera.process_mouse_movement(offset.x, offset.y, true);
        }
    }

    pub fn on_mouse_scroll(&mut self, delta: f32) {
        self.camera.process_mouse_scroll(delta);
    }

    pub fn update(&mut self, delta_time: f32) {
        self.elapsed_seconds += delta_time.max(0.0);
    }

    pub fn apply_shortcut(&mut self, shortcut: Shortcut) -> ShortcutOutcome {
        match shortcut {
            Shortcut::ToggleShadow => self.toggles.use_shadow = !self.toggles.use_shadow,
            Shortcut::ToggleWater => self.toggles.render_water = !self.toggles.render_water,
            Shortcut::ToggleFog => self.toggles.toggle_fog(),
            Shortcut::ToggleAntiAliasing => self.toggles.toggle_anti_aliasing(),
            Shortcut::ToggleWireframe => self.toggles.toggle_wireframe(),
            Shortcut::ToggleLighting => self.toggles.use_lighting = !self.toggles.use_lighting,
            Shortcut::ToggleWaterNormalMap => self.water_normal_map = !self.water_normal_map,
            Shortcut::ResetCamera => self.camera.reset(),
            Shortcut::NextTerrainSurface => {
                self.surface_index = (self.surface_index + 1) % self.surface_count;
                return ShortcutOutcome::LoadSurface(self.surface_index);
            }
            Shortcut::LightAzimuth(step) => self.light.set_azimuth(self.light.azimuth() + step),
            Shortcut::LightElevation(step) => self.light.set_elevation(self.light.elevation() + step),
            Shortcut::WaterLevel(step) => self.water_level += step,
            Shortcut::OrbitCamera(step) => self.camera.rotate_about_origin(step),
            Shortcut::Quit => return ShortcutOutcome::Quit,
        }
        log::info!("{:?}: {:?}", shortcut, self.toggles);
        ShortcutOutcome::Handled
    }

    pub fn plan(&self, aspect: f32) -> FramePlan {
        FramePlan::build(&FrameInputs {
            camera: &self.camera,
            light: &self.light,
            toggles: &self.toggles,
            water_level: self.water_level,
            aspect,
            shadow_center: self.shadow_center,
        })
    }
}

/// Scene state plus the GPU renderer; the entry point the window loop
/// drives every frame.
pub struct FramePipeline {
    settings: SceneSettings,
    state: SceneState,
    renderer: Renderer,
}

impl FramePipeline {
    pub async fn create(window: Arc<Window>, settings: SceneSettings) -> Result<Self, RenderError> {
        let assets = SceneAssets::load(&settings)?;
        let renderer = Renderer::new(window, &settings, &assets).await?;
        let state = SceneState::new(&settings);
        if !renderer.supports_wireframe() && state.toggles.is_wireframe() {
            log::warn!("Wireframe requested but not supported; drawing filled triangles");
        }
        Ok(Self {
            settings,
            state,
            renderer,
        })
    }

    pub fn process_input(&mut self, input: &InputState, delta_time: f32) {
        self.state.process_input(input, delta_time);
    }

    pub fn on_mouse_move(&mut self, x: f32, y: f32) {
        self.state.on_mouse_move(x, y);
    }

    pub fn on_mouse_button(&mut self, button: MouseButton, state: ElementState, x: f32, y: f32) {
        self.state.on_mouse_button(button, state, x, y);
    }

    pub fn on_mouse_scroll(&mut self, delta: f32) {
        self.state.on_mouse_scroll(delta);
    }

    /// Returns `true` when the key asks the application to quit.
    pub fn on_key_pressed(&mut self, key: KeyCode) -> bool {
        let Some(shortcut) = Shortcut::from_key(key) else {
            return false;
        };
        if shortcut == Shortcut::ToggleWireframe && !self.renderer.supports_wireframe() {
            log::warn!("Line rasterization unavailable; wireframe only suspends fog and anti-aliasing");
        }
        match self.state.apply_shortcut(shortcut) {
            ShortcutOutcome::Handled => false,
            ShortcutOutcome::Quit => true,
            ShortcutOutcome::LoadSurface(index) => {
                let loaded = assets::load_surface(&self.settings, index)
                    .and_then(|surface| self.renderer.set_terrain_surface(&surface));
                if let Err(err) = loaded {
                    log::warn!("Keeping current terrain surface: {}", err);
                }
                false
            }
        }
    }

    pub fn on_resize(&mut self, width: u32, height: u32) {
        if let Err(err) = self.renderer.resize(width, height) {
            log::warn!("Resize to {}x{} failed: {}", width, height, err);
        }
    }

    pub fn update(&mut self, delta_time: f32) {
        self.state.update(delta_time);
    }

    pub fn render(&mut self) -> Result<(), RenderError> {
        let water = &mut self.renderer.water_mut().params;
        water.water_level = self.state.water_level;
        water.use_normal_map = self.state.water_normal_map;

        let plan = self.state.plan(self.renderer.aspect());
        self.renderer
            .render(&plan, &self.state.light, self.state.elapsed_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{DrawItem, PassPhase, TargetSlot};
    use crate::scene::PostEffects;

    fn state() -> SceneState {
        SceneState::new(&SceneSettings::default())
    }

    #[test]
    fn feature_shortcuts_flip_toggles() {
        let mut state = state();
        let shadow = state.toggles.use_shadow;
        assert_eq!(state.apply_shortcut(Shortcut::ToggleShadow), ShortcutOutcome::Handled);
        assert_eq!(state.toggles.use_shadow, !shadow);

        let fog = state.toggles.render_fog();
        state.apply_shortcut(Shortcut::ToggleFog);
        assert_eq!(state.toggles.render_fog(), !fog);
    }

    #[test]
    fn surface_shortcut_cycles_through_configured_surfaces() {
        let mut state = state();
        let count = SceneSettings::default().surfaces.len();
        let mut seen = Vec::new();
        for _ in 0..count {
            match state.apply_shortcut(Shortcut::NextTerrainSurface) {
                ShortcutOutcome::LoadSurface(index) => seen.push(index),
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        assert_eq!(seen.last(), Some(&0));
        assert_eq!(state.surface_index(), 0);
    }

    #[test]
    fn light_and_water_shortcuts_step_values() {
        let mut state = state();
        let azimuth = state.light.azimuth();
        state.apply_shortcut(Shortcut::LightAzimuth(5.0));
        assert!((state.light.azimuth() - (azimuth + 5.0)).abs() < 1e-4);

        let level = state.water_level;
        state.apply_shortcut(Shortcut::WaterLevel(-0.05));
        assert!((state.water_level - (level - 0.05)).abs() < 1e-6);
        assert_eq!(state.apply_shortcut(Shortcut::Quit), ShortcutOutcome::Quit);
    }

    #[test]
    fn mouse_look_turns_camera_only_while_dragging() {
        let mut state = state();
        let yaw = state.camera.yaw();
        state.on_mouse_move(50.0, 50.0);
        assert_eq!(state.camera.yaw(), yaw);

        state.on_mouse_button(MouseButton::Right, ElementState::Pressed, 50.0, 50.0);
        state.on_mouse_move(60.0, 50.0);
        assert!(state.camera.yaw() > yaw);
    }

    #[test]
    fn plan_follows_water_level_changes() {
        let mut state = state();
        state.toggles = state.toggles.with_effects(PostEffects {
            fog: false,
            anti_aliasing: true,
        });
        state.toggles.render_water = true;
        state.apply_shortcut(Shortcut::WaterLevel(1.0));
        let plan = state.plan(1.5);
        let reflection = plan.pass(PassPhase::WaterReflection).expect("reflection pass");
        let expected = 2.0 * state.water_level - state.camera.position.y;
        assert!((reflection.context.camera_position.y - expected).abs() < 1e-4);
        assert_eq!(plan.draw_count(TargetSlot::Screen, DrawItem::Water), 0);
        assert_eq!(plan.draw_count(TargetSlot::AaScene, DrawItem::Water), 1);
    }

    #[test]
    fn shadow_frustum_is_centred_on_the_terrain_base() {
        let mut settings = SceneSettings::default();
        settings.terrain.height_offset = -6.0;
        let state = SceneState::new(&settings);
        assert_eq!(state.shadow_center, Vec3::new(0.0, -6.0, 0.0));

        let plan = state.plan(1.5);
        let shadow = plan.pass(PassPhase::Shadow).expect("shadow pass");
        let expected = state.light.light_space_matrix(Vec3::new(0.0, -6.0, 0.0));
        assert!(shadow.context.light_space.abs_diff_eq(expected, 1e-5));
        assert!(!shadow
            .context
            .light_space
            .abs_diff_eq(state.light.light_space_matrix(Vec3::ZERO), 1e-5));
    }

    #[test]
    fn orbit_shortcut_swings_the_camera_around_the_vertical_axis() {
        let mut state = state();
        let before = state.camera.position;
        let yaw = state.camera.yaw();
        state.apply_shortcut(Shortcut::OrbitCamera(10.0));
        assert!((state.camera.yaw() - (yaw + 10.0)).abs() < 1e-4);
        assert!((state.camera.position.y - before.y).abs() < 1e-4);
        let horizontal = |p: Vec3| (p.x * p.x + p.z * p.z).sqrt();
        assert!((horizontal(state.camera.position) - horizontal(before)).abs() < 1e-3);
    }

    #[test]
    fn held_keys_move_the_camera() {
        let mut state = state();
        let mut input = InputState::new();
        input.set_key(KeyCode::KeyW, ElementState::Pressed);
        let before = state.camera.position;
        state.process_input(&input, 0.5);
        assert!((state.camera.position - before).length() > 0.0);
    }
}
