use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton};
use winit::keyboard::KeyCode;

use super::camera::CameraMovement;

/// Keys currently held down, sampled once per frame for continuous movement.
#[derive(Debug, Default, Clone)]
pub struct InputState {
    held: HashSet<KeyCode>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                self.held.insert(key);
            }
            ElementState::Released => {
                self.held.remove(&key);
            }
        }
    }

    pub fn is_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    /// Camera movements requested by the held keys, in a fixed order.
    pub fn movements(&self) -> impl Iterator<Item = CameraMovement> + '_ {
        MOVEMENT_KEYS
            .iter()
            .filter(|(key, _)| self.is_held(*key))
            .map(|&(_, movement)| movement)
    }
}

const MOVEMENT_KEYS: [(KeyCode, CameraMovement); 6] = [
    (KeyCode::KeyW, CameraMovement::Forward),
    (KeyCode::KeyS, CameraMovement::Backward),
    (KeyCode::KeyA, CameraMovement::Left),
    (KeyCode::KeyD, CameraMovement::Right),
    (KeyCode::KeyE, CameraMovement::Up),
    (KeyCode::KeyQ, CameraMovement::Down),
];

/// Mouse-look is only active while the right button is held. The first
/// cursor event after pressing re-anchors so the view does not jump.
#[derive(Debug, Default, Clone, Copy)]
pub struct MouseLook {
    active: bool,
    last: Option<Vec2>,
}

impl MouseLook {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn on_button(&mut self, button: MouseButton, state: ElementState, x: f32, y: f32) {
        if button != MouseButton::Right {
            return;
        }
        self.active = state == ElementState::Pressed;
        self.last = self.active.then_some(Vec2::new(x, y));
    }

    /// Returns the yaw/pitch offsets for a cursor move. Screen y grows
    /// downwards, so the pitch offset is reversed.
    pub fn on_move(&mut self, x: f32, y: f32) -> Option<Vec2> {
        let current = Vec2::new(x, y);
        if !self.active {
            self.last = None;
            return None;
        }
        let previous = self.last.replace(current)?;
        Some(Vec2::new(current.x - previous.x, previous.y - current.y))
    }
}

/// Discrete actions bound to single key presses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shortcut {
    ToggleShadow,
    ToggleWater,
    ToggleFog,
    ToggleAntiAliasing,
    ToggleWireframe,
    ToggleLighting,
    ToggleWaterNormalMap,
    ResetCamera,
    NextTerrainSurface,
    LightAzimuth(f32),
    LightElevation(f32),
    WaterLevel(f32),
    OrbitCamera(f32),
    Quit,
}

pub const LIGHT_ANGLE_STEP: f32 = 5.0;
pub const WATER_LEVEL_STEP: f32 = 0.05;
pub const ORBIT_STEP: f32 = 5.0;

impl Shortcut {
    pub fn from_key(key: KeyCode) -> Option<Self> {
        let shortcut = match key {
            KeyCode::Digit1 => Shortcut::ToggleShadow,
            KeyCode::Digit2 => Shortcut::ToggleWater,
            KeyCode::Digit3 => Shortcut::ToggleFog,
            KeyCode::Digit4 => Shortcut::ToggleAntiAliasing,
            KeyCode::Digit5 => Shortcut::ToggleWireframe,
            KeyCode::KeyL => Shortcut::ToggleLighting,
            KeyCode::KeyN => Shortcut::ToggleWaterNormalMap,
            KeyCode::KeyR => Shortcut::ResetCamera,
            KeyCode::KeyT => Shortcut::NextTerrainSurface,
            KeyCode::ArrowLeft => Shortcut::LightAzimuth(-LIGHT_ANGLE_STEP),
            KeyCode::ArrowRight => Shortcut::LightAzimuth(LIGHT_ANGLE_STEP),
            KeyCode::ArrowUp => Shortcut::LightElevation(LIGHT_ANGLE_STEP),
            KeyCode::ArrowDown => Shortcut::LightElevation(-LIGHT_ANGLE_STEP),
            KeyCode::Equal | KeyCode::NumpadAdd => Shortcut::WaterLevel(WATER_LEVEL_STEP),
            KeyCode::Minus | KeyCode::NumpadSubtract => Shortcut::WaterLevel(-WATER_LEVEL_STEP),
            KeyCode::KeyO => Shortcut::OrbitCamera(-ORBIT_STEP),
            KeyCode::KeyP => Shortcut::OrbitCamera(ORBIT_STEP),
            KeyCode::Escape => Shortcut::Quit,
            _ => return None,
        };
        Some(shortcut)
    }
}
