// scene/mod.rs

pub mod camera;
pub mod input;
pub mod light;
pub mod toggles;

pub use camera::{Camera, CameraMovement};
pub use input::{InputState, MouseLook, Shortcut};
pub use light::{DirectionalLight, ShadowFrustum};
pub use toggles::{FeatureToggles, PostEffects, RenderMode};
