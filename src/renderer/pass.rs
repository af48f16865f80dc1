use glam::{Mat4, Vec3, Vec4};

use crate::renderer::pipeline_builder::PipelineKey;

/// Offset added to the refraction plane so the terrain right at the
/// waterline is not cut away.
pub const REFRACTION_CLIP_BIAS: f32 = 0.1;

/// Half-space kept by a pass: points with `dot(normal, p) + distance >= 0`
/// survive, everything else is discarded in the fragment stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipPlane(pub Vec4);

impl ClipPlane {
    /// Encoding used when no clipping is active; every point passes.
    pub const DISABLED: Vec4 = Vec4::new(0.0, 0.0, 0.0, 1.0);

    /// Keeps geometry above the water surface.
    pub fn reflection(water_level: f32) -> Self {
        Self(Vec4::new(0.0, 1.0, 0.0, -water_level))
    }

    /// Keeps geometry below the water surface.
    pub fn refraction(water_level: f32) -> Self {
        Self(Vec4::new(0.0, -1.0, 0.0, water_level + REFRACTION_CLIP_BIAS))
    }

    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.0.truncate().dot(point) + self.0.w
    }

    pub fn keeps(&self, point: Vec3) -> bool {
        self.signed_distance(point) >= 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassPhase {
    Shadow,
    WaterReflection,
    WaterRefraction,
    Scene,
    FogComposite,
    Fxaa,
}

impl PassPhase {
    pub fn label(self) -> &'static str {
        match self {
            PassPhase::Shadow => "ShadowPass",
            PassPhase::WaterReflection => "WaterReflectionPass",
            PassPhase::WaterRefraction => "WaterRefractionPass",
            PassPhase::Scene => "ScenePass",
            PassPhase::FogComposite => "FogCompositePass",
            PassPhase::Fxaa => "FxaaPass",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassFlags {
    pub depth_only: bool,
    pub wireframe: bool,
    pub use_shadow: bool,
    pub use_lighting: bool,
    pub show_ground: bool,
}

/// Read-only view of the transforms a subsystem needs while drawing.
pub trait ViewState {
    fn view_matrix(&self) -> Mat4;
    fn projection_matrix(&self) -> Mat4;
    fn active_clip_plane(&self) -> Option<ClipPlane>;
    fn light_space_matrix(&self) -> Mat4;
    fn camera_position(&self) -> Vec3;

    fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    fn clip_plane_vector(&self) -> Vec4 {
        self.active_clip_plane()
            .map_or(ClipPlane::DISABLED, |plane| plane.0)
    }
}

/// Everything one pass draws with. Built fresh for every pass, so clip
/// planes and mirrored cameras never outlive the pass they belong to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassContext {
    pub view: Mat4,
    pub proj: Mat4,
    pub clip_plane: Option<ClipPlane>,
    pub light_space: Mat4,
    pub camera_position: Vec3,
    /// Eye used for terrain level-of-detail; the main camera in the shadow
    /// pass so the shadow caster matches the visible surface.
    pub lod_eye: Vec3,
    pub flags: PassFlags,
}

impl ViewState for PassContext {
    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn projection_matrix(&self) -> Mat4 {
        self.proj
    }

    fn active_clip_plane(&self) -> Option<ClipPlane> {
        self.clip_plane
    }

    fn light_space_matrix(&self) -> Mat4 {
        self.light_space
    }

    fn camera_position(&self) -> Vec3 {
        self.camera_position
    }
}

/// GPU-side handles for one draw inside an open render pass.
pub struct DrawContext<'a> {
    pub pass_index: usize,
    pub pass_offset: u32,
    pub pass_bind_group: &'a wgpu::BindGroup,
    pub key: PipelineKey,
    pub view: &'a PassContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn water_planes_have_fixed_values() {
        let level = 0.3;
        assert_eq!(
            ClipPlane::reflection(level).0,
            Vec4::new(0.0, 1.0, 0.0, -0.3)
        );
        let refraction = ClipPlane::refraction(level).0;
        assert_eq!(refraction.truncate(), Vec3::new(0.0, -1.0, 0.0));
        assert!((refraction.w - (0.3 + REFRACTION_CLIP_BIAS)).abs() < 1e-6);
    }

    #[test]
    fn planes_keep_the_expected_half_space() {
        let reflection = ClipPlane::reflection(2.0);
        assert!(reflection.keeps(Vec3::new(0.0, 2.5, 0.0)));
        assert!(!reflection.keeps(Vec3::new(0.0, 1.5, 0.0)));

        let refraction = ClipPlane::refraction(2.0);
        assert!(refraction.keeps(Vec3::new(0.0, 1.5, 0.0)));
        assert!(refraction.keeps(Vec3::new(0.0, 2.05, 0.0)));
        assert!(!refraction.keeps(Vec3::new(0.0, 2.5, 0.0)));
    }

    #[test]
    fn disabled_plane_keeps_everything() {
        let ctx = PassContext {
            view: Mat4::IDENTITY,
            proj: Mat4::IDENTITY,
            clip_plane: None,
            light_space: Mat4::IDENTITY,
            camera_position: Vec3::ZERO,
            lod_eye: Vec3::ZERO,
            flags: PassFlags::default(),
        };
        let plane = ClipPlane(ctx.clip_plane_vector());
        assert!(plane.keeps(Vec3::new(0.0, -1.0e6, 0.0)));
    }
}
