//! Per-frame pass ordering.
//!
//! [`FramePlan::build`] turns the scene state into an ordered list of
//! passes without touching the GPU. The executor in `renderer.rs` walks the
//! plan; tests inspect it directly.

use glam::Vec3;

use crate::renderer::binding::{BindMode, TargetSlot};
use crate::renderer::pass::{ClipPlane, PassContext, PassFlags, PassPhase};
use crate::scene::{Camera, DirectionalLight, FeatureToggles};

/// Upper bound on passes in one frame: shadow, two water passes, the fog
/// scene, the fog composite into the AA scene and the final resolve.
pub const MAX_PASSES_PER_FRAME: usize = 6;

pub const CLEAR_COLOR: [f32; 4] = [0.5, 0.6, 0.7, 1.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawItem {
    Terrain,
    Water,
    Skybox,
    FogComposite,
    Fxaa,
}

impl DrawItem {
    pub fn needs_depth(self) -> bool {
        matches!(self, DrawItem::Terrain | DrawItem::Water | DrawItem::Skybox)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearOps {
    pub color: Option<[f32; 4]>,
    pub depth: Option<f32>,
}

impl ClearOps {
    fn color_and_depth() -> Self {
        Self {
            color: Some(CLEAR_COLOR),
            depth: Some(1.0),
        }
    }

    fn depth_only() -> Self {
        Self {
            color: None,
            depth: Some(1.0),
        }
    }

    fn color_only() -> Self {
        Self {
            color: Some(CLEAR_COLOR),
            depth: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPass {
    pub phase: PassPhase,
    pub target: TargetSlot,
    pub clear: ClearOps,
    pub context: PassContext,
    pub draws: Vec<DrawItem>,
}

impl PlannedPass {
    pub fn uses_depth(&self) -> bool {
        self.draws.iter().any(|draw| draw.needs_depth())
    }

    /// Depth-tested passes also read the attachment they write.
    pub fn bind_mode(&self) -> BindMode {
        if self.uses_depth() {
            BindMode::DRAW | BindMode::READ
        } else {
            BindMode::DRAW
        }
    }
}

/// Scene state the planner reads. Nothing in here is modified.
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs<'a> {
    pub camera: &'a Camera,
    pub light: &'a DirectionalLight,
    pub toggles: &'a FeatureToggles,
    pub water_level: f32,
    pub aspect: f32,
    pub shadow_center: Vec3,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FramePlan {
    passes: Vec<PlannedPass>,
}

impl FramePlan {
    pub fn build(inputs: &FrameInputs<'_>) -> Self {
        let toggles = inputs.toggles;
        let camera = inputs.camera;
        let light_space = inputs.light.light_space_matrix(inputs.shadow_center);

        let base_flags = PassFlags {
            depth_only: false,
            wireframe: toggles.is_wireframe(),
            use_shadow: toggles.use_shadow,
            use_lighting: toggles.use_lighting,
            show_ground: toggles.show_ground,
        };
        let camera_context = |camera: &Camera, clip_plane: Option<ClipPlane>, flags: PassFlags| {
            PassContext {
                view: camera.view_matrix(),
                proj: camera.projection_matrix(inputs.aspect),
                clip_plane,
                light_space,
                camera_position: camera.position,
                lod_eye: camera.position,
                flags,
            }
        };
        let main = camera_context(camera, None, base_flags);

        let mut passes = Vec::with_capacity(MAX_PASSES_PER_FRAME);

        if toggles.use_shadow {
            passes.push(PlannedPass {
                phase: PassPhase::Shadow,
                target: TargetSlot::ShadowMap,
                clear: ClearOps::depth_only(),
                context: PassContext {
                    view: light_space,
                    proj: glam::Mat4::IDENTITY,
                    clip_plane: None,
                    light_space,
                    camera_position: camera.position,
                    lod_eye: camera.position,
                    flags: PassFlags {
                        depth_only: true,
                        wireframe: false,
                        use_shadow: false,
                        ..base_flags
                    },
                },
                draws: vec![DrawItem::Terrain],
            });
        }

        if toggles.render_water {
            let water_flags = PassFlags {
                show_ground: toggles.show_ground && !toggles.hide_ground_in_water_passes,
                ..base_flags
            };
            let mirrored = camera.mirrored_about(inputs.water_level);
            passes.push(PlannedPass {
                phase: PassPhase::WaterReflection,
                target: TargetSlot::WaterReflection,
                clear: ClearOps::color_and_depth(),
                context: camera_context(
                    &mirrored,
                    Some(ClipPlane::reflection(inputs.water_level)),
                    water_flags,
                ),
                draws: vec![DrawItem::Terrain, DrawItem::Skybox],
            });
            passes.push(PlannedPass {
                phase: PassPhase::WaterRefraction,
                target: TargetSlot::WaterRefraction,
                clear: ClearOps::color_and_depth(),
                context: camera_context(
                    camera,
                    Some(ClipPlane::refraction(inputs.water_level)),
                    water_flags,
                ),
                draws: vec![DrawItem::Terrain, DrawItem::Skybox],
            });
        }

        let mut scene_draws = vec![DrawItem::Terrain];
        if toggles.render_water {
            scene_draws.push(DrawItem::Water);
        }
        scene_draws.push(DrawItem::Skybox);

        let scene_pass = |target: TargetSlot, draws: Vec<DrawItem>| PlannedPass {
            phase: PassPhase::Scene,
            target,
            clear: ClearOps::color_and_depth(),
            context: main,
            draws,
        };
        let fog_pass = |target: TargetSlot| PlannedPass {
            phase: PassPhase::FogComposite,
            target,
            clear: ClearOps::color_only(),
            context: main,
            draws: vec![DrawItem::FogComposite],
        };
        let fxaa_pass = PlannedPass {
            phase: PassPhase::Fxaa,
            target: TargetSlot::Screen,
            clear: ClearOps::color_only(),
            context: main,
            draws: vec![DrawItem::Fxaa],
        };

        match (toggles.render_fog(), toggles.use_anti_aliasing()) {
            (true, false) => {
                passes.push(scene_pass(TargetSlot::FogScene, scene_draws));
                passes.push(fog_pass(TargetSlot::Screen));
            }
            (false, true) => {
                passes.push(scene_pass(TargetSlot::AaScene, scene_draws));
                passes.push(fxaa_pass);
            }
            (true, true) => {
                passes.push(scene_pass(TargetSlot::FogScene, scene_draws));
                passes.push(fog_pass(TargetSlot::AaScene));
                passes.push(fxaa_pass);
            }
            (false, false) => {
                passes.push(scene_pass(TargetSlot::Screen, scene_draws));
            }
        }

        debug_assert!(passes.len() <= MAX_PASSES_PER_FRAME);
        Self { passes }
    }

    pub fn passes(&self) -> &[PlannedPass] {
        &self.passes
    }

    pub fn pass(&self, phase: PassPhase) -> Option<&PlannedPass> {
        self.passes.iter().find(|pass| pass.phase == phase)
    }

    pub fn phases(&self) -> Vec<PassPhase> {
        self.passes.iter().map(|pass| pass.phase).collect()
    }

    /// Number of `item` draws issued into `target` over the whole frame.
    pub fn draw_count(&self, target: TargetSlot, item: DrawItem) -> usize {
        self.passes
            .iter()
            .filter(|pass| pass.target == target)
            .flat_map(|pass| pass.draws.iter())
            .filter(|&&draw| draw == item)
            .count()
    }

    pub fn offscreen_pass_count(&self) -> usize {
        self.passes
            .iter()
            .filter(|pass| pass.target.is_offscreen())
            .count()
    }

    /// Whether any pass samples the given slot after it was written.
    pub fn reads(&self, slot: TargetSlot) -> bool {
        self.passes.iter().any(|pass| {
            pass.draws.iter().any(|&draw| match draw {
                DrawItem::Water => matches!(
                    slot,
                    TargetSlot::WaterReflection | TargetSlot::WaterRefraction
                ),
                DrawItem::FogComposite => slot == TargetSlot::FogScene,
                DrawItem::Fxaa => slot == TargetSlot::AaScene,
                DrawItem::Terrain => {
                    slot == TargetSlot::ShadowMap && pass.context.flags.use_shadow
                }
                DrawItem::Skybox => false,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::PostEffects;

    fn plan_with(toggles: FeatureToggles) -> FramePlan {
        let camera = Camera::default();
        let light = DirectionalLight::default();
        FramePlan::build(&FrameInputs {
            camera: &camera,
            light: &light,
            toggles: &toggles,
            water_level: 0.3,
            aspect: 16.0 / 9.0,
            shadow_center: Vec3::ZERO,
        })
    }

    #[test]
    fn all_features_off_draws_straight_to_screen() {
        let plan = plan_with(FeatureToggles::default());
        assert_eq!(plan.phases(), vec![PassPhase::Scene]);
        assert_eq!(plan.offscreen_pass_count(), 0);
        assert_eq!(plan.passes()[0].draws, vec![DrawItem::Terrain, DrawItem::Skybox]);
    }

    #[test]
    fn fog_and_aa_chain_through_both_targets() {
        let toggles = FeatureToggles::default().with_effects(PostEffects {
            fog: true,
            anti_aliasing: true,
        });
        let plan = plan_with(toggles);
        let targets: Vec<_> = plan.passes().iter().map(|p| p.target).collect();
        assert_eq!(
            targets,
            vec![TargetSlot::FogScene, TargetSlot::AaScene, TargetSlot::Screen]
        );
        assert!(plan.reads(TargetSlot::FogScene));
        assert!(plan.reads(TargetSlot::AaScene));
    }

    #[test]
    fn fullscreen_passes_have_no_depth() {
        let toggles = FeatureToggles::default().with_effects(PostEffects {
            fog: true,
            anti_aliasing: true,
        });
        let plan = plan_with(toggles);
        assert!(plan.pass(PassPhase::Scene).is_some_and(|p| p.uses_depth()));
        assert!(plan.pass(PassPhase::FogComposite).is_some_and(|p| !p.uses_depth()));
        assert!(plan.pass(PassPhase::Fxaa).is_some_and(|p| !p.uses_depth()));
    }

    #[test]
    fn shadow_pass_uses_main_camera_for_lod() {
        let mut toggles = FeatureToggles::default();
        toggles.use_shadow = true;
        let plan = plan_with(toggles);
        let shadow = plan.pass(PassPhase::Shadow).expect("shadow pass");
        assert_eq!(shadow.target, TargetSlot::ShadowMap);
        assert!(shadow.context.flags.depth_only);
        assert_eq!(shadow.context.lod_eye, Camera::default().position);
        assert!(plan.reads(TargetSlot::ShadowMap));
    }
}
