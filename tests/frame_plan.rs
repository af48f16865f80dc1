//! Frame-level scenarios for the pass planner: which passes run, in which
//! order, into which targets, with which camera and clip plane.

use glam::{Vec3, Vec4};
use wgpu_terrain::renderer::{
    ClipPlane, DrawItem, FrameInputs, FramePlan, PassPhase, TargetBinder, TargetSlot, ViewState,
};
use wgpu_terrain::scene::{Camera, DirectionalLight, FeatureToggles, PostEffects};

const EPSILON: f32 = 1e-4;

fn plan(camera: &Camera, toggles: &FeatureToggles, water_level: f32) -> FramePlan {
    let light = DirectionalLight::default();
    FramePlan::build(&FrameInputs {
        camera,
        light: &light,
        toggles,
        water_level,
        aspect: 16.0 / 9.0,
        shadow_center: Vec3::ZERO,
    })
}

fn all_off() -> FeatureToggles {
    let mut toggles = FeatureToggles::default();
    toggles.use_shadow = false;
    toggles.render_water = false;
    toggles.with_effects(PostEffects::default())
}

fn everything_on() -> FeatureToggles {
    let mut toggles = FeatureToggles::default().with_effects(PostEffects {
        fog: true,
        anti_aliasing: true,
    });
    toggles.use_shadow = true;
    toggles.render_water = true;
    toggles
}

/// Walks the plan through a binder the way the executor does.
fn replay(plan: &FramePlan) -> TargetBinder {
    let mut binder = TargetBinder::new();
    binder.begin_frame();
    for pass in plan.passes() {
        binder.bind(pass.target, pass.bind_mode());
        binder.unbind();
    }
    binder
}

#[test]
fn all_features_off_draws_terrain_and_skybox_once_to_screen() {
    let camera = Camera::default();
    let plan = plan(&camera, &all_off(), 0.3);

    assert_eq!(plan.draw_count(TargetSlot::Screen, DrawItem::Terrain), 1);
    assert_eq!(plan.draw_count(TargetSlot::Screen, DrawItem::Skybox), 1);
    assert_eq!(plan.draw_count(TargetSlot::Screen, DrawItem::Water), 0);

    let binder = replay(&plan);
    assert_eq!(binder.offscreen_binds(), 0);
    assert_eq!(binder.history(), &[TargetSlot::Screen]);
    assert_eq!(binder.bound(), None);
}

#[test]
fn full_frame_runs_passes_in_dependency_order() {
    let camera = Camera::default();
    let plan = plan(&camera, &everything_on(), 0.3);

    assert_eq!(
        plan.phases(),
        vec![
            PassPhase::Shadow,
            PassPhase::WaterReflection,
            PassPhase::WaterRefraction,
            PassPhase::Scene,
            PassPhase::FogComposite,
            PassPhase::Fxaa,
        ]
    );

    let binder = replay(&plan);
    assert_eq!(binder.offscreen_binds(), 5);
    assert_eq!(binder.history().last(), Some(&TargetSlot::Screen));

    // Every target that is sampled was written by an earlier pass.
    for (index, pass) in plan.passes().iter().enumerate() {
        for slot in [
            TargetSlot::WaterReflection,
            TargetSlot::WaterRefraction,
            TargetSlot::FogScene,
            TargetSlot::AaScene,
        ] {
            let reads_slot = pass.draws.iter().any(|draw| {
                matches!(
                    (draw, slot),
                    (DrawItem::Water, TargetSlot::WaterReflection | TargetSlot::WaterRefraction)
                        | (DrawItem::FogComposite, TargetSlot::FogScene)
                        | (DrawItem::Fxaa, TargetSlot::AaScene)
                )
            });
            if reads_slot {
                assert!(plan.passes()[..index].iter().any(|earlier| earlier.target == slot));
            }
        }
    }
}

#[test]
fn reflection_pass_uses_mirrored_camera_and_leaves_main_camera_alone() {
    let camera = Camera::default();
    let before = camera;
    let mut toggles = all_off();
    toggles.render_water = true;
    let plan = plan(&camera, &toggles, 0.3);

    let reflection = plan.pass(PassPhase::WaterReflection).expect("reflection pass");
    let mirrored_y = 2.0 * 0.3 - camera.position.y;
    assert!((reflection.context.camera_position().y - mirrored_y).abs() < EPSILON);
    assert!((reflection.context.camera_position().x - camera.position.x).abs() < EPSILON);

    let mirrored = camera.mirrored_about(0.3);
    assert!((mirrored.pitch() + camera.pitch()).abs() < EPSILON);
    assert!(reflection
        .context
        .view_matrix()
        .abs_diff_eq(mirrored.view_matrix(), EPSILON));

    let refraction = plan.pass(PassPhase::WaterRefraction).expect("refraction pass");
    assert_eq!(refraction.context.camera_position(), camera.position);

    let scene = plan.pass(PassPhase::Scene).expect("scene pass");
    assert_eq!(scene.context.camera_position(), camera.position);
    assert_eq!(camera, before);
}

#[test]
fn clip_planes_depend_only_on_phase() {
    let camera = Camera::default();
    let level = 0.3;
    let plan = plan(&camera, &everything_on(), level);

    for pass in plan.passes() {
        let plane = pass.context.clip_plane_vector();
        match pass.phase {
            PassPhase::WaterReflection => {
                assert_eq!(plane, ClipPlane::reflection(level).0);
                assert_eq!(plane, Vec4::new(0.0, 1.0, 0.0, -level));
            }
            PassPhase::WaterRefraction => {
                assert_eq!(plane, ClipPlane::refraction(level).0);
                assert_eq!(plane.truncate(), Vec3::new(0.0, -1.0, 0.0));
                assert!(plane.w > level);
            }
            _ => assert_eq!(plane, ClipPlane::DISABLED),
        }
    }
}

#[test]
fn wireframe_suspends_post_effects_and_restores_them() {
    let camera = Camera::default();
    let mut toggles = everything_on();

    toggles.set_wireframe(true);
    let wire = plan(&camera, &toggles, 0.3);
    assert!(wire.pass(PassPhase::FogComposite).is_none());
    assert!(wire.pass(PassPhase::Fxaa).is_none());
    let scene = wire.pass(PassPhase::Scene).expect("scene pass");
    assert_eq!(scene.target, TargetSlot::Screen);
    assert!(scene.context.flags.wireframe);

    toggles.toggle_wireframe();
    toggles.toggle_wireframe();
    toggles.toggle_wireframe();
    let restored = plan(&camera, &toggles, 0.3);
    assert!(restored.pass(PassPhase::FogComposite).is_some());
    assert!(restored.pass(PassPhase::Fxaa).is_some());
    assert!(!toggles.is_wireframe());
}

#[test]
fn shadow_pass_is_depth_only_into_the_shadow_map() {
    let camera = Camera::default();
    let plan = plan(&camera, &everything_on(), 0.3);
    let shadow = plan.pass(PassPhase::Shadow).expect("shadow pass");

    assert_eq!(shadow.target, TargetSlot::ShadowMap);
    assert!(shadow.context.flags.depth_only);
    assert_eq!(shadow.draws, vec![DrawItem::Terrain]);
    assert_eq!(shadow.clear.color, None);

    let scene = plan.pass(PassPhase::Scene).expect("scene pass");
    assert!(scene.context.flags.use_shadow);
    assert!(plan.reads(TargetSlot::ShadowMap));
}

#[test]
#[should_panic(expected = "still bound")]
fn binding_a_second_target_without_unbinding_panics() {
    let camera = Camera::default();
    let plan = plan(&camera, &everything_on(), 0.3);
    let mut binder = TargetBinder::new();
    let mut passes = plan.passes().iter();
    let first = passes.next().expect("first pass");
    let second = passes.next().expect("second pass");
    binder.bind(first.target, first.bind_mode());
    binder.bind(second.target, second.bind_mode());
}
