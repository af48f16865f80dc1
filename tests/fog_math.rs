//! Tests for the depth-to-world reconstruction and fog falloff used by the
//! fog composite pass.
//!
//! Conventions:
//! - Fullscreen UVs have origin at top-left (v = 0 at top).
//! - Depth is in [0, 1], near -> 0, far -> 1.
use glam::{Vec2, Vec3, Vec4};
use wgpu_terrain::renderer::fog::{fog_factor, reconstruct_world};
use wgpu_terrain::renderer::FogParams;
use wgpu_terrain::scene::Camera;

fn project_world_to_uv_depth(view_proj: glam::Mat4, world: Vec3) -> (Vec2, f32) {
    let clip: Vec4 = view_proj * world.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    (uv, ndc.z)
}

fn approx_eq3(a: Vec3, b: Vec3, eps: f32) -> bool {
    (a - b).abs().max_element() <= eps
}

#[test]
fn reconstruction_inverts_the_camera_projection() {
    let camera = Camera::default();
    let view_proj = camera.view_proj(16.0 / 9.0);
    let inverse = view_proj.inverse();

    let ahead = camera.position + camera.front() * 30.0;
    let points = [
        ahead,
        ahead + camera.right() * 4.0,
        ahead + camera.up() * -3.0 + camera.right() * -2.0,
        camera.position + camera.front() * 120.0,
    ];

    for &world in &points {
        let (uv, depth) = project_world_to_uv_depth(view_proj, world);
        assert!((0.0..=1.0).contains(&depth), "depth {depth} for {world:?}");
        let rebuilt = reconstruct_world(inverse, uv, depth);
        // Far points lose precision in the depth buffer encoding.
        let eps = 1e-3 * (world - camera.position).length();
        assert!(
            approx_eq3(rebuilt, world, eps),
            "world {:?} -> uv {:?}, depth {} -> {:?}",
            world,
            uv,
            depth,
            rebuilt
        );
    }
}

#[test]
fn top_left_uv_is_up_and_left_of_the_view() {
    let camera = Camera::default();
    let inverse = camera.view_proj(1.0).inverse();
    let top_left = reconstruct_world(inverse, Vec2::new(0.0, 0.0), 0.5);
    let bottom_right = reconstruct_world(inverse, Vec2::new(1.0, 1.0), 0.5);

    let offset = top_left - bottom_right;
    assert!(offset.dot(camera.up()) > 0.0);
    assert!(offset.dot(camera.right()) < 0.0);
}

#[test]
fn far_plane_pixels_are_fully_fogged() {
    let camera = Camera::default();
    let params = FogParams::default();
    let inverse = camera.view_proj(1.0).inverse();
    let sky = reconstruct_world(inverse, Vec2::splat(0.5), 1.0);
    let distance = (sky - camera.position).length();

    // The far plane is poorly conditioned in f32; only its order matters here.
    assert!(distance > camera.far * 0.5);
    assert!(fog_factor(distance, sky.y, &params) > 0.99);
}

#[test]
fn fog_is_monotonic_in_distance() {
    let params = FogParams::default();
    let mut previous = fog_factor(0.0, 0.0, &params);
    assert_eq!(previous, 0.0);
    for step in 1..=50 {
        let amount = fog_factor(step as f32 * 10.0, 0.0, &params);
        assert!(amount >= previous);
        assert!(amount <= 1.0);
        previous = amount;
    }
}

#[test]
fn layered_fog_matches_plain_fog_below_the_layer() {
    let plain = FogParams::default();
    let layered = FogParams {
        layered: true,
        ..plain
    };
    let below = layered.fog_height - 1.0;
    assert_eq!(fog_factor(80.0, below, &layered), fog_factor(80.0, below, &plain));

    let above = layered.fog_height + 10.0;
    let expected = fog_factor(80.0, 0.0, &plain) * (-10.0 * layered.height_falloff).exp();
    assert!((fog_factor(80.0, above, &layered) - expected).abs() < 1e-6);
}

#[test]
fn zero_density_disables_fog() {
    let params = FogParams {
        density: 0.0,
        ..FogParams::default()
    };
    assert_eq!(fog_factor(1000.0, 0.0, &params), 0.0);
}
