//! CPU mirror of the shadow lookup in `terrain.wgsl`.
//!
//! The light-space matrix maps world positions to clip space with depth in
//! [0, 1]; the shader flips Y when turning NDC into texture coordinates.
use glam::{Mat4, Vec2, Vec3};
use wgpu_terrain::renderer::TerrainParams;
use wgpu_terrain::scene::DirectionalLight;

const EPSILON: f32 = 1e-4;

fn shadow_uv_depth(light_space: Mat4, world: Vec3) -> (Vec2, f32) {
    let clip = light_space * world.extend(1.0);
    let ndc = clip.truncate() / clip.w;
    let uv = Vec2::new(ndc.x * 0.5 + 0.5, ndc.y * -0.5 + 0.5);
    (uv, ndc.z)
}

fn inside_map(uv: Vec2, depth: f32) -> bool {
    uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all() && (0.0..=1.0).contains(&depth)
}

fn terrain_extent(params: &TerrainParams) -> Vec<Vec3> {
    let half = params.horizontal_scale * 0.5;
    let mut points = Vec::new();
    for &x in &[-half, 0.0, half] {
        for &z in &[-half, 0.0, half] {
            for &y in &[params.height_offset, params.height_offset + params.height_scale] {
                points.push(Vec3::new(x, y, z));
            }
        }
    }
    points
}

#[test]
fn terrain_fits_inside_the_shadow_map_for_any_sun_position() {
    let params = TerrainParams::default();
    for azimuth in (0..360).step_by(45) {
        for elevation in [10.0, 30.0, 60.0, 89.0] {
            let light = DirectionalLight::new(azimuth as f32, elevation);
            let light_space = light.light_space_matrix(Vec3::ZERO);
            for point in terrain_extent(&params) {
                let (uv, depth) = shadow_uv_depth(light_space, point);
                assert!(
                    inside_map(uv, depth),
                    "azimuth {azimuth}, elevation {elevation}: {point:?} -> uv {uv:?}, depth {depth}"
                );
            }
        }
    }
}

#[test]
fn center_projects_to_middle_of_the_map() {
    let light = DirectionalLight::default();
    let (uv, _) = shadow_uv_depth(light.light_space_matrix(Vec3::ZERO), Vec3::ZERO);
    assert!((uv - Vec2::splat(0.5)).abs().max_element() < EPSILON);
}

#[test]
fn occluder_between_light_and_receiver_is_closer() {
    let light = DirectionalLight::default();
    let light_space = light.light_space_matrix(Vec3::ZERO);

    let receiver = Vec3::new(5.0, 0.0, -3.0);
    let occluder = receiver - light.direction() * 10.0;

    let (receiver_uv, receiver_depth) = shadow_uv_depth(light_space, receiver);
    let (occluder_uv, occluder_depth) = shadow_uv_depth(light_space, occluder);

    // Both land on the same shadow texel.
    assert!((receiver_uv - occluder_uv).abs().max_element() < EPSILON);
    assert!(occluder_depth < receiver_depth);
}

#[test]
fn moving_the_center_moves_the_projection() {
    let light = DirectionalLight::default();
    let center = Vec3::new(20.0, 0.0, -10.0);
    let (uv, _) = shadow_uv_depth(light.light_space_matrix(center), center);
    assert!((uv - Vec2::splat(0.5)).abs().max_element() < EPSILON);

    let (origin_uv, _) = shadow_uv_depth(light.light_space_matrix(center), Vec3::ZERO);
    assert!((origin_uv - Vec2::splat(0.5)).length() > 0.01);
}
