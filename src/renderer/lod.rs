use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Distance-based subdivision policy for terrain patches.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodSettings {
    pub min_level: f32,
    pub max_level: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            min_level: 4.0,
            max_level: 32.0,
            min_distance: 10.0,
            max_distance: 150.0,
        }
    }
}

impl LodSettings {
    /// `max_level` up to `min_distance`, `min_level` from `max_distance`,
    /// linear and non-increasing in between.
    pub fn level(&self, distance: f32) -> f32 {
        let span = self.max_distance - self.min_distance;
        let t = if span <= f32::EPSILON {
            if distance <= self.min_distance {
                0.0
            } else {
                1.0
            }
        } else {
            ((distance - self.min_distance) / span).clamp(0.0, 1.0)
        };
        self.max_level + (self.min_level - self.max_level) * t
    }

    pub fn sanitized(mut self) -> Self {
        self.min_level = self.min_level.max(1.0);
        self.max_level = self.max_level.max(self.min_level);
        self.min_distance = self.min_distance.max(0.0);
        self.max_distance = self.max_distance.max(self.min_distance);
        self
    }
}

/// Subdivision of one patch, laid out for the terrain storage buffer.
///
/// Edges follow the patch corner order `c00 -> c10 -> c11 -> c01`: edge 0
/// runs along v = 0, edge 1 along u = 1, edge 2 along v = 1, edge 3 along
/// u = 0. `inner` is never smaller than any edge.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct PatchLod {
    pub edges: [u32; 4],
    pub inner: u32,
    pub _pad: [u32; 3],
}

impl PatchLod {
    pub fn uniform(level: u32) -> Self {
        let level = level.max(1);
        Self {
            edges: [level; 4],
            inner: level,
            _pad: [0; 3],
        }
    }

    pub fn vertex_count(&self) -> u32 {
        self.inner * self.inner * 6
    }
}

/// Corners in `c00, c10, c11, c01` order, world space.
pub fn patch_lod(corners: [Vec3; 4], eye: Vec3, settings: &LodSettings) -> PatchLod {
    let corner_levels = corners.map(|corner| settings.level(corner.distance(eye)));
    let edge = |a: usize, b: usize| corner_levels[a].max(corner_levels[b]).ceil().max(1.0) as u32;
    let edges = [edge(0, 1), edge(1, 2), edge(2, 3), edge(3, 0)];
    let inner = edges.iter().copied().max().unwrap_or(1);
    PatchLod {
        edges,
        inner,
        _pad: [0; 3],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> LodSettings {
        LodSettings {
            min_level: 2.0,
            max_level: 16.0,
            min_distance: 10.0,
            max_distance: 110.0,
        }
    }

    #[test]
    fn level_is_exact_at_the_ends() {
        let s = settings();
        assert_eq!(s.level(0.0), 16.0);
        assert_eq!(s.level(10.0), 16.0);
        assert_eq!(s.level(110.0), 2.0);
        assert_eq!(s.level(1.0e6), 2.0);
        assert!((s.level(60.0) - 9.0).abs() < 1e-5);
    }

    #[test]
    fn level_is_non_increasing_with_distance() {
        let s = settings();
        let mut previous = f32::INFINITY;
        for step in 0..500 {
            let level = s.level(step as f32 * 0.5);
            assert!(level <= previous);
            assert!((s.min_level..=s.max_level).contains(&level));
            previous = level;
        }
    }

    #[test]
    fn degenerate_distance_range_is_a_step() {
        let s = LodSettings {
            min_distance: 50.0,
            max_distance: 50.0,
            ..settings()
        };
        assert_eq!(s.level(49.0), 16.0);
        assert_eq!(s.level(51.0), 2.0);
    }

    #[test]
    fn shared_edges_agree_between_neighbours() {
        let s = settings();
        let eye = Vec3::new(3.0, 20.0, -7.0);
        let left = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(0.0, 0.0, 10.0),
        ];
        let right = [
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
        ];
        let a = patch_lod(left, eye, &s);
        let b = patch_lod(right, eye, &s);
        assert_eq!(a.edges[1], b.edges[3]);
    }

    #[test]
    fn inner_level_covers_every_edge() {
        let s = settings();
        let corners = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 0.0),
            Vec3::new(100.0, 0.0, 100.0),
            Vec3::new(0.0, 0.0, 100.0),
        ];
        let lod = patch_lod(corners, Vec3::ZERO, &s);
        assert_eq!(lod.edges[0], 16);
        assert!(lod.edges.iter().all(|&e| e <= lod.inner));
        assert_eq!(lod.vertex_count(), lod.inner * lod.inner * 6);
    }
}
