//! Generated stand-ins for the terrain, sky and water textures so the
//! scene renders without an asset directory.

use glam::{Vec2, Vec3};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::renderer::texture::ImageData;

const OCTAVES: u32 = 5;

/// Value-noise lattice with smooth interpolation, tileable at `period`.
struct ValueNoise {
    period: u32,
    lattice: Vec<f32>,
}

impl ValueNoise {
    fn new(period: u32, rng: &mut SmallRng) -> Self {
        let lattice = (0..period * period).map(|_| rng.gen::<f32>()).collect();
        Self { period, lattice }
    }

    fn at(&self, x: i64, y: i64) -> f32 {
        let p = self.period as i64;
        let (x, y) = (x.rem_euclid(p) as usize, y.rem_euclid(p) as usize);
        self.lattice[y * self.period as usize + x]
    }

    fn sample(&self, point: Vec2) -> f32 {
        let base = point.floor();
        let frac = point - base;
        let smooth = frac * frac * (Vec2::splat(3.0) - 2.0 * frac);
        let (x, y) = (base.x as i64, base.y as i64);

        let top = lerp(self.at(x, y), self.at(x + 1, y), smooth.x);
        let bottom = lerp(self.at(x, y + 1), self.at(x + 1, y + 1), smooth.x);
        lerp(top, bottom, smooth.y)
    }

    /// Fractal sum normalised to [0, 1].
    fn fbm(&self, point: Vec2) -> f32 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut frequency = 1.0;
        let mut total = 0.0;
        for _ in 0..OCTAVES {
            sum += self.sample(point * frequency) * amplitude;
            total += amplitude;
            amplitude *= 0.5;
            frequency *= 2.0;
        }
        sum / total
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Grayscale height field; brighter is higher.
pub fn heightmap(size: u32, seed: u64) -> ImageData {
    let size = size.max(2);
    let mut rng = SmallRng::seed_from_u64(seed);
    let noise = ValueNoise::new(8, &mut rng);
    let heights = height_values(&noise, size);

    let pixels = heights
        .iter()
        .flat_map(|&h| {
            let v = to_byte(h);
            [v, v, v, 255]
        })
        .collect();
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}

fn height_values(noise: &ValueNoise, size: u32) -> Vec<f32> {
    let scale = noise.period as f32 / size as f32;
    (0..size * size)
        .map(|i| {
            let (x, y) = (i % size, i / size);
            let h = noise.fbm(Vec2::new(x as f32, y as f32) * scale);
            // Widen the valleys so the default water level floods some of them.
            h.powf(1.4)
        })
        .collect()
}

/// Color ramp keyed on the heightmap: sand, grass, rock, snow.
pub fn diffuse_for(height: &ImageData) -> ImageData {
    const STOPS: [(f32, Vec3); 4] = [
        (0.0, Vec3::new(0.76, 0.70, 0.50)),
        (0.25, Vec3::new(0.28, 0.50, 0.20)),
        (0.6, Vec3::new(0.45, 0.40, 0.35)),
        (0.85, Vec3::new(0.95, 0.95, 0.97)),
    ];

    let pixels = height
        .pixels
        .chunks_exact(4)
        .flat_map(|px| {
            let h = px[0] as f32 / 255.0;
            let color = ramp(&STOPS, h);
            [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
        })
        .collect();
    ImageData {
        width: height.width,
        height: height.height,
        pixels,
    }
}

fn ramp(stops: &[(f32, Vec3)], t: f32) -> Vec3 {
    let mut color = stops[0].1;
    for pair in stops.windows(2) {
        let ((t0, c0), (t1, c1)) = (pair[0], pair[1]);
        if t >= t0 {
            let k = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
            color = c0.lerp(c1, k);
        }
    }
    color
}

/// Horizon-to-zenith gradient on each cube face, face order +X, -X, +Y,
/// -Y, +Z, -Z.
pub fn sky_faces(size: u32) -> [ImageData; 6] {
    let size = size.max(2);
    let horizon = Vec3::new(0.75, 0.82, 0.90);
    let zenith = Vec3::new(0.25, 0.45, 0.80);
    let ground = Vec3::new(0.35, 0.35, 0.38);

    std::array::from_fn(|face| {
        let pixels = (0..size * size)
            .flat_map(|i| {
                let (x, y) = (i % size, i / size);
                let u = (x as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let v = (y as f32 + 0.5) / size as f32 * 2.0 - 1.0;
                let dir = cube_direction(face, u, v).normalize();
                let color = if dir.y >= 0.0 {
                    horizon.lerp(zenith, dir.y.sqrt())
                } else {
                    horizon.lerp(ground, (-dir.y).sqrt())
                };
                [to_byte(color.x), to_byte(color.y), to_byte(color.z), 255]
            })
            .collect();
        ImageData {
            width: size,
            height: size,
            pixels,
        }
    })
}

/// Direction through texel (u, v) in [-1, 1] of a cube face, following the
/// WebGPU cube face orientation.
fn cube_direction(face: usize, u: f32, v: f32) -> Vec3 {
    match face {
        0 => Vec3::new(1.0, -v, -u),
        1 => Vec3::new(-1.0, -v, u),
        2 => Vec3::new(u, 1.0, v),
        3 => Vec3::new(u, -1.0, -v),
        4 => Vec3::new(u, -v, 1.0),
        _ => Vec3::new(-u, -v, -1.0),
    }
}

/// Tileable distortion map: red/green hold the offset around 0.5.
pub fn dudv_map(size: u32, seed: u64) -> ImageData {
    let size = size.max(2);
    let mut rng = SmallRng::seed_from_u64(seed);
    let du = ValueNoise::new(16, &mut rng);
    let dv = ValueNoise::new(16, &mut rng);
    let scale = 16.0 / size as f32;

    let pixels = (0..size * size)
        .flat_map(|i| {
            let p = Vec2::new((i % size) as f32, (i / size) as f32) * scale;
            [to_byte(du.fbm(p)), to_byte(dv.fbm(p)), 0, 255]
        })
        .collect();
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}

/// Tangent-space normals of a rippled surface, blue is up.
pub fn water_normal_map(size: u32, seed: u64) -> ImageData {
    let size = size.max(2);
    let mut rng = SmallRng::seed_from_u64(seed);
    let noise = ValueNoise::new(16, &mut rng);
    let heights = height_values(&noise, size);
    let at = |x: i64, y: i64| {
        let s = size as i64;
        heights[(y.rem_euclid(s) * s + x.rem_euclid(s)) as usize]
    };

    let strength = 4.0;
    let pixels = (0..size as i64 * size as i64)
        .flat_map(|i| {
            let (x, y) = (i % size as i64, i / size as i64);
            let dx = (at(x + 1, y) - at(x - 1, y)) * strength;
            let dy = (at(x, y + 1) - at(x, y - 1)) * strength;
            let n = Vec3::new(-dx, -dy, 1.0).normalize() * 0.5 + Vec3::splat(0.5);
            [to_byte(n.x), to_byte(n.y), to_byte(n.z), 255]
        })
        .collect();
    ImageData {
        width: size,
        height: size,
        pixels,
    }
}
