use glam::{Mat4, Vec3};

pub const DEFAULT_AZIMUTH: f32 = 30.0;
pub const DEFAULT_ELEVATION: f32 = 30.0;

const MAX_ELEVATION: f32 = 90.0;

/// Orthographic volume the shadow map covers, centred on the point passed to
/// [`DirectionalLight::light_space_matrix`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowFrustum {
    pub distance: f32,
    pub half_size: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowFrustum {
    fn default() -> Self {
        Self {
            distance: 100.0,
            half_size: 75.0,
            near: 0.1,
            far: 400.0,
        }
    }
}

/// Sun-like light described by azimuth/elevation in degrees.
///
/// The direction is derived state: it points from the light towards the
/// scene and is recomputed whenever either angle changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    azimuth: f32,
    elevation: f32,
    direction: Vec3,
    pub color: Vec3,
    pub shadow: ShadowFrustum,
}

impl DirectionalLight {
    pub fn new(azimuth: f32, elevation: f32) -> Self {
        let mut light = Self {
            azimuth,
            elevation: elevation.clamp(-MAX_ELEVATION, MAX_ELEVATION),
            direction: Vec3::NEG_Y,
            color: Vec3::ONE,
            shadow: ShadowFrustum::default(),
        };
        light.update_direction();
        light
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.elevation
    }

    pub fn direction(&self) -> Vec3 {
        self.direction
    }

    pub fn set_azimuth(&mut self, degrees: f32) {
        self.azimuth = degrees.rem_euclid(360.0);
        self.update_direction();
    }

    pub fn set_elevation(&mut self, degrees: f32) {
        self.elevation = degrees.clamp(-MAX_ELEVATION, MAX_ELEVATION);
        self.update_direction();
    }

    pub fn update_direction(&mut self) {
        let (az, el) = (self.azimuth.to_radians(), self.elevation.to_radians());
        let towards_light = Vec3::new(az.cos() * el.cos(), el.sin(), -az.sin() * el.cos());
        self.direction = -towards_light.normalize();
    }

    pub fn light_space_matrix(&self, center: Vec3) -> Mat4 {
        let frustum = &self.shadow;
        let eye = center - self.direction * frustum.distance;
        let view = Mat4::look_at_rh(eye, center, shadow_up(self.direction));
        let proj = Mat4::orthographic_rh(
            -frustum.half_size,
            frustum.half_size,
            -frustum.half_size,
            frustum.half_size,
            frustum.near,
            frustum.far,
        );
        proj * view
    }
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self::new(DEFAULT_AZIMUTH, DEFAULT_ELEVATION)
    }
}

fn shadow_up(direction: Vec3) -> Vec3 {
    if direction.dot(Vec3::Y).abs() > 0.95 {
        Vec3::Z
    } else {
        Vec3::Y
    }
}
