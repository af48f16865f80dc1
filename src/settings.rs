use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::renderer::{FogParams, FxaaSettings, TerrainParams, WaterParams};
use crate::scene::{light, FeatureToggles, PostEffects};

/// Cube face file stems in +X, -X, +Y, -Y, +Z, -Z order.
pub const SKYBOX_FACES: [&str; 6] = ["right", "left", "top", "bottom", "front", "back"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default)]
    pub present_mode: PresentModeSetting,
    #[serde(default = "SceneSettings::default_shadow_map_size")]
    pub shadow_map_size: u32,
    #[serde(default = "SceneSettings::default_water_target_size")]
    pub water_target_size: u32,
    #[serde(default = "SceneSettings::default_asset_root")]
    pub asset_root: PathBuf,
    /// Terrain surfaces cycled with the surface shortcut; the first one is
    /// loaded at startup.
    #[serde(default = "SceneSettings::default_surfaces")]
    pub surfaces: Vec<SurfaceSource>,
    #[serde(default)]
    pub skybox: SkyboxSource,
    #[serde(default)]
    pub water_maps: WaterMapSource,
    #[serde(default)]
    pub toggles: InitialToggles,
    #[serde(default)]
    pub light: LightSettings,
    #[serde(default)]
    pub terrain: TerrainParams,
    #[serde(default)]
    pub water: WaterParams,
    #[serde(default)]
    pub fog: FogParams,
    #[serde(default)]
    pub fxaa: FxaaSettings,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            present_mode: PresentModeSetting::default(),
            shadow_map_size: Self::default_shadow_map_size(),
            water_target_size: Self::default_water_target_size(),
            asset_root: Self::default_asset_root(),
            surfaces: Self::default_surfaces(),
            skybox: SkyboxSource::default(),
            water_maps: WaterMapSource::default(),
            toggles: InitialToggles::default(),
            light: LightSettings::default(),
            terrain: TerrainParams::default(),
            water: WaterParams::default(),
            fog: FogParams::default(),
            fxaa: FxaaSettings::default(),
        }
    }
}

impl SceneSettings {
    pub fn load() -> Self {
        Self::load_from_path("settings.json")
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        use std::fs;

        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<SceneSettings>(&contents) {
                Ok(settings) => {
                    info!("Loaded scene settings from {:?}", path);
                    settings.validate()
                }
                Err(err) => {
                    warn!(
                        "Failed to parse {:?} ({}). Falling back to default scene settings.",
                        path, err
                    );
                    SceneSettings::default()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!("Scene settings file {:?} not found. Using default settings.", path);
                SceneSettings::default()
            }
            Err(err) => {
                warn!(
                    "Failed to read {:?} ({}). Falling back to default scene settings.",
                    path, err
                );
                SceneSettings::default()
            }
        }
    }

    pub fn validate(mut self) -> Self {
        if self.shadow_map_size == 0 {
            warn!("Shadow map size must be greater than zero. Using default value.");
            self.shadow_map_size = Self::default_shadow_map_size();
        }

        if self.water_target_size == 0 {
            warn!("Water target size must be greater than zero. Using default value.");
            self.water_target_size = Self::default_water_target_size();
        }

        if self.resolution.width == 0 || self.resolution.height == 0 {
            warn!("Resolution must be greater than zero. Using default resolution.");
            self.resolution = Resolution::default();
        }

        if self.surfaces.is_empty() {
            warn!("No terrain surfaces configured. Using the procedural surfaces.");
            self.surfaces = Self::default_surfaces();
        }

        if self.terrain.horizontal_scale <= 0.0 {
            warn!("Terrain horizontal scale must be positive. Using default value.");
            self.terrain.horizontal_scale = TerrainParams::default().horizontal_scale;
        }
        self.terrain.lod = self.terrain.lod.sanitized();

        if self.fog.density < 0.0 {
            warn!("Fog density cannot be negative. Using default value.");
            self.fog.density = FogParams::default().density;
        }

        self
    }

    pub fn present_mode(&self, available: &[wgpu::PresentMode]) -> wgpu::PresentMode {
        let desired = self.present_mode.to_wgpu();
        if available.contains(&desired) {
            return desired;
        }

        warn!(
            "Requested present mode {:?} is not supported. Falling back to FIFO.",
            desired
        );

        if available.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            available
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        }
    }

    /// Height and diffuse image paths of a named surface.
    pub fn surface_paths(&self, name: &str) -> (PathBuf, PathBuf) {
        let dir = self.asset_root.join("terrain").join(name);
        (dir.join("height.png"), dir.join("diffuse.png"))
    }

    pub fn skybox_paths(&self, name: &str) -> [PathBuf; 6] {
        let dir = self.asset_root.join("skybox").join(name);
        SKYBOX_FACES.map(|face| dir.join(format!("{face}.png")))
    }

    pub fn water_map_path(&self, file: &str) -> PathBuf {
        self.asset_root.join("water").join(file)
    }

    const fn default_shadow_map_size() -> u32 {
        2048
    }

    const fn default_water_target_size() -> u32 {
        1024
    }

    fn default_asset_root() -> PathBuf {
        PathBuf::from("assets")
    }

    fn default_surfaces() -> Vec<SurfaceSource> {
        vec![
            SurfaceSource::Procedural { size: 512, seed: 7 },
            SurfaceSource::Procedural { size: 512, seed: 42 },
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceSource {
    /// `{asset_root}/terrain/{name}/height.png` and `diffuse.png`.
    Named(String),
    Procedural { size: u32, seed: u64 },
}

impl SurfaceSource {
    pub fn label(&self) -> String {
        match self {
            SurfaceSource::Named(name) => name.clone(),
            SurfaceSource::Procedural { seed, .. } => format!("procedural-{seed}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkyboxSource {
    /// Six faces under `{asset_root}/skybox/{name}/`.
    Named(String),
    Procedural { size: u32 },
}

impl Default for SkyboxSource {
    fn default() -> Self {
        SkyboxSource::Procedural { size: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterMapSource {
    /// File names under `{asset_root}/water/`.
    Files { dudv: String, normal: String },
    Procedural { size: u32, seed: u64 },
}

impl Default for WaterMapSource {
    fn default() -> Self {
        WaterMapSource::Procedural { size: 256, seed: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialToggles {
    pub shadow: bool,
    pub water: bool,
    pub fog: bool,
    pub anti_aliasing: bool,
    pub lighting: bool,
    pub show_ground: bool,
    pub hide_ground_in_water_passes: bool,
    pub wireframe: bool,
}

impl Default for InitialToggles {
    fn default() -> Self {
        Self {
            shadow: true,
            water: true,
            fog: false,
            anti_aliasing: true,
            lighting: true,
            show_ground: true,
            hide_ground_in_water_passes: false,
            wireframe: false,
        }
    }
}

impl InitialToggles {
    pub fn to_toggles(self) -> FeatureToggles {
        let mut toggles = FeatureToggles::default().with_effects(PostEffects {
            fog: self.fog,
            anti_aliasing: self.anti_aliasing,
        });
        toggles.use_shadow = self.shadow;
        toggles.render_water = self.water;
        toggles.use_lighting = self.lighting;
        toggles.show_ground = self.show_ground;
        toggles.hide_ground_in_water_passes = self.hide_ground_in_water_passes;
        toggles.set_wireframe(self.wireframe);
        toggles
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightSettings {
    pub azimuth: f32,
    pub elevation: f32,
    pub color: [f32; 3],
}

impl Default for LightSettings {
    fn default() -> Self {
        Self {
            azimuth: light::DEFAULT_AZIMUTH,
            elevation: light::DEFAULT_ELEVATION,
            color: [1.0, 1.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModeSetting {
    #[default]
    Fifo,
    FifoRelaxed,
    Immediate,
    Mailbox,
    AutoVsync,
    AutoNoVsync,
}

impl PresentModeSetting {
    fn to_wgpu(&self) -> wgpu::PresentMode {
        match self {
            PresentModeSetting::Fifo => wgpu::PresentMode::Fifo,
            PresentModeSetting::FifoRelaxed => wgpu::PresentMode::FifoRelaxed,
            PresentModeSetting::Immediate => wgpu::PresentMode::Immediate,
            PresentModeSetting::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModeSetting::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModeSetting::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invalid_settings() -> SceneSettings {
        let mut settings = SceneSettings {
            shadow_map_size: 0,
            water_target_size: 0,
            resolution: Resolution {
                width: 0,
                height: 0,
            },
            surfaces: Vec::new(),
            present_mode: PresentModeSetting::Immediate,
            ..SceneSettings::default()
        };
        settings.fog.density = -1.0;
        settings.terrain.horizontal_scale = 0.0;
        settings
    }

    #[test]
    fn validate_replaces_invalid_values_with_defaults() {
        let validated = invalid_settings().validate();
        let defaults = SceneSettings::default();

        assert_eq!(validated.shadow_map_size, defaults.shadow_map_size);
        assert_eq!(validated.water_target_size, defaults.water_target_size);
        assert_eq!(validated.resolution.width, Resolution::default().width);
        assert_eq!(validated.resolution.height, Resolution::default().height);
        assert_eq!(validated.surfaces, defaults.surfaces);
        assert_eq!(validated.fog.density, defaults.fog.density);
        assert_eq!(validated.terrain.horizontal_scale, defaults.terrain.horizontal_scale);
    }

    #[test]
    fn bundled_settings_file_matches_defaults() {
        let bundled: SceneSettings =
            serde_json::from_str(include_str!("../settings.json")).expect("bundled settings parse");
        let defaults = SceneSettings::default();
        assert_eq!(bundled.surfaces, defaults.surfaces);
        assert_eq!(bundled.skybox, defaults.skybox);
        assert_eq!(bundled.water_maps, defaults.water_maps);
        assert_eq!(bundled.toggles, defaults.toggles);
        assert_eq!(bundled.terrain, defaults.terrain);
        assert_eq!(bundled.water, defaults.water);
        assert_eq!(bundled.fog, defaults.fog);
        assert_eq!(bundled.fxaa, defaults.fxaa);
    }

    #[test]
    fn validate_preserves_valid_values() {
        let valid = SceneSettings {
            shadow_map_size: 4096,
            water_target_size: 512,
            resolution: Resolution {
                width: 1920,
                height: 1080,
            },
            surfaces: vec![SurfaceSource::Named("alps".into())],
            ..SceneSettings::default()
        };

        let validated = valid.clone().validate();

        assert_eq!(validated.shadow_map_size, 4096);
        assert_eq!(validated.water_target_size, 512);
        assert_eq!(validated.resolution.width, 1920);
        assert_eq!(validated.surfaces, valid.surfaces);
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let json = r#"{
            "shadow_map_size": 1024,
            "surfaces": [{ "named": "canyon" }, { "procedural": { "size": 256, "seed": 9 } }],
            "skybox": { "named": "clouds" },
            "toggles": { "fog": true, "wireframe": true }
        }"#;
        let settings: SceneSettings = serde_json::from_str(json).expect("valid settings json");

        assert_eq!(settings.shadow_map_size, 1024);
        assert_eq!(settings.water_target_size, 1024);
        assert_eq!(settings.surfaces[0], SurfaceSource::Named("canyon".into()));
        assert_eq!(settings.surfaces[1].label(), "procedural-9");
        assert_eq!(settings.skybox, SkyboxSource::Named("clouds".into()));
        assert!(settings.toggles.fog);
        assert!(settings.toggles.water);
    }

    #[test]
    fn initial_wireframe_remembers_configured_effects() {
        let mut toggles = InitialToggles {
            fog: true,
            anti_aliasing: true,
            wireframe: true,
            ..InitialToggles::default()
        }
        .to_toggles();

        assert!(toggles.is_wireframe());
        assert!(!toggles.render_fog());
        toggles.set_wireframe(false);
        assert!(toggles.render_fog());
        assert!(toggles.use_anti_aliasing());
    }

    #[test]
    fn asset_paths_follow_directory_layout() {
        let settings = SceneSettings {
            asset_root: PathBuf::from("data"),
            ..SceneSettings::default()
        };
        let (height, diffuse) = settings.surface_paths("alps");
        assert_eq!(height, Path::new("data/terrain/alps/height.png"));
        assert_eq!(diffuse, Path::new("data/terrain/alps/diffuse.png"));

        let faces = settings.skybox_paths("day");
        assert_eq!(faces[0], Path::new("data/skybox/day/right.png"));
        assert_eq!(faces[5], Path::new("data/skybox/day/back.png"));
    }

    #[test]
    fn present_mode_returns_desired_when_available() {
        let settings = SceneSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..SceneSettings::default()
        };

        let available = [
            wgpu::PresentMode::Fifo,
            wgpu::PresentMode::Mailbox,
            wgpu::PresentMode::Immediate,
        ];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Mailbox);
    }

    #[test]
    fn present_mode_falls_back_to_fifo_when_desired_missing() {
        let settings = SceneSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..SceneSettings::default()
        };

        let available = [wgpu::PresentMode::Fifo, wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Fifo);
    }

    #[test]
    fn present_mode_uses_first_available_when_fifo_missing() {
        let settings = SceneSettings {
            present_mode: PresentModeSetting::Mailbox,
            ..SceneSettings::default()
        };

        let available = [wgpu::PresentMode::Immediate];

        assert_eq!(settings.present_mode(&available), wgpu::PresentMode::Immediate);
    }
}
