//! Resolves the image sources named in [`SceneSettings`] into decoded data.
//!
//! Named sources are read from the asset directory; procedural ones are
//! generated so the renderer also starts without any files on disk.

use crate::error::RenderError;
use crate::renderer::procedural;
use crate::renderer::{ImageData, SurfaceData, WaterMaps};
use crate::settings::{SceneSettings, SkyboxSource, SurfaceSource, WaterMapSource};

/// Images needed to build the renderer.
#[derive(Clone, Debug)]
pub struct SceneAssets {
    pub surface: SurfaceData,
    pub sky_faces: [ImageData; 6],
    pub water_maps: WaterMaps,
}

impl SceneAssets {
    pub fn load(settings: &SceneSettings) -> Result<Self, RenderError> {
        Ok(Self {
            surface: load_surface(settings, 0)?,
            sky_faces: load_sky_faces(settings)?,
            water_maps: load_water_maps(settings)?,
        })
    }
}

/// Loads the `index`-th configured surface, wrapping around the list.
pub fn load_surface(settings: &SceneSettings, index: usize) -> Result<SurfaceData, RenderError> {
    let Some(source) = settings.surfaces.get(index % settings.surfaces.len().max(1)) else {
        return Err(RenderError::InvalidTexture {
            label: "terrain".into(),
            reason: "no terrain surfaces configured".into(),
        });
    };

    let (height, diffuse) = match source {
        SurfaceSource::Named(name) => {
            let (height_path, diffuse_path) = settings.surface_paths(name);
            (ImageData::load(height_path)?, ImageData::load(diffuse_path)?)
        }
        SurfaceSource::Procedural { size, seed } => {
            let height = procedural::heightmap(*size, *seed);
            let diffuse = procedural::diffuse_for(&height);
            (height, diffuse)
        }
    };

    log::info!(
        "Loaded terrain surface {} ({}x{})",
        source.label(),
        height.width,
        height.height
    );

    Ok(SurfaceData {
        name: source.label(),
        height,
        diffuse,
    })
}

pub fn load_sky_faces(settings: &SceneSettings) -> Result<[ImageData; 6], RenderError> {
    match &settings.skybox {
        SkyboxSource::Named(name) => {
            let [right, left, top, bottom, front, back] = settings.skybox_paths(name);
            Ok([
                ImageData::load(right)?,
                ImageData::load(left)?,
                ImageData::load(top)?,
                ImageData::load(bottom)?,
                ImageData::load(front)?,
                ImageData::load(back)?,
            ])
        }
        SkyboxSource::Procedural { size } => Ok(procedural::sky_faces(*size)),
    }
}

pub fn load_water_maps(settings: &SceneSettings) -> Result<WaterMaps, RenderError> {
    match &settings.water_maps {
        WaterMapSource::Files { dudv, normal } => Ok(WaterMaps {
            dudv: ImageData::load(settings.water_map_path(dudv))?,
            normal: ImageData::load(settings.water_map_path(normal))?,
        }),
        WaterMapSource::Procedural { size, seed } => Ok(WaterMaps {
            dudv: procedural::dudv_map(*size, *seed),
            normal: procedural::water_normal_map(*size, *seed),
        }),
    }
}
