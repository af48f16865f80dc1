pub mod binding;
pub mod context;
pub mod depth;
pub mod fog;
pub mod fxaa;
pub mod lod;
pub mod pass;
pub mod pipeline_builder;
pub mod plan;
pub mod procedural;
#[allow(clippy::module_inception)]
pub mod renderer;
pub mod shader;
pub mod shadow;
pub mod skybox;
pub mod target;
pub mod terrain;
pub mod texture;
pub mod uniforms;
pub mod water;

pub use binding::{BindMode, TargetBinder, TargetSlot};
pub use context::GpuContext;
pub use depth::Depth;
pub use fog::{Fog, FogParams};
pub use fxaa::{Fxaa, FxaaSettings};
pub use lod::{LodSettings, PatchLod};
pub use pass::{ClipPlane, DrawContext, PassContext, PassFlags, PassPhase, ViewState};
pub use pipeline_builder::{PipelineBuilder, PipelineKey, PipelineSet};
pub use plan::{DrawItem, FrameInputs, FramePlan, PlannedPass};
pub use renderer::Renderer;
pub use shadow::ShadowMap;
pub use skybox::Skybox;
pub use target::{OffscreenTarget, TargetDescriptor, TargetKind};
pub use terrain::{PatchGrid, SurfaceData, Terrain, TerrainParams};
pub use texture::{ImageData, Texture};
pub use water::{Water, WaterMaps, WaterParams};
