use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort renderer initialization or a resource (re)load.
///
/// Per-frame problems such as a lost surface are logged and the frame is
/// skipped instead of surfacing here.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter: {0}")]
    Adapter(String),

    #[error("failed to create GPU device: {0}")]
    Device(String),

    #[error("failed to create window surface: {0}")]
    Surface(String),

    #[error("failed to load texture {path:?}")]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid texture data for {label}: {reason}")]
    InvalidTexture { label: String, reason: String },

    #[error("render target {label} cannot be {width}x{height}")]
    InvalidTargetSize {
        label: String,
        width: u32,
        height: u32,
    },

    #[error("shader or pipeline validation failed for {label}: {message}")]
    ShaderValidation { label: String, message: String },
}

pub type RenderResult<T> = Result<T, RenderError>;
