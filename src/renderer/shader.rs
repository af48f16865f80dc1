use crate::error::RenderError;

pub const COMMON_WGSL: &str = include_str!("../shader/common.wgsl");

/// Runs `create` inside a validation error scope and turns a captured
/// error into [`RenderError::ShaderValidation`]. Used at startup so a bad
/// shader or a binding mismatch stops initialization instead of producing
/// an uncaptured error on the first frame.
pub fn validated<T>(device: &wgpu::Device, label: &str, create: impl FnOnce() -> T) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(value),
        Some(err) => Err(RenderError::ShaderValidation {
            label: label.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Creates a module from `common.wgsl` followed by `source`.
pub fn scene_module(device: &wgpu::Device, label: &str, source: &str) -> Result<wgpu::ShaderModule, RenderError> {
    let code = format!("{COMMON_WGSL}\n{source}");
    validated(device, label, || {
        device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(code.into()),
        })
    })
}
