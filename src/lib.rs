pub mod app;
pub mod assets;
pub mod error;
pub mod pipeline;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod time;

use app::App;
use settings::SceneSettings;
use winit::event_loop::EventLoop;

pub use error::RenderError;
pub use pipeline::{FramePipeline, SceneState};

pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

pub fn run() -> Result<(), winit::error::EventLoopError> {
    init_logging();

    log::info!("Starting wgpu terrain renderer");

    let settings = SceneSettings::load();
    let event_loop = EventLoop::new()?;
    let mut app = App::new(settings);

    let result = event_loop.run_app(&mut app);

    if let Err(ref err) = result {
        log::error!("Application error: {}", err);
    }

    log::info!("Application shutdown complete");

    result
}
