//! # Capture Viewer
//! Renders a moving square into a window and captures the presented image or the depth buffer to
//! PNG files on a key press.
//!

#![allow(clippy::std_instead_of_alloc)]

extern crate alloc;

use app::App;
use config::Config;
use mimalloc::MiMalloc;
use tracing::{info, info_span, warn};
use winit::event_loop::{ControlFlow, EventLoop};

use failure::Failure;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

mod app;
mod config;
mod directories;
mod failure;
#[cfg(feature = "log")]
mod logger;
mod renderer;
mod sink;

pub use directories::config_dir;

/// The Cargo package version.
#[cfg(not(debug_assertions))]
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The Cargo package version or '0.0.0' if a non-release build.
#[cfg(debug_assertions)]
pub const VERSION: &str = "0.0.0";

/// If this instance should have debug enabled.
pub fn should_debug() -> bool {
    std::env::args().any(|arg| arg.eq("--debug"))
}

fn main() {
    // Set up logger
    #[cfg(feature = "log")]
    let _logger_guards = logger::setup_logger(should_debug()).report("Could not set up the logger");

    let _span = info_span!("[Main Thread]").entered();
    info!("Capture Viewer v{}", VERSION);

    // Load config
    let config = {
        let maybe_config = match Config::try_load_config() {
            Ok(maybe_config) => maybe_config,
            Err(error) => {
                warn!("Could not load the config file, using the defaults:\n{error}");
                None
            }
        };

        match maybe_config {
            Some(config) => config,
            None => {
                let config = Config::default();
                config.save().report("Could not save the config file");
                config
            }
        }
    };

    if config.poll_frame_event && !cfg!(feature = "event-polling") {
        warn!("'poll_frame_event' is set but the 'event-polling' feature is not enabled");
    }

    // Create event loop
    let event_loop = EventLoop::new().report_and_panic("Could not create the event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    // Run the app
    let mut app = App::new(config);
    event_loop
        .run_app(&mut app)
        .report("The event loop exited with an error");
}
