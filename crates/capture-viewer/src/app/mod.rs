use tracing::error;
use winit::{
    application::ApplicationHandler, event::WindowEvent, event_loop::ActiveEventLoop,
    window::WindowId,
};

use crate::config::Config;

pub use active_app::ActiveApp;

mod active_app;
mod redraw;
mod window_event;

pub struct App {
    /// Only present between `resumed` and exit.
    pub app: Option<ActiveApp>,
    pub config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { app: None, config }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.app.is_some() {
            return;
        }

        let app = match ActiveApp::new(event_loop, &self.config) {
            Ok(app) => app,
            Err(e) => {
                error!("Could not start:\n{e}");
                event_loop.exit();
                return;
            }
        };

        self.app = Some(app);
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(app) = self.app.as_ref() {
            app.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Err(e) = self.on_window_event(event_loop, window_id, event) {
            error!("{e}");
            self.app = None;
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.app = None;
    }
}
