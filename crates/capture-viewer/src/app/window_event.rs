use frame_capture::VkError;
use thiserror::Error;
use tracing::{info, warn};
use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::WindowId,
};

use super::App;

impl App {
    pub fn on_window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) -> Result<(), Error> {
        let Some(app) = self.app.as_mut() else {
            return Ok(());
        };

        if app.window.id() != window_id {
            return Ok(());
        }

        match event {
            WindowEvent::Resized(new_size) => app.resized(new_size),

            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                self.app = None;
                event_loop.exit();
            }

            WindowEvent::RedrawRequested => {
                app.redraw()?;

                if self
                    .config
                    .frames
                    .is_some_and(|limit| app.renderer.frame() >= limit)
                {
                    info!("Rendered {} frames, exiting", app.renderer.frame());
                    self.app = None;
                    event_loop.exit();
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        logical_key,
                        state: ElementState::Pressed,
                        repeat: false,
                        ..
                    },
                ..
            } => match logical_key {
                Key::Named(NamedKey::Escape) => {
                    self.app = None;
                    event_loop.exit();
                }

                Key::Character(key) => {
                    let Some(target) = self.config.target_for_key(&key) else {
                        return Ok(());
                    };

                    let path = self.config.capture_path(target);
                    if app.requests.request(target, path) {
                        info!("Requested a {target} capture");
                    } else {
                        warn!("A {target} capture is already running");
                    }
                }

                _ => {}
            },

            _ => {}
        }

        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Failed to render:\n{0}")]
    Render(#[from] VkError),
}
