// =============================================================================
// HELLO TRIANGLE - Vulkan bring-up with ash + winit
// =============================================================================
//
// Builds everything needed to draw a static triangle, once, at startup:
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  Instance (+ debug messenger)                                   │
// │    └── Surface (window connection)                              │
// │          └── Physical device → Logical device + queues          │
// │                └── Swapchain + image views                      │
// │                      ├── Render pass + graphics pipeline        │
// │                      └── Framebuffers (one per image view)      │
// └─────────────────────────────────────────────────────────────────┘
//
// Then waits on window events until the window is closed and tears
// everything down in reverse order.
//
// =============================================================================

mod backend;
mod config;
mod error;
mod renderer;

use anyhow::Result;
use config::Config;
use renderer::Renderer;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    init_logging();

    let config = Config::load();
    log::info!("Starting {}", config.app.name);
    log::info!("Window: {}x{}", config.window.width, config.window.height);

    let event_loop = EventLoop::new()?;
    // Nothing is drawn per frame, so sleep until the OS has something.
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    app.finish()
}

/// `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The renderer presents to the
/// window, so it goes first.
pub struct App {
    config: Config,
    renderer: Option<Renderer>,
    window: Option<Window>,
    /// Failure raised inside the event loop, reported once the loop returns.
    init_error: Option<anyhow::Error>,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = event_loop.create_window(window_attributes)?;
        let window = self.window.insert(window);

        let renderer = Renderer::new(&self.config, window)?;
        let extent = renderer.extent();
        log::info!(
            "Ready: {}x{} swapchain, {:?}",
            extent.width,
            extent.height,
            renderer.present_mode()
        );
        self.renderer = Some(renderer);

        Ok(())
    }

    /// Tear down every Vulkan object while the window still exists.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.renderer = None;
        event_loop.exit();
    }

    /// Exit status of the whole run.
    pub fn finish(mut self) -> Result<()> {
        self.renderer = None;
        match self.init_error.take() {
            Some(e) => Err(e),
            None => {
                log::info!("Cleanup complete");
                Ok(())
            }
        }
    }
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            log::error!("Failed to initialize: {:#}", e);
            self.init_error = Some(e);
            self.shutdown(event_loop);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.renderer = None;
    }
}
