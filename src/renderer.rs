// Renderer - the whole initialization sequence in one place
//
// Instance -> Surface -> PhysicalDevice -> Device -> Swapchain/ImageViews
//          -> RenderPass -> Pipeline -> Framebuffers
//
// Teardown is the exact reverse, driven by field order and the Arc links
// between the wrappers.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::sync::Arc;
use winit::window::Window;

use crate::backend::device::{pick_physical_device, SurfaceProbe};
use crate::backend::{
    Device, Framebuffers, GraphicsPipeline, Instance, RenderPass, Surface, Swapchain,
};
use crate::config::Config;

/// Owns every Vulkan object of the triangle renderer.
///
/// IMPORTANT: Field order matters for Drop! Fields are dropped top to
/// bottom, which is the reverse of creation order.
pub struct Renderer {
    framebuffers: Framebuffers,
    _pipeline: GraphicsPipeline,
    _render_pass: Arc<RenderPass>,
    swapchain: Arc<Swapchain>,
    device: Arc<Device>,
    _surface: Arc<Surface>,
    _instance: Arc<Instance>,
}

impl Renderer {
    pub fn new(config: &Config, window: &Window) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance + surface
        // ─────────────────────────────────────────────────────────────────────
        let display_handle = window.raw_display_handle();
        let instance = Instance::new(config, display_handle)?;
        let surface = Surface::new(instance.clone(), display_handle, window.raw_window_handle())?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Physical device
        // ─────────────────────────────────────────────────────────────────────
        let physical_devices = unsafe { instance.instance.enumerate_physical_devices() }
            .context("Failed to enumerate physical devices")?;

        let probe = SurfaceProbe {
            instance: &instance.instance,
            surface: &surface,
        };
        let selected = pick_physical_device(&probe, &physical_devices, &config.device.extensions)?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Logical device + queues
        // ─────────────────────────────────────────────────────────────────────
        let device = Device::new(instance.clone(), &selected, config)?;
        log::debug!(
            "Graphics queue {:?}, present queue {:?}",
            device.graphics_queue,
            device.present_queue
        );

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Swapchain + image views
        // ─────────────────────────────────────────────────────────────────────
        let size = window.inner_size();
        let swapchain = Swapchain::new(device.clone(), surface.clone(), (size.width, size.height))?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 5: Render pass + pipeline
        // ─────────────────────────────────────────────────────────────────────
        let render_pass = RenderPass::new(device.clone(), swapchain.format)?;
        let pipeline = GraphicsPipeline::new(
            device.clone(),
            &render_pass,
            swapchain.extent,
            &config.shaders.vertex,
            &config.shaders.fragment,
        )?;

        // ─────────────────────────────────────────────────────────────────────
        // STEP 6: Framebuffers
        // ─────────────────────────────────────────────────────────────────────
        let framebuffers = Framebuffers::new(swapchain.clone(), render_pass.clone())?;

        log::info!("Vulkan initialized successfully!");

        Ok(Self {
            framebuffers,
            _pipeline: pipeline,
            _render_pass: render_pass,
            swapchain,
            device,
            _surface: surface,
            _instance: instance,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        log::info!(
            "Cleaning up Vulkan resources ({} framebuffers over {} swapchain images)...",
            self.framebuffers.framebuffers.len(),
            self.swapchain.images.len()
        );
        // Nothing is in flight, but make sure before anything is destroyed.
        let _ = self.device.wait_idle();
    }
}
