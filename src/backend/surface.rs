// Surface - platform presentation target bound to the window

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use std::sync::Arc;

use super::Instance;

pub struct Surface {
    pub surface: vk::SurfaceKHR,
    pub surface_loader: khr::Surface,
    _instance: Arc<Instance>,
}

impl Surface {
    pub fn new(
        instance: Arc<Instance>,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> Result<Arc<Self>> {
        // ash-window picks the platform-specific create call (Win32, Xlib,
        // Wayland, Metal...) from the handle types.
        let surface = unsafe {
            ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                display_handle,
                window_handle,
                None,
            )
        }
        .context("Failed to create window surface")?;

        let surface_loader = khr::Surface::new(&instance.entry, &instance.instance);

        log::info!("Window surface created");
        Ok(Arc::new(Self {
            surface,
            surface_loader,
            _instance: instance,
        }))
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("Destroying surface...");
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}
