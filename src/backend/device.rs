// Vulkan Device - physical device selection and logical device creation
//
// Responsibilities:
// - Queue family discovery (graphics + presentation)
// - Physical device suitability (queues, extensions, swapchain adequacy)
// - Logical device + queue creation

use anyhow::{Context, Result};
use ash::vk;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::instance::to_cstrings;
use super::swapchain::SwapchainSupportDetails;
use super::{vk_name, Instance, Surface};
use crate::config::Config;
use crate::error::SetupError;

// =============================================================================
// QUEUE FAMILIES
// =============================================================================

/// Queue family slots found on one physical device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    pub fn resolve(&self) -> Option<QueueFamilies> {
        Some(QueueFamilies {
            graphics: self.graphics?,
            present: self.present?,
        })
    }
}

/// Queue families of the selected device, both roles filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    /// One queue create info is needed per distinct family.
    pub fn unique(&self) -> Vec<u32> {
        BTreeSet::from([self.graphics, self.present])
            .into_iter()
            .collect()
    }

    pub fn image_sharing(&self) -> ImageSharing {
        if self.graphics == self.present {
            ImageSharing::Exclusive
        } else {
            ImageSharing::Concurrent([self.graphics, self.present])
        }
    }
}

/// How swapchain images are shared between the graphics and present families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSharing {
    /// Same family: one owner, no transfers needed.
    Exclusive,
    /// Different families: both may access the images without ownership transfer.
    Concurrent([u32; 2]),
}

impl ImageSharing {
    pub fn mode(&self) -> vk::SharingMode {
        match self {
            ImageSharing::Exclusive => vk::SharingMode::EXCLUSIVE,
            ImageSharing::Concurrent(_) => vk::SharingMode::CONCURRENT,
        }
    }

    pub fn queue_family_indices(&self) -> &[u32] {
        match self {
            ImageSharing::Exclusive => &[],
            ImageSharing::Concurrent(indices) => indices,
        }
    }
}

// =============================================================================
// CAPABILITY QUERIES
// =============================================================================

/// Read-only questions asked about a physical device while picking one.
pub trait DeviceCapabilities {
    fn device_name(&self, device: vk::PhysicalDevice) -> String;

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;

    fn supports_presentation(&self, device: vk::PhysicalDevice, family_index: u32) -> Result<bool>;

    fn extension_names(&self, device: vk::PhysicalDevice) -> Result<Vec<String>>;

    fn swapchain_support(&self, device: vk::PhysicalDevice) -> Result<SwapchainSupportDetails>;
}

/// Answers capability queries against a live instance and window surface.
pub struct SurfaceProbe<'a> {
    pub instance: &'a ash::Instance,
    pub surface: &'a Surface,
}

impl DeviceCapabilities for SurfaceProbe<'_> {
    fn device_name(&self, device: vk::PhysicalDevice) -> String {
        let properties = unsafe { self.instance.get_physical_device_properties(device) };
        vk_name(&properties.device_name)
    }

    fn queue_families(&self, device: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(device) }
    }

    fn supports_presentation(&self, device: vk::PhysicalDevice, family_index: u32) -> Result<bool> {
        unsafe {
            self.surface.surface_loader.get_physical_device_surface_support(
                device,
                family_index,
                self.surface.surface,
            )
        }
        .context("Failed to query surface presentation support")
    }

    fn extension_names(&self, device: vk::PhysicalDevice) -> Result<Vec<String>> {
        let extensions = unsafe { self.instance.enumerate_device_extension_properties(device) }
            .context("Failed to enumerate device extensions")?;
        Ok(extensions
            .iter()
            .map(|ext| vk_name(&ext.extension_name))
            .collect())
    }

    fn swapchain_support(&self, device: vk::PhysicalDevice) -> Result<SwapchainSupportDetails> {
        SwapchainSupportDetails::query(self.surface, device)
    }
}

// =============================================================================
// SUITABILITY
// =============================================================================

/// Linear scan; each role takes the first family that offers it, and the
/// scan stops as soon as both roles are filled.
pub fn find_queue_families<C: DeviceCapabilities + ?Sized>(
    caps: &C,
    device: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (index, family) in caps.queue_families(device).iter().enumerate() {
        let index = index as u32;

        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(index);
        }

        if indices.present.is_none() && caps.supports_presentation(device, index)? {
            indices.present = Some(index);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

pub fn missing_extensions(required: &[String], available: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|ext| !available.contains(ext))
        .cloned()
        .collect()
}

/// Capability snapshot of one physical device, dropped once a device is picked.
#[derive(Debug)]
pub struct PhysicalDeviceCandidate {
    pub device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilyIndices,
    pub missing_extensions: Vec<String>,
    /// Only queried when every required extension is present.
    pub swapchain_support: Option<SwapchainSupportDetails>,
}

impl PhysicalDeviceCandidate {
    pub fn probe<C: DeviceCapabilities + ?Sized>(
        caps: &C,
        device: vk::PhysicalDevice,
        required_extensions: &[String],
    ) -> Result<Self> {
        let name = caps.device_name(device);
        let queue_families = find_queue_families(caps, device)?;

        let available = caps.extension_names(device)?;
        let missing_extensions = missing_extensions(required_extensions, &available);

        let swapchain_support = if missing_extensions.is_empty() {
            Some(caps.swapchain_support(device)?)
        } else {
            None
        };

        Ok(Self {
            device,
            name,
            queue_families,
            missing_extensions,
            swapchain_support,
        })
    }

    pub fn is_suitable(&self) -> bool {
        self.queue_families.is_complete()
            && self.missing_extensions.is_empty()
            && self
                .swapchain_support
                .as_ref()
                .is_some_and(SwapchainSupportDetails::is_adequate)
    }
}

/// The physical device the renderer runs on.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub physical_device: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilies,
}

/// First suitable device wins. No scoring, no fallback.
pub fn pick_physical_device<C: DeviceCapabilities + ?Sized>(
    caps: &C,
    devices: &[vk::PhysicalDevice],
    required_extensions: &[String],
) -> Result<SelectedDevice> {
    if devices.is_empty() {
        return Err(SetupError::NoGpu.into());
    }

    for &device in devices {
        let candidate = PhysicalDeviceCandidate::probe(caps, device, required_extensions)?;

        if let (true, Some(queue_families)) =
            (candidate.is_suitable(), candidate.queue_families.resolve())
        {
            log::info!(
                "Physical device picked: {} (graphics family {}, present family {})",
                candidate.name,
                queue_families.graphics,
                queue_families.present
            );
            return Ok(SelectedDevice {
                physical_device: candidate.device,
                name: candidate.name,
                queue_families,
            });
        }

        log::debug!(
            "Skipping {}: queues {:?}, missing extensions {:?}, swapchain adequate {}",
            candidate.name,
            candidate.queue_families,
            candidate.missing_extensions,
            candidate
                .swapchain_support
                .as_ref()
                .is_some_and(SwapchainSupportDetails::is_adequate)
        );
    }

    Err(SetupError::NoSuitableGpu.into())
}

// =============================================================================
// LOGICAL DEVICE
// =============================================================================

/// Logical device wrapper with automatic cleanup
pub struct Device {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    instance: Arc<Instance>,
}

impl Device {
    pub fn new(instance: Arc<Instance>, selected: &SelectedDevice, config: &Config) -> Result<Arc<Self>> {
        let queue_families = selected.queue_families;

        let queue_priorities = [1.0];
        let queue_create_infos = queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect::<Vec<_>>();

        let extension_names = to_cstrings(&config.device.extensions)?;
        let extension_ptrs = extension_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();

        // Device layers are ignored by current loaders but older ones still
        // read them.
        let layers = if config.validation_enabled() {
            config.validation.layers.clone()
        } else {
            Vec::new()
        };
        let layer_names = to_cstrings(&layers)?;
        let layer_ptrs = layer_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();

        let features = vk::PhysicalDeviceFeatures::default();

        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs)
            .enabled_features(&features);

        let device = unsafe {
            instance
                .instance
                .create_device(selected.physical_device, &create_info, None)
        }
        .context("Failed to create logical device")?;

        let graphics_queue = unsafe { device.get_device_queue(queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(queue_families.present, 0) };

        log::info!("Logical device created on {}", selected.name);

        Ok(Arc::new(Self {
            device,
            physical_device: selected.physical_device,
            queue_families,
            graphics_queue,
            present_queue,
            instance,
        }))
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        log::debug!("Destroying logical device...");
        let _ = self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
