// Vulkan Instance - connection between the application and the driver
//
// Responsibilities:
// - Diagnostic layer and instance extension checks
// - Instance creation (with a messenger chained in for create/destroy)
// - Persistent debug messenger when diagnostics are enabled

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use raw_window_handle::RawDisplayHandle;
use std::borrow::Cow;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::vk_name;
use crate::config::{Config, ValidationConfig};
use crate::error::SetupError;

/// Result of comparing requested diagnostic layers with the installed ones.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct LayerReport {
    pub missing: Vec<String>,
}

impl LayerReport {
    pub fn all_present(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Compare requested layers against the available ones.
///
/// This only reports. Whether a missing layer is fatal is decided by the
/// caller (`validation.strict`).
pub fn check_validation_layers(requested: &[String], available: &[String]) -> LayerReport {
    let missing = requested
        .iter()
        .filter(|layer| {
            let found = available.contains(layer);
            if found {
                log::debug!("{} found", layer);
            } else {
                log::warn!("Missing {} layer", layer);
            }
            !found
        })
        .cloned()
        .collect();

    LayerReport { missing }
}

/// Every required extension must be in the available list.
pub fn check_required_extensions(
    required: &[String],
    available: &[String],
) -> std::result::Result<(), SetupError> {
    for extension in required {
        if !available.contains(extension) {
            log::error!("Missing {}", extension);
            return Err(SetupError::MissingExtension(extension.clone()));
        }
        log::debug!("{} extension found", extension);
    }
    Ok(())
}

/// Layers to enable on the instance. Empty when diagnostics are off.
///
/// A missing layer is only a warning unless `strict` is set; in that case
/// the first missing one is reported.
pub fn select_layers(
    validation: &ValidationConfig,
    enable_validation: bool,
    available: &[String],
) -> std::result::Result<Vec<String>, SetupError> {
    if !enable_validation {
        return Ok(Vec::new());
    }

    let report = check_validation_layers(&validation.layers, available);
    match report.missing.first() {
        Some(layer) if validation.strict => Err(SetupError::MissingLayer(layer.clone())),
        _ => Ok(validation.layers.clone()),
    }
}

/// Windowing extensions, plus debug utils when diagnostics are on.
pub fn required_extensions(mut windowing: Vec<String>, enable_validation: bool) -> Vec<String> {
    if enable_validation {
        windowing.push(DebugUtils::name().to_string_lossy().into_owned());
    }
    windowing
}

fn windowing_extensions(display_handle: RawDisplayHandle) -> Result<Vec<String>> {
    let names = ash_window::enumerate_required_extensions(display_handle)
        .context("Failed to query windowing extensions")?;

    Ok(names
        .iter()
        .map(|&name| unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
        .collect())
}

/// Vulkan instance wrapper with automatic cleanup
pub struct Instance {
    pub instance: ash::Instance,
    pub entry: Entry,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl Instance {
    /// Create the instance.
    ///
    /// # Arguments
    /// * `config` - Startup configuration (names, layers, validation switch)
    /// * `display_handle` - Display the window lives on, decides the platform
    ///   surface extensions
    pub fn new(config: &Config, display_handle: RawDisplayHandle) -> Result<Arc<Self>> {
        let enable_validation = config.validation_enabled();
        log::info!(
            "Creating Vulkan instance (validation {})",
            if enable_validation { "on" } else { "off" }
        );

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        // Step 1: diagnostic layers
        let available = if enable_validation {
            let available = entry
                .enumerate_instance_layer_properties()
                .context("Failed to enumerate instance layers")?
                .iter()
                .map(|layer| vk_name(&layer.layer_name))
                .collect::<Vec<_>>();
            log::debug!("Available layers: {:?}", available);
            available
        } else {
            Vec::new()
        };
        let layers = select_layers(&config.validation, enable_validation, &available)?;

        // Step 2: instance extensions
        let available = entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate instance extensions")?
            .iter()
            .map(|ext| vk_name(&ext.extension_name))
            .collect::<Vec<_>>();
        log::debug!("Available instance extensions: {:?}", available);

        let required = required_extensions(windowing_extensions(display_handle)?, enable_validation);
        log::debug!("Required instance extensions: {:?}", required);
        check_required_extensions(&required, &available)?;

        // Step 3: create
        let instance = Self::create_instance(&entry, config, &required, &layers, enable_validation)?;

        let debug_utils = if enable_validation {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok(messenger) => Some(messenger),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        Ok(Arc::new(Self {
            instance,
            entry,
            debug_utils,
        }))
    }

    fn create_instance(
        entry: &Entry,
        config: &Config,
        extensions: &[String],
        layers: &[String],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name = CString::new(config.app.name.as_str())?;
        let engine_name = CString::new(config.app.engine_name.as_str())?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_names = to_cstrings(extensions)?;
        let extension_ptrs = extension_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();
        let layer_names = to_cstrings(layers)?;
        let layer_ptrs = layer_names.iter().map(|n| n.as_ptr()).collect::<Vec<_>>();

        // Covers vkCreateInstance/vkDestroyInstance, which the persistent
        // messenger cannot see.
        let mut debug_info = debug_messenger_create_info();

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        if enable_validation {
            create_info = create_info.push_next(&mut debug_info);
        }

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        log::info!("Vulkan instance created");
        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(entry, instance);
        let create_info = debug_messenger_create_info();

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to set up debug messenger")?;

        log::info!("Debug messenger set up");
        Ok((debug_utils, messenger))
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan instance...");

        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

pub(crate) fn to_cstrings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).with_context(|| format!("Invalid name {:?}", name)))
        .collect()
}

fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT {
    vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback))
        .build()
}

fn message_category(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "performance"
    } else {
        "general"
    }
}

// Never asks the driver to abort the triggering call.
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = if p_callback_data.is_null() || (*p_callback_data).p_message.is_null() {
        Cow::Borrowed("")
    } else {
        CStr::from_ptr((*p_callback_data).p_message).to_string_lossy()
    };
    let category = message_category(message_type);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan {}] {}", category, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan {}] {}", category, message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            log::info!("[Vulkan {}] {}", category, message);
        }
        _ => {
            log::debug!("[Vulkan {}] {}", category, message);
        }
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn layer_check_reports_missing_layers() {
        let report = check_validation_layers(
            &names(&["VK_LAYER_KHRONOS_validation", "VK_LAYER_LUNARG_monitor"]),
            &names(&["VK_LAYER_KHRONOS_validation"]),
        );
        assert!(!report.all_present());
        assert_eq!(report.missing, names(&["VK_LAYER_LUNARG_monitor"]));
    }

    #[test]
    fn layer_check_passes_when_all_present() {
        let report = check_validation_layers(
            &names(&["VK_LAYER_KHRONOS_validation"]),
            &names(&["VK_LAYER_MESA_device_select", "VK_LAYER_KHRONOS_validation"]),
        );
        assert!(report.all_present());
    }

    fn validation(layers: &[&str], strict: bool) -> ValidationConfig {
        ValidationConfig {
            enabled: true,
            layers: names(layers),
            strict,
        }
    }

    #[test]
    fn strict_mode_fails_on_missing_layer() {
        let err = select_layers(
            &validation(&["VK_LAYER_KHRONOS_validation"], true),
            true,
            &names(&["VK_LAYER_MESA_device_select"]),
        )
        .unwrap_err();
        match err {
            SetupError::MissingLayer(name) => assert_eq!(name, "VK_LAYER_KHRONOS_validation"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn advisory_mode_still_requests_missing_layers() {
        let layers = select_layers(
            &validation(&["VK_LAYER_KHRONOS_validation"], false),
            true,
            &names(&["VK_LAYER_MESA_device_select"]),
        )
        .unwrap();
        assert_eq!(layers, names(&["VK_LAYER_KHRONOS_validation"]));
    }

    #[test]
    fn strict_mode_passes_when_layers_present() {
        let layers = select_layers(
            &validation(&["VK_LAYER_KHRONOS_validation"], true),
            true,
            &names(&["VK_LAYER_KHRONOS_validation"]),
        )
        .unwrap();
        assert_eq!(layers, names(&["VK_LAYER_KHRONOS_validation"]));
    }

    #[test]
    fn no_layers_without_diagnostics() {
        let layers = select_layers(&validation(&["VK_LAYER_KHRONOS_validation"], true), false, &[])
            .unwrap();
        assert!(layers.is_empty());
    }

    #[test]
    fn debug_utils_added_only_with_diagnostics() {
        let windowing = names(&["VK_KHR_surface", "VK_KHR_xlib_surface"]);

        let with = required_extensions(windowing.clone(), true);
        assert_eq!(
            with,
            names(&["VK_KHR_surface", "VK_KHR_xlib_surface", "VK_EXT_debug_utils"])
        );

        let without = required_extensions(windowing.clone(), false);
        assert_eq!(without, windowing);
    }

    #[test]
    fn extension_check_fails_on_first_missing() {
        let err = check_required_extensions(
            &names(&["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"]),
            &names(&["VK_KHR_surface", "VK_EXT_debug_utils"]),
        )
        .unwrap_err();
        match err {
            SetupError::MissingExtension(name) => assert_eq!(name, "VK_KHR_xcb_surface"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn extension_check_accepts_superset() {
        check_required_extensions(
            &names(&["VK_KHR_surface", "VK_KHR_wayland_surface"]),
            &names(&["VK_KHR_wayland_surface", "VK_KHR_surface", "VK_KHR_display"]),
        )
        .unwrap();
    }

    #[test]
    fn categories_follow_message_type() {
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION),
            "validation"
        );
        assert_eq!(
            message_category(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE),
            "performance"
        );
        assert_eq!(message_category(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "general");
    }

    #[test]
    fn callback_never_aborts() {
        let message = CString::new("vkCreateDevice: bad things").unwrap();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message: message.as_ptr(),
            ..Default::default()
        };

        for severity in [
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
            vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
        ] {
            let result = unsafe {
                debug_callback(
                    severity,
                    vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                    &data,
                    std::ptr::null_mut(),
                )
            };
            assert_eq!(result, vk::FALSE);
        }

        let result = unsafe {
            debug_callback(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL,
                std::ptr::null(),
                std::ptr::null_mut(),
            )
        };
        assert_eq!(result, vk::FALSE);
    }

    #[test]
    fn names_with_interior_nul_are_rejected() {
        assert!(to_cstrings(&names(&["VK_KHR_surface"])).is_ok());
        assert!(to_cstrings(&["bad\0name".to_string()]).is_err());
    }
}
