// Backend module - Vulkan abstraction layer
//
// Design: one scoped wrapper per handle type. Children hold an Arc to the
// parent they must not outlive, so teardown runs in reverse creation order
// without being sequenced by hand.

pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;

pub use device::Device;
pub use instance::Instance;
pub use pipeline::{Framebuffers, GraphicsPipeline, RenderPass};
pub use surface::Surface;
pub use swapchain::Swapchain;

use std::ffi::c_char;

/// Read a fixed-size, NUL-terminated name field (layer, extension, device).
pub(crate) fn vk_name(raw: &[c_char]) -> String {
    // Fixed-size fields are NUL-terminated by the driver, but don't trust it.
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn vk_name_stops_at_nul() {
        let mut raw = [0 as c_char; 16];
        for (slot, byte) in raw.iter_mut().zip(b"VK_KHR_surface") {
            *slot = *byte as c_char;
        }
        assert_eq!(vk_name(&raw), "VK_KHR_surface");
    }

    #[test]
    fn vk_name_handles_unterminated_field() {
        let raw = [b'a' as c_char; 4];
        assert_eq!(vk_name(&raw), "aaaa");
    }

    #[test]
    fn vk_name_matches_cstr_reading() {
        let mut raw = [0 as c_char; 8];
        raw[0] = b'g' as c_char;
        raw[1] = b'p' as c_char;
        raw[2] = b'u' as c_char;
        let via_cstr = unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy();
        assert_eq!(vk_name(&raw), via_cstr);
    }
}
