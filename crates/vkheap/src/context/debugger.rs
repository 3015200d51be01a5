use std::ffi::CStr;

use ash::vk::{self, Handle};

///Helper that gets usually initialised when validation is active.
/// Allows to use the `VK_EXT_DEBUG_UTILS` object naming functions.
pub struct Debugger {
    pub debug_utils: ash::ext::debug_utils::Device,
}

impl Debugger {
    pub fn new(instance: &ash::Instance, device: &ash::Device) -> Self {
        Debugger {
            debug_utils: ash::ext::debug_utils::Device::new(instance, device),
        }
    }

    pub fn name_object<H: Handle>(&self, handle: H, name: &CStr) -> Result<(), vk::Result> {
        let info = vk::DebugUtilsObjectNameInfoEXT::default()
            .object_name(name)
            .object_handle(handle);
        unsafe { self.debug_utils.set_debug_utils_object_name(&info) }
    }
}
