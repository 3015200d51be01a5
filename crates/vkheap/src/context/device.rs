use std::sync::Arc;

use ash::vk;

use super::Debugger;

///Searches `properties` for the first memory type that is allowed by `type_bits` and supports all of `flags`.
///
/// `type_bits` is usually [vk::MemoryRequirements::memory_type_bits].
pub fn find_memory_type_index(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    flags: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = properties
        .memory_type_count
        .min(vk::MAX_MEMORY_TYPES as u32);
    (0..count).find(|&index| {
        (type_bits & (1 << index)) != 0
            && properties.memory_types[index as usize]
                .property_flags
                .contains(flags)
    })
}

///Thin device abstraction around an already created [ash::Device]. Takes care of device destruction once its dropped.
///
/// Device and instance creation are not handled here, use ash or any other helper for that.
///
/// # Safety and self creation
/// Since the struct is completely public it is possible to create a device "on your own". In that case you'll have to make sure
/// that `memory_properties` belong to `physical_device`, and that `inner` was created from it.
pub struct Device {
    ///The raw ash device
    pub inner: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    ///Memory types and heaps of `physical_device`, queried once at creation.
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    ///Debug-utils loader. `None` disables debug object naming.
    pub debugger: Option<Debugger>,
}

impl Device {
    ///Wraps `device`, which was created for `physical_device` on `instance`. If `with_debugger` is set, loads the debug-utils
    /// functions so native objects can be named.
    ///
    /// # Safety
    /// `device` must have been created from `physical_device` on `instance`. The returned [Device] takes ownership and destroys it
    /// on drop. If `with_debugger` is set, `VK_EXT_debug_utils` must be enabled on `instance`.
    pub unsafe fn from_raw(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
        with_debugger: bool,
    ) -> Arc<Self> {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let debugger = if with_debugger {
            Some(Debugger::new(instance, &device))
        } else {
            None
        };

        #[cfg(feature = "logging")]
        log::debug!(
            "Wrapped device with {} memory types, debugger={}",
            memory_properties.memory_type_count,
            debugger.is_some()
        );

        Arc::new(Device {
            inner: device,
            physical_device,
            memory_properties,
            debugger,
        })
    }

    ///See [find_memory_type_index].
    pub fn find_memory_type_index(
        &self,
        type_bits: u32,
        flags: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        find_memory_type_index(&self.memory_properties, type_bits, flags)
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        unsafe { self.inner.destroy_device(None) };
    }
}
