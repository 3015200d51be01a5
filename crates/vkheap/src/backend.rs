//! ## Backends
//!
//! A [MemoryHeap](crate::heap::MemoryHeap) never talks to a driver directly. All native calls go trough a
//! [MemoryBackend], which is picked when the [MemoryManager](crate::manager::MemoryManager) is created.
//!
//! The default implementation is [VulkanBackend], which forwards to an [ash::Device].

use std::{ffi::CStr, fmt::Debug, ptr::NonNull, sync::Arc};

use ash::vk;

use crate::{context::Device, MemoryError};

///Native memory calls of a graphics backend.
pub trait MemoryBackend: Send + Sync + 'static {
    ///Opaque handle of one native allocation.
    type Memory: Copy + Eq + Debug + Send + Sync + 'static;

    ///Allocates `byte_length` bytes from memory type `memory_type_index`.
    fn allocate_memory(
        &self,
        byte_length: u64,
        memory_type_index: u32,
    ) -> Result<Self::Memory, MemoryError>;

    ///Maps the whole allocation into host address space.
    ///
    /// # Safety
    /// `memory` must be a live allocation of this backend that is not currently mapped.
    unsafe fn map_memory(&self, memory: Self::Memory) -> Result<NonNull<u8>, MemoryError>;

    /// # Safety
    /// `memory` must be a live, currently mapped allocation of this backend.
    unsafe fn unmap_memory(&self, memory: Self::Memory);

    ///Frees `memory`. The allocation might still be mapped, freeing has to release the mapping as well.
    ///
    /// # Safety
    /// `memory` must be a live allocation of this backend. It must not be used afterwards.
    unsafe fn free_memory(&self, memory: Self::Memory);

    ///Number of memory types exposed by the device.
    fn memory_type_count(&self) -> u32;

    ///Searches the first memory type that is allowed by `type_bits` and supports all of `properties`.
    fn find_memory_type_index(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32>;

    ///True if debug names should be attached to native objects.
    fn debug_names_enabled(&self) -> bool {
        false
    }

    ///Attaches `name` to `memory` for debugging tools.
    fn set_object_name(&self, _memory: Self::Memory, _name: &CStr) -> Result<(), vk::Result> {
        Ok(())
    }
}

///Vulkan implementation of [MemoryBackend].
pub struct VulkanBackend {
    pub device: Arc<Device>,
}

impl VulkanBackend {
    pub fn new(device: &Arc<Device>) -> Arc<Self> {
        Arc::new(VulkanBackend {
            device: device.clone(),
        })
    }
}

impl MemoryBackend for VulkanBackend {
    type Memory = vk::DeviceMemory;

    fn allocate_memory(
        &self,
        byte_length: u64,
        memory_type_index: u32,
    ) -> Result<Self::Memory, MemoryError> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(byte_length)
            .memory_type_index(memory_type_index);

        unsafe { self.device.inner.allocate_memory(&info, None) }
            .map_err(MemoryError::native("vkAllocateMemory"))
    }

    unsafe fn map_memory(&self, memory: Self::Memory) -> Result<NonNull<u8>, MemoryError> {
        let ptr = unsafe {
            self.device
                .inner
                .map_memory(memory, 0, vk::WHOLE_SIZE, vk::MemoryMapFlags::empty())
        }
        .map_err(MemoryError::native("vkMapMemory"))?;

        //A successful map never returns null, but we don't want to hand out a dangling NonNull if a driver does.
        NonNull::new(ptr as *mut u8).ok_or(MemoryError::Native {
            call: "vkMapMemory",
            status: vk::Result::ERROR_MEMORY_MAP_FAILED,
        })
    }

    unsafe fn unmap_memory(&self, memory: Self::Memory) {
        unsafe { self.device.inner.unmap_memory(memory) }
    }

    unsafe fn free_memory(&self, memory: Self::Memory) {
        unsafe { self.device.inner.free_memory(memory, None) }
    }

    fn memory_type_count(&self) -> u32 {
        self.device.memory_properties.memory_type_count
    }

    fn find_memory_type_index(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        self.device.find_memory_type_index(type_bits, properties)
    }

    fn debug_names_enabled(&self) -> bool {
        self.device.debugger.is_some()
    }

    fn set_object_name(&self, memory: Self::Memory, name: &CStr) -> Result<(), vk::Result> {
        match &self.device.debugger {
            Some(debugger) => debugger.name_object(memory, name),
            None => Ok(()),
        }
    }
}
