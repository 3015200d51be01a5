//! Recording backend used by the unit tests. Backs every allocation with host memory and counts native calls.

use std::{
    ffi::CStr,
    ptr::NonNull,
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender},
        Mutex,
    },
};

use ahash::AHashMap;
use ash::vk;

use crate::{backend::MemoryBackend, context::find_memory_type_index, MemoryError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub allocate: usize,
    pub map: usize,
    pub unmap: usize,
    pub free: usize,
    pub name: usize,
}

pub struct RecordingBackend {
    next_handle: AtomicU64,
    allocate: AtomicUsize,
    map: AtomicUsize,
    unmap: AtomicUsize,
    free: AtomicUsize,
    name: AtomicUsize,
    live: Mutex<AHashMap<u64, Box<[u8]>>>,
    names: Mutex<Vec<(u64, String)>>,
    fail_allocate: Mutex<Option<vk::Result>>,
    fail_map: Mutex<Option<vk::Result>>,
    fail_naming: Mutex<Option<vk::Result>>,
    ///Blocks the next allocation. Signals the first sender once entered, waits on the receiver.
    gate: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    debug_names: bool,
    properties: vk::PhysicalDeviceMemoryProperties,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        let types = [
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_CACHED,
        ];
        properties.memory_type_count = types.len() as u32;
        for (i, flags) in types.into_iter().enumerate() {
            properties.memory_types[i].property_flags = flags;
        }

        RecordingBackend {
            next_handle: AtomicU64::new(1),
            allocate: AtomicUsize::new(0),
            map: AtomicUsize::new(0),
            unmap: AtomicUsize::new(0),
            free: AtomicUsize::new(0),
            name: AtomicUsize::new(0),
            live: Mutex::new(AHashMap::default()),
            names: Mutex::new(Vec::new()),
            fail_allocate: Mutex::new(None),
            fail_map: Mutex::new(None),
            fail_naming: Mutex::new(None),
            gate: Mutex::new(None),
            debug_names: false,
            properties,
        }
    }
}

impl RecordingBackend {
    pub fn with_debug_names(mut self) -> Self {
        self.debug_names = true;
        self
    }

    pub fn fail_allocation(&self, status: vk::Result) {
        *self.fail_allocate.lock().unwrap() = Some(status);
    }

    pub fn fail_mapping(&self, status: Option<vk::Result>) {
        *self.fail_map.lock().unwrap() = status;
    }

    pub fn fail_naming(&self, status: vk::Result) {
        *self.fail_naming.lock().unwrap() = Some(status);
    }

    ///Makes the next allocation block. The returned receiver fires once the allocation started,
    /// sending on the returned sender lets it complete.
    pub fn gate_allocation(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some((entered_tx, release_rx));
        (entered_rx, release_tx)
    }

    pub fn counts(&self) -> CallCounts {
        CallCounts {
            allocate: self.allocate.load(Ordering::SeqCst),
            map: self.map.load(Ordering::SeqCst),
            unmap: self.unmap.load(Ordering::SeqCst),
            free: self.free.load(Ordering::SeqCst),
            name: self.name.load(Ordering::SeqCst),
        }
    }

    pub fn names(&self) -> Vec<(u64, String)> {
        self.names.lock().unwrap().clone()
    }

    pub fn live_allocations(&self) -> usize {
        self.live.lock().unwrap().len()
    }
}

impl MemoryBackend for RecordingBackend {
    type Memory = u64;

    fn allocate_memory(&self, byte_length: u64, _memory_type_index: u32) -> Result<u64, MemoryError> {
        self.allocate.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().take();
        if let Some((entered, release)) = gate {
            entered.send(()).unwrap();
            release.recv().unwrap();
        }
        if let Some(status) = *self.fail_allocate.lock().unwrap() {
            return Err(MemoryError::native("vkAllocateMemory")(status));
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.live
            .lock()
            .unwrap()
            .insert(handle, vec![0u8; byte_length as usize].into_boxed_slice());
        Ok(handle)
    }

    unsafe fn map_memory(&self, memory: u64) -> Result<NonNull<u8>, MemoryError> {
        self.map.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.fail_map.lock().unwrap() {
            return Err(MemoryError::native("vkMapMemory")(status));
        }

        let mut live = self.live.lock().unwrap();
        let block = live
            .get_mut(&memory)
            .unwrap_or_else(|| panic!("mapped unknown allocation {memory}"));
        Ok(NonNull::new(block.as_mut_ptr()).unwrap())
    }

    unsafe fn unmap_memory(&self, memory: u64) {
        assert!(self.live.lock().unwrap().contains_key(&memory));
        self.unmap.fetch_add(1, Ordering::SeqCst);
    }

    unsafe fn free_memory(&self, memory: u64) {
        self.free.fetch_add(1, Ordering::SeqCst);
        assert!(
            self.live.lock().unwrap().remove(&memory).is_some(),
            "allocation {memory} freed twice"
        );
    }

    fn memory_type_count(&self) -> u32 {
        self.properties.memory_type_count
    }

    fn find_memory_type_index(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        find_memory_type_index(&self.properties, type_bits, properties)
    }

    fn debug_names_enabled(&self) -> bool {
        self.debug_names
    }

    fn set_object_name(&self, memory: u64, name: &CStr) -> Result<(), vk::Result> {
        self.name.fetch_add(1, Ordering::SeqCst);
        if let Some(status) = *self.fail_naming.lock().unwrap() {
            return Err(status);
        }
        self.names
            .lock()
            .unwrap()
            .push((memory, name.to_string_lossy().into_owned()));
        Ok(())
    }
}
