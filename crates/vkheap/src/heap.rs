//! ## Memory heaps
//!
//! A [MemoryHeap] owns exactly one native device-memory allocation. Heaps are created by a
//! [MemoryManager](crate::manager::MemoryManager) and never outlive their backend.
//!
//! Host mapping is reference counted. Only the first [map](MemoryHeap::map) issues a native map call, every later call
//! returns the cached pointer. Only the [unmap](MemoryHeap::unmap) that balances the last map issues the native unmap.
//! Map and unmap on one heap are serialised by a mutex owned by that heap, so independent heaps never contend.
//!
//! Disposing a heap frees the allocation even if it is still mapped. Freeing device memory invalidates its mapping, so
//! no native unmap is issued in that case. Callers should still unmap first, or use [map_scoped](MemoryHeap::map_scoped).

use std::{
    ptr::{self, NonNull},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use crate::{
    backend::MemoryBackend,
    debug_name,
    manager::MemoryManager,
    object::{DeviceObject, Disposable, ObjectState, Teardown},
    MemoryError,
};

///Component string appended to a heap's debug name.
pub const HEAP_NAME_COMPONENT: &str = "DeviceMemory";

struct MappingState<M> {
    ///`None` once the heap was disposed.
    memory: Option<M>,
    ///Null iff `count == 0`.
    address: *mut u8,
    count: usize,
}

//Safety: the address is only handed out, never dereferenced by the heap itself. Access is guarded by the heap's mutex.
unsafe impl<M: Send> Send for MappingState<M> {}

///One native device-memory allocation with reference counted host mapping.
pub struct MemoryHeap<B: MemoryBackend> {
    state: ObjectState,
    backend: Arc<B>,
    manager: Weak<MemoryManager<B>>,
    byte_length: u64,
    memory_type_index: u32,
    mapping: Mutex<MappingState<B::Memory>>,
}

impl<B: MemoryBackend> MemoryHeap<B> {
    ///Allocates `byte_length` bytes of memory type `memory_type_index`. If the native allocation fails no heap is created.
    pub(crate) fn new(
        backend: &Arc<B>,
        manager: Weak<MemoryManager<B>>,
        byte_length: u64,
        memory_type_index: u32,
        name: Option<&str>,
    ) -> Result<Self, MemoryError> {
        let memory = backend.allocate_memory(byte_length, memory_type_index)?;

        let heap = MemoryHeap {
            state: ObjectState::new::<Self>(name),
            backend: backend.clone(),
            manager,
            byte_length,
            memory_type_index,
            mapping: Mutex::new(MappingState {
                memory: Some(memory),
                address: ptr::null_mut(),
                count: 0,
            }),
        };

        debug_name::name_object(
            heap.backend.as_ref(),
            memory,
            &heap.state.name(),
            Some(HEAP_NAME_COMPONENT),
        );

        #[cfg(feature = "logging")]
        log::trace!(
            "Allocated heap {:?} of {} bytes on memory type {}",
            memory,
            byte_length,
            memory_type_index
        );

        Ok(heap)
    }

    //The mapping state is only changed after native calls returned, so a poisoned lock still holds consistent data.
    fn lock_mapping(&self) -> MutexGuard<'_, MappingState<B::Memory>> {
        self.mapping.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn disposed_error(&self) -> MemoryError {
        MemoryError::Disposed {
            name: self.state.name(),
        }
    }

    ///Maps the heap into host memory and returns the base address. Maps natively only if the heap is not mapped yet.
    pub fn map(&self) -> Result<NonNull<u8>, MemoryError> {
        self.state.ensure_not_disposed()?;
        let mut mapping = self.lock_mapping();
        let Some(memory) = mapping.memory else {
            return Err(self.disposed_error());
        };

        if mapping.count == 0 {
            let address = unsafe { self.backend.map_memory(memory) }.map_err(|e| {
                #[cfg(feature = "logging")]
                log::error!("Mapping heap {} failed: {}", self.state.name(), e);
                e
            })?;
            mapping.address = address.as_ptr();
        }

        let address = NonNull::new(mapping.address).ok_or_else(|| MemoryError::InvalidState {
            name: self.state.name(),
            reason: "mapped address is null",
        })?;
        mapping.count += 1;
        Ok(address)
    }

    ///Releases one mapping reference. The heap is unmapped natively once the last reference is released.
    ///
    /// Unmapping a heap that is not mapped is a bug in the caller and returns [MemoryError::InvalidState].
    pub fn unmap(&self) -> Result<(), MemoryError> {
        self.state.ensure_not_disposed()?;
        let mut mapping = self.lock_mapping();
        let Some(memory) = mapping.memory else {
            return Err(self.disposed_error());
        };

        if mapping.count == 0 {
            #[cfg(feature = "logging")]
            log::error!("Unmapped heap {} which is not mapped", self.state.name());
            return Err(MemoryError::InvalidState {
                name: self.state.name(),
                reason: "not mapped",
            });
        }

        mapping.count -= 1;
        if mapping.count == 0 {
            unsafe { self.backend.unmap_memory(memory) };
            mapping.address = ptr::null_mut();
        }
        Ok(())
    }

    ///Maps the heap for the lifetime of the returned guard.
    ///
    /// Fails with [MemoryError::OutOfBounds] if the heap is larger than the host address space.
    pub fn map_scoped(&self) -> Result<HeapMapping<'_, B>, MemoryError> {
        let len = usize::try_from(self.byte_length).map_err(|_| MemoryError::OutOfBounds {
            offset: 0,
            len: self.byte_length,
            byte_length: self.byte_length,
        })?;
        let ptr = self.map()?;
        Ok(HeapMapping {
            heap: self,
            ptr,
            len,
        })
    }

    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    pub fn memory_type_index(&self) -> u32 {
        self.memory_type_index
    }

    pub fn is_mapped(&self) -> bool {
        self.lock_mapping().count > 0
    }

    pub fn mapped_count(&self) -> usize {
        self.lock_mapping().count
    }

    ///The host address of the mapping, if the heap is currently mapped.
    pub fn mapped_address(&self) -> Option<NonNull<u8>> {
        NonNull::new(self.lock_mapping().address)
    }

    ///The native handle. `None` after the heap was disposed.
    pub fn raw_memory(&self) -> Option<B::Memory> {
        self.lock_mapping().memory
    }
}

impl<B: MemoryBackend> Disposable for MemoryHeap<B> {
    fn object_state(&self) -> &ObjectState {
        &self.state
    }

    fn teardown(&self, mode: Teardown) {
        let memory = {
            let mut mapping = self.lock_mapping();
            mapping.address = ptr::null_mut();
            mapping.count = 0;
            mapping.memory.take()
        };

        if let Some(memory) = memory {
            unsafe { self.backend.free_memory(memory) };
            #[cfg(feature = "logging")]
            log::trace!("Freed heap {:?} ({:?})", memory, mode);
        }

        if mode == Teardown::Dispose {
            if let Some(manager) = self.manager.upgrade() {
                manager.forget_heap(self);
            }
        }
    }

    fn on_name_changed(&self, name: &str) {
        self.state.assert_not_disposed();
        if let Some(memory) = self.raw_memory() {
            debug_name::name_object(
                self.backend.as_ref(),
                memory,
                name,
                Some(HEAP_NAME_COMPONENT),
            );
        }
    }
}

impl<B: MemoryBackend> std::fmt::Debug for MemoryHeap<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mapping = self.lock_mapping();
        f.debug_struct("MemoryHeap")
            .field("name", &self.state.name())
            .field("memory", &mapping.memory)
            .field("byte_length", &self.byte_length)
            .field("memory_type_index", &self.memory_type_index)
            .field("mapped_count", &mapping.count)
            .finish()
    }
}

impl<B: MemoryBackend> DeviceObject for MemoryHeap<B> {
    type Backend = B;
    fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: MemoryBackend> Drop for MemoryHeap<B> {
    fn drop(&mut self) {
        self.finalize();
    }
}

///Host mapping of a [MemoryHeap] that is released when dropped.
pub struct HeapMapping<'a, B: MemoryBackend> {
    heap: &'a MemoryHeap<B>,
    ptr: NonNull<u8>,
    ///`byte_length` of the heap, checked to fit the address space.
    len: usize,
}

impl<'a, B: MemoryBackend> HeapMapping<'a, B> {
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub fn heap(&self) -> &'a MemoryHeap<B> {
        self.heap
    }

    ///The whole mapped heap.
    ///
    /// # Safety
    /// The heap must not be disposed while the slice is alive, and the device must not write the memory concurrently.
    pub unsafe fn as_slice(&self) -> &[u8] {
        self.heap.state.assert_not_disposed();
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    ///Mutable view of the whole mapped heap.
    ///
    /// # Safety
    /// Same as [as_slice](Self::as_slice). Additionally no other mapping of the heap may access the memory concurrently.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        self.heap.state.assert_not_disposed();
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    ///Copies `data` into the heap at `offset`. Nothing is written if the range does not fit.
    ///
    /// # Safety
    /// Same as [as_mut_slice](Self::as_mut_slice).
    pub unsafe fn write(&mut self, offset: u64, data: &[u8]) -> Result<(), MemoryError> {
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| Some(start..start.checked_add(data.len())?))
            .filter(|range| range.end <= self.len);
        let Some(range) = range else {
            return Err(MemoryError::OutOfBounds {
                offset,
                len: data.len() as u64,
                byte_length: self.heap.byte_length,
            });
        };

        let slice = unsafe { self.as_mut_slice() };
        slice[range].copy_from_slice(data);
        Ok(())
    }
}

impl<'a, B: MemoryBackend> Drop for HeapMapping<'a, B> {
    fn drop(&mut self) {
        //Fails if the heap was disposed in between. The mapping is gone in that case anyways.
        if let Err(e) = self.heap.unmap() {
            #[cfg(feature = "logging")]
            log::warn!("Releasing scoped mapping failed: {}", e);
            #[cfg(not(feature = "logging"))]
            let _ = e;
        }
    }
}
