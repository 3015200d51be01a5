use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ahash::AHashMap;
use ash::vk;

use crate::{
    backend::MemoryBackend,
    heap::MemoryHeap,
    object::{DeviceObject, Disposable, ObjectState, Teardown},
    MemoryError,
};

type HeapPool<B> = AHashMap<u32, Vec<Arc<MemoryHeap<B>>>>;

///Creates [MemoryHeap]s on demand and keeps them pooled by memory type index.
///
/// Heaps only hold a weak back-reference to their manager. Disposing the manager disposes every pooled heap,
/// dropping it only releases the pool.
pub struct MemoryManager<B: MemoryBackend> {
    state: ObjectState,
    backend: Arc<B>,
    this: Weak<Self>,
    heaps: Mutex<HeapPool<B>>,
}

impl<B: MemoryBackend> MemoryManager<B> {
    pub fn new(backend: &Arc<B>, name: Option<&str>) -> Arc<Self> {
        Arc::new_cyclic(|this| MemoryManager {
            state: ObjectState::new::<Self>(name),
            backend: backend.clone(),
            this: this.clone(),
            heaps: Mutex::new(AHashMap::default()),
        })
    }

    fn lock_heaps(&self) -> MutexGuard<'_, HeapPool<B>> {
        self.heaps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    ///Allocates a new heap of `byte_length` bytes on memory type `memory_type_index` and adds it to the pool.
    ///
    /// If the manager is disposed while the allocation is in flight, the new heap is disposed again and
    /// [MemoryError::Disposed] is returned.
    pub fn create_heap(
        &self,
        byte_length: u64,
        memory_type_index: u32,
        name: Option<&str>,
    ) -> Result<Arc<MemoryHeap<B>>, MemoryError> {
        self.state.ensure_not_disposed()?;

        let count = self.backend.memory_type_count();
        if memory_type_index >= count {
            return Err(MemoryError::InvalidMemoryType {
                index: memory_type_index,
                count,
            });
        }

        let heap = Arc::new(MemoryHeap::new(
            &self.backend,
            self.this.clone(),
            byte_length,
            memory_type_index,
            name,
        )?);

        //Teardown sets the flag before it takes the pool, so checking under the pool lock can't miss it.
        let pooled = {
            let mut heaps = self.lock_heaps();
            if !self.state.is_disposed() {
                heaps.entry(memory_type_index).or_default().push(heap.clone());
                true
            } else {
                false
            }
        };
        if !pooled {
            #[cfg(feature = "logging")]
            log::warn!(
                "{}: disposed while creating heap {}, releasing it",
                self.state.name(),
                heap.name()
            );
            heap.dispose();
            return Err(MemoryError::Disposed {
                name: self.state.name(),
            });
        }

        #[cfg(feature = "logging")]
        log::debug!(
            "{}: created heap {} ({} bytes, type {})",
            self.state.name(),
            heap.name(),
            byte_length,
            memory_type_index
        );

        Ok(heap)
    }

    ///Like [create_heap](Self::create_heap), but picks the first memory type allowed by `type_bits` that supports `properties`.
    pub fn create_heap_for(
        &self,
        byte_length: u64,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
        name: Option<&str>,
    ) -> Result<Arc<MemoryHeap<B>>, MemoryError> {
        self.state.ensure_not_disposed()?;
        let index = self
            .backend
            .find_memory_type_index(type_bits, properties)
            .ok_or(MemoryError::NoSuitableMemoryType {
                type_bits,
                properties,
            })?;
        self.create_heap(byte_length, index, name)
    }

    ///All pooled heaps of memory type `memory_type_index`.
    pub fn heaps(&self, memory_type_index: u32) -> Vec<Arc<MemoryHeap<B>>> {
        self.lock_heaps()
            .get(&memory_type_index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn heap_count(&self) -> usize {
        self.lock_heaps().values().map(Vec::len).sum()
    }

    ///Sum of the byte lengths of all pooled heaps.
    pub fn allocated_bytes(&self) -> u64 {
        self.lock_heaps()
            .values()
            .flatten()
            .map(|heap| heap.byte_length())
            .sum()
    }

    ///Removes `heap` from the pool. Called by the heap when it is disposed.
    pub(crate) fn forget_heap(&self, heap: &MemoryHeap<B>) {
        //Dropped after the lock is released.
        let removed = {
            let mut heaps = self.lock_heaps();
            let Some(pool) = heaps.get_mut(&heap.memory_type_index()) else {
                return;
            };
            let position = pool.iter().position(|h| std::ptr::eq(Arc::as_ptr(h), heap));
            let removed = position.map(|i| pool.swap_remove(i));
            if pool.is_empty() {
                heaps.remove(&heap.memory_type_index());
            }
            removed
        };
        drop(removed);
    }
}

impl<B: MemoryBackend> Disposable for MemoryManager<B> {
    fn object_state(&self) -> &ObjectState {
        &self.state
    }

    fn teardown(&self, mode: Teardown) {
        let heaps = std::mem::take(&mut *self.lock_heaps());
        if mode == Teardown::Dispose {
            #[cfg(feature = "logging")]
            log::debug!(
                "{}: disposing {} heaps",
                self.state.name(),
                heaps.values().map(Vec::len).sum::<usize>()
            );
            for heap in heaps.values().flatten() {
                heap.dispose();
            }
        }
    }
}

impl<B: MemoryBackend> std::fmt::Debug for MemoryManager<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("name", &self.state.name())
            .field("heap_count", &self.heap_count())
            .field("disposed", &self.state.is_disposed())
            .finish()
    }
}

impl<B: MemoryBackend> DeviceObject for MemoryManager<B> {
    type Backend = B;
    fn backend(&self) -> &Arc<B> {
        &self.backend
    }
}

impl<B: MemoryBackend> Drop for MemoryManager<B> {
    fn drop(&mut self) {
        self.finalize();
    }
}
