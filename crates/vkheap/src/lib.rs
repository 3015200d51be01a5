//! # vkheap
//!
//! Device-memory heaps on top of [Ash](ash).
//!
//! # Usage
//!
//! A [MemoryManager](manager::MemoryManager) is created for a [MemoryBackend](backend::MemoryBackend). For Vulkan that is a
//! [VulkanBackend](backend::VulkanBackend) wrapping an already created [Device](context::Device). The manager creates
//! [MemoryHeap](heap::MemoryHeap)s, each owning exactly one native allocation.
//!
//! Heaps can be mapped from any thread. Mapping is reference counted, so the first [map](heap::MemoryHeap::map) maps
//! natively and the last [unmap](heap::MemoryHeap::unmap) unmaps natively. [map_scoped](heap::MemoryHeap::map_scoped) pairs
//! both automatically.
//!
//! All objects follow the [Disposable](object::Disposable) contract: [dispose](object::Disposable::dispose) tears them down
//! exactly once, dropping them is the fallback. Using a disposed object returns [MemoryError::Disposed].
//!
//! ```ignore
//! let backend = VulkanBackend::new(&device);
//! let manager = MemoryManager::new(&backend, Some("Upload"));
//! let heap = manager.create_heap(65536, memory_type_index, None)?;
//! let ptr = heap.map()?;
//! heap.unmap()?;
//! heap.dispose();
//! ```

pub use ash;

///Native memory calls per graphics backend. Includes the Vulkan implementation.
pub mod backend;

///Device wrapper and debug-utils loader.
pub mod context;

///Debug object naming for GPU debugging tools.
pub mod debug_name;

///Backend independent formats and the mapping to Vulkan formats.
pub mod format;

///The [MemoryHeap](heap::MemoryHeap), one native allocation with reference counted mapping.
pub mod heap;

///Creates and pools heaps per memory type.
pub mod manager;

///Exactly-once disposal and naming shared by all objects.
pub mod object;

mod error;
pub use error::MemoryError;

#[cfg(test)]
mod testing;
