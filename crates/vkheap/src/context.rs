//! ## Context
//!
//! When working with Vulkan the [Device](ash::Device) is entry point for most of the operations.
//! Heaps need it to allocate, map and free memory, and to know which memory types exist.
//!
//! Creating the instance and device is not part of this crate. An already created [ash::Device] is wrapped into a
//! [Device], which also carries the physical device's memory properties and, if validation is active, a [Debugger]
//! for naming native objects.

mod debugger;
pub use debugger::Debugger;

mod device;
pub use device::{find_memory_type_index, Device};
