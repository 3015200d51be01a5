use ash::vk;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("{name} was used after it has been disposed")]
    Disposed { name: String },
    #[error("Native call {call} failed with {status}")]
    Native {
        call: &'static str,
        #[source]
        status: vk::Result,
    },
    #[error("Invalid state on {name}: {reason}")]
    InvalidState { name: String, reason: &'static str },
    #[error("Memory type index {index} out of range, device exposes {count} memory types")]
    InvalidMemoryType { index: u32, count: u32 },
    #[error("No memory type in {type_bits:#b} supports {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    },
    #[error("Range {offset}..{offset}+{len} exceeds heap of {byte_length} bytes")]
    OutOfBounds {
        offset: u64,
        len: u64,
        byte_length: u64,
    },
}

impl MemoryError {
    ///Returns a mapper that wraps a failed native `call`'s status code.
    pub fn native(call: &'static str) -> impl FnOnce(vk::Result) -> MemoryError {
        move |status| MemoryError::Native { call, status }
    }

    ///True if this error is the result of using a disposed object.
    pub fn is_disposed(&self) -> bool {
        matches!(self, MemoryError::Disposed { .. })
    }
}

#[cfg(test)]
mod test {
    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn assure_send_sync() {
        assert_impl_all!(MemoryError: Send, Sync);
    }

    #[test]
    fn native_error_names_the_call() {
        let err = MemoryError::native("vkMapMemory")(vk::Result::ERROR_MEMORY_MAP_FAILED);
        let msg = err.to_string();
        assert!(msg.contains("vkMapMemory"));
        assert!(matches!(
            err,
            MemoryError::Native {
                status: vk::Result::ERROR_MEMORY_MAP_FAILED,
                ..
            }
        ));
        assert!(!err.is_disposed());
    }
}
