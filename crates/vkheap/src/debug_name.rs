//! Debug object naming.
//!
//! Names show up in tools like RenderDoc or in validation messages. They have no functional effect,
//! so failing to set one is logged and otherwise ignored.

use std::ffi::CString;

use crate::backend::MemoryBackend;

///Formats `name` and the optional `component` as `"{name}: {component}"`. Interior NUL bytes are dropped.
pub fn format_object_name(name: &str, component: Option<&str>) -> CString {
    let formatted = match component {
        Some(component) => format!("{name}: {component}"),
        None => name.to_owned(),
    };
    let mut bytes = formatted.into_bytes();
    bytes.retain(|b| *b != 0);
    //no NUL bytes left, so this can't fail.
    CString::new(bytes).unwrap_or_default()
}

///Attaches a debug name to `memory`. Does nothing if the `debug_marker` feature is disabled or if `backend` has
/// debug naming turned off.
#[allow(unused_variables)]
pub fn name_object<B: MemoryBackend>(
    backend: &B,
    memory: B::Memory,
    name: &str,
    component: Option<&str>,
) {
    #[cfg(feature = "debug_marker")]
    {
        if !backend.debug_names_enabled() {
            return;
        }

        let cname = format_object_name(name, component);
        if let Err(e) = backend.set_object_name(memory, &cname) {
            #[cfg(feature = "logging")]
            log::warn!("Failed to set debug name {:?} on {:?}: {}", cname, memory, e);
        }
    }
}
