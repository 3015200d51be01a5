//! ## Object lifetimes
//!
//! Every object that owns native state carries an [ObjectState]. It holds the object's debug name and a
//! one-way "disposed" flag. The [Disposable] trait builds the public lifetime contract on top of it:
//!
//! - [dispose](Disposable::dispose) tears the object down at most once, no matter how many threads call it.
//! - [Drop] implementations call [finalize](Disposable::finalize), which shares the same flag. So if the object was
//!   never disposed explicitly, dropping it still releases the native state, but never twice.
//! - After disposal every mutating call fails with [MemoryError::Disposed].
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, PoisonError, RwLock,
};

use crate::MemoryError;

///Path on which an object's teardown is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    ///Explicit [dispose](Disposable::dispose) call. Other managed objects may still be touched.
    Dispose,
    ///Called from [Drop]. Only the object's own native state may be released.
    Drop,
}

///Returns the type's name without its module path or generic arguments. `vkheap::heap::MemoryHeap<B>` becomes `MemoryHeap`.
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

///Disposed flag and debug name shared by all disposable objects.
#[derive(Debug)]
pub struct ObjectState {
    disposed: AtomicBool,
    name: RwLock<String>,
    default_name: &'static str,
}

impl ObjectState {
    ///Creates the state for an object of type `T`. If no `name` is given, the short type name is used.
    pub fn new<T: ?Sized>(name: Option<&str>) -> Self {
        let default_name = short_type_name::<T>();
        ObjectState {
            disposed: AtomicBool::new(false),
            name: RwLock::new(name.unwrap_or(default_name).to_owned()),
            default_name,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    ///Flips the disposed flag. Returns true for exactly one caller over the object's lifetime.
    pub fn try_begin_dispose(&self) -> bool {
        self.disposed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn name(&self) -> String {
        self.name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn default_name(&self) -> &'static str {
        self.default_name
    }

    ///Stores `name`, or the default name if `None`, and returns the stored value.
    pub fn store_name(&self, name: Option<&str>) -> String {
        let name = name.unwrap_or(self.default_name).to_owned();
        *self.name.write().unwrap_or_else(PoisonError::into_inner) = name.clone();
        name
    }

    ///Debug-only check. Panics on debug builds if the object was disposed, does nothing on release builds.
    #[track_caller]
    pub fn assert_not_disposed(&self) {
        debug_assert!(
            !self.is_disposed(),
            "{} used after it has been disposed",
            self.name()
        );
    }

    ///Runtime check usable on every public entry point.
    pub fn ensure_not_disposed(&self) -> Result<(), MemoryError> {
        if self.is_disposed() {
            Err(MemoryError::Disposed { name: self.name() })
        } else {
            Ok(())
        }
    }
}

///Uniform lifetime contract of all objects that own native state.
pub trait Disposable {
    fn object_state(&self) -> &ObjectState;

    ///Releases the object's state. Is called at most once, either through [dispose](Disposable::dispose) or
    /// [finalize](Disposable::finalize).
    fn teardown(&self, mode: Teardown);

    ///Called after the name was changed. Lets the implementor propagate the name to its native object.
    fn on_name_changed(&self, _name: &str) {}

    ///Tears the object down. Only the first call does anything, later or concurrent calls return immediately.
    fn dispose(&self) {
        if self.object_state().try_begin_dispose() {
            self.teardown(Teardown::Dispose);
        }
    }

    ///Fallback teardown used by [Drop] implementations.
    fn finalize(&self) {
        if self.object_state().try_begin_dispose() {
            self.teardown(Teardown::Drop);
        }
    }

    fn is_disposed(&self) -> bool {
        self.object_state().is_disposed()
    }

    fn name(&self) -> String {
        self.object_state().name()
    }

    ///Renames the object. `None` resets the name to the type's name.
    fn set_name(&self, name: Option<&str>) -> Result<(), MemoryError> {
        self.object_state().ensure_not_disposed()?;
        let name = self.object_state().store_name(name);
        self.on_name_changed(&name);
        Ok(())
    }

    fn ensure_not_disposed(&self) -> Result<(), MemoryError> {
        self.object_state().ensure_not_disposed()
    }
}

///An object created by, and bound to, a backend device. The object only holds a back-reference and never destroys the device.
pub trait DeviceObject {
    type Backend;
    fn backend(&self) -> &Arc<Self::Backend>;
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicUsize, Mutex};

    use super::*;

    struct Tracked {
        state: ObjectState,
        teardowns: Arc<Mutex<Vec<Teardown>>>,
        renamed: AtomicUsize,
    }

    impl Tracked {
        fn new(name: Option<&str>) -> (Self, Arc<Mutex<Vec<Teardown>>>) {
            let teardowns = Arc::new(Mutex::new(Vec::new()));
            (
                Tracked {
                    state: ObjectState::new::<Tracked>(name),
                    teardowns: teardowns.clone(),
                    renamed: AtomicUsize::new(0),
                },
                teardowns,
            )
        }
    }

    impl Disposable for Tracked {
        fn object_state(&self) -> &ObjectState {
            &self.state
        }
        fn teardown(&self, mode: Teardown) {
            self.teardowns.lock().unwrap().push(mode);
        }
        fn on_name_changed(&self, _name: &str) {
            self.renamed.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.finalize();
        }
    }

    #[test]
    fn type_name_is_shortened() {
        assert_eq!(short_type_name::<Tracked>(), "Tracked");
        assert_eq!(short_type_name::<Vec<u8>>(), "Vec");
    }

    #[test]
    fn dispose_runs_once() {
        let (tracked, teardowns) = Tracked::new(None);
        tracked.dispose();
        tracked.dispose();
        assert!(tracked.is_disposed());
        drop(tracked);
        assert_eq!(*teardowns.lock().unwrap(), vec![Teardown::Dispose]);
    }

    #[test]
    fn drop_falls_back_to_finalizer() {
        let (tracked, teardowns) = Tracked::new(None);
        drop(tracked);
        assert_eq!(*teardowns.lock().unwrap(), vec![Teardown::Drop]);
    }

    #[test]
    fn concurrent_dispose_runs_once() {
        let (tracked, teardowns) = Tracked::new(None);
        std::thread::scope(|s| {
            for _ in 0..16 {
                s.spawn(|| tracked.dispose());
            }
        });
        drop(tracked);
        assert_eq!(teardowns.lock().unwrap().len(), 1);
    }

    #[test]
    fn name_defaults_to_type() {
        let (tracked, _) = Tracked::new(None);
        assert_eq!(tracked.name(), "Tracked");
        assert_eq!(tracked.object_state().default_name(), "Tracked");
        tracked.set_name(Some("staging")).unwrap();
        assert_eq!(tracked.name(), "staging");
        tracked.set_name(None).unwrap();
        assert_eq!(tracked.name(), "Tracked");
        assert_eq!(tracked.renamed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rename_after_dispose_fails() {
        let (tracked, _) = Tracked::new(Some("upload"));
        tracked.dispose();
        let err = tracked.set_name(Some("other")).unwrap_err();
        assert!(err.is_disposed());
        assert_eq!(tracked.name(), "upload");
        assert_eq!(tracked.renamed.load(Ordering::SeqCst), 0);
        assert!(tracked.ensure_not_disposed().is_err());
    }

    #[test]
    fn live_object_passes_assertion() {
        let (tracked, _) = Tracked::new(None);
        tracked.object_state().assert_not_disposed();
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "worker used after it has been disposed")]
    fn disposed_object_fails_assertion() {
        let (tracked, _) = Tracked::new(Some("worker"));
        tracked.dispose();
        tracked.object_state().assert_not_disposed();
    }
}
