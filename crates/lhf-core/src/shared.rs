//! Shared handles to child forests.
//!
//! A nested forest holds one handle per child position, and the same handle
//! may appear at several positions. The default build is single-threaded and
//! wraps children in `Rc<RefCell<_>>`; with the `concurrent` feature the
//! handle becomes `Arc<parking_lot::RwLock<_>>`, so read-only entry points
//! take the shared lock and mutating calls the exclusive lock, and distinct
//! instances can progress in parallel.
//!
//! Child handles are acquired one at a time in declaration order, and forest
//! edges always point parent to child, so acquisition order is cycle-free.

#[cfg(not(feature = "concurrent"))]
mod imp {
    use std::cell::{Ref, RefCell, RefMut};
    use std::rc::Rc;

    /// Single-threaded shared handle.
    #[derive(Debug)]
    pub struct Shared<T> {
        inner: Rc<RefCell<T>>,
    }

    impl<T> Shared<T> {
        pub fn new(value: T) -> Self {
            Self {
                inner: Rc::new(RefCell::new(value)),
            }
        }

        /// Shared (read-only) access.
        pub fn read(&self) -> Ref<'_, T> {
            self.inner.borrow()
        }

        /// Exclusive (mutating) access.
        pub fn write(&self) -> RefMut<'_, T> {
            self.inner.borrow_mut()
        }

        /// Stable identity of the shared allocation, used to visit each
        /// child once during snapshot walks.
        pub fn as_ptr(&self) -> usize {
            Rc::as_ptr(&self.inner) as usize
        }
    }

    impl<T> Clone for Shared<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Rc::clone(&self.inner),
            }
        }
    }
}

#[cfg(feature = "concurrent")]
mod imp {
    use std::sync::Arc;

    use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

    /// Lock-protected shared handle.
    #[derive(Debug)]
    pub struct Shared<T> {
        inner: Arc<RwLock<T>>,
    }

    impl<T> Shared<T> {
        pub fn new(value: T) -> Self {
            Self {
                inner: Arc::new(RwLock::new(value)),
            }
        }

        /// Shared (read-only) access.
        pub fn read(&self) -> RwLockReadGuard<'_, T> {
            self.inner.read()
        }

        /// Exclusive (mutating) access.
        pub fn write(&self) -> RwLockWriteGuard<'_, T> {
            self.inner.write()
        }

        /// Stable identity of the shared allocation, used to visit each
        /// child once during snapshot walks.
        pub fn as_ptr(&self) -> usize {
            Arc::as_ptr(&self.inner) as usize
        }
    }

    impl<T> Clone for Shared<T> {
        fn clone(&self) -> Self {
            Self {
                inner: Arc::clone(&self.inner),
            }
        }
    }
}

pub use imp::Shared;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_identity() {
        let a = Shared::new(1_u32);
        let b = a.clone();
        assert_eq!(a.as_ptr(), b.as_ptr());
        *b.write() = 2;
        assert_eq!(*a.read(), 2);
    }

    #[test]
    fn separate_handles_have_distinct_identity() {
        let a = Shared::new(1_u32);
        let b = Shared::new(1_u32);
        assert_ne!(a.as_ptr(), b.as_ptr());
    }
}
