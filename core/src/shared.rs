//! Shared, reference-counted interior-mutable handle.
//!
//! Mirrors the single-threaded sharing pattern used throughout this
//! emulator: every handle into CPU or memory state held outside its owner
//! (a tracer callback, a debugger reference) goes through this wrapper
//! rather than a raw pointer.

use std::cell::RefCell;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// A shared, interior-mutable handle to a value of type `T`.
#[derive(Debug, Default)]
pub struct Shared<T: ?Sized>(Inner<T>);

type Inner<T> = Rc<RefCell<T>>;

impl<T> Shared<T> {
    /// Wraps `value` in a new shared handle.
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }
}

impl<T: ?Sized> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = Inner<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T: ?Sized> DerefMut for Shared<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: ?Sized> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}
