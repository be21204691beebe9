//! Type erasure of the smart pointers that are stored in a session.
//!
//! The registry is keyed by [`TypeKey`] and must be able to hold handles of
//! any type, including unsized ones such as `Rc<dyn Trait>`. A handle
//! `Rc<T>` is always sized, so it can be boxed as `dyn Any` and downcast
//! again by whoever knows `T`.
//!
//! [`TypeKey`]: crate::TypeKey

use std::any::Any;
use std::rc::{Rc, Weak};

///////////////////////////////////////////////////////////////////////////////
// Traits
///////////////////////////////////////////////////////////////////////////////

/// A type-erased `Rc<T>`.
pub(crate) trait ErasedHandle {
    /// Clones the handle into a `Box<dyn Any>` that holds an `Rc<T>`.
    ///
    /// This increases the reference count.
    fn clone_any(&self) -> Box<dyn Any>;

    /// Creates a weak version of the handle.
    fn downgrade_any(&self) -> Box<dyn ErasedWeak>;

    /// Turns the handle into a `Box<dyn Any>` that holds an `Rc<T>`.
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

/// A type-erased `Weak<T>`.
pub(crate) trait ErasedWeak {
    /// Returns a strong handle if the instance is still alive.
    fn upgrade_any(&self) -> Option<Box<dyn ErasedHandle>>;

    /// Returns true if at least one strong handle still exists.
    fn is_alive(&self) -> bool;
}

///////////////////////////////////////////////////////////////////////////////
// Implementations
///////////////////////////////////////////////////////////////////////////////

impl<T: ?Sized + 'static> ErasedHandle for Rc<T> {
    fn clone_any(&self) -> Box<dyn Any> {
        Box::new(Rc::clone(self))
    }

    fn downgrade_any(&self) -> Box<dyn ErasedWeak> {
        Box::new(Rc::downgrade(self))
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl<T: ?Sized + 'static> ErasedWeak for Weak<T> {
    fn upgrade_any(&self) -> Option<Box<dyn ErasedHandle>> {
        match Weak::upgrade(self) {
            Some(strong) => Some(Box::new(strong) as Box<dyn ErasedHandle>),
            None => None,
        }
    }

    fn is_alive(&self) -> bool {
        Weak::strong_count(self) > 0
    }
}

///////////////////////////////////////////////////////////////////////////////
// Casts
///////////////////////////////////////////////////////////////////////////////

/// Converts a boxed `Rc<Impl>` into a boxed `Rc<Base>`.
///
/// Returns `None` if the input is not an `Rc<Impl>`.
pub(crate) type ErasedCast = Rc<dyn Fn(Box<dyn Any>) -> Option<Box<dyn Any>>>;

/// Erases a typed upcast.
pub(crate) fn erase_cast<T, B>(cast: fn(Rc<T>) -> Rc<B>) -> ErasedCast
where
    T: ?Sized + 'static,
    B: ?Sized + 'static,
{
    Rc::new(move |handle: Box<dyn Any>| match handle.downcast::<Rc<T>>() {
        Ok(handle) => Some(Box::new(cast(*handle)) as Box<dyn Any>),
        Err(..) => None,
    })
}

/// Chains two casts: first `inner`, then `outer`.
pub(crate) fn compose(inner: ErasedCast, outer: ErasedCast) -> ErasedCast {
    Rc::new(move |handle: Box<dyn Any>| inner(handle).and_then(|mid| outer(mid)))
}

/// Downcasts a boxed handle back to its typed form.
pub(crate) fn downcast<T: ?Sized + 'static>(handle: Box<dyn Any>) -> Option<Rc<T>> {
    match handle.downcast::<Rc<T>>() {
        Ok(handle) => Some(*handle),
        Err(..) => None,
    }
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
