//! Handles that can be filled in by the session.

use crate::error::Result;
use crate::injectable::Injectable;
use crate::key::TypeKey;
use crate::resolver::Resolver;
use crate::session::SessionHandle;
use std::rc::Rc;

///////////////////////////////////////////////////////////////////////////////
// Dependencies
///////////////////////////////////////////////////////////////////////////////

/// A single entry of a dependency list.
///
/// Implemented for `Rc<T>` of every [`Injectable`] type and for
/// [`SessionHandle`], which gives access to the session itself.
pub trait Dependency: Sized + 'static {
    /// The key of the resolved type. `None` for the session itself, which is
    /// not part of the registry.
    fn key() -> Option<TypeKey>;

    /// Resolves the dependency.
    fn resolve(resolver: &mut Resolver<'_>) -> Result<Self>;
}

impl<T: Injectable + ?Sized> Dependency for Rc<T> {
    fn key() -> Option<TypeKey> {
        Some(TypeKey::of::<T>())
    }

    fn resolve(resolver: &mut Resolver<'_>) -> Result<Self> {
        resolver.resolve::<T>()
    }
}

impl Dependency for SessionHandle {
    fn key() -> Option<TypeKey> {
        None
    }

    fn resolve(resolver: &mut Resolver<'_>) -> Result<Self> {
        Ok(resolver.session())
    }
}

/// An ordered list of dependencies: a tuple of [`Dependency`] values.
///
/// A list with a single dependency is written as a one-element tuple,
/// `(Rc<T>,)`.
pub trait DependencyList: Sized + 'static {
    /// The keys of the dependencies, in order.
    fn keys() -> Vec<TypeKey>;

    /// Resolves every dependency from left to right.
    fn resolve_all(resolver: &mut Resolver<'_>) -> Result<Self>;
}

macro_rules! impl_dependency_list {
    ($($dep:ident),*) => {
        impl<$($dep: Dependency),*> DependencyList for ($($dep,)*) {
            #[allow(unused_mut)]
            fn keys() -> Vec<TypeKey> {
                let mut keys = Vec::new();
                $(keys.extend($dep::key());)*
                keys
            }

            #[allow(unused_variables)]
            fn resolve_all(resolver: &mut Resolver<'_>) -> Result<Self> {
                Ok(($($dep::resolve(resolver)?,)*))
            }
        }
    };
}

impl_dependency_list!();
impl_dependency_list!(A);
impl_dependency_list!(A, B);
impl_dependency_list!(A, B, C);
impl_dependency_list!(A, B, C, D);
impl_dependency_list!(A, B, C, D, E);
impl_dependency_list!(A, B, C, D, E, F);
impl_dependency_list!(A, B, C, D, E, F, G);
impl_dependency_list!(A, B, C, D, E, F, G, H);

///////////////////////////////////////////////////////////////////////////////
// Injection
///////////////////////////////////////////////////////////////////////////////

/// A handle, or tuple of handles, that can be assigned a resolved value.
///
/// Used by [`Session::inject`], [`SessionHandle::inject`] and
/// [`Resolver::inject`]. Tuples are filled in from left to right.
///
/// [`Session::inject`]: crate::Session::inject
/// [`SessionHandle::inject`]: crate::SessionHandle::inject
/// [`Resolver::inject`]: crate::Resolver::inject
pub trait Inject {
    fn inject(self, resolver: &mut Resolver<'_>) -> Result<()>;
}

impl<'a, T: Injectable + ?Sized> Inject for &'a mut Option<Rc<T>> {
    fn inject(self, resolver: &mut Resolver<'_>) -> Result<()> {
        *self = Some(resolver.resolve::<T>()?);
        Ok(())
    }
}

impl<'a, T: Injectable + ?Sized> Inject for &'a mut Rc<T> {
    fn inject(self, resolver: &mut Resolver<'_>) -> Result<()> {
        *self = resolver.resolve::<T>()?;
        Ok(())
    }
}

macro_rules! impl_inject {
    ($($target:ident $value:ident),+) => {
        impl<$($target: Inject),+> Inject for ($($target,)+) {
            fn inject(self, resolver: &mut Resolver<'_>) -> Result<()> {
                let ($($value,)+) = self;
                $($value.inject(resolver)?;)+
                Ok(())
            }
        }
    };
}

impl_inject!(A a);
impl_inject!(A a, B b);
impl_inject!(A a, B b, C c);
impl_inject!(A a, B b, C c, D d);
impl_inject!(A a, B b, C c, D d, E e);
impl_inject!(A a, B b, C c, D d, E e, F f);
impl_inject!(A a, B b, C c, D d, E e, F f, G g);
impl_inject!(A a, B b, C c, D d, E e, F f, G g, H h);

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
