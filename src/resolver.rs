//! Recursive resolution of types and their dependencies.

use crate::dependency::Inject;
use crate::erased::{self, ErasedHandle};
use crate::error::{Error, Result};
use crate::injectable::{Injectable, Scope};
use crate::key::TypeKey;
use crate::registration::RecipeState;
use crate::registry::Registry;
use crate::session::{SessionHandle, SessionState};
use log::trace;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

///////////////////////////////////////////////////////////////////////////////
// Resolver
///////////////////////////////////////////////////////////////////////////////

/// Used to resolve dependencies while a type is being constructed.
///
/// Recipes and factories receive a resolver instead of the session, so the
/// only thing they can do is resolve more types. A resolver cannot be
/// created from outside this crate.
pub struct Resolver<'s> {
    state: &'s SessionState,
}

impl<'s> Resolver<'s> {
    pub(crate) fn new(state: &'s SessionState) -> Self {
        Self { state }
    }

    /// Resolves `T`, constructing it and its dependencies if needed.
    pub fn resolve<T: Injectable + ?Sized>(&mut self) -> Result<Rc<T>> {
        self.state.resolve::<T>()
    }

    /// Resolves the type of every target and assigns it, from left to
    /// right.
    pub fn inject<I: Inject>(&mut self, targets: I) -> Result<()> {
        targets.inject(self)
    }

    /// Returns a handle to the session that is resolving.
    pub fn session(&self) -> SessionHandle {
        self.state.handle()
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Cycle Detection
///////////////////////////////////////////////////////////////////////////////

/// Clears the cyclic marker of a registration when its recipe returns,
/// whether it succeeded or not.
struct MarkerGuard<'a> {
    registry: &'a RefCell<Registry>,
    key: TypeKey,
}

impl Drop for MarkerGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            if let Some(reg) = registry.get_mut(self.key) {
                reg.marker = false;
            }
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
// Algorithm
///////////////////////////////////////////////////////////////////////////////

impl SessionState {
    /// Resolves `T` from this session.
    pub(crate) fn resolve<T: Injectable + ?Sized>(&self) -> Result<Rc<T>> {
        let key = TypeKey::of::<T>();
        trace!("Resolving {}", key);

        self.registry.borrow_mut().lookup_or_create::<T>();
        let handle = self.resolve_key(key)?;

        erased::downcast::<T>(handle).ok_or_else(|| Error::type_mismatch(key))
    }

    /// Resolves a registered type, following its redirect if it has no
    /// recipe of its own.
    ///
    /// Registration always points an interface to the concrete type, so a
    /// single hop is enough.
    fn resolve_key(&self, key: TypeKey) -> Result<Box<dyn Any>> {
        let redirect = self
            .registry
            .borrow()
            .get(key)
            .and_then(|reg| reg.redirect().cloned());

        match redirect {
            Some(redirect) => {
                trace!("{} redirects to {}", key, redirect.target);
                let handle = self.construct(redirect.target)?;
                (redirect.cast)(handle).ok_or_else(|| Error::type_mismatch(key))
            }
            None => self.construct(key),
        }
    }

    /// Returns the stored instance of a type, or runs its recipe.
    fn construct(&self, key: TypeKey) -> Result<Box<dyn Any>> {
        let recipe = {
            let mut registry = self.registry.borrow_mut();
            let reg = match registry.get_mut(key) {
                Some(reg) => reg,
                None => return Err(Error::unknown_construction(key)),
            };

            if let Some(weak) = &reg.storage {
                return match weak.upgrade_any() {
                    Some(handle) => {
                        trace!("Found stored instance of {}", key);
                        Ok(handle.into_any())
                    }
                    None => Err(Error::released_instance(key)),
                };
            }

            let recipe = match &reg.recipe {
                RecipeState::Validated { recipe, .. } => recipe.clone(),
                RecipeState::Unvalidated => return Err(Error::unknown_construction(key)),
            };

            if reg.marker {
                return Err(Error::cyclic_dependency(key));
            }
            reg.marker = true;
            recipe
        };

        let guard = MarkerGuard {
            registry: &self.registry,
            key,
        };
        trace!("Constructing {}", key);
        let handle = recipe(&mut Resolver::new(self))?;
        drop(guard);

        self.store(key, handle)
    }

    /// Keeps the new instance if the type is shared.
    fn store(&self, key: TypeKey, handle: Box<dyn ErasedHandle>) -> Result<Box<dyn Any>> {
        let scope = match self.registry.borrow().get(key) {
            Some(reg) => reg.scope,
            None => return Err(Error::unknown_construction(key)),
        };

        if scope == Scope::Shared {
            self.adopt(key, None, &*handle)?;
        }

        Ok(handle.into_any())
    }
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
