//! The session owns the registry and the shared instances.

use crate::builder::SessionBuilder;
use crate::dependency::Inject;
use crate::erased::{self, ErasedHandle};
use crate::error::{Error, Result};
use crate::injectable::{Injectable, Interfaces, RecipeKind, Scope};
use crate::key::TypeKey;
use crate::registration::erase_recipe;
use crate::registry::Registry;
use crate::resolver::Resolver;
use log::debug;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

///////////////////////////////////////////////////////////////////////////////
// State
///////////////////////////////////////////////////////////////////////////////

/// A shared instance owned by the session.
pub(crate) struct Constructed {
    pub key: TypeKey,
    /// A boxed `Rc<T>`.
    pub owner: Box<dyn Any>,
}

/// The state behind a [`Session`].
pub(crate) struct SessionState {
    pub registry: RefCell<Registry>,
    /// Shared instances in the order they were constructed.
    pub order: RefCell<Vec<Constructed>>,
    this: Weak<SessionState>,
}

impl SessionState {
    fn new(registry: Registry) -> Rc<Self> {
        Rc::new_cyclic(|this| SessionState {
            registry: RefCell::new(registry),
            order: RefCell::new(Vec::new()),
            this: this.clone(),
        })
    }

    pub(crate) fn handle(&self) -> SessionHandle {
        SessionHandle {
            state: self.this.clone(),
        }
    }

    /// Makes the session an owner of a shared instance.
    pub(crate) fn adopt(
        &self,
        key: TypeKey,
        declared_scope: Option<Scope>,
        handle: &dyn ErasedHandle,
    ) -> Result<()> {
        self.registry
            .borrow_mut()
            .populate(key, declared_scope, handle.downgrade_any())?;
        self.order.borrow_mut().push(Constructed {
            key,
            owner: handle.clone_any(),
        });
        debug!("Stored shared instance of {}", key);
        Ok(())
    }
}

impl Drop for SessionState {
    /// Releases the shared instances, the last constructed one first.
    fn drop(&mut self) {
        let order = self.order.get_mut();
        while let Some(constructed) = order.pop() {
            debug!("Releasing {}", constructed.key);
            drop(constructed);
        }
    }
}

///////////////////////////////////////////////////////////////////////////////
// Session
///////////////////////////////////////////////////////////////////////////////

/// Constructs and owns an object graph.
///
/// Cloning a session is cheap and yields another handle to the same
/// session. When the last handle is dropped, every shared instance is
/// released in the reverse order of construction, so dependents always go
/// before their dependencies.
#[derive(Clone)]
pub struct Session {
    state: Rc<SessionState>,
}

impl Session {
    ///////////////////////////////////////////////////////////////////////////
    // Constructors
    ///////////////////////////////////////////////////////////////////////////

    /// Creates a new, empty session.
    pub fn new() -> Self {
        Self::from_registry(Registry::new(Scope::default()))
    }

    /// Creates a new, empty session with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_registry(Registry::with_capacity(capacity, Scope::default()))
    }

    /// Creates a SessionBuilder.
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    pub(crate) fn from_registry(registry: Registry) -> Self {
        Self {
            state: SessionState::new(registry),
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &SessionState {
        &self.state
    }

    ///////////////////////////////////////////////////////////////////////////
    // Resolving
    ///////////////////////////////////////////////////////////////////////////

    /// Resolves `T`, constructing it and all of its dependencies on first
    /// use.
    ///
    /// A shared type is constructed once; every later call returns the same
    /// instance. A per-request type is constructed on every call.
    pub fn resolve<T: Injectable + ?Sized>(&self) -> Result<Rc<T>> {
        self.state.resolve::<T>()
    }

    /// Resolves the type of every target and assigns it, from left to
    /// right.
    pub fn inject<I: Inject>(&self, targets: I) -> Result<()> {
        Resolver::new(&self.state).inject(targets)
    }

    /// Returns a weak handle to this session.
    pub fn handle(&self) -> SessionHandle {
        self.state.handle()
    }

    ///////////////////////////////////////////////////////////////////////////
    // Registration
    ///////////////////////////////////////////////////////////////////////////

    /// Installs the recipe of `T` right away.
    ///
    /// Unlike resolving, this fails immediately if `T` cannot be
    /// constructed, or if `T` already has a recipe.
    pub fn register<T: Injectable + ?Sized>(&self) -> Result<()> {
        self.state
            .registry
            .borrow_mut()
            .register_derived(Interfaces::<T>::of())
    }

    /// Registers `T` and declares extra interfaces it can be resolved as,
    /// on top of the ones `T` declares itself.
    ///
    /// If several implementations are registered for one interface, the
    /// last one wins.
    pub fn register_implementation<T, F>(&self, interfaces: F) -> Result<()>
    where
        T: Injectable + ?Sized,
        F: FnOnce(&mut Interfaces<T>),
    {
        let mut declared = Interfaces::<T>::of();
        interfaces(&mut declared);
        self.state.registry.borrow_mut().register_derived(declared)
    }

    /// Uses `factory` to construct `T`.
    ///
    /// Resolving `T` fails with [`Error::NullInstance`] if the factory
    /// returns `None`.
    pub fn register_factory<T, F>(&self, factory: F) -> Result<()>
    where
        T: Injectable + ?Sized,
        F: Fn(&mut Resolver<'_>) -> Option<Rc<T>> + 'static,
    {
        let key = TypeKey::of::<T>();
        let recipe = erase_recipe::<T>(Box::new(move |resolver: &mut Resolver<'_>| {
            factory(resolver).ok_or_else(|| Error::null_instance(key))
        }));
        self.state
            .registry
            .borrow_mut()
            .register(Some((recipe, RecipeKind::Factory)), Interfaces::<T>::of())
    }

    /// Adds an instance that was constructed outside of the session.
    ///
    /// The session becomes one of its owners and resolves it as a shared
    /// instance of `T` from now on.
    pub fn insert<T: Injectable + ?Sized>(&self, instance: Rc<T>) -> Result<()> {
        self.state
            .adopt(TypeKey::of::<T>(), T::scope(), &instance)
    }

    /// Gives up the ownership the session has over the shared instance of
    /// `T` and hands it to the caller.
    ///
    /// The session keeps a weak reference. Once every other owner drops the
    /// instance, resolving `T` fails with [`Error::ReleasedInstance`]; the
    /// instance is never silently constructed again.
    ///
    /// Only the exact type `T` is looked at. Releasing an interface that was
    /// resolved through its implementation returns `None`; release the
    /// implementation instead.
    ///
    /// Returns `None` if the session does not own an instance of `T`.
    pub fn release<T: Injectable + ?Sized>(&self) -> Option<Rc<T>> {
        let key = TypeKey::of::<T>();
        let constructed = {
            let mut order = self.state.order.borrow_mut();
            let index = order.iter().rposition(|constructed| constructed.key == key)?;
            order.remove(index)
        };
        debug!("Released ownership of {}", key);
        erased::downcast::<T>(constructed.owner)
    }

    ///////////////////////////////////////////////////////////////////////////
    // Meta Data Getters
    ///////////////////////////////////////////////////////////////////////////

    /// Returns the number of shared instances the session owns.
    pub fn num_instances(&self) -> usize {
        self.state.order.borrow().len()
    }

    /// Returns the number of registered types.
    pub fn num_registrations(&self) -> usize {
        self.state.registry.borrow().len()
    }

    /// Returns true if a live shared instance of `T` is stored.
    ///
    /// Only the exact type `T` is looked at. An interface that resolves
    /// through its implementation is not reported; ask for the
    /// implementation instead.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        match self.state.registry.borrow().get(TypeKey::of::<T>()) {
            Some(reg) => reg.has_live_instance(),
            None => false,
        }
    }

    /// Returns the keys of the owned shared instances, in construction
    /// order.
    pub fn construction_order(&self) -> Vec<TypeKey> {
        self.state
            .order
            .borrow()
            .iter()
            .map(|constructed| constructed.key)
            .collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("registry", &*self.state.registry.borrow())
            .field("construction_order", &self.construction_order())
            .finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Weak Handle
///////////////////////////////////////////////////////////////////////////////

/// A handle to a session that does not keep it alive.
///
/// This is what types receive when they depend on the session. Holding it
/// does not keep the session alive, so the session is always dropped after
/// the instances that depend on it, and no ownership cycle is formed
/// between the session and its dependents.
///
/// The flip side is that a dependent cannot extend the life of the session.
/// Once the last [`Session`] is dropped, [`resolve`](SessionHandle::resolve)
/// and [`inject`](SessionHandle::inject) fail with
/// [`Error::SessionDropped`], including when called from a `Drop`
/// implementation that runs during the teardown of the session.
#[derive(Clone)]
pub struct SessionHandle {
    state: Weak<SessionState>,
}

impl SessionHandle {
    /// Returns the session, if it is still alive.
    pub fn upgrade(&self) -> Option<Session> {
        self.state.upgrade().map(|state| Session { state })
    }

    /// Resolves `T` from the session.
    pub fn resolve<T: Injectable + ?Sized>(&self) -> Result<Rc<T>> {
        self.upgrade().ok_or(Error::SessionDropped)?.resolve::<T>()
    }

    /// Resolves the type of every target and assigns it, from left to
    /// right.
    pub fn inject<I: Inject>(&self, targets: I) -> Result<()> {
        self.upgrade().ok_or(Error::SessionDropped)?.inject(targets)
    }

    /// Returns true if both handles point to the same session.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.state, &other.state)
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("alive", &(self.state.strong_count() > 0))
            .finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Rooted
///////////////////////////////////////////////////////////////////////////////

/// The root of an object graph together with the session that owns it.
///
/// Dropping it drops the handle to the root first and then the session, so
/// the whole graph is released in reverse construction order.
pub struct Rooted<T: ?Sized> {
    instance: Rc<T>,
    session: Session,
}

impl<T: ?Sized> Rooted<T> {
    /// Returns the handle to the root instance.
    pub fn instance(&self) -> &Rc<T> {
        &self.instance
    }

    /// Returns the session that owns the graph.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Splits into the root instance and the session.
    ///
    /// Instances that depend on the session only hold a [`SessionHandle`].
    /// Dropping the returned session tears the graph down even while the
    /// root is still alive, after which the root can no longer resolve
    /// through its handle.
    pub fn into_parts(self) -> (Rc<T>, Session) {
        (self.instance, self.session)
    }
}

impl<T: ?Sized> Deref for Rooted<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.instance
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Rooted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rooted")
            .field("instance", &self.instance)
            .field("session", &self.session)
            .finish()
    }
}

/// Creates a new session and resolves `T` from it.
pub fn create_session<T: Injectable + ?Sized>() -> Result<Rooted<T>> {
    let session = Session::new();
    let instance = session.resolve::<T>()?;
    Ok(Rooted { instance, session })
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
