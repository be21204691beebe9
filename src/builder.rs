//! Create a session with the builder pattern.

use crate::error::Result;
use crate::injectable::{Injectable, Interfaces, Scope};
use crate::registry::Registry;
use crate::resolver::Resolver;
use crate::session::Session;
use std::fmt;
use std::rc::Rc;

/// A registration that is applied when the session is built.
type Step = Box<dyn FnOnce(&Session) -> Result<()>>;

/// Create a session with the builder pattern.
pub struct SessionBuilder {
    capacity: usize,
    default_scope: Scope,
    steps: Vec<Step>,
}

impl SessionBuilder {
    /// Creates a new SessionBuilder.
    pub fn new() -> Self {
        Self {
            capacity: 0,
            default_scope: Scope::default(),
            steps: Vec::new(),
        }
    }

    /// Reserves room for the specified number of types.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the scope of types that neither declare nor inherit one.
    pub fn with_default_scope(mut self, scope: Scope) -> Self {
        self.default_scope = scope;
        self
    }

    /// Registers `T`. See [`Session::register`].
    pub fn with_registration<T: Injectable + ?Sized>(mut self) -> Self {
        self.steps.push(Box::new(|session: &Session| session.register::<T>()));
        self
    }

    /// Registers `T` with extra interfaces. See
    /// [`Session::register_implementation`].
    pub fn with_implementation<T, F>(mut self, interfaces: F) -> Self
    where
        T: Injectable + ?Sized,
        F: FnOnce(&mut Interfaces<T>) + 'static,
    {
        self.steps
            .push(Box::new(move |session: &Session| session.register_implementation(interfaces)));
        self
    }

    /// Sets a factory for `T`. See [`Session::register_factory`].
    pub fn with_factory<T, F>(mut self, factory: F) -> Self
    where
        T: Injectable + ?Sized,
        F: Fn(&mut Resolver<'_>) -> Option<Rc<T>> + 'static,
    {
        self.steps
            .push(Box::new(move |session: &Session| session.register_factory(factory)));
        self
    }

    /// Inserts a shared instance. See [`Session::insert`].
    pub fn with_instance<T: Injectable + ?Sized>(mut self, instance: Rc<T>) -> Self {
        self.steps.push(Box::new(move |session: &Session| session.insert(instance)));
        self
    }

    /// Builds the session, applying the registrations in the order they
    /// were added.
    pub fn build(self) -> Result<Session> {
        let session = Session::from_registry(Registry::with_capacity(
            self.capacity,
            self.default_scope,
        ));
        for step in self.steps {
            step(&session)?;
        }
        Ok(session)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionBuilder")
            .field("capacity", &self.capacity)
            .field("default_scope", &self.default_scope)
            .field("steps", &self.steps.len())
            .finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
