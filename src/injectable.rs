//! Traits and helpers to declare how a type is constructed.

use crate::dependency::DependencyList;
use crate::erased::{compose, erase_cast, ErasedCast};
use crate::error::Result;
use crate::key::TypeKey;
use crate::resolver::Resolver;
use crate::session::SessionHandle;
use fnv::FnvHashSet;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

///////////////////////////////////////////////////////////////////////////////
// Scope
///////////////////////////////////////////////////////////////////////////////

/// Determines how many instances of a type a session creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per session. It is constructed on first use and owned by
    /// the session until the session is dropped.
    Shared,
    /// A new instance every time the type is resolved. The session keeps no
    /// reference to it.
    PerRequest,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::Shared
    }
}

///////////////////////////////////////////////////////////////////////////////
// Trait
///////////////////////////////////////////////////////////////////////////////

/// A type that can be resolved from a [`Session`].
///
/// The session finds out how to construct the type by asking, in this
/// order, for a [`dependencies`] list, a [`session_constructor`] and a
/// [`default_constructor`]. The first one that is present is used. A type
/// that declares none of them can still be registered, which is how
/// interfaces (`dyn Trait`) are declared: they are resolved through an
/// implementation that lists them in its [`interfaces`].
///
/// ```
/// use objgraph::{Dependencies, Injectable, Session};
/// use std::rc::Rc;
///
/// struct Engine;
///
/// impl Injectable for Engine {
///     fn default_constructor() -> Option<objgraph::DefaultConstructor<Self>> {
///         Some(objgraph::DefaultConstructor::new(|| Engine))
///     }
/// }
///
/// struct Car {
///     engine: Rc<Engine>,
/// }
///
/// impl Injectable for Car {
///     fn dependencies() -> Option<Dependencies<Self>> {
///         Some(Dependencies::new(|(engine,): (Rc<Engine>,)| Car { engine }))
///     }
/// }
///
/// let session = Session::new();
/// let car = session.resolve::<Car>().unwrap();
/// assert!(Rc::ptr_eq(&car.engine, &session.resolve::<Engine>().unwrap()));
/// ```
///
/// [`Session`]: crate::Session
/// [`dependencies`]: Injectable::dependencies
/// [`session_constructor`]: Injectable::session_constructor
/// [`default_constructor`]: Injectable::default_constructor
/// [`interfaces`]: Injectable::interfaces
pub trait Injectable: 'static {
    /// The ordered list of dependencies and how to build the type from them.
    fn dependencies() -> Option<Dependencies<Self>> {
        None
    }

    /// A constructor that receives a handle to the session itself.
    fn session_constructor() -> Option<SessionConstructor<Self>> {
        None
    }

    /// A constructor without arguments.
    fn default_constructor() -> Option<DefaultConstructor<Self>> {
        None
    }

    /// The scope of the type.
    ///
    /// `None` inherits the scope of the first declared interface that has
    /// one, and falls back to the default scope of the session.
    fn scope() -> Option<Scope> {
        None
    }

    /// Declares the interfaces this type can be resolved as.
    ///
    /// Interfaces of the declared interfaces are followed as well. Every
    /// interface is visited once, so interfaces that declare each other are
    /// fine.
    fn interfaces(_interfaces: &mut Interfaces<Self>) {}
}

///////////////////////////////////////////////////////////////////////////////
// Recipes
///////////////////////////////////////////////////////////////////////////////

/// Builds one instance of `T`.
pub(crate) type TypedRecipe<T> = Box<dyn Fn(&mut Resolver<'_>) -> Result<Rc<T>>>;

/// Describes which kind of recipe was installed for a type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RecipeKind {
    Dependencies(Vec<TypeKey>),
    Session,
    Default,
    Factory,
}

/// An ordered list of dependencies and a function that builds the type out
/// of them.
///
/// The dependency list is a tuple of handles, for example
/// `(Rc<Database>, Rc<dyn Logger>, SessionHandle)`. The dependencies are
/// resolved from left to right.
pub struct Dependencies<T: ?Sized> {
    keys: Vec<TypeKey>,
    build: TypedRecipe<T>,
}

impl<T: 'static> Dependencies<T> {
    /// Creates a dependency list from the signature of `build`.
    pub fn new<D, F>(build: F) -> Self
    where
        D: DependencyList,
        F: Fn(D) -> T + 'static,
    {
        Self {
            keys: D::keys(),
            build: Box::new(move |resolver: &mut Resolver<'_>| {
                let deps = D::resolve_all(resolver)?;
                Ok(Rc::new(build(deps)))
            }),
        }
    }
}

impl<T: ?Sized + 'static> Dependencies<T> {
    /// Like [`new`](Dependencies::new), but `build` returns the handle
    /// itself. Use this to give an interface a default implementation.
    pub fn from_rc<D, F>(build: F) -> Self
    where
        D: DependencyList,
        F: Fn(D) -> Rc<T> + 'static,
    {
        Self {
            keys: D::keys(),
            build: Box::new(move |resolver: &mut Resolver<'_>| {
                let deps = D::resolve_all(resolver)?;
                Ok(build(deps))
            }),
        }
    }

    /// The keys of the listed dependencies, in order.
    ///
    /// A dependency on the session itself has no key.
    pub fn keys(&self) -> &[TypeKey] {
        &self.keys
    }
}

impl<T: ?Sized> fmt::Debug for Dependencies<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Dependencies").field(&self.keys).finish()
    }
}

/// A constructor that receives a handle to the session.
///
/// The type can resolve or [`inject`] its own dependencies through the
/// handle, or keep the handle to resolve things later.
///
/// [`inject`]: crate::SessionHandle::inject
pub struct SessionConstructor<T: ?Sized> {
    build: Box<dyn Fn(SessionHandle) -> Result<Rc<T>>>,
}

impl<T: 'static> SessionConstructor<T> {
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(SessionHandle) -> Result<T> + 'static,
    {
        Self {
            build: Box::new(move |session| build(session).map(Rc::new)),
        }
    }
}

impl<T: ?Sized + 'static> SessionConstructor<T> {
    pub fn from_rc<F>(build: F) -> Self
    where
        F: Fn(SessionHandle) -> Result<Rc<T>> + 'static,
    {
        Self {
            build: Box::new(build),
        }
    }
}

/// A constructor without arguments.
pub struct DefaultConstructor<T: ?Sized> {
    build: Box<dyn Fn() -> Rc<T>>,
}

impl<T: 'static> DefaultConstructor<T> {
    pub fn new(build: fn() -> T) -> Self {
        Self {
            build: Box::new(move || Rc::new(build())),
        }
    }

    /// Uses the `Default` implementation of the type.
    pub fn from_default() -> Self
    where
        T: Default,
    {
        Self::new(T::default)
    }
}

impl<T: ?Sized + 'static> DefaultConstructor<T> {
    pub fn from_rc(build: fn() -> Rc<T>) -> Self {
        Self {
            build: Box::new(build),
        }
    }
}

/// Finds the recipe of `T`, trying each kind of constructor in order of
/// priority.
pub(crate) fn derive_recipe<T: Injectable + ?Sized>() -> Option<(TypedRecipe<T>, RecipeKind)> {
    if let Some(deps) = T::dependencies() {
        let Dependencies { keys, build } = deps;
        return Some((build, RecipeKind::Dependencies(keys)));
    }

    if let Some(ctor) = T::session_constructor() {
        let build = ctor.build;
        let recipe: TypedRecipe<T> = Box::new(move |resolver: &mut Resolver<'_>| build(resolver.session()));
        return Some((recipe, RecipeKind::Session));
    }

    if let Some(ctor) = T::default_constructor() {
        let build = ctor.build;
        let recipe: TypedRecipe<T> = Box::new(move |_: &mut Resolver<'_>| Ok(build()));
        return Some((recipe, RecipeKind::Default));
    }

    None
}

///////////////////////////////////////////////////////////////////////////////
// Interfaces
///////////////////////////////////////////////////////////////////////////////

/// A base type that an implementation can be resolved as.
pub(crate) struct Alias {
    pub key: TypeKey,
    pub scope: Option<Scope>,
    /// Turns a handle of the implementation into a handle of the base.
    pub cast: ErasedCast,
}

impl fmt::Debug for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alias")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish()
    }
}

/// The list of interfaces that `T` declares.
///
/// Interfaces of interfaces are followed, so declaring `dyn Sub` where
/// `dyn Sub` declares `dyn Super` makes `T` resolvable as both.
pub struct Interfaces<T: ?Sized> {
    aliases: Vec<Alias>,
    /// `T` and every interface added so far.
    seen: FnvHashSet<TypeKey>,
    _marker: PhantomData<fn(Rc<T>)>,
}

impl<T: ?Sized + 'static> Interfaces<T> {
    fn with_seen(mut seen: FnvHashSet<TypeKey>) -> Self {
        seen.insert(TypeKey::of::<T>());
        Self {
            aliases: Vec::new(),
            seen,
            _marker: PhantomData,
        }
    }

    /// Collects the interfaces declared by `T`.
    pub(crate) fn of() -> Self
    where
        T: Injectable,
    {
        Self::collect(FnvHashSet::default())
    }

    /// Collects the interfaces declared by `T`, skipping the ones in `seen`.
    fn collect(seen: FnvHashSet<TypeKey>) -> Self
    where
        T: Injectable,
    {
        let mut interfaces = Self::with_seen(seen);
        T::interfaces(&mut interfaces);
        interfaces
    }

    /// Declares that `T` can be resolved as `B`.
    ///
    /// `cast` converts a handle to `T` into a handle to `B`; for a trait
    /// object this is usually just `|this| this`. Adding an interface that
    /// is already known does nothing.
    pub fn add<B>(&mut self, cast: fn(Rc<T>) -> Rc<B>) -> &mut Self
    where
        B: Injectable + ?Sized,
    {
        let key = TypeKey::of::<B>();
        if !self.seen.insert(key) {
            return self;
        }
        let cast = erase_cast(cast);

        self.aliases.push(Alias {
            key,
            scope: B::scope(),
            cast: cast.clone(),
        });

        let parents = Interfaces::<B>::collect(self.seen.clone());
        for parent in parents.aliases {
            self.aliases.push(Alias {
                key: parent.key,
                scope: parent.scope,
                cast: compose(cast.clone(), parent.cast),
            });
        }
        self.seen.extend(parents.seen);

        self
    }

    /// The keys of all declared interfaces, nearest first.
    pub fn keys(&self) -> Vec<TypeKey> {
        self.aliases.iter().map(|alias| alias.key).collect()
    }

    pub(crate) fn into_aliases(self) -> Vec<Alias> {
        self.aliases
    }
}

impl<T: ?Sized> fmt::Debug for Interfaces<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.aliases).finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
