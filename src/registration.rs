//! The record the registry keeps for every type.

use crate::erased::{ErasedCast, ErasedHandle, ErasedWeak};
use crate::error::Result;
use crate::injectable::{RecipeKind, Scope, TypedRecipe};
use crate::key::TypeKey;
use crate::resolver::Resolver;
use std::fmt;
use std::rc::Rc;

/// Builds one type-erased instance.
pub(crate) type Recipe = Rc<dyn Fn(&mut Resolver<'_>) -> Result<Box<dyn ErasedHandle>>>;

/// Erases the type of a recipe.
pub(crate) fn erase_recipe<T: ?Sized + 'static>(recipe: TypedRecipe<T>) -> Recipe {
    Rc::new(move |resolver: &mut Resolver<'_>| {
        recipe(resolver).map(|handle| Box::new(handle) as Box<dyn ErasedHandle>)
    })
}

/// Whether a registration knows how to construct its type.
pub(crate) enum RecipeState {
    /// No recipe. Resolving the type fails, unless it redirects to an
    /// implementation.
    Unvalidated,
    /// The type can be constructed.
    Validated { recipe: Recipe, kind: RecipeKind },
}

impl RecipeState {
    pub fn is_validated(&self) -> bool {
        matches!(self, Self::Validated { .. })
    }
}

impl fmt::Debug for RecipeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unvalidated => f.write_str("Unvalidated"),
            Self::Validated { kind, .. } => f.debug_tuple("Validated").field(kind).finish(),
        }
    }
}

/// Points an interface to the implementation it resolves to.
#[derive(Clone)]
pub(crate) struct Redirect {
    pub target: TypeKey,
    /// Converts a handle of the target into a handle of the interface.
    pub cast: ErasedCast,
}

impl fmt::Debug for Redirect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.target, f)
    }
}

/// Everything the registry knows about one type.
pub(crate) struct Registration {
    pub key: TypeKey,
    pub recipe: RecipeState,
    /// The scope the type declared itself, if any.
    pub declared_scope: Option<Scope>,
    /// The scope in effect, after inheritance and defaults.
    pub scope: Scope,
    /// Weak handle to the shared instance, once it was constructed.
    pub storage: Option<Box<dyn ErasedWeak>>,
    /// Set while the recipe of this type is running.
    pub marker: bool,
    pub resolves_to: Option<Redirect>,
}

impl Registration {
    /// Creates a registration without a recipe.
    pub fn unvalidated(key: TypeKey, declared_scope: Option<Scope>, default_scope: Scope) -> Self {
        Self {
            key,
            recipe: RecipeState::Unvalidated,
            declared_scope,
            scope: declared_scope.unwrap_or(default_scope),
            storage: None,
            marker: false,
            resolves_to: None,
        }
    }

    /// Returns the redirect if this registration should be resolved through
    /// its implementation.
    ///
    /// A stored instance or an own recipe always takes precedence.
    pub fn redirect(&self) -> Option<&Redirect> {
        if self.storage.is_some() {
            return None;
        }
        match self.recipe {
            RecipeState::Unvalidated => self.resolves_to.as_ref(),
            RecipeState::Validated { .. } => None,
        }
    }

    /// Returns true if a shared instance is stored and still alive.
    pub fn has_live_instance(&self) -> bool {
        match &self.storage {
            Some(weak) => weak.is_alive(),
            None => false,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("recipe", &self.recipe)
            .field("scope", &self.scope)
            .field("instance", &self.has_live_instance())
            .field("marker", &self.marker)
            .field("resolves_to", &self.resolves_to)
            .finish()
    }
}
