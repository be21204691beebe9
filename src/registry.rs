//! The mapping from types to their registrations.

use crate::erased::ErasedWeak;
use crate::error::{Error, Result};
use crate::injectable::{derive_recipe, Alias, Injectable, Interfaces, RecipeKind, Scope};
use crate::key::TypeKey;
use crate::registration::{erase_recipe, Recipe, RecipeState, Redirect, Registration};
use fnv::FnvHashMap;
use log::{debug, trace};
use std::fmt;

/// All registrations of one session.
pub(crate) struct Registry {
    entries: FnvHashMap<TypeKey, Registration>,
    /// Scope of types that neither declare nor inherit one.
    default_scope: Scope,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(default_scope: Scope) -> Self {
        Self {
            entries: FnvHashMap::default(),
            default_scope,
        }
    }

    /// Creates an empty registry with the specified capacity.
    pub fn with_capacity(capacity: usize, default_scope: Scope) -> Self {
        Self {
            entries: FnvHashMap::with_capacity_and_hasher(capacity, Default::default()),
            default_scope,
        }
    }

    pub fn get(&self, key: TypeKey) -> Option<&Registration> {
        self.entries.get(&key)
    }

    pub fn get_mut(&mut self, key: TypeKey) -> Option<&mut Registration> {
        self.entries.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns the registration of `key`, inserting one without a recipe if
    /// it does not exist yet.
    fn entry(&mut self, key: TypeKey, declared_scope: Option<Scope>) -> &mut Registration {
        let default_scope = self.default_scope;
        self.entries
            .entry(key)
            .or_insert_with(|| Registration::unvalidated(key, declared_scope, default_scope))
    }

    /// Makes sure `T` has a registration.
    ///
    /// A new registration gets the recipe derived from the declaration of
    /// `T`. If `T` cannot be constructed, the registration is kept without a
    /// recipe and the failure is deferred until `T` is actually resolved.
    pub fn lookup_or_create<T: Injectable + ?Sized>(&mut self) {
        let key = TypeKey::of::<T>();
        if self.entries.contains_key(&key) {
            return;
        }

        match derive_recipe::<T>() {
            Some((recipe, kind)) => {
                let aliases = Interfaces::<T>::of().into_aliases();
                self.install(key, T::scope(), erase_recipe(recipe), kind, aliases);
            }
            None => {
                trace!("No recipe for {}, deferring failure", key);
                self.entry(key, T::scope());
            }
        }
    }

    /// Installs the recipe of `T` and aliases its interfaces.
    ///
    /// Fails if `T` already has a recipe, or if no recipe was given.
    pub fn register<T: Injectable + ?Sized>(
        &mut self,
        recipe: Option<(Recipe, RecipeKind)>,
        interfaces: Interfaces<T>,
    ) -> Result<()> {
        let key = TypeKey::of::<T>();

        if let Some(reg) = self.entries.get(&key) {
            if reg.recipe.is_validated() {
                return Err(Error::duplicate_registration(key));
            }
        }

        let (recipe, kind) = match recipe {
            Some(recipe) => recipe,
            None => return Err(Error::unknown_construction(key)),
        };

        self.install(key, T::scope(), recipe, kind, interfaces.into_aliases());
        Ok(())
    }

    /// Registers `T` with its derived recipe.
    pub fn register_derived<T: Injectable + ?Sized>(&mut self, interfaces: Interfaces<T>) -> Result<()> {
        let recipe = derive_recipe::<T>().map(|(recipe, kind)| (erase_recipe(recipe), kind));
        self.register(recipe, interfaces)
    }

    fn install(
        &mut self,
        key: TypeKey,
        declared_scope: Option<Scope>,
        recipe: Recipe,
        kind: RecipeKind,
        aliases: Vec<Alias>,
    ) {
        for alias in aliases.iter().filter(|alias| alias.key != key) {
            let base = self.entry(alias.key, alias.scope);
            if let Some(previous) = &base.resolves_to {
                debug!("{} now resolves to {} instead of {}", alias.key, key, previous.target);
            } else {
                debug!("{} resolves to {}", alias.key, key);
            }
            base.resolves_to = Some(Redirect {
                target: key,
                cast: alias.cast.clone(),
            });
        }

        let inherited = aliases
            .iter()
            .filter_map(|alias| self.entries.get(&alias.key))
            .find_map(|base| base.declared_scope);
        let scope = declared_scope.or(inherited).unwrap_or(self.default_scope);

        let reg = self.entry(key, declared_scope);
        reg.declared_scope = declared_scope;
        reg.scope = scope;
        debug!("Installed {:?} recipe for {} ({:?})", kind, key, scope);
        reg.recipe = RecipeState::Validated { recipe, kind };
    }

    /// Stores the weak handle of a shared instance.
    ///
    /// The slot of a type can only be filled once.
    pub fn populate(
        &mut self,
        key: TypeKey,
        declared_scope: Option<Scope>,
        weak: Box<dyn ErasedWeak>,
    ) -> Result<()> {
        let reg = self.entry(key, declared_scope);
        if reg.storage.is_some() {
            return Err(Error::duplicate_instance(key));
        }
        reg.storage = Some(weak);
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.values()).finish()
    }
}

///////////////////////////////////////////////////////////////////////////////
// Tests
///////////////////////////////////////////////////////////////////////////////
