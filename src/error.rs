//! Errors that can occur while resolving or registering types.

use crate::key::TypeKey;
use thiserror::Error;

/// Result type of all fallible operations of the session.
pub type Result<T> = std::result::Result<T, Error>;

/// An error that aborts the resolution or registration in flight.
///
/// Errors are returned at the point where they are detected and bubble up
/// through the whole chain of dependencies that was being constructed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The type declares no way to construct it and no implementation was
    /// registered for it.
    #[error("type `{type_name}` has no dependency list, session constructor or default constructor")]
    UnknownConstruction { type_name: &'static str },

    /// A recipe was installed twice for the same type.
    #[error("a recipe is already registered for type `{type_name}`")]
    DuplicateRegistration { type_name: &'static str },

    /// A shared instance was stored twice for the same type.
    #[error("an instance of type `{type_name}` is already stored in the session")]
    DuplicateInstance { type_name: &'static str },

    /// Constructing the type required the type itself.
    #[error("cyclic dependency while constructing type `{type_name}`")]
    CyclicDependency { type_name: &'static str },

    /// The shared instance was released by its owners and cannot be
    /// resolved anymore.
    #[error("the shared instance of type `{type_name}` has already been released")]
    ReleasedInstance { type_name: &'static str },

    /// A factory did not produce an instance.
    #[error("the factory of type `{type_name}` produced no instance")]
    NullInstance { type_name: &'static str },

    /// A session handle was used after its session was dropped.
    #[error("the session has already been dropped")]
    SessionDropped,

    /// A type-erased handle did not have the expected type.
    #[error("stored handle does not match type `{type_name}`")]
    TypeMismatch { type_name: &'static str },
}

impl Error {
    pub(crate) fn unknown_construction(key: TypeKey) -> Self {
        Self::UnknownConstruction {
            type_name: key.name(),
        }
    }

    pub(crate) fn duplicate_registration(key: TypeKey) -> Self {
        Self::DuplicateRegistration {
            type_name: key.name(),
        }
    }

    pub(crate) fn duplicate_instance(key: TypeKey) -> Self {
        Self::DuplicateInstance {
            type_name: key.name(),
        }
    }

    pub(crate) fn cyclic_dependency(key: TypeKey) -> Self {
        Self::CyclicDependency {
            type_name: key.name(),
        }
    }

    pub(crate) fn released_instance(key: TypeKey) -> Self {
        Self::ReleasedInstance {
            type_name: key.name(),
        }
    }

    pub(crate) fn null_instance(key: TypeKey) -> Self {
        Self::NullInstance {
            type_name: key.name(),
        }
    }

    pub(crate) fn type_mismatch(key: TypeKey) -> Self {
        Self::TypeMismatch {
            type_name: key.name(),
        }
    }

    /// Returns the name of the type the error is about, if any.
    pub fn type_name(&self) -> Option<&'static str> {
        match self {
            Self::UnknownConstruction { type_name }
            | Self::DuplicateRegistration { type_name }
            | Self::DuplicateInstance { type_name }
            | Self::CyclicDependency { type_name }
            | Self::ReleasedInstance { type_name }
            | Self::NullInstance { type_name }
            | Self::TypeMismatch { type_name } => Some(*type_name),
            Self::SessionDropped => None,
        }
    }
}
