//! Object graph construction for Rust.
//!
//! # Features
//!
//! * Automatic construction of objects which depend on other objects
//! * Dependency Injection, declared per type or pulled in a constructor
//! * Shared (one per session) and per-request instances
//! * Interfaces as trait objects, with the implementation chosen at runtime
//! * Detection of cyclic dependencies
//! * Teardown in reverse order of construction
//!
//! # Creating a Session
//!
//! A [`Session`] constructs and owns one object graph. To create a session
//! without any configuration, use [`Session::new()`].
//!
//! ```rust
//! use objgraph::Session;
//!
//! let session = Session::new();
//! ```
//!
//! To register factories, instances or implementations up front, use the
//! [`SessionBuilder`].
//!
//! ```rust
//! use objgraph::{Injectable, Scope, Session};
//! use std::rc::Rc;
//!
//! trait Greeter {
//!     fn greet(&self) -> String;
//! }
//!
//! impl Injectable for dyn Greeter {}
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "Hello".into()
//!     }
//! }
//!
//! let session = Session::builder()
//!     .with_default_scope(Scope::Shared)
//!     .with_factory::<dyn Greeter, _>(|_| Some(Rc::new(English) as Rc<dyn Greeter>))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(session.resolve::<dyn Greeter>().unwrap().greet(), "Hello");
//! ```
//!
//! # Enabling a type to be resolved
//!
//! To enable a type to be resolved through a session, you need to implement
//! the [`Injectable`] trait on it. The type declares either the list of its
//! dependencies, a constructor that receives the session, or a constructor
//! without arguments. See the documentation of the trait for more
//! information.
//!
//! The first time a shared type is resolved, the session constructs it and
//! recursively constructs its dependencies. The instance is then stored in
//! the session and every later resolve returns a handle to the same
//! instance. When the session is dropped, the shared instances are released
//! in the reverse order of their construction.
//!
//! ```rust
//! use objgraph::{create_session, Dependencies, DefaultConstructor, Injectable};
//! use std::rc::Rc;
//!
//! struct Database;
//!
//! impl Injectable for Database {
//!     fn default_constructor() -> Option<DefaultConstructor<Self>> {
//!         Some(DefaultConstructor::new(|| Database))
//!     }
//! }
//!
//! struct App {
//!     database: Rc<Database>,
//! }
//!
//! impl Injectable for App {
//!     fn dependencies() -> Option<Dependencies<Self>> {
//!         Some(Dependencies::new(|(database,): (Rc<Database>,)| App { database }))
//!     }
//! }
//!
//! let app = create_session::<App>().unwrap();
//! assert!(app.session().contains::<Database>());
//! ```
//!
//! A session is built on `Rc` and cannot be sent to another thread. Use one
//! session per thread.

mod builder;
mod dependency;
mod erased;
mod error;
mod injectable;
mod key;
mod registration;
mod registry;
mod resolver;
mod session;

pub use crate::builder::SessionBuilder;
pub use crate::dependency::{Dependency, DependencyList, Inject};
pub use crate::error::{Error, Result};
pub use crate::injectable::{
    DefaultConstructor, Dependencies, Injectable, Interfaces, Scope, SessionConstructor,
};
pub use crate::key::TypeKey;
pub use crate::resolver::Resolver;
pub use crate::session::{create_session, Rooted, Session, SessionHandle};

#[cfg(test)]
mod tests;
