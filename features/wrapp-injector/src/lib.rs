//! Wrapp Injector resolves object graphs from a registry of providers.
//!
//! Wrapp Injector is split into a few parts:
//! 1. Identities: [Token]s and constructible [Module] types, both usable as [Injectable]
//! 2. Providers: how an identity is satisfied - a value, a factory or a module type
//! 3. The [Injector]: owns the registry, resolves identities and constructs modules
//!
//! Resolution is plain `async` built on `futures`, it does not require a specific runtime.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::{Arc, LazyLock};
//! use wrapp_injector::{
//!     Constructor, DependencyEdges, DynError, Injector, Module, Params, Provider, Token,
//! };
//!
//! static DATABASE_URL: LazyLock<Token<String>> = LazyLock::new(|| Token::named("database_url"));
//!
//! struct Repository {
//!     url: Arc<String>,
//! }
//! impl Module for Repository {
//!     fn dependencies(edges: &mut DependencyEdges) {
//!         edges.inject("url", &*DATABASE_URL);
//!     }
//!
//!     fn constructor() -> Constructor<Self> {
//!         Constructor::Explicit(|params: &mut Params| -> Result<Self, DynError> {
//!             Ok(Repository {
//!                 url: params.get("url")?,
//!             })
//!         })
//!     }
//! }
//!
//! let injector = Injector::builder()
//!     .provide(&*DATABASE_URL, Provider::value("postgres://localhost".to_string()))
//!     .register::<Repository>()
//!     .build()
//!     .unwrap();
//!
//! let repository = futures::executor::block_on(injector.get_type::<Repository>()).unwrap();
//! assert_eq!(repository.url.as_str(), "postgres://localhost");
//! ```

pub mod builder;
pub mod config;
pub mod errors;
pub mod injector;
pub mod metadata;
pub mod module;
pub mod provider;
mod registry;
pub mod token;
pub mod types;

pub use builder::InjectorBuilder;
pub use config::{InjectorOptions, SingletonResolution};
pub use errors::{InjectError, MetadataError};
pub use injector::Injector;
pub use metadata::{DependenciesSlot, MetadataStore, ProvidersSlot, Slot};
pub use module::{Constructor, DependencyEdge, DependencyEdges, Module, ModuleType, Params};
pub use provider::{Factory, Provider, ProviderEntry, ProviderKind, ProviderMap, ProviderMember, ProviderSet};
pub use token::{AnyToken, Injectable, Token};
pub use types::{DynError, Instance, Provided, TypeInfo};
