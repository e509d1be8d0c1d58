//! Faceted construction engine.
//!
//! Context properties are not implemented directly. Each carries facet tags,
//! declared on the property, on the scopes enclosing its context, or spliced
//! in from other scopes, that say which concrete types to build and how to
//! fill their constructor parameters. Reading a property runs the graph
//! resolver over those tags once and caches the outcome.
//!
//! # Architecture
//!
//! - [`facet`]: Facet definitions, declarations and lowered tags
//! - [`catalog`]: Scopes, context descriptors, validation
//! - [`collect`]: Ancestor-first tag collection with source splicing
//! - [`config`]: Configuration providers and parameter evaluation
//! - [`resolve`]: The fixed-point construction loop
//! - [`external`]: External dependency resolvers
//! - [`context`]: Lazily resolved contexts
//! - [`trace`], [`error`]: Diagnostics

mod bind;
pub mod catalog;
pub mod collect;
pub mod config;
pub mod context;
pub mod error;
pub mod external;
pub mod facet;
pub mod resolve;
pub mod trace;

pub use catalog::{
    Catalog, CatalogBuilder, CatalogError, ContextDef, ContextDescriptor, ContextId, PropertyDef,
    PropertyDescriptor, PropertyType, Scope, ScopeDef, ScopeId,
};
pub use config::{
    ConfigError, ConfigProvider, EnvConfigProvider, FileConfigProvider, MapConfigProvider,
};
pub use context::{Context, ContextFactory};
pub use error::ResolveError;
pub use external::{DependencyResolver, InMemoryResolver};
pub use facet::{Declared, FacetDef, FacetDefKind, FacetTag, ParamSource, TagKind};
pub use resolve::{GraphResolver, ResolutionRequest};
pub use trace::Trace;

pub use facet_types;
