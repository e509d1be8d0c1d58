//! Contexts: lazily resolved, memoized property slots.
//!
//! A [`ContextFactory`] turns a context descriptor into a [`Context`]. Every
//! value property gets a compute-once slot that runs the graph resolver on
//! first read; every sub-context property gets a slot that builds the nested
//! context on first access. Nothing is resolved, and no configuration is
//! read, until a slot is read.

use std::sync::{Arc, OnceLock};

use facet_types::{bind_generics, GenericEnv, Instance, Ty};

use crate::catalog::{Catalog, CatalogError, ContextId, PropertyType};
use crate::collect;
use crate::config::ConfigProvider;
use crate::error::ResolveError;
use crate::external::DependencyResolver;
use crate::facet::FacetTag;
use crate::resolve::{GraphResolver, ResolutionRequest};
use crate::trace::Trace;

/// Shared state behind every context a factory creates.
#[derive(Clone)]
struct Engine {
    catalog: Arc<Catalog>,
    config: Option<Arc<dyn ConfigProvider>>,
    external: Option<Arc<dyn DependencyResolver>>,
}

/// Creates contexts from a catalog.
#[derive(Clone)]
pub struct ContextFactory {
    engine: Arc<Engine>,
}

impl ContextFactory {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        ContextFactory {
            engine: Arc::new(Engine {
                catalog,
                config: None,
                external: None,
            }),
        }
    }

    pub fn with_config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        Arc::make_mut(&mut self.engine).config = Some(provider);
        self
    }

    pub fn with_dependency_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        Arc::make_mut(&mut self.engine).external = Some(resolver);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.engine.catalog
    }

    /// Create a non-generic context.
    pub fn create(&self, name: &str) -> Result<Context, CatalogError> {
        self.create_generic(name, Vec::new())
    }

    /// Create a context, binding its generic slots to `args` in order.
    pub fn create_generic(&self, name: &str, args: Vec<Ty>) -> Result<Context, CatalogError> {
        let id = self
            .engine
            .catalog
            .context_id(name)
            .ok_or_else(|| CatalogError::UnknownContext {
                name: name.to_string(),
            })?;
        let expected = self.engine.catalog.context_at(id).generic_params.len();
        if expected != args.len() {
            return Err(CatalogError::GenericArity {
                name: name.to_string(),
                expected,
                found: args.len(),
            });
        }
        tracing::debug!(context = name, "creating context");
        Ok(Context::build(self.engine.clone(), id, &args, &[]))
    }
}

struct ValueSlot {
    request: ResolutionRequest,
    cell: OnceLock<Result<Instance, ResolveError>>,
}

struct ContextSlot {
    context: ContextId,
    args: Vec<Ty>,
    /// Tags collected at the declaring property, handed down to every
    /// property of the nested context.
    inherited: Vec<FacetTag>,
    cell: OnceLock<Arc<Context>>,
}

enum Slot {
    Value(ValueSlot),
    Context(ContextSlot),
}

/// An instance of a context descriptor.
pub struct Context {
    engine: Arc<Engine>,
    id: ContextId,
    env: GenericEnv,
    slots: Vec<(String, Slot)>,
}

impl Context {
    fn build(engine: Arc<Engine>, id: ContextId, args: &[Ty], inherited: &[FacetTag]) -> Context {
        let descriptor = engine.catalog.context_at(id);
        let env = bind_generics(&descriptor.generic_params, args);
        let slots = descriptor
            .properties
            .iter()
            .map(|prop| {
                let mut tags = inherited.to_vec();
                tags.extend(collect::property_tags(&engine.catalog, id, &prop.name));
                let slot = match &prop.ty {
                    PropertyType::Value(ty) => Slot::Value(ValueSlot {
                        request: ResolutionRequest::new(ty.substitute(&env), tags)
                            .with_env(env.clone()),
                        cell: OnceLock::new(),
                    }),
                    PropertyType::Context { context, args } => Slot::Context(ContextSlot {
                        context: *context,
                        args: args.iter().map(|a| a.substitute(&env)).collect(),
                        inherited: tags,
                        cell: OnceLock::new(),
                    }),
                };
                (prop.name.clone(), slot)
            })
            .collect();
        Context {
            engine,
            id,
            env,
            slots,
        }
    }

    pub fn name(&self) -> &str {
        &self.engine.catalog.context_at(self.id).name
    }

    /// The generic arguments this context was created with, by slot name.
    pub fn generic_env(&self) -> &GenericEnv {
        &self.env
    }

    /// Property names in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    /// Read a value property, resolving it on first access.
    ///
    /// Concurrent first reads run the resolution once; every read returns
    /// the same instance, or the same error.
    pub fn get(&self, property: &str) -> Result<Instance, ResolveError> {
        match self.slot(property)? {
            Slot::Value(slot) => slot
                .cell
                .get_or_init(|| self.resolve(property, &slot.request))
                .clone(),
            Slot::Context(_) => Err(self.kind_error(property, "value")),
        }
    }

    /// Read a sub-context property, building the nested context on first
    /// access.
    pub fn context(&self, property: &str) -> Result<Arc<Context>, ResolveError> {
        match self.slot(property)? {
            Slot::Context(slot) => Ok(slot
                .cell
                .get_or_init(|| {
                    tracing::debug!(context = self.name(), property, "building sub-context");
                    Arc::new(Context::build(
                        self.engine.clone(),
                        slot.context,
                        &slot.args,
                        &slot.inherited,
                    ))
                })
                .clone()),
            Slot::Value(_) => Err(self.kind_error(property, "context")),
        }
    }

    /// Whether a property has been read already.
    pub fn is_resolved(&self, property: &str) -> bool {
        match self.slot(property) {
            Ok(Slot::Value(slot)) => slot.cell.get().is_some(),
            Ok(Slot::Context(slot)) => slot.cell.get().is_some(),
            Err(_) => false,
        }
    }

    fn slot(&self, property: &str) -> Result<&Slot, ResolveError> {
        self.slots
            .iter()
            .find(|(name, _)| name == property)
            .map(|(_, slot)| slot)
            .ok_or_else(|| ResolveError::UnknownProperty {
                context: self.name().to_string(),
                property: property.to_string(),
            })
    }

    fn kind_error(&self, property: &str, expected: &'static str) -> ResolveError {
        ResolveError::PropertyKind {
            context: self.name().to_string(),
            property: property.to_string(),
            expected,
        }
    }

    fn resolve(&self, property: &str, request: &ResolutionRequest) -> Result<Instance, ResolveError> {
        let trace = Trace::starting(format_args!(
            "Fulfilling property {}.{}",
            self.name(),
            property
        ));
        let mut resolver = GraphResolver::new(self.engine.catalog.types());
        if let Some(config) = self.engine.config.as_deref() {
            resolver = resolver.with_config(config);
        }
        if let Some(external) = self.engine.external.as_deref() {
            resolver = resolver.with_external(external);
        }
        let outcome = resolver.resolve_with_trace(request, trace);
        match &outcome {
            Ok(instance) => {
                tracing::debug!(context = self.name(), property, ty = %instance.ty(), "property resolved")
            }
            Err(err) => {
                tracing::debug!(context = self.name(), property, error = %err, "property failed")
            }
        }
        outcome
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.name())
            .field("properties", &self.properties().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
