//! The graph resolver.
//!
//! Turns an ordered tag list into an instance of a requested result type:
//!
//! 1. `Uses` dependencies are resolved first, externally or by a recursive
//!    resolution over the tags that target them.
//! 2. The remaining tags are grouped by target type. Groups keyed by an
//!    interface lend their parameters to every concrete group implementing
//!    that interface.
//! 3. Concrete groups are constructed in repeated passes. Each instance
//!    built joins the candidate pool for later constructors. The first
//!    instance assignable to the result type is returned.
//! 4. A pass without progress enables omission of optional parameters; a
//!    second one fails.

use facet_types::{GenericEnv, Instance, Ty, TyCon, TypeRegistry};
use rustc_hash::FxHashMap;

use crate::bind::Binder;
use crate::config::{self, ConfigProvider, Facet, FacetKind};
use crate::error::ResolveError;
use crate::external::DependencyResolver;
use crate::facet::FacetTag;
use crate::trace::Trace;

/// One resolution: the result type, the tags visible to it and the generic
/// environment of the requesting context.
#[derive(Clone, Debug)]
pub struct ResolutionRequest {
    pub result: Ty,
    pub tags: Vec<FacetTag>,
    pub env: GenericEnv,
}

impl ResolutionRequest {
    pub fn new(result: Ty, tags: Vec<FacetTag>) -> Self {
        ResolutionRequest {
            result,
            tags,
            env: GenericEnv::default(),
        }
    }

    pub fn with_env(mut self, env: GenericEnv) -> Self {
        self.env = env;
        self
    }
}

/// Resolves requests against a type registry and optional collaborators.
#[derive(Clone, Copy)]
pub struct GraphResolver<'a> {
    types: &'a TypeRegistry,
    config: Option<&'a dyn ConfigProvider>,
    external: Option<&'a dyn DependencyResolver>,
}

impl<'a> GraphResolver<'a> {
    pub fn new(types: &'a TypeRegistry) -> Self {
        GraphResolver {
            types,
            config: None,
            external: None,
        }
    }

    pub fn with_config(mut self, provider: &'a dyn ConfigProvider) -> Self {
        self.config = Some(provider);
        self
    }

    pub fn with_external(mut self, resolver: &'a dyn DependencyResolver) -> Self {
        self.external = Some(resolver);
        self
    }

    pub fn resolve(&self, request: &ResolutionRequest) -> Result<Instance, ResolveError> {
        self.resolve_with_trace(request, Trace::new())
    }

    /// Resolve, continuing an existing trace.
    pub fn resolve_with_trace(
        &self,
        request: &ResolutionRequest,
        mut trace: Trace,
    ) -> Result<Instance, ResolveError> {
        let facets = config::evaluate(&request.tags, self.config, &mut trace)?;
        let mut resolution = Resolution {
            types: self.types,
            external: self.external,
            env: &request.env,
            trace,
        };
        resolution.fulfill(&request.result, facets)
    }
}

/// Working memory for one construction loop.
struct ConstructionState {
    resolved: Vec<Instance>,
    pending: Vec<PendingGroup>,
    interface_groups: Vec<Group>,
    allow_omit_optionals: bool,
    /// Externally resolved `Uses` dependencies no constructor has taken yet.
    unconsumed_external: Vec<Instance>,
}

/// Tags sharing one target type.
struct Group {
    target: TyCon,
    facets: Vec<Facet>,
}

impl Group {
    /// Parameter values in declaration order; later entries win.
    fn parameters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.facets.iter().filter_map(|f| match &f.kind {
            FacetKind::Parameter {
                name,
                value: Some(value),
            } => Some((name.as_str(), value.as_str())),
            _ => None,
        })
    }
}

struct PendingGroup {
    target: TyCon,
    named: FxHashMap<String, String>,
}

struct Resolution<'a> {
    types: &'a TypeRegistry,
    external: Option<&'a dyn DependencyResolver>,
    env: &'a GenericEnv,
    trace: Trace,
}

impl Resolution<'_> {
    fn fulfill(&mut self, result: &Ty, facets: Vec<Facet>) -> Result<Instance, ResolveError> {
        self.trace.note(format_args!("Resolving {}", result));
        let (uses, mut rest): (Vec<Facet>, Vec<Facet>) = facets
            .into_iter()
            .partition(|f| matches!(f.kind, FacetKind::Uses { .. }));

        let mut resolved = Vec::new();
        let mut external = Vec::new();
        for dependency in &uses {
            let FacetKind::Uses { generic_params } = &dependency.kind else {
                continue;
            };
            let target = self.uses_target(&dependency.target, generic_params)?;
            if let Some(instance) = self.external.and_then(|r| r.try_resolve(&target)) {
                self.trace
                    .note(format_args!("Resolved dependency {} externally", target));
                resolved.push(instance.clone());
                external.push(instance);
                continue;
            }

            let (matching, remaining): (Vec<Facet>, Vec<Facet>) = rest
                .into_iter()
                .partition(|f| f.target == dependency.target);
            rest = remaining;
            self.trace.note(format_args!("Resolving dependency {}", target));
            self.trace.indent();
            let outcome = self.fulfill(&target, matching);
            self.trace.dedent();
            match outcome {
                Ok(instance) => resolved.push(instance),
                Err(
                    err @ (ResolveError::BinderShape { .. }
                    | ResolveError::Construction { .. }
                    | ResolveError::Configuration { .. }),
                ) => return Err(err),
                Err(_) => {
                    return Err(self.parameter_error(format!(
                        "dependency of type `{}` could not be resolved",
                        target
                    )))
                }
            }
        }

        let groups = self.group(rest);
        let mut state = self.plan(groups, resolved, external);
        self.construct(result, &mut state)
    }

    /// The concrete type a `Uses` tag asks for.
    fn uses_target(&mut self, target: &TyCon, generic_params: &[String]) -> Result<Ty, ResolveError> {
        let mut args = Vec::with_capacity(generic_params.len());
        for name in generic_params {
            match self.env.get(name) {
                Some(ty) => args.push(ty.clone()),
                None => {
                    return Err(self.parameter_error(format!(
                        "generic parameter `{}` of dependency `{}` is not bound",
                        name, target
                    )))
                }
            }
        }
        Ok(Ty::app(target.name.clone(), args))
    }

    /// Group facets by target type in first-appearance order.
    fn group(&mut self, facets: Vec<Facet>) -> Vec<Group> {
        let mut groups: Vec<Group> = Vec::new();
        for facet in facets {
            if let FacetKind::Construct { implied } = &facet.kind {
                if !implied.is_empty() {
                    let names: Vec<&str> = implied.iter().map(|t| t.name.as_str()).collect();
                    self.trace
                        .note(format_args!("{} implies {}", facet.label, names.join(", ")));
                }
            }
            match groups.iter_mut().find(|g| g.target == facet.target) {
                Some(group) => group.facets.push(facet),
                None => groups.push(Group {
                    target: facet.target.clone(),
                    facets: vec![facet],
                }),
            }
        }
        groups
    }

    /// Split interface groups off, lend their parameters to implementors and
    /// drop groups a `Uses` dependency already satisfies.
    fn plan(
        &mut self,
        groups: Vec<Group>,
        resolved: Vec<Instance>,
        unconsumed_external: Vec<Instance>,
    ) -> ConstructionState {
        let (interface_groups, concrete): (Vec<Group>, Vec<Group>) = groups
            .into_iter()
            .partition(|g| self.types.is_interface(&g.target));

        let mut pending = Vec::with_capacity(concrete.len());
        for group in concrete {
            if resolved
                .iter()
                .any(|instance| instance.ty().head() == Some(&group.target))
            {
                self.trace
                    .note(format_args!("Skipping {}, already resolved", group.target));
                continue;
            }
            let mut named = FxHashMap::default();
            for (name, value) in group.parameters() {
                named.insert(name.to_string(), value.to_string());
            }
            for iface in &interface_groups {
                if self.types.implements(&group.target, &iface.target) {
                    for (name, value) in iface.parameters() {
                        named.insert(name.to_string(), value.to_string());
                    }
                }
            }
            pending.push(PendingGroup {
                target: group.target,
                named,
            });
        }

        ConstructionState {
            resolved,
            pending,
            interface_groups,
            allow_omit_optionals: false,
            unconsumed_external,
        }
    }

    fn construct(
        &mut self,
        result: &Ty,
        state: &mut ConstructionState,
    ) -> Result<Instance, ResolveError> {
        let binder = Binder::new(self.types, self.external);
        let mut pass = 0;
        while !state.pending.is_empty() {
            pass += 1;
            self.trace.note(format_args!(
                "Pass {}{}",
                pass,
                if state.allow_omit_optionals {
                    " (omitting optionals)"
                } else {
                    ""
                }
            ));
            let mut progress = false;
            let mut i = 0;
            while i < state.pending.len() {
                let Some(ty) = self.instantiate(&state.pending[i].target, result) else {
                    i += 1;
                    continue;
                };
                let binding = binder.try_construct(
                    &ty,
                    &state.pending[i].named,
                    &state.resolved,
                    state.allow_omit_optionals,
                    &mut self.trace,
                )?;
                let Some(binding) = binding else {
                    i += 1;
                    continue;
                };

                state
                    .unconsumed_external
                    .retain(|e| !binding.consumed.iter().any(|c| Instance::ptr_eq(c, e)));

                if self.types.is_assignable(binding.instance.ty(), result) {
                    if !state.unconsumed_external.is_empty() {
                        let unused = state
                            .unconsumed_external
                            .iter()
                            .map(|e| e.ty().clone())
                            .collect();
                        return Err(ResolveError::DependencyUnused {
                            unused,
                            trace: self.trace.clone(),
                        });
                    }
                    self.trace
                        .note(format_args!("Resolved {} as {}", result, binding.instance.ty()));
                    return Ok(binding.instance);
                }

                state.resolved.push(binding.instance);
                state.pending.remove(i);
                progress = true;
            }

            if progress {
                state.allow_omit_optionals = false;
            } else if !state.allow_omit_optionals {
                state.allow_omit_optionals = true;
            } else {
                let remaining: Vec<&str> = state
                    .pending
                    .iter()
                    .map(|g| g.target.name.as_str())
                    .collect();
                let lent = state.interface_groups.len();
                tracing::debug!(result = %result, passes = pass, lent, "resolution stalled");
                return Err(self.parameter_error(format!(
                    "could not construct {}",
                    remaining.join(", ")
                )));
            }
        }

        self.trace
            .note(format_args!("No constructed type is assignable to {}", result));
        Err(ResolveError::ResultResolution {
            result: result.clone(),
            trace: self.trace.clone(),
        })
    }

    /// Close an open generic group target over the result type's arguments,
    /// or over the context's generic environment.
    fn instantiate(&mut self, target: &TyCon, result: &Ty) -> Option<Ty> {
        let Some(def) = self.types.get(target) else {
            return Some(Ty::Con(target.clone()));
        };
        if !def.is_generic() {
            return Some(Ty::Con(target.clone()));
        }
        if result.args().len() == def.generic_params.len() {
            return Some(Ty::app(target.name.clone(), result.args().to_vec()));
        }
        let from_env: Option<Vec<Ty>> = def
            .generic_params
            .iter()
            .map(|name| self.env.get(name).cloned())
            .collect();
        match from_env {
            Some(args) => Some(Ty::app(target.name.clone(), args)),
            None => {
                self.trace.note(format_args!(
                    "Cannot bind generic parameters of {} from {}",
                    target, result
                ));
                None
            }
        }
    }

    fn parameter_error(&mut self, reason: String) -> ResolveError {
        self.trace.note(&reason);
        ResolveError::ParameterResolution {
            reason,
            trace: self.trace.clone(),
        }
    }
}
