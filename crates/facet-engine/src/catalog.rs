//! The catalog: scopes, context descriptors and facet definitions.
//!
//! A catalog is assembled with [`CatalogBuilder`] and frozen by
//! [`CatalogBuilder::build`], which validates every reference and lowers
//! declarations to [`FacetTag`]s. The frozen [`Catalog`] is read-only and
//! shared across contexts and threads.

use std::fmt;

use facet_types::{Ty, TyCon, TypeRegistry};
use rustc_hash::FxHashMap;

use crate::facet::{Declared, FacetDef, FacetDefKind, FacetTag, ParamSource, TagKind};

/// Identifier of a scope within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub(crate) u32);

/// Identifier of a context descriptor within a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub(crate) u32);

// ── Builder input ──────────────────────────────────────────────────────

/// A declaring scope: a named bag of facets with an optional enclosing scope.
#[derive(Clone, Debug)]
pub struct ScopeDef {
    pub name: String,
    pub parent: Option<String>,
    pub declarations: Vec<Declared>,
}

impl ScopeDef {
    pub fn new(name: impl Into<String>) -> Self {
        ScopeDef {
            name: name.into(),
            parent: None,
            declarations: Vec::new(),
        }
    }

    /// Nest this scope inside `parent`.
    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn declare(mut self, declared: Declared) -> Self {
        self.declarations.push(declared);
        self
    }
}

/// The declared type of a context property.
#[derive(Clone, Debug)]
pub enum PropertyDefType {
    Value(Ty),
    Context { name: String, args: Vec<Ty> },
}

#[derive(Clone, Debug)]
pub struct PropertyDef {
    pub name: String,
    pub ty: PropertyDefType,
    pub declarations: Vec<Declared>,
}

impl PropertyDef {
    /// A property resolved to an instance of `ty`.
    pub fn value(name: impl Into<String>, ty: Ty) -> Self {
        PropertyDef {
            name: name.into(),
            ty: PropertyDefType::Value(ty),
            declarations: Vec::new(),
        }
    }

    /// A property holding a nested context.
    pub fn context(name: impl Into<String>, context: impl Into<String>, args: Vec<Ty>) -> Self {
        PropertyDef {
            name: name.into(),
            ty: PropertyDefType::Context {
                name: context.into(),
                args,
            },
            declarations: Vec::new(),
        }
    }

    pub fn declare(mut self, declared: Declared) -> Self {
        self.declarations.push(declared);
        self
    }
}

/// A context descriptor. A context is also a scope: its own declarations
/// apply to every property.
#[derive(Clone, Debug)]
pub struct ContextDef {
    pub name: String,
    pub parent: Option<String>,
    pub generic_params: Vec<String>,
    pub declarations: Vec<Declared>,
    pub properties: Vec<PropertyDef>,
}

impl ContextDef {
    pub fn new(name: impl Into<String>) -> Self {
        ContextDef {
            name: name.into(),
            parent: None,
            generic_params: Vec::new(),
            declarations: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn within(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn generic<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn declare(mut self, declared: Declared) -> Self {
        self.declarations.push(declared);
        self
    }

    pub fn property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }
}

// ── Frozen catalog ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub name: String,
    pub parent: Option<ScopeId>,
    pub tags: Vec<FacetTag>,
}

#[derive(Clone, Debug)]
pub enum PropertyType {
    Value(Ty),
    Context { context: ContextId, args: Vec<Ty> },
}

#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: PropertyType,
    pub tags: Vec<FacetTag>,
}

#[derive(Clone, Debug)]
pub struct ContextDescriptor {
    pub id: ContextId,
    pub name: String,
    /// The scope holding the context's own tags.
    pub scope: ScopeId,
    pub generic_params: Vec<String>,
    pub properties: Vec<PropertyDescriptor>,
}

impl ContextDescriptor {
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A validated, immutable catalog.
#[derive(Debug)]
pub struct Catalog {
    types: TypeRegistry,
    facets: FxHashMap<String, FacetDef>,
    scopes: Vec<Scope>,
    scope_index: FxHashMap<String, ScopeId>,
    contexts: Vec<ContextDescriptor>,
    context_index: FxHashMap<String, ContextId>,
}

impl Catalog {
    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn facet(&self, name: &str) -> Option<&FacetDef> {
        self.facets.get(name)
    }

    /// `None` for an id issued by a different catalog.
    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    /// Lookup for ids this catalog issued itself.
    pub(crate) fn scope_at(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn scope_id(&self, name: &str) -> Option<ScopeId> {
        self.scope_index.get(name).copied()
    }

    pub fn context(&self, id: ContextId) -> Option<&ContextDescriptor> {
        self.contexts.get(id.0 as usize)
    }

    pub(crate) fn context_at(&self, id: ContextId) -> &ContextDescriptor {
        &self.contexts[id.0 as usize]
    }

    pub fn context_id(&self, name: &str) -> Option<ContextId> {
        self.context_index.get(name).copied()
    }

    pub fn contexts(&self) -> impl Iterator<Item = &ContextDescriptor> {
        self.contexts.iter()
    }
}

// ── Errors ─────────────────────────────────────────────────────────────

/// A mistake in the declared catalog, reported by `build()` or when a
/// context is requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogError {
    DuplicateFacet { name: String },
    DuplicateScope { name: String },
    DuplicateProperty { context: String, property: String },
    UnknownFacet { name: String, owner: String },
    UnknownScope { name: String, owner: String },
    UnknownType { name: String, owner: String },
    UnknownContext { name: String },
    /// A parameter facet was declared without a value or configuration key.
    MissingArgument { facet: String, owner: String },
    /// A construction facet was given a value or configuration key.
    UnexpectedArgument { facet: String, owner: String },
    GenericArity {
        name: String,
        expected: usize,
        found: usize,
    },
    /// Scopes reach themselves through parents or source references.
    ScopeCycle { path: Vec<String> },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::DuplicateFacet { name } => {
                write!(f, "facet `{}` is defined more than once", name)
            }
            CatalogError::DuplicateScope { name } => {
                write!(f, "scope `{}` is defined more than once", name)
            }
            CatalogError::DuplicateProperty { context, property } => {
                write!(
                    f,
                    "context `{}` declares property `{}` more than once",
                    context, property
                )
            }
            CatalogError::UnknownFacet { name, owner } => {
                write!(f, "unknown facet `{}` on `{}`", name, owner)
            }
            CatalogError::UnknownScope { name, owner } => {
                write!(f, "unknown scope `{}` referenced by `{}`", name, owner)
            }
            CatalogError::UnknownType { name, owner } => {
                write!(f, "unknown type `{}` referenced by `{}`", name, owner)
            }
            CatalogError::UnknownContext { name } => {
                write!(f, "unknown context `{}`", name)
            }
            CatalogError::MissingArgument { facet, owner } => {
                write!(
                    f,
                    "parameter facet `{}` on `{}` needs a value or configuration key",
                    facet, owner
                )
            }
            CatalogError::UnexpectedArgument { facet, owner } => {
                write!(
                    f,
                    "construction facet `{}` on `{}` does not take an argument",
                    facet, owner
                )
            }
            CatalogError::GenericArity {
                name,
                expected,
                found,
            } => {
                write!(
                    f,
                    "`{}` expects {} generic arguments, found {}",
                    name, expected, found
                )
            }
            CatalogError::ScopeCycle { path } => {
                write!(f, "scope cycle: {}", path.join(" -> "))
            }
        }
    }
}

impl std::error::Error for CatalogError {}

// ── Builder ────────────────────────────────────────────────────────────

/// Collects type definitions, facet definitions, scopes and contexts.
pub struct CatalogBuilder {
    types: TypeRegistry,
    facets: Vec<FacetDef>,
    scopes: Vec<ScopeDef>,
    contexts: Vec<ContextDef>,
}

impl CatalogBuilder {
    pub fn new(types: TypeRegistry) -> Self {
        CatalogBuilder {
            types,
            facets: Vec::new(),
            scopes: Vec::new(),
            contexts: Vec::new(),
        }
    }

    pub fn facet(&mut self, def: FacetDef) -> &mut Self {
        self.facets.push(def);
        self
    }

    pub fn scope(&mut self, def: ScopeDef) -> &mut Self {
        self.scopes.push(def);
        self
    }

    pub fn context(&mut self, def: ContextDef) -> &mut Self {
        self.contexts.push(def);
        self
    }

    /// Validate every reference and freeze the catalog.
    pub fn build(self) -> Result<Catalog, CatalogError> {
        let CatalogBuilder {
            types,
            facets,
            scopes,
            contexts,
        } = self;

        let mut facet_index = FxHashMap::default();
        for def in facets {
            if facet_index.contains_key(&def.name) {
                return Err(CatalogError::DuplicateFacet { name: def.name });
            }
            require_type(&types, def.target(), &def.name)?;
            if let FacetDefKind::Construct { implied, .. } = &def.kind {
                for ty in implied {
                    require_type(&types, ty, &def.name)?;
                }
            }
            facet_index.insert(def.name.clone(), def);
        }

        // Plain scopes come first, then one scope per context.
        let mut scope_index = FxHashMap::default();
        let names = scopes
            .iter()
            .map(|s| &s.name)
            .chain(contexts.iter().map(|c| &c.name));
        for (i, name) in names.enumerate() {
            if scope_index.insert(name.clone(), ScopeId(i as u32)).is_some() {
                return Err(CatalogError::DuplicateScope { name: name.clone() });
            }
        }

        let mut context_index = FxHashMap::default();
        for (i, ctx) in contexts.iter().enumerate() {
            context_index.insert(ctx.name.clone(), ContextId(i as u32));
        }

        let lower = Lowering {
            types: &types,
            facets: &facet_index,
            scopes: &scope_index,
        };

        let mut frozen_scopes = Vec::with_capacity(scope_index.len());
        let scope_heads = scopes
            .iter()
            .map(|s| (&s.name, &s.parent, &s.declarations))
            .chain(contexts.iter().map(|c| (&c.name, &c.parent, &c.declarations)));
        for (i, (name, parent, declarations)) in scope_heads.enumerate() {
            let parent = parent
                .as_ref()
                .map(|p| lower.scope(p, name))
                .transpose()?;
            frozen_scopes.push(Scope {
                id: ScopeId(i as u32),
                name: name.clone(),
                parent,
                tags: lower.declarations(declarations, name)?,
            });
        }

        check_scope_cycles(&frozen_scopes)?;

        let mut frozen_contexts = Vec::with_capacity(contexts.len());
        for (i, ctx) in contexts.iter().enumerate() {
            let mut properties: Vec<PropertyDescriptor> = Vec::with_capacity(ctx.properties.len());
            for prop in &ctx.properties {
                if properties.iter().any(|p| p.name == prop.name) {
                    return Err(CatalogError::DuplicateProperty {
                        context: ctx.name.clone(),
                        property: prop.name.clone(),
                    });
                }
                let owner = format!("{}.{}", ctx.name, prop.name);
                let ty = match &prop.ty {
                    PropertyDefType::Value(ty) => {
                        if let Some(head) = ty.head() {
                            require_type(&types, head, &owner)?;
                        }
                        PropertyType::Value(ty.clone())
                    }
                    PropertyDefType::Context { name, args } => {
                        let Some(&id) = context_index.get(name) else {
                            return Err(CatalogError::UnknownContext { name: name.clone() });
                        };
                        let expected = contexts[id.0 as usize].generic_params.len();
                        if expected != args.len() {
                            return Err(CatalogError::GenericArity {
                                name: name.clone(),
                                expected,
                                found: args.len(),
                            });
                        }
                        PropertyType::Context {
                            context: id,
                            args: args.clone(),
                        }
                    }
                };
                properties.push(PropertyDescriptor {
                    name: prop.name.clone(),
                    ty,
                    tags: lower.declarations(&prop.declarations, &owner)?,
                });
            }
            frozen_contexts.push(ContextDescriptor {
                id: ContextId(i as u32),
                name: ctx.name.clone(),
                scope: scope_index[&ctx.name],
                generic_params: ctx.generic_params.clone(),
                properties,
            });
        }

        tracing::debug!(
            scopes = frozen_scopes.len(),
            contexts = frozen_contexts.len(),
            facets = facet_index.len(),
            "catalog built"
        );

        Ok(Catalog {
            types,
            facets: facet_index,
            scopes: frozen_scopes,
            scope_index,
            contexts: frozen_contexts,
            context_index,
        })
    }
}

fn require_type(types: &TypeRegistry, ty: &TyCon, owner: &str) -> Result<(), CatalogError> {
    if types.contains(ty) {
        Ok(())
    } else {
        Err(CatalogError::UnknownType {
            name: ty.name.clone(),
            owner: owner.to_string(),
        })
    }
}

/// Name resolution used while lowering declarations.
struct Lowering<'a> {
    types: &'a TypeRegistry,
    facets: &'a FxHashMap<String, FacetDef>,
    scopes: &'a FxHashMap<String, ScopeId>,
}

impl Lowering<'_> {
    fn scope(&self, name: &str, owner: &str) -> Result<ScopeId, CatalogError> {
        self.scopes
            .get(name)
            .copied()
            .ok_or_else(|| CatalogError::UnknownScope {
                name: name.to_string(),
                owner: owner.to_string(),
            })
    }

    fn declarations(&self, declared: &[Declared], owner: &str) -> Result<Vec<FacetTag>, CatalogError> {
        declared.iter().map(|d| self.declaration(d, owner)).collect()
    }

    fn declaration(&self, declared: &Declared, owner: &str) -> Result<FacetTag, CatalogError> {
        match declared {
            Declared::Facet {
                facet,
                value,
                config_key,
            } => {
                let Some(def) = self.facets.get(facet) else {
                    return Err(CatalogError::UnknownFacet {
                        name: facet.clone(),
                        owner: owner.to_string(),
                    });
                };
                let kind = match &def.kind {
                    FacetDefKind::Construct { target, implied } => {
                        if value.is_some() || config_key.is_some() {
                            return Err(CatalogError::UnexpectedArgument {
                                facet: facet.clone(),
                                owner: owner.to_string(),
                            });
                        }
                        TagKind::Construct {
                            target: target.clone(),
                            implied: implied.clone(),
                        }
                    }
                    FacetDefKind::Parameter { target, parameter } => {
                        // A non-blank configuration key wins over a literal.
                        let key = config_key.as_ref().filter(|k| !k.trim().is_empty());
                        let source = match (key, value) {
                            (Some(key), _) => ParamSource::ConfigKey(key.clone()),
                            (None, Some(value)) => ParamSource::Literal(value.clone()),
                            (None, None) => {
                                return Err(CatalogError::MissingArgument {
                                    facet: facet.clone(),
                                    owner: owner.to_string(),
                                })
                            }
                        };
                        TagKind::Parameter {
                            target: target.clone(),
                            parameter: parameter.clone(),
                            source,
                        }
                    }
                };
                Ok(FacetTag {
                    label: def.name.clone(),
                    kind,
                })
            }
            Declared::Uses {
                target,
                generic_params,
            } => {
                let target = TyCon::new(target.as_str());
                let Some(def) = self.types.get(&target) else {
                    return Err(CatalogError::UnknownType {
                        name: target.name,
                        owner: owner.to_string(),
                    });
                };
                if !generic_params.is_empty() && def.generic_params.len() != generic_params.len() {
                    return Err(CatalogError::GenericArity {
                        name: target.name,
                        expected: def.generic_params.len(),
                        found: generic_params.len(),
                    });
                }
                Ok(FacetTag {
                    label: "Uses".to_string(),
                    kind: TagKind::Uses {
                        target,
                        generic_params: generic_params.clone(),
                    },
                })
            }
            Declared::Source { scopes } => {
                let scopes = scopes
                    .iter()
                    .map(|s| self.scope(s, owner))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FacetTag {
                    label: "Source".to_string(),
                    kind: TagKind::Source { scopes },
                })
            }
        }
    }
}

/// Depth-first search over parent and source edges.
///
/// Returns the first cycle found as a path of scope names, e.g.
/// `["A", "B", "A"]`.
fn check_scope_cycles(scopes: &[Scope]) -> Result<(), CatalogError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done,
    }

    fn edges(scope: &Scope) -> impl Iterator<Item = ScopeId> + '_ {
        scope.parent.into_iter().chain(scope.tags.iter().flat_map(|t| match &t.kind {
            TagKind::Source { scopes } => scopes.as_slice(),
            _ => &[][..],
        }
        .iter()
        .copied()))
    }

    fn visit(
        id: ScopeId,
        scopes: &[Scope],
        marks: &mut [Mark],
        stack: &mut Vec<ScopeId>,
    ) -> Result<(), CatalogError> {
        marks[id.0 as usize] = Mark::Visiting;
        stack.push(id);
        for next in edges(&scopes[id.0 as usize]) {
            match marks[next.0 as usize] {
                Mark::Visiting => {
                    let start = stack.iter().position(|s| *s == next).unwrap_or(0);
                    let mut path: Vec<String> = stack[start..]
                        .iter()
                        .map(|s| scopes[s.0 as usize].name.clone())
                        .collect();
                    path.push(scopes[next.0 as usize].name.clone());
                    return Err(CatalogError::ScopeCycle { path });
                }
                Mark::Unvisited => visit(next, scopes, marks, stack)?,
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[id.0 as usize] = Mark::Done;
        Ok(())
    }

    let mut marks = vec![Mark::Unvisited; scopes.len()];
    let mut stack = Vec::new();
    for scope in scopes {
        if marks[scope.id.0 as usize] == Mark::Unvisited {
            visit(scope.id, scopes, &mut marks, &mut stack)?;
        }
    }
    Ok(())
}
