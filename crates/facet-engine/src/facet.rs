//! Facet definitions, declarations and immutable facet tags.
//!
//! A [`FacetDef`] is a registry entry: it gives a facet name its target type
//! and its behaviour (construct the target, or supply one of its constructor
//! parameters). Scopes and properties carry [`Declared`] facets while the
//! catalog is being built; [`crate::catalog::CatalogBuilder::build`] lowers
//! them to [`FacetTag`]s, which is all the resolver ever sees.

use std::fmt;

use facet_types::TyCon;

use crate::catalog::ScopeId;

/// What a facet definition does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FacetDefKind {
    /// Construct `target`. `implied` types are recorded for diagnostics.
    Construct { target: TyCon, implied: Vec<TyCon> },
    /// Supply the constructor parameter `parameter` of `target`.
    Parameter { target: TyCon, parameter: String },
}

/// A named facet definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacetDef {
    pub name: String,
    pub kind: FacetDefKind,
}

impl FacetDef {
    pub fn construct(name: impl Into<String>, target: impl Into<String>) -> Self {
        FacetDef {
            name: name.into(),
            kind: FacetDefKind::Construct {
                target: TyCon::new(target),
                implied: Vec::new(),
            },
        }
    }

    pub fn parameter(
        name: impl Into<String>,
        target: impl Into<String>,
        parameter: impl Into<String>,
    ) -> Self {
        FacetDef {
            name: name.into(),
            kind: FacetDefKind::Parameter {
                target: TyCon::new(target),
                parameter: parameter.into(),
            },
        }
    }

    /// Record an implied type on a construction facet. No effect on
    /// parameter facets.
    pub fn implies(mut self, ty: impl Into<String>) -> Self {
        if let FacetDefKind::Construct { implied, .. } = &mut self.kind {
            implied.push(TyCon::new(ty));
        }
        self
    }

    pub fn target(&self) -> &TyCon {
        match &self.kind {
            FacetDefKind::Construct { target, .. } | FacetDefKind::Parameter { target, .. } => {
                target
            }
        }
    }
}

/// Where a parameter tag's value comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamSource {
    Literal(String),
    ConfigKey(String),
}

/// An immutable facet tag attached to a scope or property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FacetTag {
    /// The declared facet name, for diagnostics.
    pub label: String,
    pub kind: TagKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagKind {
    Construct {
        target: TyCon,
        implied: Vec<TyCon>,
    },
    Parameter {
        target: TyCon,
        parameter: String,
        source: ParamSource,
    },
    /// An additional dependency, bound through the context's generic slots
    /// when `generic_params` is non-empty.
    Uses {
        target: TyCon,
        generic_params: Vec<String>,
    },
    /// Splice in the full tag chain of other scopes.
    Source { scopes: Vec<ScopeId> },
}

impl FacetTag {
    pub fn construct(target: impl Into<String>) -> Self {
        let target = TyCon::new(target);
        FacetTag {
            label: target.name.clone(),
            kind: TagKind::Construct {
                target,
                implied: Vec::new(),
            },
        }
    }

    pub fn literal(
        target: impl Into<String>,
        parameter: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let parameter = parameter.into();
        FacetTag {
            label: parameter.clone(),
            kind: TagKind::Parameter {
                target: TyCon::new(target),
                parameter,
                source: ParamSource::Literal(value.into()),
            },
        }
    }

    pub fn config(
        target: impl Into<String>,
        parameter: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        let parameter = parameter.into();
        FacetTag {
            label: parameter.clone(),
            kind: TagKind::Parameter {
                target: TyCon::new(target),
                parameter,
                source: ParamSource::ConfigKey(key.into()),
            },
        }
    }

    pub fn uses(target: impl Into<String>, generic_params: Vec<String>) -> Self {
        FacetTag {
            label: "Uses".to_string(),
            kind: TagKind::Uses {
                target: TyCon::new(target),
                generic_params,
            },
        }
    }

    /// The type this tag applies to; `None` for source references.
    pub fn target(&self) -> Option<&TyCon> {
        match &self.kind {
            TagKind::Construct { target, .. }
            | TagKind::Parameter { target, .. }
            | TagKind::Uses { target, .. } => Some(target),
            TagKind::Source { .. } => None,
        }
    }
}

impl fmt::Display for FacetTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TagKind::Construct { .. } => write!(f, "{}", self.label),
            TagKind::Parameter {
                parameter, source, ..
            } => match source {
                ParamSource::Literal(value) => {
                    write!(f, "{}({} = {:?})", self.label, parameter, value)
                }
                ParamSource::ConfigKey(key) => {
                    write!(f, "{}({} from config {:?})", self.label, parameter, key)
                }
            },
            TagKind::Uses {
                target,
                generic_params,
            } => {
                if generic_params.is_empty() {
                    write!(f, "{}({})", self.label, target)
                } else {
                    write!(f, "{}({}<{}>)", self.label, target, generic_params.join(", "))
                }
            }
            TagKind::Source { scopes } => {
                write!(f, "Source(")?;
                for (i, scope) in scopes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "#{}", scope.0)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// A facet as written on a scope, context or property, before lowering.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Declared {
    /// Apply the named facet definition, with an optional argument for
    /// parameter facets.
    Facet {
        facet: String,
        value: Option<String>,
        config_key: Option<String>,
    },
    Uses {
        target: String,
        generic_params: Vec<String>,
    },
    Source { scopes: Vec<String> },
}

impl Declared {
    pub fn facet(name: impl Into<String>) -> Self {
        Declared::Facet {
            facet: name.into(),
            value: None,
            config_key: None,
        }
    }

    /// Set the literal argument of a parameter facet.
    pub fn value(mut self, literal: impl Into<String>) -> Self {
        if let Declared::Facet { value, .. } = &mut self {
            *value = Some(literal.into());
        }
        self
    }

    /// Set the configuration key of a parameter facet.
    pub fn config_key(mut self, key: impl Into<String>) -> Self {
        if let Declared::Facet { config_key, .. } = &mut self {
            *config_key = Some(key.into());
        }
        self
    }

    pub fn uses(target: impl Into<String>) -> Self {
        Declared::Uses {
            target: target.into(),
            generic_params: Vec::new(),
        }
    }

    /// A dependency on a generic type, bound through the named generic
    /// slots of the enclosing context.
    pub fn uses_generic<I, S>(target: impl Into<String>, generic_params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Declared::Uses {
            target: target.into(),
            generic_params: generic_params.into_iter().map(Into::into).collect(),
        }
    }

    pub fn source<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Declared::Source {
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parameter_sources() {
        assert_eq!(
            FacetTag::literal("LocalFileStorage", "rootPath", "c:/test").to_string(),
            "rootPath(rootPath = \"c:/test\")"
        );
        assert_eq!(
            FacetTag::config("LocalFileStorage", "rootPath", "config-key").to_string(),
            "rootPath(rootPath from config \"config-key\")"
        );
    }

    #[test]
    fn display_generic_uses() {
        let tag = FacetTag::uses("GenericDependency", vec!["TA".into(), "TB".into()]);
        assert_eq!(tag.to_string(), "Uses(GenericDependency<TA, TB>)");
    }

    #[test]
    fn argument_builders_only_touch_facets() {
        let declared = Declared::facet("RootPath").value("c:/test").config_key("k");
        assert_eq!(
            declared,
            Declared::Facet {
                facet: "RootPath".into(),
                value: Some("c:/test".into()),
                config_key: Some("k".into()),
            }
        );
        assert_eq!(Declared::uses("Dep").value("x"), Declared::uses("Dep"));
    }

    #[test]
    fn implied_types_only_on_construct() {
        let def = FacetDef::construct("Json", "JsonSerializer").implies("ISerializer");
        assert!(matches!(
            &def.kind,
            FacetDefKind::Construct { implied, .. } if implied.len() == 1
        ));
        let param = FacetDef::parameter("RootPath", "LocalFileStorage", "rootPath").implies("X");
        assert_eq!(param.target().name, "LocalFileStorage");
    }
}
