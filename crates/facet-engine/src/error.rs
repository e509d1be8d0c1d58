//! Errors raised when a context property is read.
//!
//! Every resolution failure carries the [`Trace`] accumulated up to the
//! point of failure. `Display` renders a one-line header; [`ResolveError::report`]
//! adds the trace underneath.

use std::fmt;

use facet_types::{ArgumentError, Ty};

use crate::trace::Trace;

#[derive(Clone, Debug)]
pub enum ResolveError {
    /// A configuration-key tag was collected but no provider is installed.
    Configuration {
        key: String,
        facet: String,
        trace: Trace,
    },
    /// The construction loop stalled, or a `Uses` dependency could not be
    /// produced by any path.
    ParameterResolution { reason: String, trace: Trace },
    /// Every constructible group was built without producing the result.
    ResultResolution { result: Ty, trace: Trace },
    /// Externally resolved dependencies no construction consumed.
    DependencyUnused { unused: Vec<Ty>, trace: Trace },
    /// The type does not declare exactly one constructor.
    BinderShape {
        ty: Ty,
        constructors: usize,
        trace: Trace,
    },
    /// The constructor closure rejected the bound arguments.
    Construction {
        ty: Ty,
        source: ArgumentError,
        trace: Trace,
    },
    UnknownProperty { context: String, property: String },
    /// A value property was read as a sub-context or the other way round.
    PropertyKind {
        context: String,
        property: String,
        expected: &'static str,
    },
}

impl ResolveError {
    /// The trace recorded up to the failure, if any.
    pub fn trace(&self) -> Option<&Trace> {
        match self {
            ResolveError::Configuration { trace, .. }
            | ResolveError::ParameterResolution { trace, .. }
            | ResolveError::ResultResolution { trace, .. }
            | ResolveError::DependencyUnused { trace, .. }
            | ResolveError::BinderShape { trace, .. }
            | ResolveError::Construction { trace, .. } => Some(trace),
            ResolveError::UnknownProperty { .. } | ResolveError::PropertyKind { .. } => None,
        }
    }

    /// Header line followed by the trace.
    pub fn report(&self) -> String {
        match self.trace() {
            Some(trace) if !trace.is_empty() => format!("{}\n\n{}", self, trace),
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Configuration { key, facet, .. } => write!(
                f,
                "configuration key `{}` used by `{}` but no configuration provider is available",
                key, facet
            ),
            ResolveError::ParameterResolution { reason, .. } => {
                write!(f, "parameter could not be resolved: {}", reason)
            }
            ResolveError::ResultResolution { result, .. } => {
                write!(f, "result of type `{}` could not be resolved", result)
            }
            ResolveError::DependencyUnused { unused, .. } => {
                let names: Vec<String> = unused.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "dependency `{}` was declared with uses but never consumed",
                    names.join("`, `")
                )
            }
            ResolveError::BinderShape {
                ty, constructors, ..
            } => write!(
                f,
                "type `{}` must declare exactly one public constructor, found {}",
                ty, constructors
            ),
            ResolveError::Construction { ty, source, .. } => {
                write!(f, "constructor of `{}` rejected its arguments: {}", ty, source)
            }
            ResolveError::UnknownProperty { context, property } => {
                write!(f, "context `{}` has no property `{}`", context, property)
            }
            ResolveError::PropertyKind {
                context,
                property,
                expected,
            } => write!(
                f,
                "property `{}` of context `{}` is not a {}",
                property, context, expected
            ),
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Construction { source, .. } => Some(source),
            _ => None,
        }
    }
}
