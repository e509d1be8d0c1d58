//! Runtime values produced and consumed by constructors.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::ty::Ty;

/// A type-erased, shareable object.
pub type Object = Arc<dyn Any + Send + Sync>;

/// A constructed object together with the runtime type it was built as.
///
/// Cloning an `Instance` shares the underlying object; use
/// [`Instance::ptr_eq`] to compare identity.
#[derive(Clone)]
pub struct Instance {
    ty: Ty,
    object: Object,
}

impl Instance {
    pub fn new(ty: Ty, object: Object) -> Self {
        Instance { ty, object }
    }

    /// Wrap a concrete value.
    pub fn of<T: Any + Send + Sync>(ty: Ty, value: T) -> Self {
        Instance::new(ty, Arc::new(value))
    }

    /// The runtime type this instance was constructed as.
    pub fn ty(&self) -> &Ty {
        &self.ty
    }

    pub fn object(&self) -> &Object {
        &self.object
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.object.clone().downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.object.is::<T>()
    }

    /// Whether both handles point at the same object.
    pub fn ptr_eq(a: &Instance, b: &Instance) -> bool {
        Arc::ptr_eq(&a.object, &b.object)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.ty)
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ty)
    }
}

/// A bound constructor argument.
#[derive(Clone, Debug)]
pub enum Value {
    /// Literal or configuration text, passed verbatim.
    Text(String),
    /// A previously constructed or externally resolved object.
    Object(Instance),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Text(_) => "text",
            Value::Object(_) => "object",
        }
    }
}

/// Error raised by a constructor closure that cannot use its arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArgumentError {
    /// A required argument was not supplied.
    Missing { parameter: String },
    /// An argument was supplied in the wrong shape.
    WrongKind {
        parameter: String,
        expected: &'static str,
        found: &'static str,
    },
    /// An object argument is not the concrete type the constructor needs.
    WrongType { parameter: String, found: Ty },
    /// The constructor does not declare a parameter with this name.
    UnknownParameter { parameter: String },
}

impl fmt::Display for ArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentError::Missing { parameter } => {
                write!(f, "argument `{}` is missing", parameter)
            }
            ArgumentError::WrongKind {
                parameter,
                expected,
                found,
            } => write!(
                f,
                "argument `{}` expected {}, found {}",
                parameter, expected, found
            ),
            ArgumentError::WrongType { parameter, found } => {
                write!(f, "argument `{}` has unexpected type `{}`", parameter, found)
            }
            ArgumentError::UnknownParameter { parameter } => {
                write!(f, "no parameter named `{}`", parameter)
            }
        }
    }
}

impl std::error::Error for ArgumentError {}

/// Constructor arguments in declared parameter order.
#[derive(Clone, Debug, Default)]
pub struct Arguments {
    values: Vec<(String, Option<Value>)>,
}

impl Arguments {
    pub fn new(values: Vec<(String, Option<Value>)>) -> Self {
        Arguments { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The argument at `index`, `None` if absent.
    pub fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(|(_, v)| v.as_ref())
    }

    /// The argument bound to `name`, `None` if absent.
    pub fn get(&self, name: &str) -> Result<Option<&Value>, ArgumentError> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_ref())
            .ok_or_else(|| ArgumentError::UnknownParameter {
                parameter: name.to_string(),
            })
    }

    pub fn opt_text(&self, name: &str) -> Result<Option<&str>, ArgumentError> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Text(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(ArgumentError::WrongKind {
                parameter: name.to_string(),
                expected: "text",
                found: other.kind(),
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, ArgumentError> {
        self.opt_text(name)?.ok_or_else(|| ArgumentError::Missing {
            parameter: name.to_string(),
        })
    }

    pub fn opt_object(&self, name: &str) -> Result<Option<&Instance>, ArgumentError> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Object(instance)) => Ok(Some(instance)),
            Some(other) => Err(ArgumentError::WrongKind {
                parameter: name.to_string(),
                expected: "object",
                found: other.kind(),
            }),
        }
    }

    pub fn object(&self, name: &str) -> Result<&Instance, ArgumentError> {
        self.opt_object(name)?.ok_or_else(|| ArgumentError::Missing {
            parameter: name.to_string(),
        })
    }

    /// Downcast an object argument to the concrete type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, ArgumentError> {
        let instance = self.object(name)?;
        instance.downcast::<T>().ok_or_else(|| ArgumentError::WrongType {
            parameter: name.to_string(),
            found: instance.ty().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker;

    fn args() -> Arguments {
        Arguments::new(vec![
            ("rootPath".into(), Some(Value::Text("c:/test".into()))),
            (
                "serializer".into(),
                Some(Value::Object(Instance::of(Ty::con("Json"), Marker))),
            ),
            ("compressor".into(), None),
        ])
    }

    #[test]
    fn text_and_object_accessors() {
        let args = args();
        assert_eq!(args.text("rootPath").unwrap(), "c:/test");
        assert!(args.object("serializer").unwrap().is::<Marker>());
        assert!(args.opt_object("compressor").unwrap().is_none());
        assert!(args.at(2).is_none());
    }

    #[test]
    fn wrong_kind_is_reported() {
        let err = args().object("rootPath").unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument `rootPath` expected object, found text"
        );
    }

    #[test]
    fn missing_required_argument() {
        let err = args().object("compressor").unwrap_err();
        assert_eq!(
            err,
            ArgumentError::Missing {
                parameter: "compressor".into()
            }
        );
    }

    #[test]
    fn unknown_parameter() {
        assert!(matches!(
            args().get("nope"),
            Err(ArgumentError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn clones_share_identity() {
        let a = Instance::of(Ty::con("Json"), Marker);
        let b = a.clone();
        let c = Instance::of(Ty::con("Json"), Marker);
        assert!(Instance::ptr_eq(&a, &b));
        assert!(!Instance::ptr_eq(&a, &c));
    }
}
