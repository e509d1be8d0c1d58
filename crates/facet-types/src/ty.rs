//! Type references for the facet type registry.
//!
//! Defines the `Ty` enum and the named type constructor `TyCon`. A `Ty`
//! names a concrete type, a reference to an open generic definition, a
//! closed instantiation of a generic definition, or a generic slot inside
//! a definition. Identity is nominal throughout.

use std::fmt;

use rustc_hash::FxHashMap;

/// A generic binding environment: generic slot name -> concrete type.
pub type GenericEnv = FxHashMap<String, Ty>;

/// A type constructor -- a named type like `LocalFileStorage` or `DataStore`.
///
/// Type constructors are identified by name only. Two descriptors with the
/// same name are the same type regardless of how they were declared.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TyCon {
    pub name: String,
}

impl TyCon {
    pub fn new(name: impl Into<String>) -> Self {
        TyCon { name: name.into() }
    }
}

impl fmt::Display for TyCon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for TyCon {
    fn from(name: &str) -> Self {
        TyCon::new(name)
    }
}

/// A type reference.
///
/// - `Con`: a non-generic type, or a reference to an open generic
///   definition (`DataStore` meaning `DataStore<>`)
/// - `App`: a generic definition applied to arguments (`DataStore<String>`)
/// - `Param`: a named generic slot, only meaningful inside a definition
///   or a generic context (`TData`)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Con(TyCon),
    App(TyCon, Vec<Ty>),
    Param(String),
}

impl Ty {
    /// Create a non-generic (or open generic) type reference.
    pub fn con(name: impl Into<String>) -> Ty {
        Ty::Con(TyCon::new(name))
    }

    /// Create a closed generic instantiation.
    pub fn app(name: impl Into<String>, args: Vec<Ty>) -> Ty {
        if args.is_empty() {
            Ty::con(name)
        } else {
            Ty::App(TyCon::new(name), args)
        }
    }

    /// Create a generic slot reference.
    pub fn param(name: impl Into<String>) -> Ty {
        Ty::Param(name.into())
    }

    /// The `String` type, used for literal constructor parameters.
    pub fn string() -> Ty {
        Ty::con("String")
    }

    /// The head constructor of this type, or `None` for a generic slot.
    pub fn head(&self) -> Option<&TyCon> {
        match self {
            Ty::Con(con) | Ty::App(con, _) => Some(con),
            Ty::Param(_) => None,
        }
    }

    /// Generic arguments of a closed instantiation; empty otherwise.
    pub fn args(&self) -> &[Ty] {
        match self {
            Ty::App(_, args) => args,
            _ => &[],
        }
    }

    /// Whether the type mentions no generic slots.
    pub fn is_closed(&self) -> bool {
        match self {
            Ty::Con(_) => true,
            Ty::App(_, args) => args.iter().all(Ty::is_closed),
            Ty::Param(_) => false,
        }
    }

    /// Replace generic slots with their bindings from `env`.
    ///
    /// Slots without a binding are left in place.
    pub fn substitute(&self, env: &GenericEnv) -> Ty {
        match self {
            Ty::Con(_) => self.clone(),
            Ty::App(con, args) => {
                Ty::App(con.clone(), args.iter().map(|a| a.substitute(env)).collect())
            }
            Ty::Param(name) => env.get(name).cloned().unwrap_or_else(|| self.clone()),
        }
    }
}

/// Build a generic environment by pairing slot names with arguments.
///
/// Extra names or extra arguments are ignored.
pub fn bind_generics(params: &[String], args: &[Ty]) -> GenericEnv {
    params
        .iter()
        .cloned()
        .zip(args.iter().cloned())
        .collect()
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Con(c) => write!(f, "{}", c),
            Ty::App(con, args) => {
                write!(f, "{}<", con)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ">")
            }
            Ty::Param(name) => write!(f, "{}", name),
        }
    }
}
