//! Type descriptor registry: definitions, constructors and assignability.
//!
//! Every type the engine may construct, or that a parameter may ask for,
//! is described here. Classes carry exactly the constructors the engine
//! may call; interfaces only carry the interfaces they extend.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::ty::{bind_generics, Ty, TyCon};
use crate::value::{ArgumentError, Arguments, Object};

/// The closure that builds an object from bound arguments.
pub type ConstructFn = Arc<dyn Fn(&Arguments) -> Result<Object, ArgumentError> + Send + Sync>;

/// Whether a type can be constructed or is an abstraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
}

/// One declared constructor parameter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParamDef {
    pub name: String,
    /// Declared type; may mention the owning definition's generic slots.
    pub ty: Ty,
    /// Optional parameters may be left absent during the relaxation pass.
    pub optional: bool,
}

impl ParamDef {
    pub fn required(name: impl Into<String>, ty: Ty) -> Self {
        ParamDef {
            name: name.into(),
            ty,
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>, ty: Ty) -> Self {
        ParamDef {
            name: name.into(),
            ty,
            optional: true,
        }
    }
}

/// A public constructor.
#[derive(Clone)]
pub struct ConstructorDef {
    pub params: Vec<ParamDef>,
    build: ConstructFn,
}

impl ConstructorDef {
    pub fn new<F>(params: Vec<ParamDef>, build: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Object, ArgumentError> + Send + Sync + 'static,
    {
        ConstructorDef {
            params,
            build: Arc::new(build),
        }
    }

    /// Call the constructor with arguments in declared parameter order.
    pub fn invoke(&self, args: &Arguments) -> Result<Object, ArgumentError> {
        (self.build)(args)
    }
}

impl fmt::Debug for ConstructorDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDef")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A type definition.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub name: TyCon,
    pub kind: TypeKind,
    /// Generic slot names, in declaration order. Empty for non-generic types.
    pub generic_params: Vec<String>,
    /// Interfaces this type implements (or, for an interface, extends).
    pub implements: Vec<Ty>,
    pub constructors: Vec<ConstructorDef>,
}

impl TypeDef {
    pub fn class(name: impl Into<String>) -> Self {
        TypeDef {
            name: TyCon::new(name),
            kind: TypeKind::Class,
            generic_params: Vec::new(),
            implements: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        TypeDef {
            kind: TypeKind::Interface,
            ..TypeDef::class(name)
        }
    }

    pub fn generic<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.generic_params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn implements(mut self, interface: Ty) -> Self {
        self.implements.push(interface);
        self
    }

    pub fn constructor(mut self, ctor: ConstructorDef) -> Self {
        self.constructors.push(ctor);
        self
    }

    /// Shorthand for `constructor(ConstructorDef::new(params, build))`.
    pub fn constructed_by<F>(self, params: Vec<ParamDef>, build: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Object, ArgumentError> + Send + Sync + 'static,
    {
        self.constructor(ConstructorDef::new(params, build))
    }

    pub fn is_generic(&self) -> bool {
        !self.generic_params.is_empty()
    }

    /// The definition's own type, with generic slots left open.
    pub fn self_ty(&self) -> Ty {
        Ty::app(
            self.name.name.clone(),
            self.generic_params.iter().map(Ty::param).collect(),
        )
    }
}

/// Errors raised while registering type definitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateType { name: String },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::DuplicateType { name } => {
                write!(f, "type `{}` is already registered", name)
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// The type registry: every definition keyed by name.
#[derive(Default, Debug, Clone)]
pub struct TypeRegistry {
    types: FxHashMap<TyCon, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: TypeDef) -> Result<(), RegistryError> {
        if self.types.contains_key(&def.name) {
            return Err(RegistryError::DuplicateType {
                name: def.name.name.clone(),
            });
        }
        self.types.insert(def.name.clone(), def);
        Ok(())
    }

    pub fn get(&self, name: &TyCon) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &TyCon) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn is_interface(&self, name: &TyCon) -> bool {
        self.get(name)
            .map_or(false, |def| def.kind == TypeKind::Interface)
    }

    pub fn is_generic(&self, name: &TyCon) -> bool {
        self.get(name).map_or(false, TypeDef::is_generic)
    }

    /// Whether `ty` names a definition's head, ignoring generic arguments.
    pub fn implements(&self, ty: &TyCon, interface: &TyCon) -> bool {
        self.implements_within(ty, interface, self.types.len())
    }

    fn implements_within(&self, ty: &TyCon, interface: &TyCon, fuel: usize) -> bool {
        let Some(def) = self.get(ty) else {
            return false;
        };
        def.implements.iter().filter_map(Ty::head).any(|head| {
            head == interface || (fuel > 0 && self.implements_within(head, interface, fuel - 1))
        })
    }

    /// Every interface `ty` implements, transitively, with generic
    /// arguments substituted. Declaration order, outermost first.
    pub fn interfaces_of(&self, ty: &Ty) -> Vec<Ty> {
        let mut out = Vec::new();
        self.collect_interfaces(ty, &mut out, self.types.len());
        out
    }

    fn collect_interfaces(&self, ty: &Ty, out: &mut Vec<Ty>, fuel: usize) {
        let Some(def) = ty.head().and_then(|head| self.get(head)) else {
            return;
        };
        let env = bind_generics(&def.generic_params, ty.args());
        for iface in &def.implements {
            let iface = iface.substitute(&env);
            if !out.contains(&iface) {
                out.push(iface.clone());
                if fuel > 0 {
                    self.collect_interfaces(&iface, out, fuel - 1);
                }
            }
        }
    }

    /// Whether a value of type `from` may be passed where `to` is expected.
    ///
    /// True for identical types, for any instantiation of an open generic
    /// reference `to`, and for any interface `from` implements after
    /// substituting its generic arguments.
    pub fn is_assignable(&self, from: &Ty, to: &Ty) -> bool {
        self.assignable_within(from, to, self.types.len())
    }

    fn assignable_within(&self, from: &Ty, to: &Ty, fuel: usize) -> bool {
        if from == to {
            return true;
        }
        let Some(from_head) = from.head() else {
            return false;
        };
        if let Ty::Con(open) = to {
            if open == from_head && self.is_generic(open) {
                return true;
            }
        }
        let Some(def) = self.get(from_head) else {
            return false;
        };
        if fuel == 0 {
            return false;
        }
        let env = bind_generics(&def.generic_params, from.args());
        def.implements
            .iter()
            .any(|iface| self.assignable_within(&iface.substitute(&env), to, fuel - 1))
    }
}
