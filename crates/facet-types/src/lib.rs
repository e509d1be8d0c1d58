//! Type descriptors and runtime values for faceted construction.
//!
//! The resolution engine never inspects Rust types directly. Every type it
//! may construct or bind is described in a [`TypeRegistry`], and every object
//! it produces travels as a type-erased [`Instance`] tagged with its [`Ty`].
//!
//! # Architecture
//!
//! - [`ty`]: Nominal type references (`Ty`, `TyCon`) and generic environments
//! - [`registry`]: Type definitions, constructors, assignability
//! - [`value`]: Instances, bound argument values, constructor arguments

pub mod registry;
pub mod ty;
pub mod value;

pub use registry::{ConstructorDef, ParamDef, RegistryError, TypeDef, TypeKind, TypeRegistry};
pub use ty::{bind_generics, GenericEnv, Ty, TyCon};
pub use value::{ArgumentError, Arguments, Instance, Object, Value};
