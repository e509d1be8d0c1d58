//! Constructor binding.
//!
//! Matches one type's constructor parameters against named arguments, a
//! pool of already-built candidates and the external resolver, then invokes
//! the constructor if every parameter is satisfied.

use facet_types::{bind_generics, Arguments, Instance, Ty, TypeRegistry, Value};
use rustc_hash::FxHashMap;

use crate::error::ResolveError;
use crate::external::DependencyResolver;
use crate::trace::Trace;

/// A constructed instance and the candidates its constructor consumed.
#[derive(Debug)]
pub(crate) struct Binding {
    pub instance: Instance,
    pub consumed: Vec<Instance>,
}

pub(crate) struct Binder<'a> {
    types: &'a TypeRegistry,
    external: Option<&'a dyn DependencyResolver>,
}

impl<'a> Binder<'a> {
    pub fn new(types: &'a TypeRegistry, external: Option<&'a dyn DependencyResolver>) -> Self {
        Binder { types, external }
    }

    /// Try to build `ty`.
    ///
    /// `Ok(None)` means some parameter could not be bound; the caller may
    /// retry on a later pass. Errors are fatal.
    pub fn try_construct(
        &self,
        ty: &Ty,
        named: &FxHashMap<String, String>,
        candidates: &[Instance],
        allow_omit_optionals: bool,
        trace: &mut Trace,
    ) -> Result<Option<Binding>, ResolveError> {
        let def = ty.head().and_then(|head| self.types.get(head));
        let ctor = match def.map(|d| d.constructors.as_slice()) {
            Some([ctor]) => ctor,
            other => {
                let constructors = other.map_or(0, <[_]>::len);
                trace.note(format_args!(
                    "{} has {} constructors, expected exactly one",
                    ty, constructors
                ));
                return Err(ResolveError::BinderShape {
                    ty: ty.clone(),
                    constructors,
                    trace: trace.clone(),
                });
            }
        };
        let env = def
            .map(|d| bind_generics(&d.generic_params, ty.args()))
            .unwrap_or_default();

        let mut values = Vec::with_capacity(ctor.params.len());
        let mut consumed: Vec<Instance> = Vec::new();
        let mut missing = Vec::new();
        for param in &ctor.params {
            let expected = param.ty.substitute(&env);
            let value = if let Some(text) = named.get(&param.name) {
                Some(Value::Text(text.clone()))
            } else if let Some(candidate) = candidates
                .iter()
                .find(|c| self.types.is_assignable(c.ty(), &expected))
            {
                if !consumed.iter().any(|c| Instance::ptr_eq(c, candidate)) {
                    consumed.push(candidate.clone());
                }
                Some(Value::Object(candidate.clone()))
            } else if let Some(instance) = self.external.and_then(|r| r.try_resolve(&expected)) {
                trace.note(format_args!(
                    "Resolved parameter {} of {} externally",
                    param.name, ty
                ));
                Some(Value::Object(instance))
            } else {
                None
            };
            if value.is_none() && !(param.optional && allow_omit_optionals) {
                missing.push(param.name.as_str());
            }
            values.push((param.name.clone(), value));
        }

        if !missing.is_empty() {
            trace.note(format_args!(
                "Cannot create {}, missing parameters {}",
                ty,
                missing.join(", ")
            ));
            return Ok(None);
        }

        let arguments = Arguments::new(values);
        let object = ctor
            .invoke(&arguments)
            .map_err(|source| ResolveError::Construction {
                ty: ty.clone(),
                source,
                trace: trace.clone(),
            })?;
        trace.note(format_args!("Created {}", ty));
        tracing::debug!(ty = %ty, consumed = consumed.len(), "constructed instance");
        Ok(Some(Binding {
            instance: Instance::new(ty.clone(), object),
            consumed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_types::{ArgumentError, ParamDef, TypeDef};
    use std::sync::Arc;

    struct Storage {
        root_path: String,
    }

    struct Store {
        compressor: Option<Instance>,
    }

    fn types() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(TypeDef::interface("IStorage")).unwrap();
        types.register(TypeDef::interface("ICompressor")).unwrap();
        types
            .register(
                TypeDef::class("LocalFileStorage")
                    .implements(Ty::con("IStorage"))
                    .constructed_by(
                        vec![ParamDef::required("rootPath", Ty::string())],
                        |args| {
                            Ok(Arc::new(Storage {
                                root_path: args.text("rootPath")?.to_string(),
                            }))
                        },
                    ),
            )
            .unwrap();
        types
            .register(TypeDef::class("DataStore").constructed_by(
                vec![
                    ParamDef::required("storage", Ty::con("IStorage")),
                    ParamDef::optional("compressor", Ty::con("ICompressor")),
                ],
                |args| {
                    args.object("storage")?;
                    Ok(Arc::new(Store {
                        compressor: args.opt_object("compressor")?.cloned(),
                    }))
                },
            ))
            .unwrap();
        types
            .register(
                TypeDef::class("Overloaded")
                    .constructed_by(vec![], |_| Ok(Arc::new(())))
                    .constructed_by(vec![], |_| Ok(Arc::new(()))),
            )
            .unwrap();
        types
            .register(TypeDef::class("Picky").constructed_by(
                vec![ParamDef::required("rootPath", Ty::string())],
                |args| {
                    args.object("rootPath")?;
                    Ok(Arc::new(()))
                },
            ))
            .unwrap();
        types
    }

    fn named(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn named_argument_is_used_verbatim() {
        let types = types();
        let binder = Binder::new(&types, None);
        let binding = binder
            .try_construct(
                &Ty::con("LocalFileStorage"),
                &named(&[("rootPath", "c:/test")]),
                &[],
                false,
                &mut Trace::new(),
            )
            .unwrap()
            .unwrap();
        let storage = binding.instance.downcast_ref::<Storage>().unwrap();
        assert_eq!(storage.root_path, "c:/test");
        assert!(binding.consumed.is_empty());
    }

    #[test]
    fn first_assignable_candidate_is_consumed() {
        let types = types();
        let binder = Binder::new(&types, None);
        let first = Instance::of(Ty::con("LocalFileStorage"), Storage { root_path: "a".into() });
        let second = Instance::of(Ty::con("LocalFileStorage"), Storage { root_path: "b".into() });
        let binding = binder
            .try_construct(
                &Ty::con("DataStore"),
                &FxHashMap::default(),
                &[first.clone(), second],
                true,
                &mut Trace::new(),
            )
            .unwrap()
            .unwrap();
        assert_eq!(binding.consumed.len(), 1);
        assert!(Instance::ptr_eq(&binding.consumed[0], &first));
        assert!(binding.instance.downcast_ref::<Store>().unwrap().compressor.is_none());
    }

    #[test]
    fn optional_parameter_needs_relaxation() {
        let types = types();
        let binder = Binder::new(&types, None);
        let storage = Instance::of(Ty::con("LocalFileStorage"), Storage { root_path: "a".into() });
        let mut trace = Trace::new();
        let strict = binder
            .try_construct(
                &Ty::con("DataStore"),
                &FxHashMap::default(),
                &[storage],
                false,
                &mut trace,
            )
            .unwrap();
        assert!(strict.is_none());
        assert_eq!(
            trace.lines(),
            &["Cannot create DataStore, missing parameters compressor".to_string()]
        );
    }

    #[test]
    fn external_resolver_fills_remaining_parameters() {
        let types = types();
        let external = |ty: &Ty| {
            (ty == &Ty::con("ICompressor")).then(|| Instance::of(Ty::con("GZipCompressor"), ()))
        };
        let binder = Binder::new(&types, Some(&external as &dyn DependencyResolver));
        let storage = Instance::of(Ty::con("LocalFileStorage"), Storage { root_path: "a".into() });
        let binding = binder
            .try_construct(
                &Ty::con("DataStore"),
                &FxHashMap::default(),
                &[storage],
                false,
                &mut Trace::new(),
            )
            .unwrap()
            .unwrap();
        assert!(binding.instance.downcast_ref::<Store>().unwrap().compressor.is_some());
    }

    #[test]
    fn constructor_count_must_be_one() {
        let types = types();
        let binder = Binder::new(&types, None);
        let err = binder
            .try_construct(
                &Ty::con("Overloaded"),
                &FxHashMap::default(),
                &[],
                false,
                &mut Trace::new(),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "type `Overloaded` must declare exactly one public constructor, found 2"
        );
        let err = binder
            .try_construct(
                &Ty::con("IStorage"),
                &FxHashMap::default(),
                &[],
                false,
                &mut Trace::new(),
            )
            .unwrap_err();
        assert!(matches!(err, ResolveError::BinderShape { constructors: 0, .. }));
    }

    #[test]
    fn rejected_arguments_are_construction_errors() {
        let types = types();
        let binder = Binder::new(&types, None);
        let err = binder
            .try_construct(
                &Ty::con("Picky"),
                &named(&[("rootPath", "c:/test")]),
                &[],
                false,
                &mut Trace::new(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::Construction {
                source: ArgumentError::WrongKind { .. },
                ..
            }
        ));
    }
}
