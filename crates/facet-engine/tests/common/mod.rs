//! Shared fixture: a small storage domain and the contexts the scenario
//! tests read from.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use facet_engine::facet_types::{Instance, ParamDef, Ty, TypeDef, TypeRegistry};
use facet_engine::{
    Catalog, CatalogBuilder, ConfigProvider, ContextDef, ContextFactory, Declared, FacetDef,
    PropertyDef, ScopeDef,
};

pub const ROOT_PATH: &str = "c:/test";
pub const CONFIG_KEY: &str = "config-key";

// ── Domain ─────────────────────────────────────────────────────────────

pub struct LocalFileStorage {
    pub root_path: String,
}

pub struct JsonSerializer;

pub struct GZipCompressor;

pub struct DataStore {
    pub storage: Instance,
    pub serializer: Instance,
    pub compressor: Option<Instance>,
}

pub struct JsonSerializerWithDependency {
    pub dependency: Instance,
}

pub struct Dependency;

pub struct GenericDependency {
    pub name: String,
}

pub struct GenericService {
    pub dependency: Instance,
}

pub fn types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    for iface in [
        "IStorage",
        "ISerializer",
        "ICompressor",
        "IDependency",
        "IGenericDependency",
        "IGenericService",
    ] {
        types.register(TypeDef::interface(iface)).unwrap();
    }
    types
        .register(TypeDef::interface("IDataStore").generic(["TData"]))
        .unwrap();

    types
        .register(
            TypeDef::class("LocalFileStorage")
                .implements(Ty::con("IStorage"))
                .constructed_by(vec![ParamDef::required("rootPath", Ty::string())], |args| {
                    Ok(Arc::new(LocalFileStorage {
                        root_path: args.text("rootPath")?.to_string(),
                    }))
                }),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("JsonSerializer")
                .implements(Ty::con("ISerializer"))
                .constructed_by(vec![], |_| Ok(Arc::new(JsonSerializer))),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("GZipCompressor")
                .implements(Ty::con("ICompressor"))
                .constructed_by(vec![], |_| Ok(Arc::new(GZipCompressor))),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("DataStore")
                .generic(["TData"])
                .implements(Ty::app("IDataStore", vec![Ty::param("TData")]))
                .constructed_by(
                    vec![
                        ParamDef::required("storage", Ty::con("IStorage")),
                        ParamDef::required("serializer", Ty::con("ISerializer")),
                        ParamDef::optional("compressor", Ty::con("ICompressor")),
                    ],
                    |args| {
                        Ok(Arc::new(DataStore {
                            storage: args.object("storage")?.clone(),
                            serializer: args.object("serializer")?.clone(),
                            compressor: args.opt_object("compressor")?.cloned(),
                        }))
                    },
                ),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("JsonSerializerWithDependency")
                .implements(Ty::con("ISerializer"))
                .constructed_by(
                    vec![ParamDef::required("dependency", Ty::con("IDependency"))],
                    |args| {
                        Ok(Arc::new(JsonSerializerWithDependency {
                            dependency: args.object("dependency")?.clone(),
                        }))
                    },
                ),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("Dependency")
                .implements(Ty::con("IDependency"))
                .constructed_by(vec![], |_| Ok(Arc::new(Dependency))),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("GenericDependency")
                .generic(["TValueA", "TValueB"])
                .implements(Ty::con("IGenericDependency"))
                .constructed_by(vec![ParamDef::required("name", Ty::string())], |args| {
                    Ok(Arc::new(GenericDependency {
                        name: args.text("name")?.to_string(),
                    }))
                }),
        )
        .unwrap();
    types
        .register(
            TypeDef::class("GenericService")
                .implements(Ty::con("IGenericService"))
                .constructed_by(
                    vec![ParamDef::required(
                        "genericDependency",
                        Ty::con("IGenericDependency"),
                    )],
                    |args| {
                        Ok(Arc::new(GenericService {
                            dependency: args.object("genericDependency")?.clone(),
                        }))
                    },
                ),
        )
        .unwrap();
    types
}

/// Type registry plus every facet definition the domain offers.
pub fn builder() -> CatalogBuilder {
    let mut builder = CatalogBuilder::new(types());
    builder
        .facet(FacetDef::parameter("RootPath", "LocalFileStorage", "rootPath"))
        .facet(FacetDef::construct("JsonSerialization", "JsonSerializer").implies("ISerializer"))
        .facet(FacetDef::construct(
            "JsonSerializationWithDependency",
            "JsonSerializerWithDependency",
        ))
        .facet(FacetDef::construct("DataStore", "DataStore"))
        .facet(FacetDef::construct("GZipCompression", "GZipCompressor"))
        .facet(FacetDef::construct("GenericService", "GenericService"))
        .facet(FacetDef::parameter(
            "GenericDependencyName",
            "GenericDependency",
            "name",
        ));
    builder
}

fn data_store_of(data: &str) -> Ty {
    Ty::app("IDataStore", vec![Ty::con(data)])
}

/// The scenario catalog.
pub fn catalog() -> Arc<Catalog> {
    let mut builder = builder();
    builder
        .scope(ScopeDef::new("FacetSource").declare(Declared::facet("GZipCompression")))
        .scope(
            ScopeDef::new("FacetSource.DataStore")
                .within("FacetSource")
                .declare(Declared::facet("DataStore")),
        )
        .scope(
            ScopeDef::new("FacetSource.DataStore.Json")
                .within("FacetSource.DataStore")
                .declare(Declared::facet("JsonSerialization")),
        )
        .scope(
            ScopeDef::new("FacetSource.SomethingElse")
                .within("FacetSource")
                .declare(Declared::facet("RootPath").value("something-else")),
        )
        .scope(
            ScopeDef::new("FacetSource.LocalStorage")
                .within("FacetSource")
                .declare(Declared::facet("RootPath").value(ROOT_PATH)),
        )
        .scope(ScopeDef::new("Templates").declare(Declared::source(["FacetSource.LocalStorage"])))
        .context(ContextDef::new("FacetContext").property(
            PropertyDef::value("Serializer", Ty::con("ISerializer"))
                .declare(Declared::facet("JsonSerialization")),
        ))
        .context(ContextDef::new("FacetParameterContext").property(
            PropertyDef::value("Storage", Ty::con("IStorage"))
                .declare(Declared::facet("RootPath").value(ROOT_PATH)),
        ))
        .context(
            ContextDef::new("ComposedContext").property(
                PropertyDef::value("DataStore", data_store_of("String"))
                    .declare(Declared::facet("DataStore"))
                    .declare(Declared::facet("RootPath").value(ROOT_PATH))
                    .declare(Declared::facet("JsonSerialization"))
                    .declare(Declared::facet("GZipCompression")),
            ),
        )
        .context(
            ContextDef::new("MissingResultFacetContext")
                .property(PropertyDef::value("Serializer", Ty::con("ISerializer"))),
        )
        .context(
            ContextDef::new("MissingParameterFacetContext").property(
                PropertyDef::value("DataStore", data_store_of("String"))
                    .declare(Declared::facet("DataStore"))
                    .declare(Declared::facet("JsonSerialization")),
            ),
        )
        .context(
            ContextDef::new("FacetAncestorContext")
                .declare(Declared::facet("JsonSerialization"))
                .property(PropertyDef::value("Serializer", Ty::con("ISerializer"))),
        )
        .context(
            ContextDef::new("NestedAncestorContext")
                .within("FacetSource.DataStore.Json")
                .property(
                    PropertyDef::value("DataStore", data_store_of("Bytes"))
                        .declare(Declared::facet("RootPath").value(ROOT_PATH)),
                ),
        )
        .context(
            ContextDef::new("SourceContext")
                .declare(Declared::source(["FacetSource.LocalStorage"]))
                .property(
                    PropertyDef::value("DataStore", data_store_of("Bytes"))
                        .declare(Declared::source(["FacetSource.DataStore.Json"])),
                ),
        )
        .context(
            ContextDef::new("TransitiveSourceContext")
                .declare(Declared::source(["Templates"]))
                .property(
                    PropertyDef::value("DataStore", data_store_of("Bytes"))
                        .declare(Declared::source(["FacetSource.DataStore.Json"])),
                ),
        )
        .context(
            ContextDef::new("OverrideContext")
                .declare(Declared::source(["FacetSource.SomethingElse"]))
                .property(
                    PropertyDef::value("Storage", Ty::con("IStorage"))
                        .declare(Declared::facet("RootPath").value(ROOT_PATH)),
                ),
        )
        .context(
            ContextDef::new("OptionalOmittedContext").property(
                PropertyDef::value("DataStore", data_store_of("String"))
                    .declare(Declared::facet("DataStore"))
                    .declare(Declared::facet("RootPath").value(ROOT_PATH))
                    .declare(Declared::facet("JsonSerialization")),
            ),
        )
        .context(ContextDef::new("ConfigKeyContext").property(
            PropertyDef::value("Storage", Ty::con("IStorage"))
                .declare(Declared::facet("RootPath").config_key(CONFIG_KEY)),
        ))
        .context(ContextDef::new("SubContext").property(
            PropertyDef::value("Storage", Ty::con("IStorage"))
                .declare(Declared::facet("RootPath").config_key(CONFIG_KEY)),
        ))
        .context(ContextDef::new("ParentContext").property(PropertyDef::context(
            "SubContext",
            "SubContext",
            vec![],
        )))
        .context(ContextDef::new("DependentContext").property(
            PropertyDef::value("Serializer", Ty::con("ISerializer"))
                .declare(Declared::facet("JsonSerializationWithDependency")),
        ))
        .context(
            ContextDef::new("UsesDependentContext").property(
                PropertyDef::value("Serializer", Ty::con("ISerializer"))
                    .declare(Declared::facet("JsonSerializationWithDependency"))
                    .declare(Declared::uses("IDependency")),
            ),
        )
        .context(
            ContextDef::new("UnusedDependencyContext").property(
                PropertyDef::value("Serializer", Ty::con("ISerializer"))
                    .declare(Declared::facet("JsonSerialization"))
                    .declare(Declared::uses("IDependency")),
            ),
        )
        .context(
            ContextDef::new("GenericContext")
                .generic(["TValueA", "TValueB"])
                .property(
                    PropertyDef::value("GenericService", Ty::con("IGenericService"))
                        .declare(Declared::facet("GenericService"))
                        .declare(Declared::uses_generic(
                            "GenericDependency",
                            ["TValueA", "TValueB"],
                        )),
                ),
        )
        .context(
            ContextDef::new("GenericParentContext").property(
                PropertyDef::context(
                    "GenericContext",
                    "GenericContext",
                    vec![Ty::con("Guid"), Ty::string()],
                )
                .declare(Declared::facet("GenericDependencyName").value("steve")),
            ),
        );
    Arc::new(builder.build().unwrap())
}

pub fn factory() -> ContextFactory {
    ContextFactory::new(catalog())
}

// ── Configuration ──────────────────────────────────────────────────────

/// Answers `CONFIG_KEY` with a fixed value and counts every lookup.
pub struct CountingProvider {
    value: String,
    calls: AtomicUsize,
}

impl CountingProvider {
    pub fn new(value: &str) -> Arc<Self> {
        Arc::new(CountingProvider {
            value: value.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ConfigProvider for CountingProvider {
    fn get_value(&self, key: &str) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (key == CONFIG_KEY).then(|| self.value.clone())
    }
}

pub fn factory_with_config(provider: Arc<CountingProvider>) -> ContextFactory {
    factory().with_config_provider(provider)
}

/// Root path of a storage instance, panicking on any other type.
pub fn root_path(instance: &Instance) -> &str {
    &instance
        .downcast_ref::<LocalFileStorage>()
        .expect("expected LocalFileStorage")
        .root_path
}
