//! External dependency resolution.
//!
//! An optional [`DependencyResolver`] is consulted for `Uses` dependencies
//! and for constructor parameters nothing else can bind. "Not found" is the
//! only failure it can report.

use std::sync::{Arc, OnceLock};

use facet_types::{Instance, Ty, TypeRegistry};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

pub trait DependencyResolver: Send + Sync {
    /// An instance for `ty`, matched by type identity.
    fn try_resolve(&self, ty: &Ty) -> Option<Instance>;
}

impl<F> DependencyResolver for F
where
    F: Fn(&Ty) -> Option<Instance> + Send + Sync,
{
    fn try_resolve(&self, ty: &Ty) -> Option<Instance> {
        self(ty)
    }
}

type FactoryFn = Arc<dyn Fn() -> Instance + Send + Sync>;

#[derive(Clone)]
enum Registration {
    Instance(Instance),
    /// Built on first request, then shared.
    Factory {
        build: FactoryFn,
        cell: Arc<OnceLock<Instance>>,
    },
}

/// A service registry keyed by exact type.
///
/// Registrations may be added and removed while contexts are live; lookups
/// take a read lock only long enough to clone the registration out.
#[derive(Default)]
pub struct InMemoryResolver {
    services: RwLock<FxHashMap<Ty, Registration>>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under `service`, replacing any earlier entry.
    pub fn register_instance(&self, service: Ty, instance: Instance) {
        tracing::debug!(service = %service, "registered instance");
        self.services
            .write()
            .insert(service, Registration::Instance(instance));
    }

    /// Register `instance` under its own type and every interface that
    /// type implements.
    pub fn register_as_implemented(&self, types: &TypeRegistry, instance: Instance) {
        let mut services = types.interfaces_of(instance.ty());
        services.insert(0, instance.ty().clone());
        let mut map = self.services.write();
        for service in services {
            tracing::debug!(service = %service, "registered instance");
            map.insert(service, Registration::Instance(instance.clone()));
        }
    }

    /// Register a singleton factory, run at most once on first lookup.
    pub fn register_factory<F>(&self, service: Ty, build: F)
    where
        F: Fn() -> Instance + Send + Sync + 'static,
    {
        tracing::debug!(service = %service, "registered factory");
        self.services.write().insert(
            service,
            Registration::Factory {
                build: Arc::new(build),
                cell: Arc::new(OnceLock::new()),
            },
        );
    }

    /// Remove a registration. Returns whether one existed.
    pub fn unregister(&self, service: &Ty) -> bool {
        self.services.write().remove(service).is_some()
    }

    pub fn len(&self) -> usize {
        self.services.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.read().is_empty()
    }
}

impl DependencyResolver for InMemoryResolver {
    fn try_resolve(&self, ty: &Ty) -> Option<Instance> {
        // Clone out so factories run without holding the lock.
        let registration = self.services.read().get(ty).cloned()?;
        match registration {
            Registration::Instance(instance) => Some(instance),
            Registration::Factory { build, cell } => Some(cell.get_or_init(|| build()).clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet_types::TypeDef;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Dependency;

    #[test]
    fn registered_under_implemented_interfaces() {
        let mut types = TypeRegistry::new();
        types.register(TypeDef::interface("IBase")).unwrap();
        types
            .register(TypeDef::interface("IDependency").implements(Ty::con("IBase")))
            .unwrap();
        types
            .register(TypeDef::class("Dependency").implements(Ty::con("IDependency")))
            .unwrap();

        let resolver = InMemoryResolver::new();
        let instance = Instance::of(Ty::con("Dependency"), Dependency);
        resolver.register_as_implemented(&types, instance.clone());

        assert_eq!(resolver.len(), 3);
        for service in ["Dependency", "IDependency", "IBase"] {
            let found = resolver.try_resolve(&Ty::con(service)).unwrap();
            assert!(Instance::ptr_eq(&found, &instance));
        }
        assert!(resolver.try_resolve(&Ty::con("Other")).is_none());
    }

    #[test]
    fn factory_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = InMemoryResolver::new();
        let counter = calls.clone();
        resolver.register_factory(Ty::con("Dependency"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Instance::of(Ty::con("Dependency"), Dependency)
        });
        let a = resolver.try_resolve(&Ty::con("Dependency")).unwrap();
        let b = resolver.try_resolve(&Ty::con("Dependency")).unwrap();
        assert!(Instance::ptr_eq(&a, &b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregister_removes_entry() {
        let resolver = InMemoryResolver::new();
        resolver.register_instance(Ty::con("Dependency"), Instance::of(Ty::con("Dependency"), Dependency));
        assert!(resolver.unregister(&Ty::con("Dependency")));
        assert!(!resolver.unregister(&Ty::con("Dependency")));
        assert!(resolver.is_empty());
    }
}
