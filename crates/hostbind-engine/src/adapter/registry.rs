//! Method registry
//!
//! Collects adapters and answers "which methods does this class expose".
//! The answer is computed once per class and cached until the next
//! registration. Cached sets carry the revision they were collected at;
//! a set from an older revision is never served.
//!
//! De-duplication: when several declarations share a name, the one whose
//! adapter is bound to the type closest to the concrete class wins (the
//! concrete type itself, then views in the order they were added). Ties
//! at equal distance go to the adapter registered first, and within one
//! adapter to the method declared first. Identical signatures are dropped
//! silently; a differing signature is dropped with a warning.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hostbind_sdk::TargetClass;
use parking_lot::RwLock;

use super::executor::MethodExecutor;
use super::source::MethodSource;
use super::wrapper::{
    AdapterConstraints, AdapterWrapper, ExternalAdapter, ExternalAdapterWrapper, MethodAdapter,
};

/// Name (primary or alias) to executor, ordered by name
pub type ExposedMethods = BTreeMap<String, Arc<dyn MethodExecutor>>;

/// Registry of every method adapter known to the engine
#[derive(Default)]
pub struct MethodRegistry {
    adapters: RwLock<Vec<Arc<dyn MethodAdapter>>>,
    cache: DashMap<TargetClass, (u64, Arc<ExposedMethods>)>,
    revision: AtomicU64,
}

impl MethodRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register methods declared on a target type or view
    pub fn register_source(&self, source: impl Into<MethodSource>) -> Arc<dyn MethodAdapter> {
        self.register(Arc::new(AdapterWrapper::new(source.into())))
    }

    /// Register an external adapter
    pub fn register_adapter<A: ExternalAdapter>(&self, adapter: Arc<A>) -> Arc<dyn MethodAdapter> {
        self.register(Arc::new(ExternalAdapterWrapper::new(adapter)))
    }

    /// Register an external adapter with class constraints
    pub fn register_constrained_adapter<A: AdapterConstraints>(
        &self,
        adapter: Arc<A>,
    ) -> Arc<dyn MethodAdapter> {
        self.register(Arc::new(ExternalAdapterWrapper::with_constraints(adapter)))
    }

    /// Register a prepared adapter
    pub fn register(&self, adapter: Arc<dyn MethodAdapter>) -> Arc<dyn MethodAdapter> {
        tracing::debug!(
            source = adapter.source_id(),
            description = %adapter.describe(),
            methods = adapter.executors().len(),
            rejected = adapter.rejected().len(),
            "Registered adapter"
        );
        {
            // Bump under the write lock so collections see adapters and revision together
            let mut adapters = self.adapters.write();
            adapters.push(adapter.clone());
            self.revision.fetch_add(1, Ordering::AcqRel);
        }
        self.cache.clear();
        adapter
    }

    /// Bumped on every registration; executors may differ across revisions
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Number of registered adapters
    pub fn adapter_count(&self) -> usize {
        self.adapters.read().len()
    }

    /// Descriptions of the adapters that apply to `class`, closest first
    pub fn describe(&self, class: &TargetClass) -> Vec<String> {
        let adapters = self.adapters.read();
        let mut applicable: Vec<(usize, usize, String)> = adapters
            .iter()
            .enumerate()
            .filter(|(_, a)| a.can_use(class))
            .filter_map(|(order, a)| {
                class
                    .distance(a.target_type())
                    .map(|distance| (distance, order, a.describe()))
            })
            .collect();
        applicable.sort_by_key(|(distance, order, _)| (*distance, *order));
        applicable.into_iter().map(|(_, _, d)| d).collect()
    }

    /// Every method `class` exposes, de-duplicated
    pub fn methods_for(&self, class: &TargetClass) -> Arc<ExposedMethods> {
        self.snapshot(class).1
    }

    /// Methods of `class` together with the revision they were collected at
    pub fn snapshot(&self, class: &TargetClass) -> (u64, Arc<ExposedMethods>) {
        let current = self.revision();
        if let Some(hit) = self.cache.get(class) {
            if hit.0 == current {
                tracing::trace!(class = class.name(), "Method cache hit");
                return hit.clone();
            }
        }

        let (revision, methods) = self.collect(class);
        let methods = Arc::new(methods);
        tracing::debug!(
            class = class.name(),
            methods = methods.len(),
            revision,
            "Collected methods"
        );
        let mut slot = self
            .cache
            .entry(class.clone())
            .or_insert_with(|| (revision, methods.clone()));
        if slot.0 < revision {
            *slot = (revision, methods.clone());
        }
        (revision, methods)
    }

    fn collect(&self, class: &TargetClass) -> (u64, ExposedMethods) {
        let adapters = self.adapters.read();
        let revision = self.revision();

        let mut candidates: Vec<(usize, usize, &Arc<dyn MethodExecutor>)> = Vec::new();
        for (order, adapter) in adapters.iter().enumerate() {
            if !adapter.can_use(class) {
                continue;
            }
            let Some(distance) = class.distance(adapter.target_type()) else {
                continue;
            };
            for executor in adapter.executors() {
                candidates.push((distance, order, executor));
            }
        }
        // Stable: keeps declaration order inside one adapter
        candidates.sort_by_key(|(distance, order, _)| (*distance, *order));

        let mut chosen = ExposedMethods::new();
        for (_, _, executor) in candidates {
            let decl = executor.description();
            if let Some(existing) = chosen.get(decl.name()) {
                if existing.description().signature_key() != decl.signature_key() {
                    tracing::warn!(
                        class = class.name(),
                        method = decl.name(),
                        "Duplicate method with a different signature, keeping the closest"
                    );
                }
                continue;
            }
            for name in decl.names() {
                if chosen.contains_key(name) {
                    tracing::warn!(
                        class = class.name(),
                        method = decl.name(),
                        alias = name.as_str(),
                        "Alias already taken, skipping"
                    );
                    continue;
                }
                chosen.insert(name.clone(), executor.clone());
            }
        }
        (revision, chosen)
    }
}

impl std::fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("adapters", &self.adapter_count())
            .field("cached_classes", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::declaration::{ArgumentDescriptor, MethodDeclaration};
    use hostbind_sdk::{TargetRef, TypeKey, Value, ValueType};

    trait Named: Send + Sync {}

    struct Pump;

    impl Named for Pump {}

    fn pump() -> TargetRef {
        let pump = Arc::new(Pump);
        TargetRef::builder(pump.clone())
            .view::<dyn Named>(pump)
            .build()
    }

    #[test]
    fn test_closest_declaration_wins() {
        let registry = MethodRegistry::new();
        registry.register_source(
            MethodSource::on_view::<dyn Named>()
                .method(MethodDeclaration::new("name"), |_, _| Ok(vec![Value::from("view")])),
        );
        registry.register_source(
            MethodSource::on::<Pump>()
                .method(MethodDeclaration::new("name"), |_, _| Ok(vec![Value::from("pump")])),
        );

        let target = pump();
        let methods = registry.methods_for(target.class());
        assert_eq!(methods.len(), 1);
        let result = methods["name"].start_call(&target).unwrap().call(vec![]).unwrap();
        assert_eq!(result, vec![Value::from("pump")]);
        assert_eq!(methods["name"].source_type(), TypeKey::of::<Pump>());
    }

    #[test]
    fn test_tie_goes_to_first_registered() {
        let registry = MethodRegistry::new();
        registry.register_source(
            MethodSource::on::<Pump>().method(MethodDeclaration::new("id"), |_, _| Ok(vec![Value::Int(1)])),
        );
        registry.register_source(
            MethodSource::on::<Pump>()
                .method(
                    MethodDeclaration::new("id").arg(ArgumentDescriptor::required("x", ValueType::Any)),
                    |_, _| Ok(vec![Value::Int(2)]),
                ),
        );
        let target = pump();
        let methods = registry.methods_for(target.class());
        let result = methods["id"].start_call(&target).unwrap().call(vec![]).unwrap();
        assert_eq!(result, vec![Value::Int(1)]);
    }

    #[test]
    fn test_aliases_share_executor() {
        let registry = MethodRegistry::new();
        registry.register_source(
            MethodSource::on::<Pump>()
                .method(MethodDeclaration::new("getRate").alias("rate"), |_, _| Ok(vec![])),
        );
        let methods = registry.methods_for(pump().class());
        assert_eq!(methods.keys().cloned().collect::<Vec<_>>(), vec!["getRate", "rate"]);
        assert!(Arc::ptr_eq(&methods["getRate"], &methods["rate"]));
    }

    #[test]
    fn test_cache_cleared_on_register() {
        let registry = MethodRegistry::new();
        let target = pump();
        let before = registry.methods_for(target.class());
        assert!(before.is_empty());
        assert!(Arc::ptr_eq(&before, &registry.methods_for(target.class())));

        registry.register_source(
            MethodSource::on::<Pump>().method(MethodDeclaration::new("go"), |_, _| Ok(vec![])),
        );
        assert_eq!(registry.methods_for(target.class()).len(), 1);
    }

    #[test]
    fn test_set_from_older_revision_not_served() {
        let registry = MethodRegistry::new();
        let target = pump();
        let stale = registry.methods_for(target.class());
        registry.register_source(
            MethodSource::on::<Pump>().method(MethodDeclaration::new("go"), |_, _| Ok(vec![])),
        );
        // A collection that finished after the clear, as a racing reader would leave it
        registry
            .cache
            .insert((**target.class()).clone(), (0, stale));

        let (revision, methods) = registry.snapshot(target.class());
        assert_eq!(revision, registry.revision());
        assert!(methods.contains_key("go"));
        assert_eq!(registry.cache.get(&**target.class()).unwrap().0, revision);
    }

    #[test]
    fn test_unrelated_sources_ignored() {
        let registry = MethodRegistry::new();
        registry.register_source(
            MethodSource::on::<String>().method(MethodDeclaration::new("len"), |_, _| Ok(vec![])),
        );
        assert!(registry.methods_for(pump().class()).is_empty());
        assert!(registry.describe(pump().class()).is_empty());
    }
}
