//! Adapter wrappers
//!
//! A wrapper turns one method source into executors. Methods declared
//! directly on a target type become `DirectExecutor`s; methods of an
//! external adapter object become `ExternalExecutor`s that receive the
//! real target at position 0. A method that fails validation is logged
//! and skipped; the rest of the adapter survives.

use std::any::Any;
use std::sync::Arc;

use hostbind_sdk::{Object, TargetClass, TypeKey};

use super::call::MethodBody;
use super::declaration::MethodDeclaration;
use super::executor::{DirectExecutor, ExternalExecutor, MethodExecutor};
use super::source::MethodSource;
use crate::error::BindError;

/// A set of executors applicable to some target classes
pub trait MethodAdapter: Send + Sync {
    /// Type the adapter's methods bind to
    fn target_type(&self) -> TypeKey;

    /// Source identifier
    fn source_id(&self) -> &str;

    /// Whether the adapter applies to `class`
    fn can_use(&self, class: &TargetClass) -> bool;

    /// Human-readable description of where the methods come from
    fn describe(&self) -> String;

    /// Executors for every accepted method
    fn executors(&self) -> &[Arc<dyn MethodExecutor>];

    /// Registration errors for methods that were skipped
    fn rejected(&self) -> &[BindError];
}

/// Validate every declaration and keep the ones that pass
fn build_executors<F>(
    source_id: &str,
    methods: Vec<(MethodDeclaration, MethodBody)>,
    mut check: impl FnMut(&MethodDeclaration) -> Result<(), BindError>,
    mut make: F,
) -> (Vec<Arc<dyn MethodExecutor>>, Vec<BindError>)
where
    F: FnMut(MethodDeclaration, MethodBody) -> Arc<dyn MethodExecutor>,
{
    let mut executors = Vec::with_capacity(methods.len());
    let mut rejected = Vec::new();
    for (decl, body) in methods {
        match decl.validate().and_then(|_| check(&decl)) {
            Ok(()) => executors.push(make(decl, body)),
            Err(err) => {
                tracing::warn!(
                    source = source_id,
                    method = decl.name(),
                    error = %err,
                    "Skipping method"
                );
                rejected.push(err);
            }
        }
    }
    (executors, rejected)
}

// ============================================================================
// AdapterWrapper (direct)
// ============================================================================

/// Methods declared on the target type itself (or one of its views)
pub struct AdapterWrapper {
    target_type: TypeKey,
    source_id: String,
    executors: Vec<Arc<dyn MethodExecutor>>,
    rejected: Vec<BindError>,
}

impl AdapterWrapper {
    /// Build executors from a direct method source
    pub fn new(source: MethodSource) -> Self {
        let target_type = source.receiver();
        let source_id = source.source_id().to_string();
        let (executors, rejected) = build_executors(
            &source_id,
            source.into_methods(),
            |_| Ok(()),
            |decl, body| Arc::new(DirectExecutor::new(decl, body, target_type)),
        );
        Self {
            target_type,
            source_id,
            executors,
            rejected,
        }
    }
}

impl MethodAdapter for AdapterWrapper {
    fn target_type(&self) -> TypeKey {
        self.target_type
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn can_use(&self, class: &TargetClass) -> bool {
        class.is_assignable_to(self.target_type)
    }

    fn describe(&self) -> String {
        format!("internal (source: {})", self.target_type)
    }

    fn executors(&self) -> &[Arc<dyn MethodExecutor>] {
        &self.executors
    }

    fn rejected(&self) -> &[BindError] {
        &self.rejected
    }
}

// ============================================================================
// External adapters
// ============================================================================

/// Object exposing methods on behalf of another type.
///
/// Its methods take the adapter as receiver and must declare the target
/// type as positional parameter 0.
pub trait ExternalAdapter: Any + Send + Sync {
    /// Type of the objects this adapter serves
    fn target_type(&self) -> TypeKey;

    /// Source identifier
    fn source_id(&self) -> String;

    /// Methods, built on `MethodSource::on::<Self>()`
    fn methods(&self) -> MethodSource;
}

/// External adapter that only applies to some classes
pub trait AdapterConstraints: ExternalAdapter {
    /// Whether the adapter applies to `class`
    fn can_apply(&self, class: &TargetClass) -> bool;
}

type Constraint = Arc<dyn Fn(&TargetClass) -> bool + Send + Sync>;

/// Methods contributed by an external adapter object
pub struct ExternalAdapterWrapper {
    adapter_type: TypeKey,
    target_type: TypeKey,
    source_id: String,
    constraint: Option<Constraint>,
    executors: Vec<Arc<dyn MethodExecutor>>,
    rejected: Vec<BindError>,
}

impl ExternalAdapterWrapper {
    /// Wrap an unconstrained adapter
    pub fn new<A: ExternalAdapter>(adapter: Arc<A>) -> Self {
        Self::build(adapter, None)
    }

    /// Wrap an adapter that restricts the classes it applies to
    pub fn with_constraints<A: AdapterConstraints>(adapter: Arc<A>) -> Self {
        let checker = adapter.clone();
        let constraint: Constraint = Arc::new(move |class: &TargetClass| checker.can_apply(class));
        Self::build(adapter, Some(constraint))
    }

    fn build<A: ExternalAdapter>(adapter: Arc<A>, constraint: Option<Constraint>) -> Self {
        let target_type = adapter.target_type();
        let source_id = adapter.source_id();
        let receiver: Object = adapter.clone();
        let (executors, rejected) = build_executors(
            &source_id,
            adapter.methods().into_methods(),
            |decl| decl.validate_positional_args(target_type),
            |decl, body| {
                Arc::new(ExternalExecutor::new(
                    decl,
                    body,
                    receiver.clone(),
                    target_type,
                ))
            },
        );
        Self {
            adapter_type: TypeKey::of::<A>(),
            target_type,
            source_id,
            constraint,
            executors,
            rejected,
        }
    }
}

impl MethodAdapter for ExternalAdapterWrapper {
    fn target_type(&self) -> TypeKey {
        self.target_type
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn can_use(&self, class: &TargetClass) -> bool {
        if !class.is_assignable_to(self.target_type) {
            return false;
        }
        match &self.constraint {
            Some(constraint) => constraint(class),
            None => true,
        }
    }

    fn describe(&self) -> String {
        if self.constraint.is_some() {
            format!("external object (w/ constraints) (source: {})", self.adapter_type)
        } else {
            format!("external (source: {})", self.adapter_type)
        }
    }

    fn executors(&self) -> &[Arc<dyn MethodExecutor>] {
        &self.executors
    }

    fn rejected(&self) -> &[BindError] {
        &self.rejected
    }
}
