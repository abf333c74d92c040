//! Method executors
//!
//! An executor is bound to one declaration and one body, never to a target
//! instance. It is shared by every wrapper of every target the method
//! applies to; `start_call` produces the per-invocation `MethodCall`.

use std::fmt;
use std::sync::Arc;

use hostbind_sdk::{Object, TargetRef, TypeKey};

use super::call::{MethodBody, MethodCall};
use super::declaration::MethodDeclaration;
use crate::error::CallError;

/// Stateless, reusable per-method contract
pub trait MethodExecutor: Send + Sync {
    /// Declaration this executor runs
    fn description(&self) -> &Arc<MethodDeclaration>;

    /// Type the method is declared on; used to rank competing declarations
    fn source_type(&self) -> TypeKey;

    /// Start a call with `target` as the logical receiver
    fn start_call(&self, target: &TargetRef) -> Result<MethodCall, CallError>;

    /// Runs on the calling thread
    fn is_asynchronous(&self) -> bool {
        self.description().is_asynchronous()
    }

    /// Event name for deferred results
    fn return_signal(&self) -> Option<&str> {
        self.description().signal_name()
    }
}

impl fmt::Debug for dyn MethodExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodExecutor")
            .field("method", &self.description().name())
            .field("source", &self.source_type())
            .field("asynchronous", &self.is_asynchronous())
            .finish()
    }
}

fn missing_view(target: &TargetRef, key: TypeKey) -> CallError {
    CallError::InvalidState(format!(
        "target {} cannot be seen as {}",
        target.class().name(),
        key
    ))
}

// ============================================================================
// DirectExecutor
// ============================================================================

/// Method declared on the target's own type or one of its views
pub struct DirectExecutor {
    decl: Arc<MethodDeclaration>,
    body: MethodBody,
    declared_on: TypeKey,
}

impl DirectExecutor {
    /// Executor for `body`, receiving the target seen as `declared_on`
    pub fn new(decl: MethodDeclaration, body: MethodBody, declared_on: TypeKey) -> Self {
        Self {
            decl: Arc::new(decl),
            body,
            declared_on,
        }
    }
}

impl MethodExecutor for DirectExecutor {
    fn description(&self) -> &Arc<MethodDeclaration> {
        &self.decl
    }

    fn source_type(&self) -> TypeKey {
        self.declared_on
    }

    fn start_call(&self, target: &TargetRef) -> Result<MethodCall, CallError> {
        let receiver = target
            .view(self.declared_on)
            .ok_or_else(|| missing_view(target, self.declared_on))?;
        Ok(MethodCall::new(
            self.decl.clone(),
            self.body.clone(),
            receiver.clone(),
        ))
    }
}

// ============================================================================
// ExternalExecutor
// ============================================================================

/// Method declared on an external adapter object.
///
/// The adapter is the receiver; the real target is pre-bound at position 0.
pub struct ExternalExecutor {
    decl: Arc<MethodDeclaration>,
    body: MethodBody,
    adapter: Object,
    target_type: TypeKey,
}

impl ExternalExecutor {
    /// Executor for `body` on `adapter`, binding targets seen as `target_type`
    pub fn new(decl: MethodDeclaration, body: MethodBody, adapter: Object, target_type: TypeKey) -> Self {
        Self {
            decl: Arc::new(decl),
            body,
            adapter,
            target_type,
        }
    }
}

impl MethodExecutor for ExternalExecutor {
    fn description(&self) -> &Arc<MethodDeclaration> {
        &self.decl
    }

    fn source_type(&self) -> TypeKey {
        self.target_type
    }

    fn start_call(&self, target: &TargetRef) -> Result<MethodCall, CallError> {
        let bound = target
            .view(self.target_type)
            .ok_or_else(|| missing_view(target, self.target_type))?;
        Ok(
            MethodCall::new(self.decl.clone(), self.body.clone(), self.adapter.clone())
                .set_positional_arg(0, bound.clone()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::call::Invocation;
    use hostbind_sdk::Value;

    struct Tank {
        level: i64,
    }

    struct TankAdapter {
        scale: i64,
    }

    #[test]
    fn test_direct_executor_reusable_across_targets() {
        let body: MethodBody = Arc::new(|inv: &Invocation<'_>| {
            Ok(vec![Value::Int(inv.receiver::<Tank>()?.level)])
        });
        let executor = DirectExecutor::new(MethodDeclaration::new("level"), body, TypeKey::of::<Tank>());

        let a = TargetRef::new(Tank { level: 1 });
        let b = TargetRef::new(Tank { level: 2 });
        assert_eq!(executor.start_call(&a).unwrap().call(vec![]).unwrap(), vec![Value::Int(1)]);
        assert_eq!(executor.start_call(&b).unwrap().call(vec![]).unwrap(), vec![Value::Int(2)]);
    }

    #[test]
    fn test_external_executor_binds_target_first() {
        let body: MethodBody = Arc::new(|inv: &Invocation<'_>| {
            let adapter = inv.receiver::<TankAdapter>()?;
            let tank = inv.positional::<Tank>(0)?;
            Ok(vec![Value::Int(tank.level * adapter.scale)])
        });
        let executor = ExternalExecutor::new(
            MethodDeclaration::new("scaled").target::<Tank>(),
            body,
            Arc::new(TankAdapter { scale: 10 }),
            TypeKey::of::<Tank>(),
        );
        let target = TargetRef::new(Tank { level: 3 });
        let result = executor.start_call(&target).unwrap().call(vec![]).unwrap();
        assert_eq!(result, vec![Value::Int(30)]);
    }

    #[test]
    fn test_missing_view_is_invalid_state() {
        let body: MethodBody = Arc::new(|_: &Invocation<'_>| Ok(vec![]));
        let executor = DirectExecutor::new(MethodDeclaration::new("x"), body, TypeKey::of::<String>());
        let target = TargetRef::new(Tank { level: 0 });
        assert!(matches!(executor.start_call(&target), Err(CallError::InvalidState(_))));
    }
}
