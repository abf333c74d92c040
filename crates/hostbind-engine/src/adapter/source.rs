//! Method sources
//!
//! A `MethodSource` is a set of declarations with bodies, all taking the
//! same receiver type. Sources are built with typed closures and erased
//! before they reach a wrapper.
//!
//! ```ignore
//! let source = MethodSource::on::<Tank>()
//!     .method(
//!         MethodDeclaration::new("getLevel").returns(ValueType::Integer),
//!         |tank, _| Ok(vec![Value::Int(tank.level())]),
//!     )
//!     .finish();
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use hostbind_sdk::TypeKey;

use super::call::{Invocation, MethodBody, MethodResult};
use super::declaration::MethodDeclaration;

/// Declarations and bodies sharing one receiver type
pub struct MethodSource {
    receiver: TypeKey,
    source_id: String,
    methods: Vec<(MethodDeclaration, MethodBody)>,
}

impl MethodSource {
    /// Methods whose receiver is the concrete type `T`
    pub fn on<T: Any + Send + Sync>() -> MethodSourceBuilder<T> {
        MethodSourceBuilder::new(TypeKey::of::<T>())
    }

    /// Methods whose receiver is the trait view `V`; bodies get `Arc<V>`
    pub fn on_view<V: ?Sized + Send + Sync + 'static>() -> MethodSourceBuilder<Arc<V>> {
        MethodSourceBuilder::new(TypeKey::of::<V>())
    }

    /// Receiver type key
    pub fn receiver(&self) -> TypeKey {
        self.receiver
    }

    /// Identifier used in descriptions and logs
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// No methods
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    pub(crate) fn into_methods(self) -> Vec<(MethodDeclaration, MethodBody)> {
        self.methods
    }
}

/// Typed builder for a `MethodSource`; `R` is what bodies receive
pub struct MethodSourceBuilder<R> {
    receiver: TypeKey,
    source_id: Option<String>,
    methods: Vec<(MethodDeclaration, MethodBody)>,
    _receiver: PhantomData<fn(&R)>,
}

impl<R: Any> MethodSourceBuilder<R> {
    fn new(receiver: TypeKey) -> Self {
        Self {
            receiver,
            source_id: None,
            methods: Vec::new(),
            _receiver: PhantomData,
        }
    }

    /// Override the source identifier (defaults to the receiver type name)
    pub fn source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    /// Add a method with a typed receiver
    pub fn method<F>(mut self, decl: MethodDeclaration, f: F) -> Self
    where
        F: Fn(&R, &Invocation<'_>) -> MethodResult + Send + Sync + 'static,
    {
        let body: MethodBody = Arc::new(move |inv: &Invocation<'_>| -> MethodResult {
            let receiver = inv.receiver::<R>()?;
            f(receiver, inv)
        });
        self.methods.push((decl, body));
        self
    }

    /// Add a method with an untyped body
    pub fn raw_method(mut self, decl: MethodDeclaration, body: MethodBody) -> Self {
        self.methods.push((decl, body));
        self
    }

    /// Erase the receiver type
    pub fn finish(self) -> MethodSource {
        let receiver = self.receiver;
        MethodSource {
            receiver,
            source_id: self
                .source_id
                .unwrap_or_else(|| receiver.name().to_string()),
            methods: self.methods,
        }
    }
}

impl<R: Any> From<MethodSourceBuilder<R>> for MethodSource {
    fn from(builder: MethodSourceBuilder<R>) -> Self {
        builder.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::call::MethodCall;
    use hostbind_sdk::{Object, Value};

    trait Level: Send + Sync {
        fn level(&self) -> i64;
    }

    struct Tank;

    impl Level for Tank {
        fn level(&self) -> i64 {
            9
        }
    }

    #[test]
    fn test_view_source_receives_arc() {
        let source = MethodSource::on_view::<dyn Level>()
            .method(MethodDeclaration::new("level"), |level, _| {
                Ok(vec![Value::Int(level.level())])
            })
            .finish();
        assert_eq!(source.receiver(), TypeKey::of::<dyn Level>());
        assert_eq!(source.len(), 1);

        let (decl, body) = source.into_methods().remove(0);
        let view: Arc<dyn Level> = Arc::new(Tank);
        let result = MethodCall::new(Arc::new(decl), body, Arc::new(view) as Object)
            .call(vec![])
            .unwrap();
        assert_eq!(result, vec![Value::Int(9)]);
    }

    #[test]
    fn test_default_source_id() {
        let source = MethodSource::on::<Tank>().finish();
        assert!(source.source_id().ends_with("Tank"));
        assert!(source.is_empty());

        let named = MethodSource::on::<Tank>().source_id("tanks").finish();
        assert_eq!(named.source_id(), "tanks");
    }
}
