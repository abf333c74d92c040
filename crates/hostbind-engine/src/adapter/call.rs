//! Single-use method calls
//!
//! An executor starts a `MethodCall` per invocation. The call collects the
//! receiver, pre-bound positional arguments and environment objects, then
//! `call` consumes it: arity and types are checked, the body runs under
//! `catch_unwind`, and any failure is normalized into a `CallError`.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use hostbind_sdk::{FromValue, Interrupted, MethodError, Object, Value, ValueError};
use rustc_hash::FxHashMap;

use super::declaration::MethodDeclaration;
use crate::config::DEFAULT_FALLBACK_ERROR_MESSAGE;
use crate::error::{CallError, InvocationFailure};

/// Result of a method body
pub type MethodResult = Result<Vec<Value>, MethodError>;

/// Shared, stateless method body
pub type MethodBody = Arc<dyn Fn(&Invocation<'_>) -> MethodResult + Send + Sync>;

// ============================================================================
// Invocation
// ============================================================================

/// What a method body sees while it runs
pub struct Invocation<'a> {
    method: &'a str,
    receiver: &'a Object,
    args: &'a [Value],
    positional: &'a [Option<Object>],
    env: &'a FxHashMap<&'static str, Object>,
}

impl<'a> Invocation<'a> {
    /// Name of the method being invoked
    pub fn method(&self) -> &str {
        self.method
    }

    /// Receiver, downcast to `T`.
    ///
    /// Trait views arrive as `Arc<dyn Trait>`, so a body declared on
    /// `dyn Tank` asks for `receiver::<Arc<dyn Tank>>()`.
    pub fn receiver<T: Any>(&self) -> Result<&'a T, ValueError> {
        self.receiver.downcast_ref::<T>().ok_or_else(|| {
            ValueError::ArgumentError(format!(
                "receiver is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Receiver without downcasting
    pub fn receiver_object(&self) -> &'a Object {
        self.receiver
    }

    /// Call-site argument `index`, converted; missing arguments read as null
    pub fn arg<T: FromValue>(&self, index: usize) -> Result<T, ValueError> {
        match self.args.get(index) {
            Some(value) => T::from_value(value),
            None => T::from_value(&Value::Null),
        }
    }

    /// All call-site arguments, defaults filled in
    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Arguments from `from` onwards (the vararg tail)
    pub fn varargs(&self, from: usize) -> &'a [Value] {
        self.args.get(from..).unwrap_or(&[])
    }

    /// Pre-bound positional argument `index`, downcast to `T`
    pub fn positional<T: Any>(&self, index: usize) -> Result<&'a T, ValueError> {
        self.positional
            .get(index)
            .and_then(Option::as_ref)
            .and_then(|o| o.downcast_ref::<T>())
            .ok_or_else(|| {
                ValueError::ArgumentError(format!(
                    "positional argument {} is not a {}",
                    index,
                    std::any::type_name::<T>()
                ))
            })
    }

    /// Environment object injected by the host, e.g. `"computer"`
    pub fn env<T: Any>(&self, name: &str) -> Option<&'a T> {
        self.env.get(name).and_then(|o| o.downcast_ref::<T>())
    }
}

// ============================================================================
// MethodCall
// ============================================================================

/// Single-use binder for one invocation
pub struct MethodCall {
    decl: Arc<MethodDeclaration>,
    body: MethodBody,
    receiver: Object,
    positional: Vec<Option<Object>>,
    env: FxHashMap<&'static str, Object>,
    fallback_message: Option<Arc<str>>,
}

impl MethodCall {
    /// Start a call of `body` on `receiver`
    pub fn new(decl: Arc<MethodDeclaration>, body: MethodBody, receiver: Object) -> Self {
        let positional = vec![None; decl.positional().len()];
        Self {
            decl,
            body,
            receiver,
            positional,
            env: FxHashMap::default(),
            fallback_message: None,
        }
    }

    /// Declaration being called
    pub fn declaration(&self) -> &MethodDeclaration {
        &self.decl
    }

    /// Pre-bind positional argument `index`
    pub fn set_positional_arg(mut self, index: usize, value: Object) -> Self {
        if self.positional.len() <= index {
            self.positional.resize(index + 1, None);
        }
        self.positional[index] = Some(value);
        self
    }

    /// Inject a named environment object
    pub fn set_env(mut self, name: &'static str, value: Object) -> Self {
        self.env.insert(name, value);
        self
    }

    /// Message used when no error in the chain has one
    pub fn with_fallback_message(mut self, message: Arc<str>) -> Self {
        self.fallback_message = Some(message);
        self
    }

    /// Invoke with call-site arguments. Consumes the call.
    pub fn call(self, mut args: Vec<Value>) -> Result<Vec<Value>, CallError> {
        self.bind(&mut args)?;

        let invocation = Invocation {
            method: self.decl.name(),
            receiver: &self.receiver,
            args: &args,
            positional: &self.positional,
            env: &self.env,
        };
        let fallback = self
            .fallback_message
            .as_deref()
            .unwrap_or(DEFAULT_FALLBACK_ERROR_MESSAGE);

        match panic::catch_unwind(AssertUnwindSafe(|| (self.body)(&invocation))) {
            Ok(Ok(values)) => Ok(values),
            Ok(Err(err)) => Err(normalize_error(err, fallback)),
            Err(payload) => {
                let message = panic_message(payload.as_ref()).unwrap_or(fallback);
                Err(CallError::Invocation(InvocationFailure::new(message)))
            }
        }
    }

    /// Check arity and types, fill in defaults
    fn bind(&self, args: &mut Vec<Value>) -> Result<(), CallError> {
        let decl = &self.decl;
        let required = decl.required_arity();
        if args.len() < required {
            return Err(CallError::invocation(format!(
                "Expected at least {} argument(s), got {}",
                required,
                args.len()
            )));
        }
        if let Some(max) = decl.max_arity() {
            if args.len() > max {
                return Err(CallError::invocation(format!(
                    "Expected at most {} argument(s), got {}",
                    max,
                    args.len()
                )));
            }
        }

        let descriptors = decl.args();
        let fixed = descriptors.iter().take_while(|a| !a.is_variadic()).count();
        while args.len() < fixed {
            args.push(descriptors[args.len()].default_value());
        }

        for (i, value) in args.iter().enumerate() {
            let desc = &descriptors[i.min(descriptors.len() - 1)];
            if value.is_null() && (desc.is_optional() || desc.is_variadic()) {
                continue;
            }
            if !desc.ty().accepts(value) {
                return Err(CallError::invocation(format!(
                    "bad argument #{} ({}): expected {}, got {}",
                    i + 1,
                    desc.name(),
                    desc.ty(),
                    value.value_type()
                )));
            }
        }

        for (i, key) in decl.positional().iter().enumerate() {
            if self.positional.get(i).map_or(true, Option::is_none) {
                return Err(CallError::InvalidState(format!(
                    "positional argument {} ({}) not bound",
                    i, key
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for MethodCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodCall")
            .field("method", &self.decl.name())
            .field("positional", &self.positional.iter().filter(|p| p.is_some()).count())
            .field("env", &self.env.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Failure normalization
// ============================================================================

/// Turn a body error into a `CallError`.
///
/// Cancellation anywhere in the chain stays a cancellation. Anything else
/// becomes an `InvocationFailure` whose message is the first non-empty
/// message in the chain.
pub(crate) fn normalize_error(err: MethodError, fallback: &str) -> CallError {
    if is_cancellation(err.as_ref()) {
        return CallError::Cancelled;
    }
    let message = message_for_error(err.as_ref(), fallback);
    CallError::Invocation(InvocationFailure::with_cause(message, err))
}

fn is_cancellation(err: &(dyn Error + Send + Sync + 'static)) -> bool {
    let mut current: Option<&(dyn Error + 'static)> = Some(err as &(dyn Error + 'static));
    while let Some(e) = current {
        if e.is::<Interrupted>() {
            return true;
        }
        if e.downcast_ref::<CallError>().is_some_and(CallError::is_cancelled) {
            return true;
        }
        current = e.source();
    }
    false
}

/// First non-empty message in the error chain, else `fallback`
pub fn message_for_error(err: &(dyn Error + Send + Sync + 'static), fallback: &str) -> String {
    let mut current: Option<&(dyn Error + 'static)> = Some(err as &(dyn Error + 'static));
    while let Some(e) = current {
        let message = e.to_string();
        if !message.trim().is_empty() {
            return message;
        }
        current = e.source();
    }
    fallback.to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some(s)
    } else {
        payload.downcast_ref::<String>().map(String::as_str)
    }
}
