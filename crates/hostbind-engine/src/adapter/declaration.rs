//! Method declarations
//!
//! A `MethodDeclaration` is the immutable contract of one exposed method:
//! names, argument descriptors, return types, documentation, threading
//! flag and an optional return signal. It says nothing about which object
//! the method runs on; executors bind it to receivers.

use std::fmt::Write as _;

use hostbind_sdk::{TypeKey, Value, ValueType};

use crate::error::BindError;

// ============================================================================
// ArgumentDescriptor
// ============================================================================

/// One call-site argument
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentDescriptor {
    name: String,
    ty: ValueType,
    optional: bool,
    default: Option<Value>,
    variadic: bool,
    description: Option<String>,
}

impl ArgumentDescriptor {
    /// Required argument
    pub fn required(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            optional: false,
            default: None,
            variadic: false,
            description: None,
        }
    }

    /// Optional argument; `Value::Null` when omitted
    pub fn optional(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, ty)
        }
    }

    /// Optional argument with a default used when omitted
    pub fn with_default(name: impl Into<String>, ty: ValueType, default: impl Into<Value>) -> Self {
        Self {
            optional: true,
            default: Some(default.into()),
            ..Self::required(name, ty)
        }
    }

    /// Vararg tail, collecting every remaining argument
    pub fn variadic(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            variadic: true,
            ..Self::required(name, ty)
        }
    }

    /// Attach a description
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Argument name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared semantic type
    pub fn ty(&self) -> ValueType {
        self.ty
    }

    /// May be omitted
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Value filled in when omitted
    pub fn default_value(&self) -> Value {
        self.default.clone().unwrap_or(Value::Null)
    }

    /// Collects the remaining arguments
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// Description, if any
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn doc(&self) -> String {
        if self.variadic {
            format!("...:{}", self.ty)
        } else if self.optional {
            format!("[{}:{}]", self.name, self.ty)
        } else {
            format!("{}:{}", self.name, self.ty)
        }
    }
}

// ============================================================================
// MethodDeclaration
// ============================================================================

/// Immutable per-method contract
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDeclaration {
    names: Vec<String>,
    args: Vec<ArgumentDescriptor>,
    returns: Vec<ValueType>,
    description: Option<String>,
    asynchronous: bool,
    return_signal: Option<String>,
    positional: Vec<TypeKey>,
}

impl MethodDeclaration {
    /// Synchronous method with no arguments and no results
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            args: Vec::new(),
            returns: Vec::new(),
            description: None,
            asynchronous: false,
            return_signal: None,
            positional: Vec::new(),
        }
    }

    /// Add a call-site argument
    pub fn arg(mut self, arg: ArgumentDescriptor) -> Self {
        self.args.push(arg);
        self
    }

    /// Add a result type
    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns.push(ty);
        self
    }

    /// Set the documentation text
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Run on the calling thread instead of the owning thread
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// Set the threading flag explicitly
    pub fn with_asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = asynchronous;
        self
    }

    /// Deliver results later as an event named `signal`
    pub fn return_signal(mut self, signal: impl Into<String>) -> Self {
        self.return_signal = Some(signal.into());
        self
    }

    /// Expose under an additional name
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Declare a pre-bound positional parameter of type `T`
    pub fn target<T: ?Sized + 'static>(self) -> Self {
        self.positional_key(TypeKey::of::<T>())
    }

    /// Declare a pre-bound positional parameter by key
    pub fn positional_key(mut self, key: TypeKey) -> Self {
        self.positional.push(key);
        self
    }

    /// Primary name
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    /// Primary name followed by aliases
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Call-site arguments
    pub fn args(&self) -> &[ArgumentDescriptor] {
        &self.args
    }

    /// Result types
    pub fn result_types(&self) -> &[ValueType] {
        &self.returns
    }

    /// Documentation text
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Runs on the calling thread
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// Event name used to deliver results later
    pub fn signal_name(&self) -> Option<&str> {
        self.return_signal.as_deref()
    }

    /// Pre-bound positional parameter types
    pub fn positional(&self) -> &[TypeKey] {
        &self.positional
    }

    /// Number of arguments a caller must supply
    pub fn required_arity(&self) -> usize {
        self.args
            .iter()
            .filter(|a| !a.optional && !a.variadic)
            .count()
    }

    /// Maximum number of caller arguments, `None` with a vararg tail
    pub fn max_arity(&self) -> Option<usize> {
        if self.args.last().is_some_and(|a| a.variadic) {
            None
        } else {
            Some(self.args.len())
        }
    }

    /// Identity for de-duplication: name, arity and argument types
    pub fn signature_key(&self) -> (&str, usize, Vec<ValueType>) {
        (
            self.name(),
            self.args.len(),
            self.args.iter().map(|a| a.ty).collect(),
        )
    }

    /// Check the declaration is well-formed
    pub fn validate(&self) -> Result<(), BindError> {
        let invalid = |reason: &str| BindError::InvalidDeclaration {
            method: self.name().to_string(),
            reason: reason.to_string(),
        };

        if self.names.iter().any(|n| n.is_empty()) {
            return Err(invalid("empty method name"));
        }
        for (i, name) in self.names.iter().enumerate() {
            if self.names[..i].contains(name) {
                return Err(invalid(&format!("duplicate name '{}'", name)));
            }
        }

        let mut seen_optional = false;
        for (i, arg) in self.args.iter().enumerate() {
            if arg.variadic && i + 1 != self.args.len() {
                return Err(invalid(&format!("vararg '{}' must be last", arg.name)));
            }
            if arg.optional {
                seen_optional = true;
            } else if seen_optional && !arg.variadic {
                return Err(invalid(&format!(
                    "required argument '{}' after optional arguments",
                    arg.name
                )));
            }
        }
        Ok(())
    }

    /// Check that position 0 accepts values of `target_type`.
    ///
    /// External adapters receive the real target at position 0, so their
    /// methods must declare it. The declared key must name the exact type
    /// or view the adapter is bound to, since `Invocation::positional`
    /// downcasts to that type.
    pub fn validate_positional_args(&self, target_type: TypeKey) -> Result<(), BindError> {
        match self.positional.first() {
            None => Err(BindError::MissingTargetParameter {
                method: self.name().to_string(),
                expected: target_type.name().to_string(),
            }),
            Some(declared) if *declared == target_type => Ok(()),
            Some(declared) => Err(BindError::TargetTypeMismatch {
                method: self.name().to_string(),
                declared: declared.name().to_string(),
                target: target_type.name().to_string(),
            }),
        }
    }

    /// Signature documentation, e.g.
    /// `function(slot:number, [count:number]):table -- Pull items`
    pub fn signature_doc(&self) -> String {
        let mut doc = String::from("function(");
        let args: Vec<String> = self.args.iter().map(ArgumentDescriptor::doc).collect();
        doc.push_str(&args.join(", "));
        doc.push(')');

        let returns: Vec<&str> = self
            .returns
            .iter()
            .filter(|t| **t != ValueType::Void)
            .map(|t| t.name())
            .collect();
        if !returns.is_empty() {
            let _ = write!(doc, ":{}", returns.join(","));
        }

        if let Some(description) = &self.description {
            let _ = write!(doc, " -- {}", description);
        }
        doc
    }
}
