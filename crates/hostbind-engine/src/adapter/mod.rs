//! Method adapters
//!
//! Declarations, executors and the registry that turns registered method
//! sources into the exposed method set of a target class.

pub mod call;
pub mod declaration;
pub mod executor;
pub mod indexed;
pub mod registry;
pub mod source;
pub mod wrapper;

pub use call::{Invocation, MethodBody, MethodCall, MethodResult};
pub use declaration::{ArgumentDescriptor, MethodDeclaration};
pub use executor::{DirectExecutor, ExternalExecutor, MethodExecutor};
pub use indexed::IndexedMethodMap;
pub use registry::{ExposedMethods, MethodRegistry};
pub use source::{MethodSource, MethodSourceBuilder};
pub use wrapper::{
    AdapterConstraints, AdapterWrapper, ExternalAdapter, ExternalAdapterWrapper, MethodAdapter,
};
