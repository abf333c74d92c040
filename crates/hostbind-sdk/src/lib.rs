//! Hostbind SDK - types shared by target authors, hosts and the engine
//!
//! This crate provides the minimal types and traits needed to expose an
//! object to a host call environment without depending on the engine:
//! semantic values, host-native values, target references with their
//! attachment capabilities, host handle traits and cancellation tokens.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hostbind_sdk::{TargetRef, Value};
//!
//! struct Tank { level: i64 }
//!
//! let target = TargetRef::builder(Arc::new(Tank { level: 3 }))
//!     .named("tank")
//!     .build();
//! assert_eq!(target.class().name(), "tank");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod arch;
pub mod cancel;
pub mod error;
pub mod host_value;
pub mod target;
pub mod value;

pub use arch::component::{ComponentAttachable, Context, Node};
pub use arch::peripheral::{Computer, LuaContext, PeripheralAttachable};
pub use arch::{ArchitectureAccess, Attachable, ConnectionId, ARCH_COMPONENT, ARCH_PERIPHERAL};
pub use cancel::CancellationToken;
pub use error::{HostError, Interrupted, MethodError, ValueError};
pub use host_value::HostValue;
pub use target::{Capabilities, Object, TargetBuilder, TargetClass, TargetRef, TypeKey};
pub use value::{FromValue, Value, ValueType};
