//! Hostbind engine - wrapper synthesis and dispatch
//!
//! Exposes methods of arbitrary objects to several host call environments.
//! Method sources and external adapters are registered once; the engine
//! then builds, per target class, a dense indexed dispatch table and a
//! host-specific wrapper around it.
//!
//! # Architecture
//!
//! ```text
//! MethodRegistry  ->  IndexedMethodMap  ->  WrapperSynthesizer (cached)
//!                                              |
//!                       PeripheralWrapper / CallbackWrapper (one per target)
//!                                              |
//!                   Dispatcher: resolve -> bind -> execute -> convert
//!                                              |
//!                              OwnerThread (synchronous methods)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use hostbind_engine::{EngineOptions, HostBridge, MethodDeclaration, MethodSource};
//! use hostbind_sdk::{TargetRef, Value, ValueType};
//!
//! let bridge = HostBridge::new(EngineOptions::default())?;
//! bridge.registry().register_source(
//!     MethodSource::on::<Tank>().method(
//!         MethodDeclaration::new("getLevel").returns(ValueType::Integer),
//!         |tank, _| Ok(vec![Value::Int(tank.level)]),
//!     ),
//! );
//! let peripheral = bridge.wrap_peripheral(TargetRef::new(Tank { level: 3 }))?;
//! assert_eq!(peripheral.method_names(), &["getLevel"]);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod scheduler;
pub mod synth;

pub use adapter::{
    ArgumentDescriptor, ExternalAdapter, IndexedMethodMap, Invocation, MethodDeclaration,
    MethodExecutor, MethodRegistry, MethodResult, MethodSource,
};
pub use bridge::HostBridge;
pub use config::EngineOptions;
pub use convert::{ComponentConverter, LuaConverter, TypeConverter, TypeConverterRegistry};
pub use dispatch::Dispatcher;
pub use error::{
    BindError, CallError, ConfigError, ConvertError, EngineError, InvocationFailure,
    SchedulerError,
};
pub use host::{CallbackWrapper, PeripheralWrapper};
pub use scheduler::{OwnerThread, SyncScheduler};
pub use synth::{WrapperStyle, WrapperSynthesizer, WrapperType};
