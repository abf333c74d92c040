//! Peripheral host runtime
//!
//! A computer polls the peripheral by method index. Before resolving the
//! index the computer must still be attached; synchronous methods then run
//! on the owning thread while the calling coroutine waits. Each call gets
//! the computer and the call context as environment objects `"computer"`
//! and `"context"`.

use std::fmt;
use std::sync::Arc;

use hostbind_sdk::{Computer, HostValue, LuaContext, Object, TargetRef};

use super::attachment::AttachmentCache;
use super::AccessFactory;
use crate::dispatch::Dispatcher;
use crate::error::CallError;
use crate::synth::WrapperType;

/// Environment name of the calling computer (`Arc<dyn Computer>`)
pub const ENV_COMPUTER: &str = "computer";

/// Environment name of the call context (`Arc<dyn LuaContext>`)
pub const ENV_LUA_CONTEXT: &str = "context";

/// One target exposed to the peripheral host
pub struct PeripheralWrapper {
    wrapper: Arc<WrapperType>,
    target: TargetRef,
    dispatcher: Dispatcher,
    access_factory: AccessFactory<dyn Computer>,
    accesses: AttachmentCache,
}

impl PeripheralWrapper {
    pub(crate) fn new(
        wrapper: Arc<WrapperType>,
        target: TargetRef,
        dispatcher: Dispatcher,
        access_factory: AccessFactory<dyn Computer>,
    ) -> Self {
        Self {
            wrapper,
            target,
            dispatcher,
            access_factory,
            accesses: AttachmentCache::new(),
        }
    }

    /// Peripheral type name
    pub fn get_type(&self) -> &str {
        self.wrapper.class_name()
    }

    /// Method names in index order
    pub fn method_names(&self) -> &[String] {
        self.wrapper.methods().method_names()
    }

    /// Shared wrapper type
    pub fn wrapper_type(&self) -> &Arc<WrapperType> {
        &self.wrapper
    }

    /// Wrapped target
    pub fn target(&self) -> &TargetRef {
        &self.target
    }

    /// Access objects currently cached
    pub fn attachments(&self) -> &AttachmentCache {
        &self.accesses
    }

    /// Call method `index` on behalf of `computer`
    pub fn call_method(
        &self,
        computer: &Arc<dyn Computer>,
        context: &Arc<dyn LuaContext>,
        index: usize,
        args: Vec<HostValue>,
    ) -> Result<Vec<HostValue>, CallError> {
        // Fails once the computer has detached
        if let Err(err) = computer.attachment_name() {
            let err = CallError::from(err);
            self.dispatcher.log_failure(&self.wrapper, index, &args, &err);
            return Err(err);
        }

        let env = vec![
            (ENV_COMPUTER, Arc::new(computer.clone()) as Object),
            (ENV_LUA_CONTEXT, Arc::new(context.clone()) as Object),
        ];
        self.dispatcher.invoke(
            &self.wrapper,
            index,
            &self.target,
            env,
            args,
            context.cancellation(),
        )
    }

    /// A computer attached
    pub fn attach(&self, computer: &Arc<dyn Computer>) {
        tracing::trace!(peripheral = self.get_type(), computer = computer.id().as_u64(), "Attach");
        if let Some(attachable) = self.target.attachable() {
            let access = self
                .accesses
                .get_or_create(computer.id(), || (self.access_factory)(computer.clone()));
            attachable.add_computer(access);
        }
        if let Some(attachable) = self.target.peripheral_attachable() {
            attachable.add_computer(computer.clone());
        }
    }

    /// A computer detached
    pub fn detach(&self, computer: &Arc<dyn Computer>) {
        tracing::trace!(peripheral = self.get_type(), computer = computer.id().as_u64(), "Detach");
        if let Some(attachable) = self.target.attachable() {
            if let Some(access) = self.accesses.remove(computer.id()) {
                attachable.remove_computer(access);
            }
        }
        if let Some(attachable) = self.target.peripheral_attachable() {
            attachable.remove_computer(computer.clone());
        }
    }
}

/// Identity equality: a peripheral equals only itself
impl PartialEq for PeripheralWrapper {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for PeripheralWrapper {}

impl fmt::Debug for PeripheralWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeripheralWrapper")
            .field("type", &self.get_type())
            .field("methods", &self.method_names())
            .field("attachments", &self.accesses.len())
            .finish()
    }
}
