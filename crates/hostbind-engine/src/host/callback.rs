//! Callback host runtime
//!
//! The callback host calls methods by symbol, one generated callback per
//! method. Direct callbacks (asynchronous methods and methods with a return
//! signal) never block on the owning thread; the others wait for it.
//! Signalling methods return a call id and push their results later.
//!
//! A wrapper may be created without a target, for hosts that require
//! default-constructible environments. Every call on such a wrapper fails
//! with `CallError::InvalidState`.

use std::fmt;
use std::sync::Arc;

use hostbind_sdk::{Context, HostValue, Node, Object, TargetRef};

use super::attachment::AttachmentCache;
use super::AccessFactory;
use crate::dispatch::{Dispatcher, Environment, SignalSink};
use crate::error::CallError;
use crate::synth::{escape_symbol, Callback, WrapperStyle, WrapperType};

/// Environment name of the environment's own node (`Arc<dyn Node>`)
pub const ENV_NODE: &str = "node";

/// Environment name of the call context (`Arc<dyn Context>`)
pub const ENV_CONTEXT: &str = "context";

/// One target exposed to the callback host
pub struct CallbackWrapper {
    wrapper: Arc<WrapperType>,
    target: Option<TargetRef>,
    node: Option<Arc<dyn Node>>,
    dispatcher: Dispatcher,
    access_factory: AccessFactory<dyn Node>,
    accesses: AttachmentCache,
}

impl CallbackWrapper {
    pub(crate) fn new(
        wrapper: Arc<WrapperType>,
        target: Option<TargetRef>,
        node: Option<Arc<dyn Node>>,
        dispatcher: Dispatcher,
        access_factory: AccessFactory<dyn Node>,
    ) -> Self {
        Self {
            wrapper,
            target,
            node,
            dispatcher,
            access_factory,
            accesses: AttachmentCache::new(),
        }
    }

    /// Shared wrapper type
    pub fn wrapper_type(&self) -> &Arc<WrapperType> {
        &self.wrapper
    }

    /// Wrapped target, `None` for a default-constructed wrapper
    pub fn target(&self) -> Option<&TargetRef> {
        self.target.as_ref()
    }

    /// The environment's own node
    pub fn node(&self) -> Option<&Arc<dyn Node>> {
        self.node.as_ref()
    }

    /// Generated callbacks in index order
    pub fn callbacks(&self) -> &[Callback] {
        self.wrapper.callbacks()
    }

    /// At least one method delivers results as a signal
    pub fn can_update(&self) -> bool {
        self.wrapper.can_update()
    }

    /// Access objects currently cached
    pub fn attachments(&self) -> &AttachmentCache {
        &self.accesses
    }

    /// Call the method named `name`
    pub fn invoke_method(
        &self,
        name: &str,
        context: &Arc<dyn Context>,
        args: Vec<HostValue>,
    ) -> Result<Vec<HostValue>, CallError> {
        self.invoke(&escape_symbol(name), context, args)
    }

    /// Call the callback exposed as `symbol`
    pub fn invoke(
        &self,
        symbol: &str,
        context: &Arc<dyn Context>,
        args: Vec<HostValue>,
    ) -> Result<Vec<HostValue>, CallError> {
        let Some(callback) = self.wrapper.callback(symbol) else {
            let err = CallError::UnknownMethod(symbol.to_string());
            self.dispatcher.log_unresolved(&self.wrapper, symbol, &args, &err);
            return Err(err);
        };
        let Some(target) = self.target.as_ref() else {
            let err = CallError::InvalidState(format!(
                "{} wrapper has no target",
                self.wrapper.class_name()
            ));
            self.dispatcher.log_failure(&self.wrapper, callback.index(), &args, &err);
            return Err(err);
        };

        let env = self.environment(context);
        let signalling = self
            .wrapper
            .entry(callback.index())
            .and_then(|e| e.return_signal())
            .is_some();

        if signalling {
            let ctx = context.clone();
            let sink: SignalSink = Arc::new(move |name: &str, payload: Vec<HostValue>| ctx.signal(name, payload));
            self.dispatcher
                .invoke_signalled(&self.wrapper, callback.index(), target, env, args, sink)
        } else {
            self.dispatcher.invoke(
                &self.wrapper,
                callback.index(),
                target,
                env,
                args,
                context.cancellation(),
            )
        }
    }

    fn environment(&self, context: &Arc<dyn Context>) -> Environment {
        let mut env: Environment = vec![(ENV_CONTEXT, Arc::new(context.clone()) as Object)];
        if self.wrapper.style() == WrapperStyle::Environment {
            if let Some(node) = &self.node {
                env.push((ENV_NODE, Arc::new(node.clone()) as Object));
            }
        }
        env
    }

    /// A node connected
    pub fn on_connect(&self, node: &Arc<dyn Node>) {
        let Some(target) = &self.target else {
            return;
        };
        tracing::trace!(class = self.wrapper.class_name(), node = %node.address(), "Connect");
        if let Some(attachable) = target.attachable() {
            let access = self
                .accesses
                .get_or_create(node.id(), || (self.access_factory)(node.clone()));
            attachable.add_computer(access);
        }
        if let Some(attachable) = target.component_attachable() {
            attachable.on_connect(node.clone());
        }
    }

    /// A node disconnected
    pub fn on_disconnect(&self, node: &Arc<dyn Node>) {
        let Some(target) = &self.target else {
            return;
        };
        tracing::trace!(class = self.wrapper.class_name(), node = %node.address(), "Disconnect");
        if let Some(attachable) = target.attachable() {
            if let Some(access) = self.accesses.remove(node.id()) {
                attachable.remove_computer(access);
            }
        }
        if let Some(attachable) = target.component_attachable() {
            attachable.on_disconnect(node.clone());
        }
    }
}

impl fmt::Debug for CallbackWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackWrapper")
            .field("class", &self.wrapper.class_name())
            .field("style", &self.wrapper.style())
            .field("has_target", &self.target.is_some())
            .field("attachments", &self.accesses.len())
            .finish()
    }
}
