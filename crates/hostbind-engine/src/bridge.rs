//! Host bridge
//!
//! Ties the pieces together: the method registry, the converter registry,
//! the wrapper synthesizer and the owning-thread scheduler. Hosts ask the
//! bridge to wrap targets; everything after that goes through the
//! returned wrapper.

use std::sync::Arc;

use hostbind_sdk::{Computer, Node, TargetRef, ARCH_COMPONENT, ARCH_PERIPHERAL};

use crate::adapter::MethodRegistry;
use crate::config::EngineOptions;
use crate::convert::TypeConverterRegistry;
use crate::dispatch::Dispatcher;
use crate::error::{CallError, EngineError};
use crate::host::{AccessFactory, CallbackWrapper, NodeAccess, PeripheralAccess, PeripheralWrapper};
use crate::scheduler::{OwnerThread, SyncScheduler};
use crate::synth::{WrapperKey, WrapperStyle, WrapperSynthesizer, WrapperType};

/// Entry point for hosts
pub struct HostBridge {
    options: EngineOptions,
    registry: MethodRegistry,
    converters: TypeConverterRegistry,
    synthesizer: WrapperSynthesizer,
    scheduler: Arc<dyn SyncScheduler>,
    owner: Option<Arc<OwnerThread>>,
    peripheral_access: Option<AccessFactory<dyn Computer>>,
    node_access: Option<AccessFactory<dyn Node>>,
}

impl HostBridge {
    /// Bridge with its own owning thread
    pub fn new(options: EngineOptions) -> Result<Self, EngineError> {
        options.validate()?;
        let owner = Arc::new(OwnerThread::spawn(options.owner_thread_name.clone())?);
        let scheduler: Arc<dyn SyncScheduler> = owner.clone();
        let mut bridge = Self::with_scheduler(options, scheduler)?;
        bridge.owner = Some(owner);
        Ok(bridge)
    }

    /// Bridge synchronizing on an existing scheduler
    pub fn with_scheduler(
        options: EngineOptions,
        scheduler: Arc<dyn SyncScheduler>,
    ) -> Result<Self, EngineError> {
        options.validate()?;
        Ok(Self {
            options,
            registry: MethodRegistry::new(),
            converters: TypeConverterRegistry::with_defaults(),
            synthesizer: WrapperSynthesizer::new(),
            scheduler,
            owner: None,
            peripheral_access: None,
            node_access: None,
        })
    }

    /// Replace the access factory for computers
    pub fn with_peripheral_access(mut self, factory: AccessFactory<dyn Computer>) -> Self {
        self.peripheral_access = Some(factory);
        self
    }

    /// Replace the access factory for network nodes
    pub fn with_node_access(mut self, factory: AccessFactory<dyn Node>) -> Self {
        self.node_access = Some(factory);
        self
    }

    /// Options in effect
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Method registry
    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// Converter registry
    pub fn converters(&self) -> &TypeConverterRegistry {
        &self.converters
    }

    /// Wrapper synthesizer
    pub fn synthesizer(&self) -> &WrapperSynthesizer {
        &self.synthesizer
    }

    /// Scheduler running synchronous methods
    pub fn scheduler(&self) -> &Arc<dyn SyncScheduler> {
        &self.scheduler
    }

    /// The bridge's own owning thread, if it started one
    pub fn owner_thread(&self) -> Option<&Arc<OwnerThread>> {
        self.owner.as_ref()
    }

    /// Wrapper type for `target` in `style`, synthesized on first use
    pub fn wrapper_type(&self, target: &TargetRef, style: WrapperStyle) -> Arc<WrapperType> {
        let class = target.class();
        // The revision must be the one the method set was collected at
        let (revision, exposed) = self.registry.snapshot(class);
        let key = WrapperKey::new(
            (**class).clone(),
            style,
            target.capabilities(),
            exposed.keys().cloned(),
            revision,
        );
        self.synthesizer.synthesize(key, &exposed)
    }

    /// Wrapper type for value objects of `target`'s class
    pub fn object_type_for(&self, target: &TargetRef) -> Arc<WrapperType> {
        self.wrapper_type(target, WrapperStyle::Object)
    }

    fn dispatcher(&self, architecture: &str) -> Result<Dispatcher, EngineError> {
        let converter = self.converters.get(architecture)?;
        Ok(Dispatcher::new(converter, self.scheduler.clone(), &self.options))
    }

    /// Expose `target` to the peripheral host
    pub fn wrap_peripheral(&self, target: TargetRef) -> Result<PeripheralWrapper, EngineError> {
        let wrapper = self.wrapper_type(&target, WrapperStyle::Peripheral);
        let dispatcher = self.dispatcher(ARCH_PERIPHERAL)?;
        let factory = match &self.peripheral_access {
            Some(factory) => factory.clone(),
            None => PeripheralAccess::factory(dispatcher.converter().clone()),
        };
        Ok(PeripheralWrapper::new(wrapper, target, dispatcher, factory))
    }

    /// Expose `target` to the callback host as a network environment
    pub fn wrap_environment(
        &self,
        target: TargetRef,
        node: Option<Arc<dyn Node>>,
    ) -> Result<CallbackWrapper, EngineError> {
        let wrapper = self.wrapper_type(&target, WrapperStyle::Environment);
        self.callback_wrapper(wrapper, Some(target), node)
    }

    /// Expose `target` to the callback host as a value object
    pub fn wrap_object(&self, target: TargetRef) -> Result<CallbackWrapper, EngineError> {
        let wrapper = self.object_type_for(&target);
        self.callback_wrapper(wrapper, Some(target), None)
    }

    /// Instance of `wrapper` with no target; every call fails with `InvalidState`
    pub fn default_instance(&self, wrapper: Arc<WrapperType>) -> Result<CallbackWrapper, EngineError> {
        if !wrapper.style().has_callbacks() {
            return Err(CallError::InvalidState(format!(
                "{:?} wrappers cannot be default-constructed",
                wrapper.style()
            ))
            .into());
        }
        self.callback_wrapper(wrapper, None, None)
    }

    fn callback_wrapper(
        &self,
        wrapper: Arc<WrapperType>,
        target: Option<TargetRef>,
        node: Option<Arc<dyn Node>>,
    ) -> Result<CallbackWrapper, EngineError> {
        let dispatcher = self.dispatcher(ARCH_COMPONENT)?;
        let factory = match &self.node_access {
            Some(factory) => factory.clone(),
            None => NodeAccess::factory(dispatcher.converter().clone()),
        };
        Ok(CallbackWrapper::new(wrapper, target, node, dispatcher, factory))
    }
}

impl std::fmt::Debug for HostBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBridge")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("synthesizer", &self.synthesizer)
            .finish()
    }
}
