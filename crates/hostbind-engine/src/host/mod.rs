//! Host runtimes
//!
//! One runtime per host protocol. The peripheral runtime exposes a single
//! dispatch-by-index entry point; the callback runtime exposes one
//! callback per method. Both fire attach/detach notifications to targets
//! and cache one access object per connection.

pub mod attachment;
pub mod callback;
pub mod peripheral;

use std::sync::Arc;

use hostbind_sdk::{
    ArchitectureAccess, Computer, HostValue, Node, Value, ARCH_COMPONENT, ARCH_PERIPHERAL,
};

use crate::convert::TypeConverter;

pub use attachment::AttachmentCache;
pub use callback::CallbackWrapper;
pub use peripheral::PeripheralWrapper;

/// Builds the access object for a connection handle of type `H`
pub type AccessFactory<H> = Arc<dyn Fn(Arc<H>) -> Arc<dyn ArchitectureAccess> + Send + Sync>;

fn convert_all(converter: &dyn TypeConverter, args: Vec<Value>) -> Option<Vec<HostValue>> {
    match converter.to_host_all(&args) {
        Ok(values) => Some(values),
        Err(err) => {
            tracing::warn!(error = %err, "Cannot convert signal arguments");
            None
        }
    }
}

// ============================================================================
// Peripheral host access
// ============================================================================

/// Access object for a computer
pub struct PeripheralAccess {
    computer: Arc<dyn Computer>,
    converter: Arc<dyn TypeConverter>,
}

impl PeripheralAccess {
    /// Access for `computer`, converting signal payloads with `converter`
    pub fn new(computer: Arc<dyn Computer>, converter: Arc<dyn TypeConverter>) -> Self {
        Self {
            computer,
            converter,
        }
    }

    /// Default factory
    pub fn factory(converter: Arc<dyn TypeConverter>) -> AccessFactory<dyn Computer> {
        Arc::new(move |computer: Arc<dyn Computer>| {
            Arc::new(PeripheralAccess::new(computer, converter.clone())) as Arc<dyn ArchitectureAccess>
        })
    }
}

impl ArchitectureAccess for PeripheralAccess {
    fn architecture(&self) -> &str {
        ARCH_PERIPHERAL
    }

    fn caller_name(&self) -> String {
        self.computer.label()
    }

    /// Empty once the computer has detached
    fn peripheral_name(&self) -> String {
        match self.computer.attachment_name() {
            Ok(name) => name,
            Err(err) => {
                tracing::debug!(
                    computer = self.computer.id().as_u64(),
                    caller = %self.computer.label(),
                    error = %err,
                    "No attachment name for computer"
                );
                String::new()
            }
        }
    }

    fn signal(&self, name: &str, args: Vec<Value>) -> bool {
        match convert_all(&*self.converter, args) {
            Some(values) => {
                self.computer.queue_event(name, values);
                true
            }
            None => false,
        }
    }
}

// ============================================================================
// Callback host access
// ============================================================================

/// Access object for a network node
pub struct NodeAccess {
    node: Arc<dyn Node>,
    converter: Arc<dyn TypeConverter>,
}

impl NodeAccess {
    /// Access for `node`, converting signal payloads with `converter`
    pub fn new(node: Arc<dyn Node>, converter: Arc<dyn TypeConverter>) -> Self {
        Self { node, converter }
    }

    /// Default factory
    pub fn factory(converter: Arc<dyn TypeConverter>) -> AccessFactory<dyn Node> {
        Arc::new(move |node: Arc<dyn Node>| {
            Arc::new(NodeAccess::new(node, converter.clone())) as Arc<dyn ArchitectureAccess>
        })
    }
}

impl ArchitectureAccess for NodeAccess {
    fn architecture(&self) -> &str {
        ARCH_COMPONENT
    }

    fn caller_name(&self) -> String {
        self.node.address()
    }

    fn peripheral_name(&self) -> String {
        self.node.address()
    }

    fn signal(&self, name: &str, args: Vec<Value>) -> bool {
        match convert_all(&*self.converter, args) {
            Some(values) => self.node.signal(name, values),
            None => false,
        }
    }
}
