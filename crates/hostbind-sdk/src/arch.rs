//! Host architectures and attachment capabilities
//!
//! Targets opt into lifecycle notifications through these traits. The
//! generic `Attachable` capability sees every host through the
//! protocol-independent `ArchitectureAccess`; the protocol-specific
//! capabilities see the raw host handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::value::Value;

/// Peripheral host architecture identifier
pub const ARCH_PERIPHERAL: &str = "peripheral";

/// Callback host architecture identifier
pub const ARCH_COMPONENT: &str = "component";

/// Identity of one host connection (a computer or a network node)
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

impl ConnectionId {
    /// Generate a new unique ConnectionId
    pub fn next() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Create a ConnectionId from a host-assigned number
    pub fn from_u64(id: u64) -> Self {
        ConnectionId(id)
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Protocol-independent view of one host connection
pub trait ArchitectureAccess: Send + Sync {
    /// Architecture identifier (`ARCH_PERIPHERAL`, `ARCH_COMPONENT`, ...)
    fn architecture(&self) -> &str;

    /// Name of the caller (computer label or node address)
    fn caller_name(&self) -> String;

    /// Name under which the target is attached to the caller
    fn peripheral_name(&self) -> String;

    /// Push an event to the caller; returns false if it could not be queued
    fn signal(&self, name: &str, args: Vec<Value>) -> bool;
}

/// Generic attachment capability
pub trait Attachable: Send + Sync {
    /// A host connection attached
    fn add_computer(&self, access: Arc<dyn ArchitectureAccess>);

    /// A host connection detached
    fn remove_computer(&self, access: Arc<dyn ArchitectureAccess>);
}

/// Peripheral host handles (a computer polling peripherals by method index)
pub mod peripheral {
    use std::sync::Arc;

    use super::ConnectionId;
    use crate::cancel::CancellationToken;
    use crate::error::HostError;
    use crate::host_value::HostValue;

    /// A computer a peripheral is attached to
    pub trait Computer: Send + Sync {
        /// Connection identity
        fn id(&self) -> ConnectionId;

        /// Computer label, for access objects
        fn label(&self) -> String;

        /// Name the peripheral is attached under; fails once detached
        fn attachment_name(&self) -> Result<String, HostError>;

        /// Queue an event on the computer
        fn queue_event(&self, name: &str, args: Vec<HostValue>);
    }

    /// Per-call context handed to the peripheral host's dispatch entry
    pub trait LuaContext: Send + Sync {
        /// Cancelled when the calling coroutine is interrupted
        fn cancellation(&self) -> &CancellationToken;
    }

    /// Protocol-specific attachment capability for the peripheral host
    pub trait PeripheralAttachable: Send + Sync {
        /// A computer attached
        fn add_computer(&self, computer: Arc<dyn Computer>);

        /// A computer detached
        fn remove_computer(&self, computer: Arc<dyn Computer>);
    }
}

/// Callback host handles (a component network with per-method callbacks)
pub mod component {
    use std::sync::Arc;

    use super::ConnectionId;
    use crate::cancel::CancellationToken;
    use crate::host_value::HostValue;

    /// A network node connecting to or disconnecting from a component
    pub trait Node: Send + Sync {
        /// Connection identity
        fn id(&self) -> ConnectionId;

        /// Network address
        fn address(&self) -> String;

        /// Push a signal to the machine behind this node
        fn signal(&self, name: &str, args: Vec<HostValue>) -> bool;
    }

    /// Per-call context handed to a callback
    pub trait Context: Send + Sync {
        /// Address of the calling machine
        fn address(&self) -> String;

        /// Push a signal to the calling machine
        fn signal(&self, name: &str, args: Vec<HostValue>) -> bool;

        /// Cancelled when the calling machine stops waiting
        fn cancellation(&self) -> &CancellationToken;
    }

    /// Protocol-specific attachment capability for the callback host
    pub trait ComponentAttachable: Send + Sync {
        /// A node connected
        fn on_connect(&self, node: Arc<dyn Node>);

        /// A node disconnected
        fn on_disconnect(&self, node: Arc<dyn Node>);
    }
}
