//! Host doubles shared by the integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, Sender};
use hostbind_engine::{EngineOptions, HostBridge};
use hostbind_sdk::{
    ArchitectureAccess, Attachable, CancellationToken, ComponentAttachable, Computer,
    ConnectionId, Context, HostError, HostValue, LuaContext, Node, PeripheralAttachable,
};
use parking_lot::Mutex;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn bridge() -> HostBridge {
    HostBridge::new(EngineOptions::default()).expect("bridge")
}

// ============================================================================
// Peripheral host
// ============================================================================

pub struct TestComputer {
    id: ConnectionId,
    label: String,
    attached: AtomicBool,
    pub events: Mutex<Vec<(String, Vec<HostValue>)>>,
}

impl TestComputer {
    pub fn new(label: &str) -> Arc<dyn Computer> {
        Self::concrete(label)
    }

    pub fn concrete(label: &str) -> Arc<TestComputer> {
        Arc::new(Self {
            id: ConnectionId::next(),
            label: label.to_string(),
            attached: AtomicBool::new(true),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn unplug(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}

impl Computer for TestComputer {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn label(&self) -> String {
        self.label.clone()
    }

    fn attachment_name(&self) -> Result<String, HostError> {
        if self.attached.load(Ordering::SeqCst) {
            Ok("back".to_string())
        } else {
            Err(HostError::NotAttached)
        }
    }

    fn queue_event(&self, name: &str, args: Vec<HostValue>) {
        self.events.lock().push((name.to_string(), args));
    }
}

#[derive(Default)]
pub struct TestLuaContext {
    token: CancellationToken,
}

impl TestLuaContext {
    pub fn new() -> Arc<dyn LuaContext> {
        Arc::new(Self::default())
    }

    pub fn cancelled() -> Arc<dyn LuaContext> {
        let ctx = Self::default();
        ctx.token.cancel();
        Arc::new(ctx)
    }

    pub fn with_token(token: CancellationToken) -> Arc<dyn LuaContext> {
        Arc::new(Self { token })
    }
}

impl LuaContext for TestLuaContext {
    fn cancellation(&self) -> &CancellationToken {
        &self.token
    }
}

// ============================================================================
// Callback host
// ============================================================================

pub struct TestNode {
    id: ConnectionId,
    address: String,
    pub signals: Mutex<Vec<(String, Vec<HostValue>)>>,
}

impl TestNode {
    pub fn new(address: &str) -> Arc<dyn Node> {
        Self::concrete(address)
    }

    pub fn concrete(address: &str) -> Arc<TestNode> {
        Arc::new(Self {
            id: ConnectionId::next(),
            address: address.to_string(),
            signals: Mutex::new(Vec::new()),
        })
    }
}

impl Node for TestNode {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn address(&self) -> String {
        self.address.clone()
    }

    fn signal(&self, name: &str, args: Vec<HostValue>) -> bool {
        self.signals.lock().push((name.to_string(), args));
        true
    }
}

pub struct TestContext {
    address: String,
    token: CancellationToken,
    sender: Sender<(String, Vec<HostValue>)>,
    receiver: Receiver<(String, Vec<HostValue>)>,
}

impl TestContext {
    pub fn new(address: &str) -> Arc<TestContext> {
        let (sender, receiver) = unbounded();
        Arc::new(Self {
            address: address.to_string(),
            token: CancellationToken::new(),
            sender,
            receiver,
        })
    }

    pub fn next_signal(&self) -> (String, Vec<HostValue>) {
        self.receiver.recv_timeout(WAIT).expect("signal")
    }
}

impl Context for TestContext {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn signal(&self, name: &str, args: Vec<HostValue>) -> bool {
        self.sender.send((name.to_string(), args)).is_ok()
    }

    fn cancellation(&self) -> &CancellationToken {
        &self.token
    }
}

// ============================================================================
// Attachment recorder
// ============================================================================

/// Target recording every attachment notification it receives
#[derive(Default)]
pub struct Recorder {
    pub generic_added: AtomicUsize,
    pub generic_removed: AtomicUsize,
    pub peripheral_added: AtomicUsize,
    pub peripheral_removed: AtomicUsize,
    pub component_added: AtomicUsize,
    pub component_removed: AtomicUsize,
    pub accesses: Mutex<Vec<Arc<dyn ArchitectureAccess>>>,
}

impl Recorder {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

impl Attachable for Recorder {
    fn add_computer(&self, access: Arc<dyn ArchitectureAccess>) {
        self.generic_added.fetch_add(1, Ordering::SeqCst);
        self.accesses.lock().push(access);
    }

    fn remove_computer(&self, access: Arc<dyn ArchitectureAccess>) {
        self.generic_removed.fetch_add(1, Ordering::SeqCst);
        self.accesses.lock().retain(|a| !Arc::ptr_eq(a, &access));
    }
}

impl PeripheralAttachable for Recorder {
    fn add_computer(&self, _computer: Arc<dyn Computer>) {
        self.peripheral_added.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_computer(&self, _computer: Arc<dyn Computer>) {
        self.peripheral_removed.fetch_add(1, Ordering::SeqCst);
    }
}

impl ComponentAttachable for Recorder {
    fn on_connect(&self, _node: Arc<dyn Node>) {
        self.component_added.fetch_add(1, Ordering::SeqCst);
    }

    fn on_disconnect(&self, _node: Arc<dyn Node>) {
        self.component_removed.fetch_add(1, Ordering::SeqCst);
    }
}
