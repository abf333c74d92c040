//! Wrapper type synthesis
//!
//! A wrapper type is the dispatch table hosts call through: the indexed
//! method map plus, per index, what the host needs to validate, invoke
//! and convert a call. One wrapper type exists per
//! `(class, style, capability set, method-name set)`; it is built once and
//! shared by every target of that shape. A key from a newer registry
//! revision evicts every cached type from older ones; types already handed
//! out stay alive through their `Arc`s.
//!
//! Two styles exist. The peripheral style exposes a single
//! dispatch-by-index entry point. The structured-callback styles
//! (`Environment`, `Object`) also expose one callback per method, under an
//! escaped symbol, with a documentation string.

mod symbol;

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hostbind_sdk::{Capabilities, TargetClass, ValueType};
use once_cell::sync::OnceCell;
use rustc_hash::FxHashMap;

use crate::adapter::{ExposedMethods, IndexedMethodMap, MethodExecutor};

pub use symbol::{escape_symbol, unescape_symbol};

/// How a host calls into a wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WrapperStyle {
    /// Single dispatch-by-index entry point
    Peripheral,
    /// Per-method callbacks on a network environment with a node
    Environment,
    /// Per-method callbacks on a plain value object
    Object,
}

impl WrapperStyle {
    /// Whether the style exposes per-method callbacks
    pub fn has_callbacks(&self) -> bool {
        !matches!(self, WrapperStyle::Peripheral)
    }
}

/// Structural cache key for a wrapper type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrapperKey {
    class: TargetClass,
    style: WrapperStyle,
    capabilities: Capabilities,
    methods: Vec<String>,
    revision: u64,
}

impl WrapperKey {
    /// Key for `class` exposing `methods`; names are sorted here
    pub fn new(
        class: TargetClass,
        style: WrapperStyle,
        capabilities: Capabilities,
        methods: impl IntoIterator<Item = String>,
        revision: u64,
    ) -> Self {
        let mut methods: Vec<String> = methods.into_iter().collect();
        methods.sort();
        methods.dedup();
        Self {
            class,
            style,
            capabilities,
            methods,
            revision,
        }
    }

    /// Target class
    pub fn class(&self) -> &TargetClass {
        &self.class
    }

    /// Host style
    pub fn style(&self) -> WrapperStyle {
        self.style
    }

    /// Capability set
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Sorted method names
    pub fn method_names(&self) -> &[String] {
        &self.methods
    }

    /// Registry revision the methods were collected at
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

// ============================================================================
// WrapperType
// ============================================================================

/// Per-index dispatch entry
pub struct MethodEntry {
    index: usize,
    name: String,
    executor: Arc<dyn MethodExecutor>,
    arg_types: Vec<ValueType>,
    variadic: bool,
}

impl MethodEntry {
    /// Dense index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Exposed name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Executor
    pub fn executor(&self) -> &Arc<dyn MethodExecutor> {
        &self.executor
    }

    /// Declared type of call-site argument `i`.
    ///
    /// The vararg type repeats. Past a fixed arity the value passes through
    /// as `Any` so the arity check reports it.
    pub fn arg_type(&self, i: usize) -> ValueType {
        match self.arg_types.get(i) {
            Some(ty) => *ty,
            None if self.variadic => self.arg_types.last().copied().unwrap_or(ValueType::Any),
            None => ValueType::Any,
        }
    }

    /// Runs on the calling thread
    pub fn is_asynchronous(&self) -> bool {
        self.executor.is_asynchronous()
    }

    /// Event name for deferred results
    pub fn return_signal(&self) -> Option<&str> {
        self.executor.return_signal()
    }
}

/// Generated per-method callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Callback {
    symbol: String,
    name: String,
    index: usize,
    direct: bool,
    doc: String,
}

impl Callback {
    /// Escaped symbol the host calls
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Original method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Method index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Callable without synchronizing to the owning thread
    pub fn direct(&self) -> bool {
        self.direct
    }

    /// Signature documentation
    pub fn doc(&self) -> &str {
        &self.doc
    }
}

/// A synthesized dispatch table
pub struct WrapperType {
    id: u64,
    key: WrapperKey,
    methods: Arc<IndexedMethodMap>,
    entries: Vec<MethodEntry>,
    callbacks: Vec<Callback>,
    by_symbol: FxHashMap<String, usize>,
}

impl WrapperType {
    fn build(id: u64, key: WrapperKey, exposed: &ExposedMethods) -> Self {
        let methods = Arc::new(IndexedMethodMap::new(
            exposed
                .iter()
                .map(|(name, executor)| (name.clone(), executor.clone())),
        ));

        let entries: Vec<MethodEntry> = methods
            .iter()
            .map(|(index, name, executor)| MethodEntry {
                index,
                name: name.to_string(),
                executor: executor.clone(),
                arg_types: executor.description().args().iter().map(|a| a.ty()).collect(),
                variadic: executor
                    .description()
                    .args()
                    .last()
                    .map_or(false, |a| a.is_variadic()),
            })
            .collect();

        let mut callbacks = Vec::new();
        let mut by_symbol = FxHashMap::default();
        if key.style.has_callbacks() {
            for entry in &entries {
                let symbol = escape_symbol(&entry.name);
                by_symbol.insert(symbol.clone(), callbacks.len());
                callbacks.push(Callback {
                    symbol,
                    name: entry.name.clone(),
                    index: entry.index,
                    direct: entry.is_asynchronous() || entry.return_signal().is_some(),
                    doc: entry.executor.description().signature_doc(),
                });
            }
        }

        Self {
            id,
            key,
            methods,
            entries,
            callbacks,
            by_symbol,
        }
    }

    /// Unique id of this generated type
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Cache key
    pub fn key(&self) -> &WrapperKey {
        &self.key
    }

    /// Name of the wrapped class
    pub fn class_name(&self) -> &str {
        self.key.class.name()
    }

    /// Host style
    pub fn style(&self) -> WrapperStyle {
        self.key.style
    }

    /// Capability set the type was generated for
    pub fn capabilities(&self) -> Capabilities {
        self.key.capabilities
    }

    /// Shared indexed method map
    pub fn methods(&self) -> &Arc<IndexedMethodMap> {
        &self.methods
    }

    /// Dispatch entry for `index`
    pub fn entry(&self, index: usize) -> Option<&MethodEntry> {
        self.entries.get(index)
    }

    /// Dispatch entries in index order
    pub fn entries(&self) -> &[MethodEntry] {
        &self.entries
    }

    /// Per-method callbacks (empty for the peripheral style)
    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    /// Callback by escaped symbol
    pub fn callback(&self, symbol: &str) -> Option<&Callback> {
        self.by_symbol.get(symbol).map(|i| &self.callbacks[*i])
    }

    /// At least one method delivers results as a signal
    pub fn can_update(&self) -> bool {
        self.entries.iter().any(|e| e.return_signal().is_some())
    }
}

impl fmt::Debug for WrapperType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperType")
            .field("id", &self.id)
            .field("class", &self.class_name())
            .field("style", &self.key.style)
            .field("methods", &self.methods.method_names())
            .finish()
    }
}

// ============================================================================
// WrapperSynthesizer
// ============================================================================

/// Memoized, single-flight factory for wrapper types
#[derive(Default)]
pub struct WrapperSynthesizer {
    cache: DashMap<WrapperKey, Arc<OnceCell<Arc<WrapperType>>>>,
    generated: AtomicUsize,
    next_id: AtomicU64,
    latest_revision: AtomicU64,
}

impl WrapperSynthesizer {
    /// Create an empty synthesizer
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrapper type for `key`, generating it on first use.
    ///
    /// Concurrent first requests for one key build it once; every caller
    /// gets the same `Arc`.
    pub fn synthesize(&self, key: WrapperKey, exposed: &ExposedMethods) -> Arc<WrapperType> {
        let previous = self.latest_revision.fetch_max(key.revision, Ordering::AcqRel);
        if key.revision > previous {
            self.evict_before(key.revision);
        }

        // Clone the cell out so the shard lock is not held while building
        let cell = self
            .cache
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_init(|| {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            self.generated.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                class = key.class.name(),
                style = ?key.style,
                methods = key.methods.len(),
                id,
                "Synthesizing wrapper type"
            );
            Arc::new(WrapperType::build(id, key, exposed))
        })
        .clone()
    }

    fn evict_before(&self, revision: u64) {
        let before = self.cache.len();
        self.cache.retain(|key, _| key.revision >= revision);
        let evicted = before.saturating_sub(self.cache.len());
        if evicted > 0 {
            tracing::debug!(revision, evicted, "Evicted wrapper types of older revisions");
        }
    }

    /// Number of wrapper types built so far
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    /// Number of cached keys
    pub fn cached_types(&self) -> usize {
        self.cache.len()
    }
}

impl fmt::Debug for WrapperSynthesizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WrapperSynthesizer")
            .field("cached", &self.cached_types())
            .field("generated", &self.generated_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{DirectExecutor, Invocation, MethodBody, MethodDeclaration};
    use hostbind_sdk::TypeKey;

    struct Widget;

    fn exposed(decls: Vec<MethodDeclaration>) -> ExposedMethods {
        decls
            .into_iter()
            .map(|decl| {
                let body: MethodBody = Arc::new(|_: &Invocation<'_>| Ok(vec![]));
                let name = decl.name().to_string();
                let executor: Arc<dyn MethodExecutor> =
                    Arc::new(DirectExecutor::new(decl, body, TypeKey::of::<Widget>()));
                (name, executor)
            })
            .collect()
    }

    fn key(style: WrapperStyle, methods: &ExposedMethods) -> WrapperKey {
        key_at(style, methods, 0)
    }

    fn key_at(style: WrapperStyle, methods: &ExposedMethods, revision: u64) -> WrapperKey {
        WrapperKey::new(
            TargetClass::of::<Widget>(),
            style,
            Capabilities::default(),
            methods.keys().cloned(),
            revision,
        )
    }

    #[test]
    fn test_cache_returns_same_type() {
        let synth = WrapperSynthesizer::new();
        let methods = exposed(vec![MethodDeclaration::new("a")]);
        let first = synth.synthesize(key(WrapperStyle::Peripheral, &methods), &methods);
        let second = synth.synthesize(key(WrapperStyle::Peripheral, &methods), &methods);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(synth.generated_count(), 1);

        let other = synth.synthesize(key(WrapperStyle::Object, &methods), &methods);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(synth.generated_count(), 2);
    }

    #[test]
    fn test_newer_revision_evicts_older_types() {
        let synth = WrapperSynthesizer::new();
        let methods = exposed(vec![MethodDeclaration::new("a")]);
        let old = synth.synthesize(key_at(WrapperStyle::Peripheral, &methods, 1), &methods);
        synth.synthesize(key_at(WrapperStyle::Object, &methods, 1), &methods);
        assert_eq!(synth.cached_types(), 2);

        let new = synth.synthesize(key_at(WrapperStyle::Peripheral, &methods, 2), &methods);
        assert_eq!(synth.cached_types(), 1);
        assert_eq!(synth.generated_count(), 3);
        assert!(!Arc::ptr_eq(&old, &new));
        // Handed-out types keep working
        assert_eq!(old.methods().index_of("a"), Some(0));
        assert_eq!(old.key().revision(), 1);
    }

    #[test]
    fn test_peripheral_style_has_no_callbacks() {
        let synth = WrapperSynthesizer::new();
        let methods = exposed(vec![MethodDeclaration::new("a")]);
        let ty = synth.synthesize(key(WrapperStyle::Peripheral, &methods), &methods);
        assert!(ty.callbacks().is_empty());
        assert_eq!(ty.methods().len(), 1);
    }

    #[test]
    fn test_callbacks_and_can_update() {
        let synth = WrapperSynthesizer::new();
        let methods = exposed(vec![
            MethodDeclaration::new("d 4").asynchronous(),
            MethodDeclaration::new("sync"),
            MethodDeclaration::new("later").return_signal("done"),
        ]);
        let ty = synth.synthesize(key(WrapperStyle::Environment, &methods), &methods);
        assert!(ty.can_update());

        let spaced = ty.callback("d_x20_4").unwrap();
        assert_eq!(spaced.name(), "d 4");
        assert!(spaced.direct());
        assert_eq!(spaced.doc(), "function()");
        assert!(!ty.callback("sync").unwrap().direct());
        assert!(ty.callback("later").unwrap().direct());
    }

    #[test]
    fn test_entry_arg_type_repeats_vararg() {
        use crate::adapter::ArgumentDescriptor;
        let methods = exposed(vec![MethodDeclaration::new("f")
            .arg(ArgumentDescriptor::required("a", ValueType::String))
            .arg(ArgumentDescriptor::variadic("rest", ValueType::Integer))]);
        let synth = WrapperSynthesizer::new();
        let ty = synth.synthesize(key(WrapperStyle::Object, &methods), &methods);
        let entry = ty.entry(0).unwrap();
        assert_eq!(entry.arg_type(0), ValueType::String);
        assert_eq!(entry.arg_type(5), ValueType::Integer);
    }

    #[test]
    fn test_entry_arg_type_past_fixed_arity() {
        use crate::adapter::ArgumentDescriptor;
        let methods = exposed(vec![
            MethodDeclaration::new("g").arg(ArgumentDescriptor::required("a", ValueType::Integer))
        ]);
        let synth = WrapperSynthesizer::new();
        let ty = synth.synthesize(key(WrapperStyle::Object, &methods), &methods);
        let entry = ty.entry(0).unwrap();
        assert_eq!(entry.arg_type(0), ValueType::Integer);
        assert_eq!(entry.arg_type(1), ValueType::Any);
    }
}
