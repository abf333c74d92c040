//! Target objects and their class descriptors
//!
//! A `TargetRef` is what a host wraps: the backend object, the class it
//! belongs to, the trait views it can be seen through, and the attachment
//! capabilities it opted into. The capability set is computed once here so
//! connect/disconnect never has to inspect the object again.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::arch::component::ComponentAttachable;
use crate::arch::peripheral::PeripheralAttachable;
use crate::arch::Attachable;

/// Type-erased shared object
pub type Object = Arc<dyn Any + Send + Sync>;

// ============================================================================
// TypeKey
// ============================================================================

/// Identity of a Rust type (concrete or `dyn Trait`), with its name for messages.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Full type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Last path segment of the type name, without generics
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        base.rsplit("::").next().unwrap_or(base)
    }

    /// Underlying `TypeId`
    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// Attachment capabilities a target opted into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Capabilities {
    /// Receives protocol-independent `ArchitectureAccess` objects
    pub generic_attach: bool,
    /// Receives raw peripheral-host computer handles
    pub peripheral_attach: bool,
    /// Receives raw callback-host node handles
    pub component_attach: bool,
}

impl Capabilities {
    /// True if no lifecycle callback needs to fire
    pub fn is_empty(&self) -> bool {
        !(self.generic_attach || self.peripheral_attach || self.component_attach)
    }
}

// ============================================================================
// TargetClass
// ============================================================================

/// Structural class descriptor: concrete type plus its views, closest first.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetClass {
    name: String,
    /// `lineage[0]` is the concrete type
    lineage: Vec<TypeKey>,
}

impl TargetClass {
    /// Class for a concrete type with no extra views
    pub fn of<T: Any>() -> Self {
        let key = TypeKey::of::<T>();
        Self {
            name: key.short_name().to_string(),
            lineage: vec![key],
        }
    }

    /// Build a class from its concrete key, display name and views
    pub fn new(key: TypeKey, name: impl Into<String>, views: impl IntoIterator<Item = TypeKey>) -> Self {
        let mut lineage = vec![key];
        for view in views {
            if !lineage.contains(&view) {
                lineage.push(view);
            }
        }
        Self {
            name: name.into(),
            lineage,
        }
    }

    /// Add a view after the existing ones
    pub fn with_view(mut self, view: TypeKey) -> Self {
        if !self.lineage.contains(&view) {
            self.lineage.push(view);
        }
        self
    }

    /// Display name (the peripheral "type")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete type key
    pub fn key(&self) -> TypeKey {
        self.lineage[0]
    }

    /// Concrete type first, then views in declaration order
    pub fn lineage(&self) -> &[TypeKey] {
        &self.lineage
    }

    /// Distance from the concrete type (0 = the type itself)
    pub fn distance(&self, key: TypeKey) -> Option<usize> {
        self.lineage.iter().position(|k| *k == key)
    }

    /// Whether a value of this class can be seen as `key`
    pub fn is_assignable_to(&self, key: TypeKey) -> bool {
        self.distance(key).is_some()
    }
}

// ============================================================================
// TargetRef
// ============================================================================

/// A registered target object.
#[derive(Clone)]
pub struct TargetRef {
    class: Arc<TargetClass>,
    object: Object,
    views: Vec<(TypeKey, Object)>,
    attachable: Option<Arc<dyn Attachable>>,
    peripheral: Option<Arc<dyn PeripheralAttachable>>,
    component: Option<Arc<dyn ComponentAttachable>>,
}

impl TargetRef {
    /// Wrap a value with no views and no capabilities
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::builder(Arc::new(value)).build()
    }

    /// Start building a target from a shared value
    pub fn builder<T: Any + Send + Sync>(value: Arc<T>) -> TargetBuilder<T> {
        TargetBuilder {
            name: None,
            views: Vec::new(),
            attachable: None,
            peripheral: None,
            component: None,
            value,
        }
    }

    /// Class descriptor
    pub fn class(&self) -> &Arc<TargetClass> {
        &self.class
    }

    /// The concrete object
    pub fn object(&self) -> &Object {
        &self.object
    }

    /// Object to use as receiver for `key`: the concrete object for the
    /// concrete key, the registered view otherwise.
    pub fn view(&self, key: TypeKey) -> Option<&Object> {
        if key == self.class.key() {
            return Some(&self.object);
        }
        self.views.iter().find(|(k, _)| *k == key).map(|(_, o)| o)
    }

    /// Downcast the concrete object
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.object.downcast_ref::<T>()
    }

    /// Precomputed capability descriptor
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            generic_attach: self.attachable.is_some(),
            peripheral_attach: self.peripheral.is_some(),
            component_attach: self.component.is_some(),
        }
    }

    /// Generic attachment capability
    pub fn attachable(&self) -> Option<&Arc<dyn Attachable>> {
        self.attachable.as_ref()
    }

    /// Peripheral-host attachment capability
    pub fn peripheral_attachable(&self) -> Option<&Arc<dyn PeripheralAttachable>> {
        self.peripheral.as_ref()
    }

    /// Callback-host attachment capability
    pub fn component_attachable(&self) -> Option<&Arc<dyn ComponentAttachable>> {
        self.component.as_ref()
    }

    /// Same underlying object
    pub fn ptr_eq(&self, other: &TargetRef) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
    }
}

impl fmt::Debug for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetRef")
            .field("class", &self.class.name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

/// Builder for `TargetRef`
pub struct TargetBuilder<T> {
    value: Arc<T>,
    name: Option<String>,
    views: Vec<(TypeKey, Object)>,
    attachable: Option<Arc<dyn Attachable>>,
    peripheral: Option<Arc<dyn PeripheralAttachable>>,
    component: Option<Arc<dyn ComponentAttachable>>,
}

impl<T: Any + Send + Sync> TargetBuilder<T> {
    /// Override the display name (defaults to the short type name)
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Expose the target through a trait view, e.g.
    /// `.view::<dyn Tank>(value.clone())`.
    ///
    /// Views are keyed by their exact type; a method source or external
    /// adapter declared on `dyn Tank` receives the `Arc<dyn Tank>` stored here.
    /// Views added first are closer to the concrete type.
    pub fn view<V: ?Sized + Send + Sync + 'static>(mut self, view: Arc<V>) -> Self {
        let key = TypeKey::of::<V>();
        if !self.views.iter().any(|(k, _)| *k == key) {
            self.views.push((key, Arc::new(view) as Object));
        }
        self
    }

    /// Opt into generic attach/detach notifications
    pub fn attachable(mut self) -> Self
    where
        T: Attachable,
    {
        self.attachable = Some(self.value.clone() as Arc<dyn Attachable>);
        self
    }

    /// Opt into raw peripheral-host notifications
    pub fn peripheral_attachable(mut self) -> Self
    where
        T: PeripheralAttachable,
    {
        self.peripheral = Some(self.value.clone() as Arc<dyn PeripheralAttachable>);
        self
    }

    /// Opt into raw callback-host notifications
    pub fn component_attachable(mut self) -> Self
    where
        T: ComponentAttachable,
    {
        self.component = Some(self.value.clone() as Arc<dyn ComponentAttachable>);
        self
    }

    /// Finish
    pub fn build(self) -> TargetRef {
        let key = TypeKey::of::<T>();
        let name = self
            .name
            .unwrap_or_else(|| key.short_name().to_string());
        let class = TargetClass::new(key, name, self.views.iter().map(|(k, _)| *k));
        TargetRef {
            class: Arc::new(class),
            object: self.value as Object,
            views: self.views,
            attachable: self.attachable,
            peripheral: self.peripheral,
            component: self.component,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Level: Send + Sync {
        fn level(&self) -> i64;
    }

    struct Tank(i64);

    impl Level for Tank {
        fn level(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_type_key_short_name() {
        assert_eq!(TypeKey::of::<Tank>().short_name(), "Tank");
        assert_eq!(TypeKey::of::<Vec<String>>().short_name(), "Vec");
    }

    #[test]
    fn test_builder_lineage_and_views() {
        let tank = Arc::new(Tank(5));
        let target = TargetRef::builder(tank.clone())
            .view::<dyn Level>(tank.clone())
            .build();

        let class = target.class();
        assert_eq!(class.name(), "Tank");
        assert_eq!(class.distance(TypeKey::of::<Tank>()), Some(0));
        assert_eq!(class.distance(TypeKey::of::<dyn Level>()), Some(1));
        assert!(!class.is_assignable_to(TypeKey::of::<String>()));

        let view = target.view(TypeKey::of::<dyn Level>()).unwrap();
        let level = view.downcast_ref::<Arc<dyn Level>>().unwrap();
        assert_eq!(level.level(), 5);
        assert_eq!(target.downcast_ref::<Tank>().unwrap().0, 5);
    }

    #[test]
    fn test_no_capabilities_by_default() {
        let target = TargetRef::new(Tank(1));
        assert!(target.capabilities().is_empty());
        assert!(target.attachable().is_none());
    }
}
