//! State values and the root state tree
//!
//! Feature state is stored type-erased as [`StateValue`]. Every node is an
//! `Arc`, so "did this change" is answered by pointer identity rather than
//! by comparing contents. Reducers that have nothing to do must hand back the
//! exact `Arc` they were given.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A type-erased, reference-counted state node.
///
/// Clone is an atomic increment. Downcasting back to `Arc<T>` keeps the
/// same allocation, so identity survives the round trip.
#[derive(Clone)]
pub struct StateValue {
    inner: Arc<dyn Any + Send + Sync>,
}

impl StateValue {
    /// Wrap a fresh value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }

    /// Wrap an existing allocation without copying it.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self { inner: value }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Recover the typed `Arc`. Returns `None` if the stored type is not `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.inner).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.inner.is::<T>()
    }

    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Identity comparison (same allocation).
    pub fn ptr_eq(&self, other: &StateValue) -> bool {
        Arc::as_ptr(&self.inner).cast::<()>() == Arc::as_ptr(&other.inner).cast::<()>()
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateValue")
            .field("type_id", &(*self.inner).type_id())
            .finish()
    }
}

/// The root state: feature id -> feature state.
///
/// Cloning a tree copies the map of `Arc`s, never the feature states
/// themselves.
#[derive(Clone, Default, Debug)]
pub struct StateTree {
    entries: BTreeMap<String, StateValue>,
}

/// Snapshot of the whole store state as published to subscribers.
pub type RootState = Arc<StateTree>;

impl StateTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&StateValue> {
        self.entries.get(key)
    }

    /// Typed lookup.
    pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).and_then(StateValue::downcast::<T>)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StateValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, key: String, value: StateValue) {
        self.entries.insert(key, value);
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

impl FromIterator<(String, StateValue)> for StateTree {
    fn from_iter<I: IntoIterator<Item = (String, StateValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Identity comparison used by `select` to suppress repeated emissions.
///
/// Deliberately not `PartialEq`: two equal-by-value states in different
/// allocations count as a change.
pub trait Identity {
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Identity for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::as_ptr(self).cast::<()>() == Arc::as_ptr(other).cast::<()>()
    }
}

impl Identity for StateValue {
    fn same(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: Identity> Identity for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_preserves_identity() {
        let typed = Arc::new(vec![1u32, 2, 3]);
        let value = StateValue::from_arc(Arc::clone(&typed));

        let back = value.downcast::<Vec<u32>>().unwrap();
        assert!(Arc::ptr_eq(&typed, &back));
    }

    #[test]
    fn test_downcast_wrong_type_returns_none() {
        let value = StateValue::new(42u32);
        assert!(value.downcast::<i64>().is_none());
        assert!(value.downcast_ref::<String>().is_none());
        assert!(value.is::<u32>());
    }

    #[test]
    fn test_ptr_eq_is_identity_not_equality() {
        let a = StateValue::new(7u8);
        let b = StateValue::new(7u8);
        assert!(a.ptr_eq(&a.clone()));
        assert!(!a.ptr_eq(&b));
    }

    #[test]
    fn test_option_identity() {
        let a = Arc::new(1);
        assert!(Some(Arc::clone(&a)).same(&Some(Arc::clone(&a))));
        assert!(!Some(Arc::clone(&a)).same(&Some(Arc::new(1))));
        assert!(Option::<Arc<i32>>::None.same(&None));
        assert!(!Some(a).same(&None));
    }

    #[test]
    fn test_tree_clone_shares_children() {
        let mut tree = StateTree::new();
        tree.insert("counter".to_string(), StateValue::new(0i64));
        let copy = tree.clone();

        assert!(tree.get("counter").unwrap().ptr_eq(copy.get("counter").unwrap()));
        assert_eq!(copy.get_as::<i64>("counter").as_deref(), Some(&0));
        assert_eq!(copy.keys().collect::<Vec<_>>(), vec!["counter"]);
    }
}
