//! Dense method indices
//!
//! Hosts address methods by integer index. Indices are assigned by sorting
//! names, so the same set of names always yields the same table no matter
//! in which order the methods were collected.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::executor::MethodExecutor;

/// Bijection name <-> index <-> executor, shared by one wrapper type
pub struct IndexedMethodMap {
    names: Vec<String>,
    executors: Vec<Arc<dyn MethodExecutor>>,
    by_name: FxHashMap<String, usize>,
}

impl IndexedMethodMap {
    /// Build from `(name, executor)` pairs in any order.
    ///
    /// Duplicate names keep the first executor seen.
    pub fn new<I>(methods: I) -> Self
    where
        I: IntoIterator<Item = (String, Arc<dyn MethodExecutor>)>,
    {
        let mut entries: Vec<(String, Arc<dyn MethodExecutor>)> = Vec::new();
        for (name, executor) in methods {
            if !entries.iter().any(|(n, _)| *n == name) {
                entries.push((name, executor));
            }
        }
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut names = Vec::with_capacity(entries.len());
        let mut executors = Vec::with_capacity(entries.len());
        let mut by_name = FxHashMap::default();
        for (index, (name, executor)) in entries.into_iter().enumerate() {
            by_name.insert(name.clone(), index);
            names.push(name);
            executors.push(executor);
        }
        Self {
            names,
            executors,
            by_name,
        }
    }

    /// Number of methods
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// No methods
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Executor at `index`
    pub fn get(&self, index: usize) -> Option<&Arc<dyn MethodExecutor>> {
        self.executors.get(index)
    }

    /// Executor by name
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<dyn MethodExecutor>> {
        self.index_of(name).and_then(|i| self.get(i))
    }

    /// Index of `name`
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Name at `index`
    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Names in index order
    pub fn method_names(&self) -> &[String] {
        &self.names
    }

    /// `(index, name, executor)` in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &Arc<dyn MethodExecutor>)> {
        self.names
            .iter()
            .zip(&self.executors)
            .enumerate()
            .map(|(i, (name, executor))| (i, name.as_str(), executor))
    }
}

impl fmt::Debug for IndexedMethodMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexedMethodMap")
            .field("names", &self.names)
            .finish()
    }
}
