//! Model registry -- a named collection of available chat models.
//!
//! Config files name model profiles (`[models.sonnet]`); roles refer to
//! those names. The registry resolves them at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use super::trait_def::ChatModel;

/// A collection of registered [`ChatModel`] implementations, keyed by name.
#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn ChatModel>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model under the name returned by [`ChatModel::name`].
    ///
    /// A model already registered under the same name is replaced and
    /// returned.
    pub fn register(&mut self, model: impl ChatModel + 'static) -> Option<Arc<dyn ChatModel>> {
        self.register_arc(Arc::new(model))
    }

    /// Register an already shared model.
    pub fn register_arc(&mut self, model: Arc<dyn ChatModel>) -> Option<Arc<dyn ChatModel>> {
        let name = model.name().to_string();
        self.models.insert(name, model)
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn ChatModel>> {
        self.models.get(name).cloned()
    }

    /// Names of all registered models, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.list())
            .finish()
    }
}
