//! Component factories keyed by type id.

use gridfsm_core::{Action, BoxError, Evaluator};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Builds an evaluator from the loader's shared parameter.
pub type EvaluatorFactory<E, P> =
    Box<dyn Fn(&P) -> Result<Arc<dyn Evaluator<E>>, BoxError> + Send + Sync>;

/// Builds an action from the loader's shared parameter.
pub type ActionFactory<E, P> = Box<dyn Fn(&P) -> Result<Arc<dyn Action<E>>, BoxError> + Send + Sync>;

/// Maps the component type ids used in manifests to factories.
///
/// Every factory takes the same shared parameter `P` (for instance a
/// database handle); components that need nothing simply ignore it.
pub struct ComponentRegistry<E, P = ()> {
    evaluators: HashMap<String, EvaluatorFactory<E, P>>,
    actions: HashMap<String, ActionFactory<E, P>>,
}

impl<E: 'static, P: 'static> ComponentRegistry<E, P> {
    pub fn new() -> Self {
        Self {
            evaluators: HashMap::new(),
            actions: HashMap::new(),
        }
    }

    /// Registers an evaluator factory, replacing any previous one for `type_id`.
    pub fn register_evaluator<F>(&mut self, type_id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&P) -> Result<Arc<dyn Evaluator<E>>, BoxError> + Send + Sync + 'static,
    {
        self.evaluators.insert(type_id.into(), Box::new(factory));
        self
    }

    /// Registers an action factory, replacing any previous one for `type_id`.
    pub fn register_action<F>(&mut self, type_id: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&P) -> Result<Arc<dyn Action<E>>, BoxError> + Send + Sync + 'static,
    {
        self.actions.insert(type_id.into(), Box::new(factory));
        self
    }

    /// Registers an evaluator that needs no shared parameter.
    pub fn register_simple_evaluator<F, V>(&mut self, type_id: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Evaluator<E> + 'static,
    {
        self.register_evaluator(type_id, move |_: &P| {
            Ok(Arc::new(ctor()) as Arc<dyn Evaluator<E>>)
        })
    }

    /// Registers an action that needs no shared parameter.
    pub fn register_simple_action<F, A>(&mut self, type_id: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> A + Send + Sync + 'static,
        A: Action<E> + 'static,
    {
        self.register_action(type_id, move |_: &P| Ok(Arc::new(ctor()) as Arc<dyn Action<E>>))
    }

    pub fn evaluator_factory(&self, type_id: &str) -> Option<&EvaluatorFactory<E, P>> {
        self.evaluators.get(type_id)
    }

    pub fn action_factory(&self, type_id: &str) -> Option<&ActionFactory<E, P>> {
        self.actions.get(type_id)
    }

    pub fn has_evaluator(&self, type_id: &str) -> bool {
        self.evaluators.contains_key(type_id)
    }

    pub fn has_action(&self, type_id: &str) -> bool {
        self.actions.contains_key(type_id)
    }

    /// Registered evaluator type ids, sorted.
    pub fn evaluator_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.evaluators.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Registered action type ids, sorted.
    pub fn action_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl<E: 'static, P: 'static> Default for ComponentRegistry<E, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, P> fmt::Debug for ComponentRegistry<E, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRegistry")
            .field("evaluators", &self.evaluators.keys().collect::<Vec<_>>())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
