//! Fluent construction of definitions in code.

use crate::context::StatefulEntity;
use crate::definition::{Definition, TransitionRule, DEFAULT_PATH};
use crate::error::CoreError;
use crate::state::{Event, State};
use crate::transition::{Action, Evaluator, Target, TransitionListener};
use std::sync::Arc;

/// Builds a [`Definition`] one transition at a time.
///
/// Transitions added for the same state and event become candidates in the
/// order they were added.
pub struct DefinitionBuilder<E> {
    rules: Vec<TransitionRule<E>>,
    paths: Vec<(String, Vec<String>)>,
    listeners: Vec<Arc<dyn TransitionListener<E>>>,
}

impl<E: StatefulEntity> DefinitionBuilder<E> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            paths: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Adds an unguarded transition without actions.
    pub fn with_transition(
        self,
        event: impl Into<Event>,
        from: impl Into<State>,
        to: impl Into<State>,
    ) -> Self {
        self.with_rule(TransitionRule::new(event, from, Target::Fixed(to.into())))
    }

    /// Adds an unguarded transition running `actions`.
    pub fn with_actions(
        self,
        event: impl Into<Event>,
        from: impl Into<State>,
        to: impl Into<State>,
        actions: Vec<Arc<dyn Action<E>>>,
    ) -> Self {
        self.with_rule(TransitionRule::new(event, from, Target::Fixed(to.into())).with_actions(actions))
    }

    /// Adds a transition that only fires when `evaluator` passes.
    pub fn with_guarded_transition(
        self,
        event: impl Into<Event>,
        from: impl Into<State>,
        to: impl Into<State>,
        evaluator: Arc<dyn Evaluator<E>>,
        actions: Vec<Arc<dyn Action<E>>>,
    ) -> Self {
        self.with_rule(
            TransitionRule::new(event, from, Target::Fixed(to.into()))
                .with_evaluator(evaluator)
                .with_actions(actions),
        )
    }

    /// Adds an unguarded transition with an explicit target.
    pub fn with_target(self, event: impl Into<Event>, from: impl Into<State>, target: Target<E>) -> Self {
        self.with_rule(TransitionRule::new(event, from, target))
    }

    pub fn with_rule(mut self, rule: TransitionRule<E>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Replaces the default path.
    pub fn with_default_path<I, S>(self, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_path(DEFAULT_PATH, path)
    }

    /// Adds or replaces a named path.
    pub fn with_path<I, S>(mut self, name: impl Into<String>, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        self.paths.retain(|(existing, _)| *existing != name);
        self.paths
            .push((name, path.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn TransitionListener<E>>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Builds the definition, validating every path.
    pub fn build(self) -> Result<Definition<E>, CoreError> {
        Definition::assemble(self.rules, self.paths, self.listeners)
    }
}

impl<E: StatefulEntity> Default for DefinitionBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
