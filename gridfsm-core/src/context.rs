//! Managed entities and the per-call action context.

use crate::definition::Definition;
use crate::state::{Event, State};
use serde_json::Value;
use std::collections::HashMap;

/// An entity whose state is managed by a [`Definition`].
///
/// This is the only shape the runtime needs; everything else about the
/// entity is opaque to it.
pub trait StatefulEntity {
    /// Current state of the entity.
    fn state(&self) -> &State;

    /// Replaces the entity's state.
    fn set_state(&mut self, state: State);

    /// Identifier of the entity, used for logging and per-entity locking.
    fn id(&self) -> &str;
}

/// Everything a transition needs for a single event on a single entity.
///
/// Created per triggering call and dropped once the transition completes.
pub struct ActionContext<'a, E> {
    event: Event,
    entity: &'a mut E,
    definition: &'a Definition<E>,
    params: Option<HashMap<String, Value>>,
}

impl<'a, E: StatefulEntity> ActionContext<'a, E> {
    pub fn new(event: impl Into<Event>, entity: &'a mut E, definition: &'a Definition<E>) -> Self {
        Self {
            event: event.into(),
            entity,
            definition,
            params: None,
        }
    }

    /// Attaches caller-supplied parameters.
    pub fn with_params(mut self, params: HashMap<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Sets a single parameter, creating the map if needed.
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params_mut().insert(key.into(), value);
        self
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn entity(&self) -> &E {
        &*self.entity
    }

    pub fn entity_mut(&mut self) -> &mut E {
        &mut *self.entity
    }

    pub fn definition(&self) -> &'a Definition<E> {
        self.definition
    }

    pub fn params(&self) -> Option<&HashMap<String, Value>> {
        self.params.as_ref()
    }

    /// Mutable access to the parameters, creating an empty map if none
    /// were supplied.
    pub fn params_mut(&mut self) -> &mut HashMap<String, Value> {
        self.params.get_or_insert_with(HashMap::new)
    }

    /// Looks up a single parameter.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(key))
    }

    /// Consumes the context and returns its parameters.
    pub fn into_params(self) -> Option<HashMap<String, Value>> {
        self.params
    }
}
