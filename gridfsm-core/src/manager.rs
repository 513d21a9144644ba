//! Entry point for driving entities through a definition.

use crate::context::{ActionContext, StatefulEntity};
use crate::error::{BoxError, CoreError};
use crate::locks::EntityLocks;
use crate::transition::Transition;
use std::sync::Arc;

/// Saves an entity after a transition has been performed on it.
pub trait EntityPersister<E>: Send + Sync {
    fn persist(&self, ctx: &ActionContext<'_, E>) -> Result<(), BoxError>;
}

impl<E, F> EntityPersister<E> for F
where
    F: Fn(&ActionContext<'_, E>) -> Result<(), BoxError> + Send + Sync,
{
    fn persist(&self, ctx: &ActionContext<'_, E>) -> Result<(), BoxError> {
        self(ctx)
    }
}

/// Persister for entities that are saved elsewhere (or not at all).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPersister;

impl<E> EntityPersister<E> for NoopPersister {
    fn persist(&self, _ctx: &ActionContext<'_, E>) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Resolves and performs transitions, then hands the entity to a persister.
pub struct TransitionManager<P> {
    persister: P,
}

impl<P> TransitionManager<P> {
    pub fn new(persister: P) -> Self {
        Self { persister }
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    /// Handles one event for one entity.
    ///
    /// Returns the transition that fired. When nothing matches the call is a
    /// no-op: the entity is untouched and the persister is not called.
    pub fn trigger_event<E>(
        &self,
        ctx: &mut ActionContext<'_, E>,
    ) -> Result<Option<Arc<Transition<E>>>, CoreError>
    where
        E: StatefulEntity,
        P: EntityPersister<E>,
    {
        tracing::trace!(
            entity = ctx.entity().id(),
            "Handling event {} on entity state {}",
            ctx.event().name(),
            ctx.entity().state()
        );

        let definition = ctx.definition();
        let Some(transition) = definition.resolve_transition(ctx) else {
            tracing::trace!("No transition found");
            return Ok(None);
        };

        tracing::trace!(
            "Executing transition from {} to {}",
            transition.from_state(),
            transition.to_state()
        );
        transition.perform(ctx)?;

        self.persister
            .persist(ctx)
            .map_err(|source| CoreError::PersistFailed {
                entity_id: ctx.entity().id().to_string(),
                source,
            })?;

        Ok(Some(transition))
    }

    /// Same as [`trigger_event`](Self::trigger_event) while holding the
    /// entity's lock from `locks`, so concurrent events for one entity are
    /// applied one after another.
    ///
    /// The entity's entry is released afterwards unless another caller is
    /// still holding or waiting on it.
    pub fn trigger_event_locked<E>(
        &self,
        locks: &EntityLocks,
        ctx: &mut ActionContext<'_, E>,
    ) -> Result<Option<Arc<Transition<E>>>, CoreError>
    where
        E: StatefulEntity,
        P: EntityPersister<E>,
    {
        let entity_id = ctx.entity().id().to_string();
        let lock = locks.lock_for(&entity_id);
        let result = {
            let _guard = lock.lock();
            self.trigger_event(ctx)
        };
        drop(lock);
        locks.release(&entity_id);
        result
    }
}

impl Default for TransitionManager<NoopPersister> {
    fn default() -> Self {
        Self::new(NoopPersister)
    }
}
