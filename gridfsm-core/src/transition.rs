//! Transitions and the components that run during them.
//!
//! A [`Transition`] is performed in a fixed order:
//!
//! 1. every [`Action`] in declaration order
//! 2. target resolution and `entity.set_state(target)`
//! 3. every [`TransitionListener`] of the definition in declaration order
//!
//! The first failure aborts the sequence. Nothing that already ran is undone.

use crate::context::{ActionContext, StatefulEntity};
use crate::error::{BoxError, CoreError};
use crate::state::State;
use std::fmt;
use std::sync::Arc;

/// A named guard deciding whether a candidate transition applies.
pub trait Evaluator<E>: Send + Sync {
    /// Human readable form of the check, e.g. "is the amount above 100".
    fn description(&self) -> &str;

    /// Evaluates the guard. Implementations should not have side effects.
    fn evaluate(&self, ctx: &ActionContext<'_, E>) -> bool;
}

/// A named side-effecting step of a transition.
pub trait Action<E>: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// Runs the step. May mutate the entity and the context parameters.
    fn execute(&self, ctx: &mut ActionContext<'_, E>) -> Result<(), BoxError>;
}

/// Observer notified after a transition has updated the entity's state.
pub trait TransitionListener<E>: Send + Sync {
    fn on_transition(
        &self,
        transition: &Transition<E>,
        ctx: &ActionContext<'_, E>,
    ) -> Result<(), BoxError>;
}

/// Evaluator backed by a closure.
pub struct FnEvaluator<F> {
    description: String,
    predicate: F,
}

impl<F> FnEvaluator<F> {
    pub fn new<E>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&ActionContext<'_, E>) -> bool + Send + Sync,
    {
        Self {
            description: description.into(),
            predicate,
        }
    }
}

impl<E, F> Evaluator<E> for FnEvaluator<F>
where
    F: Fn(&ActionContext<'_, E>) -> bool + Send + Sync,
{
    fn description(&self) -> &str {
        &self.description
    }

    fn evaluate(&self, ctx: &ActionContext<'_, E>) -> bool {
        (self.predicate)(ctx)
    }
}

/// Action that does nothing but emit a trace event.
///
/// Definitions built from rules without actions get one of these so every
/// transition has at least one named step.
#[derive(Debug, Clone)]
pub struct LoggingAction {
    name: String,
}

impl LoggingAction {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl<E: StatefulEntity> Action<E> for LoggingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ActionContext<'_, E>) -> Result<(), BoxError> {
        tracing::trace!(entity = ctx.entity().id(), "Executing action {}", self.name);
        Ok(())
    }
}

/// Function computing a transition's target from the triggering context.
pub type TargetFn<E> = Arc<dyn Fn(&ActionContext<'_, E>) -> State + Send + Sync>;

/// Where a transition leads.
pub enum Target<E> {
    /// Always the same state.
    Fixed(State),

    /// Computed from the context when the transition is performed.
    /// `declared` is the state reported by static queries and checked by
    /// validation.
    Dynamic { declared: State, resolve: TargetFn<E> },
}

impl<E> Target<E> {
    /// Creates a context-dependent target.
    pub fn dynamic<F>(declared: impl Into<State>, resolve: F) -> Self
    where
        F: Fn(&ActionContext<'_, E>) -> State + Send + Sync + 'static,
    {
        Target::Dynamic {
            declared: declared.into(),
            resolve: Arc::new(resolve),
        }
    }

    pub fn declared(&self) -> &State {
        match self {
            Target::Fixed(state) => state,
            Target::Dynamic { declared, .. } => declared,
        }
    }

    pub fn resolve(&self, ctx: &ActionContext<'_, E>) -> State {
        match self {
            Target::Fixed(state) => state.clone(),
            Target::Dynamic { resolve, .. } => resolve(ctx),
        }
    }
}

impl<E> Clone for Target<E> {
    fn clone(&self) -> Self {
        match self {
            Target::Fixed(state) => Target::Fixed(state.clone()),
            Target::Dynamic { declared, resolve } => Target::Dynamic {
                declared: declared.clone(),
                resolve: Arc::clone(resolve),
            },
        }
    }
}

impl<E> From<State> for Target<E> {
    fn from(state: State) -> Self {
        Target::Fixed(state)
    }
}

impl<E> fmt::Debug for Target<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Fixed(state) => f.debug_tuple("Fixed").field(state).finish(),
            Target::Dynamic { declared, .. } => f
                .debug_struct("Dynamic")
                .field("declared", declared)
                .finish_non_exhaustive(),
        }
    }
}

/// An edge of the machine together with the actions run when it fires.
pub struct Transition<E> {
    from: State,
    target: Target<E>,
    actions: Vec<Arc<dyn Action<E>>>,
}

impl<E: StatefulEntity> Transition<E> {
    pub fn new(from: State, target: impl Into<Target<E>>, actions: Vec<Arc<dyn Action<E>>>) -> Self {
        Self {
            from,
            target: target.into(),
            actions,
        }
    }

    pub fn from_state(&self) -> &State {
        &self.from
    }

    /// Target reported to static queries.
    pub fn to_state(&self) -> &State {
        self.target.declared()
    }

    pub fn target(&self) -> &Target<E> {
        &self.target
    }

    /// Target the entity will move to for this context.
    pub fn resolve_to_state(&self, ctx: &ActionContext<'_, E>) -> State {
        self.target.resolve(ctx)
    }

    pub fn actions(&self) -> &[Arc<dyn Action<E>>] {
        &self.actions
    }

    /// Runs the actions, updates the entity's state and notifies listeners.
    pub fn perform(&self, ctx: &mut ActionContext<'_, E>) -> Result<(), CoreError> {
        for action in &self.actions {
            tracing::trace!("Executing transition action {}", action.name());
            action
                .execute(ctx)
                .map_err(|source| CoreError::ActionFailed {
                    action: action.name().to_string(),
                    source,
                })?;
        }

        let to_state = self.target.resolve(ctx);
        tracing::trace!("Updating entity state to {}", to_state);
        ctx.entity_mut().set_state(to_state);

        let definition = ctx.definition();
        for listener in definition.listeners() {
            tracing::trace!("Calling transition listener");
            listener
                .on_transition(self, ctx)
                .map_err(|source| CoreError::ListenerFailed { source })?;
        }

        Ok(())
    }
}

impl<E> fmt::Debug for Transition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("target", &self.target)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
