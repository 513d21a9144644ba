//! # gridfsm-core
//!
//! Finite state machine runtime for gridfsm.
//!
//! This crate provides:
//! - States, events and role-based event authorisation
//! - Transition definitions with evaluators, actions and listeners
//! - First-match transition resolution
//! - A transition manager with pluggable persistence
//! - Per-entity locking for concurrent callers

pub mod builder;
pub mod context;
pub mod definition;
pub mod error;
pub mod locks;
pub mod manager;
pub mod state;
pub mod transition;

#[cfg(test)]
mod testutil;

pub use builder::DefinitionBuilder;
pub use context::{ActionContext, StatefulEntity};
pub use definition::{Candidate, Definition, TransitionRule, DEFAULT_PATH};
pub use error::{BoxError, CoreError};
pub use locks::EntityLocks;
pub use manager::{EntityPersister, NoopPersister, TransitionManager};
pub use state::{Event, State};
pub use transition::{
    Action, Evaluator, FnEvaluator, LoggingAction, Target, TargetFn, Transition,
    TransitionListener,
};
