//! Shared fixtures for unit tests.

use crate::context::{ActionContext, StatefulEntity};
use crate::error::BoxError;
use crate::state::State;
use crate::transition::{Action, Evaluator, FnEvaluator, Transition, TransitionListener};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: String,
    pub state: State,
    pub assignee: Option<String>,
}

impl Ticket {
    pub fn new(id: &str, state: &str) -> Self {
        Self {
            id: id.to_string(),
            state: State::from(state),
            assignee: None,
        }
    }
}

impl StatefulEntity for Ticket {
    fn state(&self) -> &State {
        &self.state
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Records `name@state` for the state observed while executing.
pub struct RecordingAction {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingAction {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }
}

impl Action<Ticket> for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ActionContext<'_, Ticket>) -> Result<(), BoxError> {
        self.log
            .lock()
            .push(format!("{}@{}", self.name, ctx.entity().state()));
        Ok(())
    }
}

pub struct FailingAction {
    name: String,
}

impl FailingAction {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Action<Ticket> for FailingAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _ctx: &mut ActionContext<'_, Ticket>) -> Result<(), BoxError> {
        Err(format!("{} refused", self.name).into())
    }
}

/// Records `name@state` for the state observed when notified.
pub struct RecordingListener {
    name: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl RecordingListener {
    pub fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name: name.to_string(),
            log,
        }
    }
}

impl TransitionListener<Ticket> for RecordingListener {
    fn on_transition(
        &self,
        _transition: &Transition<Ticket>,
        ctx: &ActionContext<'_, Ticket>,
    ) -> Result<(), BoxError> {
        self.log
            .lock()
            .push(format!("{}@{}", self.name, ctx.entity().state()));
        Ok(())
    }
}

pub fn named_evaluator(name: &str, outcome: bool) -> Arc<dyn Evaluator<Ticket>> {
    Arc::new(FnEvaluator::new(
        name,
        move |_: &ActionContext<'_, Ticket>| outcome,
    ))
}

pub fn panicking_evaluator() -> Arc<dyn Evaluator<Ticket>> {
    Arc::new(FnEvaluator::new(
        "must not be evaluated",
        |_: &ActionContext<'_, Ticket>| -> bool { panic!("evaluated after a match") },
    ))
}
