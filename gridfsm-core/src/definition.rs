//! Compiled state machine definitions.
//!
//! A [`Definition`] is a matrix of `state -> event -> candidates`. Each
//! candidate pairs an optional [`Evaluator`] with a [`Transition`]; for a
//! given state and event the first candidate whose evaluator passes (or that
//! has none) is the one that fires.
//!
//! Definitions are immutable once built and can be shared between threads.

use crate::context::{ActionContext, StatefulEntity};
use crate::error::CoreError;
use crate::state::{Event, State};
use crate::transition::{Action, Evaluator, LoggingAction, Target, Transition, TransitionListener};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Name of the path created from a default path declaration.
pub const DEFAULT_PATH: &str = "default";

/// One guarded alternative for a (state, event) pair.
pub struct Candidate<E> {
    evaluator: Option<Arc<dyn Evaluator<E>>>,
    transition: Arc<Transition<E>>,
}

impl<E> Candidate<E> {
    pub fn evaluator(&self) -> Option<&Arc<dyn Evaluator<E>>> {
        self.evaluator.as_ref()
    }

    pub fn transition(&self) -> &Arc<Transition<E>> {
        &self.transition
    }

    /// A candidate without an evaluator always matches.
    fn matches(&self, ctx: &ActionContext<'_, E>) -> bool {
        self.evaluator
            .as_ref()
            .map(|e| e.evaluate(ctx))
            .unwrap_or(true)
    }
}

/// A flat transition declaration: event, from, to, optional evaluator and
/// actions. Lists of rules are grouped into a [`Definition`].
pub struct TransitionRule<E> {
    event: Event,
    from: State,
    to: Target<E>,
    evaluator: Option<Arc<dyn Evaluator<E>>>,
    actions: Vec<Arc<dyn Action<E>>>,
}

impl<E> TransitionRule<E> {
    pub fn new(event: impl Into<Event>, from: impl Into<State>, to: impl Into<Target<E>>) -> Self {
        Self {
            event: event.into(),
            from: from.into(),
            to: to.into(),
            evaluator: None,
            actions: Vec::new(),
        }
    }

    pub fn with_evaluator(mut self, evaluator: Arc<dyn Evaluator<E>>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_actions(mut self, actions: Vec<Arc<dyn Action<E>>>) -> Self {
        self.actions = actions;
        self
    }

    /// Appends an action after the ones already present.
    pub fn add_action(&mut self, action: Arc<dyn Action<E>>) {
        self.actions.push(action);
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn from_state(&self) -> &State {
        &self.from
    }

    pub fn to_state(&self) -> &State {
        self.to.declared()
    }

    pub fn evaluator(&self) -> Option<&Arc<dyn Evaluator<E>>> {
        self.evaluator.as_ref()
    }

    pub fn actions(&self) -> &[Arc<dyn Action<E>>] {
        &self.actions
    }
}

/// Validated and indexed state machine definition.
pub struct Definition<E> {
    /// Candidates indexed by from-state, then event, in declaration order.
    matrix: HashMap<State, HashMap<Event, Vec<Candidate<E>>>>,

    /// Named state sequences used for validation and visualisation.
    paths: HashMap<String, Vec<State>>,

    /// Observers notified after every transition, in order.
    listeners: Vec<Arc<dyn TransitionListener<E>>>,
}

impl<E: StatefulEntity> Definition<E> {
    /// Builds a definition from a flat list of rules.
    ///
    /// Rules are grouped by from-state and then event; within one event the
    /// input order is kept, which is the order candidates are evaluated in.
    /// A rule without actions gets a single [`LoggingAction`].
    pub fn from_rules(
        rules: Vec<TransitionRule<E>>,
        default_path: Option<Vec<String>>,
        listeners: Vec<Arc<dyn TransitionListener<E>>>,
    ) -> Result<Self, CoreError> {
        let paths = default_path
            .map(|path| vec![(DEFAULT_PATH.to_string(), path)])
            .unwrap_or_default();
        Self::assemble(rules, paths, listeners)
    }

    pub(crate) fn assemble(
        rules: Vec<TransitionRule<E>>,
        paths: Vec<(String, Vec<String>)>,
        listeners: Vec<Arc<dyn TransitionListener<E>>>,
    ) -> Result<Self, CoreError> {
        let mut matrix: HashMap<State, HashMap<Event, Vec<Candidate<E>>>> = HashMap::new();

        for rule in rules {
            let TransitionRule {
                event,
                from,
                to,
                evaluator,
                mut actions,
            } = rule;

            if actions.is_empty() {
                let name = format!("{}->{}->{} action", from, event.name(), to.declared());
                actions.push(Arc::new(LoggingAction::new(name)));
            }

            let transition = Arc::new(Transition::new(from.clone(), to, actions));
            matrix
                .entry(from)
                .or_default()
                .entry(event)
                .or_default()
                .push(Candidate {
                    evaluator,
                    transition,
                });
        }

        let mut definition = Self {
            matrix,
            paths: HashMap::new(),
            listeners,
        };

        for (name, states) in paths {
            let path = definition.validate_path(&name, states)?;
            definition.paths.insert(name, path);
        }

        Ok(definition)
    }

    /// Checks every state of a path against the declared states.
    fn validate_path(&self, name: &str, states: Vec<String>) -> Result<Vec<State>, CoreError> {
        let declared = self.states();
        states
            .into_iter()
            .map(State::from)
            .map(|state| {
                if declared.contains(&state) {
                    Ok(state)
                } else {
                    Err(CoreError::InvalidPath {
                        path: name.to_string(),
                        state: state.0,
                    })
                }
            })
            .collect()
    }

    /// Returns the transition that fires for the context's entity state and
    /// event, if any.
    ///
    /// Candidates are evaluated in declaration order and evaluation stops at
    /// the first match. No match is not an error.
    pub fn resolve_transition(&self, ctx: &ActionContext<'_, E>) -> Option<Arc<Transition<E>>> {
        let state = ctx.entity().state();
        let event = ctx.event();
        tracing::trace!(
            "Looking for transitions from state {} for event {}",
            state,
            event.name()
        );

        let found = self
            .matrix
            .get(state)
            .and_then(|events| events.get(event))
            .and_then(|candidates| candidates.iter().find(|c| c.matches(ctx)))
            .map(|c| Arc::clone(&c.transition));

        if found.is_none() {
            tracing::trace!(
                "No transitions found from state {} for event {}",
                state,
                event.name()
            );
        }
        found
    }

    /// All states: every from-state plus every declared target.
    pub fn states(&self) -> HashSet<State> {
        let mut states: HashSet<State> = self.matrix.keys().cloned().collect();
        states.extend(self.transitions().map(|t| t.to_state().clone()));
        states
    }

    /// All events that can cause a transition somewhere in the machine.
    pub fn events(&self) -> HashSet<Event> {
        self.matrix
            .values()
            .flat_map(|events| events.keys().cloned())
            .collect()
    }

    /// Events that have at least one candidate out of `state`.
    ///
    /// Role-restricted events are included regardless of who is asking; use
    /// [`authorised_events_for_state`](Self::authorised_events_for_state) to
    /// filter by the caller's roles.
    pub fn events_for_state(&self, state: &State) -> HashSet<Event> {
        self.matrix
            .get(state)
            .map(|events| events.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Events out of `state` that the caller holding `roles` may trigger.
    ///
    /// Unrestricted events are always included; restricted ones only when
    /// their role list shares at least one role with `roles`.
    pub fn authorised_events_for_state<S: AsRef<str>>(
        &self,
        state: &State,
        roles: &[S],
    ) -> HashSet<Event> {
        self.matrix
            .get(state)
            .map(|events| {
                events
                    .keys()
                    .filter(|e| e.is_authorised_for(roles))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every declared target reachable from `state` in one hop.
    pub fn target_states_from(&self, state: &State) -> HashSet<State> {
        self.matrix
            .get(state)
            .map(|events| {
                events
                    .values()
                    .flatten()
                    .map(|c| c.transition.to_state().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns true when `target` is NOT reachable from `current` in one hop.
    ///
    /// Used to refuse redundant requests to move an entity to a state a
    /// transition would already lead to; this is not a reachability check.
    pub fn is_target_state_viable(&self, current: &State, target: &State) -> bool {
        !self.target_states_from(current).contains(target)
    }

    /// The ordered candidates for a (state, event) pair.
    pub fn candidates(&self, state: &State, event: &Event) -> &[Candidate<E>] {
        self.matrix
            .get(state)
            .and_then(|events| events.get(event))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterates every transition in the matrix.
    pub fn transitions(&self) -> impl Iterator<Item = &Arc<Transition<E>>> + '_ {
        self.matrix
            .values()
            .flat_map(|events| events.values())
            .flatten()
            .map(|c| &c.transition)
    }

    pub fn transition_count(&self) -> usize {
        self.transitions().count()
    }

    pub fn paths(&self) -> &HashMap<String, Vec<State>> {
        &self.paths
    }

    /// States of a named path; empty when the path does not exist.
    pub fn states_for_path(&self, name: &str) -> &[State] {
        self.paths.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn listeners(&self) -> &[Arc<dyn TransitionListener<E>>] {
        &self.listeners
    }
}

impl<E> fmt::Debug for Definition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("states", &self.matrix.keys().collect::<Vec<_>>())
            .field("paths", &self.paths)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{named_evaluator, Ticket};

    fn sample_rules() -> Vec<TransitionRule<Ticket>> {
        vec![
            TransitionRule::new("Begin", "Start", State::from("Middle")),
            TransitionRule::new("Stop", "Middle", State::from("End")),
            TransitionRule::new(Event::authorised("Reset", ["admin"]), "Middle", State::from("Start")),
        ]
    }

    #[test]
    fn test_resolve_transition() {
        let def = Definition::from_rules(sample_rules(), None, Vec::new()).unwrap();

        let mut ticket = Ticket::new("t-1", "Start");
        let ctx = ActionContext::new("Begin", &mut ticket, &def);
        let transition = def.resolve_transition(&ctx).unwrap();
        assert_eq!(transition.from_state().as_str(), "Start");
        assert_eq!(transition.to_state().as_str(), "Middle");

        let ctx = ActionContext::new("Stop", &mut ticket, &def);
        assert!(def.resolve_transition(&ctx).is_none());
    }

    #[test]
    fn test_unknown_state_resolves_nothing() {
        let def = Definition::from_rules(sample_rules(), None, Vec::new()).unwrap();
        let mut ticket = Ticket::new("t-1", "Nowhere");
        let ctx = ActionContext::new("Begin", &mut ticket, &def);
        assert!(def.resolve_transition(&ctx).is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            TransitionRule::new("Decide", "Review", State::from("Refer"))
                .with_evaluator(named_evaluator("no", false)),
            TransitionRule::new("Decide", "Review", State::from("Approve"))
                .with_evaluator(named_evaluator("yes", true)),
            TransitionRule::new("Decide", "Review", State::from("Reject")),
        ];
        let def = Definition::from_rules(rules, None, Vec::new()).unwrap();

        let mut ticket = Ticket::new("t-1", "Review");
        let ctx = ActionContext::new("Decide", &mut ticket, &def);
        let transition = def.resolve_transition(&ctx).unwrap();
        assert_eq!(transition.to_state().as_str(), "Approve");

        let candidates = def.candidates(&State::from("Review"), &Event::new("Decide"));
        assert_eq!(candidates.len(), 3);
        assert!(candidates[2].evaluator().is_none());
    }

    #[test]
    fn test_first_match_short_circuits() {
        let rules = vec![
            TransitionRule::new("Decide", "Review", State::from("Approve")),
            TransitionRule::new("Decide", "Review", State::from("Reject"))
                .with_evaluator(crate::testutil::panicking_evaluator()),
        ];
        let def = Definition::from_rules(rules, None, Vec::new()).unwrap();

        let mut ticket = Ticket::new("t-1", "Review");
        let ctx = ActionContext::new("Decide", &mut ticket, &def);
        assert_eq!(
            def.resolve_transition(&ctx).unwrap().to_state().as_str(),
            "Approve"
        );
    }

    #[test]
    fn test_no_candidate_matches() {
        let rules = vec![TransitionRule::new("Decide", "Review", State::from("Approve"))
            .with_evaluator(named_evaluator("no", false))];
        let def = Definition::from_rules(rules, None, Vec::new()).unwrap();

        let mut ticket = Ticket::new("t-1", "Review");
        let ctx = ActionContext::new("Decide", &mut ticket, &def);
        assert!(def.resolve_transition(&ctx).is_none());
    }

    #[test]
    fn test_states_and_events() {
        let rules: Vec<TransitionRule<Ticket>> = vec![
            TransitionRule::new("Begin", "Start", State::from("Middle")),
            TransitionRule::new("Finish", "Middle", State::from("End")),
        ];
        let def = Definition::from_rules(rules, None, Vec::new()).unwrap();

        let mut states: Vec<_> = def.states().into_iter().map(|s| s.0).collect();
        states.sort();
        assert_eq!(states, vec!["End", "Middle", "Start"]);

        let mut events: Vec<_> = def.events().iter().map(|e| e.name().to_string()).collect();
        events.sort();
        assert_eq!(events, vec!["Begin", "Finish"]);
    }

    #[test]
    fn test_role_filtered_events() {
        let def = Definition::from_rules(sample_rules(), None, Vec::new()).unwrap();
        let middle = State::from("Middle");

        let all = def.events_for_state(&middle);
        assert_eq!(all.len(), 2);
        assert!(all.contains(&Event::new("Reset")));

        let anonymous = def.authorised_events_for_state::<&str>(&middle, &[]);
        assert!(!anonymous.contains(&Event::new("Reset")));

        let guest = def.authorised_events_for_state(&middle, &["guest"]);
        assert!(guest.contains(&Event::new("Stop")));
        assert!(!guest.contains(&Event::new("Reset")));

        let admin = def.authorised_events_for_state(&middle, &["admin"]);
        assert!(admin.contains(&Event::new("Stop")));
        assert!(admin.contains(&Event::new("Reset")));

        assert!(def
            .authorised_events_for_state(&State::from("Unknown"), &["admin"])
            .is_empty());
    }

    #[test]
    fn test_target_states_and_viability() {
        let def = Definition::from_rules(sample_rules(), None, Vec::new()).unwrap();
        let middle = State::from("Middle");

        let targets = def.target_states_from(&middle);
        assert_eq!(targets.len(), 2);
        assert!(targets.contains(&State::from("End")));
        assert!(targets.contains(&State::from("Start")));

        assert!(!def.is_target_state_viable(&middle, &State::from("End")));
        assert!(def.is_target_state_viable(&middle, &State::from("Middle")));
        assert!(def.target_states_from(&State::from("End")).is_empty());
    }

    #[test]
    fn test_default_path() {
        let path = vec!["Start".to_string(), "Middle".to_string(), "End".to_string()];
        let def = Definition::from_rules(sample_rules(), Some(path), Vec::new()).unwrap();

        let states: Vec<_> = def.states_for_path(DEFAULT_PATH).iter().map(State::as_str).collect();
        assert_eq!(states, vec!["Start", "Middle", "End"]);
        assert!(def.states_for_path("other").is_empty());
    }

    #[test]
    fn test_invalid_default_path() {
        let path = vec!["Start".to_string(), "Pub".to_string()];
        let result = Definition::from_rules(sample_rules(), Some(path), Vec::new());
        match result {
            Err(CoreError::InvalidPath { path, state }) => {
                assert_eq!(path, DEFAULT_PATH);
                assert_eq!(state, "Pub");
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_logging_action_synthesized() {
        let def = Definition::from_rules(sample_rules(), None, Vec::new()).unwrap();
        let candidates = def.candidates(&State::from("Start"), &Event::new("Begin"));
        let actions = candidates[0].transition().actions();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].name(), "Start->Begin->Middle action");
    }

    #[test]
    fn test_definition_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Definition<Ticket>>();
    }
}
