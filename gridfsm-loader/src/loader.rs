//! Compiles a manifest and its grid into a [`Definition`].

use crate::cell;
use crate::config::LoaderConfig;
use crate::error::{ComponentKind, LoaderError};
use crate::grid::Grid;
use crate::header;
use crate::manifest::Manifest;
use crate::registry::ComponentRegistry;
use gridfsm_core::{
    Action, Definition, Evaluator, State, StatefulEntity, Target, TransitionListener,
    TransitionRule,
};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::sync::Arc;

/// Extra action appended to every transition that leads to `to_state`.
pub struct ActionOverride<E> {
    pub to_state: State,
    pub action: Arc<dyn Action<E>>,
}

impl<E> ActionOverride<E> {
    pub fn new(to_state: impl Into<State>, action: Arc<dyn Action<E>>) -> Self {
        Self {
            to_state: to_state.into(),
            action,
        }
    }
}

impl<E> Clone for ActionOverride<E> {
    fn clone(&self) -> Self {
        Self {
            to_state: self.to_state.clone(),
            action: Arc::clone(&self.action),
        }
    }
}

/// Loads a definition from a manifest and the grid it points at.
///
/// ```ignore
/// let mut registry = ComponentRegistry::new();
/// registry.register_simple_evaluator("is-urgent", || IsUrgent);
///
/// let definition = GridLoader::new(File::open("ticket.yaml")?, registry)
///     .with_config(LoaderConfig::load()?)
///     .load()?;
/// ```
pub struct GridLoader<R, E, P = ()> {
    manifest: R,
    registry: ComponentRegistry<E, P>,
    param: P,
    config: LoaderConfig,
}

impl<R, E, P> GridLoader<R, E, P>
where
    R: Read,
    E: StatefulEntity + 'static,
    P: Default + 'static,
{
    pub fn new(manifest: R, registry: ComponentRegistry<E, P>) -> Self {
        Self::with_param(manifest, registry, P::default())
    }
}

impl<R, E, P> GridLoader<R, E, P>
where
    R: Read,
    E: StatefulEntity + 'static,
    P: 'static,
{
    /// Creates a loader whose factories receive `param`.
    pub fn with_param(manifest: R, registry: ComponentRegistry<E, P>, param: P) -> Self {
        Self {
            manifest,
            registry,
            param,
            config: LoaderConfig::default(),
        }
    }

    /// Replaces the parameter handed to every component factory.
    pub fn with_shared_param(mut self, param: P) -> Self {
        self.param = param;
        self
    }

    pub fn with_config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &ComponentRegistry<E, P> {
        &self.registry
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn load(self) -> Result<Definition<E>, LoaderError> {
        self.load_with(&[], Vec::new())
    }

    pub fn load_with_overrides(
        self,
        overrides: &[ActionOverride<E>],
    ) -> Result<Definition<E>, LoaderError> {
        self.load_with(overrides, Vec::new())
    }

    /// Reads the manifest, finds its grid and compiles both.
    pub fn load_with(
        mut self,
        overrides: &[ActionOverride<E>],
        listeners: Vec<Arc<dyn TransitionListener<E>>>,
    ) -> Result<Definition<E>, LoaderError> {
        self.config.validate()?;
        let manifest = Manifest::from_reader(&mut self.manifest)?;

        let path = self
            .config
            .resolve_resource(&manifest.definition)
            .ok_or_else(|| LoaderError::ResourceNotFound {
                definition: manifest.definition.clone(),
            })?;
        tracing::debug!("Reading state machine grid {}", path.display());

        let file = File::open(&path).map_err(|source| LoaderError::Io {
            path: path.clone(),
            source,
        })?;

        self.compile(&manifest, BufReader::new(file), overrides, listeners)
    }

    /// Compiles an already parsed manifest against grid text from `grid`.
    pub fn compile<G: Read>(
        &self,
        manifest: &Manifest,
        grid: G,
        overrides: &[ActionOverride<E>],
        listeners: Vec<Arc<dyn TransitionListener<E>>>,
    ) -> Result<Definition<E>, LoaderError> {
        self.config.validate()?;
        self.check_component_types(manifest)?;

        let grid = Grid::read(grid, self.config.delimiter_byte()?)?;
        let events = grid
            .events
            .iter()
            .map(|h| header::parse_event_header(h))
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::new();
        for row in &grid.rows {
            let from = State::from(row.state.as_str());
            for (cell_text, event) in row.cells.iter().zip(&events) {
                for transition in cell::parse_cell(cell_text, manifest)? {
                    let mut rule = TransitionRule::new(
                        event.clone(),
                        from.clone(),
                        Target::Fixed(State::from(transition.target)),
                    );

                    if let Some(name) = &transition.evaluator {
                        rule = rule.with_evaluator(self.build_evaluator(manifest, name)?);
                    }
                    if let Some(name) = &transition.action {
                        rule.add_action(self.build_action(manifest, name)?);
                    }
                    if let Some(extra) = overrides.iter().find(|o| &o.to_state == rule.to_state()) {
                        rule.add_action(Arc::clone(&extra.action));
                    }

                    rules.push(rule);
                }
            }
        }

        validate(&grid, &rules, manifest)?;

        let definition = Definition::from_rules(rules, manifest.default_path.clone(), listeners)?;
        tracing::debug!(
            states = grid.rows.len(),
            events = events.len(),
            transitions = definition.transition_count(),
            "Compiled state machine definition {}",
            manifest.definition
        );
        Ok(definition)
    }

    /// Every type id the manifest mentions must have a factory.
    fn check_component_types(&self, manifest: &Manifest) -> Result<(), LoaderError> {
        for (name, type_id) in &manifest.transition_evaluators {
            if !self.registry.has_evaluator(type_id) {
                return Err(LoaderError::UnregisteredType {
                    kind: ComponentKind::Evaluator,
                    name: name.clone(),
                    type_id: type_id.clone(),
                });
            }
        }
        for (name, type_id) in &manifest.transition_actions {
            if !self.registry.has_action(type_id) {
                return Err(LoaderError::UnregisteredType {
                    kind: ComponentKind::Action,
                    name: name.clone(),
                    type_id: type_id.clone(),
                });
            }
        }
        Ok(())
    }

    fn build_evaluator(
        &self,
        manifest: &Manifest,
        name: &str,
    ) -> Result<Arc<dyn Evaluator<E>>, LoaderError> {
        let type_id = manifest
            .transition_evaluators
            .get(name)
            .ok_or_else(|| LoaderError::UnknownEvaluator {
                name: name.to_string(),
            })?;
        let factory =
            self.registry
                .evaluator_factory(type_id)
                .ok_or_else(|| LoaderError::UnregisteredType {
                    kind: ComponentKind::Evaluator,
                    name: name.to_string(),
                    type_id: type_id.clone(),
                })?;
        factory(&self.param).map_err(|source| LoaderError::Construction {
            kind: ComponentKind::Evaluator,
            type_id: type_id.clone(),
            source,
        })
    }

    fn build_action(&self, manifest: &Manifest, name: &str) -> Result<Arc<dyn Action<E>>, LoaderError> {
        let type_id = manifest
            .transition_actions
            .get(name)
            .ok_or_else(|| LoaderError::UnknownAction {
                name: name.to_string(),
            })?;
        let factory = self
            .registry
            .action_factory(type_id)
            .ok_or_else(|| LoaderError::UnregisteredType {
                kind: ComponentKind::Action,
                name: name.to_string(),
                type_id: type_id.clone(),
            })?;
        factory(&self.param).map_err(|source| LoaderError::Construction {
            kind: ComponentKind::Action,
            type_id: type_id.clone(),
            source,
        })
    }
}

/// Checks, in order: targets, default path, duplicate states, duplicate events.
fn validate<E>(
    grid: &Grid,
    rules: &[TransitionRule<E>],
    manifest: &Manifest,
) -> Result<(), LoaderError> {
    let states: HashSet<&str> = grid.states().collect();

    if let Some(rule) = rules
        .iter()
        .find(|r| !states.contains(r.to_state().as_str()))
    {
        return Err(LoaderError::InvalidTarget {
            state: rule.to_state().to_string(),
        });
    }

    if let Some(path) = &manifest.default_path {
        if let Some(state) = path.iter().find(|s| !states.contains(s.as_str())) {
            return Err(LoaderError::InvalidDefaultPath {
                state: state.clone(),
            });
        }
    }

    let duplicate_states = duplicates(grid.states());
    if !duplicate_states.is_empty() {
        return Err(LoaderError::DuplicateStates {
            states: duplicate_states,
        });
    }

    let duplicate_events = duplicates(grid.events.iter().map(|h| header::event_name(h)));
    if !duplicate_events.is_empty() {
        return Err(LoaderError::DuplicateEvents {
            events: duplicate_events,
        });
    }

    Ok(())
}

/// Values seen more than once, each reported once, in order of first repeat.
fn duplicates<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    let mut duplicates = Vec::new();
    for value in values {
        if !seen.insert(value) && reported.insert(value) {
            duplicates.push(value.to_string());
        }
    }
    duplicates
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridfsm_core::{ActionContext, BoxError, FnEvaluator, NoopPersister, TransitionManager};
    use parking_lot::Mutex;

    #[derive(Debug, Clone)]
    struct Case {
        id: String,
        name: String,
        state: State,
        notes: Vec<String>,
    }

    impl Case {
        fn new(state: &str) -> Self {
            Self {
                id: "case-1".to_string(),
                name: "A".to_string(),
                state: State::from(state),
                notes: Vec::new(),
            }
        }
    }

    impl StatefulEntity for Case {
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

    struct Note(&'static str);

    impl Action<Case> for Note {
        fn name(&self) -> &str {
            self.0
        }

        fn execute(&self, ctx: &mut ActionContext<'_, Case>) -> Result<(), BoxError> {
            ctx.entity_mut().notes.push(self.0.to_string());
            Ok(())
        }
    }

    fn registry() -> ComponentRegistry<Case> {
        let mut registry = ComponentRegistry::new();
        registry
            .register_simple_evaluator("always", || {
                FnEvaluator::new("always passes", |_: &ActionContext<'_, Case>| true)
            })
            .register_simple_evaluator("never", || {
                FnEvaluator::new("never passes", |_: &ActionContext<'_, Case>| false)
            })
            .register_simple_evaluator("name-is-b", || {
                FnEvaluator::new("name is B", |ctx: &ActionContext<'_, Case>| {
                    ctx.entity().name == "B"
                })
            })
            .register_simple_action("ta1", || Note("TA1"));
        registry
    }

    fn manifest(default_path: Option<&[&str]>) -> Manifest {
        Manifest {
            definition: "inline.csv".to_string(),
            entity_type: Some("Case".to_string()),
            transition_evaluators: [("TE1", "always"), ("TE2", "never"), ("TEB", "name-is-b")]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            transition_actions: [("TA1".to_string(), "ta1".to_string())].into_iter().collect(),
            default_path: default_path.map(|p| p.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn compile(grid: &str, overrides: &[ActionOverride<Case>]) -> Result<Definition<Case>, LoaderError> {
        GridLoader::new("".as_bytes(), registry()).compile(
            &manifest(None),
            grid.as_bytes(),
            overrides,
            Vec::new(),
        )
    }

    fn fire(definition: &Definition<Case>, case: &mut Case, event: &str) {
        TransitionManager::new(NoopPersister)
            .trigger_event(&mut ActionContext::new(event, case, definition))
            .unwrap();
    }

    #[test]
    fn test_guarded_transition_with_action() {
        let definition = compile("State,Go\nNew,TE1/Middle/TA1\nMiddle,\n", &[]).unwrap();

        let mut case = Case::new("New");
        fire(&definition, &mut case, "Go");
        assert_eq!(case.state.as_str(), "Middle");
        assert_eq!(case.notes, vec!["TA1"]);
    }

    #[test]
    fn test_first_match_across_brackets() {
        let definition = compile(
            "State,Decide\nReview,[TE2/Refer][TE1/Approve/TA1][Reject/TA1]\nRefer,\nApprove,\nReject,\n",
            &[],
        )
        .unwrap();

        let candidates = definition.candidates(&State::from("Review"), &"Decide".into());
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].transition().to_state().as_str(), "Refer");
        assert!(candidates[2].evaluator().is_none());

        let mut case = Case::new("Review");
        fire(&definition, &mut case, "Decide");
        assert_eq!(case.state.as_str(), "Approve");
    }

    #[test]
    fn test_state_action_cell() {
        let definition = compile("State,Go\nNew,Middle/TA1\nMiddle,\n", &[]).unwrap();
        let candidates = definition.candidates(&State::from("New"), &"Go".into());
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].evaluator().is_none());
        assert_eq!(candidates[0].transition().actions().len(), 1);
        assert_eq!(candidates[0].transition().actions()[0].name(), "TA1");
    }

    #[test]
    fn test_overrides_appended_after_parsed_action() {
        let first: Arc<dyn Action<Case>> = Arc::new(Note("override"));
        let second: Arc<dyn Action<Case>> = Arc::new(Note("ignored"));
        let overrides = vec![
            ActionOverride::new("Middle", first),
            ActionOverride::new("Middle", second),
        ];
        let definition =
            compile("State,Go,Back\nNew,TE1/Middle/TA1,\nMiddle,,New\n", &overrides).unwrap();

        let mut case = Case::new("New");
        fire(&definition, &mut case, "Go");
        assert_eq!(case.notes, vec!["TA1", "override"]);

        // Transitions to other states are untouched.
        fire(&definition, &mut case, "Back");
        assert_eq!(case.state.as_str(), "New");
        assert_eq!(case.notes.len(), 2);
    }

    #[test]
    fn test_unguarded_transition_gets_logging_action() {
        let definition = compile("State,Go\nNew,Middle\nMiddle,\n", &[]).unwrap();
        let candidates = definition.candidates(&State::from("New"), &"Go".into());
        assert_eq!(
            candidates[0].transition().actions()[0].name(),
            "New->Go->Middle action"
        );
    }

    #[test]
    fn test_roles_from_header() {
        let definition =
            compile("State,\"Approve[admin, auditor]\",Comment\nOpen,Closed,Open\nClosed,\n", &[])
                .unwrap();
        let open = State::from("Open");

        assert_eq!(definition.events_for_state(&open).len(), 2);
        let guest: Vec<_> = definition
            .authorised_events_for_state(&open, &["guest"])
            .into_iter()
            .map(|e| e.name().to_string())
            .collect();
        assert_eq!(guest, vec!["Comment"]);
        assert_eq!(definition.authorised_events_for_state(&open, &["admin"]).len(), 2);
    }

    #[test]
    fn test_validation_order() {
        // Invalid target is reported before duplicate states.
        let err = compile("State,Go\nNew,Nowhere\nNew,\n", &[]).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidTarget { ref state } if state == "Nowhere"));

        // Duplicate states are reported before duplicate events.
        let err = compile("State,Go,Go[admin]\nNew,,\nNew,,\n", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate state(s) detected: [New]");

        let err = compile("State,Go,Go[admin]\nNew,,\n", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Duplicate event(s) detected: [Go]");
    }

    #[test]
    fn test_default_path_validated() {
        let loader = GridLoader::new("".as_bytes(), registry());
        let err = loader
            .compile(
                &manifest(Some(&["New", "Pub"])),
                "State,Go\nNew,Middle\nMiddle,\n".as_bytes(),
                &[],
                Vec::new(),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "State 'Pub' in defaultPath is invalid as it is not defined in the state machine definition matrix"
        );

        let definition = loader
            .compile(
                &manifest(Some(&["New", "Middle"])),
                "State,Go\nNew,Middle\nMiddle,\n".as_bytes(),
                &[],
                Vec::new(),
            )
            .unwrap();
        assert_eq!(definition.states_for_path(gridfsm_core::DEFAULT_PATH).len(), 2);
    }

    #[test]
    fn test_unregistered_type() {
        let mut manifest = manifest(None);
        manifest
            .transition_actions
            .insert("TA2".to_string(), "missing-type".to_string());

        let err = GridLoader::new("".as_bytes(), registry())
            .compile(&manifest, "State,Go\nNew,\n".as_bytes(), &[], Vec::new())
            .unwrap_err();
        match err {
            LoaderError::UnregisteredType { kind, name, type_id } => {
                assert_eq!(kind, ComponentKind::Action);
                assert_eq!(name, "TA2");
                assert_eq!(type_id, "missing-type");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_factory_receives_shared_param() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);

        let mut registry: ComponentRegistry<Case, String> = ComponentRegistry::new();
        registry.register_action("ta1", move |param: &String| {
            sink.lock().push(param.clone());
            Ok(Arc::new(Note("TA1")) as Arc<dyn Action<Case>>)
        });
        let mut manifest = manifest(None);
        manifest.transition_evaluators.clear();

        GridLoader::new("".as_bytes(), registry)
            .with_shared_param("db://cases".to_string())
            .compile(
                &manifest,
                "State,Go,Stop\nNew,Middle/TA1,End/TA1\nMiddle,\nEnd,\n".as_bytes(),
                &[],
                Vec::new(),
            )
            .unwrap();

        // One construction per referencing cell.
        assert_eq!(*seen.lock(), vec!["db://cases", "db://cases"]);
    }

    #[test]
    fn test_construction_failure() {
        let mut registry: ComponentRegistry<Case> = ComponentRegistry::new();
        registry.register_action("ta1", |_: &()| Err("connection refused".into()));
        let mut manifest = manifest(None);
        manifest.transition_evaluators.clear();

        let err = GridLoader::new("".as_bytes(), registry)
            .compile(&manifest, "State,Go\nNew,Middle/TA1\nMiddle,\n".as_bytes(), &[], Vec::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to construct new instance of transition action type 'ta1': connection refused"
        );
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let config = LoaderConfig {
            delimiter: 'é',
            ..Default::default()
        };
        let err = GridLoader::new("".as_bytes(), registry())
            .with_config(config)
            .compile(&manifest(None), "StateéGo\nNewéMiddle\n".as_bytes(), &[], Vec::new())
            .unwrap_err();
        assert!(matches!(err, LoaderError::Config(_)));
    }

    #[test]
    fn test_duplicates_reported_once() {
        let found = duplicates(["a", "b", "a", "c", "a", "b"].into_iter());
        assert_eq!(found, vec!["a", "b"]);
    }
}
