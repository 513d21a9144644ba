//! Command execution.
//!
//! The CLI has no access to real evaluator and action implementations, so
//! every component type named in the manifest is bound to a stand-in:
//! evaluators pass only when selected with `--pass`, actions only log.

use crate::Commands;
use colored::Colorize;
use gridfsm_core::{
    Action, ActionContext, BoxError, Definition, Evaluator, Event, NoopPersister, State,
    StatefulEntity, TransitionManager,
};
use gridfsm_loader::{ComponentRegistry, GridLoader, LoaderConfig, LoaderError, Manifest};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// Entity the CLI fires events against.
#[derive(Debug, Clone)]
pub struct DryRunEntity {
    state: State,
}

impl StatefulEntity for DryRunEntity {
    fn state(&self) -> &State {
        &self.state
    }

    fn set_state(&mut self, state: State) {
        self.state = state;
    }

    fn id(&self) -> &str {
        "dry-run"
    }
}

/// Evaluator with a fixed outcome.
struct StubEvaluator {
    description: String,
    passes: bool,
}

impl Evaluator<DryRunEntity> for StubEvaluator {
    fn description(&self) -> &str {
        &self.description
    }

    fn evaluate(&self, _ctx: &ActionContext<'_, DryRunEntity>) -> bool {
        tracing::info!(
            "Evaluator {} {}",
            self.description,
            if self.passes { "passed" } else { "failed" }
        );
        self.passes
    }
}

/// Action that only reports that it ran.
struct StubAction {
    name: String,
}

impl Action<DryRunEntity> for StubAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: &mut ActionContext<'_, DryRunEntity>) -> Result<(), BoxError> {
        tracing::info!(
            params = ctx.params().map(HashMap::len).unwrap_or(0),
            "Executing action {} in state {}",
            self.name,
            ctx.entity().state()
        );
        Ok(())
    }
}

/// A compiled machine plus the manifest it came from.
pub struct Session {
    manifest: Manifest,
    definition: Definition<DryRunEntity>,
}

impl Session {
    /// Compiles the manifest at `path`.
    ///
    /// `passes` holds manifest evaluator names or type ids that should pass.
    pub fn load(path: &Path, config: LoaderConfig, passes: &[String]) -> Result<Self, LoaderError> {
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Manifest::parse(&text)?;

        let passing: HashSet<String> = passes
            .iter()
            .map(|p| {
                manifest
                    .transition_evaluators
                    .get(p)
                    .cloned()
                    .unwrap_or_else(|| p.clone())
            })
            .collect();

        let definition = GridLoader::with_param(text.as_bytes(), stub_registry(&manifest), passing)
            .with_config(config)
            .load()?;

        Ok(Self {
            manifest,
            definition,
        })
    }
}

/// Registers a stand-in for every component type the manifest uses.
fn stub_registry(manifest: &Manifest) -> ComponentRegistry<DryRunEntity, HashSet<String>> {
    let mut registry = ComponentRegistry::new();

    for type_id in manifest.transition_evaluators.values() {
        let type_id = type_id.clone();
        registry.register_evaluator(type_id.clone(), move |passing: &HashSet<String>| {
            Ok(Arc::new(StubEvaluator {
                description: type_id.clone(),
                passes: passing.contains(&type_id),
            }) as Arc<dyn Evaluator<DryRunEntity>>)
        });
    }

    for type_id in manifest.transition_actions.values() {
        let type_id = type_id.clone();
        registry.register_action(type_id.clone(), move |_: &HashSet<String>| {
            Ok(Arc::new(StubAction {
                name: type_id.clone(),
            }) as Arc<dyn Action<DryRunEntity>>)
        });
    }

    registry
}

/// Executes a command and returns the formatted output.
pub fn execute(session: &Session, cmd: Commands) -> Result<String, Box<dyn std::error::Error>> {
    let definition = &session.definition;

    match cmd {
        Commands::Check => {
            let mut output = format!(
                "{} {}\n  States: {}\n  Events: {}\n  Transitions: {}",
                "OK".green(),
                session.manifest.definition.cyan(),
                definition.states().len(),
                definition.events().len(),
                definition.transition_count()
            );
            if let Some(entity_type) = &session.manifest.entity_type {
                output.push_str(&format!("\n  Entity type: {}", entity_type));
            }
            let mut paths: Vec<_> = definition.paths().keys().collect();
            paths.sort();
            for name in paths {
                output.push_str(&format!(
                    "\n  Path {}: {} states",
                    name.cyan(),
                    definition.states_for_path(name).len()
                ));
            }
            Ok(output)
        }

        Commands::States => Ok(format_list(
            definition.states().iter().map(State::as_str),
            "No states defined",
        )),

        Commands::Events { state, roles } => {
            let events = match &state {
                Some(state) => {
                    let state = State::from(state.as_str());
                    if roles.is_empty() {
                        definition.events_for_state(&state)
                    } else {
                        definition.authorised_events_for_state(&state, &roles)
                    }
                }
                None => definition
                    .events()
                    .into_iter()
                    .filter(|e| roles.is_empty() || e.is_authorised_for(&roles))
                    .collect(),
            };

            let mut events: Vec<Event> = events.into_iter().collect();
            events.sort_by(|a, b| a.name().cmp(b.name()));
            if events.is_empty() {
                return Ok("No events".yellow().to_string());
            }
            Ok(events
                .iter()
                .map(|e| match e.roles() {
                    Some(roles) => format!("  {} [{}]", e.name().cyan(), roles.join(", ")),
                    None => format!("  {}", e.name().cyan()),
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }

        Commands::Targets { state } => {
            let targets = definition.target_states_from(&State::from(state));
            Ok(format_list(
                targets.iter().map(State::as_str),
                "No transitions out of this state",
            ))
        }

        Commands::Path { name } => {
            let states = definition.states_for_path(&name);
            if states.is_empty() {
                return Ok(format!("No path named {}", name.cyan()).yellow().to_string());
            }
            Ok(states
                .iter()
                .map(State::as_str)
                .collect::<Vec<_>>()
                .join(" -> "))
        }

        Commands::Fire {
            state,
            event,
            passes: _,
            roles,
            params,
        } => {
            let event = definition
                .events()
                .into_iter()
                .find(|e| e.name() == event)
                .unwrap_or_else(|| Event::new(event));
            if !roles.is_empty() && !event.is_authorised_for(&roles) {
                return Err(format!("roles [{}] may not trigger {}", roles.join(", "), event).into());
            }

            let params = params
                .iter()
                .map(|p| parse_param(p))
                .collect::<Result<HashMap<_, _>, _>>()?;

            let mut entity = DryRunEntity {
                state: State::from(state),
            };
            let from = entity.state.clone();
            let mut ctx = ActionContext::new(event.clone(), &mut entity, definition);
            if !params.is_empty() {
                ctx = ctx.with_params(params);
            }

            match TransitionManager::new(NoopPersister).trigger_event(&mut ctx)? {
                Some(transition) => {
                    let actions: Vec<&str> = transition.actions().iter().map(|a| a.name()).collect();
                    drop(ctx);
                    Ok(format!(
                        "{} {} --{}--> {}\n  Actions: {}",
                        "Fired".green(),
                        from.as_str().yellow(),
                        event.name().cyan(),
                        entity.state.as_str().yellow(),
                        actions.join(", ")
                    ))
                }
                None => Ok(format!(
                    "{} for {} in state {}",
                    "No transition".yellow(),
                    event.name().cyan(),
                    from.as_str()
                )),
            }
        }
    }
}

fn format_list<'a>(items: impl Iterator<Item = &'a str>, empty: &str) -> String {
    let mut items: Vec<&str> = items.collect();
    if items.is_empty() {
        return empty.yellow().to_string();
    }
    items.sort_unstable();
    items
        .iter()
        .map(|s| format!("  {}", s.cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses a `KEY=JSON` parameter; `KEY=@file.json` reads the value from a file.
fn parse_param(arg: &str) -> Result<(String, Value), Box<dyn std::error::Error>> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("parameter '{}' is not KEY=VALUE", arg))?;
    let value = if let Some(path) = value.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)?
    } else {
        // Bare words are taken as strings.
        serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()))
    };
    Ok((key.trim().to_string(), value))
}
