//! Loader error types.

use crate::config::ConfigError;
use gridfsm_core::{BoxError, CoreError};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Kind of component referenced from a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Evaluator,
    Action,
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Evaluator => write!(f, "transition evaluator"),
            ComponentKind::Action => write!(f, "transition action"),
        }
    }
}

/// Errors raised while compiling a manifest and grid into a definition.
///
/// Compilation stops at the first error; no partial definition is produced.
#[derive(Debug, Error)]
pub enum LoaderError {
    // Resources
    #[error("Could not find state machine definition file '{definition}'")]
    ResourceNotFound { definition: String },

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read state machine grid: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to load manifest: {reason}")]
    Manifest { reason: String },

    // Grid shape
    #[error("state machine definition grid is empty")]
    EmptyGrid,

    #[error("row {line} has {len} columns but the header only has {header_len}")]
    RaggedRow {
        line: u64,
        len: usize,
        header_len: usize,
    },

    #[error("row {line} has transitions but no state name")]
    EmptyStateName { line: u64 },

    // Event headers
    #[error("Event '{event}' appears to be invalid as it is missing an opening brace for the authorisation definition")]
    EventMissingOpeningBrace { event: String },

    #[error("Event '{event}' appears to be invalid as it is missing a closing brace for the authorisation definition")]
    EventMissingClosingBrace { event: String },

    #[error("Event '{event}' appears to be invalid as its authorisation definition has no roles")]
    EmptyRoleList { event: String },

    #[error("Event '{event}' appears to be invalid: {reason}")]
    MalformedEvent { event: String, reason: String },

    // Cells
    #[error("Transition '{cell}' appears to be invalid as it is missing an opening brace or closing brace")]
    TransitionMissingBrace { cell: String },

    #[error("Transition '{cell}' appears to be invalid as it is missing an opening brace")]
    TransitionMissingOpeningBrace { cell: String },

    #[error("Transition '{cell}' appears to be invalid: {reason}")]
    MalformedTransition { cell: String, reason: String },

    #[error("Failed to find evaluators, states or actions for tokens [{}]", .tokens.join(", "))]
    UnresolvedTokens { tokens: Vec<String> },

    #[error("Unable to find reference to transition evaluator '{name}' in manifest file")]
    UnknownEvaluator { name: String },

    #[error("Unable to find reference to transition action '{name}' in manifest file")]
    UnknownAction { name: String },

    // Components
    #[error("Failed to load {kind} type '{type_id}' defined in manifest for '{name}': no factory is registered")]
    UnregisteredType {
        kind: ComponentKind,
        name: String,
        type_id: String,
    },

    #[error("Failed to construct new instance of {kind} type '{type_id}': {source}")]
    Construction {
        kind: ComponentKind,
        type_id: String,
        #[source]
        source: BoxError,
    },

    // Validation
    #[error("Target state '{state}' is invalid as it is not defined in the state machine definition matrix")]
    InvalidTarget { state: String },

    #[error("State '{state}' in defaultPath is invalid as it is not defined in the state machine definition matrix")]
    InvalidDefaultPath { state: String },

    #[error("Duplicate state(s) detected: [{}]", .states.join(", "))]
    DuplicateStates { states: Vec<String> },

    #[error("Duplicate event(s) detected: [{}]", .events.join(", "))]
    DuplicateEvents { events: Vec<String> },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoaderError {
    /// Returns an error code suitable for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            LoaderError::ResourceNotFound { .. } => "RESOURCE",
            LoaderError::Io { .. } => "RESOURCE",
            LoaderError::Csv(_) => "RESOURCE",
            LoaderError::Manifest { .. } => "FORMAT",
            LoaderError::EmptyGrid => "FORMAT",
            LoaderError::RaggedRow { .. } => "FORMAT",
            LoaderError::EmptyStateName { .. } => "FORMAT",
            LoaderError::EventMissingOpeningBrace { .. } => "FORMAT",
            LoaderError::EventMissingClosingBrace { .. } => "FORMAT",
            LoaderError::EmptyRoleList { .. } => "FORMAT",
            LoaderError::MalformedEvent { .. } => "FORMAT",
            LoaderError::TransitionMissingBrace { .. } => "FORMAT",
            LoaderError::TransitionMissingOpeningBrace { .. } => "FORMAT",
            LoaderError::MalformedTransition { .. } => "FORMAT",
            LoaderError::UnresolvedTokens { .. } => "REFERENCE",
            LoaderError::UnknownEvaluator { .. } => "REFERENCE",
            LoaderError::UnknownAction { .. } => "REFERENCE",
            LoaderError::UnregisteredType { .. } => "CONSTRUCTION",
            LoaderError::Construction { .. } => "CONSTRUCTION",
            LoaderError::InvalidTarget { .. } => "REFERENCE",
            LoaderError::InvalidDefaultPath { .. } => "REFERENCE",
            LoaderError::DuplicateStates { .. } => "UNIQUENESS",
            LoaderError::DuplicateEvents { .. } => "UNIQUENESS",
            LoaderError::Core(e) => e.error_code(),
            LoaderError::Config(e) => e.error_code(),
        }
    }
}
