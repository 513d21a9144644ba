//! # gridfsm-loader
//!
//! Grid DSL compiler for gridfsm.
//!
//! A state machine is described by two files: a manifest naming the
//! evaluators and actions it uses, and a delimited grid with one row per
//! state and one column per event. This crate provides:
//! - Manifest parsing (JSON or YAML)
//! - A registry mapping component type ids to factories
//! - Event header and transition cell parsing
//! - Validation and compilation into a [`gridfsm_core::Definition`]
//! - Loader configuration

pub mod cell;
pub mod config;
pub mod error;
pub mod grid;
pub mod header;
pub mod loader;
pub mod manifest;
pub mod registry;

pub use cell::{classify, parse_cell, tokenize, CellTransition};
pub use config::{ConfigError, LoaderConfig};
pub use error::{ComponentKind, LoaderError};
pub use grid::{Grid, GridRow};
pub use loader::{ActionOverride, GridLoader};
pub use manifest::Manifest;
pub use registry::{ActionFactory, ComponentRegistry, EvaluatorFactory};
