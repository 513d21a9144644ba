//! Manifest describing a grid and the components it references.
//!
//! ```yaml
//! definition: definitions/ticket.csv
//! entityType: Ticket
//! transitionEvaluators:
//!   TE1: is-urgent
//! transitionActions:
//!   TA1: notify-owner
//! defaultPath: [Open, Review, Closed]
//! ```
//!
//! Names on the left are what grid cells refer to; values are component
//! type ids looked up in a [`ComponentRegistry`](crate::ComponentRegistry).

use crate::error::LoaderError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Locator of the grid resource.
    pub definition: String,

    /// Informational name of the managed entity type.
    #[serde(default, alias = "entityClassType", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,

    /// Evaluator name to component type id.
    #[serde(default)]
    pub transition_evaluators: BTreeMap<String, String>,

    /// Action name to component type id.
    #[serde(default)]
    pub transition_actions: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_path: Option<Vec<String>>,
}

impl Manifest {
    /// Parses a manifest from JSON or YAML text.
    ///
    /// Text starting with `{` is read as JSON, anything else as YAML.
    pub fn parse(text: &str) -> Result<Self, LoaderError> {
        if text.trim_start().starts_with('{') {
            Self::from_json(text)
        } else {
            Self::from_yaml(text)
        }
    }

    pub fn from_json(text: &str) -> Result<Self, LoaderError> {
        serde_json::from_str(text).map_err(|e| LoaderError::Manifest {
            reason: e.to_string(),
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, LoaderError> {
        serde_yaml::from_str(text).map_err(|e| LoaderError::Manifest {
            reason: e.to_string(),
        })
    }

    /// Reads and parses a manifest from `reader`.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, LoaderError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|e| LoaderError::Manifest {
                reason: e.to_string(),
            })?;
        Self::parse(&text)
    }

    /// Reads a manifest file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoaderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn has_evaluator(&self, name: &str) -> bool {
        self.transition_evaluators.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.transition_actions.contains_key(name)
    }
}
