//! State and event identifiers.
//!
//! Both are compared and hashed by name only. An [`Event`] may carry a list
//! of roles that are allowed to trigger it; the roles take no part in
//! equality, so `Approve` and `Approve[admin]` are the same event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A state in the machine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub String);

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for State {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for State {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An event that can trigger a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "EventRepr")]
pub struct Event {
    name: String,

    /// Roles allowed to trigger the event. `None` means unrestricted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    roles: Option<Vec<String>>,
}

impl Event {
    /// Creates an unrestricted event.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: None,
        }
    }

    /// Creates an event that only the given roles may trigger.
    pub fn authorised<I, S>(name: impl Into<String>, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            roles: Some(roles.into_iter().map(Into::into).collect()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn roles(&self) -> Option<&[String]> {
        self.roles.as_deref()
    }

    /// Returns true if the event is unrestricted or any of `roles` is
    /// authorised to trigger it.
    pub fn is_authorised_for<S: AsRef<str>>(&self, roles: &[S]) -> bool {
        match &self.roles {
            None => true,
            Some(allowed) => roles
                .iter()
                .any(|r| allowed.iter().any(|a| a == r.as_ref())),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.roles {
            Some(roles) => write!(f, "{}[{}]", self.name, roles.join(",")),
            None => f.write_str(&self.name),
        }
    }
}

impl From<&str> for Event {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Event {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Accepts either a bare event name or `{"name": .., "roles": [..]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum EventRepr {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        roles: Option<Vec<String>>,
    },
}

impl From<EventRepr> for Event {
    fn from(repr: EventRepr) -> Self {
        match repr {
            EventRepr::Name(name) => Event::new(name),
            EventRepr::Full { name, roles } => Event { name, roles },
        }
    }
}
